//! Fixed-capacity list used for the repeated loops inside tables.

use std::ops::Deref;

use serde::Serialize;

use crate::error::{ParseError, Result};
use crate::types::TableKind;

/// Ordered list that refuses to grow past `CAP` entries.
///
/// Storage is reserved up front; a push past capacity is an error so a parser
/// can never hand out a silently truncated table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BoundedList<T, const CAP: usize> {
    items: Vec<T>,
}

impl<T, const CAP: usize> BoundedList<T, CAP> {
    pub fn new() -> Self {
        Self {
            items: Vec::with_capacity(CAP),
        }
    }

    /// Appends `item`, or reports which table overflowed.
    pub fn push(&mut self, item: T, table: TableKind) -> Result<()> {
        if self.items.len() >= CAP {
            return Err(ParseError::CapacityExceeded {
                table,
                capacity: CAP,
            });
        }
        self.items.push(item);
        Ok(())
    }
}

impl<T, const CAP: usize> Default for BoundedList<T, CAP> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const CAP: usize> Deref for BoundedList<T, CAP> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_past_capacity_fails() {
        let mut list = BoundedList::<u8, 2>::new();
        list.push(1, TableKind::Pat).unwrap();
        list.push(2, TableKind::Pat).unwrap();
        assert_eq!(
            list.push(3, TableKind::Pat),
            Err(ParseError::CapacityExceeded {
                table: TableKind::Pat,
                capacity: 2
            })
        );
        assert_eq!(&list[..], &[1, 2]);
    }
}
