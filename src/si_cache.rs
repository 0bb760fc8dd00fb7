//! Latest-table registry shared by the section notifier and the coordinator.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Result;
use crate::psi::{
    parse_pat_table, parse_pmt_table, parse_tdt_table, parse_tot_table, PatTable, PmtTable,
    TdtTable, TotTable,
};
use crate::types::TableKind;

/// Any table the registry can hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Table {
    Pat(PatTable),
    Pmt(PmtTable),
    Tdt(TdtTable),
    Tot(TotTable),
}

impl Table {
    /// Runs the parser for `kind` over a complete section.
    pub fn parse(kind: TableKind, buf: &[u8]) -> Result<Table> {
        Ok(match kind {
            TableKind::Pat => Table::Pat(parse_pat_table(buf)?),
            TableKind::Pmt => Table::Pmt(parse_pmt_table(buf)?),
            TableKind::Tdt => Table::Tdt(parse_tdt_table(buf)?),
            TableKind::Tot => Table::Tot(parse_tot_table(buf)?),
        })
    }
}

/// A stored table and the registry sequence number it was stored under.
#[derive(Debug, Clone)]
struct Slot<T> {
    table: T,
    sequence: u64,
}

#[derive(Debug, Default)]
struct SiCache {
    sequence: u64,
    pat: Option<Slot<PatTable>>,
    pmt: Option<Slot<PmtTable>>,
    tdt: Option<Slot<TdtTable>>,
    tot: Option<Slot<TotTable>>,
}

/// Holds the most recent successfully parsed instance of each table kind.
///
/// Cloning yields another handle on the same storage. Every store bumps a
/// sequence number so a waiter can tell a fresh table from one that was
/// already there when it started waiting.
#[derive(Debug, Clone, Default)]
pub struct TableRegistry {
    inner: Arc<Mutex<SiCache>>,
}

impl TableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the slot for the table's kind; returns the new sequence number.
    pub fn store(&self, table: Table) -> u64 {
        let mut cache = self.inner.lock();
        cache.sequence += 1;
        let sequence = cache.sequence;
        match table {
            Table::Pat(table) => cache.pat = Some(Slot { table, sequence }),
            Table::Pmt(table) => cache.pmt = Some(Slot { table, sequence }),
            Table::Tdt(table) => cache.tdt = Some(Slot { table, sequence }),
            Table::Tot(table) => cache.tot = Some(Slot { table, sequence }),
        }
        sequence
    }

    /// Sequence number of the last store (0 when nothing was ever stored).
    pub fn sequence(&self) -> u64 {
        self.inner.lock().sequence
    }

    pub fn pat(&self) -> Option<PatTable> {
        self.inner.lock().pat.as_ref().map(|s| s.table.clone())
    }

    pub fn pmt(&self) -> Option<PmtTable> {
        self.inner.lock().pmt.as_ref().map(|s| s.table.clone())
    }

    pub fn tdt(&self) -> Option<TdtTable> {
        self.inner.lock().tdt.as_ref().map(|s| s.table)
    }

    pub fn tot(&self) -> Option<TotTable> {
        self.inner.lock().tot.as_ref().map(|s| s.table.clone())
    }

    /// The stored table of `kind` if it was stored after `since`.
    pub fn fresh(&self, kind: TableKind, since: u64) -> Option<Table> {
        let cache = self.inner.lock();
        match kind {
            TableKind::Pat => cache
                .pat
                .as_ref()
                .filter(|s| s.sequence > since)
                .map(|s| Table::Pat(s.table.clone())),
            TableKind::Pmt => cache
                .pmt
                .as_ref()
                .filter(|s| s.sequence > since)
                .map(|s| Table::Pmt(s.table.clone())),
            TableKind::Tdt => cache
                .tdt
                .as_ref()
                .filter(|s| s.sequence > since)
                .map(|s| Table::Tdt(s.table)),
            TableKind::Tot => cache
                .tot
                .as_ref()
                .filter(|s| s.sequence > since)
                .map(|s| Table::Tot(s.table.clone())),
        }
    }

    /// Drops every stored table. The sequence keeps counting.
    pub fn clear(&self) {
        let mut cache = self.inner.lock();
        cache.pat = None;
        cache.pmt = None;
        cache.tdt = None;
        cache.tot = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tdt(mjd: u16) -> Table {
        Table::Tdt(TdtTable { mjd, ..Default::default() })
    }

    #[test]
    fn latest_store_wins() {
        let registry = TableRegistry::new();
        assert_eq!(registry.tdt(), None);
        registry.store(tdt(1));
        registry.store(tdt(2));
        assert_eq!(registry.tdt().map(|t| t.mjd), Some(2));
        assert_eq!(registry.sequence(), 2);
    }

    #[test]
    fn fresh_ignores_tables_from_before_the_mark() {
        let registry = TableRegistry::new();
        registry.store(tdt(1));
        let mark = registry.sequence();
        assert_eq!(registry.fresh(TableKind::Tdt, mark), None);
        registry.store(Table::Pat(PatTable::default()));
        // a PAT arriving does not make the TDT fresh
        assert_eq!(registry.fresh(TableKind::Tdt, mark), None);
        assert!(registry.fresh(TableKind::Pat, mark).is_some());
        registry.store(tdt(3));
        assert_eq!(registry.fresh(TableKind::Tdt, mark), Some(tdt(3)));
    }

    #[test]
    fn clones_share_storage_and_clear_empties_it() {
        let registry = TableRegistry::new();
        let writer = registry.clone();
        writer.store(Table::Pmt(PmtTable::default()));
        assert!(registry.pmt().is_some());
        registry.clear();
        assert!(writer.pmt().is_none());
        assert_eq!(writer.sequence(), 1);
    }

    #[test]
    fn parse_dispatches_on_kind() {
        let buf = [0x70, 0x70, 0x05, 0xD7, 0x39, 0x12, 0x00, 0x00];
        let table = Table::parse(TableKind::Tdt, &buf).unwrap();
        assert!(matches!(table, Table::Tdt(TdtTable { mjd: 55097, .. })));
        assert!(Table::parse(TableKind::Pat, &buf).is_err());
    }
}
