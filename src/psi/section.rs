// psi/section.rs
//! Generic PSI / SI section header reader.
//!
//! Buffers handed over by the demux start at the table_id byte (no pointer
//! field) and are assumed CRC-checked upstream.

use serde::Serialize;

use super::bits::{extract, low_bits_u16, require, u16_at, u8_at};
use crate::constants::{LENGTH_MASK, SECTION_PREFIX_LEN};
use crate::error::{ParseError, Result};

/// Fields shared by every section carrying the long (syntax = 1) header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LongHeader {
    pub table_id: u8,
    pub section_syntax_indicator: bool,
    pub section_length: u16,
    /// transport_stream_id (PAT) or program_number (PMT).
    pub table_id_extension: u16,
    pub version_number: u8,
    pub current_next_indicator: bool,
    pub section_number: u8,
    pub last_section_number: u8,
}

/// Reads the 8-byte long header after checking the table id.
pub fn parse_long_header(buf: &[u8], expected_table_id: u8) -> Result<LongHeader> {
    let table_id = u8_at(buf, 0)?;
    if table_id != expected_table_id {
        return Err(ParseError::WrongTableId {
            expected: expected_table_id,
            found: table_id,
        });
    }
    require(buf, 8)?;

    Ok(LongHeader {
        table_id,
        section_syntax_indicator: extract(buf, 8, 1)? == 1,
        section_length: low_bits_u16(buf, 1, 12)?,
        table_id_extension: u16_at(buf, 3)?,
        version_number: extract(buf, 5 * 8 + 2, 5)? as u8,
        current_next_indicator: extract(buf, 5 * 8 + 7, 1)? == 1,
        section_number: u8_at(buf, 6)?,
        last_section_number: u8_at(buf, 7)?,
    })
}

/// Declared total size of the section starting at `buf[0]`.
pub fn section_size(buf: &[u8]) -> Result<usize> {
    let section_length = u16_at(buf, 1)? & LENGTH_MASK;
    Ok(SECTION_PREFIX_LEN + section_length as usize)
}

/// Iterator over the sections of a buffer holding them back to back.
///
/// Stops at stuffing (table_id 0xFF) or at a section whose declared length
/// runs past the end of the data.
pub struct Sections<'a> {
    rest: &'a [u8],
}

pub fn sections(data: &[u8]) -> Sections<'_> {
    Sections { rest: data }
}

impl<'a> Iterator for Sections<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<&'a [u8]> {
        if self.rest.first().is_none_or(|&tid| tid == 0xFF) {
            return None;
        }
        let size = section_size(self.rest).ok()?;
        if size > self.rest.len() {
            return None;
        }
        let (section, rest) = self.rest.split_at(size);
        self.rest = rest;
        Some(section)
    }
}
