// psi/tdt.rs
//! Time and Date Table (table_id 0x70, PID 0x0014).
//!
//! Eight bytes, no CRC: short header, 16-bit MJD, then UTC as three BCD bytes.

use chrono::NaiveDateTime;
use serde::Serialize;

use super::bits::{extract, low_bits_u16, require, u16_at, u8_at};
use crate::calendar::{bcd_to_decimal, utc_datetime};
use crate::constants::TDT_SECTION_LEN;
use crate::error::Result;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TdtTable {
    pub table_id: u8,
    pub section_syntax_indicator: bool,
    pub section_length: u16,
    pub mjd: u16,
    /// Decoded from BCD.
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
}

impl TdtTable {
    /// UTC instant carried by the table, if the fields form a valid date-time.
    pub fn utc(&self) -> Option<NaiveDateTime> {
        utc_datetime(self.mjd, self.hours, self.minutes, self.seconds)
    }
}

/// Parses a TDT section.
///
/// The table id is not checked: the demux filter already selected 0x70, and
/// some muxes reuse the layout on other ids.
pub fn parse_tdt_table(buf: &[u8]) -> Result<TdtTable> {
    require(buf, TDT_SECTION_LEN)?;
    Ok(TdtTable {
        table_id: u8_at(buf, 0)?,
        section_syntax_indicator: extract(buf, 8, 1)? == 1,
        section_length: low_bits_u16(buf, 1, 12)?,
        mjd: u16_at(buf, 3)?,
        hours: bcd_to_decimal(u8_at(buf, 5)?),
        minutes: bcd_to_decimal(u8_at(buf, 6)?),
        seconds: bcd_to_decimal(u8_at(buf, 7)?),
    })
}
