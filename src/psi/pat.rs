//! Program Association Table (table_id 0x00, PID 0x0000).

use serde::Serialize;

use super::bits::{low_bits_u16, u16_at};
use super::bounded::BoundedList;
use super::section::parse_long_header;
use crate::constants::{
    CRC_LEN, MAX_SERVICES_IN_PAT, PAT_HEADER_LEN, PAT_SERVICE_INFO_LEN, PAT_TABLE_ID, PID_MASK,
    SECTION_PREFIX_LEN,
};
use crate::error::Result;
use crate::types::TableKind;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PatHeader {
    pub table_id: u8,
    pub section_syntax_indicator: bool,
    pub section_length: u16,
    pub transport_stream_id: u16,
    pub version_number: u8,
    pub current_next_indicator: bool,
    pub section_number: u8,
    pub last_section_number: u8,
}

/// One program_number → PMT pid entry (program 0 points at the NIT).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PatServiceInfo {
    pub program_number: u16,
    pub pid: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PatTable {
    pub header: PatHeader,
    /// Entries in arrival order.
    pub services: BoundedList<PatServiceInfo, MAX_SERVICES_IN_PAT>,
}

impl PatTable {
    pub fn service_count(&self) -> usize {
        self.services.len()
    }

    pub fn service(&self, index: usize) -> Option<&PatServiceInfo> {
        self.services.get(index)
    }

    /// PMT pid announced for `program_number`.
    pub fn pmt_pid(&self, program_number: u16) -> Option<u16> {
        self.services
            .iter()
            .find(|s| s.program_number == program_number)
            .map(|s| s.pid)
    }
}

pub fn parse_pat_header(buf: &[u8]) -> Result<PatHeader> {
    let h = parse_long_header(buf, PAT_TABLE_ID)?;
    Ok(PatHeader {
        table_id: h.table_id,
        section_syntax_indicator: h.section_syntax_indicator,
        section_length: h.section_length,
        transport_stream_id: h.table_id_extension,
        version_number: h.version_number,
        current_next_indicator: h.current_next_indicator,
        section_number: h.section_number,
        last_section_number: h.last_section_number,
    })
}

/// Reads one fixed 4-byte service record.
pub fn parse_pat_service_info(buf: &[u8]) -> Result<PatServiceInfo> {
    Ok(PatServiceInfo {
        program_number: u16_at(buf, 0)?,
        pid: low_bits_u16(buf, 2, 13)? & PID_MASK,
    })
}

/// Parses a complete PAT section.
///
/// Service records follow `last_section_number` and are consumed until the
/// running length reaches `section_length`. The running length starts with
/// the header and CRC sizes minus the three bytes section_length excludes, so
/// the CRC is never read as a service.
pub fn parse_pat_table(buf: &[u8]) -> Result<PatTable> {
    let header = parse_pat_header(buf)?;
    let mut services = BoundedList::new();

    let mut parsed_length = PAT_HEADER_LEN + CRC_LEN - SECTION_PREFIX_LEN;
    let mut pos = PAT_HEADER_LEN;
    while parsed_length < header.section_length as usize {
        let info = parse_pat_service_info(buf.get(pos..).unwrap_or(&[]))?;
        services.push(info, TableKind::Pat)?;
        pos += PAT_SERVICE_INFO_LEN;
        parsed_length += PAT_SERVICE_INFO_LEN;
    }

    Ok(PatTable { header, services })
}
