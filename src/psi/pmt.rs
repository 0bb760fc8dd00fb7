//! Program Map Table (table_id 0x02).

use serde::Serialize;

use super::bits::{low_bits_u16, u8_at};
use super::bounded::BoundedList;
use super::section::parse_long_header;
use crate::constants::{
    AUDIO_STREAM_TYPES, CRC_LEN, LENGTH_MASK, MAX_ELEMENTARY_STREAMS_IN_PMT,
    PMT_ELEMENTARY_INFO_LEN, PMT_HEADER_LEN, PMT_TABLE_ID, PID_MASK, SECTION_PREFIX_LEN,
    VIDEO_STREAM_TYPES,
};
use crate::error::Result;
use crate::types::TableKind;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PmtTableHeader {
    pub table_id: u8,
    pub section_syntax_indicator: bool,
    pub section_length: u16,
    pub program_number: u16,
    pub version_number: u8,
    pub current_next_indicator: bool,
    pub section_number: u8,
    pub last_section_number: u8,
    pub pcr_pid: u16,
    pub program_info_length: u16,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PmtElementaryInfo {
    pub stream_type: u8,
    pub elementary_pid: u16,
    /// Descriptor bytes following the record; skipped, not decoded.
    pub es_info_length: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PmtTable {
    pub header: PmtTableHeader,
    pub streams: BoundedList<PmtElementaryInfo, MAX_ELEMENTARY_STREAMS_IN_PMT>,
}

impl PmtTable {
    /// First video stream in PMT order.
    pub fn first_video(&self) -> Option<&PmtElementaryInfo> {
        self.streams
            .iter()
            .find(|s| VIDEO_STREAM_TYPES.contains(&s.stream_type))
    }

    /// First audio stream in PMT order.
    pub fn first_audio(&self) -> Option<&PmtElementaryInfo> {
        self.streams
            .iter()
            .find(|s| AUDIO_STREAM_TYPES.contains(&s.stream_type))
    }
}

pub fn parse_pmt_header(buf: &[u8]) -> Result<PmtTableHeader> {
    let h = parse_long_header(buf, PMT_TABLE_ID)?;
    Ok(PmtTableHeader {
        table_id: h.table_id,
        section_syntax_indicator: h.section_syntax_indicator,
        section_length: h.section_length,
        program_number: h.table_id_extension,
        version_number: h.version_number,
        current_next_indicator: h.current_next_indicator,
        section_number: h.section_number,
        last_section_number: h.last_section_number,
        pcr_pid: low_bits_u16(buf, 8, 13)? & PID_MASK,
        program_info_length: low_bits_u16(buf, 10, 12)? & LENGTH_MASK,
    })
}

/// Reads the fixed 5-byte part of an elementary stream record.
pub fn parse_pmt_elementary_info(buf: &[u8]) -> Result<PmtElementaryInfo> {
    Ok(PmtElementaryInfo {
        stream_type: u8_at(buf, 0)?,
        elementary_pid: low_bits_u16(buf, 1, 13)? & PID_MASK,
        es_info_length: low_bits_u16(buf, 3, 12)? & LENGTH_MASK,
    })
}

/// Parses a complete PMT section.
///
/// Program descriptors are skipped using program_info_length, then each
/// record advances by its own `5 + es_info_length` stride.
pub fn parse_pmt_table(buf: &[u8]) -> Result<PmtTable> {
    let header = parse_pmt_header(buf)?;
    let mut streams = BoundedList::new();

    let first = PMT_HEADER_LEN + header.program_info_length as usize;
    let mut parsed_length = first + CRC_LEN - SECTION_PREFIX_LEN;
    let mut pos = first;
    while parsed_length < header.section_length as usize {
        let info = parse_pmt_elementary_info(buf.get(pos..).unwrap_or(&[]))?;
        let stride = PMT_ELEMENTARY_INFO_LEN + info.es_info_length as usize;
        streams.push(info, TableKind::Pmt)?;
        pos += stride;
        parsed_length += stride;
    }

    Ok(PmtTable { header, streams })
}
