// psi/tot.rs
//! Time Offset Table (table_id 0x73, PID 0x0014).
//!
//! Same time fields as the TDT followed by a descriptor loop; only the
//! local_time_offset_descriptor (0x58) is decoded.

use serde::Serialize;

use super::bits::{extract, low_bits_u16, require, u16_at, u8_at};
use super::bounded::BoundedList;
use crate::calendar::bcd_to_decimal;
use crate::constants::{
    LENGTH_MASK, LOCAL_TIME_OFFSET_DESCRIPTOR_TAG, LTO_ENTRY_LEN, MAX_LTO_ENTRIES,
    MAX_TOT_DESCRIPTORS, TOT_DESCRIPTOR_STRIDE, TOT_HEADER_LEN,
};
use crate::error::Result;
use crate::types::TableKind;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum OffsetPolarity {
    /// Local time is UTC plus the offset.
    #[default]
    Ahead,
    Behind,
}

/// One 13-byte entry of a local_time_offset_descriptor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LtoDescriptorInfo {
    /// ISO 3166 alpha-3, e.g. `b"SRB"`.
    pub country_code: [u8; 3],
    pub country_region_id: u8,
    pub local_time_offset_polarity: OffsetPolarity,
    pub local_time_offset_hours: u8,
    pub local_time_offset_minutes: u8,
    pub time_of_change_mjd: u16,
    /// Raw BCD hhmmss.
    pub time_of_change_utc: u32,
    pub next_time_offset_hours: u8,
    pub next_time_offset_minutes: u8,
}

impl LtoDescriptorInfo {
    pub fn country(&self) -> String {
        String::from_utf8_lossy(&self.country_code).into_owned()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LocalTimeOffsetDescriptor {
    pub descriptor_tag: u8,
    pub descriptor_length: u8,
    /// Empty unless the tag is 0x58.
    pub entries: BoundedList<LtoDescriptorInfo, MAX_LTO_ENTRIES>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TotTable {
    pub table_id: u8,
    pub section_syntax_indicator: bool,
    pub section_length: u16,
    pub mjd: u16,
    /// UTC bytes as broadcast (BCD, not decoded).
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
    pub descriptors_loop_length: u16,
    pub descriptors: BoundedList<LocalTimeOffsetDescriptor, MAX_TOT_DESCRIPTORS>,
}

impl TotTable {
    /// Every LTO entry across all descriptors, in broadcast order.
    pub fn lto_entries(&self) -> impl Iterator<Item = &LtoDescriptorInfo> {
        self.descriptors.iter().flat_map(|d| d.entries.iter())
    }

    /// Entry for `country`, falling back to the first entry broadcast.
    pub fn offset_for(&self, country: Option<&str>) -> Option<&LtoDescriptorInfo> {
        country
            .and_then(|c| {
                self.lto_entries()
                    .find(|e| e.country_code.eq_ignore_ascii_case(c.as_bytes()))
            })
            .or_else(|| self.lto_entries().next())
    }
}

/// Decodes one LTO entry from the start of `buf`.
pub fn parse_lto_entry(buf: &[u8]) -> Result<LtoDescriptorInfo> {
    require(buf, LTO_ENTRY_LEN)?;
    let flags = u8_at(buf, 3)?;
    Ok(LtoDescriptorInfo {
        country_code: [buf[0], buf[1], buf[2]],
        country_region_id: flags >> 2,
        local_time_offset_polarity: if flags & 0x01 == 0 {
            OffsetPolarity::Ahead
        } else {
            OffsetPolarity::Behind
        },
        local_time_offset_hours: bcd_to_decimal(u8_at(buf, 4)?),
        local_time_offset_minutes: bcd_to_decimal(u8_at(buf, 5)?),
        time_of_change_mjd: u16_at(buf, 6)?,
        time_of_change_utc: extract(buf, 8 * 8, 24)?,
        next_time_offset_hours: bcd_to_decimal(u8_at(buf, 11)?),
        next_time_offset_minutes: bcd_to_decimal(u8_at(buf, 12)?),
    })
}

/// Decodes the descriptor whose tag byte is at `buf[0]`.
fn parse_descriptor(buf: &[u8]) -> Result<LocalTimeOffsetDescriptor> {
    let descriptor_tag = u8_at(buf, 0)?;
    let descriptor_length = u8_at(buf, 1)?;
    let mut entries = BoundedList::new();

    if descriptor_tag == LOCAL_TIME_OFFSET_DESCRIPTOR_TAG {
        let body = buf.get(2..).unwrap_or(&[]);
        require(body, descriptor_length as usize)?;
        for chunk in body[..descriptor_length as usize].chunks_exact(LTO_ENTRY_LEN) {
            entries.push(parse_lto_entry(chunk)?, TableKind::Tot)?;
        }
    }

    Ok(LocalTimeOffsetDescriptor {
        descriptor_tag,
        descriptor_length,
        entries,
    })
}

/// Parses a TOT section.
///
/// Descriptors are located at a fixed 15-byte stride from the loop start,
/// i.e. one LTO entry per descriptor as broadcast by terrestrial muxes. The
/// remaining loop length shrinks by `descriptor_length + 2` per descriptor.
pub fn parse_tot_table(buf: &[u8]) -> Result<TotTable> {
    require(buf, TOT_HEADER_LEN)?;

    let descriptors_loop_length = u16_at(buf, 8)? & LENGTH_MASK;
    let mut descriptors = BoundedList::new();
    let mut remaining = descriptors_loop_length as usize;
    let mut index = 0;
    while remaining > 0 {
        let at = TOT_HEADER_LEN + TOT_DESCRIPTOR_STRIDE * index;
        let descriptor = parse_descriptor(buf.get(at..).unwrap_or(&[]))?;
        remaining = remaining.saturating_sub(descriptor.descriptor_length as usize + 2);
        descriptors.push(descriptor, TableKind::Tot)?;
        index += 1;
    }

    Ok(TotTable {
        table_id: u8_at(buf, 0)?,
        section_syntax_indicator: extract(buf, 8, 1)? == 1,
        section_length: low_bits_u16(buf, 1, 12)?,
        mjd: u16_at(buf, 3)?,
        hours: u8_at(buf, 5)?,
        minutes: u8_at(buf, 6)?,
        seconds: u8_at(buf, 7)?,
        descriptors_loop_length,
        descriptors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseError;

    fn lto_entry(country: &[u8; 3], region: u8, behind: bool, offset: [u8; 2]) -> Vec<u8> {
        let mut e = country.to_vec();
        e.push(region << 2 | 0x02 | behind as u8);
        e.extend_from_slice(&offset);
        e.extend_from_slice(&[0xDA, 0x6B, 0x01, 0x00, 0x00, 0x02, 0x00]);
        e
    }

    /// TOT with the given raw descriptors laid back to back, plus a dummy CRC.
    fn tot_section(descriptors: &[Vec<u8>]) -> Vec<u8> {
        let loop_len: usize = descriptors.iter().map(Vec::len).sum();
        let section_length = 7 + loop_len + 4;
        let mut buf = vec![0x73, 0x70 | (section_length >> 8) as u8, section_length as u8];
        buf.extend_from_slice(&[0xD7, 0x39, 0x23, 0x45, 0x07]);
        buf.extend_from_slice(&(0xF000u16 | loop_len as u16).to_be_bytes());
        for d in descriptors {
            buf.extend_from_slice(d);
        }
        buf.extend_from_slice(&[0x01, 0x02, 0x03, 0x04]);
        buf
    }

    fn lto_descriptor(entries: &[Vec<u8>]) -> Vec<u8> {
        let body: Vec<u8> = entries.concat();
        let mut d = vec![0x58, body.len() as u8];
        d.extend(body);
        d
    }

    #[test]
    fn decodes_single_lto_descriptor() {
        let tot = parse_tot_table(&tot_section(&[lto_descriptor(&[lto_entry(
            b"SRB", 0, false, [0x01, 0x30],
        )])]))
        .unwrap();

        assert_eq!(tot.mjd, 55097);
        // time bytes stay BCD
        assert_eq!((tot.hours, tot.minutes, tot.seconds), (0x23, 0x45, 0x07));
        assert_eq!(tot.descriptors_loop_length, 15);
        assert_eq!(tot.descriptors.len(), 1);

        let e = &tot.descriptors[0].entries[0];
        assert_eq!(e.country(), "SRB");
        assert_eq!(e.local_time_offset_polarity, OffsetPolarity::Ahead);
        assert_eq!((e.local_time_offset_hours, e.local_time_offset_minutes), (1, 30));
        assert_eq!(e.time_of_change_mjd, 0xDA6B);
        assert_eq!(e.time_of_change_utc, 0x010000);
        assert_eq!((e.next_time_offset_hours, e.next_time_offset_minutes), (2, 0));
    }

    #[test]
    fn region_and_polarity_bits() {
        let e = parse_lto_entry(&lto_entry(b"BRA", 0x2A, true, [0x03, 0x00])).unwrap();
        assert_eq!(e.country_region_id, 0x2A);
        assert_eq!(e.local_time_offset_polarity, OffsetPolarity::Behind);
        assert_eq!(e.local_time_offset_hours, 3);
    }

    #[test]
    fn walks_descriptors_at_fixed_stride() {
        let tot = parse_tot_table(&tot_section(&[
            lto_descriptor(&[lto_entry(b"DEU", 0, false, [0x01, 0x00])]),
            lto_descriptor(&[lto_entry(b"GBR", 0, false, [0x00, 0x00])]),
            lto_descriptor(&[lto_entry(b"PRT", 1, true, [0x01, 0x00])]),
        ]))
        .unwrap();
        let countries: Vec<String> = tot.lto_entries().map(LtoDescriptorInfo::country).collect();
        assert_eq!(countries, ["DEU", "GBR", "PRT"]);
    }

    #[test]
    fn other_tags_are_counted_but_not_decoded() {
        // 13-byte private descriptor keeps the 15-byte stride intact
        let mut private = vec![0x83, 13];
        private.extend_from_slice(&[0x58; 13]);
        let tot = parse_tot_table(&tot_section(&[
            private,
            lto_descriptor(&[lto_entry(b"SRB", 0, false, [0x01, 0x00])]),
        ]))
        .unwrap();
        assert_eq!(tot.descriptors.len(), 2);
        assert_eq!(tot.descriptors[0].descriptor_tag, 0x83);
        assert!(tot.descriptors[0].entries.is_empty());
        assert_eq!(tot.descriptors[1].entries.len(), 1);
    }

    #[test]
    fn multi_entry_descriptor_reads_entries_in_place() {
        let tot = parse_tot_table(&tot_section(&[lto_descriptor(&[
            lto_entry(b"ESP", 0, false, [0x01, 0x00]),
            lto_entry(b"ESP", 1, false, [0x00, 0x00]),
        ])]))
        .unwrap();
        assert_eq!(tot.descriptors.len(), 1);
        let regions: Vec<u8> = tot.lto_entries().map(|e| e.country_region_id).collect();
        assert_eq!(regions, [0, 1]);
    }

    #[test]
    fn offset_lookup_prefers_country() {
        let tot = parse_tot_table(&tot_section(&[
            lto_descriptor(&[lto_entry(b"DEU", 0, false, [0x01, 0x00])]),
            lto_descriptor(&[lto_entry(b"GBR", 0, false, [0x00, 0x00])]),
        ]))
        .unwrap();
        assert_eq!(tot.offset_for(Some("gbr")).map(|e| e.country()), Some("GBR".into()));
        assert_eq!(tot.offset_for(Some("FRA")).map(|e| e.country()), Some("DEU".into()));
        assert_eq!(tot.offset_for(None).map(|e| e.country()), Some("DEU".into()));
    }

    #[test]
    fn empty_loop_has_no_descriptors() {
        let tot = parse_tot_table(&tot_section(&[])).unwrap();
        assert!(tot.descriptors.is_empty());
        assert_eq!(tot.offset_for(Some("SRB")), None);
    }

    #[test]
    fn too_many_descriptors_is_an_error() {
        let ds: Vec<Vec<u8>> = (0..21)
            .map(|_| lto_descriptor(&[lto_entry(b"SRB", 0, false, [0x01, 0x00])]))
            .collect();
        assert_eq!(
            parse_tot_table(&tot_section(&ds)),
            Err(ParseError::CapacityExceeded {
                table: TableKind::Tot,
                capacity: MAX_TOT_DESCRIPTORS,
            })
        );
    }

    #[test]
    fn descriptor_past_buffer_is_truncated() {
        let mut buf = tot_section(&[lto_descriptor(&[lto_entry(b"SRB", 0, false, [0x01, 0x00])])]);
        buf.truncate(20);
        assert!(matches!(parse_tot_table(&buf), Err(ParseError::Truncated { .. })));
    }

    #[test]
    fn table_id_is_not_enforced() {
        // recorded as broadcast, as for the TDT
        let mut buf = tot_section(&[lto_descriptor(&[lto_entry(b"SRB", 0, false, [0x01, 0x00])])]);
        buf[0] = 0x72;
        let tot = parse_tot_table(&buf).unwrap();
        assert_eq!(tot.table_id, 0x72);
        assert_eq!(tot.lto_entries().count(), 1);
    }
}
