//! JSON views of decoded tables

use serde::Serialize;

use crate::calendar::{bcd_to_decimal, mjd_to_date, CalendarDate};
use crate::constants::RESERVED_SERVICE_INDEX;
use crate::psi::{LtoDescriptorInfo, OffsetPolarity, PatTable, PmtTable, TdtTable, TotTable};
use crate::si_cache::{Table, TableRegistry};
use crate::types::StreamCodec;

/// JSON structure for PAT entries (internal serialization)
#[derive(Serialize)]
struct ServiceJson {
    index: usize,
    program_number: u16,
    pmt_pid: u16,
    /// Network information entry, never tuned.
    reserved: bool,
}

#[derive(Serialize)]
struct PatJson {
    transport_stream_id: u16,
    version: u8,
    services: Vec<ServiceJson>,
}

#[derive(Serialize)]
struct EsJson {
    pid: u16,
    stream_type: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    codec: Option<StreamCodec>,
    es_info_length: u16,
}

#[derive(Serialize)]
struct PmtJson {
    program_number: u16,
    version: u8,
    pcr_pid: u16,
    streams: Vec<EsJson>,
    #[serde(skip_serializing_if = "Option::is_none")]
    video_pid: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    audio_pid: Option<u16>,
}

#[derive(Serialize)]
struct TdtJson {
    mjd: u16,
    date: CalendarDate,
    /// `None` when the BCD fields do not form a valid time.
    utc: Option<String>,
}

#[derive(Serialize)]
struct OffsetJson {
    country: String,
    region: u8,
    /// Signed `±hh:mm`.
    offset: String,
    next_offset: String,
    time_of_change_mjd: u16,
}

#[derive(Serialize)]
struct TotJson {
    mjd: u16,
    date: CalendarDate,
    utc: String,
    offsets: Vec<OffsetJson>,
}

/// One decoded table, tagged with its name.
#[derive(Serialize)]
#[serde(tag = "table", rename_all = "UPPERCASE")]
enum TableJson {
    Pat(PatJson),
    Pmt(PmtJson),
    Tdt(TdtJson),
    Tot(TotJson),
}

fn signed_offset(polarity: OffsetPolarity, hours: u8, minutes: u8) -> String {
    let sign = match polarity {
        OffsetPolarity::Ahead => '+',
        OffsetPolarity::Behind => '-',
    };
    format!("{sign}{hours:02}:{minutes:02}")
}

fn pat_json(pat: &PatTable) -> PatJson {
    PatJson {
        transport_stream_id: pat.header.transport_stream_id,
        version: pat.header.version_number,
        services: pat
            .services
            .iter()
            .enumerate()
            .map(|(index, s)| ServiceJson {
                index,
                program_number: s.program_number,
                pmt_pid: s.pid,
                reserved: index == RESERVED_SERVICE_INDEX,
            })
            .collect(),
    }
}

fn pmt_json(pmt: &PmtTable) -> PmtJson {
    PmtJson {
        program_number: pmt.header.program_number,
        version: pmt.header.version_number,
        pcr_pid: pmt.header.pcr_pid,
        streams: pmt
            .streams
            .iter()
            .map(|s| EsJson {
                pid: s.elementary_pid,
                stream_type: s.stream_type,
                codec: StreamCodec::from_stream_type(s.stream_type),
                es_info_length: s.es_info_length,
            })
            .collect(),
        video_pid: pmt.first_video().map(|s| s.elementary_pid),
        audio_pid: pmt.first_audio().map(|s| s.elementary_pid),
    }
}

fn tdt_json(tdt: &TdtTable) -> TdtJson {
    TdtJson {
        mjd: tdt.mjd,
        date: mjd_to_date(tdt.mjd),
        utc: tdt.utc().map(|utc| utc.format("%Y-%m-%dT%H:%M:%SZ").to_string()),
    }
}

fn offset_json(lto: &LtoDescriptorInfo) -> OffsetJson {
    OffsetJson {
        country: lto.country(),
        region: lto.country_region_id,
        offset: signed_offset(
            lto.local_time_offset_polarity,
            lto.local_time_offset_hours,
            lto.local_time_offset_minutes,
        ),
        next_offset: signed_offset(
            lto.local_time_offset_polarity,
            lto.next_time_offset_hours,
            lto.next_time_offset_minutes,
        ),
        time_of_change_mjd: lto.time_of_change_mjd,
    }
}

fn tot_json(tot: &TotTable) -> TotJson {
    TotJson {
        mjd: tot.mjd,
        date: mjd_to_date(tot.mjd),
        utc: format!(
            "{:02}:{:02}:{:02}",
            bcd_to_decimal(tot.hours),
            bcd_to_decimal(tot.minutes),
            bcd_to_decimal(tot.seconds)
        ),
        offsets: tot.lto_entries().map(offset_json).collect(),
    }
}

fn table_json(table: &Table) -> TableJson {
    match table {
        Table::Pat(pat) => TableJson::Pat(pat_json(pat)),
        Table::Pmt(pmt) => TableJson::Pmt(pmt_json(pmt)),
        Table::Tdt(tdt) => TableJson::Tdt(tdt_json(tdt)),
        Table::Tot(tot) => TableJson::Tot(tot_json(tot)),
    }
}

/// Renders decoded tables for the CLI
pub struct Reporter;

impl Reporter {
    /// JSON value for one table.
    pub fn table(table: &Table) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(table_json(table))
    }

    /// Every table currently held by `registry`, PAT first.
    pub fn registry(registry: &TableRegistry) -> serde_json::Result<serde_json::Value> {
        let tables: Vec<TableJson> = [
            registry.pat().map(Table::Pat),
            registry.pmt().map(Table::Pmt),
            registry.tdt().map(Table::Tdt),
            registry.tot().map(Table::Tot),
        ]
        .iter()
        .flatten()
        .map(table_json)
        .collect();
        serde_json::to_value(tables)
    }
}
