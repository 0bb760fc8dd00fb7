use std::fmt;
use std::time::Instant;

use chrono::{Duration as ChronoDuration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Table types held by the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TableKind {
    Pat,
    Pmt,
    Tdt,
    Tot,
}

impl TableKind {
    /// Kind decoded for sections carrying `table_id`.
    pub fn from_table_id(table_id: u8) -> Option<Self> {
        use crate::constants::{PAT_TABLE_ID, PMT_TABLE_ID, TDT_TABLE_ID, TOT_TABLE_ID};
        match table_id {
            PAT_TABLE_ID => Some(TableKind::Pat),
            PMT_TABLE_ID => Some(TableKind::Pmt),
            TDT_TABLE_ID => Some(TableKind::Tdt),
            TOT_TABLE_ID => Some(TableKind::Tot),
            _ => None,
        }
    }

    /// Table id this kind is filtered on.
    pub fn table_id(self) -> u8 {
        match self {
            TableKind::Pat => crate::constants::PAT_TABLE_ID,
            TableKind::Pmt => crate::constants::PMT_TABLE_ID,
            TableKind::Tdt => crate::constants::TDT_TABLE_ID,
            TableKind::Tot => crate::constants::TOT_TABLE_ID,
        }
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TableKind::Pat => "PAT",
            TableKind::Pmt => "PMT",
            TableKind::Tdt => "TDT",
            TableKind::Tot => "TOT",
        };
        f.write_str(name)
    }
}

/// Phases of an acquisition session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum AcquisitionState {
    #[default]
    Idle,
    TunerLocking,
    AwaitingPat,
    AwaitingPmt,
    StreamsBound,
    AwaitingTdt,
    AwaitingTot,
    TimeResolved,
    /// Resources released; the session is over.
    TornDown,
}

impl fmt::Display for AcquisitionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            AcquisitionState::Idle => "idle",
            AcquisitionState::TunerLocking => "waiting for tuner lock",
            AcquisitionState::AwaitingPat => "waiting for PAT",
            AcquisitionState::AwaitingPmt => "waiting for PMT",
            AcquisitionState::StreamsBound => "streams bound",
            AcquisitionState::AwaitingTdt => "waiting for TDT",
            AcquisitionState::AwaitingTot => "waiting for TOT",
            AcquisitionState::TimeResolved => "time resolved",
            AcquisitionState::TornDown => "torn down",
        };
        f.write_str(text)
    }
}

/// Delivery system the tuner is asked to lock on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TunerStandard {
    #[default]
    DvbT,
    DvbT2,
    DvbC,
}

/// Status reported by the tuner's lock callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockStatus {
    Locked,
    NotLocked,
}

/// Codec handed to the player when a stream is created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StreamCodec {
    Mpeg2Video,
    H264Video,
    MpegAudio,
}

impl StreamCodec {
    /// Player codec for a PMT stream type, if it is one we play.
    pub fn from_stream_type(stream_type: u8) -> Option<Self> {
        match stream_type {
            0x01 | 0x02 => Some(StreamCodec::Mpeg2Video),
            0x1B => Some(StreamCodec::H264Video),
            0x03 | 0x04 => Some(StreamCodec::MpegAudio),
            _ => None,
        }
    }
}

/// Opaque demux filter handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FilterHandle(pub u32);

/// Opaque player stream handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamHandle(pub u32);

/// Channel change requests raised by the application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelRequest {
    Up,
    Down,
    /// Direct entry of a PAT service index (1-based, index 0 is reserved).
    Direct(usize),
}

/// Snapshot of the currently bound channel (public API)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChannelInfo {
    pub program_number: u16,
    /// `None` when the PMT carries no playable audio stream.
    pub audio_pid: Option<u16>,
    /// `None` when the PMT carries no playable video stream.
    pub video_pid: Option<u16>,
}

/// Local wall-clock time resolved from TDT + TOT
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedTime {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
    /// Monotonic instant at which the TDT arrived.
    pub captured_at: Instant,
}

impl ResolvedTime {
    pub fn from_local(local: NaiveDateTime, captured_at: Instant) -> Self {
        use chrono::{Datelike, Timelike};
        Self {
            year: local.year(),
            month: local.month(),
            day: local.day(),
            hours: local.hour(),
            minutes: local.minute(),
            seconds: local.second(),
            captured_at,
        }
    }

    /// Local date-time at the moment of capture.
    pub fn local(&self) -> Option<NaiveDateTime> {
        let date = NaiveDate::from_ymd_opt(self.year, self.month, self.day)?;
        let time = NaiveTime::from_hms_opt(self.hours, self.minutes, self.seconds)?;
        Some(NaiveDateTime::new(date, time))
    }

    /// Local date-time now, extrapolated from the capture instant.
    pub fn now(&self) -> Option<NaiveDateTime> {
        self.at(Instant::now())
    }

    pub fn at(&self, instant: Instant) -> Option<NaiveDateTime> {
        let elapsed = instant.saturating_duration_since(self.captured_at);
        let elapsed = ChronoDuration::from_std(elapsed).ok()?;
        self.local()?.checked_add_signed(elapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn resolved_time_extrapolates_from_capture() {
        let captured_at = Instant::now();
        let local = NaiveDate::from_ymd_opt(2009, 9, 23)
            .unwrap()
            .and_hms_opt(23, 59, 30)
            .unwrap();
        let rt = ResolvedTime::from_local(local, captured_at);

        assert_eq!((rt.hours, rt.minutes, rt.seconds), (23, 59, 30));
        let later = rt.at(captured_at + Duration::from_secs(45)).unwrap();
        assert_eq!(
            later,
            NaiveDate::from_ymd_opt(2009, 9, 24).unwrap().and_hms_opt(0, 0, 15).unwrap()
        );
    }

    #[test]
    fn table_kind_round_trips_through_table_id() {
        for kind in [TableKind::Pat, TableKind::Pmt, TableKind::Tdt, TableKind::Tot] {
            assert_eq!(TableKind::from_table_id(kind.table_id()), Some(kind));
        }
        assert_eq!(TableKind::from_table_id(0x42), None);
    }

    #[test]
    fn codec_mapping_covers_selected_types() {
        assert_eq!(StreamCodec::from_stream_type(0x02), Some(StreamCodec::Mpeg2Video));
        assert_eq!(StreamCodec::from_stream_type(0x1B), Some(StreamCodec::H264Video));
        assert_eq!(StreamCodec::from_stream_type(0x04), Some(StreamCodec::MpegAudio));
        assert_eq!(StreamCodec::from_stream_type(0x0F), None);
    }
}
