//! Error types for section parsing and channel acquisition.

use std::time::Duration;

use thiserror::Error;

use crate::types::{AcquisitionState, TableKind};

/// Errors raised while decoding a PSI/SI section.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The section is tagged with a table id other than the one expected.
    #[error("wrong table id: expected 0x{expected:02X}, found 0x{found:02X}")]
    WrongTableId { expected: u8, found: u8 },

    /// The buffer ends before a field the section declares.
    #[error("section truncated: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    /// More entries than the table's fixed capacity.
    #[error("{table} capacity of {capacity} entries exceeded")]
    CapacityExceeded { table: TableKind, capacity: usize },

    /// A bit field wider than the reader supports.
    #[error("invalid bit field width {0}")]
    InvalidWidth(u32),
}

/// Failures reported by the tuner, demux or player collaborators.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PortError {
    #[error("tuner failure: {0}")]
    Tuner(String),

    #[error("demux filter failure: {0}")]
    Filter(String),

    #[error("player source failure: {0}")]
    Source(String),

    #[error("player stream failure: {0}")]
    Stream(String),
}

/// Fatal outcomes of an acquisition session. Every variant ends in teardown.
#[derive(Error, Debug)]
pub enum AcquisitionError {
    /// A wait phase ran out of time.
    #[error("timed out after {after:?} while {phase}")]
    Timeout {
        phase: AcquisitionState,
        after: Duration,
    },

    /// A hardware call failed.
    #[error(transparent)]
    Port(#[from] PortError),

    /// The PAT lists no service besides the reserved entry.
    #[error("PAT carries no selectable service")]
    NoServices,

    /// Every handle to the signal queue was dropped.
    #[error("signal queue closed")]
    QueueClosed,

    /// The coordinator task panicked or was aborted.
    #[error("coordinator task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T, E = ParseError> = std::result::Result<T, E>;
