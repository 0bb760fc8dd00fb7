// src/lib.rs
//! Set-top-box channel acquisition: PAT/PMT/TDT/TOT section decoding plus the
//! coordinator that turns a tuned frequency into bound audio/video streams and
//! a resolved local time.

pub mod calendar;
pub mod config;
pub mod constants;
pub mod error;
pub mod ports;
pub mod processor;
pub mod psi;
pub mod report;
pub mod si_cache;
pub mod types;

pub use config::AcquisitionConfig;
pub use error::{AcquisitionError, ParseError, PortError};
pub use processor::{Coordinator, CoordinatorHandle, LockNotifier, SectionNotifier, Signal};
pub use si_cache::{Table, TableRegistry};
