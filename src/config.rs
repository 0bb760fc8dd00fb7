//! Acquisition settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BANDWIDTH_MHZ, DEFAULT_FREQUENCY_HZ, DEFAULT_TABLE_TIMEOUT_MS,
    DEFAULT_TIME_TABLE_TIMEOUT_MS, DEFAULT_TUNER_LOCK_TIMEOUT_MS,
};
use crate::types::TunerStandard;

/// What to tune and how long each phase may wait.
///
/// Every key is optional in the TOML form:
///
/// ```toml
/// frequency_hz = 754000000
/// bandwidth_mhz = 8
/// standard = "DvbT"
/// initial_channel = 2
/// country_code = "SRB"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    pub frequency_hz: u32,
    pub bandwidth_mhz: u32,
    pub standard: TunerStandard,
    /// PAT service index bound first (index 0 is reserved).
    pub initial_channel: usize,
    pub tuner_lock_timeout_ms: u64,
    /// PAT and PMT waits.
    pub table_timeout_ms: u64,
    /// TDT and TOT waits.
    pub time_table_timeout_ms: u64,
    /// ISO 3166 alpha-3 code selecting the TOT offset entry.
    pub country_code: Option<String>,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            frequency_hz: DEFAULT_FREQUENCY_HZ,
            bandwidth_mhz: DEFAULT_BANDWIDTH_MHZ,
            standard: TunerStandard::default(),
            initial_channel: 1,
            tuner_lock_timeout_ms: DEFAULT_TUNER_LOCK_TIMEOUT_MS,
            table_timeout_ms: DEFAULT_TABLE_TIMEOUT_MS,
            time_table_timeout_ms: DEFAULT_TIME_TABLE_TIMEOUT_MS,
            country_code: None,
        }
    }
}

impl AcquisitionConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn tuner_lock_timeout(&self) -> Duration {
        Duration::from_millis(self.tuner_lock_timeout_ms)
    }

    pub fn table_timeout(&self) -> Duration {
        Duration::from_millis(self.table_timeout_ms)
    }

    pub fn time_table_timeout(&self) -> Duration {
        Duration::from_millis(self.time_table_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        assert_eq!(AcquisitionConfig::from_toml_str("").unwrap(), AcquisitionConfig::default());
    }

    #[test]
    fn partial_document_overrides_keys() {
        let cfg = AcquisitionConfig::from_toml_str(
            r#"
            frequency_hz = 818000000
            standard = "DvbT2"
            country_code = "SRB"
            table_timeout_ms = 250
            "#,
        )
        .unwrap();
        assert_eq!(cfg.frequency_hz, 818_000_000);
        assert_eq!(cfg.standard, TunerStandard::DvbT2);
        assert_eq!(cfg.country_code.as_deref(), Some("SRB"));
        assert_eq!(cfg.table_timeout(), Duration::from_millis(250));
        assert_eq!(cfg.tuner_lock_timeout(), Duration::from_secs(10));
        assert_eq!(cfg.initial_channel, 1);
    }

    #[test]
    fn wrong_types_are_rejected() {
        assert!(AcquisitionConfig::from_toml_str("bandwidth_mhz = \"eight\"").is_err());
    }
}
