//! Constants for PSI/SI section decoding and channel acquisition

/// Well-known PIDs
pub const PAT_PID: u16 = 0x0000;
pub const TDT_TOT_PID: u16 = 0x0014;

/// Table ids (ISO/IEC 13818-1, EN 300 468)
pub const PAT_TABLE_ID: u8 = 0x00;
pub const PMT_TABLE_ID: u8 = 0x02;
pub const TDT_TABLE_ID: u8 = 0x70;
pub const TOT_TABLE_ID: u8 = 0x73;

/// Descriptor tags
pub const LOCAL_TIME_OFFSET_DESCRIPTOR_TAG: u8 = 0x58;

/// Field masks
pub const PID_MASK: u16 = 0x1FFF;
pub const LENGTH_MASK: u16 = 0x0FFF;

/// Fixed layout sizes (bytes)
pub const PAT_HEADER_LEN: usize = 8;
pub const PAT_SERVICE_INFO_LEN: usize = 4;
pub const PMT_HEADER_LEN: usize = 12;
pub const PMT_ELEMENTARY_INFO_LEN: usize = 5;
pub const TDT_SECTION_LEN: usize = 8;
pub const TOT_HEADER_LEN: usize = 10;
pub const TOT_DESCRIPTOR_STRIDE: usize = 15;
pub const LTO_ENTRY_LEN: usize = 13;
pub const CRC_LEN: usize = 4;
/// Bytes before and including section_length, not counted by it.
pub const SECTION_PREFIX_LEN: usize = 3;

/// Fixed table capacities
pub const MAX_SERVICES_IN_PAT: usize = 20;
pub const MAX_ELEMENTARY_STREAMS_IN_PMT: usize = 20;
pub const MAX_LTO_ENTRIES: usize = 20;
pub const MAX_TOT_DESCRIPTORS: usize = 20;

/// Stream types selected for playback
pub const VIDEO_STREAM_TYPES: &[u8] = &[
    0x01, // MPEG-1 video
    0x02, // MPEG-2 video
    0x1B, // H.264 / AVC
];
pub const AUDIO_STREAM_TYPES: &[u8] = &[
    0x03, // MPEG-1 audio
    0x04, // MPEG-2 audio
];

/// PAT index 0 carries the network information entry and is never tuned.
pub const RESERVED_SERVICE_INDEX: usize = 0;

/// Acquisition defaults (milliseconds)
pub const DEFAULT_TUNER_LOCK_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_TABLE_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_TIME_TABLE_TIMEOUT_MS: u64 = 35_000; // TDT/TOT repeat at most every 30 s

/// Tuning defaults
pub const DEFAULT_FREQUENCY_HZ: u32 = 754_000_000;
pub const DEFAULT_BANDWIDTH_MHZ: u32 = 8;
