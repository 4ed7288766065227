//! Frame geometry and engine limits.

/// Short uplink frame: 15 bytes on air.
pub const SHORT_PACKET_BYTES: usize = 15;
/// Short uplink frame: 120 bits on air.
pub const SHORT_PACKET_BITS: usize = 120;
/// Short uplink payload covered by CRC/BCH.
pub const SHORT_PACKET_PAYLOAD_BITS: usize = 99;

/// Long uplink frame: 31 bytes on air.
pub const LONG_PACKET_BYTES: usize = 31;
/// Long uplink frame: 248 bits on air.
pub const LONG_PACKET_BITS: usize = 248;
/// Long uplink payload covered by CRC/BCH.
pub const LONG_PACKET_PAYLOAD_BITS: usize = 216;

/// Doppler-only frame: 3 bytes / 24 bits, CRC only.
pub const DOPPLER_PACKET_BYTES: usize = 3;
pub const DOPPLER_PACKET_BITS: usize = 24;
pub const DOPPLER_PACKET_PAYLOAD_BITS: usize = 24;

/// Most recent GNSS entries a long frame can carry.
pub const MAX_GPS_ENTRIES_IN_PACKET: usize = 4;

/// Depth pile upper bound.
pub const DEPTH_PILE_MAX: usize = 24;

/// AOP table upper bound.
pub const MAX_AOP_SATELLITE_ENTRIES: usize = 40;

/// Pending-task capacity of the cooperative scheduler.
pub const MAX_NUM_TASKS: usize = 48;

/// Fixed size of a persisted log record.
pub const MAX_LOG_SIZE: usize = 128;

/// TX jitter bound in milliseconds (uniform in +/- this value).
pub const TX_JITTER_MS: i64 = 5000;

/// Version code of the persisted parameter blob.
pub const CONFIG_VERSION_CODE: u32 = 0x1C07_E800 | 0x13;
/// Version code of the persisted pass-predict blob.
pub const PASS_PREDICT_VERSION_CODE: u32 = 0x1C07_E800 | 0x03;
