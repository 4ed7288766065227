//! Bit-level codecs shared by the Argos uplink/downlink paths.
//!
//! All Argos frames are packed at arbitrary bit offsets, so everything in
//! here works on bit spans rather than byte slices: the [`bitpack`] module
//! provides the LSB-first field packer, [`crc8`] and [`bch`] the integrity
//! codes that cover those spans, and [`hex`]/[`haversine`] the small
//! utilities used by the certification path and the zone geometry.

pub mod bch;
pub mod bitpack;
pub mod crc8;
pub mod haversine;
pub mod hex;
