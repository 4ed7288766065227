//! Persisted representation of the AOP satellite table.
//!
//! The same fixed-size record codec backs the persisted pass-predict blob
//! and the PASPW upload: `u32` version code, one count byte, then up to
//! [`MAX_AOP_SATELLITE_ENTRIES`] records of [`AOP_RECORD_SIZE`] bytes each,
//! little-endian scalars.

use crate::constants::{MAX_AOP_SATELLITE_ENTRIES, PASS_PREDICT_VERSION_CODE};
use crate::prepass::{AopSatelliteEntry, DownlinkStatus, PassPredict, UplinkStatus};
use crate::timeutil::CalendarTime;

/// Serialized size of one AOP record.
pub const AOP_RECORD_SIZE: usize = 35;

pub fn encode_record(entry: &AopSatelliteEntry, out: &mut Vec<u8>) {
    out.push(entry.sat_hex_id);
    out.push(entry.dcs_address);
    out.push(entry.downlink_status as u8);
    out.push(entry.uplink_status as u8);
    out.extend_from_slice(&entry.bulletin.year.to_le_bytes());
    out.push(entry.bulletin.month);
    out.push(entry.bulletin.day);
    out.push(entry.bulletin.hour);
    out.push(entry.bulletin.min);
    out.push(entry.bulletin.sec);
    out.extend_from_slice(&entry.semi_major_axis_km.to_le_bytes());
    out.extend_from_slice(&entry.inclination_deg.to_le_bytes());
    out.extend_from_slice(&entry.ascending_node_deg.to_le_bytes());
    out.extend_from_slice(&entry.ascending_node_drift_deg.to_le_bytes());
    out.extend_from_slice(&entry.orbit_period_min.to_le_bytes());
    out.extend_from_slice(&entry.drift_sma_m_per_day.to_le_bytes());
}

pub fn decode_record(buf: &[u8]) -> Option<AopSatelliteEntry> {
    if buf.len() < AOP_RECORD_SIZE {
        return None;
    }
    let f32_at = |pos: usize| {
        let mut b = [0u8; 4];
        b.copy_from_slice(&buf[pos..pos + 4]);
        f32::from_le_bytes(b)
    };
    Some(AopSatelliteEntry {
        sat_hex_id: buf[0] & 0x3F,
        dcs_address: buf[1],
        downlink_status: DownlinkStatus::from_u8(buf[2])?,
        uplink_status: UplinkStatus::from_u8(buf[3])?,
        bulletin: CalendarTime {
            year: u16::from_le_bytes([buf[4], buf[5]]),
            month: buf[6],
            day: buf[7],
            hour: buf[8],
            min: buf[9],
            sec: buf[10],
        },
        semi_major_axis_km: f32_at(11),
        inclination_deg: f32_at(15),
        ascending_node_deg: f32_at(19),
        ascending_node_drift_deg: f32_at(23),
        orbit_period_min: f32_at(27),
        drift_sma_m_per_day: f32_at(31),
    })
}

/// Serialize the table with its version header.
pub fn encode_pass_predict(pp: &PassPredict) -> Vec<u8> {
    let mut out = Vec::with_capacity(5 + pp.records.len() * AOP_RECORD_SIZE);
    out.extend_from_slice(&PASS_PREDICT_VERSION_CODE.to_le_bytes());
    out.push(pp.records.len() as u8);
    for record in &pp.records {
        encode_record(record, &mut out);
    }
    out
}

/// Deserialize a versioned table blob; `None` on version mismatch or a
/// malformed record.
pub fn decode_pass_predict(blob: &[u8]) -> Option<PassPredict> {
    if blob.len() < 5 {
        return None;
    }
    let version = u32::from_le_bytes([blob[0], blob[1], blob[2], blob[3]]);
    if version != PASS_PREDICT_VERSION_CODE {
        return None;
    }
    let count = blob[4] as usize;
    if count > MAX_AOP_SATELLITE_ENTRIES || blob.len() < 5 + count * AOP_RECORD_SIZE {
        return None;
    }
    let mut pp = PassPredict::new();
    for i in 0..count {
        let offset = 5 + i * AOP_RECORD_SIZE;
        pp.push(decode_record(&blob[offset..offset + AOP_RECORD_SIZE])?);
    }
    Some(pp)
}

/// Decode a bare record stream with no version header (PASPW payload).
pub fn decode_record_stream(blob: &[u8]) -> Option<PassPredict> {
    if blob.is_empty() || blob.len() % AOP_RECORD_SIZE != 0 {
        return None;
    }
    let count = blob.len() / AOP_RECORD_SIZE;
    if count > MAX_AOP_SATELLITE_ENTRIES {
        return None;
    }
    let mut pp = PassPredict::new();
    for i in 0..count {
        let offset = i * AOP_RECORD_SIZE;
        pp.push(decode_record(&blob[offset..offset + AOP_RECORD_SIZE])?);
    }
    Some(pp)
}

/// Factory-seeded constellation table.
pub fn default_pass_predict() -> PassPredict {
    let entry = |hex_id: u8,
                 dl: DownlinkStatus,
                 ul: UplinkStatus,
                 bulletin: CalendarTime,
                 sma: f32,
                 incl: f32,
                 node: f32,
                 node_drift: f32,
                 period: f32,
                 sma_drift: f32| AopSatelliteEntry {
        sat_hex_id: hex_id,
        dcs_address: 4,
        downlink_status: dl,
        uplink_status: ul,
        bulletin,
        semi_major_axis_km: sma,
        inclination_deg: incl,
        ascending_node_deg: node,
        ascending_node_drift_deg: node_drift,
        orbit_period_min: period,
        drift_sma_m_per_day: sma_drift,
    };
    let t = CalendarTime::new;
    let mut pp = PassPredict::new();
    let seed = [
        entry(
            0x5,
            DownlinkStatus::Off,
            UplinkStatus::WithA2,
            t(2021, 10, 7, 23, 29, 36),
            7180.188965,
            98.6735,
            299.226013,
            -25.257999,
            101.033997,
            -0.2,
        ),
        entry(
            0x6,
            DownlinkStatus::Off,
            UplinkStatus::WithNeo,
            t(2021, 10, 7, 22, 41, 14),
            6890.464844,
            97.4673,
            105.709999,
            -23.747999,
            94.994003,
            -3.7,
        ),
        entry(
            0x8,
            DownlinkStatus::Off,
            UplinkStatus::WithA2,
            t(2021, 10, 7, 23, 50, 59),
            7225.683105,
            98.983597,
            331.656006,
            -25.497,
            101.992996,
            -0.9,
        ),
        entry(
            0x9,
            DownlinkStatus::Off,
            UplinkStatus::WithA3,
            t(2021, 10, 7, 22, 6, 6),
            7195.641113,
            98.7034,
            351.213989,
            -25.34,
            101.360001,
            0.0,
        ),
        entry(
            0xA,
            DownlinkStatus::WithA3,
            UplinkStatus::WithA3,
            t(2021, 10, 7, 22, 30, 43),
            7195.528809,
            98.460403,
            321.19101,
            -25.341,
            101.358002,
            0.0,
        ),
        entry(
            0xB,
            DownlinkStatus::WithA3,
            UplinkStatus::WithA3,
            t(2021, 10, 7, 22, 58, 33),
            7195.604004,
            98.723099,
            338.070007,
            -25.34,
            101.359001,
            0.0,
        ),
        entry(
            0xC,
            DownlinkStatus::Off,
            UplinkStatus::WithA3,
            t(2021, 10, 7, 23, 13, 37),
            7226.172852,
            99.176498,
            299.210999,
            -25.497999,
            102.002998,
            -0.6,
        ),
        entry(
            0xD,
            DownlinkStatus::WithA3,
            UplinkStatus::WithA3,
            t(2021, 10, 7, 22, 48, 2),
            7160.121094,
            98.544098,
            106.515999,
            -25.153,
            100.612,
            -0.2,
        ),
    ];
    for record in seed {
        pp.push(record);
    }
    pp
}
