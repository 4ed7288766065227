//! Argos uplink frame builders.
//!
//! Three GNSS-bearing formats exist: the short frame (one position), the
//! long frame (up to four positions) and the Doppler-only frame. All are
//! bit-packed LSB-first, carry their CRC-8 in byte 0 and, except for the
//! Doppler frame, end in a BCH parity trailer. Certification frames carry a
//! raw operator payload.

use tracing::{trace, warn};

use crate::codec::bch;
use crate::codec::bitpack::BitWriter;
use crate::codec::crc8;
use crate::codec::hex;
use crate::config::params::DeltaTimeLoc;
use crate::constants::{
    DOPPLER_PACKET_BITS, DOPPLER_PACKET_BYTES, DOPPLER_PACKET_PAYLOAD_BITS, LONG_PACKET_BITS,
    LONG_PACKET_BYTES, LONG_PACKET_PAYLOAD_BITS, MAX_GPS_ENTRIES_IN_PACKET, SHORT_PACKET_BITS,
    SHORT_PACKET_BYTES, SHORT_PACKET_PAYLOAD_BITS,
};
use crate::error::ProtocolError;
use crate::logging::GpsLogEntry;
use crate::timeutil::CalendarTime;

const LON_LAT_RESOLUTION: f64 = 10000.0;
const MV_PER_UNIT: u32 = 20;
const REF_BATT_MV: u32 = 2700;
const DEGREES_PER_UNIT: f64 = 1.0 / 1.42;
const METRES_PER_UNIT: i32 = 40;
const MM_PER_METER: i32 = 1000;
const MIN_ALTITUDE: i32 = 0;
const MAX_ALTITUDE: i32 = 254;
const INVALID_ALTITUDE: u32 = 255;
const FIXTYPE_3D: u8 = 3;

pub struct ArgosPacketBuilder;

impl ArgosPacketBuilder {
    /// Latitude in degrees to 21-bit field: |value| x 10000 with the sign in
    /// bit 20.
    pub fn convert_latitude(x: f64) -> u32 {
        if x >= 0.0 {
            (x * LON_LAT_RESOLUTION) as u32
        } else {
            (((x - 0.00005) * -LON_LAT_RESOLUTION) as u32) | 1 << 20
        }
    }

    /// Longitude in degrees to 22-bit field: sign in bit 21.
    pub fn convert_longitude(x: f64) -> u32 {
        if x >= 0.0 {
            (x * LON_LAT_RESOLUTION) as u32
        } else {
            (((x - 0.00005) * -LON_LAT_RESOLUTION) as u32) | 1 << 21
        }
    }

    /// Ground speed in mm/s to the 7-bit field (2 km/h units).
    pub fn convert_speed(g_speed_mm_s: i32) -> u32 {
        let mm_s = g_speed_mm_s.max(0) as u64;
        ((3600 * mm_s) / 2_000_000) as u32
    }

    /// Heading in degrees to the 8-bit field (1.42 degree units).
    pub fn convert_heading(deg: f64) -> u32 {
        (deg * DEGREES_PER_UNIT) as u32
    }

    /// Height above MSL in mm to the 8-bit field (40 m units, clamped).
    pub fn convert_altitude(h_msl_mm: i32) -> u32 {
        let altitude = h_msl_mm / (MM_PER_METER * METRES_PER_UNIT);
        if altitude > MAX_ALTITUDE {
            warn!(altitude, "altitude exceeds maximum, truncating");
        }
        altitude.clamp(MIN_ALTITUDE, MAX_ALTITUDE) as u32
    }

    /// Battery voltage in mV to the 7-bit field (20 mV units above 2.7 V).
    pub fn convert_battery_voltage(battery_mv: u32) -> u32 {
        (battery_mv.saturating_sub(REF_BATT_MV) / MV_PER_UNIT).min(127)
    }

    /// Build the 15-byte short frame from a single entry.
    pub fn build_short_packet(
        entry: &GpsLogEntry,
        is_out_of_zone: bool,
        is_low_battery: bool,
    ) -> Vec<u8> {
        let mut packet = vec![0u8; SHORT_PACKET_BYTES];
        let mut w = BitWriter::new(&mut packet);

        w.put(0, 8); // CRC placeholder, filled last

        let t = CalendarTime::from_epoch(entry.info.sched_time);
        w.put(u32::from(t.day), 5);
        w.put(u32::from(t.hour), 5);
        w.put(u32::from(t.min), 6);

        if entry.info.valid {
            let lat = Self::convert_latitude(entry.info.lat);
            let lon = Self::convert_longitude(entry.info.lon);
            let speed = Self::convert_speed(entry.info.g_speed);
            trace!(lat, lon, speed, "short packet position");
            w.put(lat, 21);
            w.put(lon, 22);
            w.put(speed, 7);
            w.put(u32::from(is_out_of_zone), 1);
            w.put(Self::convert_heading(f64::from(entry.info.head_mot)), 8);
            if entry.info.fix_type == FIXTYPE_3D {
                w.put(Self::convert_altitude(entry.info.h_msl), 8);
            } else {
                warn!("altitude not available without 3D fix");
                w.put(INVALID_ALTITUDE, 8);
            }
        } else {
            w.put(0xFFFF_FFFF, 21);
            w.put(0xFFFF_FFFF, 22);
            w.put(0xFF, 7);
            w.put(u32::from(is_out_of_zone), 1);
            w.put(0xFF, 8);
            w.put(0xFF, 8);
        }

        let batt = Self::convert_battery_voltage(u32::from(entry.info.batt_voltage));
        w.put(batt, 7);
        w.put(u32::from(is_low_battery), 1);

        Self::seal(&mut packet, SHORT_PACKET_PAYLOAD_BITS, bch::B127_106_3);
        packet
    }

    /// Build the 31-byte long frame from up to four entries, most recent
    /// first. Missing or invalid trailing entries pack as sentinels.
    pub fn build_long_packet(
        entries: &[GpsLogEntry],
        is_out_of_zone: bool,
        is_low_battery: bool,
        delta_time_loc: DeltaTimeLoc,
    ) -> Vec<u8> {
        debug_assert!(entries.len() >= 2);
        let mut packet = vec![0u8; LONG_PACKET_BYTES];
        let mut w = BitWriter::new(&mut packet);

        w.put(0, 8); // CRC placeholder, filled last

        let t = CalendarTime::from_epoch(entries[0].info.sched_time);
        w.put(u32::from(t.day), 5);
        w.put(u32::from(t.hour), 5);
        w.put(u32::from(t.min), 6);

        if entries[0].info.valid {
            w.put(Self::convert_latitude(entries[0].info.lat), 21);
            w.put(Self::convert_longitude(entries[0].info.lon), 22);
            w.put(Self::convert_speed(entries[0].info.g_speed), 7);
        } else {
            w.put(0xFFFF_FFFF, 21);
            w.put(0xFFFF_FFFF, 22);
            w.put(0xFF, 7);
        }

        w.put(u32::from(is_out_of_zone), 1);
        let batt = Self::convert_battery_voltage(u32::from(entries[0].info.batt_voltage));
        w.put(batt, 7);
        w.put(u32::from(is_low_battery), 1);
        w.put(delta_time_loc as u32, 4);

        for i in 1..MAX_GPS_ENTRIES_IN_PACKET {
            match entries.get(i) {
                Some(e) if e.info.valid => {
                    w.put(Self::convert_latitude(e.info.lat), 21);
                    w.put(Self::convert_longitude(e.info.lon), 22);
                },
                _ => {
                    w.put(0xFFFF_FFFF, 21);
                    w.put(0xFFFF_FFFF, 22);
                },
            }
        }

        Self::seal(&mut packet, LONG_PACKET_PAYLOAD_BITS, bch::B255_223_4);
        packet
    }

    /// Pick the short or long format for a depth-pile selection.
    pub fn build_gnss_packet(
        entries: &[GpsLogEntry],
        is_out_of_zone: bool,
        is_low_battery: bool,
        delta_time_loc: DeltaTimeLoc,
    ) -> (Vec<u8>, usize) {
        if entries.len() > 1 {
            (
                Self::build_long_packet(entries, is_out_of_zone, is_low_battery, delta_time_loc),
                LONG_PACKET_BITS,
            )
        } else {
            (
                Self::build_short_packet(&entries[0], is_out_of_zone, is_low_battery),
                SHORT_PACKET_BITS,
            )
        }
    }

    /// Build the 3-byte Doppler-only frame.
    pub fn build_doppler_packet(battery_mv: u32, is_low_battery: bool) -> (Vec<u8>, usize) {
        let mut packet = vec![0u8; DOPPLER_PACKET_BYTES];
        let mut w = BitWriter::new(&mut packet);

        w.put(0, 8); // CRC placeholder, filled last
        w.put(0, 8); // Last-known-position index
        w.put(Self::convert_battery_voltage(battery_mv), 7);
        w.put(u32::from(is_low_battery), 1);

        let crc = crc8::checksum(&packet[1..], DOPPLER_PACKET_PAYLOAD_BITS - 8);
        packet[0] = crc;
        (packet, DOPPLER_PACKET_BITS)
    }

    /// Build a certification frame from an ASCII-hex payload: padded to the
    /// short frame when it fits, else to the long frame.
    pub fn build_certification_packet(payload_hex: &str) -> Result<(Vec<u8>, usize), ProtocolError> {
        let mut packet = hex::unhexlify(payload_hex)?;
        trace!(bytes = packet.len(), "certification payload");
        if packet.len() > SHORT_PACKET_BYTES {
            packet.resize(LONG_PACKET_BYTES, 0);
            Ok((packet, LONG_PACKET_BITS))
        } else {
            packet.resize(SHORT_PACKET_BYTES, 0);
            Ok((packet, SHORT_PACKET_BITS))
        }
    }

    /// Fill byte 0 with the payload CRC and append the BCH trailer.
    fn seal(packet: &mut [u8], payload_bits: usize, poly: &[u8]) {
        let crc = crc8::checksum(&packet[1..], payload_bits - 8);
        packet[0] = crc;
        let code_word = bch::encode(poly, packet, payload_bits);
        trace!(crc, code_word, "sealed packet");
        crate::codec::bitpack::pack_bits(packet, code_word, payload_bits, poly.len() - 1);
    }
}
