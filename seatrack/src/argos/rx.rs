//! Downlink window management and AOP table maintenance.
//!
//! During a predicted pass with downlink capability the transceiver is put
//! into A3 receive mode; allcast packets accumulate per-satellite
//! orbit-parameter and constellation-status records until enough of the
//! constellation has been seen, at which point the merged table is
//! committed and the window closed.
//!
//! Allcast record stream layout (byte aligned, little-endian scalars):
//!   0x01 <hex_id> <dcs> <bulletin y16 mo d h mi s> <sma f32> <incl f32>
//!        <node f32> <node_drift f32> <period f32> <sma_drift f32>
//!   0x02 <hex_id> <downlink_status> <uplink_status>

use std::collections::HashMap;

use tracing::{debug, info, trace, warn};

use crate::config::params::ParamId;
use crate::config::ArgosConfig;
use crate::constants::MAX_AOP_SATELLITE_ENTRIES;
use crate::hal::ArticDevice;
use crate::prepass::{AopSatelliteEntry, DownlinkStatus, UplinkStatus};
use crate::service::SystemContext;
use crate::timeutil::CalendarTime;

const SECONDS_PER_DAY: i64 = 86_400;

/// Certification repetitions at or below this period keep the transceiver
/// powered between transmissions.
const CERT_TX_POWER_OFF_REPETITION_THRESHOLD: u32 = 15;

const ORBIT_PARAMS_RECORD: u8 = 0x01;
const ORBIT_PARAMS_LEN: usize = 34;
const CONSTELLATION_STATUS_RECORD: u8 = 0x02;
const CONSTELLATION_STATUS_LEN: usize = 4;

#[derive(Default)]
pub struct RxController {
    window: Option<(i64, i64)>,
    orbit_params: HashMap<u8, AopSatelliteEntry>,
    constellation_status: HashMap<u8, (DownlinkStatus, UplinkStatus)>,
}

impl RxController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.window = None;
        self.orbit_params.clear();
        self.constellation_status.clear();
    }

    pub fn window(&self) -> Option<(i64, i64)> {
        self.window
    }

    /// Arm a downlink window; an existing window is preserved.
    pub fn set_window(&mut self, start: i64, end: i64) {
        if self.window.is_none() {
            info!(start, end, "downlink RX window armed");
            self.window = Some((start, end));
        }
    }

    pub fn invalidate_window(&mut self) {
        self.window = None;
    }

    /// Gate chain deciding whether the receiver should be listening now.
    pub fn process(
        &mut self,
        sys: &mut SystemContext,
        artic: &mut dyn ArticDevice,
        config: &ArgosConfig,
        tx_pending: bool,
    ) {
        if config.cert_tx_enable {
            trace!("certification TX active");
            if config.cert_tx_repetition > CERT_TX_POWER_OFF_REPETITION_THRESHOLD {
                artic.stop_receive();
            }
            return;
        }

        if tx_pending {
            trace!("RX deferred while TX pending");
            return;
        }

        if !config.argos_rx_en {
            artic.stop_receive();
            return;
        }

        let Some((start, end)) = self.window else {
            trace!("no downlink window configured");
            artic.stop_receive();
            return;
        };

        let now = sys.current_time();
        if now >= end {
            info!("downlink window elapsed");
            self.window = None;
            artic.stop_receive();
            return;
        }

        let aop_fresh_until =
            config.last_aop_update + SECONDS_PER_DAY * i64::from(config.argos_rx_aop_update_period);
        if now < aop_fresh_until {
            trace!(aop_fresh_until, "AOP update not yet due");
            artic.stop_receive();
            return;
        }

        if now >= start {
            info!(secs = end - now, "receiver on for downlink window");
            if let Err(e) = artic.start_receive(crate::config::params::ArgosModulation::A3) {
                warn!(error = %e, "failed to enter receive mode");
            }
        }
    }

    /// Feed one received allcast packet; commits the AOP table once a full
    /// update has accumulated.
    pub fn handle_rx_packet(
        &mut self,
        sys: &mut SystemContext,
        artic: &mut dyn ArticDevice,
        config: &ArgosConfig,
        data: &[u8],
    ) {
        debug!(len = data.len(), "downlink packet");
        let _ = sys.config.increment_rx_counter();
        let _ = sys.config.save();

        let delta = self.decode(data);
        if !delta.is_empty() {
            self.update_pass_predict(sys, artic, config, &delta);
        }
    }

    /// Account receiver-on time reported by the transceiver at power-down.
    pub fn update_rx_time(&mut self, sys: &mut SystemContext, rx_time_on_ms: u64) {
        let secs = (rx_time_on_ms / 1000) as u32;
        if secs > 0 {
            trace!(secs, "accumulating RX on-time");
            let _ = sys.config.increment_rx_time(secs);
            let _ = sys.config.save();
        }
    }

    fn decode(&mut self, data: &[u8]) -> Vec<AopSatelliteEntry> {
        let mut pos = 0;
        while pos < data.len() {
            match data[pos] {
                ORBIT_PARAMS_RECORD if data.len() - pos >= ORBIT_PARAMS_LEN => {
                    let r = &data[pos..pos + ORBIT_PARAMS_LEN];
                    let f32_at = |at: usize| {
                        let mut b = [0u8; 4];
                        b.copy_from_slice(&r[at..at + 4]);
                        f32::from_le_bytes(b)
                    };
                    let entry = AopSatelliteEntry {
                        sat_hex_id: r[1] & 0x3F,
                        dcs_address: r[2],
                        downlink_status: DownlinkStatus::Off,
                        uplink_status: UplinkStatus::Off,
                        bulletin: CalendarTime {
                            year: u16::from_le_bytes([r[3], r[4]]),
                            month: r[5],
                            day: r[6],
                            hour: r[7],
                            min: r[8],
                            sec: r[9],
                        },
                        semi_major_axis_km: f32_at(10),
                        inclination_deg: f32_at(14),
                        ascending_node_deg: f32_at(18),
                        ascending_node_drift_deg: f32_at(22),
                        orbit_period_min: f32_at(26),
                        drift_sma_m_per_day: f32_at(30),
                    };
                    trace!(hex_id = entry.sat_hex_id, "orbit-parameter record");
                    self.orbit_params.insert(entry.sat_hex_id, entry);
                    pos += ORBIT_PARAMS_LEN;
                },
                CONSTELLATION_STATUS_RECORD if data.len() - pos >= CONSTELLATION_STATUS_LEN => {
                    let hex_id = data[pos + 1] & 0x3F;
                    let Some(dl) = DownlinkStatus::from_u8(data[pos + 2]) else {
                        warn!("bad downlink status in allcast record");
                        break;
                    };
                    let Some(ul) = UplinkStatus::from_u8(data[pos + 3]) else {
                        warn!("bad uplink status in allcast record");
                        break;
                    };
                    trace!(hex_id, ?dl, ?ul, "constellation-status record");
                    self.constellation_status.insert(hex_id, (dl, ul));
                    pos += CONSTELLATION_STATUS_LEN;
                },
                _ => {
                    warn!(marker = data[pos], "unrecognised allcast record");
                    break;
                },
            }
        }

        // A satellite contributes once both halves are present; a zeroed
        // status alone contributes a status-clear record
        let mut delta = Vec::new();
        for (&hex_id, &(dl, ul)) in &self.constellation_status {
            if let Some(orbit) = self.orbit_params.get(&hex_id) {
                let mut entry = *orbit;
                entry.downlink_status = dl;
                entry.uplink_status = ul;
                delta.push(entry);
            } else if !dl.is_on() && !ul.is_on() {
                delta.push(AopSatelliteEntry {
                    sat_hex_id: hex_id,
                    ..AopSatelliteEntry::default()
                });
            }
        }
        delta
    }

    /// Merge a decoded delta into the stored table; a full update commits
    /// the table, refreshes the AOP date and closes the window.
    fn update_pass_predict(
        &mut self,
        sys: &mut SystemContext,
        artic: &mut dyn ArticDevice,
        config: &ArgosConfig,
        delta: &[AopSatelliteEntry],
    ) {
        let mut existing = sys.config.read_pass_predict().clone();
        let mut num_updated = 0usize;

        for record in delta {
            let position = existing
                .records
                .iter()
                .position(|e| e.sat_hex_id == record.sat_hex_id);
            match position {
                Some(at) => {
                    let operational =
                        record.downlink_status.is_on() || record.uplink_status.is_on();
                    if operational && record.has_bulletin() {
                        existing.records[at] = *record;
                        num_updated += 1;
                    } else if !operational {
                        existing.records[at].downlink_status = record.downlink_status;
                        existing.records[at].uplink_status = record.uplink_status;
                        num_updated += 1;
                    }
                },
                None => {
                    if existing.records.len() < MAX_AOP_SATELLITE_ENTRIES {
                        let operational =
                            record.downlink_status.is_on() || record.uplink_status.is_on();
                        if operational && record.has_bulletin() {
                            existing.push(*record);
                            num_updated += 1;
                        }
                    }
                },
            }
        }

        debug!(
            received = num_updated,
            required = existing.len(),
            "AOP merge"
        );

        if num_updated == delta.len() && num_updated >= existing.len() {
            info!(records = num_updated, "committing AOP table");
            let now = sys.current_time();
            let _ = sys.config.write_pass_predict(existing);
            let _ = sys.config.write(ParamId::ArgosAopDate, now);
            let _ = sys.config.save();
            self.orbit_params.clear();
            self.constellation_status.clear();

            // Stop the session; the table is up to date
            self.window = None;
            self.process(sys, artic, config, false);
        }
    }
}

/// Encode one allcast orbit-parameter record (used by tests and the bench
/// tooling).
pub fn encode_orbit_params(entry: &AopSatelliteEntry, out: &mut Vec<u8>) {
    out.push(ORBIT_PARAMS_RECORD);
    out.push(entry.sat_hex_id);
    out.push(entry.dcs_address);
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

/// Encode one allcast constellation-status record.
pub fn encode_constellation_status(
    sat_hex_id: u8,
    downlink: DownlinkStatus,
    uplink: UplinkStatus,
    out: &mut Vec<u8>,
) {
    out.push(CONSTELLATION_STATUS_RECORD);
    out.push(sat_hex_id);
    out.push(downlink as u8);
    out.push(uplink as u8);
}
