//! Satellite pass prediction interface.
//!
//! Orbit propagation itself is an external collaborator: the engine hands a
//! [`PredictionConfig`] and the current AOP table to a [`PassPredictor`] and
//! consumes the passes it reports. Implementations bound their working set
//! by `pass_pool_capacity` and report exhaustion instead of truncating.

use crate::constants::MAX_AOP_SATELLITE_ENTRIES;
use crate::error::PrepassError;
use crate::timeutil::CalendarTime;

/// Downlink capability of a satellite.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[repr(u8)]
pub enum DownlinkStatus {
    #[default]
    Off = 0,
    WithA3 = 3,
    WithA4 = 4,
}

impl DownlinkStatus {
    pub fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0 => DownlinkStatus::Off,
            3 => DownlinkStatus::WithA3,
            4 => DownlinkStatus::WithA4,
            _ => return None,
        })
    }

    pub fn is_on(self) -> bool {
        self != DownlinkStatus::Off
    }
}

/// Uplink capability of a satellite.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[repr(u8)]
pub enum UplinkStatus {
    #[default]
    Off = 0,
    WithA2 = 2,
    WithA3 = 3,
    WithA4 = 4,
    WithNeo = 5,
}

impl UplinkStatus {
    pub fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0 => UplinkStatus::Off,
            2 => UplinkStatus::WithA2,
            3 => UplinkStatus::WithA3,
            4 => UplinkStatus::WithA4,
            5 => UplinkStatus::WithNeo,
            _ => return None,
        })
    }

    pub fn is_on(self) -> bool {
        self != UplinkStatus::Off
    }

    /// True when the pass supports the A3 modulation family or better.
    pub fn supports_a3(self) -> bool {
        self >= UplinkStatus::WithA3
    }
}

/// Adapted orbital parameters for one satellite.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AopSatelliteEntry {
    /// Satellite hex id, 0..=0x3F.
    pub sat_hex_id: u8,
    pub dcs_address: u8,
    pub downlink_status: DownlinkStatus,
    pub uplink_status: UplinkStatus,
    /// Bulletin epoch; an all-zero bulletin marks a status-only record.
    pub bulletin: CalendarTime,
    pub semi_major_axis_km: f32,
    pub inclination_deg: f32,
    pub ascending_node_deg: f32,
    pub ascending_node_drift_deg: f32,
    pub orbit_period_min: f32,
    pub drift_sma_m_per_day: f32,
}

impl AopSatelliteEntry {
    /// A record with a populated bulletin carries full orbit parameters.
    pub fn has_bulletin(&self) -> bool {
        self.bulletin.year != 0
    }
}

/// The satellite table consumed by the predictor, bounded to
/// [`MAX_AOP_SATELLITE_ENTRIES`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassPredict {
    pub records: Vec<AopSatelliteEntry>,
}

impl PassPredict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Append a record, dropping it when the table is full.
    pub fn push(&mut self, entry: AopSatelliteEntry) -> bool {
        if self.records.len() >= MAX_AOP_SATELLITE_ENTRIES {
            return false;
        }
        self.records.push(entry);
        true
    }

    pub fn find(&self, sat_hex_id: u8) -> Option<&AopSatelliteEntry> {
        self.records.iter().find(|r| r.sat_hex_id == sat_hex_id)
    }

    /// Most recent bulletin epoch over all operational satellites.
    pub fn newest_bulletin_epoch(&self) -> Option<i64> {
        self.records
            .iter()
            .filter(|r| r.has_bulletin())
            .filter_map(|r| r.bulletin.to_epoch())
            .max()
    }
}

/// One predicted visibility window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SatellitePass {
    pub sat_hex_id: u8,
    pub downlink_status: DownlinkStatus,
    pub uplink_status: UplinkStatus,
    /// Epoch seconds of the start of the window.
    pub epoch: i64,
    /// Window duration in seconds.
    pub duration_s: u32,
}

impl SatellitePass {
    pub fn end_epoch(&self) -> i64 {
        self.epoch + i64::from(self.duration_s)
    }
}

/// Search parameters handed to the predictor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictionConfig {
    pub latitude: f64,
    pub longitude: f64,
    pub start: CalendarTime,
    pub end: CalendarTime,
    /// Minimum pass elevation, degrees in [0, 90].
    pub min_elevation_deg: f64,
    /// Maximum pass elevation, degrees (>= min).
    pub max_elevation_deg: f64,
    /// Minimum pass duration, minutes.
    pub min_duration_min: f64,
    /// Maximum passes reported per satellite.
    pub max_passes: u32,
    /// Linear time margin, minutes per 6 months of bulletin age.
    pub linear_margin_min: f64,
    /// Computation step, seconds.
    pub computation_step_s: u32,
    /// Working-pool bound for candidate passes; implementations report
    /// [`PrepassError::PoolExhausted`] rather than truncating.
    pub pass_pool_capacity: usize,
}

/// Default working-pool bound.
pub const DEFAULT_PASS_POOL_CAPACITY: usize = 64;

/// External pass-prediction routine.
pub trait PassPredictor {
    /// Next pass after `config.start`, any capability.
    fn next_pass(
        &mut self,
        config: &PredictionConfig,
        aop: &[AopSatelliteEntry],
    ) -> Result<Option<SatellitePass>, PrepassError>;

    /// Next pass with at least the given downlink/uplink capability.
    fn next_pass_with_status(
        &mut self,
        config: &PredictionConfig,
        aop: &[AopSatelliteEntry],
        min_downlink: DownlinkStatus,
        min_uplink: UplinkStatus,
    ) -> Result<Option<SatellitePass>, PrepassError>;
}
