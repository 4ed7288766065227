//! Interfaces to the external collaborators the engine is wired to.
//!
//! The engine never talks to hardware directly: ports implement these traits
//! and feed asynchronous device notifications through the shared
//! [`DeviceEventQueue`], which the run loop drains in order. Heavy work is
//! never performed by the producer side.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::config::params::{ArgosModulation, ArgosPower, GnssDynModel, GnssFixMode};
use crate::error::{DeviceError, FilesystemError};
use crate::logging::LogRecord;

/// Monotonic millisecond counter backing the cooperative scheduler.
pub trait Timer {
    fn counter_ms(&self) -> u64;
}

/// Battery-backed wall clock, epoch seconds.
pub trait Rtc {
    fn now(&self) -> i64;
    fn set(&mut self, epoch: i64);
    fn is_set(&self) -> bool;
}

/// Fuel gauge / ADC reading of the battery.
pub trait BatteryGauge {
    fn voltage_mv(&mut self) -> u16;
    fn level_percent(&mut self) -> u8;
}

/// Navigation settings handed to the GNSS receiver at power-on. The receiver
/// owns the acquisition timeout and the HDOP/HACC/min-fix filtering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NavSettings {
    pub fix_mode: GnssFixMode,
    pub dyn_model: GnssDynModel,
    pub assistnow_enable: bool,
    pub assistnow_offline_enable: bool,
    pub hdop_filter_enable: bool,
    pub hdop_filter_threshold: u32,
    pub hacc_filter_enable: bool,
    pub hacc_filter_threshold: u32,
    pub num_consecutive_fixes: u32,
    pub sat_tracking: bool,
    pub acquisition_timeout_ms: u32,
}

/// Position/velocity/time solution delivered by the receiver once its
/// filters are satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PvtSolution {
    pub itow: u32,
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub min: u8,
    pub sec: u8,
    pub valid: bool,
    pub fix_type: u8,
    pub flags: u8,
    pub flags2: u8,
    pub flags3: u8,
    pub num_sv: u8,
    pub lon: f64,
    pub lat: f64,
    /// Height above ellipsoid, mm.
    pub height: i32,
    /// Height above mean sea level, mm.
    pub h_msl: i32,
    pub h_acc: u32,
    pub v_acc: u32,
    pub vel_n: i32,
    pub vel_e: i32,
    pub vel_d: i32,
    /// Ground speed, mm/s.
    pub g_speed: i32,
    pub head_mot: f32,
    pub s_acc: u32,
    pub head_acc: f32,
    pub p_dop: f32,
    pub v_dop: f32,
    pub h_dop: f32,
    pub head_veh: f32,
    /// Time to first fix, ms.
    pub ttff: u32,
}

/// Asynchronous notifications from the GNSS receiver.
#[derive(Debug, Clone, PartialEq)]
pub enum GnssEvent {
    PowerOn,
    PowerOff { fix_found: bool, signal_found: bool },
    Pvt(PvtSolution),
    Error,
    SignalAvailable,
    MaxSatSamples,
    SatReport { num_svs: u8, best_signal_quality: u8 },
}

/// GNSS receiver control surface.
pub trait GnssDevice {
    fn power_on(&mut self, settings: &NavSettings) -> Result<(), DeviceError>;
    fn power_off(&mut self);
}

/// Asynchronous notifications from the Argos transceiver.
#[derive(Debug, Clone, PartialEq)]
pub enum ArticEvent {
    TxStarted,
    TxComplete,
    RxPacket { data: Vec<u8>, total_bits: usize },
    RxTimeout,
    DeviceError,
    /// Transceiver powered itself down; carries the receive-on time of the
    /// session for the RX-time counter.
    PowerOff { rx_time_on_ms: u64 },
}

/// Half-duplex Argos transceiver control surface.
pub trait ArticDevice {
    fn set_frequency(&mut self, mhz: f64);
    fn set_tx_power(&mut self, power: ArgosPower);
    fn set_tcxo_warmup_time(&mut self, seconds: u32);
    fn set_device_identifier(&mut self, id: u32);
    fn set_idle_timeout(&mut self, ms: u32);
    fn send(&mut self, mode: ArgosModulation, packet: &[u8], total_bits: usize)
        -> Result<(), DeviceError>;
    fn stop_send(&mut self);
    fn start_receive(&mut self, mode: ArgosModulation) -> Result<(), DeviceError>;
    fn stop_receive(&mut self);
}

/// Append-only ring of fixed-size log records.
pub trait Logger {
    fn name(&self) -> &str;
    fn create(&mut self) -> Result<(), FilesystemError>;
    fn truncate(&mut self) -> Result<(), FilesystemError>;
    fn write(&mut self, record: &LogRecord) -> Result<(), FilesystemError>;
    fn read(&mut self, index: usize) -> Result<LogRecord, FilesystemError>;
    fn num_entries(&mut self) -> usize;
}

/// Backing filesystem for the loggers and the persisted configuration.
pub trait Filesystem {
    fn mount(&mut self) -> Result<(), FilesystemError>;
    fn umount(&mut self) -> Result<(), FilesystemError>;
    fn format(&mut self) -> Result<(), FilesystemError>;
}

/// Persistence hook for the configuration store blobs.
pub trait ConfigPersistence {
    fn load_params(&mut self) -> Option<Vec<u8>>;
    fn save_params(&mut self, blob: &[u8]) -> Result<(), FilesystemError>;
    fn load_pass_predict(&mut self) -> Option<Vec<u8>>;
    fn save_pass_predict(&mut self, blob: &[u8]) -> Result<(), FilesystemError>;
}

/// Local control-protocol transport (BLE serial bridge or debug UART).
pub trait ControlTransport {
    fn start(&mut self);
    fn stop(&mut self);
    fn write(&mut self, line: &str);
    fn read_line(&mut self) -> Option<String>;
}

/// Raw physical-memory window for the DUMPM command.
pub trait MemoryAccess {
    fn read(&self, address: u32, length: usize) -> Result<Vec<u8>, DeviceError>;
}

/// Calibration back-end for SCALW/SCALR.
pub trait CalibrationRegistry {
    fn calibration_write(&mut self, device: &str, offset: u32, value: f64)
        -> Result<(), DeviceError>;
    fn calibration_read(&mut self, device: &str, offset: u32) -> Result<f64, DeviceError>;
}

/// Wireless-charger status probe for the dynamic charger parameter.
pub trait WirelessCharger {
    fn chip_status(&mut self) -> Option<String>;
}

/// Multi-channel auxiliary sensor (pH, CDT, pressure, ...).
pub trait Sensor {
    fn read(&mut self, channel: usize) -> Result<f64, DeviceError>;
}

/// Raw wet/dry reading for the underwater detector; `threshold` carries the
/// source-specific activation threshold (bar for pressure, clamped SNR for
/// the GNSS source, ignored by the saltwater switch).
pub trait WetnessSensor {
    fn is_wet(&mut self, threshold: f64) -> Result<bool, DeviceError>;
}

/// Auxiliary sensor identity, used for registry lookup by the sensor
/// services and the live-value parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorKind {
    Ph,
    SeaTemp,
    Als,
    Cdt,
    Pressure,
    Axl,
}

impl SensorKind {
    /// Calibration device name used by the control protocol.
    pub fn device_name(self) -> &'static str {
        match self {
            SensorKind::Ph => "PH",
            SensorKind::SeaTemp => "RTD",
            SensorKind::Als => "ALS",
            SensorKind::Cdt => "CDT",
            SensorKind::Pressure => "PRS",
            SensorKind::Axl => "AXL",
        }
    }
}

/// Registry of fitted sensors, shared between the sensor services and the
/// configuration store's live-value parameters.
#[derive(Clone, Default)]
pub struct SensorHub {
    inner: Rc<RefCell<std::collections::HashMap<SensorKind, Rc<RefCell<dyn Sensor>>>>>,
}

impl SensorHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, kind: SensorKind, sensor: Rc<RefCell<dyn Sensor>>) {
        self.inner.borrow_mut().insert(kind, sensor);
    }

    pub fn contains(&self, kind: SensorKind) -> bool {
        self.inner.borrow().contains_key(&kind)
    }

    pub fn read(&self, kind: SensorKind, channel: usize) -> Result<f64, DeviceError> {
        let sensor = self
            .inner
            .borrow()
            .get(&kind)
            .cloned()
            .ok_or(DeviceError::Unavailable)?;
        let value = sensor.borrow_mut().read(channel);
        value
    }
}

/// Reed-switch gestures recognised by the external gesture recogniser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReedGesture {
    Swipe,
    ShortHold,
    LongHold,
}

/// Notification routed through the run loop.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    Gnss(GnssEvent),
    Artic(ArticEvent),
    Reed(ReedGesture),
}

/// Shared queue that ports push device notifications into. Producers only
/// enqueue; all processing happens in the run loop.
#[derive(Clone, Default)]
pub struct DeviceEventQueue {
    inner: Rc<RefCell<VecDeque<DeviceEvent>>>,
}

impl DeviceEventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: DeviceEvent) {
        self.inner.borrow_mut().push_back(event);
    }

    pub fn pop(&self) -> Option<DeviceEvent> {
        self.inner.borrow_mut().pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().is_empty()
    }
}
