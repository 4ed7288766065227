//! Shared fakes for unit and integration tests.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use crate::battery::BatteryMonitor;
use crate::config::params::{ArgosModulation, ArgosPower};
use crate::config::store::{ConfigStore, Dynamics};
use crate::error::{DeviceError, FilesystemError};
use crate::hal::{
    ArticDevice, ArticEvent, BatteryGauge, ConfigPersistence, ControlTransport, DeviceEvent,
    DeviceEventQueue, Filesystem, GnssDevice, Logger, NavSettings, Rtc, SensorHub, Timer,
    WetnessSensor,
};
use crate::logging::LogRecord;
use crate::sched::Scheduler;
use crate::service::{ServiceEvent, SystemContext};

pub struct FakeTimer {
    now: Cell<u64>,
}

impl FakeTimer {
    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }

    pub fn set(&self, ms: u64) {
        self.now.set(ms);
    }
}

impl Timer for FakeTimer {
    fn counter_ms(&self) -> u64 {
        self.now.get()
    }
}

pub struct FakeRtc {
    pub now: i64,
    pub valid: bool,
}

impl Rtc for FakeRtc {
    fn now(&self) -> i64 {
        self.now
    }

    fn set(&mut self, epoch: i64) {
        self.now = epoch;
        self.valid = true;
    }

    fn is_set(&self) -> bool {
        self.valid
    }
}

pub struct FakeGauge {
    pub voltage: u16,
    pub level: u8,
}

impl BatteryGauge for FakeGauge {
    fn voltage_mv(&mut self) -> u16 {
        self.voltage
    }

    fn level_percent(&mut self) -> u8 {
        self.level
    }
}

#[derive(Default)]
pub struct MemoryPersistence {
    pub params: Option<Vec<u8>>,
    pub pass_predict: Option<Vec<u8>>,
}

impl ConfigPersistence for MemoryPersistence {
    fn load_params(&mut self) -> Option<Vec<u8>> {
        self.params.clone()
    }

    fn save_params(&mut self, blob: &[u8]) -> Result<(), FilesystemError> {
        self.params = Some(blob.to_vec());
        Ok(())
    }

    fn load_pass_predict(&mut self) -> Option<Vec<u8>> {
        self.pass_predict.clone()
    }

    fn save_pass_predict(&mut self, blob: &[u8]) -> Result<(), FilesystemError> {
        self.pass_predict = Some(blob.to_vec());
        Ok(())
    }
}

/// Handles into the fakes wired into a [`SystemContext`].
pub struct TestEnv {
    pub timer: Rc<FakeTimer>,
    pub rtc: Rc<RefCell<FakeRtc>>,
    pub gauge: Rc<RefCell<FakeGauge>>,
    pub sensors: SensorHub,
    carry_ms: Cell<u64>,
}

impl TestEnv {
    /// Advance the monotonic counter and the wall clock together.
    pub fn advance(&self, ms: u64) {
        self.timer.advance(ms);
        let total = self.carry_ms.get() + ms;
        self.rtc.borrow_mut().now += (total / 1000) as i64;
        self.carry_ms.set(total % 1000);
    }
}

/// A valid, factory-defaulted system context over in-memory fakes.
pub fn test_system() -> (SystemContext, TestEnv) {
    test_system_with_validity(true)
}

/// As [`test_system`], optionally leaving the configuration store without a
/// persisted image (invalid until a factory reset).
pub fn test_system_with_validity(valid: bool) -> (SystemContext, TestEnv) {
    let timer = Rc::new(FakeTimer { now: Cell::new(0) });
    let rtc = Rc::new(RefCell::new(FakeRtc {
        now: 1_633_648_000,
        valid: true,
    }));
    let gauge = Rc::new(RefCell::new(FakeGauge {
        voltage: 4000,
        level: 90,
    }));
    let sensors = SensorHub::new();
    let dynamics = Dynamics {
        gauge: gauge.clone(),
        charger: None,
        sensors: sensors.clone(),
        hardware_version: "V3".to_string(),
        device_id: 1234,
    };
    let mut config = ConfigStore::new(Box::new(MemoryPersistence::default()), dynamics);
    config.init();
    if valid {
        config.factory_reset().unwrap();
    }

    let battery = BatteryMonitor::new(gauge.clone(), 10, 2800);
    let scheduler = Scheduler::new(timer.clone());
    let sys = SystemContext::new(scheduler, timer.clone(), rtc.clone(), config, battery);
    (
        sys,
        TestEnv {
            timer,
            rtc,
            gauge,
            sensors,
            carry_ms: Cell::new(0),
        },
    )
}

/// An Argos runtime configuration with factory-like values for scheduler
/// and RX tests.
pub fn test_argos_config(tr_nom: u32, duty_cycle: u32, jitter: bool) -> crate::config::ArgosConfig {
    crate::config::ArgosConfig {
        tr_nom,
        duty_cycle,
        argos_tx_jitter_en: jitter,
        argos_id: 0x1234,
        mode: crate::config::params::ArgosMode::DutyCycle,
        time_sync_burst_en: false,
        ..Default::default()
    }
}

/// Event sink capturing every broadcast for assertions.
#[derive(Clone, Default)]
pub struct RecordingSink {
    events: Rc<RefCell<Vec<ServiceEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn boxed(&self) -> Box<dyn FnMut(&ServiceEvent)> {
        let events = self.events.clone();
        Box::new(move |event| events.borrow_mut().push(event.clone()))
    }

    pub fn events(&self) -> Vec<ServiceEvent> {
        self.events.borrow().clone()
    }
}

pub struct FakeGnss {
    pub powered: bool,
    pub power_on_count: u32,
    pub last_settings: Option<NavSettings>,
    pub fail_power_on: bool,
}

impl FakeGnss {
    pub fn new() -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self {
            powered: false,
            power_on_count: 0,
            last_settings: None,
            fail_power_on: false,
        }))
    }
}

impl GnssDevice for FakeGnss {
    fn power_on(&mut self, settings: &NavSettings) -> Result<(), DeviceError> {
        if self.fail_power_on {
            return Err(DeviceError::Unavailable);
        }
        self.powered = true;
        self.power_on_count += 1;
        self.last_settings = Some(*settings);
        Ok(())
    }

    fn power_off(&mut self) {
        self.powered = false;
    }
}

pub struct FakeArtic {
    pub sent: Vec<(ArgosModulation, Vec<u8>, usize)>,
    pub frequency: f64,
    pub power: Option<ArgosPower>,
    pub tcxo_warmup_s: u32,
    pub device_id: u32,
    pub idle_timeout_ms: u32,
    pub rx_mode: Option<ArgosModulation>,
    pub fail_send: bool,
    pub queue: DeviceEventQueue,
}

impl FakeArtic {
    pub fn new(queue: DeviceEventQueue) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self {
            sent: Vec::new(),
            frequency: 0.0,
            power: None,
            tcxo_warmup_s: 0,
            device_id: 0,
            idle_timeout_ms: 0,
            rx_mode: None,
            fail_send: false,
            queue,
        }))
    }

    /// Simulate a full transmission acknowledgment from the modem.
    pub fn complete_tx(&self) {
        self.queue.push(DeviceEvent::Artic(ArticEvent::TxStarted));
        self.queue.push(DeviceEvent::Artic(ArticEvent::TxComplete));
    }
}

impl ArticDevice for FakeArtic {
    fn set_frequency(&mut self, mhz: f64) {
        self.frequency = mhz;
    }

    fn set_tx_power(&mut self, power: ArgosPower) {
        self.power = Some(power);
    }

    fn set_tcxo_warmup_time(&mut self, seconds: u32) {
        self.tcxo_warmup_s = seconds;
    }

    fn set_device_identifier(&mut self, id: u32) {
        self.device_id = id;
    }

    fn set_idle_timeout(&mut self, ms: u32) {
        self.idle_timeout_ms = ms;
    }

    fn send(
        &mut self,
        mode: ArgosModulation,
        packet: &[u8],
        total_bits: usize,
    ) -> Result<(), DeviceError> {
        if self.fail_send {
            return Err(DeviceError::Transport);
        }
        self.sent.push((mode, packet.to_vec(), total_bits));
        Ok(())
    }

    fn stop_send(&mut self) {}

    fn start_receive(&mut self, mode: ArgosModulation) -> Result<(), DeviceError> {
        self.rx_mode = Some(mode);
        Ok(())
    }

    fn stop_receive(&mut self) {
        self.rx_mode = None;
    }
}

pub struct MemoryLogger {
    name: &'static str,
    pub records: Vec<LogRecord>,
}

impl MemoryLogger {
    pub fn new(name: &'static str) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self {
            name,
            records: Vec::new(),
        }))
    }
}

impl Logger for MemoryLogger {
    fn name(&self) -> &str {
        self.name
    }

    fn create(&mut self) -> Result<(), FilesystemError> {
        Ok(())
    }

    fn truncate(&mut self) -> Result<(), FilesystemError> {
        self.records.clear();
        Ok(())
    }

    fn write(&mut self, record: &LogRecord) -> Result<(), FilesystemError> {
        self.records.push(*record);
        Ok(())
    }

    fn read(&mut self, index: usize) -> Result<LogRecord, FilesystemError> {
        self.records.get(index).copied().ok_or(FilesystemError::Io)
    }

    fn num_entries(&mut self) -> usize {
        self.records.len()
    }
}

pub struct FakeTransport {
    pub started: bool,
    pub rx_lines: VecDeque<String>,
    pub tx_lines: Vec<String>,
}

impl FakeTransport {
    pub fn new() -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self {
            started: false,
            rx_lines: VecDeque::new(),
            tx_lines: Vec::new(),
        }))
    }
}

impl ControlTransport for FakeTransport {
    fn start(&mut self) {
        self.started = true;
    }

    fn stop(&mut self) {
        self.started = false;
    }

    fn write(&mut self, line: &str) {
        self.tx_lines.push(line.to_string());
    }

    fn read_line(&mut self) -> Option<String> {
        if self.started {
            self.rx_lines.pop_front()
        } else {
            None
        }
    }
}

pub struct FakeFilesystem {
    pub mount_failures_remaining: u32,
    pub formatted: bool,
    pub mounted: bool,
    pub format_fails: bool,
}

impl FakeFilesystem {
    pub fn healthy() -> Self {
        Self {
            mount_failures_remaining: 0,
            formatted: false,
            mounted: false,
            format_fails: false,
        }
    }
}

impl Filesystem for FakeFilesystem {
    fn mount(&mut self) -> Result<(), FilesystemError> {
        if self.mount_failures_remaining > 0 {
            self.mount_failures_remaining -= 1;
            return Err(FilesystemError::MountFailed);
        }
        self.mounted = true;
        Ok(())
    }

    fn umount(&mut self) -> Result<(), FilesystemError> {
        self.mounted = false;
        Ok(())
    }

    fn format(&mut self) -> Result<(), FilesystemError> {
        if self.format_fails {
            return Err(FilesystemError::FormatFailed);
        }
        self.formatted = true;
        Ok(())
    }
}

pub struct FakeWetness {
    pub wet: bool,
    pub fail: bool,
}

impl FakeWetness {
    pub fn new(wet: bool) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self { wet, fail: false }))
    }
}

impl WetnessSensor for FakeWetness {
    fn is_wet(&mut self, _threshold: f64) -> Result<bool, DeviceError> {
        if self.fail {
            return Err(DeviceError::Unavailable);
        }
        Ok(self.wet)
    }
}
