//! Shared in-memory fakes for the integration tests.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use seatrack::battery::BatteryMonitor;
use seatrack::config::params::{ArgosModulation, ArgosPower};
use seatrack::config::store::{ConfigStore, Dynamics};
use seatrack::error::{DeviceError, FilesystemError};
use seatrack::hal::{
    ArticDevice, ArticEvent, BatteryGauge, ConfigPersistence, ControlTransport, DeviceEvent,
    DeviceEventQueue, Filesystem, GnssDevice, Logger, NavSettings, Rtc, SensorHub, Timer,
};
use seatrack::logging::LogRecord;
use seatrack::sched::Scheduler;
use seatrack::service::SystemContext;

pub struct FakeTimer {
    now: Cell<u64>,
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
    params: Option<Vec<u8>>,
    pass_predict: Option<Vec<u8>>,
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

pub struct FakeGnss {
    pub powered: bool,
    pub power_on_count: u32,
    pub last_settings: Option<NavSettings>,
}

impl FakeGnss {
    pub fn new() -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self {
            powered: false,
            power_on_count: 0,
            last_settings: None,
        }))
    }
}

impl GnssDevice for FakeGnss {
    fn power_on(&mut self, settings: &NavSettings) -> Result<(), DeviceError> {
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
    pub queue: DeviceEventQueue,
    pub rx_mode: Option<ArgosModulation>,
}

impl FakeArtic {
    pub fn new(queue: DeviceEventQueue) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self {
            sent: Vec::new(),
            queue,
            rx_mode: None,
        }))
    }

    pub fn complete_tx(&self) {
        self.queue.push(DeviceEvent::Artic(ArticEvent::TxStarted));
        self.queue.push(DeviceEvent::Artic(ArticEvent::TxComplete));
    }
}

impl ArticDevice for FakeArtic {
    fn set_frequency(&mut self, _mhz: f64) {}

    fn set_tx_power(&mut self, _power: ArgosPower) {}

    fn set_tcxo_warmup_time(&mut self, _seconds: u32) {}

    fn set_device_identifier(&mut self, _id: u32) {}

    fn set_idle_timeout(&mut self, _ms: u32) {}

    fn send(
        &mut self,
        mode: ArgosModulation,
        packet: &[u8],
        total_bits: usize,
    ) -> Result<(), DeviceError> {
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

pub struct HealthyFilesystem;

impl Filesystem for HealthyFilesystem {
    fn mount(&mut self) -> Result<(), FilesystemError> {
        Ok(())
    }

    fn umount(&mut self) -> Result<(), FilesystemError> {
        Ok(())
    }

    fn format(&mut self) -> Result<(), FilesystemError> {
        Ok(())
    }
}

/// Shared clock handles used to advance time during a scenario.
pub struct Clocks {
    pub timer: Rc<FakeTimer>,
    pub rtc: Rc<RefCell<FakeRtc>>,
    carry_ms: Cell<u64>,
}

impl Clocks {
    pub fn advance(&self, ms: u64) {
        self.timer.now.set(self.timer.now.get() + ms);
        let total = self.carry_ms.get() + ms;
        self.rtc.borrow_mut().now += (total / 1000) as i64;
        self.carry_ms.set(total % 1000);
    }
}

/// A factory-reset system context over in-memory fakes.
pub fn system_context() -> (SystemContext, Clocks) {
    let timer = Rc::new(FakeTimer { now: Cell::new(0) });
    let rtc = Rc::new(RefCell::new(FakeRtc {
        now: 1_633_648_000,
        valid: true,
    }));
    let gauge = Rc::new(RefCell::new(FakeGauge {
        voltage: 4000,
        level: 90,
    }));
    let dynamics = Dynamics {
        gauge: gauge.clone(),
        charger: None,
        sensors: SensorHub::new(),
        hardware_version: "V3".to_string(),
        device_id: 77,
    };
    let mut config = ConfigStore::new(Box::new(MemoryPersistence::default()), dynamics);
    config.init();
    config.factory_reset().unwrap();

    let battery = BatteryMonitor::new(gauge, 10, 2800);
    let scheduler = Scheduler::new(timer.clone());
    let sys = SystemContext::new(scheduler, timer.clone(), rtc.clone(), config, battery);
    (
        sys,
        Clocks {
            timer,
            rtc,
            carry_ms: Cell::new(0),
        },
    )
}
