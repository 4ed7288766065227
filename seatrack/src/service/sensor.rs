//! Generic auxiliary-sensor service.
//!
//! One instance per fitted sensor, parameterised by its channel count and
//! the parameter ids that select its periodic rate and transmission mode.
//! Standalone operation samples and logs on the periodic rate; when the
//! GNSS service goes active and the sensor's TX mode is not OFF, samples
//! are accumulated instead and aggregated into a single value per channel
//! once the GNSS cycle ends, feeding the uplink payload path.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{trace, warn};

use crate::config::params::{ParamId, SensorTxMode};
use crate::hal::{Sensor, SensorKind};
use crate::logging::{LogHeader, LogType, SensorLogEntry};
use crate::service::{
    EventData, SensorData, Service, ServiceEvent, ServiceEventType, ServiceId, SystemContext,
    MAX_SENSOR_CHANNELS, SCHEDULE_DISABLED,
};

/// Parameter group selecting a sensor's transmission piggy-back mode.
#[derive(Debug, Clone, Copy)]
pub struct SensorTxParams {
    pub mode: ParamId,
    pub max_samples: ParamId,
    pub sample_period: ParamId,
}

/// Static description of one sensor service instance.
#[derive(Debug, Clone, Copy)]
pub struct SensorServiceConfig {
    pub kind: SensorKind,
    pub service_id: ServiceId,
    pub name: &'static str,
    pub num_channels: usize,
    pub enable_param: ParamId,
    pub periodic_param: ParamId,
    /// `None` for sensors that never feed the uplink payload path.
    pub tx: Option<SensorTxParams>,
    pub usable_underwater: bool,
}

/// pH probe service configuration.
pub const PH_SENSOR: SensorServiceConfig = SensorServiceConfig {
    kind: SensorKind::Ph,
    service_id: ServiceId::PhSensor,
    name: "PH",
    num_channels: 1,
    enable_param: ParamId::PhSensorEnable,
    periodic_param: ParamId::PhSensorPeriodic,
    tx: Some(SensorTxParams {
        mode: ParamId::PhSensorEnableTxMode,
        max_samples: ParamId::PhSensorEnableTxMaxSamples,
        sample_period: ParamId::PhSensorEnableTxSamplePeriod,
    }),
    usable_underwater: true,
};

/// Sea-temperature (RTD) service configuration.
pub const SEA_TEMP_SENSOR: SensorServiceConfig = SensorServiceConfig {
    kind: SensorKind::SeaTemp,
    service_id: ServiceId::SeaTempSensor,
    name: "SEATEMP",
    num_channels: 1,
    enable_param: ParamId::SeaTempSensorEnable,
    periodic_param: ParamId::SeaTempSensorPeriodic,
    tx: Some(SensorTxParams {
        mode: ParamId::SeaTempSensorEnableTxMode,
        max_samples: ParamId::SeaTempSensorEnableTxMaxSamples,
        sample_period: ParamId::SeaTempSensorEnableTxSamplePeriod,
    }),
    usable_underwater: true,
};

/// Ambient-light service configuration.
pub const ALS_SENSOR: SensorServiceConfig = SensorServiceConfig {
    kind: SensorKind::Als,
    service_id: ServiceId::AlsSensor,
    name: "ALS",
    num_channels: 1,
    enable_param: ParamId::AlsSensorEnable,
    periodic_param: ParamId::AlsSensorPeriodic,
    tx: Some(SensorTxParams {
        mode: ParamId::AlsSensorEnableTxMode,
        max_samples: ParamId::AlsSensorEnableTxMaxSamples,
        sample_period: ParamId::AlsSensorEnableTxSamplePeriod,
    }),
    usable_underwater: false,
};

/// Conductivity/depth/temperature service configuration. The CDT probe
/// only logs; it has no TX piggy-back parameter group.
pub const CDT_SENSOR: SensorServiceConfig = SensorServiceConfig {
    kind: SensorKind::Cdt,
    service_id: ServiceId::CdtSensor,
    name: "CDT",
    num_channels: 3,
    enable_param: ParamId::CdtSensorEnable,
    periodic_param: ParamId::CdtSensorPeriodic,
    tx: None,
    usable_underwater: true,
};

/// Accelerometer service configuration: periodic logging only, the wakeup
/// detection lives in the accelerometer driver.
pub const AXL_SENSOR: SensorServiceConfig = SensorServiceConfig {
    kind: SensorKind::Axl,
    service_id: ServiceId::AxlSensor,
    name: "AXL",
    num_channels: 3,
    enable_param: ParamId::AxlSensorEnable,
    periodic_param: ParamId::AxlSensorPeriodic,
    tx: None,
    usable_underwater: true,
};

/// Pressure service configuration.
pub const PRESSURE_SENSOR: SensorServiceConfig = SensorServiceConfig {
    kind: SensorKind::Pressure,
    service_id: ServiceId::PressureSensor,
    name: "PRESSURE",
    num_channels: 1,
    enable_param: ParamId::PressureSensorEnable,
    periodic_param: ParamId::PressureSensorPeriodic,
    tx: Some(SensorTxParams {
        mode: ParamId::PressureSensorEnableTxMode,
        max_samples: ParamId::PressureSensorEnableTxMaxSamples,
        sample_period: ParamId::PressureSensorEnableTxSamplePeriod,
    }),
    usable_underwater: true,
};

pub struct SensorService {
    cfg: SensorServiceConfig,
    sensor: Rc<RefCell<dyn Sensor>>,
    samples: Vec<Vec<f64>>,
    sample_number: u32,
    gnss_active: bool,
}

impl SensorService {
    pub fn new(cfg: SensorServiceConfig, sensor: Rc<RefCell<dyn Sensor>>) -> Self {
        Self {
            cfg,
            sensor,
            samples: vec![Vec::new(); cfg.num_channels],
            sample_number: 0,
            gnss_active: false,
        }
    }

    fn tx_mode(&self, sys: &mut SystemContext) -> SensorTxMode {
        match self.cfg.tx {
            Some(tx) => sys
                .config
                .read::<SensorTxMode>(tx.mode)
                .unwrap_or(SensorTxMode::Off),
            None => SensorTxMode::Off,
        }
    }

    fn reset_samples(&mut self) {
        for channel in &mut self.samples {
            channel.clear();
        }
        self.sample_number = 0;
    }

    fn aggregate(mode: SensorTxMode, samples: &mut Vec<f64>) -> f64 {
        if samples.is_empty() {
            return f64::NAN;
        }
        match mode {
            SensorTxMode::Oneshot | SensorTxMode::Off => samples[0],
            SensorTxMode::Mean => samples.iter().sum::<f64>() / samples.len() as f64,
            SensorTxMode::Median => {
                samples.sort_by(|a, b| a.partial_cmp(b).unwrap_or(core::cmp::Ordering::Equal));
                samples[samples.len() / 2]
            },
        }
    }

    fn log_and_complete(&mut self, sys: &mut SystemContext, data: SensorData, reschedule: bool) {
        let mut entry = SensorLogEntry {
            header: LogHeader::with_time(LogType::Sensor, sys.current_time()),
            num_channels: self.cfg.num_channels as u8,
            values: [0.0; MAX_SENSOR_CHANNELS],
        };
        entry.values = data.port;
        sys.complete_service(
            self.cfg.service_id,
            Some(EventData::Sensor(data)),
            Some(entry.to_record()),
            reschedule,
        );
    }

    /// One sampling step; `gnss_shutdown` marks the aggregation pass that
    /// follows the end of a GNSS cycle.
    fn sensor_handler(&mut self, sys: &mut SystemContext, reschedule: bool, gnss_shutdown: bool) {
        let tx_mode = self.tx_mode(sys);

        if self.gnss_active {
            let max_samples = self
                .cfg
                .tx
                .map(|tx| sys.config.read::<u32>(tx.max_samples).unwrap_or(1))
                .unwrap_or(1);
            if self.sample_number >= max_samples {
                sys.complete_service(self.cfg.service_id, None, None, false);
                return;
            }
            let mut failed = false;
            for chan in 0..self.cfg.num_channels {
                match self.sensor.borrow_mut().read(chan) {
                    Ok(value) => self.samples[chan].push(value),
                    Err(e) => {
                        warn!(name = self.cfg.name, error = %e, "sensor read failed");
                        failed = true;
                        break;
                    },
                }
            }
            if !failed {
                self.sample_number += 1;
            }
            trace!(name = self.cfg.name, n = self.sample_number, "tx sample");
            sys.complete_service(
                self.cfg.service_id,
                None,
                None,
                tx_mode != SensorTxMode::Oneshot,
            );
        } else if gnss_shutdown && self.sample_number > 0 {
            let mut data = SensorData::default();
            for chan in 0..self.cfg.num_channels {
                data.port[chan] = Self::aggregate(tx_mode, &mut self.samples[chan]);
            }
            self.reset_samples();
            self.log_and_complete(sys, data, true);
        } else if tx_mode == SensorTxMode::Off {
            let mut data = SensorData::default();
            for chan in 0..self.cfg.num_channels {
                match self.sensor.borrow_mut().read(chan) {
                    Ok(value) => data.port[chan] = value,
                    Err(e) => {
                        warn!(name = self.cfg.name, error = %e, "sensor read failed");
                        sys.complete_service(self.cfg.service_id, None, None, reschedule);
                        return;
                    },
                }
            }
            self.log_and_complete(sys, data, reschedule);
        } else {
            sys.complete_service(self.cfg.service_id, None, None, reschedule);
        }
    }
}

impl Service for SensorService {
    fn init(&mut self, _sys: &mut SystemContext) {
        self.gnss_active = false;
        self.reset_samples();
    }

    fn term(&mut self, _sys: &mut SystemContext) {}

    fn is_enabled(&mut self, sys: &mut SystemContext) -> bool {
        sys.config
            .read::<bool>(self.cfg.enable_param)
            .unwrap_or(false)
    }

    fn next_schedule_in_ms(&mut self, sys: &mut SystemContext) -> u32 {
        if self.gnss_active {
            if self.sample_number == 0 {
                return 0;
            }
            return self
                .cfg
                .tx
                .map(|tx| sys.config.read::<u32>(tx.sample_period).unwrap_or(1000))
                .unwrap_or(1000);
        }
        let periodic_s = sys.config.read::<u32>(self.cfg.periodic_param).unwrap_or(0);
        if periodic_s == 0 {
            SCHEDULE_DISABLED
        } else {
            periodic_s * 1000
        }
    }

    fn initiate(&mut self, sys: &mut SystemContext) {
        self.sensor_handler(sys, true, false);
    }

    fn is_usable_underwater(&self) -> bool {
        self.cfg.usable_underwater
    }

    fn notify_peer_event(&mut self, sys: &mut SystemContext, event: &ServiceEvent) {
        if event.source != ServiceId::Gnss || self.tx_mode(sys) == SensorTxMode::Off {
            return;
        }
        match event.event_type {
            ServiceEventType::ServiceActive => {
                trace!(name = self.cfg.name, "GNSS active, start sampling");
                self.gnss_active = true;
                self.reset_samples();
                sys.request_reschedule(self.cfg.service_id, true);
            },
            ServiceEventType::ServiceInactive | ServiceEventType::SensorLogUpdated => {
                if self.gnss_active {
                    trace!(name = self.cfg.name, "GNSS inactive, aggregating");
                    self.gnss_active = false;
                    self.sensor_handler(sys, false, true);
                }
            },
            _ => {},
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeviceError;
    use crate::hal::Logger;
    use crate::service::ServiceManager;
    use crate::testutil::{test_system, MemoryLogger, RecordingSink};

    struct FakeSensor {
        values: Vec<f64>,
        at: usize,
    }

    impl FakeSensor {
        fn cycling(values: Vec<f64>) -> Rc<RefCell<Self>> {
            Rc::new(RefCell::new(Self { values, at: 0 }))
        }
    }

    impl Sensor for FakeSensor {
        fn read(&mut self, _channel: usize) -> Result<f64, DeviceError> {
            let value = self.values[self.at % self.values.len()];
            self.at += 1;
            Ok(value)
        }
    }

    fn drain(manager: &mut ServiceManager, sys: &mut SystemContext) {
        while let Some(task) = sys.scheduler.pop_due() {
            manager.dispatch(sys, task);
        }
    }

    fn gnss_event(event_type: ServiceEventType) -> ServiceEvent {
        ServiceEvent {
            event_type,
            source: ServiceId::Gnss,
            data: None,
        }
    }

    #[test]
    fn standalone_sampling_logs_on_period() {
        let (mut sys, env) = test_system();
        sys.config.write(ParamId::PhSensorEnable, true).unwrap();
        sys.config.write(ParamId::PhSensorPeriodic, 10u32).unwrap();
        let sensor = FakeSensor::cycling(vec![7.25]);
        let logger = MemoryLogger::new("PH");
        let mut manager = ServiceManager::new();
        manager.add(
            ServiceId::PhSensor,
            "PH",
            Box::new(SensorService::new(PH_SENSOR, sensor)),
            Some(logger.clone()),
        );
        let sink = RecordingSink::new();
        manager.set_event_sink(sink.boxed());
        manager.start_all(&mut sys);

        env.advance(10_000);
        drain(&mut manager, &mut sys);
        env.advance(10_000);
        drain(&mut manager, &mut sys);

        assert_eq!(logger.borrow_mut().num_entries(), 2);
        let record = logger.borrow_mut().read(0).unwrap();
        let entry = SensorLogEntry::from_record(&record).unwrap();
        assert_eq!(entry.values[0], 7.25);
    }

    #[test]
    fn disabled_periodic_stands_the_service_down() {
        let (mut sys, env) = test_system();
        sys.config.write(ParamId::PhSensorEnable, true).unwrap();
        let sensor = FakeSensor::cycling(vec![7.25]);
        let mut manager = ServiceManager::new();
        manager.add(
            ServiceId::PhSensor,
            "PH",
            Box::new(SensorService::new(PH_SENSOR, sensor)),
            None,
        );
        manager.start_all(&mut sys);
        env.advance(60_000);
        drain(&mut manager, &mut sys);
        assert!(!manager.is_scheduled(&sys, ServiceId::PhSensor));
    }

    #[test]
    fn gnss_cycle_accumulates_then_aggregates_mean() {
        let (mut sys, env) = test_system();
        sys.config.write(ParamId::PhSensorEnable, true).unwrap();
        sys.config
            .write(ParamId::PhSensorEnableTxMode, SensorTxMode::Mean)
            .unwrap();
        sys.config
            .write(ParamId::PhSensorEnableTxMaxSamples, 3u32)
            .unwrap();
        sys.config
            .write(ParamId::PhSensorEnableTxSamplePeriod, 100u32)
            .unwrap();
        let sensor = FakeSensor::cycling(vec![1.0, 2.0, 3.0]);
        let logger = MemoryLogger::new("PH");
        let mut manager = ServiceManager::new();
        manager.add(
            ServiceId::PhSensor,
            "PH",
            Box::new(SensorService::new(PH_SENSOR, sensor)),
            Some(logger.clone()),
        );
        let sink = RecordingSink::new();
        manager.set_event_sink(sink.boxed());
        manager.start_all(&mut sys);

        manager.inject_event(&mut sys, gnss_event(ServiceEventType::ServiceActive));
        drain(&mut manager, &mut sys);
        for _ in 0..3 {
            env.advance(100);
            drain(&mut manager, &mut sys);
        }
        manager.inject_event(&mut sys, gnss_event(ServiceEventType::ServiceInactive));

        assert_eq!(logger.borrow_mut().num_entries(), 1);
        let record = logger.borrow_mut().read(0).unwrap();
        let entry = SensorLogEntry::from_record(&record).unwrap();
        assert_eq!(entry.values[0], 2.0);

        let events = sink.events();
        assert!(events.iter().any(|e| {
            matches!(&e.data, Some(EventData::Sensor(data)) if data.port[0] == 2.0)
        }));
    }

    #[test]
    fn median_aggregation_sorts_samples() {
        let mut samples = vec![9.0, 1.0, 5.0];
        assert_eq!(
            SensorService::aggregate(SensorTxMode::Median, &mut samples),
            5.0
        );
        let mut samples = vec![4.0, 2.0];
        assert_eq!(
            SensorService::aggregate(SensorTxMode::Mean, &mut samples),
            3.0
        );
        let mut samples = vec![4.0, 2.0];
        assert_eq!(
            SensorService::aggregate(SensorTxMode::Oneshot, &mut samples),
            4.0
        );
    }
}
