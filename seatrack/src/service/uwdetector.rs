//! Underwater detector service.
//!
//! Samples the configured wet/dry source in short iterations and commits a
//! debounced decision: any wet sample marks the iteration pending-wet, a
//! run of dry samples terminates it early, and the committed state is
//! broadcast only when it changes (or on the very first decision).

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::config::params::{ParamId, UnderwaterSource};
use crate::hal::WetnessSensor;
use crate::service::{EventData, Service, ServiceId, SystemContext};

pub struct UwDetectorService {
    sensors: HashMap<UnderwaterSource, Rc<RefCell<dyn WetnessSensor>>>,
    source: UnderwaterSource,
    threshold: f64,
    is_first_time: bool,
    current_state: bool,
    pending_state: bool,
    dry_count: u32,
    sample_iteration: u32,
    max_samples: u32,
    min_dry_samples: u32,
    period_underwater_ms: u32,
    period_surface_ms: u32,
    sample_gap_ms: u32,
}

impl UwDetectorService {
    pub fn new(sensors: HashMap<UnderwaterSource, Rc<RefCell<dyn WetnessSensor>>>) -> Self {
        Self {
            sensors,
            source: UnderwaterSource::Sws,
            threshold: 0.0,
            is_first_time: true,
            current_state: false,
            pending_state: false,
            dry_count: 0,
            sample_iteration: 0,
            max_samples: 1,
            min_dry_samples: 1,
            period_underwater_ms: 0,
            period_surface_ms: 0,
            sample_gap_ms: 0,
        }
    }
}

impl Service for UwDetectorService {
    fn init(&mut self, sys: &mut SystemContext) {
        self.is_first_time = true;
        self.sample_iteration = 0;
        self.dry_count = 0;
        self.pending_state = false;
        self.period_underwater_ms = 1000
            * sys
                .config
                .read::<u32>(ParamId::SamplingUnderFreq)
                .unwrap_or(60);
        self.period_surface_ms = 1000
            * sys
                .config
                .read::<u32>(ParamId::SamplingSurfFreq)
                .unwrap_or(60);
        self.sample_gap_ms = sys.config.read::<u32>(ParamId::UwSampleGap).unwrap_or(1000);
        self.source = sys
            .config
            .read::<UnderwaterSource>(ParamId::UnderwaterDetectSource)
            .unwrap_or(UnderwaterSource::Sws);

        match self.source {
            UnderwaterSource::Sws => {
                self.threshold = sys
                    .config
                    .read::<f64>(ParamId::UnderwaterDetectThresh)
                    .unwrap_or(1.1);
                self.max_samples = sys.config.read::<u32>(ParamId::UwMaxSamples).unwrap_or(5);
                self.min_dry_samples = sys
                    .config
                    .read::<u32>(ParamId::UwMinDrySamples)
                    .unwrap_or(1);
            },
            UnderwaterSource::PressureSensor => {
                self.threshold = sys
                    .config
                    .read::<f64>(ParamId::UnderwaterDetectThresh)
                    .unwrap_or(1.1);
                self.max_samples = 1;
                self.min_dry_samples = 1;
            },
            UnderwaterSource::Gnss => {
                // Signal-quality threshold, clamped to the valid SNR range
                let thresh = sys
                    .config
                    .read::<u32>(ParamId::UwGnssDetectThresh)
                    .unwrap_or(1);
                self.threshold = f64::from(thresh.clamp(1, 7));
                self.max_samples = 1;
                self.min_dry_samples = 1;
            },
        }
    }

    fn term(&mut self, _sys: &mut SystemContext) {}

    fn is_enabled(&mut self, sys: &mut SystemContext) -> bool {
        sys.config.read::<bool>(ParamId::UnderwaterEn).unwrap_or(false)
    }

    fn next_schedule_in_ms(&mut self, _sys: &mut SystemContext) -> u32 {
        if self.sample_iteration > 0 {
            self.sample_gap_ms
        } else if self.is_first_time {
            0
        } else if self.current_state {
            self.period_underwater_ms
        } else {
            self.period_surface_ms
        }
    }

    fn initiate(&mut self, sys: &mut SystemContext) {
        trace!(
            iteration = self.sample_iteration,
            dry = self.dry_count,
            "underwater sample"
        );

        let Some(sensor) = self.sensors.get(&self.source) else {
            // Source not fitted; resource-unavailable failures stay silent
            sys.complete_service(ServiceId::UwSensor, None, None, true);
            return;
        };
        let new_state = match sensor.borrow_mut().is_wet(self.threshold) {
            Ok(state) => state,
            Err(_) => {
                sys.complete_service(ServiceId::UwSensor, None, None, true);
                return;
            },
        };

        self.sample_iteration += 1;

        if new_state {
            self.pending_state = true;
        } else {
            self.dry_count += 1;
            if self.dry_count >= self.min_dry_samples {
                trace!(dry = self.dry_count, "terminating iteration early, dry");
                self.sample_iteration = self.max_samples;
                self.pending_state = false;
            }
        }

        if self.sample_iteration >= self.max_samples {
            debug!(state = self.pending_state, "underwater decision committed");
            self.sample_iteration = 0;
            self.dry_count = 0;

            if self.pending_state != self.current_state || self.is_first_time {
                self.is_first_time = false;
                self.current_state = self.pending_state;
                let state = self.pending_state;
                self.pending_state = false;
                sys.complete_service(
                    ServiceId::UwSensor,
                    Some(EventData::Flag(state)),
                    None,
                    true,
                );
            } else {
                self.pending_state = false;
                sys.complete_service(ServiceId::UwSensor, None, None, true);
            }
        } else {
            sys.complete_service(ServiceId::UwSensor, None, None, true);
        }
    }

    fn is_usable_underwater(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{ServiceEventType, ServiceManager};
    use crate::testutil::{test_system, FakeWetness, RecordingSink};

    fn setup(
        wet: bool,
    ) -> (
        SystemContext,
        crate::testutil::TestEnv,
        ServiceManager,
        Rc<RefCell<FakeWetness>>,
        RecordingSink,
    ) {
        let (mut sys, env) = test_system();
        sys.config.write(ParamId::UnderwaterEn, true).unwrap();
        let sensor = FakeWetness::new(wet);
        let mut sensors: HashMap<UnderwaterSource, Rc<RefCell<dyn WetnessSensor>>> = HashMap::new();
        sensors.insert(UnderwaterSource::Sws, sensor.clone());
        let mut manager = ServiceManager::new();
        manager.add(
            ServiceId::UwSensor,
            "UWDETECTOR",
            Box::new(UwDetectorService::new(sensors)),
            None,
        );
        let sink = RecordingSink::new();
        manager.set_event_sink(sink.boxed());
        (sys, env, manager, sensor, sink)
    }

    fn drain(manager: &mut ServiceManager, sys: &mut SystemContext) {
        while let Some(task) = sys.scheduler.pop_due() {
            manager.dispatch(sys, task);
        }
    }

    fn flag_events(sink: &RecordingSink) -> Vec<bool> {
        sink.events()
            .iter()
            .filter(|e| e.event_type == ServiceEventType::ServiceLogUpdated)
            .filter_map(|e| match &e.data {
                Some(EventData::Flag(state)) => Some(*state),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn first_dry_decision_is_emitted_immediately() {
        let (mut sys, _env, mut manager, _sensor, sink) = setup(false);
        manager.start_all(&mut sys);
        // First cycle runs immediately; one dry sample suffices with the
        // factory min-dry of 1
        drain(&mut manager, &mut sys);
        assert_eq!(flag_events(&sink), vec![false]);
    }

    #[test]
    fn wet_decision_needs_the_full_iteration() {
        let (mut sys, env, mut manager, _sensor, sink) = setup(true);
        manager.start_all(&mut sys);
        drain(&mut manager, &mut sys);
        // Factory UW_MAX_SAMPLES is 5: four more gap-spaced samples commit
        for _ in 0..4 {
            assert_eq!(flag_events(&sink), Vec::<bool>::new());
            env.advance(1000);
            drain(&mut manager, &mut sys);
        }
        assert_eq!(flag_events(&sink), vec![true]);
    }

    #[test]
    fn unchanged_decision_is_not_rebroadcast() {
        let (mut sys, env, mut manager, _sensor, sink) = setup(false);
        manager.start_all(&mut sys);
        drain(&mut manager, &mut sys);
        // Next surfaced-period cycle commits the same dry state silently
        env.advance(60_000);
        drain(&mut manager, &mut sys);
        assert_eq!(flag_events(&sink), vec![false]);
    }

    #[test]
    fn wet_then_dry_transition_is_debounced() {
        let (mut sys, env, mut manager, sensor, sink) = setup(true);
        manager.start_all(&mut sys);
        for _ in 0..5 {
            drain(&mut manager, &mut sys);
            env.advance(1000);
        }
        assert_eq!(flag_events(&sink), vec![true]);

        // Back to dry: a single dry sample ends the iteration early
        sensor.borrow_mut().wet = false;
        env.advance(60_000);
        drain(&mut manager, &mut sys);
        assert_eq!(flag_events(&sink), vec![true, false]);
    }

    #[test]
    fn missing_source_completes_silently() {
        let (mut sys, env) = test_system();
        sys.config.write(ParamId::UnderwaterEn, true).unwrap();
        let mut manager = ServiceManager::new();
        manager.add(
            ServiceId::UwSensor,
            "UWDETECTOR",
            Box::new(UwDetectorService::new(HashMap::new())),
            None,
        );
        let sink = RecordingSink::new();
        manager.set_event_sink(sink.boxed());
        manager.start_all(&mut sys);
        drain(&mut manager, &mut sys);
        env.advance(60_000);
        drain(&mut manager, &mut sys);
        assert_eq!(flag_events(&sink), Vec::<bool>::new());
    }
}
