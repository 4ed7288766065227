//! Argos transmission service.
//!
//! Selects the burst type and transmission instant from the active
//! configuration, builds the frame at initiation time and drives the
//! half-duplex transceiver. Completion bookkeeping (TX counter, last-TX
//! stamp) happens only on the TX-complete acknowledgment so a failed cycle
//! retries with unchanged state.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, info, trace, warn};

use crate::argos::depth_pile::GpsDepthPile;
use crate::argos::packet::ArgosPacketBuilder;
use crate::argos::rx::RxController;
use crate::argos::tx_sched::ArgosTxScheduler;
use crate::config::params::{ArgosMode, ArgosModulation, ParamId};
use crate::config::ArgosConfig;
use crate::hal::{ArticDevice, ArticEvent, DeviceEvent};
use crate::prepass::PassPredictor;
use crate::service::{
    EventData, Service, ServiceEvent, ServiceEventType, ServiceId, SystemContext,
    SCHEDULE_DISABLED,
};

const SECONDS_PER_DAY: i64 = 86_400;

/// Transceiver idle timeout while certification bursts repeat quickly.
const CERT_TX_IDLE_TIMEOUT_MS: u32 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BurstKind {
    Certification,
    TimeSync,
    Gnss,
    Doppler,
}

pub struct ArgosTxService {
    artic: Rc<RefCell<dyn ArticDevice>>,
    predictor: Box<dyn PassPredictor>,
    sched: ArgosTxScheduler,
    depth_pile: GpsDepthPile,
    rx: RxController,
    scheduled_mode: ArgosModulation,
    scheduled_burst: BurstKind,
    is_first_tx: bool,
    is_tx_pending: bool,
}

impl ArgosTxService {
    pub fn new(artic: Rc<RefCell<dyn ArticDevice>>, predictor: Box<dyn PassPredictor>) -> Self {
        Self {
            artic,
            predictor,
            sched: ArgosTxScheduler::new(),
            depth_pile: GpsDepthPile::new(),
            rx: RxController::new(),
            scheduled_mode: ArgosModulation::A2,
            scheduled_burst: BurstKind::Doppler,
            is_first_tx: true,
            is_tx_pending: false,
        }
    }

    fn argos_config(sys: &mut SystemContext) -> Option<ArgosConfig> {
        match sys.config.argos_configuration() {
            Ok(config) => Some(config),
            Err(e) => {
                warn!(error = %e, "argos configuration unavailable");
                None
            },
        }
    }

    fn aop_update_due(config: &ArgosConfig, now: i64) -> bool {
        now >= config.last_aop_update
            + SECONDS_PER_DAY * i64::from(config.argos_rx_aop_update_period)
    }

    fn send(&mut self, sys: &mut SystemContext, mode: ArgosModulation, packet: Vec<u8>, bits: usize) {
        debug!(%mode, bits, "transmitting");
        if let Err(e) = self.artic.borrow_mut().send(mode, &packet, bits) {
            warn!(error = %e, "transceiver rejected transmission");
            self.is_tx_pending = false;
            sys.complete_service(ServiceId::ArgosTx, None, None, true);
        }
    }

    fn process_certification_burst(&mut self, sys: &mut SystemContext) {
        let Some(config) = Self::argos_config(sys) else {
            sys.complete_service(ServiceId::ArgosTx, None, None, true);
            return;
        };
        match ArgosPacketBuilder::build_certification_packet(&config.cert_tx_payload) {
            Ok((packet, bits)) => {
                let mode = match config.cert_tx_modulation {
                    ArgosModulation::A4 => {
                        warn!("A4 certification modulation unsupported, using A2");
                        ArgosModulation::A2
                    },
                    mode => mode,
                };
                self.send(sys, mode, packet, bits);
            },
            Err(e) => {
                warn!(error = %e, "bad certification payload");
                self.is_tx_pending = false;
                sys.complete_service(ServiceId::ArgosTx, None, None, true);
            },
        }
    }

    fn process_doppler_burst(&mut self, sys: &mut SystemContext) {
        let voltage = sys.config.battery_voltage_mv();
        let is_lb = sys.config.is_battery_level_low();
        let (packet, bits) = ArgosPacketBuilder::build_doppler_packet(u32::from(voltage), is_lb);
        self.send(sys, ArgosModulation::A2, packet, bits);
    }

    fn process_time_sync_burst(&mut self, sys: &mut SystemContext) {
        let Some(config) = Self::argos_config(sys) else {
            sys.complete_service(ServiceId::ArgosTx, None, None, true);
            return;
        };
        match self.depth_pile.retrieve_latest() {
            Some(entry) => {
                let packet = ArgosPacketBuilder::build_short_packet(
                    &entry,
                    config.is_out_of_zone,
                    config.is_lb,
                );
                self.send(
                    sys,
                    ArgosModulation::A2,
                    packet,
                    crate::constants::SHORT_PACKET_BITS,
                );
            },
            None => {
                warn!("no eligible entries for time sync burst");
                self.process_doppler_burst(sys);
            },
        }
    }

    fn process_gnss_burst(&mut self, sys: &mut SystemContext) {
        let Some(config) = Self::argos_config(sys) else {
            sys.complete_service(ServiceId::ArgosTx, None, None, true);
            return;
        };
        let entries = self.depth_pile.retrieve(config.depth_pile as usize);
        if entries.is_empty() {
            // Depth pile dried out since scheduling; degrade to Doppler
            warn!("no eligible entries in depth pile");
            self.process_doppler_burst(sys);
            return;
        }
        let (packet, bits) = ArgosPacketBuilder::build_gnss_packet(
            &entries,
            config.is_out_of_zone,
            config.is_lb,
            config.delta_time_loc,
        );
        let mode = self.scheduled_mode;
        self.send(sys, mode, packet, bits);
    }

    fn process_rx(&mut self, sys: &mut SystemContext) {
        if let Some(config) = Self::argos_config(sys) {
            let artic = self.artic.clone();
            self.rx
                .process(sys, &mut *artic.borrow_mut(), &config, self.is_tx_pending);
        }
    }
}

impl Service for ArgosTxService {
    fn init(&mut self, sys: &mut SystemContext) {
        let Some(config) = Self::argos_config(sys) else {
            return;
        };
        {
            let mut artic = self.artic.borrow_mut();
            artic.set_frequency(config.frequency);
            artic.set_tcxo_warmup_time(config.argos_tcxo_warmup_time);
            artic.set_tx_power(config.power);
            artic.set_device_identifier(config.argos_id);
            if config.cert_tx_enable {
                artic.set_idle_timeout(CERT_TX_IDLE_TIMEOUT_MS);
            }
        }
        self.sched.reset(config.argos_id);
        self.depth_pile.clear();
        self.rx.reset();
        self.is_first_tx = true;
        self.is_tx_pending = false;
    }

    fn term(&mut self, _sys: &mut SystemContext) {}

    fn is_enabled(&mut self, sys: &mut SystemContext) -> bool {
        Self::argos_config(sys)
            .map(|c| c.mode != ArgosMode::Off || c.cert_tx_enable)
            .unwrap_or(false)
    }

    fn next_schedule_in_ms(&mut self, sys: &mut SystemContext) -> u32 {
        let Some(config) = Self::argos_config(sys) else {
            return SCHEDULE_DISABLED;
        };
        let now = sys.current_time();

        if config.cert_tx_enable {
            self.scheduled_mode = config.cert_tx_modulation;
            self.scheduled_burst = BurstKind::Certification;
            return self
                .sched
                .schedule_certification(config.cert_tx_repetition, self.is_first_tx, now)
                as u32;
        }

        if config.mode == ArgosMode::Off {
            return SCHEDULE_DISABLED;
        }

        if !config.gnss_en {
            // Doppler-only operation without position fixes
            self.scheduled_mode = ArgosModulation::A2;
            self.scheduled_burst = BurstKind::Doppler;
            return match config.mode {
                ArgosMode::DutyCycle => self
                    .sched
                    .schedule_duty_cycle(&config, now)
                    .map(|ms| ms as u32)
                    .unwrap_or(SCHEDULE_DISABLED),
                ArgosMode::Legacy => self
                    .sched
                    .schedule_legacy(&config, now)
                    .map(|ms| ms as u32)
                    .unwrap_or(SCHEDULE_DISABLED),
                _ => SCHEDULE_DISABLED,
            };
        }

        if self.depth_pile.eligible() == 0 {
            trace!("depth pile has no eligible entries");
            return SCHEDULE_DISABLED;
        }

        if self.is_first_tx && config.time_sync_burst_en {
            self.scheduled_mode = ArgosModulation::A2;
            self.scheduled_burst = BurstKind::TimeSync;
            self.sched.schedule_at(now);
            return 0;
        }

        match config.mode {
            ArgosMode::DutyCycle => {
                self.scheduled_mode = ArgosModulation::A2;
                self.scheduled_burst = BurstKind::Gnss;
                self.sched
                    .schedule_duty_cycle(&config, now)
                    .map(|ms| ms as u32)
                    .unwrap_or(SCHEDULE_DISABLED)
            },
            ArgosMode::Legacy => {
                self.scheduled_mode = ArgosModulation::A2;
                self.scheduled_burst = BurstKind::Gnss;
                self.sched
                    .schedule_legacy(&config, now)
                    .map(|ms| ms as u32)
                    .unwrap_or(SCHEDULE_DISABLED)
            },
            ArgosMode::PassPrediction => {
                self.scheduled_burst = BurstKind::Gnss;
                let want_rx_window = self.rx.window().is_none()
                    && config.argos_rx_en
                    && Self::aop_update_due(&config, now);
                let pass_predict = sys.config.read_pass_predict().clone();
                match self.sched.schedule_prepass(
                    &config,
                    &pass_predict.records,
                    self.predictor.as_mut(),
                    now,
                    want_rx_window,
                ) {
                    Some(outcome) => {
                        if let Some((start, end)) = outcome.rx_window {
                            let capped_end =
                                end.min(start + i64::from(config.argos_rx_max_window));
                            self.rx.set_window(start, capped_end);
                        }
                        self.scheduled_mode = outcome.modulation;
                        outcome.relative_ms as u32
                    },
                    None => SCHEDULE_DISABLED,
                }
            },
            _ => SCHEDULE_DISABLED,
        }
    }

    fn initiate(&mut self, sys: &mut SystemContext) {
        trace!(burst = ?self.scheduled_burst, "argos burst initiated");
        self.is_first_tx = false;
        self.is_tx_pending = true;
        match self.scheduled_burst {
            BurstKind::Certification => self.process_certification_burst(sys),
            BurstKind::TimeSync => self.process_time_sync_burst(sys),
            BurstKind::Gnss => self.process_gnss_burst(sys),
            BurstKind::Doppler => self.process_doppler_burst(sys),
        }
    }

    fn cancel(&mut self, _sys: &mut SystemContext) -> bool {
        debug!(pending = self.is_tx_pending, "argos cycle cancel");
        let was_pending = self.is_tx_pending;
        self.is_tx_pending = false;
        self.artic.borrow_mut().stop_send();
        was_pending
    }

    fn triggered_on_surfaced(&mut self, _sys: &mut SystemContext) -> (bool, bool) {
        (true, false)
    }

    fn is_active_on_initiate(&self) -> bool {
        // SERVICE_ACTIVE follows the transceiver's TX-started notification
        false
    }

    fn notify_peer_event(&mut self, sys: &mut SystemContext, event: &ServiceEvent) {
        match (event.source, event.event_type, &event.data) {
            (
                ServiceId::Gnss,
                ServiceEventType::SensorLogUpdated,
                Some(EventData::Gps(entry)),
            ) => {
                let Some(config) = Self::argos_config(sys) else {
                    return;
                };
                let burst_counter = if config.ntry_per_message == 0
                    || config.mode == ArgosMode::DutyCycle
                    || config.mode == ArgosMode::Legacy
                {
                    u32::MAX
                } else {
                    config.ntry_per_message
                };
                self.depth_pile.store(*entry, burst_counter);

                if entry.info.valid {
                    trace!("updated last known location");
                    self.sched.set_last_location(entry.info.lon, entry.info.lat);
                    // A first fix may unblock prepass scheduling
                    sys.request_reschedule_if_idle(ServiceId::ArgosTx);
                }
            },
            (
                ServiceId::UwSensor,
                ServiceEventType::ServiceLogUpdated,
                Some(EventData::Flag(false)),
            ) => {
                if let Some(config) = Self::argos_config(sys) {
                    let earliest = sys.current_time() + i64::from(config.dry_time_before_tx);
                    self.sched.set_earliest_schedule(earliest);
                }
            },
            _ => {},
        }
    }

    fn handle_device_event(&mut self, sys: &mut SystemContext, event: &DeviceEvent) {
        let DeviceEvent::Artic(event) = event else {
            return;
        };
        match event {
            ArticEvent::TxStarted => {
                sys.mark_service_active(ServiceId::ArgosTx);
            },
            ArticEvent::TxComplete => {
                info!("transmission complete");
                self.sched.notify_tx_complete();
                self.is_tx_pending = false;

                let now = sys.current_time();
                let _ = sys.config.write(ParamId::LastTx, now);
                let _ = sys.config.increment_tx_counter();
                let _ = sys.config.save();

                self.process_rx(sys);
                sys.complete_service(ServiceId::ArgosTx, None, None, true);
            },
            ArticEvent::RxPacket { data, .. } => {
                if let Some(config) = Self::argos_config(sys) {
                    let artic = self.artic.clone();
                    let data = data.clone();
                    self.rx
                        .handle_rx_packet(sys, &mut *artic.borrow_mut(), &config, &data);
                }
            },
            ArticEvent::RxTimeout => {
                info!("receive window timed out");
                self.rx.invalidate_window();
                self.process_rx(sys);
            },
            ArticEvent::DeviceError => {
                warn!("transceiver error, rescheduling");
                let was_pending = self.is_tx_pending;
                self.is_tx_pending = false;
                self.rx.invalidate_window();
                self.process_rx(sys);
                if was_pending {
                    sys.complete_service(ServiceId::ArgosTx, None, None, true);
                }
            },
            ArticEvent::PowerOff { rx_time_on_ms } => {
                self.rx.update_rx_time(sys, *rx_time_on_ms);
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{DOPPLER_PACKET_BITS, LONG_PACKET_BITS, SHORT_PACKET_BITS};
    use crate::hal::DeviceEventQueue;
    use crate::logging::{GpsInfo, GpsLogEntry, LogHeader, LogType};
    use crate::prepass::{
        AopSatelliteEntry, DownlinkStatus, PredictionConfig, SatellitePass, UplinkStatus,
    };
    use crate::service::ServiceManager;
    use crate::testutil::{test_system, FakeArtic, RecordingSink, TestEnv};

    struct NoPasses;

    impl PassPredictor for NoPasses {
        fn next_pass(
            &mut self,
            _config: &PredictionConfig,
            _aop: &[AopSatelliteEntry],
        ) -> Result<Option<SatellitePass>, crate::error::PrepassError> {
            Ok(None)
        }

        fn next_pass_with_status(
            &mut self,
            _config: &PredictionConfig,
            _aop: &[AopSatelliteEntry],
            _min_downlink: DownlinkStatus,
            _min_uplink: UplinkStatus,
        ) -> Result<Option<SatellitePass>, crate::error::PrepassError> {
            Ok(None)
        }
    }

    fn fix_entry(sys: &SystemContext, lat: f64, lon: f64) -> GpsLogEntry {
        let now = sys.current_time();
        GpsLogEntry {
            header: LogHeader::with_time(LogType::Gps, now),
            info: GpsInfo {
                valid: true,
                lat,
                lon,
                fix_type: 3,
                batt_voltage: 4000,
                sched_time: now,
                ..GpsInfo::default()
            },
        }
    }

    fn gnss_fix_event(entry: GpsLogEntry) -> ServiceEvent {
        ServiceEvent {
            event_type: ServiceEventType::SensorLogUpdated,
            source: ServiceId::Gnss,
            data: Some(EventData::Gps(entry)),
        }
    }

    fn setup() -> (
        SystemContext,
        TestEnv,
        ServiceManager,
        Rc<RefCell<crate::testutil::FakeArtic>>,
        RecordingSink,
        DeviceEventQueue,
    ) {
        let (mut sys, env) = test_system();
        // Deterministic schedules in tests
        sys.config.write(ParamId::ArgosTxJitterEn, false).unwrap();
        let queue = DeviceEventQueue::new();
        let artic = FakeArtic::new(queue.clone());
        let mut manager = ServiceManager::new();
        manager.add(
            ServiceId::ArgosTx,
            "ARGOSTX",
            Box::new(ArgosTxService::new(artic.clone(), Box::new(NoPasses))),
            None,
        );
        let sink = RecordingSink::new();
        manager.set_event_sink(sink.boxed());
        (sys, env, manager, artic, sink, queue)
    }

    fn drain(manager: &mut ServiceManager, sys: &mut SystemContext) {
        while let Some(task) = sys.scheduler.pop_due() {
            manager.dispatch(sys, task);
        }
    }

    fn pump_device_events(
        manager: &mut ServiceManager,
        sys: &mut SystemContext,
        queue: &DeviceEventQueue,
    ) {
        while let Some(event) = queue.pop() {
            manager.deliver_device_event(sys, &event);
        }
    }

    #[test]
    fn init_programs_the_transceiver() {
        let (mut sys, _env, mut manager, artic, _sink, _queue) = setup();
        sys.config.write(ParamId::ArgosHexId, 0xBEEFu32).unwrap();
        manager.start_all(&mut sys);
        let artic = artic.borrow();
        assert_eq!(artic.frequency, 401.65);
        assert_eq!(artic.device_id, 0xBEEF);
        assert_eq!(artic.tcxo_warmup_s, 5);
    }

    #[test]
    fn no_depth_pile_means_no_schedule() {
        let (mut sys, _env, mut manager, _artic, _sink, _queue) = setup();
        manager.start_all(&mut sys);
        assert!(!manager.is_scheduled(&sys, ServiceId::ArgosTx));
    }

    #[test]
    fn first_fix_triggers_a_time_sync_burst() {
        let (mut sys, _env, mut manager, artic, sink, queue) = setup();
        manager.start_all(&mut sys);

        let entry = fix_entry(&sys, 50.0, -3.0);
        manager.inject_event(&mut sys, gnss_fix_event(entry));
        drain(&mut manager, &mut sys);

        // Time sync burst is an immediate short packet in A2
        let sent = artic.borrow().sent.clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, ArgosModulation::A2);
        assert_eq!(sent[0].2, SHORT_PACKET_BITS);

        // TX lifecycle: started -> active event, complete -> counters
        artic.borrow().complete_tx();
        pump_device_events(&mut manager, &mut sys, &queue);

        assert_eq!(sys.config.read::<u32>(ParamId::TxCounter).unwrap(), 1);
        assert!(sys.config.read::<i64>(ParamId::LastTx).unwrap() > 0);
        let events = sink.events();
        assert!(events
            .iter()
            .any(|e| e.event_type == ServiceEventType::ServiceActive));
    }

    #[test]
    fn legacy_mode_sends_long_packets_once_pile_is_deep() {
        let (mut sys, env, mut manager, artic, _sink, queue) = setup();
        sys.config
            .write(ParamId::ArgosTimeSyncBurstEn, false)
            .unwrap();
        sys.config.write(ParamId::TrNom, 60u32).unwrap();
        manager.start_all(&mut sys);

        for i in 0..4 {
            let entry = fix_entry(&sys, 50.0 + f64::from(i) * 0.01, -3.0);
            manager.inject_event(&mut sys, gnss_fix_event(entry));
        }

        // Wait out the schedule and transmit
        let delay = manager.last_schedule_ms(ServiceId::ArgosTx).unwrap();
        env.advance(u64::from(delay));
        drain(&mut manager, &mut sys);

        let sent = artic.borrow().sent.clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].2, LONG_PACKET_BITS);

        artic.borrow().complete_tx();
        pump_device_events(&mut manager, &mut sys, &queue);
        // Next TR_NOM cycle queued
        assert!(manager.is_scheduled(&sys, ServiceId::ArgosTx));
    }

    #[test]
    fn doppler_burst_when_gnss_disabled() {
        let (mut sys, env, mut manager, artic, _sink, _queue) = setup();
        sys.config.write(ParamId::GnssEn, false).unwrap();
        manager.start_all(&mut sys);

        let delay = manager.last_schedule_ms(ServiceId::ArgosTx).unwrap();
        env.advance(u64::from(delay));
        drain(&mut manager, &mut sys);

        let sent = artic.borrow().sent.clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].2, DOPPLER_PACKET_BITS);
    }

    #[test]
    fn certification_bursts_repeat_at_the_configured_period() {
        let (mut sys, env, mut manager, artic, _sink, queue) = setup();
        sys.config.write(ParamId::CertTxEnable, true).unwrap();
        sys.config
            .write(ParamId::CertTxPayload, "AABBCCDD".to_string())
            .unwrap();
        sys.config.write(ParamId::CertTxRepetition, 30u32).unwrap();
        manager.start_all(&mut sys);

        // First burst is immediate
        drain(&mut manager, &mut sys);
        assert_eq!(artic.borrow().sent.len(), 1);
        assert_eq!(artic.borrow().idle_timeout_ms, CERT_TX_IDLE_TIMEOUT_MS);

        artic.borrow().complete_tx();
        pump_device_events(&mut manager, &mut sys, &queue);
        assert_eq!(
            manager.last_schedule_ms(ServiceId::ArgosTx),
            Some(30_000)
        );

        env.advance(30_000);
        drain(&mut manager, &mut sys);
        assert_eq!(artic.borrow().sent.len(), 2);
    }

    #[test]
    fn device_error_reschedules_without_counting_a_tx() {
        let (mut sys, _env, mut manager, artic, _sink, queue) = setup();
        manager.start_all(&mut sys);
        let entry = fix_entry(&sys, 50.0, -3.0);
        manager.inject_event(&mut sys, gnss_fix_event(entry));
        drain(&mut manager, &mut sys);
        assert_eq!(artic.borrow().sent.len(), 1);

        queue.push(DeviceEvent::Artic(ArticEvent::DeviceError));
        pump_device_events(&mut manager, &mut sys, &queue);

        assert_eq!(sys.config.read::<u32>(ParamId::TxCounter).unwrap(), 0);
        // The failure path left a new schedule behind
        assert!(manager.is_scheduled(&sys, ServiceId::ArgosTx));
    }

    #[test]
    fn surfacing_floors_the_next_schedule() {
        let (mut sys, _env, mut manager, _artic, _sink, _queue) = setup();
        sys.config
            .write(ParamId::ArgosTimeSyncBurstEn, false)
            .unwrap();
        sys.config.write(ParamId::DryTimeBeforeTx, 120u32).unwrap();
        manager.start_all(&mut sys);

        let entry = fix_entry(&sys, 50.0, -3.0);
        manager.inject_event(&mut sys, gnss_fix_event(entry));

        // Surfaced event floors the schedule at now + dry time
        manager.inject_event(
            &mut sys,
            ServiceEvent {
                event_type: ServiceEventType::ServiceLogUpdated,
                source: ServiceId::UwSensor,
                data: Some(EventData::Flag(false)),
            },
        );
        drain(&mut manager, &mut sys);
        let delay = manager.last_schedule_ms(ServiceId::ArgosTx).unwrap();
        assert!(delay >= 119_000 && delay <= 121_000, "delay={delay}");
    }
}
