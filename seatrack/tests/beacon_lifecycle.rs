//! End-to-end scenarios over the full device: boot, gestures, a GNSS fix
//! flowing into an Argos transmission, and a configuration session.

mod common;

use std::cell::RefCell;
use std::rc::Rc;

use common::{
    system_context, Clocks, FakeArtic, FakeGnss, FakeTransport, HealthyFilesystem, MemoryLogger,
};
use seatrack::argos::ArgosTxService;
use seatrack::config::params::ParamId;
use seatrack::error::PrepassError;
use seatrack::hal::{DeviceEvent, DeviceEventQueue, GnssEvent, PvtSolution, ReedGesture};
use seatrack::logging::{GpsLogFormatter, LogRegistry};
use seatrack::prepass::{
    AopSatelliteEntry, DownlinkStatus, PassPredictor, PredictionConfig, SatellitePass,
    UplinkStatus,
};
use seatrack::service::gnss::GnssService;
use seatrack::service::{ServiceId, ServiceManager};
use seatrack::sm::{Device, DevicePlatform, DeviceState};

struct NoPasses;

impl PassPredictor for NoPasses {
    fn next_pass(
        &mut self,
        _config: &PredictionConfig,
        _aop: &[AopSatelliteEntry],
    ) -> Result<Option<SatellitePass>, PrepassError> {
        Ok(None)
    }

    fn next_pass_with_status(
        &mut self,
        _config: &PredictionConfig,
        _aop: &[AopSatelliteEntry],
        _min_downlink: DownlinkStatus,
        _min_uplink: UplinkStatus,
    ) -> Result<Option<SatellitePass>, PrepassError> {
        Ok(None)
    }
}

struct Rig {
    device: Device,
    clocks: Clocks,
    queue: DeviceEventQueue,
    gnss: Rc<RefCell<FakeGnss>>,
    artic: Rc<RefCell<FakeArtic>>,
    transport: Rc<RefCell<FakeTransport>>,
    sensor_log: Rc<RefCell<MemoryLogger>>,
}

fn rig() -> Rig {
    let (mut sys, clocks) = system_context();
    // Deterministic schedules
    sys.config.write(ParamId::ArgosTxJitterEn, false).unwrap();
    sys.config.save().unwrap();

    let queue = DeviceEventQueue::new();
    let gnss = FakeGnss::new();
    let artic = FakeArtic::new(queue.clone());
    let transport = FakeTransport::new();
    let sensor_log = MemoryLogger::new("sensor.log");

    let mut services = ServiceManager::new();
    services.add(
        ServiceId::Gnss,
        "GNSS",
        Box::new(GnssService::new(gnss.clone())),
        Some(sensor_log.clone()),
    );
    services.add(
        ServiceId::ArgosTx,
        "ARGOSTX",
        Box::new(ArgosTxService::new(artic.clone(), Box::new(NoPasses))),
        None,
    );

    let mut logs = LogRegistry::new();
    logs.add(sensor_log.clone(), Rc::new(GpsLogFormatter));

    let platform = DevicePlatform {
        filesystem: Box::new(HealthyFilesystem),
        transport: transport.clone(),
        logs,
        events: queue.clone(),
        artic: Some(artic.clone()),
        memory: None,
        calibration: None,
    };

    Rig {
        device: Device::new(sys, services, platform),
        clocks,
        queue,
        gnss,
        artic,
        transport,
        sensor_log,
    }
}

fn run_for(rig: &mut Rig, ms: u64) {
    let step_ms = 250;
    let mut elapsed = 0;
    while elapsed <= ms {
        rig.device.step();
        rig.clocks.advance(step_ms);
        elapsed += step_ms;
    }
}

fn bring_operational(rig: &mut Rig) {
    rig.device.boot();
    run_for(rig, 1100);
    assert_eq!(rig.device.state(), DeviceState::Off);
    rig.queue.push(DeviceEvent::Reed(ReedGesture::Swipe));
    rig.device.step();
    assert_eq!(rig.device.state(), DeviceState::Idle);
    run_for(rig, 2100);
    assert_eq!(rig.device.state(), DeviceState::Operational);
}

fn pvt() -> PvtSolution {
    PvtSolution {
        year: 2021,
        month: 10,
        day: 8,
        hour: 10,
        min: 30,
        sec: 0,
        valid: true,
        fix_type: 3,
        num_sv: 9,
        lat: 50.7,
        lon: -1.5,
        g_speed: 1500,
        h_msl: 20_000,
        ttff: 31_000,
        ..PvtSolution::default()
    }
}

#[test]
fn fix_to_uplink_pipeline() {
    let mut rig = rig();
    bring_operational(&mut rig);

    // GNSS cycle starts within the accelerated first window
    run_for(&mut rig, 30_000);
    assert!(rig.gnss.borrow().powered);

    // A solution arrives: logged, broadcast, and a time-sync burst goes out
    rig.queue.push(DeviceEvent::Gnss(GnssEvent::Pvt(pvt())));
    rig.device.step();

    assert!(!rig.gnss.borrow().powered);
    assert_eq!(rig.sensor_log.borrow_mut().records.len(), 1);
    assert_eq!(rig.artic.borrow().sent.len(), 1);
    let (_, _, bits) = rig.artic.borrow().sent[0].clone();
    assert_eq!(bits, seatrack::constants::SHORT_PACKET_BITS);

    // The transceiver acknowledges; counters move and a new schedule exists
    rig.artic.borrow().complete_tx();
    rig.device.step();
    assert_eq!(rig.device.sys.config.read::<u32>(ParamId::TxCounter).unwrap(), 1);
    assert!(rig.device.sys.config.read::<i64>(ParamId::LastTx).unwrap() > 0);
}

#[test]
fn repeated_fixes_fill_the_pile_and_long_packets_flow() {
    let mut rig = rig();
    bring_operational(&mut rig);

    for _ in 0..4 {
        run_for(&mut rig, 30_000);
        if !rig.gnss.borrow().powered {
            continue;
        }
        rig.queue.push(DeviceEvent::Gnss(GnssEvent::Pvt(pvt())));
        rig.device.step();
        if !rig.artic.borrow().sent.is_empty() {
            rig.artic.borrow().complete_tx();
            rig.device.step();
        }
        // Let the engine breathe between cycles
        run_for(&mut rig, 120_000);
    }

    // At least one transmission happened and every burst carried a frame of
    // a known size
    let sent = rig.artic.borrow().sent.clone();
    assert!(!sent.is_empty());
    for (_, frame, bits) in sent {
        assert!(bits == 120 || bits == 248 || bits == 24);
        assert_eq!(frame.len() * 8, bits);
    }
}

#[test]
fn configuration_session_round_trip() {
    let mut rig = rig();
    bring_operational(&mut rig);

    rig.queue.push(DeviceEvent::Reed(ReedGesture::ShortHold));
    rig.device.step();
    assert_eq!(rig.device.state(), DeviceState::Configuration);
    assert!(rig.transport.borrow().started);

    // Parameter write, then read back
    rig.transport
        .borrow_mut()
        .rx_lines
        .push_back("$PARMW#009;ARP05=120\r".to_string());
    rig.device.step();
    rig.transport
        .borrow_mut()
        .rx_lines
        .push_back("$PARMR#005;ARP05\r".to_string());
    rig.device.step();

    let tx = rig.transport.borrow().tx_lines.clone();
    assert_eq!(
        tx,
        vec![
            "$O;PARMW#000;\r".to_string(),
            "$O;PARMR#009;ARP05=120\r".to_string(),
        ]
    );

    // Services were stopped for the session; GNSS powered down
    assert!(!rig.gnss.borrow().powered);
}

#[test]
fn log_dump_pages_over_the_transport() {
    let mut rig = rig();
    bring_operational(&mut rig);

    // Produce a handful of log entries
    for _ in 0..3 {
        run_for(&mut rig, 30_000);
        if rig.gnss.borrow().powered {
            rig.queue.push(DeviceEvent::Gnss(GnssEvent::Pvt(pvt())));
            rig.device.step();
            rig.artic.borrow().complete_tx();
            rig.device.step();
        }
        run_for(&mut rig, 60_000);
    }
    let entries = rig.sensor_log.borrow_mut().records.len();
    assert!(entries >= 1);

    rig.queue.push(DeviceEvent::Reed(ReedGesture::ShortHold));
    rig.device.step();

    // d_type 1 selects the sensor log; a single chunk covers < 8 entries
    rig.transport
        .borrow_mut()
        .rx_lines
        .push_back("$DUMPD#001;1\r".to_string());
    rig.device.step();

    let tx = rig.transport.borrow().tx_lines.clone();
    assert_eq!(tx.len(), 1);
    assert!(tx[0].starts_with("$O;DUMPD#"));
    assert!(tx[0].contains("0,0,"));
}
