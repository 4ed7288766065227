//! Device state machine and run loop.
//!
//! Boot -> Off -> Idle -> Operational with reed-switch gestures moving
//! between Off, Operational and Configuration. Filesystem mount failure is
//! the only error that escalates here; everything else recovers inside the
//! services.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, error, info, warn};

use crate::hal::{
    ArticDevice, CalibrationRegistry, ControlTransport, DeviceEvent, DeviceEventQueue, Filesystem,
    MemoryAccess, ReedGesture,
};
use crate::logging::{LogHeader, LogRegistry, LogType, StateChangeEvent, StateChangeLogEntry};
use crate::protocol::{DteAction, DteEnv, DteHandler};
use crate::sched::DEFAULT_PRIORITY;
use crate::service::{ServiceManager, SystemContext, Task};

const BOOT_SETTLE_MS: u32 = 1000;
const IDLE_PERIOD_MS: u32 = 2000;
const ERROR_PERIOD_MS: u32 = 5000;
const DTE_INACTIVITY_TIMEOUT_MS: u32 = 6 * 60 * 1000;

/// Lifecycle states of the beacon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Boot,
    Off,
    Idle,
    Operational,
    Configuration,
    Error,
}

/// State machine timers carried through the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmTask {
    BootComplete,
    IdleElapsed,
    ErrorElapsed,
    ConfigInactivity,
}

/// Collaborators owned by the device beyond the service context.
pub struct DevicePlatform {
    pub filesystem: Box<dyn Filesystem>,
    pub transport: Rc<RefCell<dyn ControlTransport>>,
    pub logs: LogRegistry,
    pub events: DeviceEventQueue,
    pub artic: Option<Rc<RefCell<dyn ArticDevice>>>,
    pub memory: Option<Box<dyn MemoryAccess>>,
    pub calibration: Option<Box<dyn CalibrationRegistry>>,
}

pub struct Device {
    pub sys: SystemContext,
    pub services: ServiceManager,
    platform: DevicePlatform,
    dte: DteHandler,
    state: DeviceState,
    sm_task: crate::sched::TaskHandle,
    inactivity_task: crate::sched::TaskHandle,
    reset_requested: bool,
}

impl Device {
    pub fn new(sys: SystemContext, services: ServiceManager, platform: DevicePlatform) -> Self {
        Self {
            sys,
            services,
            platform,
            dte: DteHandler::new(),
            state: DeviceState::Boot,
            sm_task: crate::sched::TaskHandle::default(),
            inactivity_task: crate::sched::TaskHandle::default(),
            reset_requested: false,
        }
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    /// True once a deferred reboot (RSTBW / FACTW) has been requested.
    pub fn reset_requested(&self) -> bool {
        self.reset_requested
    }

    /// Mount storage, load configuration, and settle into the Off state.
    pub fn boot(&mut self) {
        info!("boot");
        if self.platform.filesystem.mount().is_err() {
            warn!("mount failed, formatting");
            if self.platform.filesystem.format().is_err()
                || self.platform.filesystem.mount().is_err()
            {
                error!("filesystem unusable");
                self.transit(DeviceState::Error);
                return;
            }
        }

        self.sys.config.init();
        self.log_state_change(StateChangeEvent::Boot);
        self.sm_task = self.sys.scheduler.post(
            Task::Sm(SmTask::BootComplete),
            "BootComplete",
            DEFAULT_PRIORITY,
            BOOT_SETTLE_MS,
        );
    }

    /// One pass of the run loop: device notifications first, then every due
    /// task, then any pending control traffic.
    pub fn step(&mut self) {
        while let Some(event) = self.platform.events.pop() {
            match event {
                DeviceEvent::Reed(gesture) => self.on_reed_gesture(gesture),
                other => self.services.deliver_device_event(&mut self.sys, &other),
            }
        }

        while let Some(task) = self.sys.scheduler.pop_due() {
            match task {
                Task::Sm(sm_task) => self.on_sm_task(sm_task),
                other => self.services.dispatch(&mut self.sys, other),
            }
        }

        if self.state == DeviceState::Configuration {
            self.poll_transport();
        }
    }

    fn on_reed_gesture(&mut self, gesture: ReedGesture) {
        debug!(?gesture, state = ?self.state, "reed gesture");
        match (self.state, gesture) {
            (DeviceState::Off, ReedGesture::Swipe) => self.transit(DeviceState::Idle),
            (DeviceState::Operational, ReedGesture::ShortHold) => {
                self.transit(DeviceState::Configuration)
            },
            (DeviceState::Operational, ReedGesture::LongHold) => self.transit(DeviceState::Off),
            _ => {},
        }
    }

    fn on_sm_task(&mut self, task: SmTask) {
        match (self.state, task) {
            (DeviceState::Boot, SmTask::BootComplete) => self.transit(DeviceState::Off),
            (DeviceState::Idle, SmTask::IdleElapsed) => {
                if self.sys.config.is_valid() {
                    self.transit(DeviceState::Operational);
                } else {
                    self.transit(DeviceState::Error);
                }
            },
            (DeviceState::Error, SmTask::ErrorElapsed) => self.transit(DeviceState::Off),
            (DeviceState::Configuration, SmTask::ConfigInactivity) => {
                info!("configuration inactivity timeout");
                self.transit(DeviceState::Off);
            },
            _ => {},
        }
    }

    fn transit(&mut self, next: DeviceState) {
        if self.state == next {
            return;
        }
        info!(from = ?self.state, to = ?next, "state transition");
        self.exit_state();
        self.state = next;
        self.enter_state();
    }

    fn exit_state(&mut self) {
        self.sys.scheduler.cancel(&mut self.sm_task);
        match self.state {
            DeviceState::Operational => {
                self.services.stop_all(&mut self.sys);
            },
            DeviceState::Configuration => {
                self.sys.scheduler.cancel(&mut self.inactivity_task);
                self.platform.transport.borrow_mut().stop();
            },
            _ => {},
        }
    }

    fn enter_state(&mut self) {
        match self.state {
            DeviceState::Boot => {},
            DeviceState::Off => {},
            DeviceState::Idle => {
                self.sm_task = self.sys.scheduler.post(
                    Task::Sm(SmTask::IdleElapsed),
                    "IdleElapsed",
                    DEFAULT_PRIORITY,
                    IDLE_PERIOD_MS,
                );
            },
            DeviceState::Operational => {
                self.log_state_change(StateChangeEvent::Operational);
                self.services.start_all(&mut self.sys);
            },
            DeviceState::Configuration => {
                self.log_state_change(StateChangeEvent::Configuration);
                self.dte.reset_state();
                self.platform.transport.borrow_mut().start();
                self.restart_inactivity_timeout();
            },
            DeviceState::Error => {
                self.sm_task = self.sys.scheduler.post(
                    Task::Sm(SmTask::ErrorElapsed),
                    "ErrorElapsed",
                    DEFAULT_PRIORITY,
                    ERROR_PERIOD_MS,
                );
            },
        }
    }

    fn restart_inactivity_timeout(&mut self) {
        self.sys.scheduler.cancel(&mut self.inactivity_task);
        self.inactivity_task = self.sys.scheduler.post(
            Task::Sm(SmTask::ConfigInactivity),
            "ConfigInactivity",
            DEFAULT_PRIORITY,
            DTE_INACTIVITY_TIMEOUT_MS,
        );
    }

    fn poll_transport(&mut self) {
        loop {
            let line = self.platform.transport.borrow_mut().read_line();
            let Some(line) = line else {
                break;
            };
            self.restart_inactivity_timeout();
            self.process_control_line(&line);
            if self.state != DeviceState::Configuration {
                break;
            }
        }
    }

    fn handle_control_line(&mut self, line: &str) -> (Option<String>, DteAction) {
        let calibration: Option<&mut dyn CalibrationRegistry> = match &mut self.platform.calibration
        {
            Some(c) => Some(c.as_mut()),
            None => None,
        };
        let mut env = DteEnv {
            logs: &mut self.platform.logs,
            memory: self.platform.memory.as_deref(),
            calibration,
            artic: self.platform.artic.clone(),
        };
        self.dte.handle(&mut self.sys, &mut env, line)
    }

    fn process_control_line(&mut self, line: &str) {
        debug!(line, "control request received");
        loop {
            let (response, action) = self.handle_control_line(line);
            if let Some(response) = response {
                self.platform.transport.borrow_mut().write(&response);
            }
            match action {
                DteAction::Again => continue,
                DteAction::Reset => {
                    info!("deferred reboot requested");
                    self.reset_requested = true;
                    self.transit(DeviceState::Off);
                },
                DteAction::Factory => {
                    info!("deferred factory reset requested");
                    if let Err(e) = self.sys.config.factory_reset() {
                        warn!(error = %e, "factory reset failed");
                    }
                    self.reset_requested = true;
                    self.transit(DeviceState::Off);
                },
                DteAction::Secur | DteAction::ConfigUpdated | DteAction::None => {},
            }
            break;
        }
    }

    fn log_state_change(&mut self, event: StateChangeEvent) {
        if let Some((logger, _)) = self.platform.logs.find("system.log") {
            let entry = StateChangeLogEntry {
                header: LogHeader::with_time(LogType::State, self.sys.current_time()),
                event,
            };
            let _ = logger.borrow_mut().write(&entry.to_record());
        }
    }
}
