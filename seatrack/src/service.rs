//! Service lifecycle framework.
//!
//! Concrete services implement the [`Service`] capability trait; the
//! [`ServiceManager`] owns the framework state for each of them (started
//! flag, underwater gate, the period and timeout tasks) and the peer-event
//! broadcast. Services never call back into the manager: completions and
//! reschedule requests are pushed onto the [`SystemContext`] command outbox
//! and processed when the current callback returns, which keeps every
//! callback cancel-safe.

pub mod gnss;
pub mod sensor;
pub mod uwdetector;

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::battery::BatteryMonitor;
use crate::config::ConfigStore;
use crate::hal::{DeviceEvent, Logger, Rtc, Timer};
use crate::logging::LogRecord;
use crate::sched::{Scheduler, TaskHandle, DEFAULT_PRIORITY};

/// Sentinel returned by [`Service::next_schedule_in_ms`] when the service
/// must not be scheduled.
pub const SCHEDULE_DISABLED: u32 = 0xFFFF_FFFF;

/// Identity of a service on the peer-event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceId {
    Gnss,
    ArgosTx,
    UwSensor,
    PhSensor,
    SeaTempSensor,
    AlsSensor,
    CdtSensor,
    PressureSensor,
    AxlSensor,
}

/// Payload attached to log-update events.
#[derive(Debug, Clone, PartialEq)]
pub enum EventData {
    Flag(bool),
    Gps(crate::logging::GpsLogEntry),
    Sensor(SensorData),
}

/// Aggregated per-channel sensor values.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SensorData {
    pub port: [f64; MAX_SENSOR_CHANNELS],
}

/// Channel capacity of a sensor service.
pub const MAX_SENSOR_CHANNELS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceEventType {
    ServiceActive,
    ServiceInactive,
    ServiceLogUpdated,
    SensorLogUpdated,
}

/// Event broadcast to every other service and the optional external sink.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceEvent {
    pub event_type: ServiceEventType,
    pub source: ServiceId,
    pub data: Option<EventData>,
}

/// Payload of the cooperative scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    ServicePeriod(ServiceId),
    ServiceTimeout(ServiceId),
    Sm(crate::sm::SmTask),
}

/// Deferred command pushed by a service during one of its callbacks.
enum ServiceCommand {
    Complete {
        id: ServiceId,
        data: Option<EventData>,
        log: Option<LogRecord>,
        reschedule: bool,
    },
    Reschedule {
        id: ServiceId,
        immediate: bool,
    },
    RescheduleIfIdle {
        id: ServiceId,
    },
    Active {
        id: ServiceId,
    },
}

/// Shared engine state handed to every service callback.
pub struct SystemContext {
    pub scheduler: Scheduler<Task>,
    pub timer: Rc<dyn Timer>,
    pub rtc: Rc<RefCell<dyn Rtc>>,
    pub config: ConfigStore,
    pub battery: BatteryMonitor,
    outbox: VecDeque<ServiceCommand>,
}

impl SystemContext {
    pub fn new(
        scheduler: Scheduler<Task>,
        timer: Rc<dyn Timer>,
        rtc: Rc<RefCell<dyn Rtc>>,
        config: ConfigStore,
        battery: BatteryMonitor,
    ) -> Self {
        Self {
            scheduler,
            timer,
            rtc,
            config,
            battery,
            outbox: VecDeque::new(),
        }
    }

    /// Wall-clock time, epoch seconds.
    pub fn current_time(&self) -> i64 {
        self.rtc.borrow().now()
    }

    /// Monotonic counter, ms.
    pub fn current_timer_ms(&self) -> u64 {
        self.timer.counter_ms()
    }

    /// Finish the current cycle: optionally persist a log record, broadcast
    /// the event data, then reschedule.
    pub fn complete_service(
        &mut self,
        id: ServiceId,
        data: Option<EventData>,
        log: Option<LogRecord>,
        reschedule: bool,
    ) {
        self.outbox.push_back(ServiceCommand::Complete {
            id,
            data,
            log,
            reschedule,
        });
    }

    /// Request a fresh schedule computation for `id`.
    pub fn request_reschedule(&mut self, id: ServiceId, immediate: bool) {
        self.outbox
            .push_back(ServiceCommand::Reschedule { id, immediate });
    }

    /// Reschedule `id` only when it has no pending period task.
    pub fn request_reschedule_if_idle(&mut self, id: ServiceId) {
        self.outbox.push_back(ServiceCommand::RescheduleIfIdle { id });
    }

    /// Emit SERVICE_ACTIVE for services that defer it past `initiate` (the
    /// Argos service reports active on TX start, not on initiation).
    pub fn mark_service_active(&mut self, id: ServiceId) {
        self.outbox.push_back(ServiceCommand::Active { id });
    }
}

/// Capability interface implemented by each concrete service.
pub trait Service {
    fn init(&mut self, sys: &mut SystemContext);

    fn term(&mut self, sys: &mut SystemContext);

    fn is_enabled(&mut self, sys: &mut SystemContext) -> bool;

    /// Delay until the next cycle, ms; [`SCHEDULE_DISABLED`] to stand down.
    fn next_schedule_in_ms(&mut self, sys: &mut SystemContext) -> u32;

    /// Begin one cycle. The cycle ends through
    /// [`SystemContext::complete_service`] or via [`Service::cancel`].
    fn initiate(&mut self, sys: &mut SystemContext);

    /// Abort the active cycle; returns whether one was active.
    fn cancel(&mut self, sys: &mut SystemContext) -> bool {
        let _ = sys;
        false
    }

    /// Per-cycle timeout, ms; 0 disables it.
    fn next_timeout_ms(&mut self, sys: &mut SystemContext) -> u32 {
        let _ = sys;
        0
    }

    /// (triggered, immediate) on a wet-to-dry transition.
    fn triggered_on_surfaced(&mut self, sys: &mut SystemContext) -> (bool, bool) {
        let _ = sys;
        (false, false)
    }

    fn is_usable_underwater(&self) -> bool {
        false
    }

    /// (triggered, immediate) for an arbitrary peer event.
    fn triggered_on_event(&mut self, sys: &mut SystemContext, event: &ServiceEvent) -> (bool, bool) {
        let _ = (sys, event);
        (false, false)
    }

    /// Peer event delivery beyond the framework's underwater handling.
    fn notify_peer_event(&mut self, sys: &mut SystemContext, event: &ServiceEvent) {
        let _ = (sys, event);
    }

    /// SERVICE_ACTIVE is emitted just before `initiate` unless a service
    /// reports it later itself.
    fn is_active_on_initiate(&self) -> bool {
        true
    }

    /// Asynchronous notification from the hardware owned by this service.
    fn handle_device_event(&mut self, sys: &mut SystemContext, event: &DeviceEvent) {
        let _ = (sys, event);
    }
}

struct Slot {
    id: ServiceId,
    name: &'static str,
    service: Box<dyn Service>,
    logger: Option<Rc<RefCell<dyn Logger>>>,
    started: bool,
    underwater: bool,
    task_period: TaskHandle,
    task_timeout: TaskHandle,
    last_schedule_ms: u32,
}

/// Owns every service slot and runs the framework logic.
#[derive(Default)]
pub struct ServiceManager {
    slots: Vec<Slot>,
    sink: Option<Box<dyn FnMut(&ServiceEvent)>>,
}

impl ServiceManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &mut self,
        id: ServiceId,
        name: &'static str,
        service: Box<dyn Service>,
        logger: Option<Rc<RefCell<dyn Logger>>>,
    ) {
        self.slots.push(Slot {
            id,
            name,
            service,
            logger,
            started: false,
            underwater: false,
            task_period: TaskHandle::default(),
            task_timeout: TaskHandle::default(),
            last_schedule_ms: 0,
        });
    }

    /// External observer for every broadcast event.
    pub fn set_event_sink(&mut self, sink: Box<dyn FnMut(&ServiceEvent)>) {
        self.sink = Some(sink);
    }

    pub fn logger_for(&self, id: ServiceId) -> Option<Rc<RefCell<dyn Logger>>> {
        self.slots
            .iter()
            .find(|s| s.id == id)
            .and_then(|s| s.logger.clone())
    }

    pub fn start_all(&mut self, sys: &mut SystemContext) {
        for i in 0..self.slots.len() {
            self.start_slot(sys, i);
        }
        self.process_commands(sys);
    }

    pub fn stop_all(&mut self, sys: &mut SystemContext) {
        for i in 0..self.slots.len() {
            self.stop_slot(sys, i);
        }
        self.process_commands(sys);
    }

    fn index_of(&self, id: ServiceId) -> Option<usize> {
        self.slots.iter().position(|s| s.id == id)
    }

    fn start_slot(&mut self, sys: &mut SystemContext, i: usize) {
        debug!(name = self.slots[i].name, "service started");
        self.slots[i].started = true;
        self.slots[i].underwater = false;
        self.slots[i].service.init(sys);
        self.reschedule(sys, i, false);
    }

    fn stop_slot(&mut self, sys: &mut SystemContext, i: usize) {
        if !self.slots[i].started {
            return;
        }
        debug!(name = self.slots[i].name, "service stopped");
        self.slots[i].started = false;
        self.deschedule(sys, i);
        if self.slots[i].service.cancel(sys) {
            self.emit(sys, i, ServiceEventType::ServiceInactive, None);
        }
        self.slots[i].service.term(sys);
    }

    fn deschedule(&mut self, sys: &mut SystemContext, i: usize) {
        let slot = &mut self.slots[i];
        sys.scheduler.cancel(&mut slot.task_timeout);
        sys.scheduler.cancel(&mut slot.task_period);
    }

    fn reschedule(&mut self, sys: &mut SystemContext, i: usize, immediate: bool) {
        self.deschedule(sys, i);
        if !self.slots[i].started {
            trace!(name = self.slots[i].name, "reschedule skipped, stopped");
            return;
        }
        if !self.slots[i].service.is_enabled(sys) {
            trace!(name = self.slots[i].name, "reschedule skipped, disabled");
            return;
        }
        let next_ms = if immediate {
            0
        } else {
            self.slots[i].service.next_schedule_in_ms(sys)
        };
        if next_ms == SCHEDULE_DISABLED {
            trace!(name = self.slots[i].name, "schedule currently disabled");
            return;
        }
        debug!(name = self.slots[i].name, next_ms, "service scheduled");
        let slot = &mut self.slots[i];
        slot.last_schedule_ms = next_ms;
        slot.task_period = sys.scheduler.post(
            Task::ServicePeriod(slot.id),
            slot.name,
            DEFAULT_PRIORITY,
            next_ms,
        );
    }

    pub fn last_schedule_ms(&self, id: ServiceId) -> Option<u32> {
        self.index_of(id).map(|i| self.slots[i].last_schedule_ms)
    }

    pub fn is_scheduled(&self, sys: &SystemContext, id: ServiceId) -> bool {
        self.index_of(id)
            .is_some_and(|i| sys.scheduler.is_scheduled(&self.slots[i].task_period))
    }

    /// Entry point for scheduler payloads owned by the framework.
    pub fn dispatch(&mut self, sys: &mut SystemContext, task: Task) {
        match task {
            Task::ServicePeriod(id) => {
                if let Some(i) = self.index_of(id) {
                    self.on_period(sys, i);
                }
            },
            Task::ServiceTimeout(id) => {
                if let Some(i) = self.index_of(id) {
                    self.on_timeout(sys, i);
                }
            },
            Task::Sm(_) => {},
        }
        self.process_commands(sys);
    }

    fn on_period(&mut self, sys: &mut SystemContext, i: usize) {
        if !self.slots[i].started {
            return;
        }
        let timeout_ms = self.slots[i].service.next_timeout_ms(sys);
        if timeout_ms > 0 {
            let slot = &mut self.slots[i];
            slot.task_timeout = sys.scheduler.post(
                Task::ServiceTimeout(slot.id),
                slot.name,
                DEFAULT_PRIORITY,
                timeout_ms,
            );
        }
        let usable = self.slots[i].service.is_usable_underwater();
        if !self.slots[i].underwater || usable {
            trace!(name = self.slots[i].name, "service cycle initiated");
            if self.slots[i].service.is_active_on_initiate() {
                self.emit(sys, i, ServiceEventType::ServiceActive, None);
            }
            self.slots[i].service.initiate(sys);
        } else {
            trace!(name = self.slots[i].name, "underwater, deferring cycle");
            self.reschedule(sys, i, false);
        }
    }

    fn on_timeout(&mut self, sys: &mut SystemContext, i: usize) {
        debug!(name = self.slots[i].name, "service cycle timed out");
        if self.slots[i].service.cancel(sys) {
            self.emit(sys, i, ServiceEventType::ServiceInactive, None);
        }
        self.reschedule(sys, i, false);
    }

    /// Deliver a wet/dry transition to every service.
    pub fn notify_underwater_state(&mut self, sys: &mut SystemContext, underwater: bool) {
        for i in 0..self.slots.len() {
            self.apply_underwater(sys, i, underwater);
        }
        self.process_commands(sys);
    }

    fn apply_underwater(&mut self, sys: &mut SystemContext, i: usize, underwater: bool) {
        if !self.slots[i].started || self.slots[i].service.is_usable_underwater() {
            return;
        }
        self.slots[i].underwater = underwater;
        if underwater {
            if self.slots[i].service.cancel(sys) {
                self.emit(sys, i, ServiceEventType::ServiceInactive, None);
                self.reschedule(sys, i, false);
            }
        } else {
            let (triggered, immediate) = self.slots[i].service.triggered_on_surfaced(sys);
            if triggered {
                self.reschedule(sys, i, immediate);
            }
        }
    }

    /// Route a device notification to its owning service.
    pub fn deliver_device_event(&mut self, sys: &mut SystemContext, event: &DeviceEvent) {
        let target = match event {
            DeviceEvent::Gnss(_) => ServiceId::Gnss,
            DeviceEvent::Artic(_) => ServiceId::ArgosTx,
            DeviceEvent::Reed(_) => return,
        };
        if let Some(i) = self.index_of(target) {
            if self.slots[i].started {
                self.slots[i].service.handle_device_event(sys, event);
            }
        }
        self.process_commands(sys);
    }

    /// Inject an externally produced event onto the bus (tests, platform
    /// glue such as the accelerometer wakeup).
    pub fn inject_event(&mut self, sys: &mut SystemContext, event: ServiceEvent) {
        self.broadcast(sys, &event);
        self.process_commands(sys);
    }

    fn emit(
        &mut self,
        sys: &mut SystemContext,
        i: usize,
        event_type: ServiceEventType,
        data: Option<EventData>,
    ) {
        let event = ServiceEvent {
            event_type,
            source: self.slots[i].id,
            data,
        };
        if let Some(sink) = self.sink.as_mut() {
            sink(&event);
        }
        self.broadcast(sys, &event);
    }

    fn broadcast(&mut self, sys: &mut SystemContext, event: &ServiceEvent) {
        let underwater_state = match (&event.source, &event.event_type, &event.data) {
            (
                ServiceId::UwSensor,
                ServiceEventType::ServiceLogUpdated,
                Some(EventData::Flag(state)),
            ) => Some(*state),
            _ => None,
        };

        for i in 0..self.slots.len() {
            if self.slots[i].id == event.source || !self.slots[i].started {
                continue;
            }
            // Service-specific handling runs before the framework's
            // underwater gating so state it records is visible to any
            // reschedule the gate performs
            self.slots[i].service.notify_peer_event(sys, event);
            if let Some(state) = underwater_state {
                self.apply_underwater(sys, i, state);
            }
            let (triggered, immediate) = self.slots[i].service.triggered_on_event(sys, event);
            if triggered {
                self.reschedule(sys, i, immediate);
            }
        }
    }

    fn process_commands(&mut self, sys: &mut SystemContext) {
        while let Some(command) = sys.outbox.pop_front() {
            match command {
                ServiceCommand::Complete {
                    id,
                    data,
                    log,
                    reschedule,
                } => {
                    let Some(i) = self.index_of(id) else { continue };
                    trace!(name = self.slots[i].name, "service cycle complete");
                    // The cycle is over; its watchdog must not fire
                    let mut timeout = self.slots[i].task_timeout;
                    sys.scheduler.cancel(&mut timeout);
                    self.slots[i].task_timeout = timeout;

                    if let (Some(logger), Some(record)) = (&self.slots[i].logger, &log) {
                        if let Err(e) = logger.borrow_mut().write(record) {
                            tracing::warn!(name = self.slots[i].name, error = %e, "log write failed");
                        }
                    }
                    if let Some(data) = data {
                        let event_type = match data {
                            EventData::Gps(_) => ServiceEventType::SensorLogUpdated,
                            _ => ServiceEventType::ServiceLogUpdated,
                        };
                        self.emit(sys, i, event_type, Some(data));
                    }
                    if reschedule {
                        self.reschedule(sys, i, false);
                    }
                },
                ServiceCommand::Reschedule { id, immediate } => {
                    if let Some(i) = self.index_of(id) {
                        self.reschedule(sys, i, immediate);
                    }
                },
                ServiceCommand::RescheduleIfIdle { id } => {
                    if let Some(i) = self.index_of(id) {
                        if !sys.scheduler.is_scheduled(&self.slots[i].task_period) {
                            self.reschedule(sys, i, false);
                        }
                    }
                },
                ServiceCommand::Active { id } => {
                    if let Some(i) = self.index_of(id) {
                        self.emit(sys, i, ServiceEventType::ServiceActive, None);
                    }
                },
            }
        }
    }
}
