//! Operational engine for a battery-powered Argos/GNSS asset-tracker
//! beacon.
//!
//! The crate is hardware-free: every peripheral (GNSS receiver, Argos
//! transceiver, storage, battery gauge, control transport) is consumed
//! through the trait interfaces in [`hal`], and the whole engine runs on a
//! single-threaded cooperative scheduler driven by the port's main loop.
//!
//! The moving parts:
//!
//! - [`codec`]: bit packer, CRC-8 and BCH encoders behind the bit-exact
//!   Argos uplink frames built in [`argos::packet`].
//! - [`config`]: the typed parameter store, its persisted image, and the
//!   NORMAL / LOW-BATTERY / OUT-OF-ZONE profile projection.
//! - [`sched`] and [`service`]: the deferred-task queue and the service
//!   lifecycle framework (periods, timeouts, underwater gating, peer
//!   events).
//! - [`argos`]: transmission scheduling (duty cycle, legacy, pass
//!   prediction, certification), the GNSS depth pile, and downlink AOP
//!   maintenance.
//! - [`protocol`]: the framed ASCII control protocol for configuration,
//!   log extraction and bench commands.
//! - [`sm`]: the Boot/Off/Idle/Operational/Configuration/Error device
//!   state machine and run loop.

pub use crate::config::{ArgosConfig, ConfigMode, ConfigStore, GnssConfig, ParamId, ParamValue};
pub use crate::error::{ConfigError, DeviceError, FilesystemError, PrepassError, ProtocolError};
pub use crate::sched::{Scheduler, TaskHandle};
pub use crate::service::{
    Service, ServiceEvent, ServiceEventType, ServiceId, ServiceManager, SystemContext, Task,
};
pub use crate::sm::{Device, DevicePlatform, DeviceState};

pub mod argos;
pub mod battery;
pub mod codec;
pub mod config;
pub mod constants;
pub mod error;
pub mod hal;
pub mod logging;
pub mod prepass;
pub mod protocol;
pub mod sched;
pub mod service;
pub mod sm;
pub mod timeutil;

#[cfg(test)]
pub(crate) mod testutil;
