//! Configuration store: the typed parameter table, its persisted
//! representation, the AOP satellite table, and the mode-dependent
//! projection into GNSS/Argos runtime configurations.

pub mod aop;
pub mod params;
pub mod store;

pub use params::{ParamId, ParamValue};
pub use store::{ArgosConfig, ConfigMode, ConfigStore, GnssConfig};
