//! Argos uplink/downlink engine: packet building, transmission scheduling,
//! the GNSS depth pile, and downlink AOP maintenance.

pub mod depth_pile;
pub mod packet;
pub mod rx;
pub mod service;
pub mod tx_sched;

pub use depth_pile::GpsDepthPile;
pub use packet::ArgosPacketBuilder;
pub use service::ArgosTxService;
pub use tx_sched::ArgosTxScheduler;
