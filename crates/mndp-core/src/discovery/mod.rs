//! Passive UDP discovery of MNDP announcements.
//!
//! [`DiscoveryService`] owns the socket lifecycle and publishes everything it
//! observes on four bounded event streams handed out at construction time.

pub mod service;

pub use service::{
    DiscoveryEvents, DiscoveryService, Family, Options, ServiceState, DISCOVERY_PORT,
};
