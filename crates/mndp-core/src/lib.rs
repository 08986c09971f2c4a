//! Passive listener for the MikroTik Neighbor Discovery Protocol (MNDP).
//!
//! MNDP devices announce themselves by broadcasting a small TLV-encoded
//! datagram on UDP port 5678. This crate binds a socket, decodes each
//! announcement into a [`Device`], and delivers devices and failures over
//! bounded event streams. The protocol is receive-only: nothing is ever
//! transmitted.
//!
//! ```no_run
//! use mndp_core::{DiscoveryService, Options};
//!
//! # async fn example() -> mndp_core::Result<()> {
//! let (service, mut events) = DiscoveryService::new(Options::default())?;
//! service.start().await;
//!
//! while let Some(device) = events.devices.recv().await {
//!     println!("{} ({})", device.identity, device.ip);
//! }
//! # Ok(())
//! # }
//! ```

pub mod discovery;
pub mod error;
pub mod protocol;
pub mod types;

pub use discovery::{
    DiscoveryEvents, DiscoveryService, Family, Options, ServiceState, DISCOVERY_PORT,
};
pub use error::{CoreError, DecodeError, Result};
pub use types::{Device, MacAddr};
