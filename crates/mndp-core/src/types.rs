//! Type definitions for discovered devices.

use std::fmt;
use std::time::Duration;

use serde::{Serialize, Serializer};

/// Hardware (MAC) address as announced by the device.
///
/// MNDP carries the raw bytes; real announcements use 6, but the protocol
/// does not forbid other lengths, so this stores whatever was on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacAddr(Vec<u8>);

impl MacAddr {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ":")?;
            }
            write!(f, "{:02X}", byte)?;
        }
        Ok(())
    }
}

impl Serialize for MacAddr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A device discovered from a single MNDP announcement.
///
/// Created fully populated by the decoder; one instance per datagram, never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    /// Source IP address of the announcement (MNDP carries no IP field).
    pub ip: String,
    /// Announced MAC address, if the attribute was present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mac: Option<MacAddr>,
    /// Configured device identity.
    pub identity: String,
    /// RouterOS version string.
    pub version: String,
    /// Device platform (e.g. "MikroTik").
    pub platform: String,
    /// Hardware board model (e.g. "RB4011iGS+").
    pub board: String,
    /// Device uptime; zero when absent or malformed.
    #[serde(serialize_with = "uptime_seconds")]
    pub uptime: Duration,
}

impl Device {
    /// A device with only the source address known and every attribute at
    /// its empty value.
    pub fn new(ip: String) -> Self {
        Self {
            ip,
            mac: None,
            identity: String::new(),
            version: String::new(),
            platform: String::new(),
            board: String::new(),
            uptime: Duration::ZERO,
        }
    }
}

fn uptime_seconds<S: Serializer>(uptime: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(uptime.as_secs())
}
