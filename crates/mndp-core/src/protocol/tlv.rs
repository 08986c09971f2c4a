//! TLV decoder for MNDP announcements.
//!
//! Pure function from a raw datagram to a [`Device`]; no I/O, no shared
//! state. Malformed input is a returned error, never a panic.

use std::time::Duration;

use bytes::Buf;

use crate::error::DecodeError;
use crate::types::{Device, MacAddr};

/// MNDP TLV attribute type codes.
pub const TLV_MAC_ADDRESS: u16 = 1;
pub const TLV_IDENTITY: u16 = 5;
pub const TLV_VERSION: u16 = 7;
pub const TLV_PLATFORM: u16 = 8;
pub const TLV_UPTIME: u16 = 10;
pub const TLV_BOARD: u16 = 12;

/// Fixed header preceding the TLV stream (version/command fields, skipped).
const HEADER_LEN: usize = 4;

/// Header plus one minimal TLV record; anything shorter is port noise.
const MIN_PACKET_LEN: usize = 8;

/// Decode one MNDP announcement.
///
/// Returns `Ok(None)` for datagrams too short to be an announcement (benign
/// noise on the broadcast port, not an error). A TLV whose declared length
/// overruns the buffer aborts the whole datagram; no partial device is
/// produced. Unknown attribute types are skipped via their declared length,
/// and a repeated attribute keeps its last occurrence.
pub fn parse_announcement(data: &[u8], ip: String) -> Result<Option<Device>, DecodeError> {
    if data.len() < MIN_PACKET_LEN {
        return Ok(None);
    }

    let mut buf = &data[HEADER_LEN..];
    let mut device = Device::new(ip);

    // Need at least type (2) + length (2) for another record.
    while buf.remaining() >= 4 {
        let tlv_type = buf.get_u16();
        let declared = buf.get_u16() as usize;

        if buf.remaining() < declared {
            return Err(DecodeError::LengthOverrun {
                declared,
                remaining: buf.remaining(),
            });
        }

        let value = buf.copy_to_bytes(declared);

        match tlv_type {
            TLV_MAC_ADDRESS => device.mac = Some(MacAddr::new(value.to_vec())),
            TLV_IDENTITY => device.identity = String::from_utf8_lossy(&value).into_owned(),
            TLV_VERSION => device.version = String::from_utf8_lossy(&value).into_owned(),
            TLV_PLATFORM => device.platform = String::from_utf8_lossy(&value).into_owned(),
            TLV_BOARD => device.board = String::from_utf8_lossy(&value).into_owned(),
            TLV_UPTIME => {
                // Uptime is a 4-byte little-endian seconds counter; any
                // other length leaves the field at zero.
                if let Ok(raw) = <[u8; 4]>::try_from(value.as_ref()) {
                    device.uptime = Duration::from_secs(u64::from(u32::from_le_bytes(raw)));
                }
            }
            _ => {} // Unknown attribute: consumed for cursor advancement only.
        }
    }

    Ok(Some(device))
}
