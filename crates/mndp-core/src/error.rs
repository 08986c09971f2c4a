//! Error types for mndp-core.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Errors published on the discovery service's error stream (plus the one
/// synchronous construction failure, `InvalidHost`).
#[derive(Debug, Error)]
pub enum CoreError {
    /// The socket could not be bound; the service never started listening.
    #[error("failed to bind to {addr}: {source}")]
    Bind { addr: SocketAddr, source: io::Error },

    /// A receive call failed for a reason other than deliberate shutdown.
    #[error("failed to read from socket: {0}")]
    Receive(#[from] io::Error),

    /// One datagram carried a malformed TLV stream and was dropped.
    #[error("failed to decode announcement: {0}")]
    Decode(#[from] DecodeError),

    /// The configured bind host is not a valid IP address.
    #[error("invalid bind host: {0}")]
    InvalidHost(String),
}

/// TLV decode failure for a single datagram.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("corrupt packet: declared length {declared} exceeds remaining {remaining} bytes")]
    LengthOverrun { declared: usize, remaining: usize },
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_error_display() {
        let err = DecodeError::LengthOverrun {
            declared: 300,
            remaining: 12,
        };
        assert_eq!(
            err.to_string(),
            "corrupt packet: declared length 300 exceeds remaining 12 bytes"
        );
    }

    #[test]
    fn core_error_wraps_decode_error() {
        let err: CoreError = DecodeError::LengthOverrun {
            declared: 8,
            remaining: 0,
        }
        .into();
        assert!(err.to_string().contains("failed to decode announcement"));
    }
}
