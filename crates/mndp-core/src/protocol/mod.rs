//! MNDP wire format.
//!
//! An announcement is a 4-byte header (not otherwise interpreted) followed
//! by TLV records: type (u16 BE), length (u16 BE), value (length bytes).

pub mod tlv;

pub use tlv::parse_announcement;
