//! CQL binary protocol: protocol versions, in-wire types, request bodies
//! and the parts of RESULT responses that concern prepared statements.

pub mod frame_errors;
pub mod request;
pub mod response;
pub mod types;

use std::fmt::Display;

use thiserror::Error;

/// Version of the native protocol negotiated on a connection.
///
/// The version gates which encodings are legal: unset markers, the width of
/// collection length prefixes, which native types exist, and which fields
/// PREPARE/EXECUTE bodies carry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[non_exhaustive]
pub enum ProtocolVersion {
    V2 = 2,
    V3 = 3,
    #[default]
    V4 = 4,
    V5 = 5,
}

impl ProtocolVersion {
    /// The newest version understood by this crate.
    pub const LATEST: ProtocolVersion = ProtocolVersion::V5;

    /// Returns the numeric version, as sent in the frame header.
    #[inline]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Unset values (`[value]` with length -2) were introduced in v4.
    #[inline]
    pub fn supports_unset(self) -> bool {
        self >= ProtocolVersion::V4
    }

    /// In v2, collections are framed with `[short]` counts and `[short bytes]` elements.
    #[inline]
    pub fn collection_length_is_short(self) -> bool {
        self == ProtocolVersion::V2
    }

    /// smallint, tinyint, date and time were introduced in v4.
    #[inline]
    pub fn supports_new_native_types(self) -> bool {
        self >= ProtocolVersion::V4
    }

    #[inline]
    pub fn supports_tuples_and_udts(self) -> bool {
        self >= ProtocolVersion::V3
    }

    /// Prepared metadata carries partition key indexes since v4.
    #[inline]
    pub fn prepared_has_pk_indexes(self) -> bool {
        self >= ProtocolVersion::V4
    }

    /// PREPARED results and EXECUTE requests carry a result metadata id since v5.
    #[inline]
    pub fn supports_result_metadata_id(self) -> bool {
        self >= ProtocolVersion::V5
    }

    /// Query parameter flags are an `[int]` since v5, a `[byte]` before.
    #[inline]
    pub fn query_flags_are_int(self) -> bool {
        self >= ProtocolVersion::V5
    }
}

impl Display for ProtocolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.as_u8())
    }
}

/// The numeric version received from a peer is not supported.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("Unsupported protocol version: {0}")]
pub struct UnsupportedProtocolVersion(pub u8);

impl TryFrom<u8> for ProtocolVersion {
    type Error = UnsupportedProtocolVersion;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        // The high bit marks response frames.
        match value & 0x7F {
            2 => Ok(ProtocolVersion::V2),
            3 => Ok(ProtocolVersion::V3),
            4 => Ok(ProtocolVersion::V4),
            5 => Ok(ProtocolVersion::V5),
            _ => Err(UnsupportedProtocolVersion(value)),
        }
    }
}
