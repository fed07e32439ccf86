//! Bodies of the requests a prepared statement takes part in.

pub mod execute;
pub mod prepare;
pub mod query;

use bytes::Bytes;
use thiserror::Error;

use crate::Consistency;

pub use execute::Execute;
pub use prepare::Prepare;

use super::frame_errors::{CqlRequestSerializationError, LowLevelDeserializationError};
use super::ProtocolVersion;

/// Opcode of a request, used to identify the request type in a CQL frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum RequestOpcode {
    /// Prepares a query for later execution (through EXECUTE).
    Prepare = 0x09,
    /// Executes a prepared query.
    Execute = 0x0A,
}

/// Requests that can be serialized into a CQL frame body.
///
/// The layout of both supported requests differs between protocol versions,
/// so the negotiated version is passed along.
pub trait SerializableRequest {
    /// Opcode of the request, used to identify the request type in the CQL frame.
    const OPCODE: RequestOpcode;

    /// Serializes the request into the provided buffer.
    fn serialize(
        &self,
        version: ProtocolVersion,
        buf: &mut Vec<u8>,
    ) -> Result<(), CqlRequestSerializationError>;

    /// Serializes the request into a heap-allocated `Bytes` object.
    fn to_bytes(&self, version: ProtocolVersion) -> Result<Bytes, CqlRequestSerializationError> {
        let mut v = Vec::new();
        self.serialize(version, &mut v)?;
        Ok(v.into())
    }
}

/// Requests that can be deserialized from a CQL frame body.
///
/// Not used by the binding path itself, but very useful for testing
/// (e.g. asserting that the produced requests have proper parameters set).
pub trait DeserializableRequest: SerializableRequest + Sized {
    /// Deserializes the request from the provided buffer.
    fn deserialize(
        buf: &mut &[u8],
        version: ProtocolVersion,
    ) -> Result<Self, RequestDeserializationError>;
}

/// An error type returned by [`DeserializableRequest::deserialize`].
#[doc(hidden)]
#[derive(Debug, Error)]
pub enum RequestDeserializationError {
    #[error("Low level deser error: {0}")]
    LowLevelDeserialization(#[from] LowLevelDeserializationError),
    #[error("Io error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Specified flags are not recognised: {:02x}", flags)]
    UnknownFlags { flags: u32 },
    #[error("Named values in frame are currently unsupported")]
    NamedValuesUnsupported,
    #[error("Expected SerialConsistency, got regular Consistency: {0}")]
    ExpectedSerialConsistency(Consistency),
}
