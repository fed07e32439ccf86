//! Writing encoded cells in `[value]` framing.

use std::{error::Error, fmt::Display, sync::Arc};

use thiserror::Error;

pub mod row;
pub mod writers;

pub use writers::{CellValueBuilder, CellWriter, RowWriter, WrittenCellProof};

/// An error indicating that a failure happened during serialization.
///
/// The error is type-erased so that codecs registered by users can return
/// their own errors. The built-in codecs return [`BuiltinSerializationError`].
#[derive(Debug, Clone, Error)]
pub struct SerializationError(Arc<dyn Error + Send + Sync>);

impl SerializationError {
    /// Constructs a new `SerializationError`.
    #[inline]
    pub fn new(err: impl Error + Send + Sync + 'static) -> SerializationError {
        SerializationError(Arc::new(err))
    }

    /// Retrieve an error reason by downcasting to specific type.
    pub fn downcast_ref<T: Error + 'static>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }
}

impl Display for SerializationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SerializationError: {}", self.0)
    }
}

impl From<writers::CellOverflowError> for SerializationError {
    fn from(err: writers::CellOverflowError) -> Self {
        SerializationError::new(err)
    }
}

/// Failed to serialize a value with one of the built-in codecs.
#[derive(Debug, Error, Clone)]
#[error("Failed to serialize a value with codec {codec}: {kind}")]
pub struct BuiltinSerializationError {
    /// Name of the codec that failed.
    pub codec: &'static str,

    /// Detailed information about the failure.
    pub kind: BuiltinSerializationErrorKind,
}

pub(crate) fn mk_ser_err(
    codec: &'static str,
    kind: impl Into<BuiltinSerializationErrorKind>,
) -> SerializationError {
    SerializationError::new(BuiltinSerializationError {
        codec,
        kind: kind.into(),
    })
}

/// Describes why serializing a value failed.
#[derive(Debug, Error, Clone)]
#[non_exhaustive]
pub enum BuiltinSerializationErrorKind {
    /// The value does not match what the codec encodes.
    #[error("the codec cannot encode a {value_kind} value as {cql_type}")]
    MismatchedValue {
        value_kind: &'static str,
        cql_type: String,
    },

    /// The encoded value is larger than the protocol allows.
    #[error("the value is too big to be sent in a request - max 2GiB allowed")]
    SizeOverflow,

    /// A collection has more elements than the protocol version can express.
    #[error("the collection has {len} elements, more than the protocol allows")]
    TooManyElements { len: usize },

    /// Protocol v2 collections cannot contain null elements.
    #[error("protocol v2 collections cannot contain null or unset elements")]
    NullElementNotSupported,

    /// The value has more fields than the tuple or UDT type declares.
    #[error("the value has {actual} fields, but the type declares {expected}")]
    WrongFieldCount { expected: usize, actual: usize },

    /// A UDT value names a field in a different position than the type.
    #[error("expected field {expected} at this position, got {actual}")]
    FieldNameMismatch { expected: String, actual: String },

    /// The value is ASCII-typed but contains non-ASCII characters.
    #[error("the string contains non-ASCII characters")]
    NonAsciiString,

    /// Too many values to add, max 65,535 values can be sent in a request.
    #[error("Too many values to add, max 65,535 values can be sent in a request")]
    TooManyValues,
}

impl From<writers::CellOverflowError> for BuiltinSerializationErrorKind {
    fn from(_: writers::CellOverflowError) -> Self {
        BuiltinSerializationErrorKind::SizeOverflow
    }
}
