//! This module contains various errors which can be returned by `cqlbind`.

use cqlbind_cql::codec::CodecLookupError;
use cqlbind_cql::frame::frame_errors::{PreparedParseError, ResultMetadataParseError};
use cqlbind_cql::serialize::SerializationError;
use cqlbind_cql::ProtocolVersion;
use thiserror::Error;

pub use crate::statement::prepared::{
    PartitionKeyError, PartitionKeyExtractionError, TokenCalculationError,
};
pub use crate::statement::InvalidPageSize;

/// Failed to bind values to a prepared statement.
///
/// Binding is all-or-nothing: when this error is returned, no bound statement
/// (or builder change) is produced.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum BindError {
    /// The number of values differs from the number of bind markers.
    #[error(transparent)]
    Arity(#[from] ArityError),

    /// A value could not be encoded for its bind marker.
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    /// A value is not allowed by the negotiated protocol version.
    #[error(transparent)]
    ProtocolViolation(#[from] ProtocolViolation),

    /// The builder was asked for a bind marker that does not exist.
    #[error("No bind marker at position {index}, the statement has {count}")]
    NoSuchPosition { index: usize, count: usize },

    /// The builder was asked for a bind marker name that does not exist.
    #[error("No bind marker named {name}")]
    NoSuchVariable { name: String },
}

/// The number of values differs from the number of bind markers.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Expected {expected} values, got {provided}")]
pub struct ArityError {
    /// Number of bind markers of the statement.
    pub expected: usize,
    /// Number of values given.
    pub provided: usize,
}

/// A value could not be encoded for the bind marker at `index`.
#[derive(Error, Debug, Clone)]
#[error("Failed to encode the value for column {column} (position {index}): {kind}")]
pub struct EncodingError {
    /// Position of the bind marker.
    pub index: usize,
    /// Name of the bind marker.
    pub column: String,
    /// What went wrong.
    pub kind: EncodingErrorKind,
}

/// Describes why a value could not be encoded.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum EncodingErrorKind {
    /// No codec accepts the value for the declared type.
    #[error(transparent)]
    CodecNotFound(CodecLookupError),

    /// Several codecs accept the value for the declared type.
    #[error(transparent)]
    AmbiguousCodec(CodecLookupError),

    /// The codec requested explicitly for the value cannot encode it.
    #[error("Codec {codec} cannot encode a {value_kind} value as {cql_type} with protocol {version}")]
    IncompatibleCodec {
        codec: &'static str,
        value_kind: &'static str,
        cql_type: String,
        version: ProtocolVersion,
    },

    /// The codec failed while encoding the value.
    #[error(transparent)]
    Serialization(SerializationError),
}

impl From<CodecLookupError> for EncodingErrorKind {
    fn from(err: CodecLookupError) -> Self {
        match err {
            CodecLookupError::Ambiguous { .. } => EncodingErrorKind::AmbiguousCodec(err),
            _ => EncodingErrorKind::CodecNotFound(err),
        }
    }
}

/// A value is not allowed by the negotiated protocol version.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProtocolViolation {
    /// Unset values need protocol v4 or newer.
    #[error("Value for column {column} (position {index}) is unset, which protocol {version} does not support")]
    UnsetNotSupported {
        index: usize,
        column: String,
        version: ProtocolVersion,
    },
}

/// Failed to create a prepared statement from a PREPARE response.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum PrepareError {
    /// The RESULT::Prepared body could not be decoded.
    #[error("Failed to parse the PREPARE response: {0}")]
    Parse(#[from] PreparedParseError),

    /// The variable metadata is inconsistent.
    #[error("Invalid prepared metadata: {0}")]
    InvalidMetadata(#[from] ResultMetadataParseError),

    /// The partition key indexes do not form a sequence.
    #[error("Partition key sequence number {sequence} out of range, the key has {pk_count} components")]
    InvalidPkSequence { sequence: u16, pk_count: usize },

    /// Two partition key components claim the same place in the key.
    #[error("Partition key sequence number {sequence} is used more than once")]
    DuplicatePkSequence { sequence: u16 },

    /// The partition key indexes are not in increasing bind marker order.
    #[error("Partition key indexes are not sorted: {index} comes after {previous}")]
    UnsortedPkIndexes { previous: u16, index: u16 },

    /// Protocol v5 requires a result metadata id to execute the statement.
    #[error("Protocol {0} requires a result metadata id, but the PREPARE response has none")]
    MissingResultMetadataId(ProtocolVersion),
}
