//! Reversible mappings between [`CqlValue`]s and their binary form.
//!
//! A [`Codec`] knows which CQL types it decodes and which `(value, type)`
//! pairs it encodes. Codecs are collected in a [`CodecRegistry`], which is
//! asked for exactly one codec per value: finding none or several is an error.
//!
//! Composite codecs (collections, tuples, UDTs) do not encode their elements
//! themselves. They ask the registry again through [`CodecContext`], so a
//! codec registered by the user is picked for nested values as well.

use std::error::Error;
use std::sync::Arc;

use thiserror::Error;

use crate::frame::frame_errors::LowLevelDeserializationError;
use crate::frame::response::result::ColumnType;
use crate::frame::ProtocolVersion;
use crate::serialize::{CellWriter, SerializationError, WrittenCellProof};
use crate::value::CqlValue;

mod collection;
mod native;
mod registry;

pub use collection::{ListCodec, MapCodec, SetCodec, TupleCodec, UdtCodec};
pub use native::{
    AsciiCodec, BigIntCodec, BlobCodec, BooleanCodec, CounterCodec, DateCodec, DecimalCodec,
    DoubleCodec, DurationCodec, EmptyCodec, FloatCodec, InetCodec, IntCodec, SmallIntCodec,
    TextCodec, TimeCodec, TimestampCodec, TimeuuidCodec, TinyIntCodec, UuidCodec, VarintCodec,
};
pub use registry::{CodecLookupError, CodecRegistry};

/// A reversible encoding of some values of some CQL types.
pub trait Codec: std::fmt::Debug + Send + Sync {
    /// Name used in diagnostics, e.g. when several codecs match a value.
    fn name(&self) -> &'static str;

    /// Whether this codec decodes cells of type `typ`.
    fn accepts_type(&self, typ: &ColumnType) -> bool;

    /// Whether this codec encodes `value` as a cell of type `typ`.
    fn accepts(&self, value: &CqlValue, typ: &ColumnType) -> bool;

    /// Whether this codec can be used with the given protocol version.
    fn supports_version(&self, _version: ProtocolVersion) -> bool {
        true
    }

    /// Writes `value` as a cell of type `typ`.
    ///
    /// Only called for pairs the codec [accepts](Codec::accepts).
    fn encode<'b>(
        &self,
        value: &CqlValue,
        typ: &ColumnType,
        ctx: &CodecContext<'_>,
        writer: CellWriter<'b>,
    ) -> Result<WrittenCellProof<'b>, SerializationError>;

    /// Reads the contents of a non-null cell of type `typ`.
    fn decode(
        &self,
        typ: &ColumnType,
        bytes: &[u8],
        ctx: &CodecContext<'_>,
    ) -> Result<CqlValue, DeserializationError>;
}

/// The registry and protocol version an encoding or decoding runs under.
#[derive(Debug, Clone, Copy)]
pub struct CodecContext<'a> {
    registry: &'a CodecRegistry,
    version: ProtocolVersion,
}

impl<'a> CodecContext<'a> {
    #[inline]
    pub fn new(registry: &'a CodecRegistry, version: ProtocolVersion) -> Self {
        Self { registry, version }
    }

    #[inline]
    pub fn registry(&self) -> &'a CodecRegistry {
        self.registry
    }

    #[inline]
    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    /// Encodes `value` with the single codec the registry finds for it.
    pub fn encode<'b>(
        &self,
        value: &CqlValue,
        typ: &ColumnType,
        writer: CellWriter<'b>,
    ) -> Result<WrittenCellProof<'b>, SerializationError> {
        let codec = self
            .registry
            .find(value, typ, self.version)
            .map_err(SerializationError::new)?;
        codec.encode(value, typ, self, writer)
    }

    /// Decodes the contents of a non-null cell of type `typ`.
    ///
    /// A zero-length cell of a type that admits the empty value decodes to
    /// [`CqlValue::Empty`]; for string and blob types it is an empty string or blob.
    pub fn decode(&self, typ: &ColumnType, bytes: &[u8]) -> Result<CqlValue, DeserializationError> {
        if bytes.is_empty()
            && typ.supports_special_empty_value()
            && !matches!(typ, ColumnType::Ascii | ColumnType::Blob | ColumnType::Text)
        {
            return Ok(CqlValue::Empty);
        }
        let codec = self
            .registry
            .find_for_type(typ, self.version)
            .map_err(DeserializationError::new)?;
        codec.decode(typ, bytes, self)
    }
}

/// A type-erased deserialization error.
#[derive(Debug, Clone, Error)]
#[error("DeserializationError: {0}")]
pub struct DeserializationError(Arc<dyn Error + Send + Sync>);

impl DeserializationError {
    /// Constructs a new `DeserializationError`.
    #[inline]
    pub fn new(err: impl Error + Send + Sync + 'static) -> Self {
        Self(Arc::new(err))
    }

    /// Retrieve an error reason by downcasting to specific type.
    pub fn downcast_ref<T: Error + 'static>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }
}

/// Failed to decode a cell with one of the built-in codecs.
#[derive(Debug, Error, Clone)]
#[error("Failed to decode a cell with codec {codec}: {kind}")]
pub struct BuiltinDeserializationError {
    /// Name of the codec that failed.
    pub codec: &'static str,

    /// Detailed information about the failure.
    pub kind: BuiltinDeserializationErrorKind,
}

pub(crate) fn mk_deser_err(
    codec: &'static str,
    kind: impl Into<BuiltinDeserializationErrorKind>,
) -> DeserializationError {
    DeserializationError::new(BuiltinDeserializationError {
        codec,
        kind: kind.into(),
    })
}

/// Describes why decoding a cell failed.
#[derive(Debug, Error, Clone)]
#[non_exhaustive]
pub enum BuiltinDeserializationErrorKind {
    /// A fixed-size type got a cell of a different size.
    #[error("expected {expected} bytes, got {got}")]
    ByteLengthMismatch { expected: usize, got: usize },

    /// An `ascii` cell contains non-ASCII bytes.
    #[error("expected a valid ASCII string")]
    ExpectedAscii,

    /// A `text` cell is not valid UTF-8.
    #[error(transparent)]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// An `inet` cell is neither 4 nor 16 bytes long.
    #[error("invalid inet address length: {0}, expected 4 or 16")]
    BadInetLength(usize),

    /// A `decimal` or `varint` cell could not be read.
    #[error("malformed number: {0}")]
    MalformedNumber(&'static str),

    /// A nested value could not be read from the cell.
    #[error(transparent)]
    RawCellReadError(#[from] LowLevelDeserializationError),

    /// A collection element was null, which collections cannot hold.
    #[error("collection elements cannot be null")]
    NullCollectionElement,

    /// The codec was asked to decode a type it does not accept.
    #[error("the codec does not decode {0}")]
    UnexpectedType(String),

    /// The cell has bytes left after all declared elements were read.
    #[error("{0} unexpected trailing bytes")]
    TrailingBytes(usize),
}

impl From<std::io::Error> for BuiltinDeserializationErrorKind {
    fn from(err: std::io::Error) -> Self {
        BuiltinDeserializationErrorKind::RawCellReadError(err.into())
    }
}

#[cfg(test)]
#[path = "codec_tests.rs"]
mod tests;
