use std::sync::Arc;

use itertools::Itertools;
use thiserror::Error;

use super::collection::{ListCodec, MapCodec, SetCodec, TupleCodec, UdtCodec};
use super::native::{
    AsciiCodec, BigIntCodec, BlobCodec, BooleanCodec, CounterCodec, DateCodec, DecimalCodec,
    DoubleCodec, DurationCodec, EmptyCodec, FloatCodec, InetCodec, IntCodec, SmallIntCodec,
    TextCodec, TimeCodec, TimestampCodec, TimeuuidCodec, TinyIntCodec, UuidCodec, VarintCodec,
};
use super::{Codec, CodecContext, DeserializationError};
use crate::frame::response::result::ColumnType;
use crate::frame::ProtocolVersion;
use crate::serialize::{CellWriter, SerializationError, WrittenCellProof};
use crate::value::CqlValue;

/// Failed to find exactly one codec for a value or a type.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CodecLookupError {
    /// No registered codec accepts the value or type under the protocol version.
    #[error("No codec found for {target} with protocol {version}")]
    NotFound {
        target: String,
        version: ProtocolVersion,
    },

    /// More than one registered codec accepts the value or type.
    #[error("Ambiguous codecs for {target}: {}", .candidates.iter().join(", "))]
    Ambiguous {
        target: String,
        candidates: Vec<&'static str>,
    },
}

/// A set of codecs, consulted to encode and decode values.
///
/// [`CodecRegistry::new`] holds the built-in codecs, which never overlap.
/// Additional codecs may be [registered](CodecRegistry::register), e.g. for
/// custom types; a registration that overlaps with an existing codec makes
/// lookups of the shared values fail with [`CodecLookupError::Ambiguous`].
#[derive(Debug, Clone)]
pub struct CodecRegistry {
    codecs: Vec<Arc<dyn Codec>>,
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CodecRegistry {
    /// Creates a registry holding the built-in codecs.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry
            .register(EmptyCodec)
            .register(AsciiCodec)
            .register(TextCodec)
            .register(BlobCodec)
            .register(BooleanCodec)
            .register(TinyIntCodec)
            .register(SmallIntCodec)
            .register(IntCodec)
            .register(BigIntCodec)
            .register(CounterCodec)
            .register(FloatCodec)
            .register(DoubleCodec)
            .register(VarintCodec)
            .register(DecimalCodec)
            .register(DateCodec)
            .register(TimeCodec)
            .register(TimestampCodec)
            .register(DurationCodec)
            .register(UuidCodec)
            .register(TimeuuidCodec)
            .register(InetCodec)
            .register(ListCodec)
            .register(SetCodec)
            .register(MapCodec)
            .register(TupleCodec)
            .register(UdtCodec);
        registry
    }

    /// Creates a registry with no codecs at all.
    pub fn empty() -> Self {
        Self { codecs: Vec::new() }
    }

    /// Adds a codec to the registry.
    pub fn register(&mut self, codec: impl Codec + 'static) -> &mut Self {
        self.register_shared(Arc::new(codec))
    }

    /// Adds a codec that is already shared with other registries.
    pub fn register_shared(&mut self, codec: Arc<dyn Codec>) -> &mut Self {
        self.codecs.push(codec);
        self
    }

    /// Number of codecs in the registry.
    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }

    /// Finds the only codec that encodes `value` as `typ` under `version`.
    pub fn find(
        &self,
        value: &CqlValue,
        typ: &ColumnType,
        version: ProtocolVersion,
    ) -> Result<&Arc<dyn Codec>, CodecLookupError> {
        self.find_single(
            |codec| codec.supports_version(version) && codec.accepts(value, typ),
            || format!("a {} value as {}", value.kind(), typ),
            version,
        )
    }

    /// Finds the only codec that decodes cells of `typ` under `version`.
    pub fn find_for_type(
        &self,
        typ: &ColumnType,
        version: ProtocolVersion,
    ) -> Result<&Arc<dyn Codec>, CodecLookupError> {
        self.find_single(
            |codec| codec.supports_version(version) && codec.accepts_type(typ),
            || format!("type {}", typ),
            version,
        )
    }

    fn find_single(
        &self,
        predicate: impl Fn(&Arc<dyn Codec>) -> bool,
        target: impl FnOnce() -> String,
        version: ProtocolVersion,
    ) -> Result<&Arc<dyn Codec>, CodecLookupError> {
        let mut matching = self.codecs.iter().filter(|codec| predicate(codec));
        let Some(first) = matching.next() else {
            return Err(CodecLookupError::NotFound {
                target: target(),
                version,
            });
        };
        let rest: Vec<_> = matching.collect();
        if rest.is_empty() {
            return Ok(first);
        }

        Err(CodecLookupError::Ambiguous {
            target: target(),
            candidates: std::iter::once(first)
                .chain(rest)
                .map(|codec| codec.name())
                .collect(),
        })
    }

    /// Encodes `value` as a cell of type `typ`.
    pub fn encode<'b>(
        &self,
        value: &CqlValue,
        typ: &ColumnType,
        version: ProtocolVersion,
        writer: CellWriter<'b>,
    ) -> Result<WrittenCellProof<'b>, SerializationError> {
        CodecContext::new(self, version).encode(value, typ, writer)
    }

    /// Decodes the contents of a non-null cell of type `typ`.
    pub fn decode(
        &self,
        typ: &ColumnType,
        bytes: &[u8],
        version: ProtocolVersion,
    ) -> Result<CqlValue, DeserializationError> {
        CodecContext::new(self, version).decode(typ, bytes)
    }
}
