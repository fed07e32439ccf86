//! Values given to [`bind`](super::prepared::PreparedStatement::bind) and
//! their encoding against the bind markers of a statement.

use std::net::IpAddr;
use std::sync::Arc;

use cqlbind_cql::codec::{Codec, CodecContext, CodecLookupError, CodecRegistry};
use cqlbind_cql::frame::response::result::ColumnSpec;
use cqlbind_cql::frame::types::{read_value, RawValue};
use cqlbind_cql::serialize::row::SerializedValues;
use cqlbind_cql::serialize::{CellWriter, RowWriter, SerializationError, WrittenCellProof};
use cqlbind_cql::value::{
    Counter, CqlDate, CqlDecimal, CqlDuration, CqlTime, CqlTimestamp, CqlTimeuuid, CqlValue,
    CqlVarint, MaybeUnset, Unset,
};
use cqlbind_cql::ProtocolVersion;
use tracing::trace;
use uuid::Uuid;

use crate::errors::{ArityError, BindError, EncodingError, EncodingErrorKind, ProtocolViolation};

/// A value for a single bind marker.
#[derive(Debug, Clone)]
pub enum BindValue {
    /// Written as a null cell.
    Null,

    /// Written as an unset cell, which leaves the column untouched.
    /// Requires protocol v4 or newer.
    Unset,

    /// Encoded with the single codec of the registry that accepts it.
    Value(CqlValue),

    /// Encoded with the given codec, bypassing registry lookup.
    Coded {
        value: CqlValue,
        codec: Arc<dyn Codec>,
    },
}

impl BindValue {
    /// Pairs a value with the codec that must encode it.
    pub fn with_codec(value: impl Into<CqlValue>, codec: Arc<dyn Codec>) -> Self {
        BindValue::Coded {
            value: value.into(),
            codec,
        }
    }

    /// The wrapped value, unless this is null or unset.
    pub fn as_cql_value(&self) -> Option<&CqlValue> {
        match self {
            BindValue::Value(value) | BindValue::Coded { value, .. } => Some(value),
            BindValue::Null | BindValue::Unset => None,
        }
    }
}

macro_rules! impl_from_for_bind_value {
    ($($typ:ty),* $(,)?) => {
        $(
            impl From<$typ> for BindValue {
                #[inline]
                fn from(value: $typ) -> Self {
                    BindValue::Value(value.into())
                }
            }
        )*
    };
}

impl_from_for_bind_value!(
    CqlValue,
    bool,
    i8,
    i16,
    i32,
    i64,
    f32,
    f64,
    String,
    &str,
    Vec<u8>,
    &[u8],
    Uuid,
    IpAddr,
    Counter,
    CqlDate,
    CqlTime,
    CqlTimestamp,
    CqlDuration,
    CqlTimeuuid,
    CqlVarint,
    CqlDecimal,
);

impl From<Unset> for BindValue {
    #[inline]
    fn from(_: Unset) -> Self {
        BindValue::Unset
    }
}

impl<T: Into<BindValue>> From<Option<T>> for BindValue {
    #[inline]
    fn from(value: Option<T>) -> Self {
        value.map_or(BindValue::Null, Into::into)
    }
}

impl<T: Into<BindValue>> From<MaybeUnset<T>> for BindValue {
    #[inline]
    fn from(value: MaybeUnset<T>) -> Self {
        match value {
            MaybeUnset::Set(v) => v.into(),
            MaybeUnset::Unset => BindValue::Unset,
        }
    }
}

/// A positional list of values to bind.
///
/// Implemented for tuples (up to 16 elements), vectors and arrays
/// of anything convertible into a [`BindValue`].
pub trait BindValues {
    fn into_bind_values(self) -> Vec<BindValue>;
}

impl<T: Into<BindValue>> BindValues for Vec<T> {
    fn into_bind_values(self) -> Vec<BindValue> {
        self.into_iter().map(Into::into).collect()
    }
}

impl<T: Into<BindValue>, const N: usize> BindValues for [T; N] {
    fn into_bind_values(self) -> Vec<BindValue> {
        self.into_iter().map(Into::into).collect()
    }
}

macro_rules! impl_bind_values_for_tuple {
    ($($typs:ident),*) => {
        impl<$($typs: Into<BindValue>),*> BindValues for ($($typs,)*) {
            #[allow(non_snake_case)]
            fn into_bind_values(self) -> Vec<BindValue> {
                let ($($typs,)*) = self;
                vec![$($typs.into()),*]
            }
        }
    };
}

impl BindValues for () {
    fn into_bind_values(self) -> Vec<BindValue> {
        Vec::new()
    }
}

impl_bind_values_for_tuple!(T0);
impl_bind_values_for_tuple!(T0, T1);
impl_bind_values_for_tuple!(T0, T1, T2);
impl_bind_values_for_tuple!(T0, T1, T2, T3);
impl_bind_values_for_tuple!(T0, T1, T2, T3, T4);
impl_bind_values_for_tuple!(T0, T1, T2, T3, T4, T5);
impl_bind_values_for_tuple!(T0, T1, T2, T3, T4, T5, T6);
impl_bind_values_for_tuple!(T0, T1, T2, T3, T4, T5, T6, T7);
impl_bind_values_for_tuple!(T0, T1, T2, T3, T4, T5, T6, T7, T8);
impl_bind_values_for_tuple!(T0, T1, T2, T3, T4, T5, T6, T7, T8, T9);
impl_bind_values_for_tuple!(T0, T1, T2, T3, T4, T5, T6, T7, T8, T9, T10);
impl_bind_values_for_tuple!(T0, T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11);
impl_bind_values_for_tuple!(T0, T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12);
impl_bind_values_for_tuple!(T0, T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12, T13);
impl_bind_values_for_tuple!(T0, T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12, T13, T14);
impl_bind_values_for_tuple!(
    T0, T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12, T13, T14, T15
);

/// Encodes values against the bind markers of a statement.
///
/// Pure: the outcome depends only on the values, the variable column specs,
/// the registry and the protocol version.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ValueEncoder<'a> {
    registry: &'a CodecRegistry,
    version: ProtocolVersion,
    col_specs: &'a [ColumnSpec],
}

impl<'a> ValueEncoder<'a> {
    pub(crate) fn new(
        registry: &'a CodecRegistry,
        version: ProtocolVersion,
        col_specs: &'a [ColumnSpec],
    ) -> Self {
        Self {
            registry,
            version,
            col_specs,
        }
    }

    /// Encodes one value per bind marker, in order.
    pub(crate) fn encode_row(&self, values: &[BindValue]) -> Result<SerializedValues, BindError> {
        if values.len() != self.col_specs.len() {
            return Err(ArityError {
                expected: self.col_specs.len(),
                provided: values.len(),
            }
            .into());
        }

        let (row, outcome) = SerializedValues::from_closure(|writer| {
            Ok(values
                .iter()
                .enumerate()
                .try_for_each(|(index, value)| {
                    self.encode_cell(index, value, writer.make_cell_writer())
                        .map(|_proof| ())
                }))
        })
        .map_err(|err| self.serialization_error(0, err))?;
        outcome?;

        trace!(values = row.element_count(), size = row.buffer_size(), "Values encoded");
        Ok(row)
    }

    /// Re-encodes the value at `index` of an already encoded row.
    /// `row` is left untouched when encoding fails.
    pub(crate) fn replace_cell(
        &self,
        row: &SerializedValues,
        index: usize,
        value: &BindValue,
    ) -> Result<SerializedValues, BindError> {
        if index >= self.col_specs.len() {
            return Err(BindError::NoSuchPosition {
                index,
                count: self.col_specs.len(),
            });
        }

        let mut cell = Vec::new();
        self.encode_cell(index, value, CellWriter::new(&mut cell))?;
        let replacement = read_value(&mut cell.as_slice())
            .map_err(|err| self.serialization_error(index, SerializationError::new(err)))?;

        let (new_row, ()) = SerializedValues::from_closure(|writer| {
            for (i, raw) in row.iter().enumerate() {
                let raw = if i == index { replacement } else { raw };
                write_raw(writer, raw)?;
            }
            Ok(())
        })
        .map_err(|err| self.serialization_error(index, err))?;
        Ok(new_row)
    }

    /// Position of the bind marker called `name`.
    pub(crate) fn position_of(&self, name: &str) -> Result<usize, BindError> {
        self.col_specs
            .iter()
            .position(|spec| spec.name() == name)
            .ok_or_else(|| BindError::NoSuchVariable {
                name: name.to_owned(),
            })
    }

    fn encode_cell<'b>(
        &self,
        index: usize,
        value: &BindValue,
        writer: CellWriter<'b>,
    ) -> Result<WrittenCellProof<'b>, BindError> {
        let spec = &self.col_specs[index];
        let typ = spec.typ();
        let ctx = CodecContext::new(self.registry, self.version);

        match value {
            BindValue::Null => Ok(writer.set_null()),
            BindValue::Unset => {
                if !self.version.supports_unset() {
                    return Err(ProtocolViolation::UnsetNotSupported {
                        index,
                        column: spec.name().to_owned(),
                        version: self.version,
                    }
                    .into());
                }
                Ok(writer.set_unset())
            }
            BindValue::Value(value) => {
                let codec = self
                    .registry
                    .find(value, typ, self.version)
                    .map_err(|err| self.encoding_error(index, err.into()))?;
                codec
                    .encode(value, typ, &ctx, writer)
                    .map_err(|err| self.serialization_error(index, err))
            }
            BindValue::Coded { value, codec } => {
                if !codec.supports_version(self.version) || !codec.accepts(value, typ) {
                    return Err(self.encoding_error(
                        index,
                        EncodingErrorKind::IncompatibleCodec {
                            codec: codec.name(),
                            value_kind: value.kind(),
                            cql_type: typ.to_string(),
                            version: self.version,
                        },
                    ));
                }
                codec
                    .encode(value, typ, &ctx, writer)
                    .map_err(|err| self.serialization_error(index, err))
            }
        }
    }

    fn encoding_error(&self, index: usize, kind: EncodingErrorKind) -> BindError {
        let column = self
            .col_specs
            .get(index)
            .map(|spec| spec.name().to_owned())
            .unwrap_or_default();
        EncodingError {
            index,
            column,
            kind,
        }
        .into()
    }

    fn serialization_error(&self, index: usize, err: SerializationError) -> BindError {
        // Lookups fail inside collection, tuple and UDT codecs too.
        let kind = match err.downcast_ref::<CodecLookupError>() {
            Some(lookup) => EncodingErrorKind::from(lookup.clone()),
            None => EncodingErrorKind::Serialization(err),
        };
        self.encoding_error(index, kind)
    }
}

fn write_raw(writer: &mut RowWriter<'_>, raw: RawValue<'_>) -> Result<(), SerializationError> {
    let cell = writer.make_cell_writer();
    match raw {
        RawValue::Null => {
            cell.set_null();
        }
        RawValue::Unset => {
            cell.set_unset();
        }
        RawValue::Value(bytes) => {
            cell.set_value(bytes)?;
        }
    }
    Ok(())
}
