//! Codecs of the composite CQL types. Their elements are encoded and
//! decoded through the registry the context carries.

use super::native::mismatch;
use super::{
    mk_deser_err, BuiltinDeserializationErrorKind, Codec, CodecContext, DeserializationError,
};
use crate::frame::response::result::ColumnType;
use crate::frame::types::{self, RawValue};
use crate::frame::ProtocolVersion;
use crate::serialize::{
    mk_ser_err, BuiltinSerializationErrorKind, CellValueBuilder, CellWriter, SerializationError,
    WrittenCellProof,
};
use crate::value::CqlValue;

// Protocol v2 frames collection counts and elements with [short]; later
// versions use [int] and allow null elements on the wire.
fn write_count(
    codec: &'static str,
    builder: &mut CellValueBuilder<'_>,
    len: usize,
    ctx: &CodecContext<'_>,
) -> Result<(), SerializationError> {
    let too_many = || mk_ser_err(codec, BuiltinSerializationErrorKind::TooManyElements { len });
    if ctx.version().collection_length_is_short() {
        let count: u16 = len.try_into().map_err(|_| too_many())?;
        builder.append_bytes(&count.to_be_bytes());
    } else {
        let count: i32 = len.try_into().map_err(|_| too_many())?;
        builder.append_bytes(&count.to_be_bytes());
    }
    Ok(())
}

fn write_element(
    codec: &'static str,
    builder: &mut CellValueBuilder<'_>,
    value: &CqlValue,
    typ: &ColumnType,
    ctx: &CodecContext<'_>,
) -> Result<(), SerializationError> {
    if !ctx.version().collection_length_is_short() {
        ctx.encode(value, typ, builder.make_sub_writer())?;
        return Ok(());
    }

    let mut cell = Vec::new();
    ctx.encode(value, typ, CellWriter::new(&mut cell))?;
    match types::read_value(&mut cell.as_slice()) {
        Ok(RawValue::Value(contents)) => {
            let len: u16 = contents
                .len()
                .try_into()
                .map_err(|_| mk_ser_err(codec, BuiltinSerializationErrorKind::SizeOverflow))?;
            builder.append_bytes(&len.to_be_bytes());
            builder.append_bytes(contents);
            Ok(())
        }
        _ => Err(mk_ser_err(
            codec,
            BuiltinSerializationErrorKind::NullElementNotSupported,
        )),
    }
}

fn read_count(
    codec: &'static str,
    buf: &mut &[u8],
    ctx: &CodecContext<'_>,
) -> Result<usize, DeserializationError> {
    if ctx.version().collection_length_is_short() {
        types::read_short(buf)
            .map(usize::from)
            .map_err(|err| mk_deser_err(codec, err))
    } else {
        types::read_int_length(buf).map_err(|err| mk_deser_err(codec, err))
    }
}

fn read_element<'a>(
    codec: &'static str,
    buf: &mut &'a [u8],
    typ: &ColumnType,
    ctx: &CodecContext<'_>,
) -> Result<CqlValue, DeserializationError> {
    let contents = if ctx.version().collection_length_is_short() {
        Some(types::read_short_bytes(buf).map_err(|err| mk_deser_err(codec, err))?)
    } else {
        types::read_bytes_opt(buf).map_err(|err| mk_deser_err(codec, err))?
    };
    match contents {
        Some(contents) => ctx.decode(typ, contents),
        None => Err(mk_deser_err(
            codec,
            BuiltinDeserializationErrorKind::NullCollectionElement,
        )),
    }
}

fn ensure_consumed(codec: &'static str, buf: &[u8]) -> Result<(), DeserializationError> {
    if buf.is_empty() {
        Ok(())
    } else {
        Err(mk_deser_err(
            codec,
            BuiltinDeserializationErrorKind::TrailingBytes(buf.len()),
        ))
    }
}

fn encode_sequence<'b>(
    codec: &'static str,
    elements: &[CqlValue],
    elem_typ: &ColumnType,
    ctx: &CodecContext<'_>,
    writer: CellWriter<'b>,
) -> Result<WrittenCellProof<'b>, SerializationError> {
    let mut builder = writer.into_value_builder();
    write_count(codec, &mut builder, elements.len(), ctx)?;
    for element in elements {
        write_element(codec, &mut builder, element, elem_typ, ctx)?;
    }
    builder.finish().map_err(|err| mk_ser_err(codec, err))
}

fn decode_sequence(
    codec: &'static str,
    bytes: &[u8],
    elem_typ: &ColumnType,
    ctx: &CodecContext<'_>,
) -> Result<Vec<CqlValue>, DeserializationError> {
    let mut buf = bytes;
    let count = read_count(codec, &mut buf, ctx)?;
    // Each element takes at least its length prefix.
    let mut elements = Vec::with_capacity(count.min(buf.len() / 2));
    for _ in 0..count {
        elements.push(read_element(codec, &mut buf, elem_typ, ctx)?);
    }
    ensure_consumed(codec, buf)?;
    Ok(elements)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ListCodec;

impl Codec for ListCodec {
    fn name(&self) -> &'static str {
        "list"
    }

    fn accepts_type(&self, typ: &ColumnType) -> bool {
        matches!(typ, ColumnType::List(_))
    }

    fn accepts(&self, value: &CqlValue, typ: &ColumnType) -> bool {
        matches!((value, typ), (CqlValue::List(_), ColumnType::List(_)))
    }

    fn encode<'b>(
        &self,
        value: &CqlValue,
        typ: &ColumnType,
        ctx: &CodecContext<'_>,
        writer: CellWriter<'b>,
    ) -> Result<WrittenCellProof<'b>, SerializationError> {
        match (value, typ) {
            (CqlValue::List(elements), ColumnType::List(elem_typ)) => {
                encode_sequence(self.name(), elements, elem_typ, ctx, writer)
            }
            _ => Err(mismatch(self.name(), value, typ)),
        }
    }

    fn decode(
        &self,
        typ: &ColumnType,
        bytes: &[u8],
        ctx: &CodecContext<'_>,
    ) -> Result<CqlValue, DeserializationError> {
        let ColumnType::List(elem_typ) = typ else {
            return Err(mk_deser_err(
                self.name(),
                BuiltinDeserializationErrorKind::UnexpectedType(typ.to_string()),
            ));
        };
        decode_sequence(self.name(), bytes, elem_typ, ctx).map(CqlValue::List)
    }
}

/// `set`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SetCodec;

impl Codec for SetCodec {
    fn name(&self) -> &'static str {
        "set"
    }

    fn accepts_type(&self, typ: &ColumnType) -> bool {
        matches!(typ, ColumnType::Set(_))
    }

    fn accepts(&self, value: &CqlValue, typ: &ColumnType) -> bool {
        matches!((value, typ), (CqlValue::Set(_), ColumnType::Set(_)))
    }

    fn encode<'b>(
        &self,
        value: &CqlValue,
        typ: &ColumnType,
        ctx: &CodecContext<'_>,
        writer: CellWriter<'b>,
    ) -> Result<WrittenCellProof<'b>, SerializationError> {
        match (value, typ) {
            (CqlValue::Set(elements), ColumnType::Set(elem_typ)) => {
                encode_sequence(self.name(), elements, elem_typ, ctx, writer)
            }
            _ => Err(mismatch(self.name(), value, typ)),
        }
    }

    fn decode(
        &self,
        typ: &ColumnType,
        bytes: &[u8],
        ctx: &CodecContext<'_>,
    ) -> Result<CqlValue, DeserializationError> {
        let ColumnType::Set(elem_typ) = typ else {
            return Err(mk_deser_err(
                self.name(),
                BuiltinDeserializationErrorKind::UnexpectedType(typ.to_string()),
            ));
        };
        decode_sequence(self.name(), bytes, elem_typ, ctx).map(CqlValue::Set)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MapCodec;

impl Codec for MapCodec {
    fn name(&self) -> &'static str {
        "map"
    }

    fn accepts_type(&self, typ: &ColumnType) -> bool {
        matches!(typ, ColumnType::Map(_, _))
    }

    fn accepts(&self, value: &CqlValue, typ: &ColumnType) -> bool {
        matches!((value, typ), (CqlValue::Map(_), ColumnType::Map(_, _)))
    }

    fn encode<'b>(
        &self,
        value: &CqlValue,
        typ: &ColumnType,
        ctx: &CodecContext<'_>,
        writer: CellWriter<'b>,
    ) -> Result<WrittenCellProof<'b>, SerializationError> {
        let (CqlValue::Map(entries), ColumnType::Map(key_typ, value_typ)) = (value, typ) else {
            return Err(mismatch(self.name(), value, typ));
        };
        let mut builder = writer.into_value_builder();
        write_count(self.name(), &mut builder, entries.len(), ctx)?;
        for (k, v) in entries {
            write_element(self.name(), &mut builder, k, key_typ, ctx)?;
            write_element(self.name(), &mut builder, v, value_typ, ctx)?;
        }
        builder.finish().map_err(|err| mk_ser_err(self.name(), err))
    }

    fn decode(
        &self,
        typ: &ColumnType,
        bytes: &[u8],
        ctx: &CodecContext<'_>,
    ) -> Result<CqlValue, DeserializationError> {
        let ColumnType::Map(key_typ, value_typ) = typ else {
            return Err(mk_deser_err(
                self.name(),
                BuiltinDeserializationErrorKind::UnexpectedType(typ.to_string()),
            ));
        };
        let mut buf = bytes;
        let count = read_count(self.name(), &mut buf, ctx)?;
        let mut entries = Vec::with_capacity(count.min(buf.len() / 4));
        for _ in 0..count {
            let k = read_element(self.name(), &mut buf, key_typ, ctx)?;
            let v = read_element(self.name(), &mut buf, value_typ, ctx)?;
            entries.push((k, v));
        }
        ensure_consumed(self.name(), buf)?;
        Ok(CqlValue::Map(entries))
    }
}

// Tuple and UDT fields are always [bytes]-framed and may be null.
fn write_field(
    builder: &mut CellValueBuilder<'_>,
    value: Option<&CqlValue>,
    typ: &ColumnType,
    ctx: &CodecContext<'_>,
) -> Result<(), SerializationError> {
    match value {
        Some(value) => {
            ctx.encode(value, typ, builder.make_sub_writer())?;
        }
        None => {
            builder.make_sub_writer().set_null();
        }
    }
    Ok(())
}

// A cell may end before all declared fields; the missing ones are null.
fn read_field(
    codec: &'static str,
    buf: &mut &[u8],
    typ: &ColumnType,
    ctx: &CodecContext<'_>,
) -> Result<Option<CqlValue>, DeserializationError> {
    if buf.is_empty() {
        return Ok(None);
    }
    types::read_bytes_opt(buf)
        .map_err(|err| mk_deser_err(codec, err))?
        .map(|contents| ctx.decode(typ, contents))
        .transpose()
}

/// `tuple`, available since protocol v3.
#[derive(Debug, Clone, Copy, Default)]
pub struct TupleCodec;

impl Codec for TupleCodec {
    fn name(&self) -> &'static str {
        "tuple"
    }

    fn accepts_type(&self, typ: &ColumnType) -> bool {
        matches!(typ, ColumnType::Tuple(_))
    }

    fn accepts(&self, value: &CqlValue, typ: &ColumnType) -> bool {
        matches!((value, typ), (CqlValue::Tuple(_), ColumnType::Tuple(_)))
    }

    fn supports_version(&self, version: ProtocolVersion) -> bool {
        version.supports_tuples_and_udts()
    }

    fn encode<'b>(
        &self,
        value: &CqlValue,
        typ: &ColumnType,
        ctx: &CodecContext<'_>,
        writer: CellWriter<'b>,
    ) -> Result<WrittenCellProof<'b>, SerializationError> {
        let (CqlValue::Tuple(fields), ColumnType::Tuple(field_types)) = (value, typ) else {
            return Err(mismatch(self.name(), value, typ));
        };
        if fields.len() != field_types.len() {
            return Err(mk_ser_err(
                self.name(),
                BuiltinSerializationErrorKind::WrongFieldCount {
                    expected: field_types.len(),
                    actual: fields.len(),
                },
            ));
        }
        let mut builder = writer.into_value_builder();
        for (field, field_typ) in fields.iter().zip(field_types) {
            write_field(&mut builder, field.as_ref(), field_typ, ctx)?;
        }
        builder.finish().map_err(|err| mk_ser_err(self.name(), err))
    }

    fn decode(
        &self,
        typ: &ColumnType,
        bytes: &[u8],
        ctx: &CodecContext<'_>,
    ) -> Result<CqlValue, DeserializationError> {
        let ColumnType::Tuple(field_types) = typ else {
            return Err(mk_deser_err(
                self.name(),
                BuiltinDeserializationErrorKind::UnexpectedType(typ.to_string()),
            ));
        };
        let mut buf = bytes;
        let fields = field_types
            .iter()
            .map(|field_typ| read_field(self.name(), &mut buf, field_typ, ctx))
            .collect::<Result<Vec<_>, _>>()?;
        ensure_consumed(self.name(), buf)?;
        Ok(CqlValue::Tuple(fields))
    }
}

/// User defined types, available since protocol v3.
///
/// A value is accepted when it names the same type. Its fields must follow
/// the declared order; trailing fields it leaves out are written as null.
#[derive(Debug, Clone, Copy, Default)]
pub struct UdtCodec;

impl Codec for UdtCodec {
    fn name(&self) -> &'static str {
        "udt"
    }

    fn accepts_type(&self, typ: &ColumnType) -> bool {
        matches!(typ, ColumnType::UserDefinedType { .. })
    }

    fn accepts(&self, value: &CqlValue, typ: &ColumnType) -> bool {
        match (value, typ) {
            (
                CqlValue::UserDefinedType { keyspace, name, .. },
                ColumnType::UserDefinedType {
                    type_name,
                    keyspace: type_keyspace,
                    ..
                },
            ) => name == type_name && (keyspace.is_empty() || keyspace == type_keyspace),
            _ => false,
        }
    }

    fn supports_version(&self, version: ProtocolVersion) -> bool {
        version.supports_tuples_and_udts()
    }

    fn encode<'b>(
        &self,
        value: &CqlValue,
        typ: &ColumnType,
        ctx: &CodecContext<'_>,
        writer: CellWriter<'b>,
    ) -> Result<WrittenCellProof<'b>, SerializationError> {
        let (
            CqlValue::UserDefinedType { fields, .. },
            ColumnType::UserDefinedType { field_types, .. },
        ) = (value, typ)
        else {
            return Err(mismatch(self.name(), value, typ));
        };
        if fields.len() > field_types.len() {
            return Err(mk_ser_err(
                self.name(),
                BuiltinSerializationErrorKind::WrongFieldCount {
                    expected: field_types.len(),
                    actual: fields.len(),
                },
            ));
        }

        let mut builder = writer.into_value_builder();
        for (i, (field_name, field_typ)) in field_types.iter().enumerate() {
            let field_value = match fields.get(i) {
                Some((name, value)) if name == field_name => value.as_ref(),
                Some((name, _)) => {
                    return Err(mk_ser_err(
                        self.name(),
                        BuiltinSerializationErrorKind::FieldNameMismatch {
                            expected: field_name.clone(),
                            actual: name.clone(),
                        },
                    ))
                }
                None => None,
            };
            write_field(&mut builder, field_value, field_typ, ctx)?;
        }
        builder.finish().map_err(|err| mk_ser_err(self.name(), err))
    }

    fn decode(
        &self,
        typ: &ColumnType,
        bytes: &[u8],
        ctx: &CodecContext<'_>,
    ) -> Result<CqlValue, DeserializationError> {
        let ColumnType::UserDefinedType {
            type_name,
            keyspace,
            field_types,
        } = typ
        else {
            return Err(mk_deser_err(
                self.name(),
                BuiltinDeserializationErrorKind::UnexpectedType(typ.to_string()),
            ));
        };
        let mut buf = bytes;
        let fields = field_types
            .iter()
            .map(|(field_name, field_typ)| {
                read_field(self.name(), &mut buf, field_typ, ctx)
                    .map(|value| (field_name.clone(), value))
            })
            .collect::<Result<Vec<_>, _>>()?;
        ensure_consumed(self.name(), buf)?;
        Ok(CqlValue::UserDefinedType {
            keyspace: keyspace.clone(),
            name: type_name.clone(),
            fields,
        })
    }
}
