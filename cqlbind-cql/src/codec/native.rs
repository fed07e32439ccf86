//! Codecs of the native (non-composite) CQL types.

use std::net::IpAddr;

use uuid::Uuid;

use super::{
    mk_deser_err, BuiltinDeserializationErrorKind, Codec, CodecContext, DeserializationError,
};
use crate::frame::response::result::ColumnType;
use crate::frame::types;
use crate::frame::ProtocolVersion;
use crate::serialize::{
    mk_ser_err, BuiltinSerializationErrorKind, CellWriter, SerializationError, WrittenCellProof,
};
use crate::value::{
    Counter, CqlDate, CqlDecimal, CqlDuration, CqlTime, CqlTimestamp, CqlTimeuuid, CqlValue,
    CqlVarint,
};

pub(super) fn mismatch(
    codec: &'static str,
    value: &CqlValue,
    typ: &ColumnType,
) -> SerializationError {
    mk_ser_err(
        codec,
        BuiltinSerializationErrorKind::MismatchedValue {
            value_kind: value.kind(),
            cql_type: typ.to_string(),
        },
    )
}

fn set_value<'b>(
    codec: &'static str,
    writer: CellWriter<'b>,
    contents: &[u8],
) -> Result<WrittenCellProof<'b>, SerializationError> {
    writer
        .set_value(contents)
        .map_err(|err| mk_ser_err(codec, err))
}

fn exact<const N: usize>(
    codec: &'static str,
    bytes: &[u8],
) -> Result<[u8; N], DeserializationError> {
    bytes.try_into().map_err(|_| {
        mk_deser_err(
            codec,
            BuiltinDeserializationErrorKind::ByteLengthMismatch {
                expected: N,
                got: bytes.len(),
            },
        )
    })
}

// Fixed-size types whose value maps one-to-one onto a single column type.
macro_rules! impl_fixed_size_codec {
    (
        $(#[$attr:meta])*
        $codec:ident, $name:literal, $cql:ident, $variant:ident, $len:literal,
        encode: |$v:ident| $encode:expr,
        decode: |$b:ident| $decode:expr
        $(, min_version: $min:ident)?
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $codec;

        impl Codec for $codec {
            fn name(&self) -> &'static str {
                $name
            }

            fn accepts_type(&self, typ: &ColumnType) -> bool {
                matches!(typ, ColumnType::$cql)
            }

            fn accepts(&self, value: &CqlValue, typ: &ColumnType) -> bool {
                matches!((value, typ), (CqlValue::$variant(_), ColumnType::$cql))
            }

            $(
                fn supports_version(&self, version: ProtocolVersion) -> bool {
                    version >= ProtocolVersion::$min
                }
            )?

            fn encode<'b>(
                &self,
                value: &CqlValue,
                typ: &ColumnType,
                _ctx: &CodecContext<'_>,
                writer: CellWriter<'b>,
            ) -> Result<WrittenCellProof<'b>, SerializationError> {
                let CqlValue::$variant($v) = value else {
                    return Err(mismatch($name, value, typ));
                };
                set_value($name, writer, &$encode)
            }

            fn decode(
                &self,
                _typ: &ColumnType,
                bytes: &[u8],
                _ctx: &CodecContext<'_>,
            ) -> Result<CqlValue, DeserializationError> {
                let $b: [u8; $len] = exact($name, bytes)?;
                Ok(CqlValue::$variant($decode))
            }
        }
    };
}

impl_fixed_size_codec!(
    BooleanCodec, "boolean", Boolean, Boolean, 1,
    encode: |v| [*v as u8],
    decode: |b| b[0] != 0
);

impl_fixed_size_codec!(
    /// `tinyint`, available since protocol v4.
    TinyIntCodec, "tinyint", TinyInt, TinyInt, 1,
    encode: |v| v.to_be_bytes(),
    decode: |b| i8::from_be_bytes(b),
    min_version: V4
);

impl_fixed_size_codec!(
    /// `smallint`, available since protocol v4.
    SmallIntCodec, "smallint", SmallInt, SmallInt, 2,
    encode: |v| v.to_be_bytes(),
    decode: |b| i16::from_be_bytes(b),
    min_version: V4
);

impl_fixed_size_codec!(
    IntCodec, "int", Int, Int, 4,
    encode: |v| v.to_be_bytes(),
    decode: |b| i32::from_be_bytes(b)
);

impl_fixed_size_codec!(
    BigIntCodec, "bigint", BigInt, BigInt, 8,
    encode: |v| v.to_be_bytes(),
    decode: |b| i64::from_be_bytes(b)
);

impl_fixed_size_codec!(
    CounterCodec, "counter", Counter, Counter, 8,
    encode: |v| v.0.to_be_bytes(),
    decode: |b| Counter(i64::from_be_bytes(b))
);

impl_fixed_size_codec!(
    FloatCodec, "float", Float, Float, 4,
    encode: |v| v.to_be_bytes(),
    decode: |b| f32::from_be_bytes(b)
);

impl_fixed_size_codec!(
    DoubleCodec, "double", Double, Double, 8,
    encode: |v| v.to_be_bytes(),
    decode: |b| f64::from_be_bytes(b)
);

impl_fixed_size_codec!(
    /// `date`, available since protocol v4.
    DateCodec, "date", Date, Date, 4,
    encode: |v| v.0.to_be_bytes(),
    decode: |b| CqlDate(u32::from_be_bytes(b)),
    min_version: V4
);

impl_fixed_size_codec!(
    /// `time`, available since protocol v4.
    TimeCodec, "time", Time, Time, 8,
    encode: |v| v.0.to_be_bytes(),
    decode: |b| CqlTime(i64::from_be_bytes(b)),
    min_version: V4
);

impl_fixed_size_codec!(
    TimestampCodec, "timestamp", Timestamp, Timestamp, 8,
    encode: |v| v.0.to_be_bytes(),
    decode: |b| CqlTimestamp(i64::from_be_bytes(b))
);

impl_fixed_size_codec!(
    /// Encodes timeuuid values. Plain uuids go through [`UuidCodec`].
    TimeuuidCodec, "timeuuid", Timeuuid, Timeuuid, 16,
    encode: |v| *v.as_bytes(),
    decode: |b| CqlTimeuuid::from_bytes(b)
);

/// The special zero-length value, for every type that admits it.
///
/// Decoding it is handled by [`CodecContext::decode`], so this codec never
/// claims a type.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyCodec;

impl Codec for EmptyCodec {
    fn name(&self) -> &'static str {
        "empty"
    }

    fn accepts_type(&self, _typ: &ColumnType) -> bool {
        false
    }

    fn accepts(&self, value: &CqlValue, typ: &ColumnType) -> bool {
        matches!(value, CqlValue::Empty) && typ.supports_special_empty_value()
    }

    fn encode<'b>(
        &self,
        _value: &CqlValue,
        _typ: &ColumnType,
        _ctx: &CodecContext<'_>,
        writer: CellWriter<'b>,
    ) -> Result<WrittenCellProof<'b>, SerializationError> {
        set_value(self.name(), writer, &[])
    }

    fn decode(
        &self,
        _typ: &ColumnType,
        _bytes: &[u8],
        _ctx: &CodecContext<'_>,
    ) -> Result<CqlValue, DeserializationError> {
        Ok(CqlValue::Empty)
    }
}

/// `ascii`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AsciiCodec;

impl Codec for AsciiCodec {
    fn name(&self) -> &'static str {
        "ascii"
    }

    fn accepts_type(&self, typ: &ColumnType) -> bool {
        matches!(typ, ColumnType::Ascii)
    }

    fn accepts(&self, value: &CqlValue, typ: &ColumnType) -> bool {
        matches!((value, typ), (CqlValue::Ascii(_), ColumnType::Ascii))
    }

    fn encode<'b>(
        &self,
        value: &CqlValue,
        typ: &ColumnType,
        _ctx: &CodecContext<'_>,
        writer: CellWriter<'b>,
    ) -> Result<WrittenCellProof<'b>, SerializationError> {
        let CqlValue::Ascii(s) = value else {
            return Err(mismatch(self.name(), value, typ));
        };
        if !s.is_ascii() {
            return Err(mk_ser_err(
                self.name(),
                BuiltinSerializationErrorKind::NonAsciiString,
            ));
        }
        set_value(self.name(), writer, s.as_bytes())
    }

    fn decode(
        &self,
        _typ: &ColumnType,
        bytes: &[u8],
        _ctx: &CodecContext<'_>,
    ) -> Result<CqlValue, DeserializationError> {
        if !bytes.is_ascii() {
            return Err(mk_deser_err(
                self.name(),
                BuiltinDeserializationErrorKind::ExpectedAscii,
            ));
        }
        let s = std::str::from_utf8(bytes).map_err(|err| mk_deser_err(self.name(), err))?;
        Ok(CqlValue::Ascii(s.to_owned()))
    }
}

/// `text` (`varchar`).
#[derive(Debug, Clone, Copy, Default)]
pub struct TextCodec;

impl Codec for TextCodec {
    fn name(&self) -> &'static str {
        "text"
    }

    fn accepts_type(&self, typ: &ColumnType) -> bool {
        matches!(typ, ColumnType::Text)
    }

    fn accepts(&self, value: &CqlValue, typ: &ColumnType) -> bool {
        matches!((value, typ), (CqlValue::Text(_), ColumnType::Text))
    }

    fn encode<'b>(
        &self,
        value: &CqlValue,
        typ: &ColumnType,
        _ctx: &CodecContext<'_>,
        writer: CellWriter<'b>,
    ) -> Result<WrittenCellProof<'b>, SerializationError> {
        let CqlValue::Text(s) = value else {
            return Err(mismatch(self.name(), value, typ));
        };
        set_value(self.name(), writer, s.as_bytes())
    }

    fn decode(
        &self,
        _typ: &ColumnType,
        bytes: &[u8],
        _ctx: &CodecContext<'_>,
    ) -> Result<CqlValue, DeserializationError> {
        let s = std::str::from_utf8(bytes).map_err(|err| mk_deser_err(self.name(), err))?;
        Ok(CqlValue::Text(s.to_owned()))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BlobCodec;

impl Codec for BlobCodec {
    fn name(&self) -> &'static str {
        "blob"
    }

    fn accepts_type(&self, typ: &ColumnType) -> bool {
        matches!(typ, ColumnType::Blob)
    }

    fn accepts(&self, value: &CqlValue, typ: &ColumnType) -> bool {
        matches!((value, typ), (CqlValue::Blob(_), ColumnType::Blob))
    }

    fn encode<'b>(
        &self,
        value: &CqlValue,
        typ: &ColumnType,
        _ctx: &CodecContext<'_>,
        writer: CellWriter<'b>,
    ) -> Result<WrittenCellProof<'b>, SerializationError> {
        let CqlValue::Blob(b) = value else {
            return Err(mismatch(self.name(), value, typ));
        };
        set_value(self.name(), writer, b)
    }

    fn decode(
        &self,
        _typ: &ColumnType,
        bytes: &[u8],
        _ctx: &CodecContext<'_>,
    ) -> Result<CqlValue, DeserializationError> {
        Ok(CqlValue::Blob(bytes.to_vec()))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VarintCodec;

impl Codec for VarintCodec {
    fn name(&self) -> &'static str {
        "varint"
    }

    fn accepts_type(&self, typ: &ColumnType) -> bool {
        matches!(typ, ColumnType::Varint)
    }

    fn accepts(&self, value: &CqlValue, typ: &ColumnType) -> bool {
        matches!((value, typ), (CqlValue::Varint(_), ColumnType::Varint))
    }

    fn encode<'b>(
        &self,
        value: &CqlValue,
        typ: &ColumnType,
        _ctx: &CodecContext<'_>,
        writer: CellWriter<'b>,
    ) -> Result<WrittenCellProof<'b>, SerializationError> {
        let CqlValue::Varint(v) = value else {
            return Err(mismatch(self.name(), value, typ));
        };
        set_value(self.name(), writer, v.as_signed_bytes_be_slice())
    }

    fn decode(
        &self,
        _typ: &ColumnType,
        bytes: &[u8],
        _ctx: &CodecContext<'_>,
    ) -> Result<CqlValue, DeserializationError> {
        Ok(CqlValue::Varint(CqlVarint::from_signed_bytes_be_slice(bytes)))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DecimalCodec;

impl Codec for DecimalCodec {
    fn name(&self) -> &'static str {
        "decimal"
    }

    fn accepts_type(&self, typ: &ColumnType) -> bool {
        matches!(typ, ColumnType::Decimal)
    }

    fn accepts(&self, value: &CqlValue, typ: &ColumnType) -> bool {
        matches!((value, typ), (CqlValue::Decimal(_), ColumnType::Decimal))
    }

    fn encode<'b>(
        &self,
        value: &CqlValue,
        typ: &ColumnType,
        _ctx: &CodecContext<'_>,
        writer: CellWriter<'b>,
    ) -> Result<WrittenCellProof<'b>, SerializationError> {
        let CqlValue::Decimal(d) = value else {
            return Err(mismatch(self.name(), value, typ));
        };
        let (bytes, scale) = d.as_signed_be_bytes_slice_and_exponent();
        let mut builder = writer.into_value_builder();
        builder.append_bytes(&scale.to_be_bytes());
        builder.append_bytes(bytes);
        builder.finish().map_err(|err| mk_ser_err(self.name(), err))
    }

    fn decode(
        &self,
        _typ: &ColumnType,
        bytes: &[u8],
        _ctx: &CodecContext<'_>,
    ) -> Result<CqlValue, DeserializationError> {
        let mut buf = bytes;
        let scale = types::read_int(&mut buf).map_err(|err| mk_deser_err(self.name(), err))?;
        Ok(CqlValue::Decimal(
            CqlDecimal::from_signed_be_bytes_slice_and_exponent(buf, scale),
        ))
    }
}

/// `duration`: three zig-zag vints (months, days, nanoseconds).
#[derive(Debug, Clone, Copy, Default)]
pub struct DurationCodec;

impl Codec for DurationCodec {
    fn name(&self) -> &'static str {
        "duration"
    }

    fn accepts_type(&self, typ: &ColumnType) -> bool {
        matches!(typ, ColumnType::Duration)
    }

    fn accepts(&self, value: &CqlValue, typ: &ColumnType) -> bool {
        matches!((value, typ), (CqlValue::Duration(_), ColumnType::Duration))
    }

    fn encode<'b>(
        &self,
        value: &CqlValue,
        typ: &ColumnType,
        _ctx: &CodecContext<'_>,
        writer: CellWriter<'b>,
    ) -> Result<WrittenCellProof<'b>, SerializationError> {
        let CqlValue::Duration(d) = value else {
            return Err(mismatch(self.name(), value, typ));
        };
        let mut contents = Vec::with_capacity(9 * 3);
        types::vint_encode(d.months as i64, &mut contents);
        types::vint_encode(d.days as i64, &mut contents);
        types::vint_encode(d.nanoseconds, &mut contents);
        set_value(self.name(), writer, &contents)
    }

    fn decode(
        &self,
        _typ: &ColumnType,
        bytes: &[u8],
        _ctx: &CodecContext<'_>,
    ) -> Result<CqlValue, DeserializationError> {
        let malformed = || {
            mk_deser_err(
                self.name(),
                BuiltinDeserializationErrorKind::MalformedNumber("duration"),
            )
        };
        let mut buf = bytes;
        let months = i32::try_from(types::vint_decode(&mut buf).map_err(|_| malformed())?)
            .map_err(|_| malformed())?;
        let days = i32::try_from(types::vint_decode(&mut buf).map_err(|_| malformed())?)
            .map_err(|_| malformed())?;
        let nanoseconds = types::vint_decode(&mut buf).map_err(|_| malformed())?;
        if !buf.is_empty() {
            return Err(mk_deser_err(
                self.name(),
                BuiltinDeserializationErrorKind::TrailingBytes(buf.len()),
            ));
        }

        Ok(CqlValue::Duration(CqlDuration {
            months,
            days,
            nanoseconds,
        }))
    }
}

/// `uuid`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidCodec;

impl Codec for UuidCodec {
    fn name(&self) -> &'static str {
        "uuid"
    }

    fn accepts_type(&self, typ: &ColumnType) -> bool {
        matches!(typ, ColumnType::Uuid)
    }

    fn accepts(&self, value: &CqlValue, typ: &ColumnType) -> bool {
        matches!((value, typ), (CqlValue::Uuid(_), ColumnType::Uuid))
    }

    fn encode<'b>(
        &self,
        value: &CqlValue,
        typ: &ColumnType,
        _ctx: &CodecContext<'_>,
        writer: CellWriter<'b>,
    ) -> Result<WrittenCellProof<'b>, SerializationError> {
        let CqlValue::Uuid(u) = value else {
            return Err(mismatch(self.name(), value, typ));
        };
        set_value(self.name(), writer, u.as_bytes())
    }

    fn decode(
        &self,
        _typ: &ColumnType,
        bytes: &[u8],
        _ctx: &CodecContext<'_>,
    ) -> Result<CqlValue, DeserializationError> {
        let b = exact::<16>(self.name(), bytes)?;
        Ok(CqlValue::Uuid(Uuid::from_bytes(b)))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InetCodec;

impl Codec for InetCodec {
    fn name(&self) -> &'static str {
        "inet"
    }

    fn accepts_type(&self, typ: &ColumnType) -> bool {
        matches!(typ, ColumnType::Inet)
    }

    fn accepts(&self, value: &CqlValue, typ: &ColumnType) -> bool {
        matches!((value, typ), (CqlValue::Inet(_), ColumnType::Inet))
    }

    fn encode<'b>(
        &self,
        value: &CqlValue,
        typ: &ColumnType,
        _ctx: &CodecContext<'_>,
        writer: CellWriter<'b>,
    ) -> Result<WrittenCellProof<'b>, SerializationError> {
        match value {
            CqlValue::Inet(IpAddr::V4(ip)) => set_value(self.name(), writer, &ip.octets()),
            CqlValue::Inet(IpAddr::V6(ip)) => set_value(self.name(), writer, &ip.octets()),
            _ => Err(mismatch(self.name(), value, typ)),
        }
    }

    fn decode(
        &self,
        _typ: &ColumnType,
        bytes: &[u8],
        _ctx: &CodecContext<'_>,
    ) -> Result<CqlValue, DeserializationError> {
        let ip = match bytes.len() {
            4 => IpAddr::from(exact::<4>(self.name(), bytes)?),
            16 => IpAddr::from(exact::<16>(self.name(), bytes)?),
            len => {
                return Err(mk_deser_err(
                    self.name(),
                    BuiltinDeserializationErrorKind::BadInetLength(len),
                ))
            }
        };
        Ok(CqlValue::Inet(ip))
    }
}
