//! The closed set of values that can be bound to a prepared statement.

use std::net::IpAddr;

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[error("Value is too large to fit in the CQL type")]
pub struct ValueOverflow;

/// Represents an unset value
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Unset;

/// Represents an counter value
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Counter(pub i64);

/// Enum providing a way to represent a value that might be unset
#[derive(Debug, Clone, Copy, Default)]
pub enum MaybeUnset<V> {
    #[default]
    Unset,
    Set(V),
}

impl<V> MaybeUnset<V> {
    #[inline]
    pub fn from_option(opt: Option<V>) -> Self {
        match opt {
            Some(v) => Self::Set(v),
            None => Self::Unset,
        }
    }
}

/// Represents timeuuid (uuid V1) value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CqlTimeuuid(Uuid);

impl CqlTimeuuid {
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    pub fn from_slice(b: &[u8]) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::from_slice(b)?))
    }

    pub fn from_u128(v: u128) -> Self {
        Self(Uuid::from_u128(v))
    }
}

impl From<CqlTimeuuid> for Uuid {
    fn from(value: CqlTimeuuid) -> Self {
        value.0
    }
}

impl From<Uuid> for CqlTimeuuid {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl std::str::FromStr for CqlTimeuuid {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// Native CQL `varint` representation.
///
/// Represented as two's complement big-endian bytes. Constructors don't
/// normalize the data, so the bytes may contain redundant leading digits and
/// are passed to the database as is. [`PartialEq`] compares normalized forms.
#[derive(Clone, Eq, Debug)]
pub struct CqlVarint(Vec<u8>);

impl CqlVarint {
    /// Creates a [`CqlVarint`] from an array of bytes in
    /// two's complement big-endian binary representation.
    pub fn from_signed_bytes_be(digits: Vec<u8>) -> Self {
        Self(digits)
    }

    pub fn from_signed_bytes_be_slice(digits: &[u8]) -> Self {
        Self::from_signed_bytes_be(digits.to_vec())
    }

    pub fn into_signed_bytes_be(self) -> Vec<u8> {
        self.0
    }

    pub fn as_signed_bytes_be_slice(&self) -> &[u8] {
        &self.0
    }

    // Strips leading 0x00 and 0xFF bytes that don't change the value.
    fn as_normalized_slice(&self) -> &[u8] {
        let mut digits = self.0.as_slice();
        while let [first, second, ..] = digits {
            let redundant = (*first == 0x00 && second & 0x80 == 0)
                || (*first == 0xff && second & 0x80 != 0);
            if !redundant {
                break;
            }
            digits = &digits[1..];
        }
        digits
    }
}

impl PartialEq for CqlVarint {
    fn eq(&self, other: &Self) -> bool {
        self.as_normalized_slice() == other.as_normalized_slice()
    }
}

impl std::hash::Hash for CqlVarint {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.as_normalized_slice().hash(state)
    }
}

impl From<i64> for CqlVarint {
    fn from(value: i64) -> Self {
        Self(value.to_be_bytes().to_vec())
    }
}

/// Native CQL `decimal` representation: a [`CqlVarint`] unscaled value and
/// a 32-bit scale.
#[derive(Clone, PartialEq, Eq, Debug, Hash)]
pub struct CqlDecimal {
    int_val: CqlVarint,
    scale: i32,
}

impl CqlDecimal {
    pub fn from_signed_be_bytes_and_exponent(bytes: Vec<u8>, scale: i32) -> Self {
        Self {
            int_val: CqlVarint::from_signed_bytes_be(bytes),
            scale,
        }
    }

    pub fn from_signed_be_bytes_slice_and_exponent(bytes: &[u8], scale: i32) -> Self {
        Self::from_signed_be_bytes_and_exponent(bytes.to_vec(), scale)
    }

    /// Returns a slice of bytes in two's complement
    /// binary big-endian representation and a scale.
    pub fn as_signed_be_bytes_slice_and_exponent(&self) -> (&[u8], i32) {
        (self.int_val.as_signed_bytes_be_slice(), self.scale)
    }
}

/// Native CQL date representation that allows for a bigger range of dates (-262145-1-1 to 262143-12-31).
///
/// Represented as number of days since -5877641-06-23 i.e. 2^31 days before unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub struct CqlDate(pub u32);

/// Native CQL timestamp representation that allows full supported timestamp range.
///
/// Represented as signed milliseconds since unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub struct CqlTimestamp(pub i64);

/// Native CQL time representation.
///
/// Represented as nanoseconds since midnight.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub struct CqlTime(pub i64);

#[cfg(feature = "chrono-04")]
impl From<chrono_04::NaiveDate> for CqlDate {
    fn from(value: chrono_04::NaiveDate) -> Self {
        let unix_epoch = chrono_04::NaiveDate::UNIX_EPOCH;

        // `NaiveDate` range is -262145-01-01 to 262143-12-31
        // Both values are well within supported range
        let days = ((1 << 31) + value.signed_duration_since(unix_epoch).num_days()) as u32;

        Self(days)
    }
}

#[cfg(feature = "chrono-04")]
impl TryInto<chrono_04::NaiveDate> for CqlDate {
    type Error = ValueOverflow;

    fn try_into(self) -> Result<chrono_04::NaiveDate, Self::Error> {
        let days_since_unix_epoch = self.0 as i64 - (1 << 31);

        chrono_04::Duration::try_days(days_since_unix_epoch)
            .and_then(|d| chrono_04::NaiveDate::UNIX_EPOCH.checked_add_signed(d))
            .ok_or(ValueOverflow)
    }
}

#[cfg(feature = "chrono-04")]
impl From<chrono_04::DateTime<chrono_04::Utc>> for CqlTimestamp {
    fn from(value: chrono_04::DateTime<chrono_04::Utc>) -> Self {
        Self(value.timestamp_millis())
    }
}

#[cfg(feature = "chrono-04")]
impl TryInto<chrono_04::DateTime<chrono_04::Utc>> for CqlTimestamp {
    type Error = ValueOverflow;

    fn try_into(self) -> Result<chrono_04::DateTime<chrono_04::Utc>, Self::Error> {
        use chrono_04::TimeZone;
        match chrono_04::Utc.timestamp_millis_opt(self.0) {
            chrono_04::LocalResult::Single(datetime) => Ok(datetime),
            _ => Err(ValueOverflow),
        }
    }
}

#[cfg(feature = "chrono-04")]
impl TryFrom<chrono_04::NaiveTime> for CqlTime {
    type Error = ValueOverflow;

    fn try_from(value: chrono_04::NaiveTime) -> Result<Self, Self::Error> {
        use chrono_04::Timelike;
        let nanos = value.num_seconds_from_midnight() as i64 * 1_000_000_000
            + value.nanosecond() as i64;

        // Leap second representation is longer than a day.
        if nanos <= 86399999999999 {
            Ok(Self(nanos))
        } else {
            Err(ValueOverflow)
        }
    }
}

/// Represents a CQL Duration value
#[derive(Clone, Debug, Copy, PartialEq, Eq, Hash)]
pub struct CqlDuration {
    pub months: i32,
    pub days: i32,
    pub nanoseconds: i64,
}

/// A value of any CQL type.
///
/// `Empty` is the special zero-length value that most native types admit
/// besides their natural representation.
#[derive(Clone, Debug, PartialEq)]
pub enum CqlValue {
    Ascii(String),
    Boolean(bool),
    Blob(Vec<u8>),
    Counter(Counter),
    Decimal(CqlDecimal),
    /// Days since -5877641-06-23 i.e. 2^31 days before unix epoch
    Date(CqlDate),
    Double(f64),
    Duration(CqlDuration),
    Empty,
    Float(f32),
    Int(i32),
    BigInt(i64),
    Text(String),
    /// Milliseconds since unix epoch
    Timestamp(CqlTimestamp),
    Inet(IpAddr),
    List(Vec<CqlValue>),
    Map(Vec<(CqlValue, CqlValue)>),
    Set(Vec<CqlValue>),
    UserDefinedType {
        keyspace: String,
        name: String,
        /// Order of `fields` vector must match the order of fields as defined in the UDT.
        fields: Vec<(String, Option<CqlValue>)>,
    },
    SmallInt(i16),
    TinyInt(i8),
    /// Nanoseconds since midnight
    Time(CqlTime),
    Timeuuid(CqlTimeuuid),
    Tuple(Vec<Option<CqlValue>>),
    Uuid(Uuid),
    Varint(CqlVarint),
}

impl CqlValue {
    /// A short name of the value's kind, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Ascii(_) => "ascii",
            Self::Boolean(_) => "boolean",
            Self::Blob(_) => "blob",
            Self::Counter(_) => "counter",
            Self::Decimal(_) => "decimal",
            Self::Date(_) => "date",
            Self::Double(_) => "double",
            Self::Duration(_) => "duration",
            Self::Empty => "empty",
            Self::Float(_) => "float",
            Self::Int(_) => "int",
            Self::BigInt(_) => "bigint",
            Self::Text(_) => "text",
            Self::Timestamp(_) => "timestamp",
            Self::Inet(_) => "inet",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Set(_) => "set",
            Self::UserDefinedType { .. } => "udt",
            Self::SmallInt(_) => "smallint",
            Self::TinyInt(_) => "tinyint",
            Self::Time(_) => "time",
            Self::Timeuuid(_) => "timeuuid",
            Self::Tuple(_) => "tuple",
            Self::Uuid(_) => "uuid",
            Self::Varint(_) => "varint",
        }
    }

    pub fn as_text(&self) -> Option<&String> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bigint(&self) -> Option<i64> {
        match self {
            Self::BigInt(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            Self::Uuid(u) => Some(*u),
            _ => None,
        }
    }

    pub fn as_blob(&self) -> Option<&Vec<u8>> {
        match self {
            Self::Blob(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_string(self) -> Option<String> {
        match self {
            Self::Ascii(s) => Some(s),
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

macro_rules! impl_from_native_for_cql_value {
    ($($typ:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$typ> for CqlValue {
                #[inline]
                fn from(value: $typ) -> Self {
                    CqlValue::$variant(value)
                }
            }
        )*
    };
}

impl_from_native_for_cql_value!(
    bool => Boolean,
    i8 => TinyInt,
    i16 => SmallInt,
    i32 => Int,
    i64 => BigInt,
    f32 => Float,
    f64 => Double,
    String => Text,
    Vec<u8> => Blob,
    Uuid => Uuid,
    IpAddr => Inet,
    Counter => Counter,
    CqlDate => Date,
    CqlTime => Time,
    CqlTimestamp => Timestamp,
    CqlDuration => Duration,
    CqlTimeuuid => Timeuuid,
    CqlVarint => Varint,
    CqlDecimal => Decimal,
);

impl From<&str> for CqlValue {
    #[inline]
    fn from(value: &str) -> Self {
        CqlValue::Text(value.to_owned())
    }
}

impl From<&[u8]> for CqlValue {
    #[inline]
    fn from(value: &[u8]) -> Self {
        CqlValue::Blob(value.to_vec())
    }
}

#[cfg(feature = "chrono-04")]
impl From<chrono_04::NaiveDate> for CqlValue {
    fn from(value: chrono_04::NaiveDate) -> Self {
        CqlValue::Date(value.into())
    }
}

#[cfg(feature = "chrono-04")]
impl From<chrono_04::DateTime<chrono_04::Utc>> for CqlValue {
    fn from(value: chrono_04::DateTime<chrono_04::Utc>) -> Self {
        CqlValue::Timestamp(value.into())
    }
}
