//! Schema descriptions carried by RESULT responses: prepared metadata,
//! result metadata and CQL type options.

use std::fmt;
use std::result::Result as StdResult;

use bytes::Bytes;

use crate::frame::frame_errors::{
    ColumnSpecParseError, ColumnSpecParseErrorKind, CqlTypeParseError, PreparedParseError,
    ResultMetadataParseError, TableSpecParseError,
};
use crate::frame::request::query::PagingStateResponse;
use crate::frame::types;
use crate::frame::ProtocolVersion;

// Metadata flags
const FLAG_GLOBAL_TABLES_SPEC: i32 = 0x0001;
const FLAG_HAS_MORE_PAGES: i32 = 0x0002;
const FLAG_NO_METADATA: i32 = 0x0004;
const FLAG_METADATA_CHANGED: i32 = 0x0008;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableSpec {
    ks_name: String,
    table_name: String,
}

impl TableSpec {
    pub fn new(ks_name: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            ks_name: ks_name.into(),
            table_name: table_name.into(),
        }
    }

    pub fn ks_name(&self) -> &str {
        &self.ks_name
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }
}

/// A CQL type, as declared for a bind marker or a result column.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Custom(String),
    Ascii,
    Boolean,
    Blob,
    Counter,
    Date,
    Decimal,
    Double,
    Duration,
    Float,
    Int,
    BigInt,
    Text,
    Timestamp,
    Inet,
    List(Box<ColumnType>),
    Map(Box<ColumnType>, Box<ColumnType>),
    Set(Box<ColumnType>),
    UserDefinedType {
        type_name: String,
        keyspace: String,
        field_types: Vec<(String, ColumnType)>,
    },
    SmallInt,
    TinyInt,
    Time,
    Timeuuid,
    Tuple(Vec<ColumnType>),
    Uuid,
    Varint,
}

impl ColumnType {
    // Returns true if the type allows a special, empty value in addition to its
    // natural representation. For example, bigint represents a 64-bit integer,
    // but it can also hold a 0-bit empty value.
    pub fn supports_special_empty_value(&self) -> bool {
        #[allow(clippy::match_like_matches_macro)]
        match self {
            ColumnType::Counter
            | ColumnType::Duration
            | ColumnType::List(_)
            | ColumnType::Map(_, _)
            | ColumnType::Set(_)
            | ColumnType::UserDefinedType { .. }
            | ColumnType::Custom(_) => false,

            _ => true,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Custom(name) => write!(f, "'{}'", name),
            ColumnType::Ascii => f.write_str("ascii"),
            ColumnType::Boolean => f.write_str("boolean"),
            ColumnType::Blob => f.write_str("blob"),
            ColumnType::Counter => f.write_str("counter"),
            ColumnType::Date => f.write_str("date"),
            ColumnType::Decimal => f.write_str("decimal"),
            ColumnType::Double => f.write_str("double"),
            ColumnType::Duration => f.write_str("duration"),
            ColumnType::Float => f.write_str("float"),
            ColumnType::Int => f.write_str("int"),
            ColumnType::BigInt => f.write_str("bigint"),
            ColumnType::Text => f.write_str("text"),
            ColumnType::Timestamp => f.write_str("timestamp"),
            ColumnType::Inet => f.write_str("inet"),
            ColumnType::List(elem) => write!(f, "list<{}>", elem),
            ColumnType::Map(key, value) => write!(f, "map<{}, {}>", key, value),
            ColumnType::Set(elem) => write!(f, "set<{}>", elem),
            ColumnType::UserDefinedType {
                type_name,
                keyspace,
                ..
            } => write!(f, "{}.{}", keyspace, type_name),
            ColumnType::SmallInt => f.write_str("smallint"),
            ColumnType::TinyInt => f.write_str("tinyint"),
            ColumnType::Time => f.write_str("time"),
            ColumnType::Timeuuid => f.write_str("timeuuid"),
            ColumnType::Tuple(elems) => {
                f.write_str("tuple<")?;
                for (i, elem) in elems.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", elem)?;
                }
                f.write_str(">")
            }
            ColumnType::Uuid => f.write_str("uuid"),
            ColumnType::Varint => f.write_str("varint"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub(crate) table_spec: TableSpec,
    pub(crate) name: String,
    pub(crate) typ: ColumnType,
}

impl ColumnSpec {
    #[inline]
    pub fn new(name: impl Into<String>, typ: ColumnType, table_spec: TableSpec) -> Self {
        Self {
            table_spec,
            name: name.into(),
            typ,
        }
    }

    #[inline]
    pub fn table_spec(&self) -> &TableSpec {
        &self.table_spec
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn typ(&self) -> &ColumnType {
        &self.typ
    }
}

/// Description of the columns a statement returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultMetadata {
    col_count: usize,
    col_specs: Vec<ColumnSpec>,
}

impl ResultMetadata {
    #[inline]
    pub fn mock_empty() -> Self {
        Self {
            col_count: 0,
            col_specs: Vec::new(),
        }
    }

    #[inline]
    pub fn new(col_specs: Vec<ColumnSpec>) -> Self {
        Self {
            col_count: col_specs.len(),
            col_specs,
        }
    }

    #[inline]
    pub fn col_count(&self) -> usize {
        self.col_count
    }

    #[inline]
    pub fn col_specs(&self) -> &[ColumnSpec] {
        &self.col_specs
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PartitionKeyIndex {
    /// index in the serialized values
    pub index: u16,
    /// sequence number in partition key
    pub sequence: u16,
}

/// Description of the bind markers of a prepared statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedMetadata {
    pub flags: i32,
    pub col_count: usize,
    /// pk_indexes are sorted by `index` and can be reordered in partition key order
    /// using `sequence` field
    pub pk_indexes: Vec<PartitionKeyIndex>,
    pub col_specs: Vec<ColumnSpec>,
}

impl PreparedMetadata {
    /// Builds metadata from column specs and the bind positions of the
    /// partition key components, given in partition key order.
    ///
    /// Fails if a position does not name a bind marker or is repeated.
    pub fn new(
        col_specs: Vec<ColumnSpec>,
        pk_positions: &[u16],
    ) -> StdResult<Self, ResultMetadataParseError> {
        let col_count = col_specs.len();
        let mut pk_indexes = Vec::with_capacity(pk_positions.len());
        for (sequence, &index) in pk_positions.iter().enumerate() {
            if index as usize >= col_count {
                return Err(ResultMetadataParseError::PkIndexOutOfRange { index, col_count });
            }
            pk_indexes.push(PartitionKeyIndex {
                index,
                sequence: sequence as u16,
            });
        }
        pk_indexes.sort_unstable_by_key(|pki| pki.index);
        ensure_distinct_pk_indexes(&pk_indexes)?;

        Ok(Self {
            flags: 0,
            col_count,
            pk_indexes,
            col_specs,
        })
    }
}

/// Body of a RESULT::Prepared response.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub id: Bytes,
    /// Present only with protocol v5.
    pub result_metadata_id: Option<Bytes>,
    pub prepared_metadata: PreparedMetadata,
    pub result_metadata: ResultMetadata,
}

/// The metadata header of a RESULT::Rows response.
#[derive(Debug, Clone)]
pub struct RowsMetadata {
    pub metadata: ResultMetadata,
    pub paging_state_response: PagingStateResponse,
    /// Set when the server reports (v5 `METADATA_CHANGED`) that the result
    /// metadata the client holds is outdated. `metadata` is then the new one.
    pub new_metadata_id: Option<Bytes>,
}

impl RowsMetadata {
    /// Whether the server signalled a result metadata change.
    #[inline]
    pub fn metadata_changed(&self) -> bool {
        self.new_metadata_id.is_some()
    }
}

pub fn deser_type(buf: &mut &[u8]) -> StdResult<ColumnType, CqlTypeParseError> {
    use ColumnType::*;
    let id =
        types::read_short(buf).map_err(|err| CqlTypeParseError::TypeIdParseError(err.into()))?;
    Ok(match id {
        0x0000 => {
            let type_str =
                types::read_string(buf).map_err(CqlTypeParseError::CustomTypeNameParseError)?;
            match type_str {
                "org.apache.cassandra.db.marshal.DurationType" => Duration,
                _ => Custom(type_str.to_owned()),
            }
        }
        0x0001 => Ascii,
        0x0002 => BigInt,
        0x0003 => Blob,
        0x0004 => Boolean,
        0x0005 => Counter,
        0x0006 => Decimal,
        0x0007 => Double,
        0x0008 => Float,
        0x0009 => Int,
        // varchar is an alias of text
        0x000A => Text,
        0x000B => Timestamp,
        0x000C => Uuid,
        0x000D => Text,
        0x000E => Varint,
        0x000F => Timeuuid,
        0x0010 => Inet,
        0x0011 => Date,
        0x0012 => Time,
        0x0013 => SmallInt,
        0x0014 => TinyInt,
        0x0015 => Duration,
        0x0020 => List(Box::new(deser_type(buf)?)),
        0x0021 => Map(Box::new(deser_type(buf)?), Box::new(deser_type(buf)?)),
        0x0022 => Set(Box::new(deser_type(buf)?)),
        0x0030 => {
            let keyspace_name =
                types::read_string(buf).map_err(CqlTypeParseError::UdtKeyspaceNameParseError)?;
            let type_name =
                types::read_string(buf).map_err(CqlTypeParseError::UdtNameParseError)?;
            let fields_size: usize = types::read_short(buf)
                .map_err(|err| CqlTypeParseError::UdtFieldsCountParseError(err.into()))?
                .into();

            let mut field_types = Vec::with_capacity(fields_size);

            for _ in 0..fields_size {
                let field_name =
                    types::read_string(buf).map_err(CqlTypeParseError::UdtFieldNameParseError)?;
                let field_type = deser_type(buf)?;

                field_types.push((field_name.to_owned(), field_type));
            }

            UserDefinedType {
                type_name: type_name.to_owned(),
                keyspace: keyspace_name.to_owned(),
                field_types,
            }
        }
        0x0031 => {
            let len: usize = types::read_short(buf)
                .map_err(|err| CqlTypeParseError::TupleLengthParseError(err.into()))?
                .into();
            let mut types = Vec::with_capacity(len);
            for _ in 0..len {
                types.push(deser_type(buf)?);
            }
            Tuple(types)
        }
        id => {
            return Err(CqlTypeParseError::TypeNotImplemented(id));
        }
    })
}

fn deser_table_spec(buf: &mut &[u8]) -> StdResult<TableSpec, TableSpecParseError> {
    let ks_name = types::read_string(buf).map_err(TableSpecParseError::MalformedKeyspaceName)?;
    let table_name = types::read_string(buf).map_err(TableSpecParseError::MalformedTableName)?;
    Ok(TableSpec::new(ks_name, table_name))
}

fn mk_col_spec_parse_error(
    col_idx: usize,
    err: impl Into<ColumnSpecParseErrorKind>,
) -> ColumnSpecParseError {
    ColumnSpecParseError {
        column_index: col_idx,
        kind: err.into(),
    }
}

/// Deserializes table spec of a column spec.
///
/// Checks for equality of table specs across columns, because the protocol
/// does not guarantee that and we want to be sure that the assumption
/// of them being all the same is correct.
/// To this end, the first column's table spec is written to `known_table_spec`
/// and compared with remaining columns' table spec.
fn deser_table_spec_for_col_spec(
    buf: &mut &[u8],
    global_table_spec_provided: bool,
    known_table_spec: &mut Option<TableSpec>,
    col_idx: usize,
) -> StdResult<TableSpec, ColumnSpecParseError> {
    let table_spec = match known_table_spec {
        // If global table spec was provided, we simply clone it to each column spec.
        Some(ref known_spec) if global_table_spec_provided => known_spec.clone(),

        Some(_) | None => {
            let table_spec =
                deser_table_spec(buf).map_err(|err| mk_col_spec_parse_error(col_idx, err))?;

            if let Some(ref known_spec) = known_table_spec {
                if known_spec != &table_spec {
                    return Err(mk_col_spec_parse_error(
                        col_idx,
                        ColumnSpecParseErrorKind::TableSpecDiffersAcrossColumns(
                            known_spec.clone(),
                            table_spec,
                        ),
                    ));
                }
            } else {
                *known_table_spec = Some(table_spec.clone());
            }

            table_spec
        }
    };

    Ok(table_spec)
}

fn deser_col_specs(
    buf: &mut &[u8],
    global_table_spec: Option<TableSpec>,
    col_count: usize,
) -> StdResult<Vec<ColumnSpec>, ColumnSpecParseError> {
    let global_table_spec_provided = global_table_spec.is_some();
    let mut known_table_spec = global_table_spec;

    let mut col_specs = Vec::with_capacity(col_count);
    for col_idx in 0..col_count {
        let table_spec = deser_table_spec_for_col_spec(
            buf,
            global_table_spec_provided,
            &mut known_table_spec,
            col_idx,
        )?;

        let name = types::read_string(buf).map_err(|err| mk_col_spec_parse_error(col_idx, err))?;
        let typ = deser_type(buf).map_err(|err| mk_col_spec_parse_error(col_idx, err))?;
        col_specs.push(ColumnSpec::new(name, typ, table_spec));
    }
    Ok(col_specs)
}

fn deser_result_metadata(
    buf: &mut &[u8],
    version: ProtocolVersion,
) -> StdResult<RowsMetadata, ResultMetadataParseError> {
    let flags = types::read_int(buf)
        .map_err(|err| ResultMetadataParseError::FlagsParseError(err.into()))?;
    let global_tables_spec = flags & FLAG_GLOBAL_TABLES_SPEC != 0;
    let has_more_pages = flags & FLAG_HAS_MORE_PAGES != 0;
    let no_metadata = flags & FLAG_NO_METADATA != 0;
    let metadata_changed =
        version.supports_result_metadata_id() && flags & FLAG_METADATA_CHANGED != 0;

    let col_count =
        types::read_int_length(buf).map_err(ResultMetadataParseError::ColumnCountParseError)?;

    let raw_paging_state = has_more_pages
        .then(|| types::read_bytes(buf).map_err(ResultMetadataParseError::PagingStateParseError))
        .transpose()?;

    let paging_state_response = PagingStateResponse::new_from_raw_bytes(raw_paging_state);

    let new_metadata_id = metadata_changed
        .then(|| {
            types::read_short_bytes(buf)
                .map(Bytes::copy_from_slice)
                .map_err(ResultMetadataParseError::NewMetadataIdParseError)
        })
        .transpose()?;

    let col_specs = if no_metadata {
        vec![]
    } else {
        let global_table_spec = global_tables_spec
            .then(|| deser_table_spec(buf))
            .transpose()?;

        deser_col_specs(buf, global_table_spec, col_count)?
    };

    Ok(RowsMetadata {
        metadata: ResultMetadata {
            col_count,
            col_specs,
        },
        paging_state_response,
        new_metadata_id,
    })
}

// Expects `pk_indexes` sorted by index.
fn ensure_distinct_pk_indexes(
    pk_indexes: &[PartitionKeyIndex],
) -> StdResult<(), ResultMetadataParseError> {
    match pk_indexes.windows(2).find(|w| w[0].index == w[1].index) {
        Some(w) => Err(ResultMetadataParseError::DuplicatePkIndex { index: w[0].index }),
        None => Ok(()),
    }
}

fn deser_prepared_metadata(
    buf: &mut &[u8],
    version: ProtocolVersion,
) -> StdResult<PreparedMetadata, ResultMetadataParseError> {
    let flags = types::read_int(buf)
        .map_err(|err| ResultMetadataParseError::FlagsParseError(err.into()))?;
    let global_tables_spec = flags & FLAG_GLOBAL_TABLES_SPEC != 0;

    let col_count =
        types::read_int_length(buf).map_err(ResultMetadataParseError::ColumnCountParseError)?;

    let mut pk_indexes = Vec::new();
    if version.prepared_has_pk_indexes() {
        let pk_count: usize =
            types::read_int_length(buf).map_err(ResultMetadataParseError::PkCountParseError)?;

        pk_indexes.reserve(pk_count);
        for i in 0..pk_count {
            let index = types::read_short(buf)
                .map_err(|err| ResultMetadataParseError::PkIndexParseError(err.into()))?;
            if index as usize >= col_count {
                return Err(ResultMetadataParseError::PkIndexOutOfRange { index, col_count });
            }
            pk_indexes.push(PartitionKeyIndex {
                index,
                sequence: i as u16,
            });
        }
        pk_indexes.sort_unstable_by_key(|pki| pki.index);
        ensure_distinct_pk_indexes(&pk_indexes)?;
    }

    let global_table_spec = global_tables_spec
        .then(|| deser_table_spec(buf))
        .transpose()?;

    let col_specs = deser_col_specs(buf, global_table_spec, col_count)?;

    Ok(PreparedMetadata {
        flags,
        col_count,
        pk_indexes,
        col_specs,
    })
}

/// Deserializes the body of a RESULT::Prepared response (without the result kind).
pub fn deser_prepared(
    buf: &mut &[u8],
    version: ProtocolVersion,
) -> StdResult<Prepared, PreparedParseError> {
    let id = types::read_short_bytes(buf)
        .map(Bytes::copy_from_slice)
        .map_err(PreparedParseError::IdParseError)?;
    let result_metadata_id = version
        .supports_result_metadata_id()
        .then(|| {
            types::read_short_bytes(buf)
                .map(Bytes::copy_from_slice)
                .map_err(PreparedParseError::ResultMetadataIdParseError)
        })
        .transpose()?;
    let prepared_metadata = deser_prepared_metadata(buf, version)
        .map_err(PreparedParseError::PreparedMetadataParseError)?;
    let RowsMetadata {
        metadata: result_metadata,
        paging_state_response,
        ..
    } = deser_result_metadata(buf, version).map_err(PreparedParseError::ResultMetadataParseError)?;
    if let PagingStateResponse::HasMorePages { state } = paging_state_response {
        return Err(PreparedParseError::NonZeroPagingState(
            state
                .as_bytes_slice()
                .cloned()
                .unwrap_or_else(|| std::sync::Arc::from([])),
        ));
    }

    Ok(Prepared {
        id,
        result_metadata_id,
        prepared_metadata,
        result_metadata,
    })
}

/// Deserializes the metadata header of a RESULT::Rows response (without the result kind).
///
/// On return, `buf` points at the rows count.
pub fn deser_rows_metadata(
    buf: &mut &[u8],
    version: ProtocolVersion,
) -> StdResult<RowsMetadata, ResultMetadataParseError> {
    deser_result_metadata(buf, version)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use bytes::{BufMut, Bytes};

    use super::{
        deser_prepared, deser_rows_metadata, deser_type, ColumnType, PartitionKeyIndex,
        PreparedMetadata, TableSpec,
    };
    use crate::frame::frame_errors::{
        ColumnSpecParseErrorKind, PreparedParseError, ResultMetadataParseError,
    };
    use crate::frame::types;
    use crate::frame::ProtocolVersion;

    fn write_col_spec(buf: &mut Vec<u8>, name: &str, type_id: u16) {
        types::write_string(name, buf).unwrap();
        types::write_short(type_id, buf);
    }

    // Prepared body for `INSERT INTO ks.t (a, b, c) VALUES (?, ?, ?)` with
    // partition key (c, a).
    fn prepared_body(version: ProtocolVersion, pk: &[u16]) -> Vec<u8> {
        let mut buf = Vec::new();
        types::write_short_bytes(&[0xde, 0xad], &mut buf).unwrap();
        if version.supports_result_metadata_id() {
            types::write_short_bytes(&[0xbe, 0xef], &mut buf).unwrap();
        }

        // prepared metadata
        buf.put_i32(0x0001);
        buf.put_i32(3);
        if version.prepared_has_pk_indexes() {
            buf.put_i32(pk.len() as i32);
            for idx in pk {
                buf.put_u16(*idx);
            }
        }
        types::write_string("ks", &mut buf).unwrap();
        types::write_string("t", &mut buf).unwrap();
        write_col_spec(&mut buf, "a", 0x0009);
        write_col_spec(&mut buf, "b", 0x000D);
        write_col_spec(&mut buf, "c", 0x000C);

        // result metadata: none
        buf.put_i32(0x0004);
        buf.put_i32(0);
        buf
    }

    #[test]
    fn prepared_v4_sorts_pk_indexes_and_keeps_sequence() {
        let body = prepared_body(ProtocolVersion::V4, &[2, 0]);
        let prepared = deser_prepared(&mut &body[..], ProtocolVersion::V4).unwrap();

        assert_eq!(&prepared.id[..], &[0xde, 0xad]);
        assert_eq!(prepared.result_metadata_id, None);
        assert_eq!(prepared.prepared_metadata.col_count, 3);
        assert_eq!(
            prepared.prepared_metadata.pk_indexes,
            [
                PartitionKeyIndex {
                    index: 0,
                    sequence: 1
                },
                PartitionKeyIndex {
                    index: 2,
                    sequence: 0
                },
            ]
        );
        let specs = &prepared.prepared_metadata.col_specs;
        assert_eq!(specs[1].name(), "b");
        assert_eq!(specs[1].typ(), &ColumnType::Text);
        assert_eq!(specs[2].table_spec(), &TableSpec::new("ks", "t"));
        assert_eq!(prepared.result_metadata.col_count(), 0);
    }

    #[test]
    fn prepared_v5_carries_result_metadata_id() {
        let body = prepared_body(ProtocolVersion::V5, &[0]);
        let prepared = deser_prepared(&mut &body[..], ProtocolVersion::V5).unwrap();
        assert_eq!(
            prepared.result_metadata_id,
            Some(Bytes::from_static(&[0xbe, 0xef]))
        );
    }

    #[test]
    fn prepared_v3_has_no_pk_indexes() {
        let body = prepared_body(ProtocolVersion::V3, &[]);
        let prepared = deser_prepared(&mut &body[..], ProtocolVersion::V3).unwrap();
        assert!(prepared.prepared_metadata.pk_indexes.is_empty());
        assert_eq!(prepared.prepared_metadata.col_specs.len(), 3);
    }

    #[test]
    fn prepared_rejects_out_of_range_pk_index() {
        let body = prepared_body(ProtocolVersion::V4, &[3]);
        assert_matches!(
            deser_prepared(&mut &body[..], ProtocolVersion::V4),
            Err(PreparedParseError::PreparedMetadataParseError(
                ResultMetadataParseError::PkIndexOutOfRange {
                    index: 3,
                    col_count: 3
                }
            ))
        );
    }

    #[test]
    fn prepared_rejects_repeated_pk_index() {
        let body = prepared_body(ProtocolVersion::V4, &[1, 1]);
        assert_matches!(
            deser_prepared(&mut &body[..], ProtocolVersion::V4),
            Err(PreparedParseError::PreparedMetadataParseError(
                ResultMetadataParseError::DuplicatePkIndex { index: 1 }
            ))
        );
    }

    #[test]
    fn prepared_rejects_paging_state() {
        let mut body = prepared_body(ProtocolVersion::V4, &[0]);
        body.truncate(body.len() - 8);
        body.put_i32(0x0002 | 0x0004);
        body.put_i32(0);
        types::write_bytes(&[1, 2], &mut body).unwrap();

        assert_matches!(
            deser_prepared(&mut &body[..], ProtocolVersion::V4),
            Err(PreparedParseError::NonZeroPagingState(state)) if &state[..] == [1, 2]
        );
    }

    #[test]
    fn column_specs_must_share_table() {
        let mut buf = Vec::new();
        buf.put_i32(0);
        buf.put_i32(2);
        types::write_string("ks", &mut buf).unwrap();
        types::write_string("t1", &mut buf).unwrap();
        write_col_spec(&mut buf, "a", 0x0009);
        types::write_string("ks", &mut buf).unwrap();
        types::write_string("t2", &mut buf).unwrap();
        write_col_spec(&mut buf, "b", 0x0009);

        let err = deser_rows_metadata(&mut &buf[..], ProtocolVersion::V4).unwrap_err();
        assert_matches!(
            err,
            ResultMetadataParseError::ColumnSpecParseError(e)
                if e.column_index == 1
                    && matches!(e.kind, ColumnSpecParseErrorKind::TableSpecDiffersAcrossColumns(..))
        );
    }

    #[test]
    fn rows_metadata_changed_v5() {
        let mut buf = Vec::new();
        buf.put_i32(0x0001 | 0x0008);
        buf.put_i32(1);
        types::write_short_bytes(&[7, 7, 7], &mut buf).unwrap();
        types::write_string("ks", &mut buf).unwrap();
        types::write_string("t", &mut buf).unwrap();
        write_col_spec(&mut buf, "v", 0x0002);
        // rows count follows
        buf.put_i32(0);

        let mut slice = &buf[..];
        let rows = deser_rows_metadata(&mut slice, ProtocolVersion::V5).unwrap();
        assert!(rows.metadata_changed());
        assert_eq!(rows.new_metadata_id, Some(Bytes::from_static(&[7, 7, 7])));
        assert_eq!(rows.metadata.col_specs()[0].typ(), &ColumnType::BigInt);
        assert!(rows.paging_state_response.finished());
        assert_eq!(slice, [0, 0, 0, 0]);
    }

    #[test]
    fn nested_type_options() {
        let mut buf = Vec::new();
        // map<text, frozen<tuple<int, list<uuid>>>>
        buf.put_u16(0x0021);
        buf.put_u16(0x000D);
        buf.put_u16(0x0031);
        buf.put_u16(2);
        buf.put_u16(0x0009);
        buf.put_u16(0x0020);
        buf.put_u16(0x000C);
        // a custom duration type maps to the native one
        buf.put_u16(0x0000);
        types::write_string("org.apache.cassandra.db.marshal.DurationType", &mut buf).unwrap();

        let mut slice = &buf[..];
        let map = deser_type(&mut slice).unwrap();
        assert_eq!(
            map,
            ColumnType::Map(
                Box::new(ColumnType::Text),
                Box::new(ColumnType::Tuple(vec![
                    ColumnType::Int,
                    ColumnType::List(Box::new(ColumnType::Uuid))
                ]))
            )
        );
        assert_eq!(map.to_string(), "map<text, tuple<int, list<uuid>>>");
        assert_eq!(deser_type(&mut slice).unwrap(), ColumnType::Duration);
    }

    #[test]
    fn prepared_metadata_new_validates_positions() {
        let specs = vec![super::ColumnSpec::new(
            "a",
            ColumnType::Int,
            TableSpec::new("ks", "t"),
        )];
        assert_matches!(
            PreparedMetadata::new(specs.clone(), &[1]),
            Err(ResultMetadataParseError::PkIndexOutOfRange {
                index: 1,
                col_count: 1
            })
        );
        let metadata = PreparedMetadata::new(specs.clone(), &[0]).unwrap();
        assert_eq!(metadata.pk_indexes.len(), 1);

        let two = [specs[0].clone(), specs[0].clone()];
        assert_matches!(
            PreparedMetadata::new(two.to_vec(), &[0, 0]),
            Err(ResultMetadataParseError::DuplicatePkIndex { index: 0 })
        );
    }
}
