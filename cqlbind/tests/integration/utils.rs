use bytes::Bytes;
use cqlbind::frame::response::result::{
    ColumnSpec, ColumnType, Prepared, PreparedMetadata, ResultMetadata, TableSpec,
};
use cqlbind::frame::types::RawValue;
use cqlbind::statement::prepared::PreparedStatementBuilder;
use cqlbind::value::CqlValue;
use cqlbind::{BoundStatement, PreparedStatement};

pub(crate) fn setup_tracing() {
    let _ = tracing_subscriber::fmt::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(tracing_subscriber::fmt::TestWriter::new())
        .try_init();
}

pub(crate) fn col_specs(table: &str, cols: &[(&str, ColumnType)]) -> Vec<ColumnSpec> {
    let table_spec = TableSpec::new("ks", table);
    cols.iter()
        .map(|(name, typ)| ColumnSpec::new(*name, typ.clone(), table_spec.clone()))
        .collect()
}

/// Builder of a statement on `ks.<table>`, as if the server answered its
/// PREPARE with the given bind markers and partition key positions.
pub(crate) fn prepare(
    id: &'static [u8],
    table: &str,
    cols: &[(&str, ColumnType)],
    pk_positions: &[u16],
) -> PreparedStatementBuilder {
    let prepared = Prepared {
        id: Bytes::from_static(id),
        result_metadata_id: None,
        prepared_metadata: PreparedMetadata::new(col_specs(table, cols), pk_positions).unwrap(),
        result_metadata: ResultMetadata::new(col_specs(table, &[("v", ColumnType::Text)])),
    };
    PreparedStatement::builder(prepared, format!("INSERT INTO ks.{table} (...) VALUES (...)"))
        .keyspace("ks")
}

/// `INSERT INTO ks.users (id, name) VALUES (?, ?)`, partition key `id`.
pub(crate) fn users() -> PreparedStatement {
    prepare(
        b"users",
        "users",
        &[("id", ColumnType::Uuid), ("name", ColumnType::Text)],
        &[0],
    )
    .build()
    .unwrap()
}

/// Decodes every bound cell back with the statement's registry.
/// Null and unset cells are `None`.
pub(crate) fn decode_values(bound: &BoundStatement) -> Vec<Option<CqlValue>> {
    let prepared = bound.prepared();
    let registry = prepared.get_codec_registry();
    bound
        .values()
        .iter()
        .zip(prepared.get_variable_col_specs())
        .map(|(raw, spec)| match raw {
            RawValue::Value(bytes) => Some(
                registry
                    .decode(spec.typ(), bytes, prepared.get_protocol_version())
                    .unwrap(),
            ),
            RawValue::Null | RawValue::Unset => None,
        })
        .collect()
}
