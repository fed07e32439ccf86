use bytes::Bytes;
use cqlbind_cql::frame::response::result::{
    ColumnSpec, ColumnType, Prepared, PreparedMetadata, ResultMetadata, TableSpec,
};

use crate::statement::prepared::{PreparedStatement, PreparedStatementBuilder};

pub(crate) fn setup_tracing() {
    let _ = tracing_subscriber::fmt::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(tracing_subscriber::fmt::TestWriter::new())
        .try_init();
}

pub(crate) fn col_specs(cols: &[(&str, ColumnType)]) -> Vec<ColumnSpec> {
    let table_spec = TableSpec::new("ks", "t");
    cols.iter()
        .map(|(name, typ)| ColumnSpec::new(*name, typ.clone(), table_spec.clone()))
        .collect()
}

/// A PREPARE response for a statement on `ks.t` with the given bind markers
/// and partition key positions, in partition key order.
pub(crate) fn prepared(cols: &[(&str, ColumnType)], pk_positions: &[u16]) -> Prepared {
    Prepared {
        id: Bytes::from_static(b"\x0a\x0b\x0c"),
        result_metadata_id: None,
        prepared_metadata: PreparedMetadata::new(col_specs(cols), pk_positions).unwrap(),
        result_metadata: ResultMetadata::new(col_specs(&[("v", ColumnType::Text)])),
    }
}

pub(crate) fn statement_builder(
    cols: &[(&str, ColumnType)],
    pk_positions: &[u16],
) -> PreparedStatementBuilder {
    PreparedStatement::builder(
        prepared(cols, pk_positions),
        "INSERT INTO ks.t (...) VALUES (...)",
    )
}

pub(crate) fn statement(cols: &[(&str, ColumnType)], pk_positions: &[u16]) -> PreparedStatement {
    statement_builder(cols, pk_positions).build().unwrap()
}
