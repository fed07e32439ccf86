use bytes::{BufMut, Bytes};
use cqlbind::frame::response::result::{
    deser_rows_metadata, ColumnType, Prepared, PreparedMetadata, ResultMetadata,
};
use cqlbind::{Consistency, PreparedStatement, ProtocolVersion};
use uuid::Uuid;

use crate::utils::{col_specs, setup_tracing};

fn v5_users() -> PreparedStatement {
    let prepared = Prepared {
        id: Bytes::from_static(b"v5users"),
        result_metadata_id: Some(Bytes::from_static(b"r1")),
        prepared_metadata: PreparedMetadata::new(
            col_specs("users", &[("id", ColumnType::Uuid), ("name", ColumnType::Text)]),
            &[0],
        )
        .unwrap(),
        result_metadata: ResultMetadata::new(col_specs("users", &[("name", ColumnType::Text)])),
    };
    PreparedStatement::builder(prepared, "SELECT name FROM ks.users WHERE id = ? AND name = ?")
        .keyspace("ks")
        .protocol_version(ProtocolVersion::V5)
        .build()
        .unwrap()
}

fn put_string(buf: &mut Vec<u8>, s: &str) {
    buf.put_u16(s.len() as u16);
    buf.put_slice(s.as_bytes());
}

#[test]
fn replaced_metadata_reaches_statements_bound_earlier() {
    setup_tracing();
    let statement = v5_users();
    let bound = statement.bind((Uuid::new_v4(), "alice")).unwrap();
    assert_eq!(
        bound.to_execute(Consistency::One).result_metadata_id,
        Some(Bytes::from_static(b"r1"))
    );

    let new_metadata = ResultMetadata::new(col_specs(
        "users",
        &[("name", ColumnType::Text), ("email", ColumnType::Text)],
    ));
    statement.set_result_metadata(Some(Bytes::from_static(b"r2")), new_metadata.clone());

    let execute = bound.to_execute(Consistency::One);
    assert_eq!(execute.result_metadata_id, Some(Bytes::from_static(b"r2")));
    assert!(execute.parameters.skip_metadata);

    let snapshot = statement.get_result_metadata();
    assert_eq!(snapshot.id(), Some(&Bytes::from_static(b"r2")));
    assert_eq!(snapshot.metadata(), &new_metadata);
    assert_eq!(statement.get_result_set_col_specs()[1].name(), "email");
}

#[test]
fn clones_share_the_metadata_slot() {
    setup_tracing();
    let statement = v5_users();
    let clone = statement.clone();

    clone.set_result_metadata(
        Some(Bytes::from_static(b"r9")),
        ResultMetadata::mock_empty(),
    );
    assert_eq!(
        statement.get_result_metadata_id(),
        Some(Bytes::from_static(b"r9"))
    );
    assert!(statement.get_result_set_col_specs().is_empty());
}

#[test]
fn rows_response_with_changed_metadata_updates_the_statement() {
    setup_tracing();
    let statement = v5_users();
    let bound = statement.bind((Uuid::new_v4(), "alice")).unwrap();

    // METADATA_CHANGED | GLOBAL_TABLES_SPEC, two columns, new id "r7"
    let mut body = Vec::new();
    body.put_i32(0x0008 | 0x0001);
    body.put_i32(2);
    put_string(&mut body, "r7");
    put_string(&mut body, "ks");
    put_string(&mut body, "users");
    for column in ["name", "email"] {
        put_string(&mut body, column);
        body.put_u16(0x000D);
    }
    let rows = deser_rows_metadata(&mut body.as_slice(), ProtocolVersion::V5).unwrap();
    assert!(rows.metadata_changed());

    assert!(statement.apply_rows_metadata(&rows));
    assert_eq!(
        bound.to_execute(Consistency::Quorum).result_metadata_id,
        Some(Bytes::from_static(b"r7"))
    );
    let names: Vec<_> = statement
        .get_result_set_col_specs()
        .iter()
        .map(|spec| spec.name().to_owned())
        .collect();
    assert_eq!(names, ["name", "email"]);
}
