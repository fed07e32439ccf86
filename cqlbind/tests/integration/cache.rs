use cqlbind::frame::request::SerializableRequest;
use cqlbind::{PreparedStatementCache, ProtocolVersion};
use uuid::Uuid;

use crate::utils::{setup_tracing, users};

#[test]
fn cache_resolves_only_live_statements() {
    setup_tracing();
    let cache = PreparedStatementCache::new();
    let statement = users();
    cache.insert(&statement);

    let id = statement.get_id().clone();
    let found = cache.get(&id).unwrap();
    found.bind((Uuid::new_v4(), "alice")).unwrap();

    drop(found);
    drop(statement);
    assert!(cache.get(&id).is_none());
    assert_eq!(cache.purge(), 0);
    assert!(cache.is_empty());
}

#[test]
fn bound_statement_keeps_its_prepared_statement_alive() {
    setup_tracing();
    let cache = PreparedStatementCache::new();
    let statement = users();
    cache.insert(&statement);
    let id = statement.get_id().clone();

    let bound = statement.bind((Uuid::new_v4(), "alice")).unwrap();
    drop(statement);
    assert!(cache.get(&id).is_some());

    drop(bound);
    assert_eq!(cache.purge(), 1);
    assert_eq!(cache.len(), 0);
}

#[test]
fn reprepare_payload_builds_a_prepare_request() {
    setup_tracing();
    let cache = PreparedStatementCache::new();
    let statement = users();
    cache.insert(&statement);

    let payload = cache.get_reprepare_payload(statement.get_id()).unwrap();
    assert_eq!(payload.statement(), statement.get_statement());
    assert_eq!(payload.keyspace(), Some("ks"));

    let prepare = payload.to_prepare();
    let v4 = prepare.to_bytes(ProtocolVersion::V4).unwrap();
    let v5 = prepare.to_bytes(ProtocolVersion::V5).unwrap();
    // [long string] query, then in v5 [int] flags and [string] keyspace
    let query_len = 4 + statement.get_statement().len();
    assert_eq!(v4.len(), query_len);
    assert_eq!(v5.len(), query_len + 4 + 2 + "ks".len());
    assert_eq!(&v5[query_len..query_len + 4], &[0, 0, 0, 1]);
}
