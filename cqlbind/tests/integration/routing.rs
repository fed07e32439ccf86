use bytes::Bytes;
use cqlbind::frame::response::result::ColumnType;
use cqlbind::routing::partitioner::{
    calculate_token_for_partition_key, Partitioner, PartitionerName,
};
use cqlbind::serialize::row::SerializedValues;
use cqlbind::value::Unset;
use cqlbind::{Routing, Token};
use uuid::Uuid;

use crate::utils::{prepare, setup_tracing, users};

#[test]
fn explicit_key_beats_token_beats_derived_key() {
    setup_tracing();
    let statement = users();
    let u = Uuid::new_v4();

    let key = Bytes::from_static(b"k");
    let token = Token::new(99);

    let routed_by_key = statement
        .bound_statement_builder((u, "alice"))
        .unwrap()
        .routing_token(Some(token))
        .routing_key(Some(key.clone()))
        .build();
    assert_eq!(routed_by_key.routing(), &Routing::Key(key));

    let routed_by_token = statement
        .bound_statement_builder((u, "alice"))
        .unwrap()
        .routing_token(Some(token))
        .build();
    assert_eq!(routed_by_token.token(), Some(token));
    assert_eq!(routed_by_token.routing_key(), None);

    let derived = statement.bind((u, "alice")).unwrap();
    assert_eq!(
        derived.routing(),
        &Routing::Key(Bytes::copy_from_slice(u.as_bytes()))
    );

    let unrouted = statement.bind((None::<Uuid>, "alice")).unwrap();
    assert_eq!(unrouted.routing(), &Routing::Unrouted);
}

#[test]
fn composite_key_matches_standalone_token_calculation() {
    setup_tracing();
    // PRIMARY KEY ((tenant, bucket), name), bound as (name, bucket, tenant)
    let statement = prepare(
        b"events",
        "events",
        &[
            ("name", ColumnType::Text),
            ("bucket", ColumnType::Int),
            ("tenant", ColumnType::Text),
        ],
        &[2, 1],
    )
    .build()
    .unwrap();

    let bound = statement.bind(("ev", 3_i32, "acme")).unwrap();
    let key = bound.routing_key().unwrap();

    let mut expected = Vec::new();
    for component in [&b"acme"[..], &3_i32.to_be_bytes()[..]] {
        expected.extend_from_slice(&(component.len() as u16).to_be_bytes());
        expected.extend_from_slice(component);
        expected.push(0);
    }
    assert_eq!(&key[..], expected.as_slice());

    let (pk_values, ()) = SerializedValues::from_closure(|writer| {
        writer.make_cell_writer().set_value(b"acme")?;
        writer.make_cell_writer().set_value(&3_i32.to_be_bytes())?;
        Ok(())
    })
    .unwrap();
    let standalone = calculate_token_for_partition_key(&pk_values, &PartitionerName::Murmur3)
        .unwrap();
    assert_eq!(bound.token(), Some(standalone));
    assert_eq!(
        statement.calculate_token(("ev", 3_i32, "acme")).unwrap(),
        Some(standalone)
    );
}

#[test]
fn incomplete_key_is_unrouted() {
    setup_tracing();
    let statement = prepare(
        b"pairs",
        "pairs",
        &[("a", ColumnType::Int), ("b", ColumnType::Int)],
        &[0, 1],
    )
    .build()
    .unwrap();

    for bound in [
        statement.bind((1_i32, None::<i32>)).unwrap(),
        statement.bind((Unset, 2_i32)).unwrap(),
    ] {
        assert_eq!(bound.routing(), &Routing::Unrouted);
        assert_eq!(bound.token(), None);
    }
}

#[test]
fn token_is_the_partitioner_hash_of_the_derived_key() {
    setup_tracing();
    let u = Uuid::new_v4();
    let statement = prepare(
        b"murmur",
        "users",
        &[("id", ColumnType::Uuid), ("name", ColumnType::Text)],
        &[0],
    )
    .partitioner(
        PartitionerName::from_class_name("org.apache.cassandra.dht.Murmur3Partitioner").unwrap(),
    )
    .build()
    .unwrap();

    let bound = statement.bind((u, "alice")).unwrap();
    assert_eq!(
        bound.token(),
        Some(PartitionerName::Murmur3.hash_one(u.as_bytes()))
    );
    assert_eq!(bound.token(), users().bind((u, "bob")).unwrap().token());
}

#[test]
fn routing_keyspace_defaults_to_the_table_keyspace() {
    setup_tracing();
    let bound = users().bind((Uuid::new_v4(), "alice")).unwrap();
    assert_eq!(bound.get_routing_keyspace(), Some("ks"));
}
