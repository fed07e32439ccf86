use std::sync::{Arc, Barrier};
use std::thread;

use bytes::Bytes;
use cqlbind::frame::response::result::{ColumnType, ResultMetadata};
use uuid::Uuid;

use crate::utils::{col_specs, setup_tracing, users};

const ROUNDS: usize = 1000;

fn metadata_with_columns(n: usize) -> ResultMetadata {
    let names: Vec<String> = (0..n).map(|i| format!("c{i}")).collect();
    let cols: Vec<(&str, ColumnType)> = names
        .iter()
        .map(|name| (name.as_str(), ColumnType::Int))
        .collect();
    ResultMetadata::new(col_specs("users", &cols))
}

#[test]
#[ntest::timeout(20000)]
fn binding_races_with_metadata_replacement() {
    setup_tracing();
    let statement = users();
    let barrier = Arc::new(Barrier::new(3));

    let binders: Vec<_> = (0..2)
        .map(|_| {
            let statement = statement.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..ROUNDS {
                    let bound = statement.bind((Uuid::new_v4(), "alice")).unwrap();
                    assert!(bound.routing().is_routed());
                }
            })
        })
        .collect();

    let swapper = {
        let statement = statement.clone();
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            for i in 1..=ROUNDS {
                statement.set_result_metadata(
                    Some(Bytes::from(i.to_string())),
                    metadata_with_columns(i % 5 + 1),
                );
            }
        })
    };

    for binder in binders {
        binder.join().unwrap();
    }
    swapper.join().unwrap();

    let snapshot = statement.get_result_metadata();
    assert_eq!(snapshot.id(), Some(&Bytes::from(ROUNDS.to_string())));
    assert_eq!(snapshot.col_specs().len(), ROUNDS % 5 + 1);
}

#[test]
#[ntest::timeout(20000)]
fn readers_never_see_a_torn_pair() {
    setup_tracing();
    let statement = users();
    let barrier = Arc::new(Barrier::new(2));

    let reader = {
        let statement = statement.clone();
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            for _ in 0..ROUNDS {
                let snapshot = statement.get_result_metadata();
                if let Some(id) = snapshot.id() {
                    // Every id names the number of columns stored with it.
                    let expected: usize = std::str::from_utf8(id).unwrap().parse().unwrap();
                    assert_eq!(snapshot.col_specs().len(), expected);
                }
            }
        })
    };

    barrier.wait();
    for i in 0..ROUNDS {
        let n = i % 7 + 1;
        statement.set_result_metadata(Some(Bytes::from(n.to_string())), metadata_with_columns(n));
    }
    reader.join().unwrap();
}

#[test]
fn bound_statements_cross_threads() {
    setup_tracing();
    let bound = users().bind((Uuid::new_v4(), "alice")).unwrap();
    let shared = Arc::new(bound);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let shared = Arc::clone(&shared);
            thread::spawn(move || shared.routing_key().cloned())
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap().as_ref(), shared.routing_key());
    }
}
