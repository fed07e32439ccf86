use criterion::{criterion_group, criterion_main, Criterion};

use bytes::Bytes;
use cqlbind::frame::response::result::{
    ColumnSpec, ColumnType, Prepared, PreparedMetadata, ResultMetadata, TableSpec,
};
use cqlbind::routing::partitioner::{calculate_token_for_partition_key, PartitionerName};
use cqlbind::serialize::row::SerializedValues;
use cqlbind::{BindValue, PreparedStatement};
use uuid::Uuid;

fn statement(cols: &[(&str, ColumnType)], pk_positions: &[u16]) -> PreparedStatement {
    let table_spec = TableSpec::new("ks", "t");
    let col_specs: Vec<_> = cols
        .iter()
        .map(|(name, typ)| ColumnSpec::new(*name, typ.clone(), table_spec.clone()))
        .collect();
    let prepared = Prepared {
        id: Bytes::from_static(b"bench"),
        result_metadata_id: None,
        prepared_metadata: PreparedMetadata::new(col_specs, pk_positions).unwrap(),
        result_metadata: ResultMetadata::mock_empty(),
    };
    PreparedStatement::builder(prepared, "INSERT INTO ks.t (...) VALUES (...)")
        .build()
        .unwrap()
}

fn bind_benchmark(c: &mut Criterion) {
    let simple = statement(
        &[("id", ColumnType::Uuid), ("name", ColumnType::Text)],
        &[0],
    );
    let id = Uuid::new_v4();
    c.bench_function("bind simple pk", |b| {
        b.iter(|| simple.bind((id, "I'm prepared!!!")).unwrap())
    });

    let complex = statement(
        &[
            ("a", ColumnType::Int),
            ("b", ColumnType::Int),
            ("c", ColumnType::Text),
            ("tags", ColumnType::List(Box::new(ColumnType::Text))),
        ],
        &[2, 0, 1],
    );
    let tags: Vec<BindValue> = vec![BindValue::from(cqlbind::value::CqlValue::List(
        (0..16).map(|i| format!("tag{i}").into()).collect(),
    ))];
    c.bench_function("bind complex pk with collection", |b| {
        b.iter(|| {
            let mut values = vec![
                BindValue::from(17_i32),
                BindValue::from(16_i32),
                BindValue::from("I'm prepared!!!"),
            ];
            values.extend(tags.iter().cloned());
            complex.bind(values).unwrap()
        })
    });
}

fn calculate_token_bench(c: &mut Criterion) {
    let (serialized_simple_pk, ()) = SerializedValues::from_closure(|writer| {
        writer.make_cell_writer().set_value(b"I'm prepared!!!")?;
        Ok(())
    })
    .unwrap();

    let long_column = ".".repeat(2000);
    let (serialized_complex_pk_long_column, ()) = SerializedValues::from_closure(|writer| {
        writer.make_cell_writer().set_value(&17_i32.to_be_bytes())?;
        writer.make_cell_writer().set_value(&16_i32.to_be_bytes())?;
        writer.make_cell_writer().set_value(long_column.as_bytes())?;
        Ok(())
    })
    .unwrap();

    c.bench_function("calculate_token_from_partition_key simple pk", |b| {
        b.iter(|| {
            calculate_token_for_partition_key(&serialized_simple_pk, &PartitionerName::Murmur3)
        })
    });

    c.bench_function(
        "calculate_token_from_partition_key complex pk long column",
        |b| {
            b.iter(|| {
                calculate_token_for_partition_key(
                    &serialized_complex_pk_long_column,
                    &PartitionerName::Murmur3,
                )
            })
        },
    );

    let prepared = statement(
        &[
            ("a", ColumnType::Int),
            ("b", ColumnType::Int),
            ("c", ColumnType::Text),
        ],
        &[0, 1, 2],
    );
    c.bench_function("prepared statement calculate_token", |b| {
        b.iter(|| prepared.calculate_token((17_i32, 16_i32, "I'm prepared!!!")))
    });
}

criterion_group!(benches, bind_benchmark, calculate_token_bench);
criterion_main!(benches);
