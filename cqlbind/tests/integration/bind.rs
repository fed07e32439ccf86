use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use assert_matches::assert_matches;
use cqlbind::codec::{Codec, CodecContext, CodecRegistry, DeserializationError, TextCodec};
use cqlbind::errors::{ArityError, BindError, EncodingErrorKind, ProtocolViolation};
use cqlbind::frame::response::result::ColumnType;
use cqlbind::frame::types::RawValue;
use cqlbind::serialize::{CellWriter, SerializationError, WrittenCellProof};
use cqlbind::value::{
    CqlDate, CqlDuration, CqlTimestamp, CqlTimeuuid, CqlValue, MaybeUnset, Unset,
};
use cqlbind::{BindValue, ProtocolVersion};
use uuid::Uuid;

use crate::utils::{decode_values, prepare, setup_tracing, users};

#[test]
fn bound_values_decode_back_to_what_was_bound() {
    setup_tracing();
    let statement = prepare(
        b"all",
        "all_types",
        &[
            ("k", ColumnType::BigInt),
            ("flag", ColumnType::Boolean),
            ("small", ColumnType::SmallInt),
            ("ratio", ColumnType::Double),
            ("addr", ColumnType::Inet),
            ("day", ColumnType::Date),
            ("at", ColumnType::Timestamp),
            ("took", ColumnType::Duration),
            ("tags", ColumnType::Set(Box::new(ColumnType::Text))),
            ("name", ColumnType::Ascii),
            ("event", ColumnType::Timeuuid),
            ("ids", ColumnType::Set(Box::new(ColumnType::Int))),
            (
                "scores",
                ColumnType::Map(Box::new(ColumnType::Text), Box::new(ColumnType::Int)),
            ),
        ],
        &[0],
    )
    .build()
    .unwrap();

    let values: Vec<BindValue> = vec![
        42_i64.into(),
        true.into(),
        7_i16.into(),
        0.5_f64.into(),
        IpAddr::V4(Ipv4Addr::LOCALHOST).into(),
        CqlDate(1 << 31).into(),
        CqlTimestamp(1_700_000_000_000).into(),
        CqlDuration {
            months: 1,
            days: 2,
            nanoseconds: 3,
        }
        .into(),
        CqlValue::Set(vec!["a".into(), "b".into()]).into(),
        CqlValue::Ascii("alice".to_owned()).into(),
        CqlTimeuuid::from(Uuid::parse_str("8e14e760-7fa8-11eb-bc66-000000000001").unwrap()).into(),
        CqlValue::Set(vec![1_i32.into()]).into(),
        CqlValue::Map(vec![("x".into(), 1_i32.into())]).into(),
    ];
    let expected: Vec<Option<CqlValue>> = values
        .iter()
        .map(|value| value.as_cql_value().cloned())
        .collect();

    let bound = statement.bind(values).unwrap();
    assert_eq!(decode_values(&bound), expected);
}

#[test]
fn values_of_a_neighbouring_kind_find_no_codec() {
    setup_tracing();
    let statement = prepare(
        b"strict",
        "strict",
        &[
            ("name", ColumnType::Ascii),
            ("event", ColumnType::Timeuuid),
            ("ids", ColumnType::Set(Box::new(ColumnType::Int))),
        ],
        &[0],
    )
    .build()
    .unwrap();
    let name = CqlValue::Ascii("alice".to_owned());
    let event = CqlTimeuuid::from(Uuid::new_v4());
    let ids = CqlValue::Set(vec![1_i32.into()]);

    let cases: [(usize, Vec<BindValue>); 3] = [
        (
            0,
            vec!["alice".into(), event.into(), ids.clone().into()],
        ),
        (
            1,
            vec![name.clone().into(), Uuid::new_v4().into(), ids.into()],
        ),
        (
            2,
            vec![
                name.into(),
                event.into(),
                CqlValue::List(vec![1_i32.into()]).into(),
            ],
        ),
    ];
    for (index, values) in cases {
        assert_matches!(
            statement.bind(values),
            Err(BindError::Encoding(e)) if e.index == index
                && matches!(e.kind, EncodingErrorKind::CodecNotFound(_))
        );
    }
}

#[test]
fn element_without_codec_is_reported_as_codec_not_found() {
    setup_tracing();
    let statement = prepare(
        b"nested",
        "nested",
        &[
            ("k", ColumnType::Int),
            ("items", ColumnType::List(Box::new(ColumnType::Int))),
        ],
        &[0],
    )
    .build()
    .unwrap();

    assert_matches!(
        statement.bind((1_i32, CqlValue::List(vec!["x".into()]))),
        Err(BindError::Encoding(e)) if e.index == 1
            && e.column == "items"
            && matches!(e.kind, EncodingErrorKind::CodecNotFound(_))
    );
}

#[test]
fn user_id_routes_by_its_sixteen_bytes() {
    setup_tracing();
    let u = Uuid::new_v4();
    let bound = users().bind((u, "alice")).unwrap();

    assert_eq!(bound.routing_key().map(|k| &k[..]), Some(&u.as_bytes()[..]));
    assert_eq!(
        decode_values(&bound),
        vec![
            Some(CqlValue::Uuid(u)),
            Some(CqlValue::Text("alice".to_owned()))
        ]
    );
}

#[test]
fn three_values_for_two_markers_bind_nothing() {
    setup_tracing();
    let result = users().bind((Uuid::new_v4(), "alice", "extra"));
    assert_matches!(
        result,
        Err(BindError::Arity(ArityError {
            expected: 2,
            provided: 3
        }))
    );
}

#[test]
fn nulls_and_unsets_are_written_as_markers() {
    setup_tracing();
    let bound = users()
        .bind((Some(Uuid::new_v4()), MaybeUnset::<&str>::Unset))
        .unwrap();
    assert_eq!(bound.value(1), Some(RawValue::Unset));

    let bound = users().bind((Uuid::new_v4(), None::<String>)).unwrap();
    assert_eq!(bound.value(1), Some(RawValue::Null));
}

#[test]
fn protocol_version_gates_encodings() {
    setup_tracing();
    let cols = [
        ("k", ColumnType::Int),
        ("small", ColumnType::SmallInt),
        ("items", ColumnType::List(Box::new(ColumnType::Int))),
    ];

    let v3 = prepare(b"v3", "gated", &cols, &[0])
        .protocol_version(ProtocolVersion::V3)
        .build()
        .unwrap();
    assert_matches!(
        v3.bind((1_i32, 2_i16, CqlValue::List(vec![]))),
        Err(BindError::Encoding(e)) if e.column == "small"
            && matches!(e.kind, EncodingErrorKind::CodecNotFound(_))
    );
    assert_matches!(
        v3.bind((1_i32, Unset, CqlValue::List(vec![]))),
        Err(BindError::ProtocolViolation(ProtocolViolation::UnsetNotSupported { index: 1, .. }))
    );
    v3.bind((1_i32, None::<i16>, CqlValue::List(vec![3_i32.into()])))
        .unwrap();

    let v2 = prepare(b"v2", "gated", &cols[..1], &[0])
        .protocol_version(ProtocolVersion::V2)
        .build()
        .unwrap();
    v2.bind((1_i32,)).unwrap();
}

#[test]
fn v2_collections_are_framed_with_shorts() {
    setup_tracing();
    let cols = [
        ("k", ColumnType::Int),
        ("items", ColumnType::List(Box::new(ColumnType::Int))),
    ];
    let list = CqlValue::List(vec![1_i32.into(), 2_i32.into()]);

    let v2 = prepare(b"v2l", "lists", &cols, &[0])
        .protocol_version(ProtocolVersion::V2)
        .build()
        .unwrap();
    let bound = v2.bind((1_i32, list.clone())).unwrap();
    assert_eq!(
        bound.value(1),
        Some(RawValue::Value(&[0, 2, 0, 4, 0, 0, 0, 1, 0, 4, 0, 0, 0, 2]))
    );
    assert_eq!(decode_values(&bound)[1], Some(list.clone()));

    let v4 = prepare(b"v4l", "lists", &cols, &[0]).build().unwrap();
    let bound = v4.bind((1_i32, list.clone())).unwrap();
    assert_eq!(
        bound.value(1),
        Some(RawValue::Value(&[
            0, 0, 0, 2, 0, 0, 0, 4, 0, 0, 0, 1, 0, 0, 0, 4, 0, 0, 0, 2
        ]))
    );
    assert_eq!(decode_values(&bound)[1], Some(list));
}

#[derive(Debug)]
struct ShoutingCodec;

const SHOUTING_TYPE: &str = "org.example.Shouting";

impl Codec for ShoutingCodec {
    fn name(&self) -> &'static str {
        "shouting"
    }

    fn accepts_type(&self, typ: &ColumnType) -> bool {
        matches!(typ, ColumnType::Custom(name) if name == SHOUTING_TYPE)
    }

    fn accepts(&self, value: &CqlValue, typ: &ColumnType) -> bool {
        matches!(value, CqlValue::Text(_)) && self.accepts_type(typ)
    }

    fn encode<'b>(
        &self,
        value: &CqlValue,
        _typ: &ColumnType,
        _ctx: &CodecContext<'_>,
        writer: CellWriter<'b>,
    ) -> Result<WrittenCellProof<'b>, SerializationError> {
        let text = value.as_text().map(String::as_str).unwrap_or_default();
        Ok(writer.set_value(text.to_uppercase().as_bytes())?)
    }

    fn decode(
        &self,
        _typ: &ColumnType,
        bytes: &[u8],
        _ctx: &CodecContext<'_>,
    ) -> Result<CqlValue, DeserializationError> {
        let s = std::str::from_utf8(bytes).map_err(DeserializationError::new)?;
        Ok(CqlValue::Text(s.to_lowercase()))
    }
}

#[test]
fn registered_codec_handles_custom_types() {
    setup_tracing();
    let cols = [
        ("k", ColumnType::Int),
        ("greeting", ColumnType::Custom(SHOUTING_TYPE.to_owned())),
    ];

    let plain = prepare(b"plain", "custom", &cols, &[0]).build().unwrap();
    assert_matches!(
        plain.bind((1_i32, "hello")),
        Err(BindError::Encoding(e)) if e.index == 1
            && matches!(e.kind, EncodingErrorKind::CodecNotFound(_))
    );

    let mut registry = CodecRegistry::new();
    registry.register(ShoutingCodec);
    let statement = prepare(b"custom", "custom", &cols, &[0])
        .codec_registry(Arc::new(registry))
        .build()
        .unwrap();
    let bound = statement.bind((1_i32, "hello")).unwrap();
    assert_eq!(bound.value(1), Some(RawValue::Value(b"HELLO")));
    assert_eq!(
        decode_values(&bound)[1],
        Some(CqlValue::Text("hello".to_owned()))
    );
}

#[test]
fn explicit_codec_must_fit_the_column() {
    setup_tracing();
    let cols = [
        ("k", ColumnType::Int),
        ("greeting", ColumnType::Custom(SHOUTING_TYPE.to_owned())),
    ];
    let statement = prepare(b"explicit", "custom", &cols, &[0]).build().unwrap();

    let bound = statement
        .bind(vec![
            BindValue::from(1_i32),
            BindValue::with_codec("hi", Arc::new(ShoutingCodec)),
        ])
        .unwrap();
    assert_eq!(bound.value(1), Some(RawValue::Value(b"HI")));

    assert_matches!(
        statement.bind(vec![
            BindValue::from(1_i32),
            BindValue::with_codec("hi", Arc::new(TextCodec)),
        ]),
        Err(BindError::Encoding(e)) if matches!(
            e.kind,
            EncodingErrorKind::IncompatibleCodec { codec: "text", .. }
        )
    );
}

#[test]
fn overlapping_codecs_make_binding_ambiguous() {
    setup_tracing();
    let mut registry = CodecRegistry::new();
    registry.register(TextCodec);
    let statement = prepare(
        b"ambiguous",
        "users",
        &[("id", ColumnType::Uuid), ("name", ColumnType::Text)],
        &[0],
    )
    .codec_registry(Arc::new(registry))
    .build()
    .unwrap();

    assert_matches!(
        statement.bind((Uuid::new_v4(), "alice")),
        Err(BindError::Encoding(e)) if e.column == "name"
            && matches!(e.kind, EncodingErrorKind::AmbiguousCodec(_))
    );
}
