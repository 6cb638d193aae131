//! Command Builder Tests
//!
//! Tests for request assembly: headers, argument sections and the
//! fields → operations transition.

use rmpv::Value;
use tntdriver::protocol::{
    decode_request, ArgSection, CommandBuilder, Param, RequestType, UpdateOp, KEY_INDEX,
    KEY_SPACE, KEY_SQL_TEXT,
};
use tntdriver::ErrorKind;

fn finish(builder: &mut CommandBuilder) -> (u64, u64, Value) {
    let packet = builder.finish().unwrap().to_vec();
    let (header, body) = decode_request(&packet).unwrap();
    (header.code, header.sync, body)
}

fn entries(pairs: Vec<(u8, Value)>) -> Value {
    Value::Map(pairs.into_iter().map(|(k, v)| (Value::from(k), v)).collect())
}

fn op(symbol: &str, field: i64, operand: Value) -> Value {
    Value::Array(vec![Value::from(symbol), Value::from(field), operand])
}

// =============================================================================
// Layout Tests
// =============================================================================

#[test]
fn test_insert_layout() {
    let mut builder = CommandBuilder::new();
    builder.begin(RequestType::Insert, 3).unwrap();
    builder.body(1, ArgSection::Tuple, None).unwrap();
    builder.uint_field(KEY_SPACE, 512).unwrap();
    builder.set_int(1).unwrap();
    builder.set_string(Some("alpha")).unwrap();
    builder.set_string(None).unwrap();
    builder.set_boolean(true).unwrap();
    builder.set_double(1.5).unwrap();
    builder.set_bytes(&[1, 2]).unwrap();

    let (code, sync, body) = finish(&mut builder);
    assert_eq!(code, 2);
    assert_eq!(sync, 3);
    assert_eq!(
        body,
        entries(vec![
            (0x10, Value::from(512)),
            (
                0x21,
                Value::Array(vec![
                    Value::from(1),
                    Value::from("alpha"),
                    Value::Nil,
                    Value::from(true),
                    Value::from(1.5),
                    Value::Binary(vec![1, 2]),
                ])
            ),
        ])
    );
}

#[test]
fn test_empty_key_is_written() {
    let mut builder = CommandBuilder::new();
    builder.begin(RequestType::Delete, 1).unwrap();
    builder.body(2, ArgSection::Key, None).unwrap();
    builder.uint_field(KEY_SPACE, 512).unwrap();
    builder.uint_field(KEY_INDEX, 0).unwrap();

    let (_, _, body) = finish(&mut builder);
    assert_eq!(
        body,
        entries(vec![
            (0x10, Value::from(512)),
            (0x11, Value::from(0)),
            (0x20, Value::Array(vec![])),
        ])
    );
}

#[test]
fn test_update_moves_operations_to_tuple() {
    let mut builder = CommandBuilder::new();
    builder.begin(RequestType::Update, 9).unwrap();
    builder.body(2, ArgSection::Key, Some(ArgSection::Tuple)).unwrap();
    builder.uint_field(KEY_SPACE, 512).unwrap();
    builder.uint_field(KEY_INDEX, 0).unwrap();
    builder.set_long(42).unwrap();
    builder
        .append_update_op(UpdateOp::Add, 2, &Param::Int(10))
        .unwrap();
    builder
        .append_update_op(UpdateOp::Assign, 3, &Param::from("x"))
        .unwrap();

    let (code, _, body) = finish(&mut builder);
    assert_eq!(code, 4);
    assert_eq!(
        body,
        entries(vec![
            (0x10, Value::from(512)),
            (0x11, Value::from(0)),
            (0x20, Value::Array(vec![Value::from(42)])),
            (
                0x21,
                Value::Array(vec![
                    op("+", 2, Value::from(10)),
                    op("=", 3, Value::from("x")),
                ])
            ),
        ])
    );
}

#[test]
fn test_update_without_operations_writes_empty_list() {
    let mut builder = CommandBuilder::new();
    builder.begin(RequestType::Update, 1).unwrap();
    builder.body(2, ArgSection::Key, Some(ArgSection::Tuple)).unwrap();
    builder.uint_field(KEY_SPACE, 512).unwrap();
    builder.uint_field(KEY_INDEX, 0).unwrap();
    builder.set_int(1).unwrap();

    let (_, _, body) = finish(&mut builder);
    let map = body.as_map().unwrap();
    assert_eq!(map.len(), 4);
    assert_eq!(map[3], (Value::from(0x21), Value::Array(vec![])));
}

#[test]
fn test_upsert_moves_operations_to_ops() {
    let mut builder = CommandBuilder::new();
    builder.begin(RequestType::Upsert, 1).unwrap();
    builder.body(1, ArgSection::Tuple, Some(ArgSection::Ops)).unwrap();
    builder.uint_field(KEY_SPACE, 512).unwrap();
    builder.set_int(1).unwrap();
    builder.set_int(100).unwrap();
    builder
        .append_update_op(UpdateOp::Subtract, 1, &Param::Int(5))
        .unwrap();

    let (code, _, body) = finish(&mut builder);
    assert_eq!(code, 9);
    assert_eq!(
        body,
        entries(vec![
            (0x10, Value::from(512)),
            (0x21, Value::Array(vec![Value::from(1), Value::from(100)])),
            (0x28, Value::Array(vec![op("-", 1, Value::from(5))])),
        ])
    );
}

#[test]
fn test_sql_binds_and_text() {
    let mut builder = CommandBuilder::new();
    builder.begin(RequestType::Execute, 1).unwrap();
    builder.body(1, ArgSection::SqlBind, None).unwrap();
    builder.str_field(KEY_SQL_TEXT, "SELECT ? + 1").unwrap();
    builder.set_param(&Param::Int(1)).unwrap();

    let (code, _, body) = finish(&mut builder);
    assert_eq!(code, 11);
    assert_eq!(
        body,
        entries(vec![
            (0x40, Value::from("SELECT ? + 1")),
            (0x41, Value::Array(vec![Value::from(1)])),
        ])
    );
}

#[test]
fn test_empty_body() {
    let mut builder = CommandBuilder::new();
    builder.begin(RequestType::Ping, 12).unwrap();
    builder.empty_body().unwrap();

    let (code, sync, body) = finish(&mut builder);
    assert_eq!(code, 64);
    assert_eq!(sync, 12);
    assert_eq!(body, Value::Map(vec![]));
}

// =============================================================================
// Sequencing Tests
// =============================================================================

#[test]
fn test_fields_rejected_after_operations() {
    let mut builder = CommandBuilder::new();
    builder.begin(RequestType::Update, 1).unwrap();
    builder.body(2, ArgSection::Key, Some(ArgSection::Tuple)).unwrap();
    builder.set_int(1).unwrap();
    builder
        .append_update_op(UpdateOp::Assign, 1, &Param::Null)
        .unwrap();

    let err = builder.set_int(2).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Usage);
}

#[test]
fn test_operations_rejected_without_ops_section() {
    let mut builder = CommandBuilder::new();
    builder.begin(RequestType::Insert, 1).unwrap();
    builder.body(1, ArgSection::Tuple, None).unwrap();

    let err = builder
        .append_update_op(UpdateOp::Assign, 1, &Param::Int(1))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Usage);
}

#[test]
fn test_numeric_operators_need_numbers() {
    let mut builder = CommandBuilder::new();
    builder.begin(RequestType::Update, 1).unwrap();
    builder.body(2, ArgSection::Key, Some(ArgSection::Tuple)).unwrap();

    for op in [UpdateOp::Add, UpdateOp::BitOr, UpdateOp::Delete] {
        let err = builder
            .append_update_op(op, 1, &Param::from("text"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Usage);
    }
    builder
        .append_update_op(UpdateOp::Insert, 1, &Param::from("text"))
        .unwrap();
    builder
        .append_update_op(UpdateOp::BitAnd, 1, &Param::Int(0xff))
        .unwrap();
}

#[test]
fn test_begin_twice_fails() {
    let mut builder = CommandBuilder::new();
    builder.begin(RequestType::Select, 1).unwrap();
    let err = builder.begin(RequestType::Select, 2).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Usage);
    assert_eq!(builder.code(), Some(RequestType::Select));
}

#[test]
fn test_idle_builder_rejects_everything() {
    let mut builder = CommandBuilder::new();
    assert!(builder.finish().is_err());
    assert!(builder.set_int(1).is_err());
    assert!(builder.uint_field(KEY_SPACE, 1).is_err());
    assert!(builder.body(0, ArgSection::Key, None).is_err());
}

#[test]
fn test_arguments_rejected_for_empty_body() {
    let mut builder = CommandBuilder::new();
    builder.begin(RequestType::Ping, 1).unwrap();
    builder.empty_body().unwrap();
    assert!(builder.set_int(1).is_err());
}

#[test]
fn test_abandon_discards_command() {
    let mut builder = CommandBuilder::new();
    builder.begin(RequestType::Insert, 1).unwrap();
    builder.abandon();

    assert!(!builder.is_open());
    builder.begin(RequestType::Ping, 2).unwrap();
    builder.empty_body().unwrap();
    let (code, sync, _) = finish(&mut builder);
    assert_eq!((code, sync), (64, 2));
}
