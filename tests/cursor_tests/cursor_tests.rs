//! Result Cursor Tests
//!
//! Tests for row navigation, typed access and null semantics.

#[path = "../common/mod.rs"]
mod common;

use rmpv::Value;
use serde::Deserialize;
use tntdriver::{DriverError, ErrorKind, ResultCursor};

use common::*;

fn mixed_row() -> Value {
    row(vec![
        Value::from(42),
        Value::Nil,
        Value::from("hello"),
        Value::from(2.5),
        Value::from(true),
        Value::Binary(vec![0xde, 0xad]),
        Value::from(-7),
        Value::from(u64::MAX),
    ])
}

// =============================================================================
// Navigation Tests
// =============================================================================

#[test]
fn test_next_walks_all_rows() {
    let mut cursor = cursor(data_body(vec![
        row(vec![Value::from(1)]),
        row(vec![Value::from(2)]),
    ]));

    assert_eq!(cursor.size(), 2);
    assert!(cursor.has_next());
    assert!(cursor.next().unwrap());
    assert_eq!(cursor.get_int(0).unwrap(), 1);
    assert!(cursor.next().unwrap());
    assert_eq!(cursor.get_int(0).unwrap(), 2);
    assert!(!cursor.has_next());
    assert!(cursor.is_consumed());
    assert!(!cursor.next().unwrap());
    assert!(!cursor.next().unwrap());
}

#[test]
fn test_fields_need_next_first() {
    let mut cursor = cursor(data_body(vec![mixed_row()]));

    let err = cursor.get_int(0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Usage);

    assert!(cursor.next().unwrap());
    assert!(!cursor.next().unwrap());
    // Past the end there is no current row either.
    assert!(cursor.value(0).is_err());
}

#[test]
fn test_consume_skips_rest() {
    let mut cursor = cursor(data_body(vec![
        row(vec![Value::from(1)]),
        row(vec![Value::from(2)]),
        row(vec![Value::from(3)]),
    ]));

    assert!(cursor.next().unwrap());
    cursor.consume();
    assert!(cursor.is_consumed());
    assert!(!cursor.next().unwrap());
    assert_eq!(cursor.size(), 3);
}

#[test]
fn test_empty_cursor() {
    let mut cursor = ResultCursor::empty().with_affected_rows(5);

    assert_eq!(cursor.size(), 0);
    assert!(cursor.is_consumed());
    assert!(!cursor.next().unwrap());
    assert_eq!(cursor.affected_rows(), Some(5));
}

#[test]
fn test_scalar_rows_are_single_field() {
    let mut cursor = cursor(data_body(vec![Value::from("x"), Value::from(5)]));

    assert!(cursor.next().unwrap());
    assert_eq!(cursor.field_count().unwrap(), 1);
    assert_eq!(cursor.get_string(0).unwrap(), Some("x"));
    assert!(cursor.next().unwrap());
    assert_eq!(cursor.get_long(0).unwrap(), 5);
}

// =============================================================================
// Typed Access Tests
// =============================================================================

#[test]
fn test_typed_accessors() {
    let mut cursor = cursor(data_body(vec![mixed_row()]));
    assert!(cursor.next().unwrap());

    assert_eq!(cursor.field_count().unwrap(), 8);
    assert_eq!(cursor.get_long(0).unwrap(), 42);
    assert_eq!(cursor.get_int(0).unwrap(), 42);
    assert_eq!(cursor.get_double(0).unwrap(), 42.0);
    assert_eq!(cursor.get_string(2).unwrap(), Some("hello"));
    assert_eq!(cursor.get_bytes(2).unwrap(), Some(&b"hello"[..]));
    assert_eq!(cursor.get_double(3).unwrap(), 2.5);
    assert_eq!(cursor.get_float(3).unwrap(), 2.5);
    assert!(cursor.get_boolean(4).unwrap());
    assert_eq!(cursor.get_bytes(5).unwrap(), Some(&[0xde, 0xad][..]));
    assert_eq!(cursor.get_long(6).unwrap(), -7);
    assert_eq!(cursor.value(7).unwrap(), &Value::from(u64::MAX));
}

#[test]
fn test_null_semantics() {
    let mut cursor = cursor(data_body(vec![mixed_row()]));
    assert!(cursor.next().unwrap());

    assert!(cursor.is_null(1).unwrap());
    assert!(!cursor.is_null(0).unwrap());
    assert_eq!(cursor.get_int(1).unwrap(), 0);
    assert_eq!(cursor.get_long(1).unwrap(), 0);
    assert_eq!(cursor.get_float(1).unwrap(), 0.0);
    assert_eq!(cursor.get_double(1).unwrap(), 0.0);
    assert!(!cursor.get_boolean(1).unwrap());
    assert_eq!(cursor.get_string(1).unwrap(), None);
    assert_eq!(cursor.get_bytes(1).unwrap(), None);
}

#[test]
fn test_type_mismatches() {
    let mut cursor = cursor(data_body(vec![mixed_row()]));
    assert!(cursor.next().unwrap());

    assert!(matches!(
        cursor.get_long(2),
        Err(DriverError::TypeMismatch { position: 2, .. })
    ));
    assert!(cursor.get_boolean(0).is_err());
    assert!(cursor.get_string(0).is_err());
    // u64::MAX does not fit an i64
    assert!(cursor.get_long(7).is_err());
    assert!(cursor.get_int(7).is_err());
}

#[test]
fn test_int_overflow() {
    let mut cursor = cursor(data_body(vec![row(vec![Value::from(i64::from(i32::MAX) + 1)])]));
    assert!(cursor.next().unwrap());

    assert_eq!(cursor.get_long(0).unwrap(), i64::from(i32::MAX) + 1);
    let err = cursor.get_int(0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Usage);
}

#[test]
fn test_out_of_range_field() {
    let mut cursor = cursor(data_body(vec![row(vec![Value::from(1)])]));
    assert!(cursor.next().unwrap());

    let err = cursor.value(3).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Usage);
}

// =============================================================================
// Column Tests
// =============================================================================

#[test]
fn test_get_index_needs_sql_result() {
    let cursor = cursor(data_body(vec![]));
    let err = cursor.get_index("ID").unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Usage);
    assert!(cursor.columns().is_none());
}

#[test]
fn test_get_index_with_columns() {
    let cursor = cursor(data_body(vec![])).with_columns(vec![
        "ID".to_string(),
        "NAME".to_string(),
        "ID".to_string(),
    ]);

    assert_eq!(cursor.get_index("ID").unwrap(), 0);
    assert_eq!(cursor.get_index("NAME").unwrap(), 1);
    assert!(cursor.get_index("MISSING").is_err());
}

// =============================================================================
// Serde Tests
// =============================================================================

#[derive(Debug, Deserialize, PartialEq)]
struct User {
    id: u64,
    name: String,
    email: Option<String>,
}

#[test]
fn test_row_as_struct() {
    let mut cursor = cursor(data_body(vec![
        row(vec![Value::from(1), Value::from("ann"), Value::Nil]),
        row(vec![Value::from(2), Value::from("bob"), Value::from("b@x.io")]),
    ]));

    let mut users = Vec::new();
    while cursor.next().unwrap() {
        users.push(cursor.row_as::<User>().unwrap());
    }

    assert_eq!(
        users,
        vec![
            User {
                id: 1,
                name: "ann".to_string(),
                email: None
            },
            User {
                id: 2,
                name: "bob".to_string(),
                email: Some("b@x.io".to_string())
            },
        ]
    );
}

#[test]
fn test_row_as_tuple_and_mismatch() {
    let mut cursor = cursor(data_body(vec![row(vec![Value::from(7), Value::from("x")])]));
    assert!(cursor.next().unwrap());

    let (id, name): (i32, String) = cursor.row_as().unwrap();
    assert_eq!((id, name.as_str()), (7, "x"));

    let err = cursor.row_as::<(String, String)>().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Usage);
}
