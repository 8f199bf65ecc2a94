//! Tests for value and result types

use super::*;
use pretty_assertions::assert_eq;

#[test]
fn test_value_display() {
    assert_eq!(Value::Null.to_string(), "NULL");
    assert_eq!(Value::Bytes(vec![0, 1, 2]).to_string(), "<3 bytes>");
    assert_eq!(Value::Decimal("1.50".into()).to_string(), "1.50");
}

#[test]
fn test_column_label_falls_back_to_name() {
    let plain = ColumnMeta::new("cust_name", SqlType::VarChar, 0);
    assert_eq!(plain.display_label(), "cust_name");

    let aliased = ColumnMeta::new("cust_name", SqlType::VarChar, 0).with_label("NAME");
    assert_eq!(aliased.display_label(), "NAME");
}

#[test]
fn test_query_result_builds_rows_with_labels() {
    let result = QueryResult::new(
        vec![
            ColumnMeta::new("id", SqlType::Integer, 0),
            ColumnMeta::new("name", SqlType::VarChar, 1).with_label("NAME"),
        ],
        vec![
            vec![Value::Int32(1), Value::String("Will".into())],
            vec![Value::Int32(2), Value::String("Tom".into())],
        ],
    );

    assert_eq!(result.column_count(), 2);
    assert_eq!(result.row_count(), 2);
    assert_eq!(
        result.rows[1].get(1),
        Some(&Value::String("Tom".into()))
    );
    assert_eq!(
        result.rows[1].columns(),
        &["id".to_string(), "NAME".to_string()]
    );
    assert!(QueryResult::empty().rows.is_empty());
}
