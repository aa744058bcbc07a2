//! Type conversion utilities for SQLite.

use rusqlite::types::{Value, ValueRef};
use serde_json::Value as JsonValue;

use keel_migrate::{Row, SqlValue};

/// Convert a statement parameter to a SQLite value.
pub fn to_sqlite_value(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(i) => Value::Integer(*i),
        SqlValue::Real(f) => Value::Real(*f),
        SqlValue::Text(s) => Value::Text(s.clone()),
        SqlValue::Blob(b) => Value::Blob(b.clone()),
    }
}

/// Convert a parameter list to SQLite values.
pub fn to_sqlite_params(params: &[SqlValue]) -> Vec<Value> {
    params.iter().map(to_sqlite_value).collect()
}

/// Convert a SQLite ValueRef to a JSON Value.
pub fn from_sqlite_value(value: ValueRef<'_>) -> JsonValue {
    match value {
        ValueRef::Null => JsonValue::Null,
        ValueRef::Integer(i) => JsonValue::Number(i.into()),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        ValueRef::Text(bytes) => JsonValue::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => match std::str::from_utf8(bytes) {
            Ok(s) => JsonValue::String(s.to_string()),
            // Binary data, encode as base64
            Err(_) => JsonValue::String(base64_encode(bytes)),
        },
    }
}

/// Read a whole row into a column-keyed map.
pub fn row_to_map(row: &rusqlite::Row<'_>, columns: &[String]) -> Row {
    let mut map = Row::new();
    for (i, col) in columns.iter().enumerate() {
        let value = row
            .get_ref(i)
            .map(from_sqlite_value)
            .unwrap_or(JsonValue::Null);
        map.insert(col.clone(), value);
    }
    map
}

/// Simple base64 encoding for binary data.
fn base64_encode(data: &[u8]) -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

    let mut result = String::with_capacity(data.len().div_ceil(3) * 4);

    for chunk in data.chunks(3) {
        let b0 = chunk[0];
        let b1 = chunk.get(1).copied().unwrap_or(0);
        let b2 = chunk.get(2).copied().unwrap_or(0);

        result.push(ALPHABET[(b0 >> 2) as usize] as char);
        result.push(ALPHABET[(((b0 & 0x03) << 4) | (b1 >> 4)) as usize] as char);

        if chunk.len() > 1 {
            result.push(ALPHABET[(((b1 & 0x0f) << 2) | (b2 >> 6)) as usize] as char);
        } else {
            result.push('=');
        }

        if chunk.len() > 2 {
            result.push(ALPHABET[(b2 & 0x3f) as usize] as char);
        } else {
            result.push('=');
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_sqlite_value() {
        assert!(matches!(to_sqlite_value(&SqlValue::Null), Value::Null));
        assert!(matches!(to_sqlite_value(&SqlValue::Integer(42)), Value::Integer(42)));
        assert!(matches!(
            to_sqlite_value(&SqlValue::Text("hello".into())),
            Value::Text(ref s) if s == "hello"
        ));
        assert!(matches!(
            to_sqlite_value(&SqlValue::Blob(vec![1, 2])),
            Value::Blob(ref b) if b == &[1, 2]
        ));
    }

    #[test]
    fn test_to_sqlite_value_real() {
        match to_sqlite_value(&SqlValue::Real(2.5)) {
            Value::Real(f) => assert!((f - 2.5).abs() < f64::EPSILON),
            _ => panic!("Expected Real"),
        }
    }

    #[test]
    fn test_from_sqlite_value_scalars() {
        assert_eq!(from_sqlite_value(ValueRef::Null), JsonValue::Null);
        assert_eq!(
            from_sqlite_value(ValueRef::Integer(42)),
            JsonValue::Number(42.into())
        );
        assert_eq!(
            from_sqlite_value(ValueRef::Text(b"hello")),
            JsonValue::String("hello".to_string())
        );
    }

    #[test]
    fn test_from_sqlite_value_keeps_json_text_as_string() {
        let result = from_sqlite_value(ValueRef::Text(b"{\"key\": \"value\"}"));
        assert_eq!(result, JsonValue::String("{\"key\": \"value\"}".to_string()));
    }

    #[test]
    fn test_from_sqlite_value_binary_blob() {
        let result = from_sqlite_value(ValueRef::Blob(&[0xff, 0xfe]));
        assert_eq!(result, JsonValue::String("//4=".to_string()));
    }

    #[test]
    fn test_base64_encode() {
        assert_eq!(base64_encode(b"Hello"), "SGVsbG8=");
        assert_eq!(base64_encode(b"Hi!"), "SGkh");
        assert_eq!(base64_encode(b"H"), "SA==");
        assert_eq!(base64_encode(b""), "");
    }
}
