//! Value sanitizer
//!
//! The only place application values are coerced into something the table
//! service accepts. Numbers and strings pass through; every other JSON value
//! (booleans, null, arrays, objects) is stored as its JSON text.

use serde_json::Value;

use crate::models::{AttributeValue, Attributes, Document};

/// Prepare a single value for storage
pub fn sanitize_field(value: &Value) -> AttributeValue {
    match value {
        Value::Number(n) => AttributeValue::Number(n.clone()),
        Value::String(s) => AttributeValue::String(s.clone()),
        other => AttributeValue::String(other.to_string()),
    }
}

/// Prepare every value of a record for storage
///
/// Keys are kept as-is. The input is left untouched.
pub fn sanitize_record(record: &Document) -> Attributes {
    record
        .iter()
        .map(|(field, value)| (field.clone(), sanitize_field(value)))
        .collect()
}
