//! Command handlers

pub mod collection;
pub mod config;
pub mod data;
pub mod record;

use anyhow::{bail, Context, Result};
use serde_json::Value;

use attrstore_core::Document;

/// Parse a JSON object given on the command line
pub fn parse_document(raw: &str) -> Result<Document> {
    let value: Value =
        serde_json::from_str(raw).with_context(|| format!("Invalid JSON: {}", raw))?;
    match value {
        Value::Object(map) => Ok(map),
        other => bail!("Expected a JSON object, got: {}", other),
    }
}

/// Command-line value, taken as a string unless `typed`
///
/// Typed values are parsed as JSON, so `20` is a number and `true` a boolean.
pub fn parse_value(raw: &str, typed: bool) -> Result<Value> {
    if !typed {
        return Ok(Value::String(raw.to_string()));
    }
    serde_json::from_str(raw).with_context(|| format!("Invalid JSON value: {}", raw))
}
