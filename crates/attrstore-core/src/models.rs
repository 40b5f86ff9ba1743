//! Data models for attrstore
//!
//! Defines the typed attribute values the table service stores, the
//! attribute maps that make up an item, and the plain `Record` handed back
//! to application code.
//!
//! Attribute values serialize to the service's typed wire form:
//! `{"S": "apple"}`, `{"N": 20}`, `{"SS": ["a", "b"]}`, `{"NS": [1, 2]}`.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Number, Value};

/// Application-side input record: field name to arbitrary JSON value
pub type Document = serde_json::Map<String, Value>;

/// Attributes of a stored item
pub type Attributes = BTreeMap<String, AttributeValue>;

/// A value the table service can store
///
/// There is no boolean, timestamp or nested type; anything else is turned
/// into a string by the sanitizer before it reaches the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AttributeValue {
    #[serde(rename = "S")]
    String(String),
    #[serde(rename = "N")]
    Number(Number),
    #[serde(rename = "SS")]
    StringSet(BTreeSet<String>),
    /// Kept deduplicated by numeric value
    #[serde(rename = "NS")]
    NumberSet(Vec<Number>),
}

impl AttributeValue {
    /// Short type tag used in error messages (`S`, `N`, `SS`, `NS`)
    pub fn type_tag(&self) -> &'static str {
        match self {
            AttributeValue::String(_) => "S",
            AttributeValue::Number(_) => "N",
            AttributeValue::StringSet(_) => "SS",
            AttributeValue::NumberSet(_) => "NS",
        }
    }

    /// Whether this is a string or number set
    pub fn is_set(&self) -> bool {
        matches!(
            self,
            AttributeValue::StringSet(_) | AttributeValue::NumberSet(_)
        )
    }

    /// Build a one-element set from a scalar
    ///
    /// Returns `None` for values that are already sets.
    pub fn singleton_set(&self) -> Option<AttributeValue> {
        match self {
            AttributeValue::String(s) => {
                Some(AttributeValue::StringSet(BTreeSet::from([s.clone()])))
            }
            AttributeValue::Number(n) => Some(AttributeValue::NumberSet(vec![n.clone()])),
            _ => None,
        }
    }

    /// Whether this set holds the given scalar
    ///
    /// Always false for scalars and for scalars of the other type.
    pub fn set_contains(&self, element: &AttributeValue) -> bool {
        match (self, element) {
            (AttributeValue::StringSet(set), AttributeValue::String(s)) => set.contains(s),
            (AttributeValue::NumberSet(set), AttributeValue::Number(n)) => {
                set.iter().any(|member| numbers_equal(member, n))
            }
            _ => false,
        }
    }

    /// Number of elements in a set, `None` for scalars
    pub fn set_len(&self) -> Option<usize> {
        match self {
            AttributeValue::StringSet(set) => Some(set.len()),
            AttributeValue::NumberSet(set) => Some(set.len()),
            _ => None,
        }
    }

    /// Plain JSON rendering (strings, numbers, arrays)
    pub fn to_json(&self) -> Value {
        match self {
            AttributeValue::String(s) => Value::String(s.clone()),
            AttributeValue::Number(n) => Value::Number(n.clone()),
            AttributeValue::StringSet(set) => {
                Value::Array(set.iter().cloned().map(Value::String).collect())
            }
            AttributeValue::NumberSet(set) => {
                Value::Array(set.iter().cloned().map(Value::Number).collect())
            }
        }
    }
}

impl PartialEq for AttributeValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (AttributeValue::String(a), AttributeValue::String(b)) => a == b,
            (AttributeValue::Number(a), AttributeValue::Number(b)) => numbers_equal(a, b),
            (AttributeValue::StringSet(a), AttributeValue::StringSet(b)) => a == b,
            (AttributeValue::NumberSet(a), AttributeValue::NumberSet(b)) => {
                a.len() == b.len() && a.iter().all(|n| b.iter().any(|m| numbers_equal(n, m)))
            }
            _ => false,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::String(s) => write!(f, "{}", s),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::String(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Number(Number::from(value))
    }
}

impl From<i32> for AttributeValue {
    fn from(value: i32) -> Self {
        AttributeValue::Number(Number::from(value))
    }
}

/// Compare two JSON numbers by value, so `20` equals `20.0`
pub fn numbers_equal(a: &Number, b: &Number) -> bool {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return x == y;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

/// A stored item flattened into plain field values
///
/// Serializes as an ordinary JSON object, without the type tags.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Attributes,
}

impl Record {
    /// Create a record from item attributes
    pub fn new(fields: Attributes) -> Self {
        Self { fields }
    }

    /// Get a field value
    pub fn get(&self, field: &str) -> Option<&AttributeValue> {
        self.fields.get(field)
    }

    /// Whether the record has the given field
    pub fn contains_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Iterate fields in name order
    pub fn fields(&self) -> impl Iterator<Item = (&String, &AttributeValue)> {
        self.fields.iter()
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Borrow the underlying attributes
    pub fn attributes(&self) -> &Attributes {
        &self.fields
    }

    /// Take the underlying attributes
    pub fn into_attributes(self) -> Attributes {
        self.fields
    }

    /// Plain JSON object rendering
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.fields
                .iter()
                .map(|(name, value)| (name.clone(), value.to_json()))
                .collect(),
        )
    }
}

impl From<Attributes> for Record {
    fn from(fields: Attributes) -> Self {
        Self::new(fields)
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, &value.to_json())?;
        }
        map.end()
    }
}
