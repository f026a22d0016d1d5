use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::valuation::tools::error::{Result, ToolError};

pub mod schema;

pub use schema::KnownSection;

/// Identifier of a dataset row. The address of the originating query is used
/// as-is so the output can be joined back onto the input list.
pub type RecordId = String;

/// Single-level mapping produced by flattening a [`RawRecord`].
pub type FlatRecord = BTreeMap<String, FieldValue>;

/// Value stored against a field of a flattened record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Explicit JSON `null`, or a field the provider left blank.
    Null,
    /// Boolean literal.
    Boolean(bool),
    /// Numeric literal, kept in its JSON form so integers stay integers.
    Number(serde_json::Number),
    /// Plain string literal.
    String(String),
    /// Array or object found below the first level. It is carried unchanged.
    Nested(Value),
}

impl FieldValue {
    /// Converts a JSON value found inside a section.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(value) => FieldValue::Boolean(value),
            Value::Number(number) => FieldValue::Number(number),
            Value::String(value) => FieldValue::String(value),
            nested @ (Value::Array(_) | Value::Object(_)) => FieldValue::Nested(nested),
        }
    }

    /// Renders the field as a table cell. Strings are written raw, nulls as an
    /// empty cell and nested values as compact JSON.
    pub fn to_cell(&self) -> String {
        match self {
            FieldValue::Null => String::new(),
            FieldValue::Boolean(value) => value.to_string(),
            FieldValue::Number(number) => number.to_string(),
            FieldValue::String(value) => value.clone(),
            FieldValue::Nested(value) => value.to_string(),
        }
    }
}

/// Nested response returned by the valuation provider for a single property.
///
/// The top level maps section names (`zestimate`, `full_address`, ...) to
/// either a mapping of fields or a bare scalar such as `zpid`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawRecord {
    sections: Map<String, Value>,
}

impl RawRecord {
    /// Builds a record from a decoded JSON document, rejecting anything that
    /// is not an object.
    pub fn from_json(document: Value) -> Result<Self> {
        match document {
            Value::Object(sections) => Ok(Self { sections }),
            other => Err(ToolError::InvalidResponse(format!(
                "expected JSON object, found {}",
                json_kind(&other)
            ))),
        }
    }

    /// Returns the raw value stored under the given top-level name.
    pub fn section(&self, name: &str) -> Option<&Value> {
        self.sections.get(name)
    }
}

/// Names the kind of a JSON value for diagnostics.
pub fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A single lookup request read from the input file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PropertyQuery {
    pub address: String,
    pub zipcode: String,
}

impl PropertyQuery {
    pub fn new(address: impl Into<String>, zipcode: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            zipcode: zipcode.into(),
        }
    }

    /// Key under which the flattened response is stored in the dataset.
    pub fn record_id(&self) -> RecordId {
        self.address.clone()
    }
}

/// Flattened records keyed by the identifier of the query that produced them.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dataset {
    rows: BTreeMap<RecordId, FlatRecord>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the row for `id`, returning the replaced row.
    pub fn insert(&mut self, id: impl Into<RecordId>, record: FlatRecord) -> Option<FlatRecord> {
        self.rows.insert(id.into(), record)
    }

    pub fn get(&self, id: &str) -> Option<&FlatRecord> {
        self.rows.get(id)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterates rows ordered by identifier.
    pub fn iter(&self) -> impl Iterator<Item = (&RecordId, &FlatRecord)> {
        self.rows.iter()
    }
}
