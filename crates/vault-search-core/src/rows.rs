//! Engine row values and their JSON-safe serialization.
//!
//! Query engines hand back loosely-typed rows. They are converted into
//! [`EngineValue`]s at the engine boundary, and [`serialize_rows`] turns
//! them into JSON. 64-bit integers become decimal strings, because JSON
//! numbers cannot carry them losslessly. Every other value keeps its
//! natural JSON type.

use serde_json::{Map, Number, Value};

/// A single value returned by a query engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineValue {
    Null,
    Bool(bool),
    /// A 64-bit integer.
    BigInt(i64),
    Double(f64),
    Text(String),
    Blob(Vec<u8>),
    List(Vec<EngineValue>),
}

/// A row as an ordered list of `(column, value)` pairs.
pub type EngineRow = Vec<(String, EngineValue)>;

impl EngineValue {
    /// Convert to a JSON value, stringifying 64-bit integers.
    ///
    /// Non-finite doubles have no JSON form and become `null`. Blobs become
    /// arrays of byte values.
    pub fn to_json(&self) -> Value {
        match self {
            EngineValue::Null => Value::Null,
            EngineValue::Bool(b) => Value::Bool(*b),
            EngineValue::BigInt(i) => Value::String(i.to_string()),
            EngineValue::Double(f) => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
            EngineValue::Text(s) => Value::String(s.clone()),
            EngineValue::Blob(bytes) => Value::Array(bytes.iter().map(|b| Value::from(*b)).collect()),
            EngineValue::List(items) => Value::Array(items.iter().map(EngineValue::to_json).collect()),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            EngineValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Serialize one row into a JSON object, keeping column order.
pub fn serialize_row(row: &EngineRow) -> Value {
    let object: Map<String, Value> = row
        .iter()
        .map(|(column, value)| (column.clone(), value.to_json()))
        .collect();
    Value::Object(object)
}

/// Serialize rows into JSON-safe objects.
pub fn serialize_rows(rows: &[EngineRow]) -> Vec<Value> {
    rows.iter().map(serialize_row).collect()
}

/// Look up a column value by name.
pub fn column<'a>(row: &'a EngineRow, name: &str) -> Option<&'a EngineValue> {
    row.iter().find(|(c, _)| c == name).map(|(_, v)| v)
}
