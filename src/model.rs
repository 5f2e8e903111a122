use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::error::SeriesError;

/// A row as seen by the table layer: field name -> value.
pub type FieldMap = BTreeMap<String, Value>;

/// A single typed field value.
#[derive(Serialize, Debug, Clone, PartialEq, Default)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    Timestamp(DateTime<Utc>),
    Uuid(Uuid),
    Text(String),
    Bytes(Vec<u8>),
    /// Nested documents are carried through untouched.
    Json(serde_json::Value),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::Timestamp(_) => "timestamp",
            Value::Uuid(_) => "uuid",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::Json(_) => "json",
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Ordering between two values of the same kind.
    /// Ints and floats compare numerically; anything else mixed is incomparable.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
            (Value::Uuid(a), Value::Uuid(b)) => Some(a.cmp(b)),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Bytes(a), Value::Bytes(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// CQL-style literal, used when rendering statements.
    pub fn to_literal(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Int(v) => v.to_string(),
            Value::Float(v) => v.to_string(),
            Value::Bool(v) => v.to_string(),
            Value::Timestamp(ts) => format!("'{}'", ts.to_rfc3339()),
            Value::Uuid(id) => id.to_string(),
            Value::Text(s) => format!("'{}'", s.replace('\'', "''")),
            Value::Bytes(b) => {
                let hex: String = b.iter().map(|byte| format!("{:02x}", byte)).collect();
                format!("0x{}", hex)
            }
            Value::Json(v) => format!("'{}'", v.to_string().replace('\'', "''")),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Value::Uuid(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Text(s),
            nested => Value::Json(nested),
        }
    }
}

/// Anything that can be viewed as a row of named fields.
///
/// Conversion either yields the full mapping or fails; there is no partial result.
pub trait IntoFieldMap {
    fn into_field_map(self) -> Result<FieldMap, SeriesError>;
}

impl IntoFieldMap for FieldMap {
    fn into_field_map(self) -> Result<FieldMap, SeriesError> {
        Ok(self)
    }
}

impl IntoFieldMap for HashMap<String, Value> {
    fn into_field_map(self) -> Result<FieldMap, SeriesError> {
        Ok(self.into_iter().collect())
    }
}

impl IntoFieldMap for Vec<(String, Value)> {
    fn into_field_map(self) -> Result<FieldMap, SeriesError> {
        Ok(self.into_iter().collect())
    }
}

/// Only JSON objects are rows. String timestamps stay text; a timestamp has to be typed.
impl IntoFieldMap for serde_json::Value {
    fn into_field_map(self) -> Result<FieldMap, SeriesError> {
        match self {
            serde_json::Value::Object(obj) => {
                Ok(obj.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
            other => Err(SeriesError::Conversion(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }
}

fn json_kind(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a bool",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// Decode one fetched row into a caller type.
pub fn decode_row<T: DeserializeOwned>(row: FieldMap) -> Result<T, serde_json::Error> {
    let json = serde_json::to_value(row)?;
    serde_json::from_value(json)
}

/// Decode fetched rows into caller types, preserving order.
pub fn decode_rows<T: DeserializeOwned>(rows: Vec<FieldMap>) -> Result<Vec<T>, serde_json::Error> {
    rows.into_iter().map(decode_row).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn json_object_converts() {
        let m = json!({"id": 7, "name": "sensor", "tags": ["a"]}).into_field_map().unwrap();
        assert_eq!(m["id"], Value::Int(7));
        assert_eq!(m["name"], Value::Text("sensor".into()));
        assert_eq!(m["tags"], Value::Json(json!(["a"])));
    }

    #[test]
    fn json_non_object_is_conversion_error() {
        let err = json!([1, 2, 3]).into_field_map().unwrap_err();
        assert!(matches!(err, SeriesError::Conversion(_)));
    }

    #[test]
    fn mixed_numeric_compare() {
        assert_eq!(Value::Int(2).compare(&Value::Float(2.5)), Some(Ordering::Less));
        assert_eq!(Value::Int(2).compare(&Value::Text("2".into())), None);
    }

    #[test]
    fn decode_round_trips_typed_fields() {
        #[derive(serde::Deserialize, Debug, PartialEq)]
        struct Reading {
            id: Uuid,
            at: DateTime<Utc>,
            celsius: f64,
        }

        let id = Uuid::new_v4();
        let at = Utc.with_ymd_and_hms(2021, 1, 1, 0, 30, 0).unwrap();
        let mut row = FieldMap::new();
        row.insert("id".into(), id.into());
        row.insert("at".into(), at.into());
        row.insert("celsius".into(), Value::Float(21.5));
        row.insert("bucket".into(), Value::Int(1_609_459_200_000));

        let decoded: Reading = decode_row(row).unwrap();
        assert_eq!(decoded, Reading { id, at, celsius: 21.5 });
    }

    #[test]
    fn literal_escapes_quotes() {
        assert_eq!(Value::from("it's").to_literal(), "'it''s'");
        assert_eq!(Value::Bytes(vec![0xde, 0xad]).to_literal(), "0xdead");
    }
}
