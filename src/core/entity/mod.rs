//! Primary-keyed record with a lazily-parsed typed field map.
//!
//! An `Entity` is stored as a JSON blob under its primary key. Reading one
//! field does not require materializing all fields beyond the initial
//! parse; mutating a field invalidates the cached serialized form so the
//! next `to_bytes()` rebuilds it.

use crate::core::common::error::{Result, ThemisError};
use crate::core::common::types::Value;
use serde_json::{Map, Value as JsonValue};
use std::cell::RefCell;

/// A primary-keyed record. Fields are stored internally as a `serde_json`
/// map so field access is independent of declaration order and new fields
/// can be added without a schema migration (this store is schema-less).
#[derive(Debug, Clone)]
pub struct Entity {
    pk: String,
    fields: Map<String, JsonValue>,
    // Cache of the last serialized form; cleared on any mutation.
    serialized_cache: RefCell<Option<Vec<u8>>>,
}

impl Entity {
    pub fn new(pk: impl Into<String>) -> Result<Self> {
        let pk = pk.into();
        if pk.is_empty() {
            return Err(ThemisError::InvalidInput("primary key must be non-empty".to_string()));
        }
        Ok(Self { pk, fields: Map::new(), serialized_cache: RefCell::new(None) })
    }

    pub fn pk(&self) -> &str {
        &self.pk
    }

    pub fn set(&mut self, field: &str, value: Value) {
        self.fields.insert(field.to_string(), value_to_json(&value));
        *self.serialized_cache.borrow_mut() = None;
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        *self.serialized_cache.borrow_mut() = None;
        self.fields.remove(field).map(|j| json_to_value(&j))
    }

    /// Lazily parses and returns a single field, without touching any
    /// other field.
    pub fn get(&self, field: &str) -> Option<Value> {
        self.fields.get(field).map(json_to_value)
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.fields.get(field).map(|v| !v.is_null()).unwrap_or(false)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Serializes to the blob stored under the primary key, using (and
    /// populating) the cache.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        if let Some(cached) = self.serialized_cache.borrow().as_ref() {
            return Ok(cached.clone());
        }
        let mut obj = Map::new();
        obj.insert("_pk".to_string(), JsonValue::String(self.pk.clone()));
        for (k, v) in &self.fields {
            obj.insert(k.clone(), v.clone());
        }
        let bytes = serde_json::to_vec(&JsonValue::Object(obj))?;
        *self.serialized_cache.borrow_mut() = Some(bytes.clone());
        Ok(bytes)
    }

    pub fn from_bytes(pk: &str, bytes: &[u8]) -> Result<Self> {
        let parsed: JsonValue = serde_json::from_slice(bytes)?;
        let mut fields = match parsed {
            JsonValue::Object(m) => m,
            _ => return Err(ThemisError::Corruption(format!("entity blob for {pk} is not a JSON object"))),
        };
        fields.remove("_pk");
        Ok(Self { pk: pk.to_string(), fields, serialized_cache: RefCell::new(Some(bytes.to_vec())) })
    }

    /// Extracts a `(lat, lon)` pair for geo indexing, accepting either a
    /// `<col>_lat`/`<col>_lon` field pair or a nested object field
    /// `{"lat":..,"lon":..}`.
    pub fn geo_point(&self, col: &str) -> Option<(f64, f64)> {
        if let (Some(lat), Some(lon)) =
            (self.get(&format!("{col}_lat")), self.get(&format!("{col}_lon")))
        {
            return Some((lat.as_f64()?, lon.as_f64()?));
        }
        let obj = self.fields.get(col)?.as_object()?;
        let lat = obj.get("lat")?.as_f64()?;
        let lon = obj.get("lon")?.as_f64()?;
        Some((lat, lon))
    }
}

fn value_to_json(v: &Value) -> JsonValue {
    match v {
        Value::Integer(i) => JsonValue::from(*i),
        Value::Float(f) => serde_json::Number::from_f64(*f).map(JsonValue::Number).unwrap_or(JsonValue::Null),
        Value::Text(s) => JsonValue::String(s.clone()),
        Value::Boolean(b) => JsonValue::Bool(*b),
        Value::Blob(b) => JsonValue::String(crate::core::common::hex::encode(b)),
        Value::Vector(v) => JsonValue::Array(
            v.iter().map(|f| serde_json::Number::from_f64(f64::from(*f)).map(JsonValue::Number).unwrap_or(JsonValue::Null)).collect(),
        ),
        Value::Null => JsonValue::Null,
    }
}

fn json_to_value(j: &JsonValue) -> Value {
    match j {
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Integer(i)
            } else {
                Value::Float(n.as_f64().unwrap_or(0.0))
            }
        }
        JsonValue::String(s) => Value::Text(s.clone()),
        JsonValue::Bool(b) => Value::Boolean(*b),
        JsonValue::Array(items) => {
            let mut vec = Vec::with_capacity(items.len());
            let mut all_numeric = true;
            for item in items {
                match item.as_f64() {
                    Some(f) => vec.push(f as f32),
                    None => {
                        all_numeric = false;
                        break;
                    }
                }
            }
            if all_numeric {
                Value::Vector(vec)
            } else {
                Value::Text(j.to_string())
            }
        }
        JsonValue::Null => Value::Null,
        JsonValue::Object(_) => Value::Text(j.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_primary_key() {
        assert!(Entity::new("").is_err());
    }

    #[test]
    fn round_trips_fields_through_serialization() {
        let mut e = Entity::new("u1").unwrap();
        e.set("name", Value::Text("Jane".to_string()));
        e.set("age", Value::Integer(30));
        e.set("embedding", Value::Vector(vec![1.0, 0.0, 0.0]));

        let bytes = e.to_bytes().unwrap();
        let reloaded = Entity::from_bytes("u1", &bytes).unwrap();

        assert_eq!(reloaded.get("name"), Some(Value::Text("Jane".to_string())));
        assert_eq!(reloaded.get("age"), Some(Value::Integer(30)));
        assert_eq!(reloaded.get("embedding").unwrap().as_vector().unwrap(), &[1.0, 0.0, 0.0]);
    }

    #[test]
    fn mutation_invalidates_serialized_cache() {
        let mut e = Entity::new("u1").unwrap();
        e.set("age", Value::Integer(1));
        let first = e.to_bytes().unwrap();
        e.set("age", Value::Integer(2));
        let second = e.to_bytes().unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn geo_point_reads_lat_lon_suffixed_fields() {
        let mut e = Entity::new("p1").unwrap();
        e.set("loc_lat", Value::Float(40.7));
        e.set("loc_lon", Value::Float(-74.0));
        assert_eq!(e.geo_point("loc"), Some((40.7, -74.0)));
    }
}
