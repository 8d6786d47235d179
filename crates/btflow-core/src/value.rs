//! Dynamically typed values held by the state store.
//!
//! Field values travel through the store, reducers, checkpoint files, and trace
//! payloads, all of which need a representation that is both strongly typed enough
//! to dispatch on and freely (de)serializable. `serde_json::Value` already is that,
//! so `Value` is a thin newtype over it rather than a bespoke enum — the same choice
//! `aura-core` makes for its effect payloads.

use std::fmt;

/// A field value in the state store.
///
/// Cloning is cheap for scalars and shares backing storage for arrays/objects via
/// `serde_json::Value`'s own `Arc`-free but structurally-shared representation.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Value(pub serde_json::Value);

impl Value {
    pub fn null() -> Self {
        Value(serde_json::Value::Null)
    }

    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }

    pub fn as_json(&self) -> &serde_json::Value {
        &self.0
    }

    pub fn into_json(self) -> serde_json::Value {
        self.0
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.0.as_bool()
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.0.as_i64()
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.0.as_f64()
    }

    pub fn as_str(&self) -> Option<&str> {
        self.0.as_str()
    }

    pub fn as_array(&self) -> Option<&Vec<serde_json::Value>> {
        self.0.as_array()
    }

    /// Appends `item` if this value is an array, otherwise returns `self` unchanged
    /// wrapped in a fresh single-element array. Used by the append-only action-field
    /// reducer default.
    pub fn append(self, item: Value) -> Value {
        match self.0 {
            serde_json::Value::Array(mut items) => {
                items.push(item.0);
                Value(serde_json::Value::Array(items))
            }
            other if other.is_null() => Value(serde_json::Value::Array(vec![item.0])),
            other => Value(serde_json::Value::Array(vec![other, item.0])),
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::null()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value(serde_json::Value::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value(serde_json::Value::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value(serde_json::Value::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value(serde_json::Value::from(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value(serde_json::Value::from(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_to_null_starts_an_array() {
        let v = Value::null().append(Value::from(1_i64));
        assert_eq!(v.as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn append_to_scalar_wraps_both() {
        let v = Value::from("a").append(Value::from("b"));
        assert_eq!(v.0, serde_json::json!(["a", "b"]));
    }

    #[test]
    fn append_to_array_extends_in_place() {
        let v = Value::from(serde_json::json!([1, 2])).append(Value::from(3_i64));
        assert_eq!(v.0, serde_json::json!([1, 2, 3]));
    }
}
