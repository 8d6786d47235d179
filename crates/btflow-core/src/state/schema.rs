//! Static schema descriptors for state store fields.
//!
//! The original implementation derives its schema from a `pydantic.BaseModel`'s
//! annotations at runtime. Rust has no equivalent introspection, so the schema is
//! built explicitly as an ordered list of descriptors (REDESIGN FLAGS) — callers
//! construct a `Schema` once at tree-build time and hand it to the `StateStore`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{BtflowError, Result};
use crate::value::Value;

/// How a field's initial value is produced.
#[derive(Clone)]
pub enum DefaultValue {
    Constant(Value),
    Factory(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl DefaultValue {
    pub fn make(&self) -> Value {
        match self {
            DefaultValue::Constant(v) => v.clone(),
            DefaultValue::Factory(f) => f(),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Constant(v) => f.debug_tuple("Constant").field(v).finish(),
            DefaultValue::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

impl From<Value> for DefaultValue {
    fn from(v: Value) -> Self {
        DefaultValue::Constant(v)
    }
}

/// Combines the field's current value with an incoming update.
///
/// Mirrors the original's per-field reducer hook (`btflow/core/state.py`'s
/// `StateManager.update` calling a field's `reduce` if present, otherwise
/// overwriting). Returning `Err` aborts the whole `update()` call — no partial
/// commit (spec.md §4.1 "validate before commit").
pub type Reducer = Arc<dyn Fn(&Value, Value) -> Result<Value> + Send + Sync>;

/// One field in a state schema.
#[derive(Clone)]
pub struct FieldDescriptor {
    pub name: String,
    pub default: DefaultValue,
    pub reducer: Option<Reducer>,
    /// Action fields are reset to their default at the start of every tick
    /// (spec.md §3.4 "action-field reset-per-frame").
    pub is_action: bool,
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("default", &self.default)
            .field("has_reducer", &self.reducer.is_some())
            .field("is_action", &self.is_action)
            .finish()
    }
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, default: impl Into<DefaultValue>) -> Self {
        FieldDescriptor {
            name: name.into(),
            default: default.into(),
            reducer: None,
            is_action: false,
        }
    }

    pub fn with_reducer(mut self, reducer: Reducer) -> Self {
        self.reducer = Some(reducer);
        self
    }

    /// Marks the field as an action field: `Value::append`-reduced by default if no
    /// reducer is given, and cleared on every `reset_actions()` call.
    pub fn action(mut self) -> Self {
        self.is_action = true;
        if self.reducer.is_none() {
            self.reducer = Some(Arc::new(|old: &Value, new: Value| {
                Ok(old.clone().append(new))
            }));
        }
        self
    }
}

/// Ordered collection of field descriptors plus the extra-keys policy.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: Vec<FieldDescriptor>,
    index: HashMap<String, usize>,
    /// When true, `update()` accepts keys outside the descriptor list and stores
    /// them verbatim (spec.md §4.1 "Unknown keys").
    pub allow_extra: bool,
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&FieldDescriptor> {
        self.index.get(name).map(|&i| &self.fields[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn action_field_names(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|f| f.is_action)
            .map(|f| f.name.as_str())
    }

    /// Validates a key against the schema: known field, or extra key if allowed.
    pub fn check_key(&self, name: &str) -> Result<()> {
        if self.contains(name) || self.allow_extra {
            Ok(())
        } else {
            Err(BtflowError::schema(name, "unknown field and allow_extra is false"))
        }
    }
}

#[derive(Default)]
pub struct SchemaBuilder {
    fields: Vec<FieldDescriptor>,
    allow_extra: bool,
}

impl SchemaBuilder {
    pub fn field(mut self, descriptor: FieldDescriptor) -> Self {
        self.fields.push(descriptor);
        self
    }

    pub fn allow_extra(mut self, allow: bool) -> Self {
        self.allow_extra = allow;
        self
    }

    pub fn build(self) -> Schema {
        let mut index = HashMap::with_capacity(self.fields.len());
        for (i, field) in self.fields.iter().enumerate() {
            index.insert(field.name.clone(), i);
        }
        Schema {
            fields: self.fields,
            index,
            allow_extra: self.allow_extra,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_field_defaults_to_append_reducer() {
        let field = FieldDescriptor::new("messages", Value::from(serde_json::json!([]))).action();
        assert!(field.is_action);
        let reducer = field.reducer.unwrap();
        let combined = reducer(&Value::from(serde_json::json!([1])), Value::from(2_i64)).unwrap();
        assert_eq!(combined.0, serde_json::json!([1, 2]));
    }

    #[test]
    fn unknown_field_rejected_unless_allow_extra() {
        let schema = Schema::builder()
            .field(FieldDescriptor::new("a", Value::from(1_i64)))
            .build();
        assert!(schema.check_key("a").is_ok());
        assert!(schema.check_key("b").is_err());

        let permissive = Schema::builder().allow_extra(true).build();
        assert!(permissive.check_key("anything").is_ok());
    }
}
