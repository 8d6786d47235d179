//! The `Tool` plug-in contract: name/description/schema plus a typed call mode.
//!
//! Grounded in `btflow/tools/base.py`'s `Tool` ABC and `btflow/tools/ext/schema.py`'s
//! `validate_json_schema`. The original dispatches sync vs async calls by
//! `inspect.iscoroutinefunction` at call time; Rust closures carry no such runtime
//! signature, so `ToolRun` tags the call mode statically at construction instead
//! (REDESIGN FLAGS: duck-typed tool injection → one trait + static dispatch).

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::value::Value;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ToolError {
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),
    #[error("{0}")]
    Failed(String),
    /// Signals the caller may retry per the runtime's backoff policy.
    #[error("transient failure: {0}")]
    Transient(String),
}

impl ToolError {
    pub fn retryable(&self) -> bool {
        matches!(self, ToolError::Transient(_))
    }
}

pub type ToolResult = std::result::Result<Value, ToolError>;

/// A tool's executable body, tagged with its call mode so the runtime never needs
/// to probe a closure's signature.
#[derive(Clone)]
pub enum ToolRun {
    Sync(Arc<dyn Fn(Value) -> ToolResult + Send + Sync>),
    Async(Arc<dyn Fn(Value) -> BoxFuture<'static, ToolResult> + Send + Sync>),
}

/// A minimal JSON-Schema subset: object/array/string/number/integer/boolean, plus
/// `enum`, `required`, `properties`, `items`, and the string/number bounds
/// `validate_json_schema` checks. Stored as raw `serde_json::Value` rather than a
/// typed struct because schemas are author-supplied data, not a fixed shape the
/// crate controls.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct ToolSchema(pub serde_json::Value);

impl ToolSchema {
    pub fn string() -> Self {
        ToolSchema(serde_json::json!({"type": "string"}))
    }

    pub fn is_object_shaped(&self) -> bool {
        let t = self.0.get("type").and_then(|v| v.as_str());
        t == Some("object") || (t.is_none() && self.0.get("properties").is_some())
    }

    /// Wraps a non-object schema under a single named property, the normalization
    /// spec.md §4.10/§6.1 requires before advertising a tool externally.
    pub fn normalize_under(&self, property: &str) -> ToolSchema {
        if self.is_object_shaped() {
            let mut normalized = self.0.clone();
            if let Some(obj) = normalized.as_object_mut() {
                obj.entry("type").or_insert_with(|| serde_json::json!("object"));
                obj.entry("properties").or_insert_with(|| serde_json::json!({}));
            }
            return ToolSchema(normalized);
        }
        let inner = if self.0.is_null() { serde_json::json!({"type": "string"}) } else { self.0.clone() };
        ToolSchema(serde_json::json!({
            "type": "object",
            "properties": { property: inner },
            "required": [property],
        }))
    }

    /// Validates `value` against this schema, returning every violation found
    /// (empty = valid). A direct port of `validate_json_schema`'s recursive checks.
    pub fn validate(&self, value: &serde_json::Value) -> Vec<String> {
        validate_at(&self.0, value, "$")
    }
}

fn validate_at(schema: &serde_json::Value, value: &serde_json::Value, path: &str) -> Vec<String> {
    if schema.is_null() || (schema.is_object() && schema.as_object().unwrap().is_empty()) {
        return Vec::new();
    }

    if let Some(allowed) = schema.get("enum").and_then(|v| v.as_array()) {
        if !allowed.contains(value) {
            return vec![format!("{path}: value must be one of {allowed:?}")];
        }
    }

    let schema_type = schema
        .get("type")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .or_else(|| schema.get("properties").map(|_| "object".to_string()));

    let mut errors = Vec::new();
    match schema_type.as_deref() {
        Some("object") => {
            let Some(obj) = value.as_object() else {
                return vec![format!("{path}: expected object")];
            };
            for key in schema.get("required").and_then(|v| v.as_array()).into_iter().flatten() {
                if let Some(key) = key.as_str() {
                    if !obj.contains_key(key) {
                        errors.push(format!("{path}.{key}: field required"));
                    }
                }
            }
            if let Some(properties) = schema.get("properties").and_then(|v| v.as_object()) {
                for (key, subschema) in properties {
                    if let Some(v) = obj.get(key) {
                        errors.extend(validate_at(subschema, v, &format!("{path}.{key}")));
                    }
                }
            }
        }
        Some("array") => {
            let Some(items) = value.as_array() else {
                return vec![format!("{path}: expected array")];
            };
            if let Some(item_schema) = schema.get("items") {
                for (i, item) in items.iter().enumerate() {
                    errors.extend(validate_at(item_schema, item, &format!("{path}[{i}]")));
                }
            }
        }
        Some("string") => {
            let Some(s) = value.as_str() else {
                return vec![format!("{path}: expected string")];
            };
            if let Some(min) = schema.get("minLength").and_then(|v| v.as_u64()) {
                if (s.chars().count() as u64) < min {
                    errors.push(format!("{path}: minLength {min}"));
                }
            }
            if let Some(max) = schema.get("maxLength").and_then(|v| v.as_u64()) {
                if (s.chars().count() as u64) > max {
                    errors.push(format!("{path}: maxLength {max}"));
                }
            }
            if let Some(pattern) = schema.get("pattern").and_then(|v| v.as_str()) {
                match regex::Regex::new(pattern) {
                    Ok(re) => {
                        if !re.is_match(s) {
                            errors.push(format!("{path}: pattern mismatch"));
                        }
                    }
                    Err(_) => errors.push(format!("{path}: invalid pattern")),
                }
            }
        }
        Some("number") => {
            let Some(n) = value.as_f64() else {
                return vec![format!("{path}: expected number")];
            };
            if let Some(min) = schema.get("minimum").and_then(|v| v.as_f64()) {
                if n < min {
                    errors.push(format!("{path}: minimum {min}"));
                }
            }
            if let Some(max) = schema.get("maximum").and_then(|v| v.as_f64()) {
                if n > max {
                    errors.push(format!("{path}: maximum {max}"));
                }
            }
        }
        Some("integer") => {
            if value.as_i64().is_none() {
                return vec![format!("{path}: expected integer")];
            }
        }
        Some("boolean") => {
            if value.as_bool().is_none() {
                return vec![format!("{path}: expected boolean")];
            }
        }
        _ => {}
    }
    errors
}

/// A callable external agents/tools plug into the tree through — name, schema, and
/// an enum-dispatched body.
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn input_schema(&self) -> &ToolSchema;
    fn output_schema(&self) -> &ToolSchema;
    fn run(&self) -> ToolRun;

    fn normalized_input_schema(&self) -> ToolSchema {
        self.input_schema().normalize_under("input")
    }

    fn normalized_output_schema(&self) -> ToolSchema {
        self.output_schema().normalize_under("output")
    }
}

/// A ready-made `Tool` built from plain data rather than a new type per tool —
/// the Rust equivalent of subclassing `btflow/tools/base.py`'s `Tool` ABC for a
/// one-off callable, without needing a dedicated struct per tool.
pub struct FunctionTool {
    name: String,
    description: String,
    input_schema: ToolSchema,
    output_schema: ToolSchema,
    run: ToolRun,
}

impl FunctionTool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: ToolSchema,
        output_schema: ToolSchema,
        run: ToolRun,
    ) -> Self {
        FunctionTool { name: name.into(), description: description.into(), input_schema, output_schema, run }
    }
}

impl Tool for FunctionTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_schema(&self) -> &ToolSchema {
        &self.input_schema
    }

    fn output_schema(&self) -> &ToolSchema {
        &self.output_schema
    }

    fn run(&self) -> ToolRun {
        self.run.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_object_schema_wraps_under_input() {
        let schema = ToolSchema::string();
        let normalized = schema.normalize_under("input");
        assert_eq!(
            normalized.0,
            serde_json::json!({"type": "object", "properties": {"input": {"type": "string"}}, "required": ["input"]})
        );
    }

    #[test]
    fn object_schema_passes_through() {
        let schema = ToolSchema(serde_json::json!({"type": "object", "properties": {"x": {"type": "integer"}}}));
        assert!(schema.is_object_shaped());
        assert_eq!(schema.normalize_under("input"), schema);
    }

    #[test]
    fn validate_reports_missing_required_field() {
        let schema = ToolSchema(serde_json::json!({
            "type": "object",
            "required": ["q"],
            "properties": {"q": {"type": "string"}},
        }));
        let errors = schema.validate(&serde_json::json!({}));
        assert_eq!(errors, vec!["$.q: field required".to_string()]);
    }

    #[test]
    fn validate_checks_string_bounds() {
        let schema = ToolSchema(serde_json::json!({"type": "string", "minLength": 3}));
        assert_eq!(schema.validate(&serde_json::json!("ab")), vec!["$: minLength 3".to_string()]);
        assert!(schema.validate(&serde_json::json!("abc")).is_empty());
    }

    #[test]
    fn validate_checks_string_pattern() {
        let schema = ToolSchema(serde_json::json!({"type": "string", "pattern": "^[a-z]+$"}));
        assert_eq!(schema.validate(&serde_json::json!("ABC")), vec!["$: pattern mismatch".to_string()]);
        assert!(schema.validate(&serde_json::json!("abc")).is_empty());
    }
}
