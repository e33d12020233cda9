use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of input a field comes from. Anything unknown validates like text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    #[default]
    Text,
    Number,
    Select,
    Checkbox,
    #[serde(other)]
    Other,
}

/// A rule value plus the user-facing message shown when it is violated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint<T> {
    pub value: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> Constraint<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            message: None,
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: &str) -> Self {
        self.message = Some(message.to_string());
        self
    }
}

/// Validation rules for one field.
///
/// ```yaml
/// - id: email
///   label: E-mail
///   required: { value: true, message: "E-mail is required" }
///   maxLength: { value: 120 }
///   format: { value: email, message: "Not an e-mail address" }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldRule {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Takes precedence over `label` in error payloads
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: FieldKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<Constraint<bool>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<Constraint<usize>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<Constraint<usize>>,
    /// `/regex/flags` or a named filter (`email`, `int`, `float`, `url`, `boolean`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<Constraint<String>>,
    /// Allowed option keys of a select
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<serde_json::Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
}

impl FieldRule {
    #[must_use]
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Self::default()
        }
    }

    /// Label shown to the user: `title`, then `label`, then the field id.
    #[must_use]
    pub fn display_label(&self) -> &str {
        self.title
            .as_deref()
            .or(self.label.as_deref())
            .unwrap_or(&self.id)
    }

    #[must_use]
    pub fn is_required(&self) -> bool {
        self.required.as_ref().is_some_and(|c| c.value)
    }

    /// Usable default: PHP-style "empty" defaults (`null`, `""`, `0`, `false`) count as none.
    #[must_use]
    pub fn usable_default(&self) -> Option<&Value> {
        self.default_value.as_ref().filter(|v| !is_loose_null(v))
    }

    /// Numbers coerce to integers unless `step` is fractional.
    #[must_use]
    pub fn is_integer(&self) -> bool {
        match &self.step {
            Some(step) => step.is_i64() || step.is_u64(),
            None => true,
        }
    }
}

fn is_loose_null(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::Array(a) => a.is_empty(),
        Value::Object(_) => false,
    }
}

/// Ordered field rules for one `(uri, method)` form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    #[serde(default)]
    pub fields: Vec<FieldRule>,
}

impl FieldSchema {
    #[must_use]
    pub fn new(fields: Vec<FieldRule>) -> Self {
        Self { fields }
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&FieldRule> {
        self.fields.iter().find(|f| f.id == id)
    }

    /// Check that every `/regex/` format compiles; called once at load.
    pub fn check(&self) -> anyhow::Result<()> {
        for field in &self.fields {
            if let Some(format) = &field.format {
                if format.value.starts_with('/') {
                    super::validator::compile_pattern(&format.value).map_err(|e| {
                        anyhow::anyhow!("field '{}' has an invalid format pattern: {e}", field.id)
                    })?;
                }
            }
        }
        Ok(())
    }
}
