use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Number, Value};
use std::fmt;
use std::sync::Arc;
use tracing::warn;

use super::schema::{FieldKind, FieldRule, FieldSchema};
use crate::request::Parameters;

static EMAIL: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$").ok()
});

/// Which rule a value broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Violation {
    #[serde(rename = "required")]
    Required,
    #[serde(rename = "minLength")]
    MinLength,
    #[serde(rename = "maxLength")]
    MaxLength,
    /// Pattern, filter, select membership and number bounds
    #[serde(rename = "format")]
    Format,
}

impl Violation {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Violation::Required => "required",
            Violation::MinLength => "minLength",
            Violation::MaxLength => "maxLength",
            Violation::Format => "format",
        }
    }

    fn default_message(self) -> &'static str {
        match self {
            Violation::Required => "This field is required.",
            Violation::MinLength => "The value is too short.",
            Violation::MaxLength => "The value is too long.",
            Violation::Format => "The value has an invalid format.",
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A submitted value broke a field rule.
///
/// Serialises to the `{fieldId, type, message, label}` payload rendered with status 412.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormDataError {
    pub field_id: String,
    #[serde(rename = "type")]
    pub violation: Violation,
    pub message: String,
    pub label: String,
}

impl FormDataError {
    fn new(rule: &FieldRule, violation: Violation) -> Self {
        let configured = match violation {
            Violation::Required => rule.required.as_ref().and_then(|c| c.message.clone()),
            Violation::MinLength => rule.min_length.as_ref().and_then(|c| c.message.clone()),
            Violation::MaxLength => rule.max_length.as_ref().and_then(|c| c.message.clone()),
            Violation::Format => rule.format.as_ref().and_then(|c| c.message.clone()),
        };
        Self {
            field_id: rule.id.clone(),
            violation,
            message: configured.unwrap_or_else(|| violation.default_message().to_string()),
            label: rule.display_label().to_string(),
        }
    }

    #[must_use]
    pub fn to_payload(&self) -> Value {
        json!({
            "fieldId": self.field_id,
            "type": self.violation.as_str(),
            "message": self.message,
            "label": self.label,
        })
    }
}

impl fmt::Display for FormDataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.field_id, self.violation, self.message)
    }
}

impl std::error::Error for FormDataError {}

/// Compile a `/pattern/flags` expression into a [`Regex`].
pub(crate) fn compile_pattern(expr: &str) -> Result<Regex, regex::Error> {
    let body = expr.strip_prefix('/').unwrap_or(expr);
    let (pattern, flags) = match body.rfind('/') {
        Some(end) => (&body[..end], &body[end + 1..]),
        None => (body, ""),
    };
    let inline: String = flags
        .chars()
        .filter(|c| matches!(c, 'i' | 'm' | 's' | 'x'))
        .collect();
    if inline.is_empty() {
        Regex::new(pattern)
    } else {
        Regex::new(&format!("(?{inline}){pattern}"))
    }
}

/// Applies a [`FieldSchema`] to request parameters, normalising values in place.
///
/// Per present field: strings are trimmed; an empty required value takes the default or fails
/// `required`; non-empty values are checked against length bounds, format, select membership
/// and, for numbers, coerced and checked against `min`/`max`. Arrays check every element.
/// A missing required field takes the default (never for checkboxes) or fails `required`.
#[derive(Debug, Default)]
pub struct FieldValidator {
    patterns: DashMap<String, Arc<Regex>>,
}

impl FieldValidator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and normalise `params`; the first violation wins.
    pub fn validate(&self, params: &mut Parameters, schema: &FieldSchema) -> Result<(), FormDataError> {
        for rule in &schema.fields {
            let present = params.get(&rule.id).is_some_and(|v| !v.is_null());
            if !present {
                if rule.is_required() {
                    match rule.usable_default() {
                        Some(default) if rule.kind != FieldKind::Checkbox => {
                            params.insert(rule.id.clone(), default.clone());
                        }
                        _ => return Err(FormDataError::new(rule, Violation::Required)),
                    }
                }
                continue;
            }

            let Some(value) = params.get_mut(&rule.id) else {
                continue;
            };
            if let Value::Array(items) = value {
                if rule.is_required() && items.is_empty() {
                    match rule.usable_default() {
                        Some(Value::Array(d)) => *items = d.clone(),
                        Some(d) => *items = vec![d.clone()],
                        None => return Err(FormDataError::new(rule, Violation::Required)),
                    }
                }
                for item in items.iter_mut() {
                    self.check_value(rule, item)?;
                }
            } else {
                self.check_value(rule, value)?;
            }
        }
        Ok(())
    }

    fn check_value(&self, rule: &FieldRule, value: &mut Value) -> Result<(), FormDataError> {
        if let Value::String(s) = value {
            let trimmed = s.trim();
            if trimmed.len() != s.len() {
                *s = trimmed.to_string();
            }
        }

        let mut text = as_text(value);
        if rule.is_required() && text.is_empty() {
            match rule.usable_default() {
                Some(default) => {
                    *value = default.clone();
                    text = as_text(value);
                }
                None => return Err(FormDataError::new(rule, Violation::Required)),
            }
        }

        let length = text.chars().count();
        if length == 0 {
            return Ok(());
        }

        if let Some(min) = rule.min_length.as_ref().filter(|c| c.value > 0) {
            if length < min.value {
                return Err(FormDataError::new(rule, Violation::MinLength));
            }
        }
        if let Some(max) = rule.max_length.as_ref().filter(|c| c.value > 0) {
            if length > max.value {
                return Err(FormDataError::new(rule, Violation::MaxLength));
            }
        }
        if let Some(format) = rule.format.as_ref().filter(|c| !c.value.is_empty()) {
            if !self.matches_format(&format.value, &text) {
                return Err(FormDataError::new(rule, Violation::Format));
            }
        }

        match rule.kind {
            FieldKind::Select => {
                if let Some(options) = &rule.values {
                    if !options.iter().any(|o| option_matches(o, &text)) {
                        return Err(FormDataError::new(rule, Violation::Format));
                    }
                }
            }
            FieldKind::Number => {
                let number = coerce_number(&text, rule.is_integer())
                    .ok_or_else(|| FormDataError::new(rule, Violation::Format))?;
                let n = number.as_f64().unwrap_or_default();
                if rule.min.is_some_and(|min| n < min) || rule.max.is_some_and(|max| n > max) {
                    return Err(FormDataError::new(rule, Violation::Format));
                }
                *value = Value::Number(number);
            }
            _ => {}
        }
        Ok(())
    }

    fn matches_format(&self, format: &str, text: &str) -> bool {
        if format.starts_with('/') {
            return match self.pattern(format) {
                Some(re) => re.is_match(text),
                None => false,
            };
        }
        let filter = format.to_ascii_lowercase();
        let filter = filter.strip_prefix("filter_validate_").unwrap_or(&filter);
        match filter {
            "email" => EMAIL.as_ref().is_some_and(|re| re.is_match(text)),
            "int" => text.parse::<i64>().is_ok(),
            "float" => text.parse::<f64>().is_ok_and(f64::is_finite),
            "url" => url::Url::parse(text).is_ok_and(|u| u.has_host()),
            "boolean" | "bool" => matches!(
                text.to_ascii_lowercase().as_str(),
                "1" | "0" | "true" | "false" | "yes" | "no" | "on" | "off"
            ),
            other => {
                warn!(filter = %other, "Unknown format filter; value rejected");
                false
            }
        }
    }

    fn pattern(&self, expr: &str) -> Option<Arc<Regex>> {
        if let Some(re) = self.patterns.get(expr) {
            return Some(Arc::clone(re.value()));
        }
        match compile_pattern(expr) {
            Ok(re) => {
                let re = Arc::new(re);
                self.patterns.insert(expr.to_string(), Arc::clone(&re));
                Some(re)
            }
            Err(e) => {
                warn!(pattern = %expr, error = %e, "Invalid format pattern; value rejected");
                None
            }
        }
    }
}

fn as_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn option_matches(option: &Value, text: &str) -> bool {
    match option {
        Value::String(s) => s == text,
        Value::Number(n) => n.to_string() == text || text.parse::<f64>().ok() == n.as_f64(),
        Value::Bool(b) => b.to_string() == text,
        _ => false,
    }
}

fn coerce_number(text: &str, integer: bool) -> Option<Number> {
    if integer {
        text.parse::<i64>().ok().map(Number::from)
    } else {
        text.parse::<f64>().ok().and_then(Number::from_f64)
    }
}
