//! Response rendering: selects a body template by negotiated format and final status.
//!
//! Only `200` and `412` responses carry a body; every other status renders the status line
//! and content type alone. A format without a template falls back to the `json` template, while
//! the content type still follows the requested format (`text/plain` when unknown).
//!
//! Built-in templates cover `json`, `xml`, `csv` and `text`. A view directory may override
//! them or add formats with `<format>.body.j2` files. Templates see the variables below; each
//! derived representation is built only when the template reads it:
//!
//! - `body` - the payload value
//! - `json` - the payload as compact JSON text
//! - `text` - a string payload as is, anything else as JSON text
//! - `xml` - the payload as an escaped element tree
//! - `rows` - the payload as CSV lines
//! - `status`, `reason`, `format`

use anyhow::Context;
use minijinja::value::{Object, Value as TemplateValue};
use minijinja::{AutoEscape, Environment};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error};

use crate::request::ResponseFormat;

const TEMPLATE_SUFFIX: &str = ".body.j2";

const BUILTIN: [(&str, &str); 4] = [
    ("json", "{{ json }}"),
    ("text", "{{ text }}"),
    (
        "xml",
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<response>{{ xml }}</response>",
    ),
    ("csv", "{% for row in rows %}{{ row }}\n{% endfor %}"),
];

/// Content type of a response format.
#[must_use]
pub fn content_type_for(format: &str) -> &'static str {
    match format {
        "csv" => "text/csv",
        "json" => "application/json",
        "xml" => "application/xml",
        _ => "text/plain",
    }
}

/// Reason phrase of a status code.
#[must_use]
pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        409 => "Conflict",
        412 => "Precondition Failed",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        503 => "Service Unavailable",
        other => http::StatusCode::from_u16(other)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or(""),
    }
}

/// Whether a status carries a rendered body.
#[must_use]
pub fn renders_body(status: u16) -> bool {
    status == 200 || status == 412
}

/// Rendered output handed back to the transport layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Response {
    pub status: u16,
    pub reason: &'static str,
    pub content_type: &'static str,
    pub body: Option<String>,
    /// The client accepts `deflate` and there is a body to compress
    pub deflate: bool,
}

impl Response {
    /// Status line and content type without a body.
    #[must_use]
    pub fn empty(status: u16, format: &str) -> Self {
        Self {
            status,
            reason: reason_phrase(status),
            content_type: content_type_for(format),
            body: None,
            deflate: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResponseRenderer {
    env: Environment<'static>,
    formats: BTreeSet<String>,
}

impl Default for ResponseRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseRenderer {
    /// Renderer with the built-in templates only.
    #[must_use]
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_auto_escape_callback(|_| AutoEscape::None);
        let mut renderer = Self {
            env,
            formats: BTreeSet::new(),
        };
        for (format, source) in BUILTIN {
            if let Err(e) = renderer.add_template(format, source) {
                error!(format, error = %e, "Built-in template rejected");
            }
        }
        renderer
    }

    /// Built-in templates plus every `<format>.body.j2` found in `dir`.
    pub fn with_view_dir<P: AsRef<Path>>(dir: P) -> anyhow::Result<Self> {
        let dir = dir.as_ref();
        let mut renderer = Self::new();
        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read view directory {}", dir.display()))?;
        for entry in entries {
            let path = entry?.path();
            let Some(format) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_suffix(TEMPLATE_SUFFIX))
            else {
                continue;
            };
            let source = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read template {}", path.display()))?;
            renderer
                .add_template(format, &source)
                .with_context(|| format!("Invalid template {}", path.display()))?;
            debug!(format, path = %path.display(), "Body template loaded");
        }
        Ok(renderer)
    }

    /// Add or replace the body template of `format`.
    pub fn add_template(&mut self, format: &str, source: &str) -> anyhow::Result<()> {
        let format = format.to_ascii_lowercase();
        self.env
            .add_template_owned(format!("{format}.body"), source.to_string())?;
        self.formats.insert(format);
        Ok(())
    }

    #[must_use]
    pub fn has_format(&self, format: &str) -> bool {
        self.formats.contains(format)
    }

    #[must_use]
    pub fn formats(&self) -> Vec<&str> {
        self.formats.iter().map(String::as_str).collect()
    }

    /// Render the final response. A template failure is logged and yields an empty 500.
    #[must_use]
    pub fn render(
        &self,
        format: &ResponseFormat,
        status: u16,
        body: Option<&Value>,
        accept_deflate: bool,
    ) -> Response {
        let mut response = Response::empty(status, format.as_str());
        if !renders_body(status) {
            return response;
        }

        let template = if self.has_format(format.as_str()) {
            format.as_str()
        } else {
            ResponseFormat::JSON
        };
        let ctx = BodyContext {
            body: body.cloned().unwrap_or(Value::Null),
            status,
            format: format.as_str().to_string(),
        };
        match self.render_body(template, ctx) {
            Ok(text) => {
                response.deflate = accept_deflate;
                response.body = Some(text);
                response
            }
            Err(e) => {
                error!(format = %format, template, error = %e, "Body rendering failed");
                Response::empty(500, format.as_str())
            }
        }
    }

    fn render_body(&self, template: &str, ctx: BodyContext) -> Result<String, minijinja::Error> {
        self.env
            .get_template(&format!("{template}.body"))?
            .render(TemplateValue::from_object(ctx))
    }
}

/// Template variables of one response.
#[derive(Debug)]
struct BodyContext {
    body: Value,
    status: u16,
    format: String,
}

impl Object for BodyContext {
    fn get_value(self: &Arc<Self>, key: &TemplateValue) -> Option<TemplateValue> {
        let value = match key.as_str()? {
            "body" => TemplateValue::from_serialize(&self.body),
            "json" => TemplateValue::from(self.body.to_string()),
            "text" => TemplateValue::from(text_of(&self.body)),
            "xml" => TemplateValue::from(xml_of(&self.body)),
            "rows" => TemplateValue::from(csv_rows(&self.body)),
            "status" => TemplateValue::from(self.status),
            "reason" => TemplateValue::from(reason_phrase(self.status)),
            "format" => TemplateValue::from(self.format.as_str()),
            _ => return None,
        };
        Some(value)
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

/// Element name for an object key: invalid characters become `_`.
fn xml_name(key: &str) -> String {
    let mut name: String = key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if !name.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
        name.insert(0, '_');
    }
    name
}

fn write_xml(out: &mut String, value: &Value) {
    match value {
        Value::Null => {}
        Value::String(s) => out.push_str(&xml_escape(s)),
        Value::Bool(_) | Value::Number(_) => out.push_str(&value.to_string()),
        Value::Array(items) => {
            for item in items {
                out.push_str("<item>");
                write_xml(out, item);
                out.push_str("</item>");
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                let tag = xml_name(key);
                out.push('<');
                out.push_str(&tag);
                out.push('>');
                write_xml(out, item);
                out.push_str("</");
                out.push_str(&tag);
                out.push('>');
            }
        }
    }
}

fn xml_of(value: &Value) -> String {
    let mut out = String::new();
    write_xml(&mut out, value);
    out
}

fn csv_text(raw: &str) -> String {
    if raw.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}

fn csv_cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => csv_text(s),
        Some(other) => csv_text(&other.to_string()),
    }
}

fn csv_line<'a, I: IntoIterator<Item = Option<&'a Value>>>(cells: I) -> String {
    cells.into_iter().map(csv_cell).collect::<Vec<_>>().join(",")
}

fn csv_header<'a, I: IntoIterator<Item = &'a String>>(keys: I) -> String {
    keys.into_iter()
        .map(|k| csv_text(k))
        .collect::<Vec<_>>()
        .join(",")
}

/// Objects become a header line plus one line each; arrays become one line each.
fn csv_rows(value: &Value) -> Vec<String> {
    match value {
        Value::Null => Vec::new(),
        Value::Array(items) => {
            let header: Option<Vec<&String>> = match items.first() {
                Some(Value::Object(first)) => Some(first.keys().collect()),
                _ => None,
            };
            let mut rows = Vec::with_capacity(items.len() + 1);
            if let Some(keys) = &header {
                rows.push(csv_header(keys.iter().copied()));
            }
            for item in items {
                let line = match (item, &header) {
                    (Value::Object(map), Some(keys)) => csv_line(keys.iter().map(|k| map.get(*k))),
                    (Value::Array(cells), _) => csv_line(cells.iter().map(Some)),
                    (other, _) => csv_cell(Some(other)),
                };
                rows.push(line);
            }
            rows
        }
        Value::Object(map) => vec![
            csv_header(map.keys()),
            csv_line(map.values().map(Some)),
        ],
        other => vec![csv_cell(Some(other))],
    }
}
