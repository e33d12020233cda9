//! # Request Context
//!
//! [`RequestContext`] is the immutable-after-merge view of one inbound request: method, path,
//! negotiated response format, merged parameters and the `deflate` accept flag.
//!
//! ## Parameter merge
//!
//! Query-string parameters are merged first, body parameters second, so the body wins on a key
//! collision. Keys written PHP-style with a trailing `[]` (`tag[]=a&tag[]=b`) collect into
//! arrays.
//!
//! ## Format suffix
//!
//! A path may select its response format with a `,<format>` suffix:
//!
//! ```rust
//! use bodispatch::request::split_format_suffix;
//!
//! assert_eq!(split_format_suffix("/faq/index,xml"), ("/faq/index", Some("xml")));
//! assert_eq!(split_format_suffix("/faq/"), ("/faq/", None));
//! ```

use crate::ids::RequestId;
use http::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Merged request parameters, keyed by name.
///
/// Values stay `serde_json::Value` so that the form validator can coerce numbers and apply
/// defaults in place.
pub type Parameters = BTreeMap<String, Value>;

/// Negotiated response format (`json`, `xml`, `csv`, `text`, ...), always lower case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResponseFormat(String);

impl ResponseFormat {
    pub const JSON: &'static str = "json";

    #[must_use]
    pub fn new(name: &str) -> Self {
        let name = name.trim();
        if name.is_empty() {
            return Self::default();
        }
        Self(name.to_ascii_lowercase())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ResponseFormat {
    fn default() -> Self {
        Self(Self::JSON.to_string())
    }
}

impl fmt::Display for ResponseFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Body carried by a request, before it is merged into [`Parameters`].
#[derive(Debug, Clone, PartialEq)]
pub enum RawBody {
    /// `application/x-www-form-urlencoded` text
    Form(String),
    /// An already-decoded JSON object
    Json(Map<String, Value>),
}

/// Unparsed request inputs as handed over by the transport layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawParameters {
    /// Query string without the leading `?`
    pub query: Option<String>,
    pub body: Option<RawBody>,
    /// Value of the `Accept-Encoding` header
    pub accept_encoding: Option<String>,
    /// Upstream correlation id (`X-Request-Id`)
    pub request_id: Option<String>,
}

impl RawParameters {
    #[must_use]
    pub fn query(query: &str) -> Self {
        Self {
            query: Some(query.to_string()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn form(body: &str) -> Self {
        Self {
            body: Some(RawBody::Form(body.to_string())),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_body(mut self, body: RawBody) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn with_accept_encoding(mut self, header: &str) -> Self {
        self.accept_encoding = Some(header.to_string());
        self
    }

    #[must_use]
    pub fn with_request_id(mut self, id: &str) -> Self {
        self.request_id = Some(id.to_string());
        self
    }
}

/// One inbound request, created once and immutable after the parameter merge except
/// through [`RequestContext::parameters_mut`].
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: RequestId,
    pub method: Method,
    /// Request path with query string and format suffix removed
    pub path: String,
    pub format: ResponseFormat,
    parameters: Parameters,
    pub accept_encoding: bool,
}

impl RequestContext {
    /// Build a context from a raw request target (`/path,fmt?query`) and raw inputs.
    #[must_use]
    pub fn new(method: Method, target: &str, raw: RawParameters) -> Self {
        let (path, target_query) = match target.split_once('?') {
            Some((p, q)) => (p, Some(q)),
            None => (target, None),
        };
        let (path, format) = split_format_suffix(path);
        let path = if path.is_empty() { "/" } else { path };

        let mut parameters = Parameters::new();
        if let Some(q) = target_query {
            merge_query(&mut parameters, q);
        }
        if let Some(q) = raw.query.as_deref() {
            merge_query(&mut parameters, q);
        }
        match raw.body {
            Some(RawBody::Form(text)) => merge_query(&mut parameters, &text),
            Some(RawBody::Json(map)) => parameters.extend(map),
            None => {}
        }

        let accept_encoding = raw
            .accept_encoding
            .as_deref()
            .is_some_and(|h| h.to_ascii_lowercase().contains("deflate"));

        Self {
            request_id: RequestId::from_header_or_new(raw.request_id.as_deref()),
            method,
            path: path.to_string(),
            format: format.map(ResponseFormat::new).unwrap_or_default(),
            parameters,
            accept_encoding,
        }
    }

    #[must_use]
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn parameters_mut(&mut self) -> &mut Parameters {
        &mut self.parameters
    }

    /// Get a parameter rendered as a string slice, if it is a JSON string.
    #[must_use]
    pub fn param_str(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).and_then(Value::as_str)
    }

    /// Lower-case method name used as key in method-indexed tables (`get`, `post`, ...).
    #[must_use]
    pub fn method_key(&self) -> String {
        method_key(&self.method)
    }
}

/// Lower-case name of an HTTP method.
#[must_use]
pub fn method_key(method: &Method) -> String {
    method.as_str().to_ascii_lowercase()
}

/// Split a trailing `,<format>` selector off a path.
#[must_use]
pub fn split_format_suffix(path: &str) -> (&str, Option<&str>) {
    match path.split_once(',') {
        Some((p, fmt)) if !fmt.is_empty() => (p, Some(fmt)),
        Some((p, _)) => (p, None),
        None => (path, None),
    }
}

/// Parse a urlencoded string into ordered `(key, value)` pairs.
#[must_use]
pub fn parse_query(query: &str) -> Vec<(String, String)> {
    url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

/// Merge a urlencoded string into `params`; later keys override earlier ones, `key[]`
/// entries accumulate into an array under `key`.
pub fn merge_query(params: &mut Parameters, query: &str) {
    let mut arrays: BTreeMap<String, Vec<Value>> = BTreeMap::new();
    for (key, value) in parse_query(query) {
        if key.is_empty() {
            continue;
        }
        if let Some(base) = key.strip_suffix("[]") {
            arrays
                .entry(base.to_string())
                .or_default()
                .push(Value::String(value));
        } else {
            params.insert(key, Value::String(value));
        }
    }
    for (key, values) in arrays {
        params.insert(key, Value::Array(values));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_body_overrides_query() {
        let raw = RawParameters::query("a=1&b=2").with_body(RawBody::Form("b=3&c=4".into()));
        let ctx = RequestContext::new(Method::POST, "/x", raw);
        assert_eq!(ctx.param_str("a"), Some("1"));
        assert_eq!(ctx.param_str("b"), Some("3"));
        assert_eq!(ctx.param_str("c"), Some("4"));
    }

    #[test]
    fn test_target_query_and_format_suffix() {
        let ctx = RequestContext::new(Method::GET, "/faq/index,XML?page=2", RawParameters::default());
        assert_eq!(ctx.path, "/faq/index");
        assert_eq!(ctx.format.as_str(), "xml");
        assert_eq!(ctx.param_str("page"), Some("2"));
    }

    #[test]
    fn test_default_format_is_json() {
        let ctx = RequestContext::new(Method::GET, "/", RawParameters::default());
        assert_eq!(ctx.format.as_str(), "json");
        assert_eq!(ctx.method_key(), "get");
    }

    #[test]
    fn test_array_keys_accumulate() {
        let mut params = Parameters::new();
        merge_query(&mut params, "tag[]=a&tag[]=b&name=x%20y");
        assert_eq!(params["tag"], json!(["a", "b"]));
        assert_eq!(params["name"], json!("x y"));
    }

    #[test]
    fn test_accept_encoding_flag() {
        let raw = RawParameters::default().with_accept_encoding("gzip, Deflate");
        let ctx = RequestContext::new(Method::GET, "/", raw);
        assert!(ctx.accept_encoding);
    }

    #[test]
    fn test_json_body_merges() {
        let mut map = Map::new();
        map.insert("n".into(), json!(5));
        let raw = RawParameters::query("n=1").with_body(RawBody::Json(map));
        let ctx = RequestContext::new(Method::PUT, "/x", raw);
        assert_eq!(ctx.parameters()["n"], json!(5));
    }
}
