use http::Method;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Identity of a business-object handler: namespace path plus class-like name.
///
/// The path always starts and ends with `/` (`/`, `/admin/`, `/admin/users/`), the name is
/// UpperCamelCase (`Index`, `UserProfile`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HandlerId {
    pub path: String,
    pub name: String,
}

impl HandlerId {
    #[must_use]
    pub fn new(path: &str, name: &str) -> Self {
        Self {
            path: normalize_namespace(path),
            name: name.to_string(),
        }
    }
}

impl Default for HandlerId {
    fn default() -> Self {
        Self::new("/", "Index")
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.path, self.name)
    }
}

/// Force a namespace path into the `/a/b/` shape.
#[must_use]
pub fn normalize_namespace(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{trimmed}/")
    }
}

/// A handler entry of the route table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDescriptor {
    pub handler: HandlerId,
    pub action: String,
    /// Literal URI override; may carry a `?query` that is merged into the parameters
    pub uri: Option<String>,
    /// Names bound, in order, to the trailing path segments of a dynamic match
    pub parameters: Vec<String>,
}

impl RouteDescriptor {
    #[must_use]
    pub fn new(handler: HandlerId, action: &str) -> Self {
        Self {
            handler,
            action: action.to_string(),
            uri: None,
            parameters: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_uri(mut self, uri: &str) -> Self {
        self.uri = Some(uri.to_string());
        self
    }

    #[must_use]
    pub fn with_parameters<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parameters = names.into_iter().map(Into::into).collect();
        self
    }
}

/// Value stored under an exact `(method, path)` key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteEntry {
    /// Plain path the request is re-resolved against
    Redirect(String),
    Handler(Arc<RouteDescriptor>),
}

/// Handler reference as written in a route file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerRef {
    pub name: String,
    #[serde(default = "root_path")]
    pub path: String,
    #[serde(default = "index_action")]
    pub action: String,
}

fn root_path() -> String {
    "/".to_string()
}

fn index_action() -> String {
    "index".to_string()
}

/// One entry of a route file.
///
/// Exactly one of `redirect` and `handler` must be present. An entry is dynamic when it
/// declares `parameters` or sets `dynamic: true`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteDef {
    pub method: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handler: Option<HandlerRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Vec<String>>,
    #[serde(default)]
    pub dynamic: bool,
}

impl RouteDef {
    /// Parse the declared method into an [`http::Method`].
    pub fn http_method(&self) -> anyhow::Result<Method> {
        Method::from_bytes(self.method.trim().to_ascii_uppercase().as_bytes())
            .map_err(|e| anyhow::anyhow!("invalid method '{}' for {}: {e}", self.method, self.path))
    }

    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        self.dynamic || self.parameters.is_some()
    }

    /// Build the descriptor for a handler entry; `None` for redirects.
    #[must_use]
    pub fn descriptor(&self) -> Option<RouteDescriptor> {
        let h = self.handler.as_ref()?;
        Some(RouteDescriptor {
            handler: HandlerId::new(&h.path, &h.name),
            action: h.action.clone(),
            uri: self.uri.clone(),
            parameters: self.parameters.clone().unwrap_or_default(),
        })
    }
}

/// Top-level document of a route file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteFile {
    #[serde(default)]
    pub routes: Vec<RouteDef>,
}
