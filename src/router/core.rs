//! Route resolver - turns `(method, path)` into a handler identity.
//!
//! Resolution order:
//!
//! 1. `/` resolves to the configured default handler and action, without consulting the table.
//! 2. Exact match in the static table. A redirect entry is followed once; a handler entry
//!    wins over anything the trie or the naming convention could produce.
//! 3. Dynamic match in the segment trie, binding trailing segments to parameter names.
//! 4. Naming convention: `/ns/user-profile/show-all` → handler `/ns/UserProfile`, action
//!    `showAll`. Never fails; existence is checked by the handler registry.

use arc_swap::ArcSwap;
use http::Method;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::table::RouteTable;
use super::trie::ParamVec;
use crate::request::{merge_query, split_format_suffix, Parameters};
use crate::routes::{HandlerId, RouteDescriptor, RouteEntry};
use serde_json::Value;

/// Where a resolution came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteSource {
    Default,
    Static,
    Dynamic,
    Convention,
}

/// Handler identity plus everything the route contributed to the request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedRoute {
    pub handler: HandlerId,
    /// lowerCamelCase action name (`createUser`)
    pub action: String,
    /// Canonical URI used to look up form schemas and aspect plans (`/faq/index`)
    pub uri: String,
    /// Parameters contributed by the route: bound path segments and query strings embedded in
    /// entry URIs or redirect targets. They override request parameters on merge.
    pub parameters: Parameters,
    pub source: RouteSource,
}

/// Outcome of [`RouteResolver::resolve`].
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Default handler, static or dynamic table entry
    Matched(ResolvedRoute),
    /// Identity derived from the path by naming convention
    Convention(ResolvedRoute),
}

impl Resolution {
    #[must_use]
    pub fn route(&self) -> &ResolvedRoute {
        match self {
            Resolution::Matched(r) | Resolution::Convention(r) => r,
        }
    }

    #[must_use]
    pub fn into_route(self) -> ResolvedRoute {
        match self {
            Resolution::Matched(r) | Resolution::Convention(r) => r,
        }
    }

    #[must_use]
    pub fn is_convention(&self) -> bool {
        matches!(self, Resolution::Convention(_))
    }
}

/// Paths the resolver refuses to interpret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingError {
    /// The path holds an empty segment before its last one (`/a//b`)
    EmptySegment { path: String },
}

impl fmt::Display for RoutingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutingError::EmptySegment { path } => {
                write!(f, "path contains an empty segment: {path}")
            }
        }
    }
}

impl std::error::Error for RoutingError {}

/// Resolves request paths against a (hot-swappable) [`RouteTable`].
#[derive(Clone)]
pub struct RouteResolver {
    table: Arc<ArcSwap<RouteTable>>,
    default_handler: HandlerId,
    default_action: String,
}

impl RouteResolver {
    /// Resolver over a fixed table with `/Index::index` as default.
    #[must_use]
    pub fn new(table: RouteTable) -> Self {
        Self::shared(Arc::new(ArcSwap::from_pointee(table)))
    }

    /// Resolver over a table that may be swapped at runtime (see [`crate::hot_reload`]).
    #[must_use]
    pub fn shared(table: Arc<ArcSwap<RouteTable>>) -> Self {
        Self {
            table,
            default_handler: HandlerId::default(),
            default_action: "index".to_string(),
        }
    }

    #[must_use]
    pub fn with_default(mut self, handler: HandlerId, action: &str) -> Self {
        self.default_handler = handler;
        self.default_action = action.to_string();
        self
    }

    /// Handle to the table slot, for hot reload.
    #[must_use]
    pub fn table_handle(&self) -> Arc<ArcSwap<RouteTable>> {
        Arc::clone(&self.table)
    }

    /// Snapshot of the current table.
    #[must_use]
    pub fn table(&self) -> Arc<RouteTable> {
        self.table.load_full()
    }

    /// Resolve a request path. Query strings and `,format` suffixes are ignored.
    pub fn resolve(&self, method: &Method, path: &str) -> Result<Resolution, RoutingError> {
        let path = path.split('?').next().unwrap_or_default();
        let (path, _) = split_format_suffix(path);

        debug!(method = %method, path = %path, "Route resolution attempt");
        let start = Instant::now();

        if path.is_empty() || path == "/" {
            return Ok(Resolution::Matched(self.default_route()));
        }

        let owned;
        let path = if path.starts_with('/') {
            path
        } else {
            owned = format!("/{path}");
            owned.as_str()
        };
        reject_empty_segments(path)?;

        let table = self.table.load();
        let mut extra = Parameters::new();
        let mut current = path.to_string();

        for hop in 0..2 {
            match table.lookup_exact(method, &current) {
                Some(RouteEntry::Redirect(target)) if hop == 0 => {
                    let target_path = strip_query_into(target, &mut extra);
                    debug!(from = %current, to = %target_path, "Following route redirect");
                    current = target_path;
                }
                Some(RouteEntry::Redirect(target)) => {
                    warn!(
                        method = %method,
                        path = %current,
                        target = %target,
                        "Redirect chain exceeds one hop; not followed"
                    );
                    break;
                }
                Some(RouteEntry::Handler(d)) => {
                    let route = self.static_route(d, &current, extra);
                    log_match(method, path, &route, start);
                    return Ok(Resolution::Matched(route));
                }
                None => break,
            }
        }

        if let Some((d, bound)) = table.match_dynamic(method, &current) {
            let route = dynamic_route(&d, bound, extra);
            log_match(method, path, &route, start);
            return Ok(Resolution::Matched(route));
        }

        let route = self.convention_route(&current, extra);
        debug!(
            method = %method,
            path = %path,
            handler = %route.handler,
            action = %route.action,
            duration_us = start.elapsed().as_micros() as u64,
            "No table entry; resolved by convention"
        );
        Ok(Resolution::Convention(route))
    }

    fn default_route(&self) -> ResolvedRoute {
        ResolvedRoute {
            handler: self.default_handler.clone(),
            action: lower_camel(&self.default_action),
            uri: format!("/{}", self.default_action),
            parameters: Parameters::new(),
            source: RouteSource::Default,
        }
    }

    fn static_route(&self, d: &RouteDescriptor, path: &str, mut extra: Parameters) -> ResolvedRoute {
        let action = lower_camel(&d.action);
        let uri = match d.uri.as_deref() {
            Some(uri) => strip_query_into(uri, &mut extra),
            None => index_uri(path, &d.action),
        };
        ResolvedRoute {
            handler: d.handler.clone(),
            action,
            uri,
            parameters: extra,
            source: RouteSource::Static,
        }
    }

    fn convention_route(&self, path: &str, extra: Parameters) -> ResolvedRoute {
        // t[0] is the empty string before the leading slash
        let t: Vec<&str> = path.split('/').collect();
        let n = t.len() - 1;

        let raw_action = if t[n].is_empty() { "index" } else { t[n] };
        let handler = if n > 1 {
            let name = upper_camel(t[n - 1]);
            let namespace = t[1..n - 1].join("/");
            HandlerId::new(&namespace, &name)
        } else {
            self.default_handler.clone()
        };

        ResolvedRoute {
            handler,
            action: lower_camel(raw_action),
            uri: index_uri(path, raw_action),
            parameters: extra,
            source: RouteSource::Convention,
        }
    }
}

fn dynamic_route(d: &RouteDescriptor, bound: ParamVec, mut extra: Parameters) -> ResolvedRoute {
    let uri = match d.uri.as_deref() {
        Some(uri) => strip_query_into(uri, &mut extra),
        None => String::from("/"),
    };
    for (name, value) in bound {
        extra.insert(name, Value::String(value));
    }
    ResolvedRoute {
        handler: d.handler.clone(),
        action: lower_camel(&d.action),
        uri,
        parameters: extra,
        source: RouteSource::Dynamic,
    }
}

fn log_match(method: &Method, path: &str, route: &ResolvedRoute, start: Instant) {
    info!(
        method = %method,
        path = %path,
        handler = %route.handler,
        action = %route.action,
        uri = %route.uri,
        source = ?route.source,
        duration_us = start.elapsed().as_micros() as u64,
        "Route matched"
    );
}

fn reject_empty_segments(path: &str) -> Result<(), RoutingError> {
    let segments: Vec<&str> = path[1..].split('/').collect();
    let interior = &segments[..segments.len().saturating_sub(1)];
    if interior.iter().any(|s| s.is_empty()) {
        return Err(RoutingError::EmptySegment {
            path: path.to_string(),
        });
    }
    Ok(())
}

/// Split `uri?query`, merging the query into `params`; returns the bare URI.
fn strip_query_into(uri: &str, params: &mut Parameters) -> String {
    match uri.split_once('?') {
        Some((bare, query)) => {
            merge_query(params, query);
            bare.to_string()
        }
        None => uri.to_string(),
    }
}

/// `/faq/` with the index action becomes `/faq/index`.
fn index_uri(path: &str, action: &str) -> String {
    if action == "index" && path.ends_with('/') {
        format!("{path}index")
    } else {
        path.to_string()
    }
}

/// `user-profile` → `UserProfile`.
#[must_use]
pub fn upper_camel(segment: &str) -> String {
    segment
        .split('-')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// `create-user` → `createUser`.
#[must_use]
pub fn lower_camel(segment: &str) -> String {
    let upper = upper_camel(segment);
    let mut chars = upper.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}
