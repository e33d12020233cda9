//! Immutable route table: exact-match entries plus the dynamic segment trie.

use http::Method;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use super::trie::{ParamVec, SegmentTrie};
use crate::routes::{load_routes, RouteDef, RouteDescriptor, RouteEntry};

/// Loaded-once mapping from `(method, path)` to route entries.
///
/// Built through [`RouteTableBuilder`]; read-only afterwards and safe to share across threads
/// without synchronisation.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    exact: HashMap<Method, HashMap<String, RouteEntry>>,
    trie: SegmentTrie,
}

impl RouteTable {
    /// A table without entries: every request falls through to convention resolution.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn builder() -> RouteTableBuilder {
        RouteTableBuilder::default()
    }

    /// Compile route file definitions.
    pub fn from_defs(defs: Vec<RouteDef>) -> anyhow::Result<Self> {
        let mut builder = Self::builder();
        for def in defs {
            builder.add_def(def)?;
        }
        Ok(builder.build())
    }

    /// Load and compile a route file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let table = Self::from_defs(load_routes(path.as_ref())?)?;
        info!(
            routes_file = %path.as_ref().display(),
            static_routes = table.static_len(),
            dynamic_routes = table.dynamic_len(),
            "Route table loaded"
        );
        Ok(table)
    }

    /// Exact lookup of a `(method, path)` key.
    #[must_use]
    pub fn lookup_exact(&self, method: &Method, path: &str) -> Option<&RouteEntry> {
        self.exact.get(method)?.get(path)
    }

    /// Dynamic trie match.
    #[must_use]
    pub fn match_dynamic(&self, method: &Method, path: &str) -> Option<(Arc<RouteDescriptor>, ParamVec)> {
        self.trie.lookup(method, path)
    }

    #[must_use]
    pub fn static_len(&self) -> usize {
        self.exact.values().map(HashMap::len).sum()
    }

    #[must_use]
    pub fn dynamic_len(&self) -> usize {
        self.trie.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.static_len() == 0 && self.dynamic_len() == 0
    }

    /// Human-readable listing, one line per entry, sorted.
    #[must_use]
    pub fn dump(&self) -> Vec<String> {
        let mut lines = Vec::new();
        let mut methods: Vec<&Method> = self.exact.keys().collect();
        methods.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        for method in methods {
            let Some(entries) = self.exact.get(method) else {
                continue;
            };
            let mut paths: Vec<&String> = entries.keys().collect();
            paths.sort();
            for path in paths {
                let line = match entries.get(path) {
                    Some(RouteEntry::Redirect(target)) => {
                        format!("[static]  {method} {path} -> redirect {target}")
                    }
                    Some(RouteEntry::Handler(d)) => {
                        format!("[static]  {method} {path} -> {}::{}", d.handler, d.action)
                    }
                    None => continue,
                };
                lines.push(line);
            }
        }
        for (method, prefix, d) in self.trie.entries() {
            lines.push(format!(
                "[dynamic] {method} {prefix} +{} ({}) -> {}::{}",
                d.parameters.len(),
                d.parameters.join(", "),
                d.handler,
                d.action
            ));
        }
        lines
    }
}

/// Mutable builder for a [`RouteTable`]; duplicate keys are rejected.
#[derive(Debug, Default)]
pub struct RouteTableBuilder {
    table: RouteTable,
}

impl RouteTableBuilder {
    pub fn add_redirect(&mut self, method: Method, path: &str, target: &str) -> anyhow::Result<&mut Self> {
        self.add_exact(method, path, RouteEntry::Redirect(target.to_string()))
    }

    pub fn add_static(
        &mut self,
        method: Method,
        path: &str,
        descriptor: RouteDescriptor,
    ) -> anyhow::Result<&mut Self> {
        self.add_exact(method, path, RouteEntry::Handler(Arc::new(descriptor)))
    }

    /// Register a dynamic route under `prefix`; arity is `descriptor.parameters.len()`.
    ///
    /// A descriptor without a `uri` gets the prefix as its canonical URI.
    pub fn add_dynamic(
        &mut self,
        method: Method,
        prefix: &str,
        mut descriptor: RouteDescriptor,
    ) -> anyhow::Result<&mut Self> {
        if descriptor.uri.is_none() {
            descriptor.uri = Some(prefix.to_string());
        }
        let arity = descriptor.parameters.len();
        if let Err(existing) = self
            .table
            .trie
            .insert(method.clone(), prefix, Arc::new(descriptor))
        {
            anyhow::bail!(
                "duplicate dynamic route {method} {prefix} with {arity} parameter(s), already bound to {}::{}",
                existing.handler,
                existing.action
            );
        }
        Ok(self)
    }

    /// Add one route file definition.
    pub fn add_def(&mut self, def: RouteDef) -> anyhow::Result<&mut Self> {
        let method = def.http_method()?;
        if let Some(target) = &def.redirect {
            return self.add_redirect(method, &def.path, target);
        }
        let descriptor = def
            .descriptor()
            .ok_or_else(|| anyhow::anyhow!("route {} {} has no handler", def.method, def.path))?;
        if def.is_dynamic() {
            self.add_dynamic(method, &def.path, descriptor)
        } else {
            self.add_static(method, &def.path, descriptor)
        }
    }

    fn add_exact(&mut self, method: Method, path: &str, entry: RouteEntry) -> anyhow::Result<&mut Self> {
        let slot = self.table.exact.entry(method.clone()).or_default();
        if slot.contains_key(path) {
            anyhow::bail!("duplicate static route {method} {path}");
        }
        slot.insert(path.to_string(), entry);
        Ok(self)
    }

    #[must_use]
    pub fn build(self) -> RouteTable {
        self.table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::HandlerId;

    #[test]
    fn test_duplicate_static_rejected() {
        let mut b = RouteTable::builder();
        b.add_redirect(Method::GET, "/a", "/b").unwrap();
        assert!(b.add_redirect(Method::GET, "/a", "/c").is_err());
        assert!(b.add_redirect(Method::POST, "/a", "/c").is_ok());
        assert_eq!(b.build().static_len(), 2);
    }

    #[test]
    fn test_dynamic_without_uri_gets_prefix() {
        let mut b = RouteTable::builder();
        b.add_dynamic(
            Method::GET,
            "/user",
            RouteDescriptor::new(HandlerId::new("/", "User"), "show").with_parameters(["id"]),
        )
        .unwrap();
        let table = b.build();
        let (d, _) = table.match_dynamic(&Method::GET, "/user/3").unwrap();
        assert_eq!(d.uri.as_deref(), Some("/user"));
    }

    #[test]
    fn test_dump_lists_everything() {
        let mut b = RouteTable::builder();
        b.add_redirect(Method::GET, "/old", "/new").unwrap();
        b.add_dynamic(
            Method::GET,
            "/user",
            RouteDescriptor::new(HandlerId::new("/", "User"), "show").with_parameters(["id"]),
        )
        .unwrap();
        let lines = b.build().dump();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("redirect /new"));
        assert!(lines[1].contains("/User::show"));
    }
}
