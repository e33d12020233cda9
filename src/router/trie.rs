//! Segment trie for dynamic routes.
//!
//! Dynamic routes are stored under the literal segments of their prefix. Instead of
//! `{param}` placeholder nodes, every node carries an *arity table*: `k → descriptor` meaning
//! "a request that stops here with exactly `k` unconsumed trailing segments binds them to the
//! descriptor's `k` parameter names".
//!
//! ```text
//! GET /user        k=1  → User::show(id)
//! GET /user        k=2  → User::compare(left, right)
//! GET /user/list   k=0  → User::list()
//!
//! get ─ "user" ─ {1: show, 2: compare}
//!              └ "list" ─ {0: list}
//! ```
//!
//! Lookup walks the method's sub-tree while segments match child keys, stops at the last
//! matching node and counts what is left. Segment keys and arities live in separate maps, so a
//! numeric segment such as `/user/2` can never be mistaken for an arity.

use http::Method;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::sync::Arc;

use crate::routes::RouteDescriptor;

/// Maximum number of bound parameters before heap allocation.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Bound `(name, value)` pairs, in declaration order.
pub type ParamVec = SmallVec<[(String, String); MAX_INLINE_PARAMS]>;

#[derive(Debug, Clone, Default)]
struct TrieNode {
    children: HashMap<Box<str>, TrieNode>,
    arities: HashMap<usize, Arc<RouteDescriptor>>,
}

impl TrieNode {
    fn insert(&mut self, segments: &[&str], descriptor: Arc<RouteDescriptor>) -> Result<(), Arc<RouteDescriptor>> {
        match segments.split_first() {
            None => {
                let arity = descriptor.parameters.len();
                match self.arities.get(&arity) {
                    Some(existing) => Err(Arc::clone(existing)),
                    None => {
                        self.arities.insert(arity, descriptor);
                        Ok(())
                    }
                }
            }
            Some((head, rest)) => self
                .children
                .entry(Box::from(*head))
                .or_default()
                .insert(rest, descriptor),
        }
    }

    fn count(&self) -> usize {
        self.arities.len() + self.children.values().map(TrieNode::count).sum::<usize>()
    }

    fn collect(&self, prefix: &str, out: &mut Vec<(String, Arc<RouteDescriptor>)>) {
        let mut arities: Vec<_> = self.arities.iter().collect();
        arities.sort_by_key(|(k, _)| **k);
        for (_, d) in arities {
            let shown = if prefix.is_empty() { "/" } else { prefix };
            out.push((shown.to_string(), Arc::clone(d)));
        }
        let mut keys: Vec<_> = self.children.keys().collect();
        keys.sort();
        for key in keys {
            if let Some(child) = self.children.get(key) {
                child.collect(&format!("{prefix}/{key}"), out);
            }
        }
    }
}

/// Per-method segment trie.
#[derive(Debug, Clone, Default)]
pub struct SegmentTrie {
    roots: HashMap<Method, TrieNode>,
}

impl SegmentTrie {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a descriptor under `prefix`; its arity is the number of declared parameters.
    ///
    /// Returns the already-registered descriptor when `(method, prefix, arity)` is taken.
    pub fn insert(
        &mut self,
        method: Method,
        prefix: &str,
        descriptor: Arc<RouteDescriptor>,
    ) -> Result<(), Arc<RouteDescriptor>> {
        let segments: Vec<&str> = prefix.split('/').filter(|s| !s.is_empty()).collect();
        self.roots
            .entry(method)
            .or_default()
            .insert(&segments, descriptor)
    }

    /// Match `path` (must start with `/`, no interior empty segments).
    ///
    /// The trailing empty segment produced by a final `/` is not counted as a parameter.
    #[must_use]
    pub fn lookup(&self, method: &Method, path: &str) -> Option<(Arc<RouteDescriptor>, ParamVec)> {
        let root = self.roots.get(method)?;
        // t[0] is the empty string before the leading slash
        let t: SmallVec<[&str; 16]> = path.split('/').collect();
        let n = t.len().checked_sub(1)?;

        let mut node = root;
        let mut i = 1;
        while i <= n {
            match node.children.get(t[i]) {
                Some(child) => {
                    node = child;
                    i += 1;
                }
                None => break,
            }
        }

        let shift = usize::from(!t[n].is_empty());
        let k = (n + shift).checked_sub(i)?;
        let descriptor = node.arities.get(&k)?;

        let start = n + shift - k;
        let params = descriptor
            .parameters
            .iter()
            .zip(&t[start..start + k])
            .map(|(name, raw)| {
                let value = urlencoding::decode(raw)
                    .map(|v| v.into_owned())
                    .unwrap_or_else(|_| (*raw).to_string());
                (name.clone(), value)
            })
            .collect();

        Some((Arc::clone(descriptor), params))
    }

    /// Number of dynamic routes stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.roots.values().map(TrieNode::count).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All dynamic routes as `(method, prefix, descriptor)`, sorted for stable output.
    #[must_use]
    pub fn entries(&self) -> Vec<(Method, String, Arc<RouteDescriptor>)> {
        let mut methods: Vec<&Method> = self.roots.keys().collect();
        methods.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        let mut out = Vec::new();
        for method in methods {
            let mut found = Vec::new();
            if let Some(root) = self.roots.get(method) {
                root.collect("", &mut found);
            }
            out.extend(found.into_iter().map(|(p, d)| (method.clone(), p, d)));
        }
        out
    }
}
