//! Aspect plans: ordered method invocations woven around a handler's action.
//!
//! A plan file lives at `<aop_dir><uri>.aop.<ext>` and maps lower-case request methods to step
//! lists:
//!
//! ```yaml
//! post:
//!   - name: checkParameters
//!   - name: save
//!     arguments: [draft, 3]
//!   - name: notify
//! ```
//!
//! A method key that is present with an empty list is still a plan: the request counts as
//! handled without running anything.

use http::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::cache::DocumentCache;
use crate::form::documents_under;
use crate::request::method_key;
use crate::routes::{find_document, read_document};

/// One method invocation of a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AopStep {
    pub name: String,
    /// `None` invokes the method without arguments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Vec<Value>>,
}

impl AopStep {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            arguments: None,
        }
    }

    #[must_use]
    pub fn with_arguments(mut self, arguments: Vec<Value>) -> Self {
        self.arguments = Some(arguments);
        self
    }

    #[must_use]
    pub fn arguments(&self) -> &[Value] {
        self.arguments.as_deref().unwrap_or(&[])
    }
}

/// Ordered steps for one `(uri, method)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AopPlan {
    pub steps: Vec<AopStep>,
}

impl AopPlan {
    #[must_use]
    pub fn new(steps: Vec<AopStep>) -> Self {
        Self { steps }
    }
}

/// Plan file contents: method key to plan.
pub type AopDocument = BTreeMap<String, AopPlan>;

/// Supplies the aspect plan for a canonical URI and method, if any.
pub trait AopPlanLoader: Send + Sync {
    fn load(&self, uri: &str, method: &Method) -> anyhow::Result<Option<Arc<AopPlan>>>;

    fn clear_cache(&self) {}
}

/// Reads plan documents from a directory, caching each parsed document by URI in a bounded
/// LRU.
#[derive(Debug)]
pub struct FileAopLoader {
    root: PathBuf,
    cache: DocumentCache<String, Option<Arc<HashMap<String, Arc<AopPlan>>>>>,
}

impl FileAopLoader {
    #[must_use]
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            cache: DocumentCache::default(),
        }
    }

    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.cache = DocumentCache::new(capacity);
        self
    }

    /// Number of URIs whose plan document (or its absence) is cached.
    #[must_use]
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    fn document(&self, uri: &str) -> anyhow::Result<Option<Arc<HashMap<String, Arc<AopPlan>>>>> {
        self.cache.get_or_load(uri.to_string(), || {
            let stem = self
                .root
                .join(format!("{}.aop", uri.trim_start_matches('/')));
            let Some(path) = find_document(&stem) else {
                return Ok(None);
            };
            let raw: AopDocument = read_document(&path)?;
            debug!(uri = %uri, file = %path.display(), methods = raw.len(), "Aspect plan loaded");
            Ok(Some(Arc::new(normalize(raw))))
        })
    }

    /// Parse every plan document under the root; used by the CLI `check` command.
    pub fn check_all(&self) -> anyhow::Result<usize> {
        let mut checked = 0;
        for path in documents_under(&self.root, ".aop.")? {
            let _: AopDocument = read_document(&path)?;
            checked += 1;
        }
        Ok(checked)
    }
}

impl AopPlanLoader for FileAopLoader {
    fn load(&self, uri: &str, method: &Method) -> anyhow::Result<Option<Arc<AopPlan>>> {
        Ok(self
            .document(uri)?
            .and_then(|doc| doc.get(&method_key(method)).cloned()))
    }

    fn clear_cache(&self) {
        self.cache.clear();
    }
}

fn normalize(raw: AopDocument) -> HashMap<String, Arc<AopPlan>> {
    raw.into_iter()
        .map(|(method, plan)| (method.to_ascii_lowercase(), Arc::new(plan)))
        .collect()
}

/// In-memory plans keyed by `(uri, method)`.
#[derive(Debug, Default)]
pub struct MemoryAopLoader {
    plans: HashMap<(String, String), Arc<AopPlan>>,
}

impl MemoryAopLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, uri: &str, method: &Method, plan: AopPlan) -> Self {
        self.plans
            .insert((uri.to_string(), method_key(method)), Arc::new(plan));
        self
    }
}

impl AopPlanLoader for MemoryAopLoader {
    fn load(&self, uri: &str, method: &Method) -> anyhow::Result<Option<Arc<AopPlan>>> {
        Ok(self
            .plans
            .get(&(uri.to_string(), method_key(method)))
            .cloned())
    }
}
