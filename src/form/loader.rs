use http::Method;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use super::schema::FieldSchema;
use crate::cache::DocumentCache;
use crate::request::method_key;
use crate::routes::{find_document, read_document};

/// Supplies the form schema for a canonical URI and method; `None` means no validation.
pub trait FormSchemaLoader: Send + Sync {
    fn load(&self, uri: &str, method: &Method) -> anyhow::Result<Option<Arc<FieldSchema>>>;

    /// Forget cached documents after the files changed.
    fn clear_cache(&self) {}
}

/// Loads `<form_dir><uri>,<method>.form.<ext>` documents, caching results per key.
///
/// `/user/create` with `POST` reads `form_dir/user/create,post.form.yaml` (or `.yml`, `.json`,
/// `.toml`). Missing files are cached as "no schema". The cache is an LRU of
/// [`DEFAULT_CAPACITY`](crate::cache::DEFAULT_CAPACITY) entries unless built
/// [`with_capacity`](Self::with_capacity).
#[derive(Debug)]
pub struct FileFormLoader {
    root: PathBuf,
    cache: DocumentCache<(String, String), Option<Arc<FieldSchema>>>,
}

impl FileFormLoader {
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

    /// Number of `(uri, method)` answers currently cached.
    #[must_use]
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// Path stem (without extension) of the document for `(uri, method)`.
    #[must_use]
    pub fn stem(&self, uri: &str, method: &Method) -> PathBuf {
        self.root.join(format!(
            "{},{}.form",
            uri.trim_start_matches('/'),
            method_key(method)
        ))
    }

    /// Parse every form document under the root; used by the CLI `check` command.
    pub fn check_all(&self) -> anyhow::Result<usize> {
        let mut checked = 0;
        for path in documents_under(&self.root, ".form.")? {
            let schema: FieldSchema = read_document(&path)?;
            schema.check()?;
            checked += 1;
        }
        Ok(checked)
    }
}

impl FormSchemaLoader for FileFormLoader {
    fn load(&self, uri: &str, method: &Method) -> anyhow::Result<Option<Arc<FieldSchema>>> {
        let key = (uri.to_string(), method_key(method));
        self.cache.get_or_load(key, || {
            let Some(path) = find_document(&self.stem(uri, method)) else {
                return Ok(None);
            };
            let schema: FieldSchema = read_document(&path)?;
            schema.check()?;
            debug!(uri = %uri, method = %method, file = %path.display(), fields = schema.fields.len(), "Form schema loaded");
            Ok(Some(Arc::new(schema)))
        })
    }

    fn clear_cache(&self) {
        self.cache.clear();
    }
}

/// In-memory schemas keyed by `(uri, method)`.
#[derive(Debug, Default)]
pub struct MemoryFormLoader {
    forms: HashMap<(String, String), Arc<FieldSchema>>,
}

impl MemoryFormLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, uri: &str, method: &Method, schema: FieldSchema) -> Self {
        self.forms
            .insert((uri.to_string(), method_key(method)), Arc::new(schema));
        self
    }
}

impl FormSchemaLoader for MemoryFormLoader {
    fn load(&self, uri: &str, method: &Method) -> anyhow::Result<Option<Arc<FieldSchema>>> {
        Ok(self
            .forms
            .get(&(uri.to_string(), method_key(method)))
            .cloned())
    }
}

/// All files below `root` whose name contains `marker` (e.g. `.form.`).
pub(crate) fn documents_under(root: &Path, marker: &str) -> anyhow::Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    if !root.is_dir() {
        return Ok(found);
    }
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.contains(marker))
            {
                found.push(path);
            }
        }
    }
    found.sort();
    Ok(found)
}
