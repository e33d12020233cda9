//! # Hot Reload Module
//!
//! Live reloading of the route table without restarting the service.
//!
//! [`watch_routes`] watches the route file and, on every modify/create event:
//!
//! 1. reads the file once and hashes it (SHA-256); unchanged content is skipped,
//! 2. parses and compiles a new [`RouteTable`] from that same content,
//! 3. swaps it into the shared slot; in-flight requests keep the table they loaded,
//! 4. runs the `on_reload` hook (the service clears its form and aspect-plan caches there).
//!
//! A file that fails to parse is logged and the previous table stays active.
//!
//! ```rust,ignore
//! let watcher = bodispatch::hot_reload::watch_routes(
//!     "routes.yaml",
//!     resolver.table_handle(),
//!     |table| println!("{} routes", table.static_len() + table.dynamic_len()),
//! )?;
//! // the watcher stops when dropped
//! ```

use anyhow::Context;
use arc_swap::ArcSwap;
use notify::{Config, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error, info};

use crate::router::RouteTable;
use crate::routes::{load_routes_from_str, DocFormat};

fn digest(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

/// Reloads one route file into a shared table slot.
#[derive(Debug)]
pub struct RouteReloader {
    path: PathBuf,
    table: Arc<ArcSwap<RouteTable>>,
    last_digest: Mutex<Option<String>>,
}

impl RouteReloader {
    #[must_use]
    pub fn new<P: AsRef<Path>>(path: P, table: Arc<ArcSwap<RouteTable>>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            table,
            last_digest: Mutex::new(None),
        }
    }

    /// Record the current file content as already loaded.
    pub fn prime(&self) -> anyhow::Result<()> {
        let content = std::fs::read(&self.path)
            .with_context(|| format!("Failed to read route file {}", self.path.display()))?;
        *self.last_digest.lock().unwrap_or_else(PoisonError::into_inner) = Some(digest(&content));
        Ok(())
    }

    /// Reload the file; `Ok(false)` when its content did not change.
    pub fn reload(&self) -> anyhow::Result<bool> {
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read route file {}", self.path.display()))?;
        self.apply(&content)
    }

    /// Compile `content` and record its digest; both come from the same read.
    fn apply(&self, content: &str) -> anyhow::Result<bool> {
        let new_digest = digest(content.as_bytes());
        let mut last = self.last_digest.lock().unwrap_or_else(PoisonError::into_inner);
        if last.as_deref() == Some(new_digest.as_str()) {
            debug!(path = %self.path.display(), "Route file unchanged; reload skipped");
            return Ok(false);
        }
        let defs = load_routes_from_str(content, DocFormat::from_path(&self.path))
            .with_context(|| format!("Failed to parse route file {}", self.path.display()))?;
        let table = RouteTable::from_defs(defs)?;
        let short = new_digest.get(..16).unwrap_or_default();
        info!(
            path = %self.path.display(),
            static_routes = table.static_len(),
            dynamic_routes = table.dynamic_len(),
            digest = short,
            "Route table reloaded"
        );
        self.table.store(Arc::new(table));
        *last = Some(new_digest);
        Ok(true)
    }

    #[must_use]
    pub fn table(&self) -> Arc<RouteTable> {
        self.table.load_full()
    }
}

/// Watch `path` and swap reloaded tables into `table`.
///
/// `on_reload` runs after each successful swap with the new table.
pub fn watch_routes<P, F>(
    path: P,
    table: Arc<ArcSwap<RouteTable>>,
    on_reload: F,
) -> anyhow::Result<RecommendedWatcher>
where
    P: AsRef<Path>,
    F: Fn(&RouteTable) + Send + 'static,
{
    let path = path.as_ref().to_path_buf();
    let reloader = RouteReloader::new(&path, table);
    reloader.prime()?;

    let mut watcher = RecommendedWatcher::new(
        move |res: Result<notify::Event, notify::Error>| match res {
            Ok(event) if matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) => {
                match reloader.reload() {
                    Ok(true) => on_reload(&reloader.table()),
                    Ok(false) => {}
                    Err(e) => error!(error = %format!("{e:#}"), "Route reload failed; keeping previous table"),
                }
            }
            Ok(_) => {}
            Err(e) => error!(error = %e, "Route file watch error"),
        },
        Config::default(),
    )
    .context("Failed to create route file watcher")?;

    watcher
        .watch(&path, RecursiveMode::NonRecursive)
        .with_context(|| format!("Failed to watch {}", path.display()))?;
    info!(path = %path.display(), "Watching route file");
    Ok(watcher)
}
