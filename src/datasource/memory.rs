use serde::Serialize;
use serde_json::Value;
use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::connection::{Connection, Connector};
use crate::config::DataSourceConfig;

/// Lifecycle event recorded by [`MemoryConnector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JournalEvent {
    Open,
    Begin,
    Commit,
    Rollback,
    Close,
}

impl JournalEvent {
    fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "open" => Some(JournalEvent::Open),
            "begin" => Some(JournalEvent::Begin),
            "commit" => Some(JournalEvent::Commit),
            "rollback" => Some(JournalEvent::Rollback),
            "close" => Some(JournalEvent::Close),
            _ => None,
        }
    }
}

impl fmt::Display for JournalEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JournalEvent::Open => "open",
            JournalEvent::Begin => "begin",
            JournalEvent::Commit => "commit",
            JournalEvent::Rollback => "rollback",
            JournalEvent::Close => "close",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JournalEntry {
    pub source: String,
    pub event: JournalEvent,
}

#[derive(Debug, Default)]
struct Store {
    journal: Vec<JournalEntry>,
    committed: BTreeMap<String, BTreeMap<String, Value>>,
}

/// In-process connector: a key/value store per source name with transactional staging.
///
/// Every lifecycle call is appended to a shared journal. The `fail_on` option (a list of
/// event names) makes the matching calls fail after being journaled, to exercise error paths:
///
/// ```yaml
/// data_sources:
///   audit: { kind: memory, options: { fail_on: [close] } }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    store: Arc<Mutex<Store>>,
}

impl MemoryConnector {
    pub const KIND: &'static str = "memory";

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every event recorded so far, in order.
    #[must_use]
    pub fn journal(&self) -> Vec<JournalEntry> {
        self.lock().journal.clone()
    }

    /// Events recorded for one source, in order.
    #[must_use]
    pub fn events(&self, source: &str) -> Vec<JournalEvent> {
        self.lock()
            .journal
            .iter()
            .filter(|e| e.source == source)
            .map(|e| e.event)
            .collect()
    }

    /// A committed value.
    #[must_use]
    pub fn committed(&self, source: &str, key: &str) -> Option<Value> {
        self.lock().committed.get(source)?.get(key).cloned()
    }
}

impl Connector for MemoryConnector {
    fn open(&self, name: &str, config: &DataSourceConfig) -> anyhow::Result<Box<dyn Connection>> {
        let fail_on: BTreeSet<JournalEvent> = match config.options.get("fail_on") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .filter_map(JournalEvent::parse)
                .collect(),
            Some(Value::String(s)) => JournalEvent::parse(s).into_iter().collect(),
            _ => BTreeSet::new(),
        };
        let mut connection = MemoryConnection {
            source: name.to_string(),
            store: Arc::clone(&self.store),
            staged: BTreeMap::new(),
            fail_on,
        };
        connection.record(JournalEvent::Open)?;
        Ok(Box::new(connection))
    }
}

/// Connection handed out by [`MemoryConnector`].
#[derive(Debug)]
pub struct MemoryConnection {
    source: String,
    store: Arc<Mutex<Store>>,
    staged: BTreeMap<String, Value>,
    fail_on: BTreeSet<JournalEvent>,
}

impl MemoryConnection {
    fn record(&mut self, event: JournalEvent) -> anyhow::Result<()> {
        self.store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .journal
            .push(JournalEntry {
                source: self.source.clone(),
                event,
            });
        if self.fail_on.contains(&event) {
            anyhow::bail!("injected {event} failure on {}", self.source);
        }
        Ok(())
    }

    /// Stage a write, visible to this connection until commit.
    pub fn put(&mut self, key: &str, value: Value) {
        self.staged.insert(key.to_string(), value);
    }

    /// Read through staged writes to committed data.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        if let Some(v) = self.staged.get(key) {
            return Some(v.clone());
        }
        self.store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .committed
            .get(&self.source)?
            .get(key)
            .cloned()
    }
}

impl Connection for MemoryConnection {
    fn begin(&mut self) -> anyhow::Result<()> {
        self.staged.clear();
        self.record(JournalEvent::Begin)
    }

    fn commit(&mut self) -> anyhow::Result<()> {
        self.record(JournalEvent::Commit)?;
        let staged = std::mem::take(&mut self.staged);
        self.store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .committed
            .entry(self.source.clone())
            .or_default()
            .extend(staged);
        Ok(())
    }

    fn rollback(&mut self) -> anyhow::Result<()> {
        self.staged.clear();
        self.record(JournalEvent::Rollback)
    }

    fn close(&mut self) -> anyhow::Result<()> {
        self.record(JournalEvent::Close)
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
