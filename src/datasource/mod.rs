//! # Data Source Module
//!
//! Persistence collaborators and their request-scoped lifecycle.
//!
//! - [`Connector`] / [`Connection`] - the narrow contract a backend implements
//!   (`open`, `begin`, `commit`, `rollback`, `close`).
//! - [`DataSourceRegistry`] - configured source names and the connector per kind, built once
//!   at startup.
//! - [`DataSources`] - the handles one request opened. Opening is lazy and begins a
//!   transaction immediately; closing is idempotent per handle.
//! - [`MemoryConnector`] - an in-process backend with a lifecycle journal.

mod connection;
mod memory;
mod scope;

pub use connection::{Connection, Connector, DataSourceError, DataSourceRegistry};
pub use memory::{JournalEntry, JournalEvent, MemoryConnection, MemoryConnector};
pub use scope::{DataSourceHandle, DataSources};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DataSourceConfig;
    use serde_json::json;
    use std::sync::Arc;

    fn registry(memory: &MemoryConnector) -> Arc<DataSourceRegistry> {
        Arc::new(
            DataSourceRegistry::new()
                .with_connector(MemoryConnector::KIND, Arc::new(memory.clone()))
                .with_source("main", DataSourceConfig::new("memory"))
                .with_source(
                    "flaky",
                    DataSourceConfig::new("memory").with_option("fail_on", json!(["close"])),
                )
                .with_source("exotic", DataSourceConfig::new("oracle")),
        )
    }

    #[test]
    fn test_lazy_open_begins_transaction() {
        let memory = MemoryConnector::new();
        let mut ds = DataSources::new(registry(&memory));
        assert!(ds.is_empty());

        ds.get::<MemoryConnection>("main").unwrap().put("k", json!(1));
        ds.get::<MemoryConnection>("main").unwrap();
        assert_eq!(ds.len(), 1);
        assert!(ds.handles()[0].in_transaction());
        assert_eq!(memory.events("main"), vec![JournalEvent::Open, JournalEvent::Begin]);

        ds.commit_all().unwrap();
        assert_eq!(memory.committed("main", "k"), Some(json!(1)));
        assert_eq!(ds.close_all(), 1);
    }

    #[test]
    fn test_rollback_discards_staged_writes() {
        let memory = MemoryConnector::new();
        let mut ds = DataSources::new(registry(&memory));
        ds.get::<MemoryConnection>("main").unwrap().put("k", json!("v"));
        assert!(ds.rollback_all().is_empty());
        ds.close_all();
        assert_eq!(memory.committed("main", "k"), None);
        assert_eq!(
            memory.events("main"),
            vec![
                JournalEvent::Open,
                JournalEvent::Begin,
                JournalEvent::Rollback,
                JournalEvent::Close
            ]
        );
    }

    #[test]
    fn test_close_is_idempotent() {
        let memory = MemoryConnector::new();
        let mut ds = DataSources::new(registry(&memory));
        ds.open("main").unwrap();
        ds.close("main").unwrap();
        ds.close("main").unwrap();
        assert_eq!(ds.close_all(), 0);
        let closes = memory
            .events("main")
            .into_iter()
            .filter(|e| *e == JournalEvent::Close)
            .count();
        assert_eq!(closes, 1);
        assert!(!ds.is_open("main"));
    }

    #[test]
    fn test_close_failure_is_swallowed_and_others_still_close() {
        let memory = MemoryConnector::new();
        let mut ds = DataSources::new(registry(&memory));
        ds.open("flaky").unwrap();
        ds.open("main").unwrap();
        assert_eq!(ds.close_all(), 2);
        assert!(memory.events("main").contains(&JournalEvent::Close));
        assert!(ds.handles().iter().all(DataSourceHandle::is_closed));
    }

    #[test]
    fn test_unknown_and_unsupported_sources() {
        let memory = MemoryConnector::new();
        let mut ds = DataSources::new(registry(&memory));
        assert!(matches!(ds.open("nope"), Err(DataSourceError::Unknown { .. })));
        assert!(matches!(
            ds.open("exotic"),
            Err(DataSourceError::UnsupportedKind { .. })
        ));
        assert!(matches!(ds.commit("main"), Err(DataSourceError::NotOpen { .. })));
        assert!(ds.is_empty());
    }

    #[test]
    fn test_drop_closes_open_handles() {
        let memory = MemoryConnector::new();
        {
            let mut ds = DataSources::new(registry(&memory));
            ds.open("main").unwrap();
        }
        assert_eq!(memory.events("main").last(), Some(&JournalEvent::Close));
    }
}
