use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::config::DataSourceConfig;

/// One live connection to a persistence backend.
///
/// Every operation is a blocking call into the backend; timeouts are the backend's concern.
pub trait Connection: Any + Send {
    fn begin(&mut self) -> anyhow::Result<()>;
    fn commit(&mut self) -> anyhow::Result<()>;
    fn rollback(&mut self) -> anyhow::Result<()>;
    fn close(&mut self) -> anyhow::Result<()>;

    /// Typed access for handlers (`DataSources::get::<C>`).
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Opens connections of one backend kind.
pub trait Connector: Send + Sync {
    fn open(&self, name: &str, config: &DataSourceConfig) -> anyhow::Result<Box<dyn Connection>>;
}

/// Failures of data-source management.
#[derive(Debug)]
pub enum DataSourceError {
    /// No data source with this name is configured
    Unknown { name: String },
    /// The configured kind has no registered connector
    UnsupportedKind { name: String, kind: String },
    /// The handle exists but its connection has a different type
    WrongType { name: String },
    /// The handle was never opened
    NotOpen { name: String },
    /// The backend failed during `op` (`open`, `begin`, `commit`, `rollback`, `close`)
    Backend {
        name: String,
        op: &'static str,
        source: anyhow::Error,
    },
}

impl DataSourceError {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            DataSourceError::Unknown { name }
            | DataSourceError::UnsupportedKind { name, .. }
            | DataSourceError::WrongType { name }
            | DataSourceError::NotOpen { name }
            | DataSourceError::Backend { name, .. } => name,
        }
    }
}

impl fmt::Display for DataSourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSourceError::Unknown { name } => write!(f, "data source not configured: {name}"),
            DataSourceError::UnsupportedKind { name, kind } => {
                write!(f, "data source {name}: no connector for kind '{kind}'")
            }
            DataSourceError::WrongType { name } => {
                write!(f, "data source {name}: connection has an unexpected type")
            }
            DataSourceError::NotOpen { name } => write!(f, "data source {name} is not open"),
            DataSourceError::Backend { name, op, source } => {
                write!(f, "data source {name}: {op} failed: {source}")
            }
        }
    }
}

impl std::error::Error for DataSourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DataSourceError::Backend { source, .. } => Some(&**source),
            _ => None,
        }
    }
}

/// Named data sources and the connectors able to open them, resolved once at startup.
#[derive(Clone, Default)]
pub struct DataSourceRegistry {
    connectors: HashMap<String, Arc<dyn Connector>>,
    sources: BTreeMap<String, DataSourceConfig>,
}

impl fmt::Debug for DataSourceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<&String> = self.connectors.keys().collect();
        kinds.sort();
        f.debug_struct("DataSourceRegistry")
            .field("connectors", &kinds)
            .field("sources", &self.sources)
            .finish()
    }
}

impl DataSourceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the connector used for sources of `kind`.
    #[must_use]
    pub fn with_connector(mut self, kind: &str, connector: Arc<dyn Connector>) -> Self {
        self.connectors.insert(kind.to_string(), connector);
        self
    }

    #[must_use]
    pub fn with_source(mut self, name: &str, config: DataSourceConfig) -> Self {
        self.sources.insert(name.to_string(), config);
        self
    }

    #[must_use]
    pub fn with_sources(mut self, sources: &BTreeMap<String, DataSourceConfig>) -> Self {
        self.sources
            .extend(sources.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// Every configured source whose kind has no connector.
    #[must_use]
    pub fn unresolved(&self) -> Vec<(String, String)> {
        self.sources
            .iter()
            .filter(|(_, c)| !self.connectors.contains_key(&c.kind))
            .map(|(n, c)| (n.clone(), c.kind.clone()))
            .collect()
    }

    #[must_use]
    pub fn source_names(&self) -> Vec<&str> {
        self.sources.keys().map(String::as_str).collect()
    }

    /// Open a new connection for the named source.
    pub fn open(&self, name: &str) -> Result<Box<dyn Connection>, DataSourceError> {
        let config = self.sources.get(name).ok_or_else(|| DataSourceError::Unknown {
            name: name.to_string(),
        })?;
        let connector =
            self.connectors
                .get(&config.kind)
                .ok_or_else(|| DataSourceError::UnsupportedKind {
                    name: name.to_string(),
                    kind: config.kind.clone(),
                })?;
        connector
            .open(name, config)
            .map_err(|source| DataSourceError::Backend {
                name: name.to_string(),
                op: "open",
                source,
            })
    }
}
