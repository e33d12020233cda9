use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::connection::{Connection, DataSourceError, DataSourceRegistry};

/// An opened data source owned by one request.
pub struct DataSourceHandle {
    name: String,
    connection: Box<dyn Connection>,
    transaction_active: bool,
    closed: bool,
}

impl fmt::Debug for DataSourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSourceHandle")
            .field("name", &self.name)
            .field("transaction_active", &self.transaction_active)
            .field("closed", &self.closed)
            .finish()
    }
}

impl DataSourceHandle {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.transaction_active
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn backend(&self, op: &'static str, source: anyhow::Error) -> DataSourceError {
        DataSourceError::Backend {
            name: self.name.clone(),
            op,
            source,
        }
    }

    fn begin(&mut self) -> Result<(), DataSourceError> {
        self.connection.begin().map_err(|e| self.backend("begin", e))?;
        self.transaction_active = true;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), DataSourceError> {
        if self.closed || !self.transaction_active {
            return Ok(());
        }
        self.connection.commit().map_err(|e| self.backend("commit", e))?;
        self.transaction_active = false;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), DataSourceError> {
        if self.closed || !self.transaction_active {
            return Ok(());
        }
        self.transaction_active = false;
        self.connection
            .rollback()
            .map_err(|e| self.backend("rollback", e))
    }

    /// Close once; later calls are no-ops. The handle counts as closed even when the backend
    /// reports a failure.
    fn close(&mut self) -> Result<(), DataSourceError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.transaction_active = false;
        self.connection.close().map_err(|e| self.backend("close", e))
    }
}

/// Request-scoped set of lazily opened data sources.
///
/// A source is opened the first time a handler asks for it and begins a transaction at
/// once. The [`TransactionOrchestrator`](crate::transaction::TransactionOrchestrator) commits
/// or rolls back every open handle after dispatch and always closes them.
pub struct DataSources {
    registry: Arc<DataSourceRegistry>,
    handles: Vec<DataSourceHandle>,
}

impl fmt::Debug for DataSources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.handles).finish()
    }
}

impl Default for DataSources {
    fn default() -> Self {
        Self::new(Arc::new(DataSourceRegistry::new()))
    }
}

impl DataSources {
    #[must_use]
    pub fn new(registry: Arc<DataSourceRegistry>) -> Self {
        Self {
            registry,
            handles: Vec::new(),
        }
    }

    /// Open `name` if needed and begin its transaction. Re-opening a closed source starts a
    /// fresh connection.
    pub fn open(&mut self, name: &str) -> Result<&mut DataSourceHandle, DataSourceError> {
        let index = match self.handles.iter().position(|h| h.name == name) {
            Some(i) if !self.handles[i].closed => i,
            existing => {
                let connection = self.registry.open(name)?;
                let mut handle = DataSourceHandle {
                    name: name.to_string(),
                    connection,
                    transaction_active: false,
                    closed: false,
                };
                if let Err(e) = handle.begin() {
                    if let Err(close_err) = handle.close() {
                        error!(data_source = %name, error = %close_err, "Data source close failed");
                    }
                    return Err(e);
                }
                info!(data_source = %name, "Data source opened; transaction started");
                match existing {
                    Some(i) => {
                        self.handles[i] = handle;
                        i
                    }
                    None => {
                        self.handles.push(handle);
                        self.handles.len() - 1
                    }
                }
            }
        };
        Ok(&mut self.handles[index])
    }

    /// Typed access to the connection of `name`, opening it on first use.
    pub fn get<C: Connection>(&mut self, name: &str) -> Result<&mut C, DataSourceError> {
        let handle = self.open(name)?;
        handle
            .connection
            .as_any_mut()
            .downcast_mut::<C>()
            .ok_or_else(|| DataSourceError::WrongType {
                name: name.to_string(),
            })
    }

    /// Whether any source was opened during this request.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    #[must_use]
    pub fn is_open(&self, name: &str) -> bool {
        self.handles.iter().any(|h| h.name == name && !h.closed)
    }

    #[must_use]
    pub fn handles(&self) -> &[DataSourceHandle] {
        &self.handles
    }

    /// Commit one open source.
    pub fn commit(&mut self, name: &str) -> Result<(), DataSourceError> {
        self.handle_mut(name)?.commit()
    }

    /// Roll back one open source.
    pub fn rollback(&mut self, name: &str) -> Result<(), DataSourceError> {
        self.handle_mut(name)?.rollback()
    }

    /// Close one source; unknown or already closed names are ignored.
    pub fn close(&mut self, name: &str) -> Result<(), DataSourceError> {
        match self.handles.iter_mut().find(|h| h.name == name) {
            Some(h) => h.close(),
            None => Ok(()),
        }
    }

    /// Commit every open transaction, stopping at the first failure.
    pub fn commit_all(&mut self) -> Result<(), DataSourceError> {
        for handle in &mut self.handles {
            handle.commit()?;
            debug!(data_source = %handle.name, "Data source committed");
        }
        Ok(())
    }

    /// Roll back every open transaction; all handles are attempted, failures are returned.
    pub fn rollback_all(&mut self) -> Vec<DataSourceError> {
        let mut failures = Vec::new();
        for handle in &mut self.handles {
            match handle.rollback() {
                Ok(()) => debug!(data_source = %handle.name, "Data source rolled back"),
                Err(e) => failures.push(e),
            }
        }
        failures
    }

    /// Close every handle exactly once. Failures are logged and never propagated; returns
    /// how many handles this call closed.
    pub fn close_all(&mut self) -> usize {
        let mut closed = 0;
        for handle in &mut self.handles {
            if handle.closed {
                continue;
            }
            closed += 1;
            if let Err(e) = handle.close() {
                error!(data_source = %handle.name, error = %e, "Data source close failed");
            } else {
                debug!(data_source = %handle.name, "Data source closed");
            }
        }
        closed
    }

    fn handle_mut(&mut self, name: &str) -> Result<&mut DataSourceHandle, DataSourceError> {
        self.handles
            .iter_mut()
            .find(|h| h.name == name && !h.closed)
            .ok_or_else(|| DataSourceError::NotOpen {
                name: name.to_string(),
            })
    }
}

impl Drop for DataSources {
    fn drop(&mut self) {
        if self.handles.iter().any(|h| !h.closed) {
            warn!("Data sources dropped while open; rolling back and closing");
            for e in self.rollback_all() {
                error!(data_source = %e.name(), error = %e, "Data source rollback failed");
            }
            self.close_all();
        }
    }
}
