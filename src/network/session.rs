//! Per-connection session state
//!
//! Holds the selected database and at most one open batch. Commands in a
//! session run in arrival order on the connection's thread; the session is
//! dropped with the connection, discarding any uncommitted batch.

use std::sync::Arc;

use crate::database::{Database, DatabaseManager, KvLayer};
use crate::error::{KvError, Result};
use crate::kv::{ExistenceBatch, VersionedBatch};

/// Which listener a connection arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortKind {
    /// Network-reachable data port
    Public,
    /// Local management port; every command is allowed
    Local,
}

/// A batch opened with `batch begin`
pub enum OpenBatch {
    Versioned(VersionedBatch),
    Conditional(ExistenceBatch),
}

impl OpenBatch {
    pub fn len(&self) -> usize {
        match self {
            OpenBatch::Versioned(b) => b.len(),
            OpenBatch::Conditional(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn commit(self) -> Result<()> {
        match self {
            OpenBatch::Versioned(b) => b.commit(),
            OpenBatch::Conditional(b) => b.commit(),
        }
    }
}

pub struct Session {
    manager: Arc<DatabaseManager>,
    port: PortKind,
    database: Option<Arc<Database>>,
    batch: Option<OpenBatch>,
}

impl Session {
    pub fn new(manager: Arc<DatabaseManager>, port: PortKind) -> Self {
        Self {
            manager,
            port,
            database: None,
            batch: None,
        }
    }

    pub fn manager(&self) -> &DatabaseManager {
        &self.manager
    }

    pub fn port(&self) -> PortKind {
        self.port
    }

    /// Select `name` for subsequent commands
    pub fn use_database(&mut self, name: &str) -> Result<()> {
        if self.batch.is_some() {
            return Err(KvError::BatchInProgress);
        }
        self.database = Some(self.manager.get_enabled(name)?);
        Ok(())
    }

    /// The selected database, provided it is still enabled
    pub fn database(&self) -> Result<&Arc<Database>> {
        let database = self.database.as_ref().ok_or(KvError::NoDatabaseSelected)?;
        if !database.is_enabled() {
            return Err(KvError::DatabaseDisabled(database.name()));
        }
        Ok(database)
    }

    pub fn selected_name(&self) -> Option<String> {
        self.database.as_ref().map(|db| db.name())
    }

    /// Forget the selection (and any batch) if it points at `name`
    pub fn deselect(&mut self, name: &str) {
        if self.selected_name().as_deref() == Some(name) {
            self.database = None;
            self.batch = None;
        }
    }

    pub fn begin_batch(&mut self) -> Result<()> {
        if self.batch.is_some() {
            return Err(KvError::BatchInProgress);
        }
        let batch = match self.database()?.layer() {
            KvLayer::Versioned(store) => OpenBatch::Versioned(store.begin_batch()),
            KvLayer::Conditional(store) => OpenBatch::Conditional(store.begin_batch()),
        };
        self.batch = Some(batch);
        Ok(())
    }

    pub fn batch_mut(&mut self) -> Option<&mut OpenBatch> {
        self.batch.as_mut()
    }

    pub fn take_batch(&mut self) -> Result<OpenBatch> {
        self.batch.take().ok_or(KvError::NoBatch)
    }

    pub fn has_batch(&self) -> bool {
        self.batch.is_some()
    }
}
