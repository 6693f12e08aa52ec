//! Capabilities the provisioner needs from the database engine.
//!
//! The provisioner only talks to these traits; `db::postgres` implements them
//! over `sqlx`, and tests substitute in-memory fakes.

use crate::db::script::Script;
use crate::error::ProvisionError;
use crate::types::{DbIdentifier, StoragePaths};
use async_trait::async_trait;

/// Connection to the server's administrative catalog.
#[async_trait]
pub trait AdminConnection: Send + Sized {
    /// Count-based existence check scoped by exact name match.
    async fn count_databases(&mut self, name: &DbIdentifier) -> Result<i64, ProvisionError>;

    /// Server default data and log locations. `None` if the server reports none.
    async fn default_storage_paths(&mut self) -> Result<Option<StoragePaths>, ProvisionError>;

    async fn execute_script(&mut self, script: &Script) -> Result<(), ProvisionError>;

    async fn close(self) -> Result<(), ProvisionError>;
}

/// Opens connections to a database by name.
#[async_trait]
pub trait TargetConnector: Send + Sync {
    type Connection: TargetConnection;

    /// Fails with `ProvisionError::Connectivity` if the database cannot be reached.
    async fn open(&self, database: &DbIdentifier) -> Result<Self::Connection, ProvisionError>;
}

/// An open connection to the provisioned database.
#[async_trait]
pub trait TargetConnection: Send + Sized {
    async fn execute_script(&mut self, script: &Script) -> Result<(), ProvisionError>;

    async fn close(self) -> Result<(), ProvisionError>;
}
