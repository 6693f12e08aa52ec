use crate::config::ProvisionSettings;
use crate::db::connection::{AdminConnection, TargetConnection, TargetConnector};
use crate::db::schema::{database_creation_script, schema_steps};
use crate::error::{IsRetryable, ProvisionError};
use crate::types::{DbIdentifier, ProvisioningOutcome};
use backon::{ConstantBuilder, Retryable};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Summary of a completed provisioning run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningReport {
    pub database: DbIdentifier,
    pub outcome: ProvisioningOutcome,
    pub steps_applied: usize,
}

/// Creates a database if it is missing and brings its schema up to date.
pub struct Provisioner<C> {
    connector: C,
    settings: ProvisionSettings,
}

impl<C: TargetConnector> Provisioner<C> {
    pub fn new(connector: C, settings: ProvisionSettings) -> Self {
        Self {
            connector,
            settings,
        }
    }

    pub fn settings(&self) -> &ProvisionSettings {
        &self.settings
    }

    /// Full run: ensure the database, then ensure the schema.
    ///
    /// The admin connection is closed before the target database is opened.
    /// A creation that never becomes connectable is fatal and no schema work
    /// is attempted.
    pub async fn run<A: AdminConnection>(
        &self,
        mut admin: A,
        database: &DbIdentifier,
    ) -> Result<ProvisioningReport, ProvisionError> {
        let outcome = self.ensure_database(&mut admin, database).await?;
        admin.close().await?;

        if outcome == ProvisioningOutcome::CreationTimedOut {
            return Err(ProvisionError::AvailabilityTimeout {
                database: database.to_string(),
                attempts: self.settings.availability_timeout_secs,
            });
        }

        let mut target = self.connector.open(database).await?;
        let steps_applied = self.create_schema(&mut target, database).await?;
        target.close().await?;

        Ok(ProvisioningReport {
            database: database.clone(),
            outcome,
            steps_applied,
        })
    }

    /// Create `database` unless the catalog already lists it.
    ///
    /// The existence check always hits the server; nothing is cached between
    /// calls.
    pub async fn ensure_database<A: AdminConnection>(
        &self,
        admin: &mut A,
        database: &DbIdentifier,
    ) -> Result<ProvisioningOutcome, ProvisionError> {
        if admin.count_databases(database).await? > 0 {
            info!(database = %database, "database already exists, skipping creation");
            return Ok(ProvisioningOutcome::AlreadyExists);
        }

        info!(database = %database, "database does not exist, creating");
        let paths = admin.default_storage_paths().await?.ok_or_else(|| {
            ProvisionError::PathRetrieval("server reported no default data directory".to_string())
        })?;
        debug!(
            data_path = %paths.data_path,
            log_path = %paths.log_path,
            "using server default storage paths"
        );

        let script = database_creation_script(database, &self.settings.owner, &paths);
        admin.execute_script(&script).await?;
        info!(database = %database, "creation script executed");

        let timeout = self.settings.availability_timeout_secs;
        if self.wait_for_availability(database, timeout).await? {
            info!(database = %database, "database created successfully");
            Ok(ProvisioningOutcome::CreatedAndAvailable)
        } else {
            warn!(database = %database, attempts = timeout, "database did not become available");
            Ok(ProvisioningOutcome::CreationTimedOut)
        }
    }

    /// Try to connect to `database` up to `attempts` times, one poll interval
    /// apart.
    ///
    /// Returns `Ok(false)` once the attempts are used up and the final
    /// interval has elapsed. Only connectivity
    /// failures are retried; anything else (bad credentials, for instance) is
    /// returned as an error straight away.
    pub async fn wait_for_availability(
        &self,
        database: &DbIdentifier,
        attempts: u32,
    ) -> Result<bool, ProvisionError> {
        if attempts == 0 {
            return Ok(false);
        }

        let policy = ConstantBuilder::default()
            .with_delay(self.settings.poll_interval)
            .with_max_times(attempts as usize - 1);

        let mut made = 0u32;
        let probe = (|| {
            made += 1;
            async move {
                let conn = self.connector.open(database).await?;
                if let Err(e) = conn.close().await {
                    debug!(database = %database, error = %e, "closing availability probe failed");
                }
                Ok::<(), ProvisionError>(())
            }
        })
        .retry(policy)
        .when(|e: &ProvisionError| e.is_retryable())
        .notify(|err: &ProvisionError, dur: Duration| {
            debug!(
                database = %database,
                error = %err,
                "database not available yet, retrying in {:?}",
                dur
            );
        })
        .await;

        match probe {
            Ok(()) => {
                debug!(database = %database, attempts = made, "database is accepting connections");
                Ok(true)
            }
            Err(e) if e.is_retryable() => {
                // The last failed attempt waits out its interval too, so a
                // full timeout spans `attempts` intervals.
                tokio::time::sleep(self.settings.poll_interval).await;
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Apply every schema step to an open target connection.
    ///
    /// Steps are idempotent, so this is safe on a database that is already
    /// fully or partially provisioned. Returns the number of steps applied.
    pub async fn create_schema<T: TargetConnection>(
        &self,
        target: &mut T,
        database: &DbIdentifier,
    ) -> Result<usize, ProvisionError> {
        let steps = schema_steps(database, &self.settings.owner);
        for step in &steps {
            target.execute_script(step).await?;
            debug!(step = step.name(), "schema step applied");
        }
        info!(database = %database, steps = steps.len(), "schema is up to date");
        Ok(steps.len())
    }
}
