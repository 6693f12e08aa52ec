use crate::db::connection::{AdminConnection, TargetConnection, TargetConnector};
use crate::db::script::Script;
use crate::error::ProvisionError;
use crate::types::{DbIdentifier, StoragePaths};
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::{Connection, Executor};
use tracing::debug;

const DATABASE_EXISTS: &str = "SELECT COUNT(*) FROM pg_catalog.pg_database WHERE datname = $1";

// `data_directory` is superuser-only (or pg_read_all_settings); the WAL lives
// under it in `pg_wal`.
const DEFAULT_PATHS: &str = r#"
SELECT current_setting('data_directory', true) AS data_path,
       current_setting('data_directory', true) || '/pg_wal' AS log_path
"#;

async fn connect(options: &PgConnectOptions) -> Result<PgConnection, ProvisionError> {
    PgConnection::connect_with(options)
        .await
        .map_err(|source| ProvisionError::Connectivity {
            database: options.get_database().unwrap_or("<default>").to_string(),
            source,
        })
}

/// Execute `script` statement by statement, inside one transaction if the
/// script asks for it.
async fn run_script(conn: &mut PgConnection, script: &Script) -> Result<(), ProvisionError> {
    let failed = |index: usize, source: sqlx::Error| ProvisionError::ScriptExecution {
        script: script.name().to_string(),
        statement: script.label(index).to_string(),
        source,
    };

    if script.is_transactional() {
        let mut tx = conn.begin().await?;
        for (i, stmt) in script.statements().iter().enumerate() {
            Executor::execute(&mut *tx, sqlx::raw_sql(stmt))
                .await
                .map_err(|e| failed(i, e))?;
        }
        tx.commit().await?;
    } else {
        for (i, stmt) in script.statements().iter().enumerate() {
            Executor::execute(&mut *conn, sqlx::raw_sql(stmt))
                .await
                .map_err(|e| failed(i, e))?;
        }
    }
    debug!(
        script = script.name(),
        statements = script.statements().len(),
        "script executed"
    );
    Ok(())
}

/// Administrative connection to the server's maintenance database.
pub struct PgAdmin {
    conn: PgConnection,
}

impl PgAdmin {
    pub async fn connect(options: &PgConnectOptions) -> Result<Self, ProvisionError> {
        Ok(Self {
            conn: connect(options).await?,
        })
    }
}

#[async_trait]
impl AdminConnection for PgAdmin {
    async fn count_databases(&mut self, name: &DbIdentifier) -> Result<i64, ProvisionError> {
        let count: i64 = sqlx::query_scalar(DATABASE_EXISTS)
            .bind(name.as_str())
            .fetch_one(&mut self.conn)
            .await?;
        Ok(count)
    }

    async fn default_storage_paths(&mut self) -> Result<Option<StoragePaths>, ProvisionError> {
        let row: Option<(Option<String>, Option<String>)> = sqlx::query_as(DEFAULT_PATHS)
            .fetch_optional(&mut self.conn)
            .await
            .map_err(|e| ProvisionError::PathRetrieval(e.to_string()))?;

        Ok(match row {
            Some((Some(data_path), Some(log_path))) => Some(StoragePaths {
                data_path,
                log_path,
            }),
            _ => None,
        })
    }

    async fn execute_script(&mut self, script: &Script) -> Result<(), ProvisionError> {
        run_script(&mut self.conn, script).await
    }

    async fn close(self) -> Result<(), ProvisionError> {
        self.conn.close().await?;
        Ok(())
    }
}

/// Opens connections to databases on the configured server.
#[derive(Clone)]
pub struct PgConnector {
    options: PgConnectOptions,
}

impl PgConnector {
    /// `options` carries everything except the database name.
    pub fn new(options: PgConnectOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl TargetConnector for PgConnector {
    type Connection = PgTarget;

    async fn open(&self, database: &DbIdentifier) -> Result<PgTarget, ProvisionError> {
        let options = self.options.clone().database(database.as_str());
        Ok(PgTarget {
            conn: connect(&options).await?,
        })
    }
}

pub struct PgTarget {
    conn: PgConnection,
}

#[async_trait]
impl TargetConnection for PgTarget {
    async fn execute_script(&mut self, script: &Script) -> Result<(), ProvisionError> {
        run_script(&mut self.conn, script).await
    }

    async fn close(self) -> Result<(), ProvisionError> {
        self.conn.close().await?;
        Ok(())
    }
}
