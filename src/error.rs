use sqlx::Error as SqlxError;
use thiserror::Error as ThisError;

/// PostgreSQL SQLSTATE codes that mean "the database is not ready yet".
const NOT_READY_SQLSTATES: &[&str] = &[
    "3D000", // invalid_catalog_name: database does not exist (yet)
    "57P03", // cannot_connect_now: server starting up
    "53300", // too_many_connections
];

#[derive(Debug, ThisError)]
pub enum ProvisionError {
    #[error("invalid identifier {value:?}: {reason}")]
    InvalidIdentifier { value: String, reason: &'static str },

    #[error("failed to connect to database \"{database}\": {source}")]
    Connectivity {
        database: String,
        #[source]
        source: SqlxError,
    },

    #[error("script '{script}' failed at statement `{statement}`: {source}")]
    ScriptExecution {
        script: String,
        statement: String,
        #[source]
        source: SqlxError,
    },

    #[error("database \"{database}\" did not become available after {attempts} attempts")]
    AvailabilityTimeout { database: String, attempts: u32 },

    #[error("unable to retrieve default data and log file paths: {0}")]
    PathRetrieval(String),

    #[error("configuration error: {0}")]
    Config(#[from] figment::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] SqlxError),
}

/// Errors that are worth another attempt after a delay.
pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for SqlxError {
    fn is_retryable(&self) -> bool {
        match self {
            SqlxError::Io(_)
            | SqlxError::Tls(_)
            | SqlxError::PoolTimedOut
            | SqlxError::PoolClosed => true,
            SqlxError::Database(db) => db
                .code()
                .is_some_and(|code| NOT_READY_SQLSTATES.iter().any(|c| *c == code)),
            _ => false,
        }
    }
}

impl IsRetryable for ProvisionError {
    fn is_retryable(&self) -> bool {
        match self {
            ProvisionError::Connectivity { source, .. } => source.is_retryable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_failures_while_connecting_are_retryable() {
        let err = ProvisionError::Connectivity {
            database: "Orders".to_string(),
            source: SqlxError::Io(std::io::Error::from(std::io::ErrorKind::ConnectionRefused)),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn non_connectivity_errors_are_not_retryable() {
        let err = ProvisionError::PathRetrieval("no rows".to_string());
        assert!(!err.is_retryable());

        let err = ProvisionError::Connectivity {
            database: "Orders".to_string(),
            source: SqlxError::Configuration("bad url".into()),
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn timeout_message_names_the_database() {
        let err = ProvisionError::AvailabilityTimeout {
            database: "Orders".to_string(),
            attempts: 30,
        };
        assert_eq!(
            err.to_string(),
            "database \"Orders\" did not become available after 30 attempts"
        );
    }
}
