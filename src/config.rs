use crate::db::OwnerRole;
use crate::error::ProvisionError;
use crate::types::DbIdentifier;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use sqlx::ConnectOptions;
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use std::time::Duration;

pub const CONFIG_FILE: &str = "config.toml";
pub const ENV_PREFIX: &str = "PROVISIONER_";

/// Runtime configuration.
///
/// Layered as defaults, then `config.toml`, then `PROVISIONER_*` environment
/// variables (`__` separates nested keys, e.g. `PROVISIONER_SERVER__HOST`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub loglevel: String,
    pub server: ServerConfig,
    pub provision: ProvisionConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            loglevel: "info".to_string(),
            server: ServerConfig::default(),
            provision: ProvisionConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, ProvisionError> {
        Self::figment().extract().map_err(Into::into)
    }

    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }
}

/// How to reach the server. Unset fields fall back to the libpq environment
/// (`PGHOST`, `PGPORT`, `PGUSER`, `PGPASSWORD`, `~/.pgpass`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Maintenance database holding the administrative catalog.
    pub admin_database: String,
    pub ssl_mode: SslMode,
    pub application_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
            username: None,
            password: None,
            admin_database: "postgres".to_string(),
            ssl_mode: SslMode::Prefer,
            application_name: "db-provisioner".to_string(),
        }
    }
}

impl ServerConfig {
    /// Options for every connection, without a database name.
    pub fn connect_options(&self) -> PgConnectOptions {
        let mut opts = PgConnectOptions::new()
            .ssl_mode(self.ssl_mode.into())
            .application_name(&self.application_name);
        if let Some(host) = &self.host {
            opts = opts.host(host);
        }
        if let Some(port) = self.port {
            opts = opts.port(port);
        }
        if let Some(username) = &self.username {
            opts = opts.username(username);
        }
        if let Some(password) = &self.password {
            opts = opts.password(password);
        }
        opts
    }

    /// Admin connections run the owner-role password statement, so sqlx's
    /// per-statement logging is off for them.
    pub fn admin_options(&self) -> PgConnectOptions {
        self.connect_options()
            .database(&self.admin_database)
            .disable_statement_logging()
    }
}

/// `require` encrypts without verifying the server certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SslMode {
    Disable,
    Allow,
    Prefer,
    Require,
    VerifyCa,
    VerifyFull,
}

impl From<SslMode> for PgSslMode {
    fn from(mode: SslMode) -> Self {
        match mode {
            SslMode::Disable => PgSslMode::Disable,
            SslMode::Allow => PgSslMode::Allow,
            SslMode::Prefer => PgSslMode::Prefer,
            SslMode::Require => PgSslMode::Require,
            SslMode::VerifyCa => PgSslMode::VerifyCa,
            SslMode::VerifyFull => PgSslMode::VerifyFull,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionConfig {
    /// Skip the interactive prompt when set.
    pub database: Option<String>,
    pub owner_role: String,
    pub owner_password: Option<String>,
    pub availability_timeout_secs: u32,
    pub poll_interval_ms: u64,
    pub pause_on_exit: bool,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            database: None,
            owner_role: "handshake".to_string(),
            owner_password: None,
            availability_timeout_secs: 30,
            poll_interval_ms: 1000,
            pause_on_exit: true,
        }
    }
}

/// Validated provisioning parameters handed to the provisioner.
#[derive(Debug, Clone)]
pub struct ProvisionSettings {
    pub owner: OwnerRole,
    pub availability_timeout_secs: u32,
    pub poll_interval: Duration,
}

impl ProvisionConfig {
    pub fn settings(&self) -> Result<ProvisionSettings, ProvisionError> {
        Ok(ProvisionSettings {
            owner: OwnerRole {
                name: DbIdentifier::parse(&self.owner_role)?,
                password: self.owner_password.clone(),
            },
            availability_timeout_secs: self.availability_timeout_secs,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        })
    }
}
