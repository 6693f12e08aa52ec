//! Database module: engine capabilities, scripts and DDL.
//!
//! Layout:
//! - `connection.rs`: traits the provisioner is written against
//! - `postgres.rs`: `sqlx` implementation of those traits
//! - `schema.rs`: DDL for the database and its tables
//! - `script.rs`: ordered statement lists executed as a unit

pub mod connection;
pub mod postgres;
pub mod schema;
pub mod script;

pub use connection::{AdminConnection, TargetConnection, TargetConnector};
pub use postgres::{PgAdmin, PgConnector, PgTarget};
pub use schema::{OwnerRole, database_creation_script, schema_steps};
pub use script::Script;
