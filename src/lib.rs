pub mod config;
pub mod db;
pub mod error;
pub mod service;
pub mod types;

pub use config::{Config, ProvisionSettings};
pub use error::ProvisionError;
pub use service::{Provisioner, ProvisioningReport};
pub use types::{DbIdentifier, ProvisioningOutcome, StoragePaths};
