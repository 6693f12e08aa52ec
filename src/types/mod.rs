pub mod identifier;
pub mod outcome;

pub use identifier::{DbIdentifier, quote_literal};
pub use outcome::{ProvisioningOutcome, StoragePaths};
