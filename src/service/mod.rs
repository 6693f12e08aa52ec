pub mod provisioner;

pub use provisioner::{Provisioner, ProvisioningReport};
