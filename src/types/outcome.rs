use std::fmt;

/// Result of ensuring the target database exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisioningOutcome {
    AlreadyExists,
    CreatedAndAvailable,
    CreationTimedOut,
}

impl fmt::Display for ProvisioningOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::AlreadyExists => "already exists",
            Self::CreatedAndAvailable => "created and available",
            Self::CreationTimedOut => "creation timed out",
        };
        f.write_str(s)
    }
}

/// Server default locations for data files and the write-ahead log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePaths {
    pub data_path: String,
    pub log_path: String,
}
