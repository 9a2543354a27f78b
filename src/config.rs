//! Configuration loading and types for workshop-publish.
//!
//! This module handles all aspects of configuration:
//! - Type definitions for config structures (`types`)
//! - Metadata override rule normalization (`overrides`)
//! - Loading configs from files (`load`)

mod load;
mod overrides;
mod types;

// Re-export all types for convenient access
pub use overrides::MetadataOverrideRule;
pub use types::{Link, Section, WorkshopConfig};

pub(crate) use types::{package_list, string_or_list};

/// Default config file name, looked up in the current directory.
pub const DEFAULT_CONFIG_FILE: &str = "workshop-config.yaml";

// =============================================================================
// Errors
// =============================================================================

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to get current working directory: {0}")]
    CwdFailure(std::io::Error),

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: std::path::PathBuf,
        source: serde_yaml::Error,
    },
}
