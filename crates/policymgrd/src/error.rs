//! Error types for policymgrd.

use std::io;
use thiserror::Error;

use sonic_policy::PolicyError;

/// Result type alias for policymgrd operations.
pub type PolicyMgrResult<T> = Result<T, PolicyMgrError>;

/// Errors that can occur while loading or applying policy configuration.
#[derive(Debug, Error)]
pub enum PolicyMgrError {
    /// Config file could not be read.
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    /// Config file is not valid JSON for the expected schema.
    #[error("Failed to parse JSON config {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// Config file is not valid YAML for the expected schema.
    #[error("Failed to parse YAML config {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// File extension is neither JSON nor YAML.
    #[error("Unsupported config format for {path} (expected .json, .yaml or .yml)")]
    UnsupportedFormat { path: String },

    /// The engine rejected an entry.
    #[error(transparent)]
    Policy(#[from] PolicyError),
}

impl PolicyMgrError {
    pub fn io(path: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn unsupported_format(path: impl Into<String>) -> Self {
        Self::UnsupportedFormat { path: path.into() }
    }
}
