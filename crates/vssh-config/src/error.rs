// ABOUTME: Error types for configuration loading using thiserror.
// ABOUTME: Every validation error names the offending field.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading, validating or writing configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file.
    #[error("failed to read config from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid YAML for the schema.
    #[error("failed to parse config from {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A required field is missing or empty.
    #[error("{field} is required")]
    Missing { field: String },

    /// The auth method is not one of the supported values.
    #[error("invalid auth method: {0}. Supported methods: token, userpass, ldap, oidc")]
    InvalidAuthMethod(String),

    /// A duration string could not be parsed.
    #[error("invalid duration {value:?}: {reason}")]
    InvalidDuration { value: String, reason: String },

    /// A duration that must be positive is zero.
    #[error("{field} must be greater than 0")]
    NotPositive { field: String },

    /// A duration sent to Vault in seconds has a fractional part.
    #[error("{field} must be a whole number of seconds, got {value}")]
    NotWholeSeconds { field: String, value: String },

    /// Failed to create a directory.
    #[error("failed to create directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write the config file.
    #[error("failed to write config to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Refused to overwrite an existing config file.
    #[error("configuration file already exists at {path} (use --force to overwrite)")]
    AlreadyExists { path: PathBuf },

    /// No home or config directory could be determined.
    #[error("could not determine config directory")]
    NoConfigDir,
}

/// Result type alias using ConfigError.
pub type Result<T> = std::result::Result<T, ConfigError>;
