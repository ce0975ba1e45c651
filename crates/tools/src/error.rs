//! Configuration error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading, validating, or consuming a deployment
/// configuration.
///
/// Every variant is terminal: callers must refuse to proceed rather than
/// substitute a default network, compiler, or key.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Failed to read .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid port {port} for network '{network}'. Must be between 1 and 65535")]
    InvalidPort { network: String, port: i64 },

    #[error("Network '{0}' is declared more than once")]
    DuplicateNetworkName(String),

    #[error("Invalid optimizer runs: {0}. Must be a positive integer")]
    InvalidOptimizerRuns(i64),

    #[error("Invalid config value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Unknown network: {0}")]
    UnknownNetwork(String),

    #[error("Missing secret: {0} is not set")]
    MissingSecret(String),

    #[error("Failed to construct signing provider for '{network}': {reason}")]
    ProviderConstructionFailed { network: String, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }
}
