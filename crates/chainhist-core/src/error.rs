//! Error types shared by the ChainHist crates.

use thiserror::Error;

/// Errors raised while building or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid policy entry '{entry}': expected chain::account::action or chain::account::*")]
    InvalidPolicyEntry { entry: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Errors from the durable stores (ABI key/value store, block index, record writer).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Malformed key '{key}'")]
    MalformedKey { key: String },
}
