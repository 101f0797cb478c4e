//! Error types for the codec and ABI layer.

use thiserror::Error;

/// Errors produced by [`crate::serialize`] and [`crate::deserialize`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Input bytes do not match the requested type.
    #[error("Schema decode error in '{type_name}' at offset {offset}: {reason}")]
    SchemaDecode {
        type_name: String,
        offset: usize,
        reason: String,
    },

    /// A value does not fit the requested type.
    #[error("Cannot encode '{type_name}': {reason}")]
    Encode { type_name: String, reason: String },
}

impl CodecError {
    /// Byte offset of a decode failure.
    pub fn offset(&self) -> Option<usize> {
        match self {
            CodecError::SchemaDecode { offset, .. } => Some(*offset),
            CodecError::Encode { .. } => None,
        }
    }

    pub fn type_name(&self) -> &str {
        match self {
            CodecError::SchemaDecode { type_name, .. } | CodecError::Encode { type_name, .. } => {
                type_name
            }
        }
    }
}

/// Errors from loading ABIs or decoding against them.
#[derive(Debug, Error)]
pub enum AbiError {
    #[error("Invalid ABI JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("Unsupported ABI version '{version}'")]
    UnsupportedVersion { version: String },

    #[error("Type '{name}' is defined more than once")]
    DuplicateType { name: String },

    #[error("Type '{type_name}' referenced by '{referenced_by}' is not defined")]
    UnknownType {
        type_name: String,
        referenced_by: String,
    },

    #[error("Action '{action}' is not declared in the ABI")]
    MissingAction { action: String },
}
