//! Error types for catalog record generation

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Lookup of {url} failed: {reason}")]
    LookupFailure { url: String, reason: String },

    #[error("Registry holds more than one row for identifier '{identifier}' at path '{path}'")]
    IdentityConflict { identifier: String, path: String },

    #[error("Cannot coerce {field} value {value} to an integer")]
    TypeCoercionFailure { field: String, value: String },

    #[error("Failed to load document from {path}: {reason}")]
    LoadError { path: String, reason: String },

    #[error("Invalid path: {0}")]
    InvalidPath(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

impl CatalogError {
    /// Whether the error only degrades a single item instead of aborting the run
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CatalogError::LookupFailure { .. })
    }
}
