//! Error types for the API catalog

use std::io;

use thiserror::Error;

/// Result type alias for the API catalog
pub type Result<T> = std::result::Result<T, Error>;

/// API catalog errors
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed path, method or parameter shape
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No catalog entry for the requested operation
    #[error("Operation not found: {method} {path}")]
    OperationNotFound {
        /// Requested method
        method: String,
        /// Requested path template
        path: String,
    },

    /// Required input fields missing from the call
    #[error("Missing required parameters: {}", .0.join(", "))]
    MissingRequired(Vec<String>),

    /// Path placeholders left over after interpolation
    #[error("Unresolved path parameters: {}", .0.join(", "))]
    UnresolvedPlaceholders(Vec<String>),

    /// Invalid discovery filter
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    /// Chunk file could not be read, parsed or written
    #[error("Catalog store error at {path}: {message}")]
    Store {
        /// Chunk file path
        path: String,
        /// What went wrong
        message: String,
    },

    /// Sync run aborted
    #[error("Sync error: {0}")]
    Sync(String),

    /// Transport error
    #[error("Transport error: {0}")]
    Transport(String),

    /// Operation timed out
    #[error("Timeout: {0}")]
    Timeout(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a store error for a chunk file
    pub fn store(path: impl std::fmt::Display, message: impl Into<String>) -> Self {
        Self::Store {
            path: path.to_string(),
            message: message.into(),
        }
    }

    /// Classification tag surfaced in failure metadata
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) | Self::InvalidFilter(_) => "input_error",
            Self::OperationNotFound { .. } => "resolution_error",
            Self::MissingRequired(_) => "validation_error",
            Self::UnresolvedPlaceholders(_) => "interpolation_error",
            Self::Transport(_) | Self::Http(_) => "transport_error",
            Self::Timeout(_) => "timeout",
            Self::Store { .. } | Self::Io(_) => "storage_error",
            Self::Sync(_) | Self::Json(_) => "sync_error",
            Self::Config(_) => "config_error",
            Self::Internal(_) => "internal_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_required_lists_every_name() {
        let err = Error::MissingRequired(vec!["id".to_string(), "title".to_string()]);
        assert_eq!(err.to_string(), "Missing required parameters: id, title");
        assert_eq!(err.kind(), "validation_error");
    }

    #[test]
    fn test_unresolved_placeholders_message() {
        let err = Error::UnresolvedPlaceholders(vec!["block_id".to_string()]);
        assert_eq!(err.to_string(), "Unresolved path parameters: block_id");
        assert_eq!(err.kind(), "interpolation_error");
    }

    #[test]
    fn test_kind_classification() {
        let not_found = Error::OperationNotFound {
            method: "GET".to_string(),
            path: "/nope".to_string(),
        };
        assert_eq!(not_found.to_string(), "Operation not found: GET /nope");
        assert_eq!(not_found.kind(), "resolution_error");
        assert_eq!(Error::Timeout("x".into()).kind(), "timeout");
        assert_eq!(Error::store("tools_1.json", "bad").kind(), "storage_error");
    }
}
