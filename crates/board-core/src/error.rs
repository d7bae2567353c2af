//! Unified error types for the board exporter

use std::time::Duration;
use thiserror::Error;

/// Unified error type for all board operations
#[derive(Error, Debug)]
pub enum BoardError {
    // Data source errors
    #[error("Could not fetch {resource}: {reason}")]
    Fetch { resource: String, reason: String },

    #[error("Could not update note for column {column}: {reason}")]
    WriteBack { column: String, reason: String },

    #[error("Could not count {query}: {reason}")]
    CountQuery { query: String, reason: String },

    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },

    // Board shape errors
    #[error("Duplicate column name: {0}")]
    DuplicateColumn(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl BoardError {
    /// Shorthand for a fetch failure on `resource`
    pub fn fetch(resource: impl Into<String>, reason: impl ToString) -> Self {
        Self::Fetch {
            resource: resource.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type alias using BoardError
pub type Result<T> = std::result::Result<T, BoardError>;
