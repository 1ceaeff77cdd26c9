// src/infra/errors.rs — Error types for Parley

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParleyError {
    // Auth errors
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    // Missing data
    #[error("{0} not found")]
    NotFound(&'static str),

    // State-precondition violations (already active, already joined, at capacity)
    #[error("Conflict: {0}")]
    Conflict(String),

    // Call provider / real-time AI endpoint / chat provider failures
    #[error("Upstream '{service}' error: {message}")]
    Upstream {
        service: &'static str,
        message: String,
    },

    // Malformed input
    #[error("Validation error: {0}")]
    Validation(String),

    // Infra
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ParleyError {
    pub fn upstream(service: &'static str, err: impl std::fmt::Display) -> Self {
        ParleyError::Upstream {
            service,
            message: err.to_string(),
        }
    }

    /// True for failures of an external collaborator rather than of this
    /// server or its caller.
    pub fn is_upstream(&self) -> bool {
        matches!(self, ParleyError::Upstream { .. })
    }
}

pub type Result<T> = std::result::Result<T, ParleyError>;
