//! Error types for the stress early-warning pipeline

use std::path::PathBuf;

use thiserror::Error;

use crate::types::ValidationErrors;

/// Errors that can occur while loading artifacts or serving a submission
#[derive(Debug, Error)]
pub enum EwsError {
    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to load model at: {path}: {reason}")]
    ModelLoad { path: PathBuf, reason: String },

    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error("Prediction failed: {0}")]
    Prediction(String),

    #[error("Probability not available: {0}")]
    ProbabilityUnavailable(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl EwsError {
    /// Field-level errors, if this failure came from input validation
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            EwsError::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}
