//! Error types for qaloop
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// All error types that can surface from the orchestration core
#[derive(Debug, Error)]
pub enum QaLoopError {
    /// An internal invariant was broken; the run cannot continue
    #[error("Contract violation: {0}")]
    ContractViolation(String),

    /// A collaborator call failed (only surfaces outside the stage adapters)
    #[error("Collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),

    /// Configuration could not be loaded or is invalid
    #[error("Config error: {0}")]
    Config(String),

    /// Artifact or report persistence failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Auxiliary service launch failed
    #[error("Launcher error: {0}")]
    Launcher(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl QaLoopError {
    /// Shorthand for building a contract violation
    pub fn contract(msg: impl Into<String>) -> Self {
        QaLoopError::ContractViolation(msg.into())
    }

    pub fn is_contract_violation(&self) -> bool {
        matches!(self, QaLoopError::ContractViolation(_))
    }
}

/// Failures reported by an external collaborator.
///
/// The core never looks past the variant: both are recovered by degrading.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    /// Network error, timeout, or non-success status
    #[error("{service} unreachable: {reason}")]
    Unreachable { service: String, reason: String },

    /// Reachable, but the response could not be normalized
    #[error("{service} returned a malformed response: {reason}")]
    Malformed { service: String, reason: String },
}

impl CollaboratorError {
    pub fn unreachable(service: impl Into<String>, reason: impl ToString) -> Self {
        CollaboratorError::Unreachable {
            service: service.into(),
            reason: reason.to_string(),
        }
    }

    pub fn malformed(service: impl Into<String>, reason: impl ToString) -> Self {
        CollaboratorError::Malformed {
            service: service.into(),
            reason: reason.to_string(),
        }
    }

    /// Map a reqwest failure onto the taxonomy. Body decoding errors are malformed
    /// responses; everything else (connect, timeout, status) is unreachable.
    pub fn from_reqwest(service: impl Into<String>, err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::malformed(service, err)
        } else {
            Self::unreachable(service, err)
        }
    }
}

/// Result type alias for qaloop operations
pub type Result<T> = std::result::Result<T, QaLoopError>;
