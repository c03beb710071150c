//! Error types for the Nova planner.
//!
//! This module defines the error enum shared by the goal store, the sharing codec,
//! the collaboration endpoints and the notification scheduler. Every variant maps to
//! a short machine-readable code so callable endpoints can report failures the same
//! way the CLI does.

use std::{io, path::PathBuf};

use serde::Serialize;
use thiserror::Error;

/// The main error type for the Nova planner.
#[derive(Error, Debug)]
pub enum NovaError {
    /// Errors related to file I/O operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Errors related to serialization/deserialization operations.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP transport failures (link shortener, AI advisor).
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A remote service answered, but not with something usable.
    #[error("Remote service error: {message}")]
    RemoteService { message: String },

    /// Goal was not found when performing an operation.
    #[error("Goal not found: {id}")]
    GoalNotFound { id: i64 },

    /// Folder was not found when performing an operation.
    #[error("Folder not found: {id}")]
    FolderNotFound { id: i64 },

    /// Invitation was not found when accepting it.
    #[error("Invitation not found: {id}")]
    InvitationNotFound { id: String },

    /// A required field is missing or a value is out of range.
    #[error("Validation failed: {message}")]
    Validation { message: String },

    /// Imported or shared data could not be decoded or failed the shape check.
    #[error("Import failed: {message}")]
    ImportFailed { message: String },

    /// The caller is not signed in.
    #[error("Authentication required: {message}")]
    Unauthenticated { message: String },

    /// The caller is signed in but may not perform the operation.
    #[error("Permission denied: {message}")]
    PermissionDenied { message: String },

    /// Errors related to configuration.
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// Directory creation or access failed.
    #[error("Failed to create or access directory: {path}")]
    DirectoryError { path: PathBuf },

    /// Errors related to the notification scheduler.
    #[error("Scheduler error: {message}")]
    Scheduler { message: String },

    /// for mutex lock acquisition issues
    #[error("{message}")]
    LockAcquisitionFailed { message: String },

    /// Generic application error with a custom message.
    #[error("{message}")]
    ApplicationError { message: String },
}

/// Machine-readable failure shape returned by callable endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorPayload {
    pub code: &'static str,
    pub message: String,
}

impl NovaError {
    /// Short error code, in the vocabulary callable endpoints use.
    pub fn code(&self) -> &'static str {
        match self {
            NovaError::Unauthenticated { .. } => "unauthenticated",
            NovaError::PermissionDenied { .. } => "permission-denied",
            NovaError::Validation { .. } | NovaError::ImportFailed { .. } => "invalid-argument",
            NovaError::GoalNotFound { .. }
            | NovaError::FolderNotFound { .. }
            | NovaError::InvitationNotFound { .. } => "not-found",
            _ => "internal",
        }
    }

    /// Converts the error into the `{code, message}` payload.
    pub fn to_payload(&self) -> ErrorPayload {
        ErrorPayload {
            code: self.code(),
            message: self.to_string(),
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        NovaError::Validation {
            message: message.into(),
        }
    }

    pub(crate) fn import_failed(message: impl Into<String>) -> Self {
        NovaError::ImportFailed {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_callable_vocabulary() {
        let unauth = NovaError::Unauthenticated {
            message: "sign in".to_string(),
        };
        assert_eq!(unauth.code(), "unauthenticated");
        assert_eq!(NovaError::validation("missing wish").code(), "invalid-argument");
        assert_eq!(NovaError::import_failed("bad json").code(), "invalid-argument");
        assert_eq!(NovaError::GoalNotFound { id: 7 }.code(), "not-found");
        assert_eq!(
            NovaError::Scheduler {
                message: "stopped".to_string()
            }
            .code(),
            "internal"
        );
    }

    #[test]
    fn payload_carries_display_message() {
        let payload = NovaError::FolderNotFound { id: 42 }.to_payload();
        assert_eq!(payload.code, "not-found");
        assert_eq!(payload.message, "Folder not found: 42");
    }
}
