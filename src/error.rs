//! Error types for traversal and the JSON codec

use thiserror::Error;

/// Result type for traversal operations
pub type Result<T> = std::result::Result<T, VisitError>;

/// Traversal errors. Every variant aborts the current traversal; replacements
/// committed before the failure stay in place.
#[derive(Error, Debug)]
pub enum VisitError {
    #[error("Unsupported mutation: {0}")]
    UnsupportedMutation(String),

    #[error("Traversal cancelled")]
    Cancelled,

    #[error("Slot at {path} no longer exists in its container")]
    DetachedSlot { path: String },

    #[error(transparent)]
    Hook(#[from] anyhow::Error),
}

impl VisitError {
    pub fn unsupported(message: impl Into<String>) -> Self {
        VisitError::UnsupportedMutation(message.into())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, VisitError::Cancelled)
    }
}

/// JSON codec errors
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Cycle detected while printing node at {path}")]
    Cycle { path: String },

    #[error("Invalid schema document: {0}")]
    InvalidDocument(String),
}
