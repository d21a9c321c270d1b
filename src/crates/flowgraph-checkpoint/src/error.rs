//! Error types for checkpoint store operations

use thiserror::Error;

/// Result type for checkpoint store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur during checkpoint store operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// No checkpoint exists for the conversation
    #[error("Conversation not found: {0}")]
    NotFound(String),

    /// An append did not extend the conversation's history
    ///
    /// Raised when the checkpoint's ordinal is not exactly one past the
    /// latest stored ordinal. This is the single-writer guarantee: two
    /// concurrent runs can never both commit at overlapping ordinals.
    #[error("Ordinal conflict for conversation {conversation_id}: expected {expected}, got {got}")]
    OrdinalConflict {
        conversation_id: String,
        expected: u64,
        got: u64,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend storage error
    #[error("Storage error: {0}")]
    Storage(String),
}
