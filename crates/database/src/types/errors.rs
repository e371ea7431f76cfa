//! Error types for the persistence store.

use thiserror::Error;

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Main error type for the persistence store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("connection error: {message}")]
    Connection { message: String },

    #[error("identity not found: {id}")]
    IdentityNotFound { id: String },

    #[error("conversation not found: {id}")]
    ConversationNotFound { id: String },

    #[error("message not found: {id}")]
    MessageNotFound { id: String },

    #[error("validation error: {message}")]
    Validation { message: String },

    #[error("migration error: {message}")]
    Migration { message: String },
}

impl StoreError {
    /// Create a not found error for identities
    pub fn identity_not_found(id: impl Into<String>) -> Self {
        Self::IdentityNotFound { id: id.into() }
    }

    /// Create a not found error for conversations
    pub fn conversation_not_found(id: impl Into<String>) -> Self {
        Self::ConversationNotFound { id: id.into() }
    }

    /// Create a not found error for messages
    pub fn message_not_found(id: impl Into<String>) -> Self {
        Self::MessageNotFound { id: id.into() }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}
