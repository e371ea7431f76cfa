//! Error types for the coordinator.

use intercom_database::StoreError;
use thiserror::Error;

/// Result type alias for coordinator operations
pub type CoordinatorResult<T> = Result<T, CoordinatorError>;

/// Failure taxonomy for event handling. Every variant is caught at the
/// per-event-handler boundary; one connection's failure never reaches
/// another connection.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    #[error("identity {identity_id} is not a participant of conversation {conversation_id}")]
    NotParticipant {
        identity_id: String,
        conversation_id: String,
    },

    #[error("conversation not found: {id}")]
    ConversationNotFound { id: String },

    #[error("persistence failure: {0}")]
    Persistence(#[from] StoreError),
}

impl CoordinatorError {
    /// Create an invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a not-participant error
    pub fn not_participant(
        identity_id: impl Into<String>,
        conversation_id: impl Into<String>,
    ) -> Self {
        Self::NotParticipant {
            identity_id: identity_id.into(),
            conversation_id: conversation_id.into(),
        }
    }

    /// Create a not found error for conversations
    pub fn conversation_not_found(id: impl Into<String>) -> Self {
        Self::ConversationNotFound { id: id.into() }
    }
}
