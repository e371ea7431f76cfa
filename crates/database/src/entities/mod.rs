//! Entity definitions for the persistence store.

pub mod conversation;
pub mod identity;
pub mod message;

pub use conversation::{
    Conversation, ConversationKind, CreateConversationRequest, LastMessage, NewParticipant,
    Participant, ParticipantRole,
};
pub use identity::{CreateIdentityRequest, Identity};
pub use message::{CreateMessageRequest, Message, MessageStatus};
