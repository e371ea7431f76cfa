//! Intercom Persistence Store
//!
//! Durable records for identities, conversations, and messages, exposed
//! through repositories keyed by stable string identifiers. The store holds
//! no business logic; the realtime coordinator is its only consumer.

use intercom_config::DatabaseConfig;
use sqlx::SqlitePool;

pub mod connection;
pub mod entities;
pub mod migrations;
pub mod repos;
pub mod types;

pub use connection::prepare_database;
pub use migrations::run_migrations;

pub use repos::{ConversationRepository, IdentityRepository, MessageRepository};

pub use entities::{
    Conversation, ConversationKind, CreateConversationRequest, CreateIdentityRequest,
    CreateMessageRequest, Identity, LastMessage, Message, MessageStatus, NewParticipant,
    Participant, ParticipantRole,
};

pub use types::{StoreError, StoreResult};

/// Initialize the database: connect, apply PRAGMAs, run migrations
pub async fn initialize_database(config: &DatabaseConfig) -> StoreResult<SqlitePool> {
    let pool = prepare_database(config)
        .await
        .map_err(|e| StoreError::Connection {
            message: e.to_string(),
        })?;

    run_migrations(&pool).await?;

    Ok(pool)
}

/// Bundle of repositories over one pool; the single persistence handle the
/// coordinator sees
#[derive(Clone)]
pub struct Store {
    identities: IdentityRepository,
    conversations: ConversationRepository,
    messages: MessageRepository,
}

impl Store {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            identities: IdentityRepository::new(pool.clone()),
            conversations: ConversationRepository::new(pool.clone()),
            messages: MessageRepository::new(pool),
        }
    }

    pub fn identities(&self) -> &IdentityRepository {
        &self.identities
    }

    pub fn conversations(&self) -> &ConversationRepository {
        &self.conversations
    }

    pub fn messages(&self) -> &MessageRepository {
        &self.messages
    }
}
