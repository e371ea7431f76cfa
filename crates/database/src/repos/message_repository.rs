//! Repository for message data access operations.

use crate::entities::{CreateMessageRequest, Message, MessageStatus};
use crate::types::StoreResult;
use sqlx::{Row, SqlitePool};

/// Repository for message database operations
#[derive(Clone)]
pub struct MessageRepository {
    pool: SqlitePool,
}

impl MessageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Persist a new message with status `sent`
    pub async fn create(&self, request: &CreateMessageRequest) -> StoreResult<Message> {
        let id = cuid2::create_id();
        let created_at_ms = chrono::Utc::now().timestamp_millis();

        sqlx::query(
            "INSERT INTO messages (id, conversation_id, sender_id, content, status, is_deleted, is_edited, created_at_ms)
             VALUES (?, ?, ?, ?, 'sent', 0, 0, ?)",
        )
        .bind(&id)
        .bind(&request.conversation_id)
        .bind(&request.sender_id)
        .bind(&request.content)
        .bind(created_at_ms)
        .execute(&self.pool)
        .await?;

        Ok(Message {
            id,
            conversation_id: request.conversation_id.clone(),
            sender_id: request.sender_id.clone(),
            content: request.content.clone(),
            status: MessageStatus::Sent,
            is_deleted: false,
            is_edited: false,
            created_at_ms,
        })
    }

    /// List messages for a conversation, oldest first, optionally only those
    /// created strictly before `before_ms`
    pub async fn find_by_conversation(
        &self,
        conversation_id: &str,
        before_ms: Option<i64>,
        limit: i64,
    ) -> StoreResult<Vec<Message>> {
        let rows = match before_ms {
            Some(before) => {
                sqlx::query(
                    "SELECT id, conversation_id, sender_id, content, status, is_deleted, is_edited, created_at_ms
                     FROM messages
                     WHERE conversation_id = ? AND created_at_ms < ?
                     ORDER BY created_at_ms DESC, rowid DESC
                     LIMIT ?",
                )
                .bind(conversation_id)
                .bind(before)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT id, conversation_id, sender_id, content, status, is_deleted, is_edited, created_at_ms
                     FROM messages
                     WHERE conversation_id = ?
                     ORDER BY created_at_ms DESC, rowid DESC
                     LIMIT ?",
                )
                .bind(conversation_id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };

        let mut messages = rows
            .into_iter()
            .map(map_message_row)
            .collect::<StoreResult<Vec<_>>>()?;
        messages.reverse();
        Ok(messages)
    }

    /// Transition a message from `sent` to `read`. Returns whether the row
    /// actually changed; already-read messages are left untouched so the
    /// status never regresses.
    pub async fn mark_read(&self, message_id: &str) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE messages SET status = 'read' WHERE id = ? AND status = 'sent'")
            .bind(message_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Messages in a conversation that someone other than `reader_id` sent
    /// and that are not yet read, oldest first
    pub async fn find_unread_for_reader(
        &self,
        conversation_id: &str,
        reader_id: &str,
    ) -> StoreResult<Vec<Message>> {
        let rows = sqlx::query(
            "SELECT id, conversation_id, sender_id, content, status, is_deleted, is_edited, created_at_ms
             FROM messages
             WHERE conversation_id = ? AND sender_id != ? AND status != 'read' AND is_deleted = 0
             ORDER BY created_at_ms ASC, rowid ASC",
        )
        .bind(conversation_id)
        .bind(reader_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(map_message_row).collect()
    }
}

fn map_message_row(row: sqlx::sqlite::SqliteRow) -> StoreResult<Message> {
    let status: String = row.try_get("status")?;
    let is_deleted: i64 = row.try_get("is_deleted")?;
    let is_edited: i64 = row.try_get("is_edited")?;

    Ok(Message {
        id: row.try_get("id")?,
        conversation_id: row.try_get("conversation_id")?,
        sender_id: row.try_get("sender_id")?,
        content: row.try_get("content")?,
        status: MessageStatus::from(status.as_str()),
        is_deleted: is_deleted != 0,
        is_edited: is_edited != 0,
        created_at_ms: row.try_get("created_at_ms")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{
        ConversationKind, CreateConversationRequest, CreateIdentityRequest, NewParticipant,
    };
    use crate::repos::{ConversationRepository, IdentityRepository};
    use crate::{connection::prepare_database, migrations::run_migrations};
    use intercom_config::DatabaseConfig;
    use tempfile::TempDir;

    async fn create_test_pool() -> (SqlitePool, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test_messages.db");
        let config = DatabaseConfig {
            url: format!("sqlite://{}", db_path.display()),
            max_connections: 1,
        };

        let pool = prepare_database(&config).await.unwrap();
        run_migrations(&pool).await.unwrap();
        (pool, temp_dir)
    }

    async fn seed_conversation(pool: &SqlitePool) -> (String, String, String) {
        let identities = IdentityRepository::new(pool.clone());
        let alice = identities
            .create(&CreateIdentityRequest {
                display_name: "Alice".to_string(),
                email: "alice@example.com".to_string(),
            })
            .await
            .unwrap()
            .id;
        let bob = identities
            .create(&CreateIdentityRequest {
                display_name: "Bob".to_string(),
                email: "bob@example.com".to_string(),
            })
            .await
            .unwrap()
            .id;

        let conversation = ConversationRepository::new(pool.clone())
            .create(&CreateConversationRequest {
                kind: ConversationKind::Private,
                group_name: None,
                participants: vec![
                    NewParticipant {
                        identity_id: alice.clone(),
                        role: None,
                    },
                    NewParticipant {
                        identity_id: bob.clone(),
                        role: None,
                    },
                ],
            })
            .await
            .unwrap();

        (conversation.id, alice, bob)
    }

    #[tokio::test]
    async fn create_and_list_messages_oldest_first() {
        let (pool, _temp_dir) = create_test_pool().await;
        let (conversation_id, alice, _bob) = seed_conversation(&pool).await;
        let repo = MessageRepository::new(pool);

        for content in ["one", "two", "three"] {
            repo.create(&CreateMessageRequest {
                conversation_id: conversation_id.clone(),
                sender_id: alice.clone(),
                content: content.to_string(),
            })
            .await
            .unwrap();
        }

        let messages = repo
            .find_by_conversation(&conversation_id, None, 50)
            .await
            .unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].content, "one");
        assert_eq!(messages[2].content, "three");
        assert!(messages.iter().all(|m| m.status == MessageStatus::Sent));
    }

    #[tokio::test]
    async fn mark_read_never_regresses() {
        let (pool, _temp_dir) = create_test_pool().await;
        let (conversation_id, alice, _bob) = seed_conversation(&pool).await;
        let repo = MessageRepository::new(pool);

        let message = repo
            .create(&CreateMessageRequest {
                conversation_id: conversation_id.clone(),
                sender_id: alice,
                content: "hi".to_string(),
            })
            .await
            .unwrap();

        assert!(repo.mark_read(&message.id).await.unwrap());
        // Second transition is a no-op.
        assert!(!repo.mark_read(&message.id).await.unwrap());
    }

    #[tokio::test]
    async fn unread_query_skips_own_and_read_messages() {
        let (pool, _temp_dir) = create_test_pool().await;
        let (conversation_id, alice, bob) = seed_conversation(&pool).await;
        let repo = MessageRepository::new(pool);

        let from_alice = repo
            .create(&CreateMessageRequest {
                conversation_id: conversation_id.clone(),
                sender_id: alice.clone(),
                content: "hello bob".to_string(),
            })
            .await
            .unwrap();
        repo.create(&CreateMessageRequest {
            conversation_id: conversation_id.clone(),
            sender_id: bob.clone(),
            content: "hello alice".to_string(),
        })
        .await
        .unwrap();

        let unread_for_bob = repo
            .find_unread_for_reader(&conversation_id, &bob)
            .await
            .unwrap();
        assert_eq!(unread_for_bob.len(), 1);
        assert_eq!(unread_for_bob[0].id, from_alice.id);

        repo.mark_read(&from_alice.id).await.unwrap();
        let unread_for_bob = repo
            .find_unread_for_reader(&conversation_id, &bob)
            .await
            .unwrap();
        assert!(unread_for_bob.is_empty());
    }
}
