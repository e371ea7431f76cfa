//! Repository for conversation data access operations.

use crate::entities::{
    Conversation, ConversationKind, CreateConversationRequest, LastMessage, Participant,
    ParticipantRole,
};
use crate::types::{StoreError, StoreResult};
use sqlx::{Row, SqlitePool};
use tracing::info;

/// Repository for conversation database operations
#[derive(Clone)]
pub struct ConversationRepository {
    pool: SqlitePool,
}

impl ConversationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new conversation.
    ///
    /// Private conversations are deduplicated: creating a private
    /// conversation for a pair that already shares one returns the existing
    /// conversation.
    pub async fn create(&self, request: &CreateConversationRequest) -> StoreResult<Conversation> {
        if request.participants.len() < 2 {
            return Err(StoreError::validation(
                "a conversation requires at least two participants",
            ));
        }
        if request.kind == ConversationKind::Private && request.participants.len() != 2 {
            return Err(StoreError::validation(
                "private conversations must have exactly two participants",
            ));
        }
        let group_name = match request.kind {
            ConversationKind::Group => {
                let name = request
                    .group_name
                    .as_deref()
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .ok_or_else(|| StoreError::validation("group conversations require a name"))?;
                Some(name.to_string())
            }
            ConversationKind::Private => None,
        };

        // Snapshot display names and verify every participant exists.
        let mut resolved = Vec::with_capacity(request.participants.len());
        for participant in &request.participants {
            let row = sqlx::query("SELECT display_name FROM identities WHERE id = ?")
                .bind(&participant.identity_id)
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(|| StoreError::identity_not_found(&participant.identity_id))?;
            let display_name: String = row.try_get("display_name")?;
            resolved.push((
                participant.identity_id.clone(),
                display_name,
                participant.role.unwrap_or(ParticipantRole::Member),
            ));
        }

        if request.kind == ConversationKind::Private {
            if let Some(existing) = self
                .find_private_pair(&resolved[0].0, &resolved[1].0)
                .await?
            {
                return Ok(existing);
            }
        }

        let id = cuid2::create_id();
        let now = chrono::Utc::now().to_rfc3339();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO conversations (id, kind, group_name, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(request.kind.as_str())
        .bind(&group_name)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        for (identity_id, display_name, role) in &resolved {
            sqlx::query(
                "INSERT INTO participants (conversation_id, identity_id, display_name, role, unread_count)
                 VALUES (?, ?, ?, ?, 0)",
            )
            .bind(&id)
            .bind(identity_id)
            .bind(display_name)
            .bind(role.as_str())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(
            conversation_id = %id,
            kind = request.kind.as_str(),
            participant_count = resolved.len(),
            "created conversation"
        );

        Ok(Conversation {
            id,
            kind: request.kind,
            group_name,
            participants: resolved
                .into_iter()
                .map(|(identity_id, display_name, role)| Participant {
                    identity_id,
                    display_name,
                    role,
                    unread_count: 0,
                })
                .collect(),
            last_message: None,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Find a conversation (with its participants) by id
    pub async fn find_by_id(&self, conversation_id: &str) -> StoreResult<Option<Conversation>> {
        let row = sqlx::query(
            "SELECT id, kind, group_name, last_message_id, last_message_content,
                    last_message_sender_id, last_message_sender_name,
                    last_message_timestamp_ms, created_at, updated_at
             FROM conversations WHERE id = ?",
        )
        .bind(conversation_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let participants = self.load_participants(conversation_id).await?;
        Ok(Some(map_conversation_row(row, participants)?))
    }

    /// Find all conversations an identity participates in, most recently
    /// updated first
    pub async fn find_by_participant(&self, identity_id: &str) -> StoreResult<Vec<Conversation>> {
        let ids: Vec<String> = sqlx::query_scalar(
            "SELECT c.id FROM conversations c
             JOIN participants p ON p.conversation_id = c.id
             WHERE p.identity_id = ?
             ORDER BY c.updated_at DESC",
        )
        .bind(identity_id)
        .fetch_all(&self.pool)
        .await?;

        let mut conversations = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(conversation) = self.find_by_id(&id).await? {
                conversations.push(conversation);
            }
        }
        Ok(conversations)
    }

    /// Apply the per-message conversation update in one transaction: the
    /// last-message summary plus the unread-count changes for every affected
    /// participant. Counts are adjusted SQL-side (reset to zero or
    /// incremented in place) so concurrent writers cannot lose updates.
    /// Returns the refreshed participant list.
    pub async fn apply_message_update(
        &self,
        conversation_id: &str,
        summary: &LastMessage,
        reset_to_zero: &[String],
        increment: &[String],
    ) -> StoreResult<Vec<Participant>> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE conversations
             SET last_message_id = ?, last_message_content = ?, last_message_sender_id = ?,
                 last_message_sender_name = ?, last_message_timestamp_ms = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&summary.message_id)
        .bind(&summary.content)
        .bind(&summary.sender_id)
        .bind(&summary.sender_name)
        .bind(summary.timestamp_ms)
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(conversation_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::conversation_not_found(conversation_id));
        }

        for identity_id in reset_to_zero {
            sqlx::query(
                "UPDATE participants SET unread_count = 0
                 WHERE conversation_id = ? AND identity_id = ?",
            )
            .bind(conversation_id)
            .bind(identity_id)
            .execute(&mut *tx)
            .await?;
        }

        for identity_id in increment {
            sqlx::query(
                "UPDATE participants SET unread_count = unread_count + 1
                 WHERE conversation_id = ? AND identity_id = ?",
            )
            .bind(conversation_id)
            .bind(identity_id)
            .execute(&mut *tx)
            .await?;
        }

        let rows = sqlx::query(
            "SELECT identity_id, display_name, role, unread_count
             FROM participants WHERE conversation_id = ? ORDER BY rowid",
        )
        .bind(conversation_id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        rows.into_iter().map(map_participant_row).collect()
    }

    /// Zero the unread count for one participant of a conversation
    pub async fn reset_unread(&self, conversation_id: &str, identity_id: &str) -> StoreResult<()> {
        sqlx::query(
            "UPDATE participants SET unread_count = 0
             WHERE conversation_id = ? AND identity_id = ?",
        )
        .bind(conversation_id)
        .bind(identity_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_private_pair(
        &self,
        first_id: &str,
        second_id: &str,
    ) -> StoreResult<Option<Conversation>> {
        let existing: Option<String> = sqlx::query_scalar(
            "SELECT c.id FROM conversations c
             JOIN participants p1 ON p1.conversation_id = c.id AND p1.identity_id = ?
             JOIN participants p2 ON p2.conversation_id = c.id AND p2.identity_id = ?
             WHERE c.kind = 'private'",
        )
        .bind(first_id)
        .bind(second_id)
        .fetch_optional(&self.pool)
        .await?;

        match existing {
            Some(id) => self.find_by_id(&id).await,
            None => Ok(None),
        }
    }

    async fn load_participants(&self, conversation_id: &str) -> StoreResult<Vec<Participant>> {
        let rows = sqlx::query(
            "SELECT identity_id, display_name, role, unread_count
             FROM participants WHERE conversation_id = ? ORDER BY rowid",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(map_participant_row).collect()
    }
}

fn map_participant_row(row: sqlx::sqlite::SqliteRow) -> StoreResult<Participant> {
    let role: String = row.try_get("role")?;
    Ok(Participant {
        identity_id: row.try_get("identity_id")?,
        display_name: row.try_get("display_name")?,
        role: ParticipantRole::from(role.as_str()),
        unread_count: row.try_get("unread_count")?,
    })
}

fn map_conversation_row(
    row: sqlx::sqlite::SqliteRow,
    participants: Vec<Participant>,
) -> StoreResult<Conversation> {
    let kind: String = row.try_get("kind")?;
    let last_message_id: Option<String> = row.try_get("last_message_id")?;

    let last_message = match last_message_id {
        Some(message_id) => Some(LastMessage {
            message_id,
            content: row.try_get("last_message_content")?,
            sender_id: row.try_get("last_message_sender_id")?,
            sender_name: row.try_get("last_message_sender_name")?,
            timestamp_ms: row.try_get("last_message_timestamp_ms")?,
        }),
        None => None,
    };

    Ok(Conversation {
        id: row.try_get("id")?,
        kind: ConversationKind::from(kind.as_str()),
        group_name: row.try_get("group_name")?,
        participants,
        last_message,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{CreateIdentityRequest, NewParticipant};
    use crate::repos::IdentityRepository;
    use crate::{connection::prepare_database, migrations::run_migrations};
    use intercom_config::DatabaseConfig;
    use tempfile::TempDir;

    async fn create_test_pool() -> (SqlitePool, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test_conversations.db");
        let config = DatabaseConfig {
            url: format!("sqlite://{}", db_path.display()),
            max_connections: 1,
        };

        let pool = prepare_database(&config).await.unwrap();
        run_migrations(&pool).await.unwrap();
        (pool, temp_dir)
    }

    async fn seed_identity(pool: &SqlitePool, name: &str, email: &str) -> String {
        IdentityRepository::new(pool.clone())
            .create(&CreateIdentityRequest {
                display_name: name.to_string(),
                email: email.to_string(),
            })
            .await
            .unwrap()
            .id
    }

    fn private_request(first: &str, second: &str) -> CreateConversationRequest {
        CreateConversationRequest {
            kind: ConversationKind::Private,
            group_name: None,
            participants: vec![
                NewParticipant {
                    identity_id: first.to_string(),
                    role: None,
                },
                NewParticipant {
                    identity_id: second.to_string(),
                    role: None,
                },
            ],
        }
    }

    #[tokio::test]
    async fn create_private_conversation_snapshots_names() {
        let (pool, _temp_dir) = create_test_pool().await;
        let alice = seed_identity(&pool, "Alice", "alice@example.com").await;
        let bob = seed_identity(&pool, "Bob", "bob@example.com").await;
        let repo = ConversationRepository::new(pool);

        let conversation = repo.create(&private_request(&alice, &bob)).await.unwrap();
        assert_eq!(conversation.kind, ConversationKind::Private);
        assert_eq!(conversation.participants.len(), 2);
        assert_eq!(conversation.participants[0].display_name, "Alice");
        assert_eq!(conversation.participants[1].display_name, "Bob");
        assert!(conversation.last_message.is_none());
    }

    #[tokio::test]
    async fn private_pair_is_deduplicated() {
        let (pool, _temp_dir) = create_test_pool().await;
        let alice = seed_identity(&pool, "Alice", "alice@example.com").await;
        let bob = seed_identity(&pool, "Bob", "bob@example.com").await;
        let repo = ConversationRepository::new(pool);

        let first = repo.create(&private_request(&alice, &bob)).await.unwrap();
        let second = repo.create(&private_request(&bob, &alice)).await.unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn group_conversation_requires_name() {
        let (pool, _temp_dir) = create_test_pool().await;
        let alice = seed_identity(&pool, "Alice", "alice@example.com").await;
        let bob = seed_identity(&pool, "Bob", "bob@example.com").await;
        let repo = ConversationRepository::new(pool);

        let mut request = private_request(&alice, &bob);
        request.kind = ConversationKind::Group;

        let error = repo.create(&request).await.unwrap_err();
        assert!(matches!(error, StoreError::Validation { .. }));

        request.group_name = Some("fellowship".to_string());
        let conversation = repo.create(&request).await.unwrap();
        assert_eq!(conversation.group_name.as_deref(), Some("fellowship"));
    }

    #[tokio::test]
    async fn apply_message_update_adjusts_counts_and_summary() {
        let (pool, _temp_dir) = create_test_pool().await;
        let alice = seed_identity(&pool, "Alice", "alice@example.com").await;
        let bob = seed_identity(&pool, "Bob", "bob@example.com").await;
        let repo = ConversationRepository::new(pool);

        let conversation = repo.create(&private_request(&alice, &bob)).await.unwrap();
        let summary = LastMessage {
            message_id: "m1".to_string(),
            content: "hi".to_string(),
            sender_id: alice.clone(),
            sender_name: "Alice".to_string(),
            timestamp_ms: 1_000,
        };

        let participants = repo
            .apply_message_update(&conversation.id, &summary, &[], &[bob.clone()])
            .await
            .unwrap();
        let bob_row = participants
            .iter()
            .find(|p| p.identity_id == bob)
            .unwrap();
        assert_eq!(bob_row.unread_count, 1);

        let participants = repo
            .apply_message_update(&conversation.id, &summary, &[], &[bob.clone()])
            .await
            .unwrap();
        let bob_row = participants
            .iter()
            .find(|p| p.identity_id == bob)
            .unwrap();
        assert_eq!(bob_row.unread_count, 2);

        let reloaded = repo.find_by_id(&conversation.id).await.unwrap().unwrap();
        let last = reloaded.last_message.unwrap();
        assert_eq!(last.message_id, "m1");
        assert_eq!(last.sender_name, "Alice");

        repo.reset_unread(&conversation.id, &bob).await.unwrap();
        let reloaded = repo.find_by_id(&conversation.id).await.unwrap().unwrap();
        assert_eq!(reloaded.participant(&bob).unwrap().unread_count, 0);
    }
}
