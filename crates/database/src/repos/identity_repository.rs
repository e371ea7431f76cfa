//! Repository for identity data access operations.

use crate::entities::{CreateIdentityRequest, Identity};
use crate::types::{StoreError, StoreResult};
use sqlx::{Row, SqlitePool};
use tracing::info;

/// Repository for identity database operations
#[derive(Clone)]
pub struct IdentityRepository {
    pool: SqlitePool,
}

impl IdentityRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new identity. Creation is idempotent on email: when an
    /// identity with the same email already exists, the existing record is
    /// returned unchanged.
    pub async fn create(&self, request: &CreateIdentityRequest) -> StoreResult<Identity> {
        if request.display_name.trim().is_empty() {
            return Err(StoreError::validation("display name must not be empty"));
        }
        if request.email.trim().is_empty() {
            return Err(StoreError::validation("email must not be empty"));
        }

        if let Some(existing) = self.find_by_email(&request.email).await? {
            return Ok(existing);
        }

        let id = cuid2::create_id();
        let now = chrono::Utc::now();
        let now_rfc3339 = now.to_rfc3339();
        let last_seen_ms = now.timestamp_millis();

        sqlx::query(
            "INSERT INTO identities (id, display_name, email, last_seen_ms, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&request.display_name)
        .bind(&request.email)
        .bind(last_seen_ms)
        .bind(&now_rfc3339)
        .bind(&now_rfc3339)
        .execute(&self.pool)
        .await?;

        info!(identity_id = %id, email = %request.email, "created identity");

        Ok(Identity {
            id,
            display_name: request.display_name.clone(),
            email: request.email.clone(),
            last_seen_ms,
            created_at: now_rfc3339.clone(),
            updated_at: now_rfc3339,
        })
    }

    /// Find an identity by its stable id
    pub async fn find_by_id(&self, identity_id: &str) -> StoreResult<Option<Identity>> {
        let row = sqlx::query(
            "SELECT id, display_name, email, last_seen_ms, created_at, updated_at
             FROM identities WHERE id = ?",
        )
        .bind(identity_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(map_identity_row).transpose()
    }

    /// Find an identity by email
    pub async fn find_by_email(&self, email: &str) -> StoreResult<Option<Identity>> {
        let row = sqlx::query(
            "SELECT id, display_name, email, last_seen_ms, created_at, updated_at
             FROM identities WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.map(map_identity_row).transpose()
    }

    /// Record when an identity was last seen on a live connection
    pub async fn update_last_seen(&self, identity_id: &str, last_seen_ms: i64) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE identities SET last_seen_ms = ?, updated_at = ? WHERE id = ?",
        )
        .bind(last_seen_ms)
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(identity_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::identity_not_found(identity_id));
        }

        Ok(())
    }
}

fn map_identity_row(row: sqlx::sqlite::SqliteRow) -> StoreResult<Identity> {
    Ok(Identity {
        id: row.try_get("id")?,
        display_name: row.try_get("display_name")?,
        email: row.try_get("email")?,
        last_seen_ms: row.try_get("last_seen_ms")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{connection::prepare_database, migrations::run_migrations};
    use intercom_config::DatabaseConfig;
    use tempfile::TempDir;

    async fn create_test_pool() -> (SqlitePool, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test_identities.db");
        let config = DatabaseConfig {
            url: format!("sqlite://{}", db_path.display()),
            max_connections: 1,
        };

        let pool = prepare_database(&config).await.unwrap();
        run_migrations(&pool).await.unwrap();
        (pool, temp_dir)
    }

    #[tokio::test]
    async fn create_and_find_identity() {
        let (pool, _temp_dir) = create_test_pool().await;
        let repo = IdentityRepository::new(pool);

        let created = repo
            .create(&CreateIdentityRequest {
                display_name: "Alice".to_string(),
                email: "alice@example.com".to_string(),
            })
            .await
            .unwrap();

        let found = repo.find_by_id(&created.id).await.unwrap().unwrap();
        assert_eq!(found.display_name, "Alice");
        assert_eq!(found.email, "alice@example.com");

        let by_email = repo
            .find_by_email("alice@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_email.id, created.id);
    }

    #[tokio::test]
    async fn create_is_idempotent_on_email() {
        let (pool, _temp_dir) = create_test_pool().await;
        let repo = IdentityRepository::new(pool);

        let first = repo
            .create(&CreateIdentityRequest {
                display_name: "Alice".to_string(),
                email: "alice@example.com".to_string(),
            })
            .await
            .unwrap();

        let second = repo
            .create(&CreateIdentityRequest {
                display_name: "Someone Else".to_string(),
                email: "alice@example.com".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.display_name, "Alice");
    }

    #[tokio::test]
    async fn update_last_seen_requires_existing_identity() {
        let (pool, _temp_dir) = create_test_pool().await;
        let repo = IdentityRepository::new(pool);

        let error = repo.update_last_seen("missing", 42).await.unwrap_err();
        assert!(matches!(error, StoreError::IdentityNotFound { .. }));

        let created = repo
            .create(&CreateIdentityRequest {
                display_name: "Bob".to_string(),
                email: "bob@example.com".to_string(),
            })
            .await
            .unwrap();

        repo.update_last_seen(&created.id, 1_234).await.unwrap();
        let found = repo.find_by_id(&created.id).await.unwrap().unwrap();
        assert_eq!(found.last_seen_ms, 1_234);
    }
}
