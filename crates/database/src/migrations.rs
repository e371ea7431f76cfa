//! Database migrations

use crate::types::{StoreError, StoreResult};
use sqlx::SqlitePool;
use tracing::info;

// Include migrations from the migrations directory
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Run database migrations
pub async fn run_migrations(pool: &SqlitePool) -> StoreResult<()> {
    MIGRATOR.run(pool).await.map_err(|e| StoreError::Migration {
        message: e.to_string(),
    })?;
    info!("database migrations applied");
    Ok(())
}
