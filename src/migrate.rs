//! Database schema setup (idempotent).

use sqlx::SqlitePool;

use recall_core::{Error, Result};

/// Create the key-value table used for document records.
///
/// `seq` records first-insertion order; upserts keep the original `seq`
/// so re-ingesting a document does not move it in listings or tie-breaks.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS kv (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            key TEXT NOT NULL UNIQUE,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| Error::storage("create kv table", e))?;

    Ok(())
}
