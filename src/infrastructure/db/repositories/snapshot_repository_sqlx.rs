use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::application::ports::snapshot_store::{DurableStore, VersionRow};
use crate::infrastructure::db::PgPool;

#[derive(Clone)]
pub struct SqlxSnapshotRepository {
    pool: PgPool,
}

impl SqlxSnapshotRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DurableStore for SqlxSnapshotRepository {
    async fn find_latest_version(&self, doc_id: Uuid) -> anyhow::Result<Option<VersionRow>> {
        let row = sqlx::query(
            "SELECT snapshot, created_at FROM versions
             WHERE document_id = $1 ORDER BY created_at DESC LIMIT 1",
        )
        .bind(doc_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|row| VersionRow {
            snapshot: row.get("snapshot"),
            created_at: row.get("created_at"),
        }))
    }

    async fn create_version(
        &self,
        doc_id: Uuid,
        author_id: Uuid,
        summary: &str,
        snapshot: &[u8],
    ) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO versions (document_id, author_id, summary, snapshot) VALUES ($1, $2, $3, $4)",
        )
        .bind(doc_id)
        .bind(author_id)
        .bind(summary)
        .bind(snapshot)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
