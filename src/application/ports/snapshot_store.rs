use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// The durable, append-only version history. Required (no optional tier).
#[async_trait]
pub trait DurableStore: Send + Sync {
    async fn find_latest_version(&self, doc_id: Uuid) -> anyhow::Result<Option<VersionRow>>;

    async fn create_version(
        &self,
        doc_id: Uuid,
        author_id: Uuid,
        summary: &str,
        snapshot: &[u8],
    ) -> anyhow::Result<()>;
}

#[derive(Debug, Clone)]
pub struct VersionRow {
    pub snapshot: Vec<u8>,
    pub created_at: DateTime<Utc>,
}
