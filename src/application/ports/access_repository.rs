use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::Document;

/// The three read queries the access resolver depends on against the
/// durable store. Write access (creating shares, transferring ownership,
/// etc.) belongs to the CRUD surface, not this relay.
#[async_trait]
pub trait AccessRepository: Send + Sync {
    async fn find_document_by_id(&self, doc_id: Uuid) -> anyhow::Result<Option<Document>>;

    async fn find_share_by_document_and_user(
        &self,
        doc_id: Uuid,
        user_id: Uuid,
    ) -> anyhow::Result<Option<SharePermission>>;

    async fn find_valid_share_link(
        &self,
        doc_id: Uuid,
        token: &str,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Option<SharePermission>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SharePermission {
    Viewer,
    Editor,
}
