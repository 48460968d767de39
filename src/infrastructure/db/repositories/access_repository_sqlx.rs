use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use crate::application::ports::access_repository::{AccessRepository, SharePermission};
use crate::domain::Document;
use crate::infrastructure::db::PgPool;

#[derive(Clone)]
pub struct SqlxAccessRepository {
    pool: PgPool,
}

impl SqlxAccessRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn parse_permission(raw: &str) -> Option<SharePermission> {
    match raw {
        "viewer" => Some(SharePermission::Viewer),
        "editor" => Some(SharePermission::Editor),
        _ => None,
    }
}

#[async_trait]
impl AccessRepository for SqlxAccessRepository {
    async fn find_document_by_id(&self, doc_id: Uuid) -> anyhow::Result<Option<Document>> {
        let row = sqlx::query(
            "SELECT id, owner_id, title, created_at, updated_at FROM documents WHERE id = $1",
        )
        .bind(doc_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|row| Document {
            id: row.get("id"),
            owner_id: row.get("owner_id"),
            title: row.get("title"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }))
    }

    async fn find_share_by_document_and_user(
        &self,
        doc_id: Uuid,
        user_id: Uuid,
    ) -> anyhow::Result<Option<SharePermission>> {
        let row = sqlx::query(
            "SELECT permission FROM document_shares WHERE document_id = $1 AND user_id = $2",
        )
        .bind(doc_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.and_then(|row| parse_permission(row.get::<String, _>("permission").as_str())))
    }

    async fn find_valid_share_link(
        &self,
        doc_id: Uuid,
        token: &str,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Option<SharePermission>> {
        let row = sqlx::query(
            "SELECT permission FROM share_links
             WHERE document_id = $1 AND token = $2 AND (expires_at IS NULL OR expires_at > $3)",
        )
        .bind(doc_id)
        .bind(token)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.and_then(|row| parse_permission(row.get::<String, _>("permission").as_str())))
    }
}
