use uuid::Uuid;

use crate::application::ports::access_repository::{AccessRepository, SharePermission};
use crate::domain::Permission;

/// Reasons the resolver refuses to grant access. `NotFound` also covers
/// internal store failures, per the spec's literal conflation of the two —
/// we never leak store-failure detail to a connecting client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDenial {
    InvalidId,
    NotFound,
    NoAccess,
}

impl AccessDenial {
    pub fn client_message(self) -> &'static str {
        match self {
            AccessDenial::InvalidId | AccessDenial::NotFound => "Document not found",
            AccessDenial::NoAccess => "Access denied",
        }
    }
}

/// Resolve `(documentId, userId, shareToken?)` to a permission, checking
/// owner, then explicit user share, then share-link token, in that order.
/// The first grant found wins; an unrecognized share token falls through
/// to `NoAccess`, never to `NotFound`.
pub async fn resolve_document<R>(
    repo: &R,
    doc_id: &str,
    user_id: Uuid,
    share_token: Option<&str>,
) -> Result<Permission, AccessDenial>
where
    R: AccessRepository + ?Sized,
{
    let doc_id = doc_id.trim();
    if doc_id.is_empty() {
        return Err(AccessDenial::InvalidId);
    }
    let doc_uuid = Uuid::parse_str(doc_id).map_err(|_| AccessDenial::InvalidId)?;

    let document = repo
        .find_document_by_id(doc_uuid)
        .await
        .map_err(|_| AccessDenial::NotFound)?
        .ok_or(AccessDenial::NotFound)?;

    if document.owner_id == user_id {
        return Ok(Permission::Owner);
    }

    if let Some(share) = repo
        .find_share_by_document_and_user(doc_uuid, user_id)
        .await
        .map_err(|_| AccessDenial::NotFound)?
    {
        return Ok(share_to_permission(share));
    }

    if let Some(token) = share_token {
        if let Some(share) = repo
            .find_valid_share_link(doc_uuid, token, chrono::Utc::now())
            .await
            .map_err(|_| AccessDenial::NotFound)?
        {
            return Ok(share_to_permission(share));
        }
    }

    Err(AccessDenial::NoAccess)
}

fn share_to_permission(share: SharePermission) -> Permission {
    match share {
        SharePermission::Editor => Permission::Editor,
        SharePermission::Viewer => Permission::Viewer,
    }
}
