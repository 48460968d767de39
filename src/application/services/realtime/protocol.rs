use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::presence::{PresenceUpdate, SelectionRange};

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    JoinDocument {
        #[serde(rename = "documentId")]
        document_id: String,
        token: String,
        #[serde(rename = "shareToken")]
        share_token: Option<String>,
        user: Option<JoinUser>,
        #[serde(rename = "cursorPosition")]
        cursor_position: Option<u32>,
        #[serde(rename = "selectionRange")]
        selection_range: Option<SelectionRange>,
    },
    YjsUpdate {
        update: String,
    },
    CursorUpdate {
        #[serde(flatten)]
        update: PresenceUpdate,
    },
    Heartbeat {},
    LeaveDocument {},
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinUser {
    pub name: Option<String>,
    pub avatar_color: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    DocSync {
        update: String,
    },
    YjsUpdate {
        update: String,
    },
    PresenceUpdate {
        #[serde(rename = "documentId")]
        document_id: String,
        users: Vec<PresenceView>,
    },
    Error {
        message: String,
    },
    /// Reserved: sent to an older connection superseded by a newer one for
    /// the same (userId, documentId). Not currently emitted by any policy —
    /// see the Open Questions in SPEC_FULL.md. Receivers must not attempt
    /// to reconnect on receipt.
    #[allow(dead_code)]
    ConnectionReplaced {},
}

/// The client-facing view of a presence entry. Deliberately omits
/// `last_heartbeat`, which is an internal liveness signal, not state a
/// peer's editor needs to render.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceView {
    pub user_id: Uuid,
    pub name: String,
    pub avatar_color: String,
    pub cursor_position: u32,
    pub selection_range: Option<SelectionRange>,
    pub is_typing: bool,
}

pub mod errors {
    pub const UNAUTHORIZED: &str = "Unauthorized";
    pub const DOCUMENT_NOT_FOUND: &str = "Document not found";
    pub const ACCESS_DENIED: &str = "Access denied";
    pub const READ_ONLY_ACCESS: &str = "Read-only access";
    pub const NOT_JOINED: &str = "Not joined";
}
