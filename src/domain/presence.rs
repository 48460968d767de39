use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SelectionRange {
    pub start: u32,
    pub end: u32,
}

impl SelectionRange {
    pub fn is_valid(&self) -> bool {
        self.start <= self.end
    }
}

/// Live, ephemeral per-connection metadata within a room.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceEntry {
    pub user_id: Uuid,
    pub name: String,
    pub avatar_color: String,
    pub cursor_position: u32,
    pub selection_range: Option<SelectionRange>,
    pub is_typing: bool,
    /// Monotonic milliseconds since the room's internal clock started.
    /// Used only to compare "most recently seen" entries; never persisted.
    pub last_heartbeat: u64,
}

impl PresenceEntry {
    pub fn new(user_id: Uuid, name: String, avatar_color: String, now_ms: u64) -> Self {
        Self {
            user_id,
            name,
            avatar_color,
            cursor_position: 0,
            selection_range: None,
            is_typing: false,
            last_heartbeat: now_ms,
        }
    }

    /// Merge a partial update: any field left `None` retains its prior value.
    pub fn merge_update(&mut self, update: &PresenceUpdate, now_ms: u64) {
        if let Some(pos) = update.cursor_position {
            self.cursor_position = pos;
        }
        if let Some(range) = update.selection_range {
            if range.is_valid() {
                self.selection_range = Some(range);
            }
        }
        if let Some(typing) = update.is_typing {
            self.is_typing = typing;
        }
        self.last_heartbeat = now_ms;
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceUpdate {
    pub cursor_position: Option<u32>,
    pub selection_range: Option<SelectionRange>,
    pub is_typing: Option<bool>,
}
