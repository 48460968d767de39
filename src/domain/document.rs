use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A note document as known to the relay. Title/owner are read-only here;
/// the CRUD surface that mutates them lives outside this crate.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A resolved access grant. Ordered so that `Editor >= Viewer` comparisons
/// read naturally ("at least editor").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Permission {
    Viewer,
    Editor,
    Owner,
}

impl Permission {
    pub fn can_edit(self) -> bool {
        matches!(self, Permission::Editor | Permission::Owner)
    }
}
