pub mod document;
pub mod presence;

pub use document::{Document, Permission};
pub use presence::{PresenceEntry, SelectionRange};
