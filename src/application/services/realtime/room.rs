use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;
use yrs::{Doc, GetString, ReadTxn, StateVector, Text, Transact, Update};

use crate::application::services::realtime::metrics::MetricsCollector;
use crate::application::services::realtime::protocol::{PresenceView, ServerFrame};
use crate::application::services::realtime::snapshot::SnapshotService;
use crate::domain::presence::{PresenceEntry, PresenceUpdate};
use crate::domain::Permission;

pub type ConnectionId = Uuid;

/// Sent down a connection's outbound channel. `Close` tells the writer
/// task to terminate the socket after any already-queued frames.
#[derive(Debug, Clone)]
pub enum Outbound {
    Frame(ServerFrame),
    Close,
}

struct ConnectionHandle {
    user_id: Uuid,
    permission: Permission,
    sender: mpsc::UnboundedSender<Outbound>,
}

struct RoomInner {
    crdt: Doc,
    connections: HashMap<ConnectionId, ConnectionHandle>,
    presence: HashMap<ConnectionId, PresenceEntry>,
    persist_pending: bool,
}

/// In-memory state for one active document: the merged CRDT replica, its
/// connections, their presence, and a debounced-persist flag. All mutating
/// operations go through `inner`, held for exactly the
/// decode -> apply -> broadcast -> schedule-persist critical section.
pub struct Room {
    pub doc_id: Uuid,
    pub owner_id: Uuid,
    inner: Mutex<RoomInner>,
    snapshot_service: Arc<SnapshotService>,
    metrics: Arc<MetricsCollector>,
}

pub enum ApplyOutcome {
    Applied,
    ReadOnly,
    /// Decode or apply failed; the sender is not disconnected.
    Dropped,
}

impl Room {
    /// Create a Room, hydrating its CRDT from the tiered snapshot store.
    /// If neither tier has data the CRDT starts empty, per spec.
    pub async fn create(
        doc_id: Uuid,
        owner_id: Uuid,
        snapshot_service: Arc<SnapshotService>,
        metrics: Arc<MetricsCollector>,
    ) -> anyhow::Result<Arc<Self>> {
        let doc = Doc::new();
        if let Some(bytes) = snapshot_service.load_latest(doc_id).await? {
            if let Ok(update) = Update::decode_v1(&bytes) {
                let mut txn = doc.transact_mut();
                if let Err(e) = txn.apply_update(update) {
                    tracing::warn!(%doc_id, error = ?e, "room_hydrate_apply_failed");
                }
            } else {
                tracing::warn!(%doc_id, "room_hydrate_decode_failed");
            }
        }
        // Ensure the shared text value exists without inserting content —
        // an empty room stays empty until the first edit arrives.
        doc.get_or_insert_text("content");

        metrics.room_created();
        Ok(Arc::new(Self {
            doc_id,
            owner_id,
            inner: Mutex::new(RoomInner {
                crdt: doc,
                connections: HashMap::new(),
                presence: HashMap::new(),
                persist_pending: false,
            }),
            snapshot_service,
            metrics,
        }))
    }

    /// Register a connection and its presence entry, returning the
    /// current full CRDT state (for the caller to send as `doc_sync`) and
    /// the deduplicated presence view to broadcast.
    pub async fn join(
        &self,
        conn_id: ConnectionId,
        user_id: Uuid,
        permission: Permission,
        presence: PresenceEntry,
        sender: mpsc::UnboundedSender<Outbound>,
    ) -> (Vec<u8>, Vec<PresenceView>) {
        let mut inner = self.inner.lock().await;
        inner.connections.insert(
            conn_id,
            ConnectionHandle {
                user_id,
                permission,
                sender,
            },
        );
        inner.presence.insert(conn_id, presence);
        self.metrics.connection_opened();
        let state = {
            let txn = inner.crdt.transact();
            txn.encode_state_as_update_v1(&StateVector::default())
        };
        let users = dedup_presence(&inner.presence);
        (state, users)
    }

    /// Apply an inbound `yjs_update`. Returns the outcome so the caller can
    /// emit the appropriate error frame; performs broadcast and schedules
    /// the debounced persist itself, inside the same critical section.
    pub async fn apply_update(
        self: &Arc<Self>,
        conn_id: ConnectionId,
        update_b64: &str,
    ) -> ApplyOutcome {
        let mut inner = self.inner.lock().await;
        let permission = match inner.connections.get(&conn_id) {
            Some(h) => h.permission,
            None => return ApplyOutcome::Dropped,
        };
        if !permission.can_edit() {
            return ApplyOutcome::ReadOnly;
        }

        let bytes = match base64::engine::general_purpose::STANDARD.decode(update_b64) {
            Ok(b) => b,
            Err(_) => return ApplyOutcome::Dropped,
        };
        let update = match Update::decode_v1(&bytes) {
            Ok(u) => u,
            Err(_) => return ApplyOutcome::Dropped,
        };
        {
            let mut txn = inner.crdt.transact_mut();
            if let Err(e) = txn.apply_update(update) {
                tracing::debug!(doc_id = %self.doc_id, error = ?e, "apply_update_failed");
                return ApplyOutcome::Dropped;
            }
        }

        self.metrics.record_operation();

        for (id, handle) in inner.connections.iter() {
            if *id != conn_id {
                let _ = handle.sender.send(Outbound::Frame(ServerFrame::YjsUpdate {
                    update: update_b64.to_string(),
                }));
            }
        }

        if !inner.persist_pending {
            inner.persist_pending = true;
            self.clone().spawn_persist_timer();
        }

        ApplyOutcome::Applied
    }

    fn spawn_persist_timer(self: Arc<Self>) {
        let delay = self.snapshot_service.persist_delay();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let (bytes, owner_id) = {
                let mut inner = self.inner.lock().await;
                inner.persist_pending = false;
                let bytes = {
                    let txn = inner.crdt.transact();
                    txn.encode_state_as_update_v1(&StateVector::default())
                };
                (bytes, self.owner_id)
            };
            if let Err(e) = self
                .snapshot_service
                .save_snapshot(self.doc_id, owner_id, &bytes)
                .await
            {
                tracing::error!(doc_id = %self.doc_id, error = ?e, "debounced_persist_failed");
            }
        });
    }

    /// Merge a partial presence update and return the deduplicated view to
    /// broadcast.
    pub async fn update_presence(
        &self,
        conn_id: ConnectionId,
        update: &PresenceUpdate,
        now_ms: u64,
    ) -> Option<Vec<PresenceView>> {
        let mut inner = self.inner.lock().await;
        let entry = inner.presence.get_mut(&conn_id)?;
        entry.merge_update(update, now_ms);
        Some(dedup_presence(&inner.presence))
    }

    /// Refresh the heartbeat only; no broadcast.
    pub async fn heartbeat(&self, conn_id: ConnectionId, now_ms: u64) {
        let mut inner = self.inner.lock().await;
        if let Some(entry) = inner.presence.get_mut(&conn_id) {
            entry.last_heartbeat = now_ms;
        }
    }

    /// Remove a connection's membership and presence. Returns the
    /// deduplicated presence view (if the connection was a member) and
    /// whether the room is now empty.
    pub async fn leave(&self, conn_id: ConnectionId) -> (Option<Vec<PresenceView>>, bool) {
        let mut inner = self.inner.lock().await;
        let had_member = inner.connections.remove(&conn_id).is_some();
        inner.presence.remove(&conn_id);
        if had_member {
            self.metrics.connection_closed();
        }
        let users = had_member.then(|| dedup_presence(&inner.presence));
        let empty = inner.connections.is_empty();
        (users, empty)
    }

    /// Evict every connection whose presence hasn't been refreshed within
    /// `timeout`. Closes each evicted connection's socket via its
    /// outbound channel and returns the deduplicated presence view if any
    /// eviction happened, plus whether the room is now empty.
    pub async fn evict_stale(
        &self,
        now_ms: u64,
        timeout_ms: u64,
    ) -> (Option<Vec<PresenceView>>, bool) {
        let mut inner = self.inner.lock().await;
        let stale: Vec<ConnectionId> = inner
            .presence
            .iter()
            .filter(|(_, entry)| now_ms.saturating_sub(entry.last_heartbeat) > timeout_ms)
            .map(|(id, _)| *id)
            .collect();
        if stale.is_empty() {
            let empty = inner.connections.is_empty();
            return (None, empty);
        }
        for id in &stale {
            if let Some(handle) = inner.connections.remove(id) {
                let _ = handle.sender.send(Outbound::Close);
                self.metrics.connection_closed();
            }
            inner.presence.remove(id);
        }
        let users = dedup_presence(&inner.presence);
        let empty = inner.connections.is_empty();
        (Some(users), empty)
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.connections.is_empty()
    }

    /// Persist the current state immediately, regardless of the pending
    /// flag. Used when the last connection leaves and at shutdown, since
    /// the debounce timer would otherwise be dropped with the room.
    pub async fn flush_persist(&self) {
        let (bytes, owner_id) = {
            let mut inner = self.inner.lock().await;
            inner.persist_pending = false;
            let bytes = {
                let txn = inner.crdt.transact();
                txn.encode_state_as_update_v1(&StateVector::default())
            };
            (bytes, self.owner_id)
        };
        if let Err(e) = self
            .snapshot_service
            .save_snapshot(self.doc_id, owner_id, &bytes)
            .await
        {
            tracing::error!(doc_id = %self.doc_id, error = ?e, "flush_persist_failed");
        }
    }

    pub async fn content_text(&self) -> String {
        let inner = self.inner.lock().await;
        let txt = inner.crdt.get_or_insert_text("content");
        let txn = inner.crdt.transact();
        txt.get_string(&txn)
    }

    pub fn on_removed(&self) {
        self.metrics.room_removed();
    }

    pub async fn broadcast(&self, frame: ServerFrame) {
        let inner = self.inner.lock().await;
        for handle in inner.connections.values() {
            let _ = handle.sender.send(Outbound::Frame(frame.clone()));
        }
    }
}

/// For each distinct userId, keep the entry with the greatest
/// `lastHeartbeat`; this drops stale duplicates from a user's second tab
/// without erasing the first tab's presence on write.
fn dedup_presence(presence: &HashMap<ConnectionId, PresenceEntry>) -> Vec<PresenceView> {
    let mut by_user: HashMap<Uuid, &PresenceEntry> = HashMap::new();
    for entry in presence.values() {
        by_user
            .entry(entry.user_id)
            .and_modify(|existing| {
                if entry.last_heartbeat > existing.last_heartbeat {
                    *existing = entry;
                }
            })
            .or_insert(entry);
    }
    by_user
        .into_values()
        .map(|e| PresenceView {
            user_id: e.user_id,
            name: e.name.clone(),
            avatar_color: e.avatar_color.clone(),
            cursor_position: e.cursor_position,
            selection_range: e.selection_range,
            is_typing: e.is_typing,
        })
        .collect()
}
