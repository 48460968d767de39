use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OnceCell};
use uuid::Uuid;

use crate::application::services::realtime::metrics::MetricsCollector;
use crate::application::services::realtime::room::Room;
use crate::application::services::realtime::snapshot::SnapshotService;

/// Tracks the currently active Rooms, one per document with at least one
/// connection. Rooms are created lazily on first join and torn down once
/// their last connection leaves (after flushing any pending persist).
///
/// Each slot is a `OnceCell` so a cold hydration for one document only
/// serializes joins to *that* document — the brief map lock is never held
/// across the cache/durable-store I/O in `Room::create`, so concurrent
/// joins to other, already-warm rooms are never blocked behind it.
pub struct RoomRegistry {
    rooms: Mutex<HashMap<Uuid, Arc<OnceCell<Arc<Room>>>>>,
    snapshot_service: Arc<SnapshotService>,
    metrics: Arc<MetricsCollector>,
}

impl RoomRegistry {
    pub fn new(snapshot_service: Arc<SnapshotService>, metrics: Arc<MetricsCollector>) -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
            snapshot_service,
            metrics,
        }
    }

    pub async fn get_or_create(&self, doc_id: Uuid, owner_id: Uuid) -> anyhow::Result<Arc<Room>> {
        let cell = {
            let mut rooms = self.rooms.lock().await;
            rooms
                .entry(doc_id)
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        let snapshot_service = self.snapshot_service.clone();
        let metrics = self.metrics.clone();
        let room = cell
            .get_or_try_init(|| Room::create(doc_id, owner_id, snapshot_service, metrics))
            .await?;
        Ok(room.clone())
    }

    /// Remove a room once its last connection has left, flushing any
    /// pending persist before it is dropped — the debounce timer would
    /// otherwise go with it.
    pub async fn remove_if_empty(&self, doc_id: Uuid) {
        let removed = {
            let mut rooms = self.rooms.lock().await;
            let room = rooms.get(&doc_id).and_then(|cell| cell.get().cloned());
            match room {
                Some(room) if room.is_empty().await => {
                    rooms.remove(&doc_id);
                    Some(room)
                }
                _ => None,
            }
        };
        if let Some(room) = removed {
            room.flush_persist().await;
            room.on_removed();
        }
    }

    pub async fn all_rooms(&self) -> Vec<Arc<Room>> {
        self.rooms
            .lock()
            .await
            .values()
            .filter_map(|cell| cell.get().cloned())
            .collect()
    }

    /// Flush every active room's pending persist, used on graceful
    /// shutdown so an in-flight debounce timer isn't lost.
    pub async fn flush_all(&self) {
        for room in self.all_rooms().await {
            room.flush_persist().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::cache_port::{CacheError, CachePort};
    use crate::application::ports::snapshot_store::{DurableStore, VersionRow};
    use async_trait::async_trait;
    use std::collections::HashMap as Map;
    use tokio::sync::Mutex as TokioMutex;

    struct NullCache;
    #[async_trait]
    impl CachePort for NullCache {
        fn is_ready(&self) -> bool {
            false
        }
        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, CacheError> {
            Ok(None)
        }
        async fn set(&self, _key: &str, _value: &[u8]) -> Result<(), CacheError> {
            Ok(())
        }
    }

    struct NullDurable {
        versions: TokioMutex<Map<Uuid, Vec<u8>>>,
    }
    #[async_trait]
    impl DurableStore for NullDurable {
        async fn find_latest_version(&self, doc_id: Uuid) -> anyhow::Result<Option<VersionRow>> {
            Ok(self
                .versions
                .lock()
                .await
                .get(&doc_id)
                .cloned()
                .map(|snapshot| VersionRow {
                    snapshot,
                    created_at: chrono::Utc::now(),
                }))
        }
        async fn create_version(
            &self,
            doc_id: Uuid,
            _author_id: Uuid,
            _summary: &str,
            snapshot: &[u8],
        ) -> anyhow::Result<()> {
            self.versions
                .lock()
                .await
                .insert(doc_id, snapshot.to_vec());
            Ok(())
        }
    }

    fn make_registry() -> RoomRegistry {
        let cache = Arc::new(NullCache);
        let durable = Arc::new(NullDurable {
            versions: TokioMutex::new(Map::new()),
        });
        RoomRegistry::new(
            Arc::new(SnapshotService::new(cache, durable)),
            Arc::new(MetricsCollector::default()),
        )
    }

    #[tokio::test]
    async fn get_or_create_is_idempotent_per_document() {
        let registry = make_registry();
        let doc_id = Uuid::new_v4();
        let owner = Uuid::new_v4();
        let a = registry.get_or_create(doc_id, owner).await.unwrap();
        let b = registry.get_or_create(doc_id, owner).await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn empty_room_is_removed() {
        let registry = make_registry();
        let doc_id = Uuid::new_v4();
        let owner = Uuid::new_v4();
        registry.get_or_create(doc_id, owner).await.unwrap();
        registry.remove_if_empty(doc_id).await;
        assert!(registry.all_rooms().await.is_empty());
    }
}
