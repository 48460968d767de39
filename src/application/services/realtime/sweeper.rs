use std::sync::Arc;
use std::time::Duration;

use crate::application::services::realtime::clock::now_ms;
use crate::application::services::realtime::protocol::ServerFrame;
use crate::application::services::realtime::registry::RoomRegistry;

const SWEEP_INTERVAL: Duration = Duration::from_secs(5);
const HEARTBEAT_TIMEOUT_MS: u64 = 10_000;

/// Runs until the process exits: every `SWEEP_INTERVAL`, evicts
/// connections that haven't heartbeated within `HEARTBEAT_TIMEOUT_MS`,
/// rebroadcasts presence for any room that lost a member, and tears down
/// rooms left with no connections.
pub async fn run(registry: Arc<RoomRegistry>) {
    let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
    loop {
        ticker.tick().await;
        sweep_once(&registry).await;
    }
}

async fn sweep_once(registry: &RoomRegistry) {
    let now = now_ms();
    for room in registry.all_rooms().await {
        let (users, empty) = room.evict_stale(now, HEARTBEAT_TIMEOUT_MS).await;
        if let Some(users) = users {
            room.broadcast(ServerFrame::PresenceUpdate {
                document_id: room.doc_id.to_string(),
                users,
            })
            .await;
        }
        if empty {
            registry.remove_if_empty(room.doc_id).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::cache_port::{CacheError, CachePort};
    use crate::application::ports::snapshot_store::{DurableStore, VersionRow};
    use crate::application::services::realtime::metrics::MetricsCollector;
    use crate::application::services::realtime::room::Outbound;
    use crate::application::services::realtime::snapshot::SnapshotService;
    use crate::domain::presence::PresenceEntry;
    use crate::domain::Permission;
    use async_trait::async_trait;
    use std::collections::HashMap as Map;
    use tokio::sync::{mpsc, Mutex as TokioMutex};
    use uuid::Uuid;

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

    #[tokio::test]
    async fn sweep_evicts_and_tears_down_empty_room() {
        let cache = Arc::new(NullCache);
        let durable = Arc::new(NullDurable {
            versions: TokioMutex::new(Map::new()),
        });
        let registry = Arc::new(RoomRegistry::new(
            Arc::new(SnapshotService::new(cache, durable)),
            Arc::new(MetricsCollector::default()),
        ));
        let doc_id = Uuid::new_v4();
        let owner = Uuid::new_v4();
        let room = registry.get_or_create(doc_id, owner).await.unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        room.join(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Permission::Editor,
            PresenceEntry::new(Uuid::new_v4(), "a".into(), "#fff".into(), 0),
            tx,
        )
        .await;

        sweep_once(&registry).await;

        assert!(matches!(rx.try_recv().unwrap(), Outbound::Close));
        assert!(registry.all_rooms().await.is_empty());
    }
}
