use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::application::ports::cache_port::{CacheError, CachePort};
use crate::application::ports::snapshot_store::DurableStore;

/// Durable auto-saves are rate-limited to at most one per document per
/// this window, and only when the durable tier is the only one writing.
const DURABLE_WRITE_FLOOR: Duration = Duration::seconds(5);

/// Debounce delay for a Room's pending persist timer: short when the
/// cache is absorbing most writes, longer when every write lands on the
/// durable tier.
const CACHE_BACKED_DELAY: std::time::Duration = std::time::Duration::from_millis(1000);
const DURABLE_ONLY_DELAY: std::time::Duration = std::time::Duration::from_millis(5000);

fn cache_key(doc_id: Uuid) -> String {
    format!("doc:{doc_id}:state")
}

/// The tiered persistence pipeline: a fast cache (optional, capability
/// checked on every call) in front of a required durable version store.
pub struct SnapshotService {
    cache: Arc<dyn CachePort>,
    durable: Arc<dyn DurableStore>,
    last_durable_write: Mutex<HashMap<Uuid, DateTime<Utc>>>,
}

impl SnapshotService {
    pub fn new(cache: Arc<dyn CachePort>, durable: Arc<dyn DurableStore>) -> Self {
        Self {
            cache,
            durable,
            last_durable_write: Mutex::new(HashMap::new()),
        }
    }

    /// The delay a Room should wait before flushing its pending persist.
    pub fn persist_delay(&self) -> std::time::Duration {
        if self.cache.is_ready() {
            CACHE_BACKED_DELAY
        } else {
            DURABLE_ONLY_DELAY
        }
    }

    /// Cache-first, then durable, then "none".
    pub async fn load_latest(&self, doc_id: Uuid) -> anyhow::Result<Option<Vec<u8>>> {
        if self.cache.is_ready() {
            match self.cache.get(&cache_key(doc_id)).await {
                Ok(Some(bytes)) => return Ok(Some(bytes)),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(%doc_id, error = %e, "snapshot_cache_load_failed");
                }
            }
        }
        match self.durable.find_latest_version(doc_id).await {
            Ok(Some(row)) => Ok(Some(row.snapshot)),
            Ok(None) => Ok(None),
            Err(e) => {
                // Join-time durable failures are treated as "no prior
                // snapshot" rather than failing the join; convergence is
                // preserved via CRDT merge once peers reconnect.
                tracing::error!(%doc_id, error = %e, "snapshot_durable_load_failed");
                Ok(None)
            }
        }
    }

    /// Cache write when ready; otherwise a rate-limited durable auto-save
    /// under `owner_id`, skipped if the bytes match the latest version.
    pub async fn save_snapshot(
        &self,
        doc_id: Uuid,
        owner_id: Uuid,
        bytes: &[u8],
    ) -> anyhow::Result<()> {
        if self.cache.is_ready() {
            match self.cache.set(&cache_key(doc_id), bytes).await {
                Ok(()) => return Ok(()),
                Err(CacheError::ConnectionLost) => {
                    tracing::warn!(%doc_id, "snapshot_cache_connection_lost");
                }
                Err(e) => {
                    tracing::warn!(%doc_id, error = %e, "snapshot_cache_write_failed");
                }
            }
        }

        let mut last_write = self.last_durable_write.lock().await;
        let now = Utc::now();
        if let Some(last) = last_write.get(&doc_id) {
            if now.signed_duration_since(*last) < DURABLE_WRITE_FLOOR {
                return Ok(());
            }
        }

        let unchanged = match self.durable.find_latest_version(doc_id).await {
            Ok(Some(row)) => row.snapshot == bytes,
            Ok(None) => false,
            Err(e) => {
                tracing::error!(%doc_id, error = %e, "snapshot_durable_read_failed");
                false
            }
        };
        if unchanged {
            return Ok(());
        }

        self.durable
            .create_version(doc_id, owner_id, "Auto-save", bytes)
            .await?;
        last_write.insert(doc_id, now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::snapshot_store::VersionRow;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::Mutex as TokioMutex;

    struct FakeCache {
        ready: AtomicBool,
        store: TokioMutex<HashMap<String, Vec<u8>>>,
    }

    #[async_trait]
    impl CachePort for FakeCache {
        fn is_ready(&self) -> bool {
            self.ready.load(Ordering::SeqCst)
        }

        async fn get(
            &self,
            key: &str,
        ) -> Result<Option<Vec<u8>>, crate::application::ports::cache_port::CacheError> {
            Ok(self.store.lock().await.get(key).cloned())
        }

        async fn set(
            &self,
            key: &str,
            value: &[u8],
        ) -> Result<(), crate::application::ports::cache_port::CacheError> {
            self.store
                .lock()
                .await
                .insert(key.to_string(), value.to_vec());
            Ok(())
        }
    }

    struct FakeDurable {
        versions: TokioMutex<HashMap<Uuid, Vec<VersionRow>>>,
        write_count: TokioMutex<u32>,
    }

    #[async_trait]
    impl DurableStore for FakeDurable {
        async fn find_latest_version(&self, doc_id: Uuid) -> anyhow::Result<Option<VersionRow>> {
            Ok(self
                .versions
                .lock()
                .await
                .get(&doc_id)
                .and_then(|v| v.last().cloned()))
        }

        async fn create_version(
            &self,
            doc_id: Uuid,
            _author_id: Uuid,
            _summary: &str,
            snapshot: &[u8],
        ) -> anyhow::Result<()> {
            *self.write_count.lock().await += 1;
            self.versions.lock().await.entry(doc_id).or_default().push(VersionRow {
                snapshot: snapshot.to_vec(),
                created_at: Utc::now(),
            });
            Ok(())
        }
    }

    #[tokio::test]
    async fn cache_ready_never_touches_durable() {
        let cache = Arc::new(FakeCache {
            ready: AtomicBool::new(true),
            store: TokioMutex::new(HashMap::new()),
        });
        let durable = Arc::new(FakeDurable {
            versions: TokioMutex::new(HashMap::new()),
            write_count: TokioMutex::new(0),
        });
        let svc = SnapshotService::new(cache, durable.clone());
        let doc_id = Uuid::new_v4();
        svc.save_snapshot(doc_id, Uuid::new_v4(), b"hello")
            .await
            .unwrap();
        assert_eq!(*durable.write_count.lock().await, 0);
        let loaded = svc.load_latest(doc_id).await.unwrap();
        assert_eq!(loaded, Some(b"hello".to_vec()));
    }

    #[tokio::test]
    async fn durable_write_floor_limits_to_one_per_window() {
        let cache = Arc::new(FakeCache {
            ready: AtomicBool::new(false),
            store: TokioMutex::new(HashMap::new()),
        });
        let durable = Arc::new(FakeDurable {
            versions: TokioMutex::new(HashMap::new()),
            write_count: TokioMutex::new(0),
        });
        let svc = SnapshotService::new(cache, durable.clone());
        let doc_id = Uuid::new_v4();
        let owner = Uuid::new_v4();
        svc.save_snapshot(doc_id, owner, b"v1").await.unwrap();
        svc.save_snapshot(doc_id, owner, b"v2").await.unwrap();
        svc.save_snapshot(doc_id, owner, b"v3").await.unwrap();
        assert_eq!(*durable.write_count.lock().await, 1);
    }

    #[tokio::test]
    async fn unchanged_bytes_skip_durable_write() {
        let cache = Arc::new(FakeCache {
            ready: AtomicBool::new(false),
            store: TokioMutex::new(HashMap::new()),
        });
        let durable = Arc::new(FakeDurable {
            versions: TokioMutex::new(HashMap::new()),
            write_count: TokioMutex::new(0),
        });
        let svc = SnapshotService::new(cache, durable.clone());
        let doc_id = Uuid::new_v4();
        let owner = Uuid::new_v4();
        svc.save_snapshot(doc_id, owner, b"same").await.unwrap();
        assert_eq!(*durable.write_count.lock().await, 1);
        // Force past the write floor by directly resetting internal state
        // is not exposed; instead verify behavior within the same window:
        // identical bytes inside the floor are skipped by the floor check
        // already covered above. Here we check the differs-check directly
        // by bypassing the floor via a fresh document id with prior content.
        let doc_id2 = Uuid::new_v4();
        durable
            .versions
            .lock()
            .await
            .insert(doc_id2, vec![VersionRow { snapshot: b"same".to_vec(), created_at: Utc::now() }]);
        svc.save_snapshot(doc_id2, owner, b"same").await.unwrap();
        assert_eq!(*durable.write_count.lock().await, 1);
    }
}
