use async_trait::async_trait;

/// The fast tier of the snapshot store. Implementations must be safe to call
/// concurrently and must never block the caller across an await on a
/// stale "ready" decision — readiness is re-checked on every call.
#[async_trait]
pub trait CachePort: Send + Sync {
    /// True if the cache is currently believed reachable.
    fn is_ready(&self) -> bool;

    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    async fn set(&self, key: &str, value: &[u8]) -> CacheResult<()>;
}

pub type CacheResult<T> = Result<T, CacheError>;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache connection lost")]
    ConnectionLost,
    #[error("cache error: {0}")]
    Other(#[from] anyhow::Error),
}
