pub mod redis_cache;

pub use redis_cache::RedisCache;

use async_trait::async_trait;

use crate::application::ports::cache_port::{CacheError, CachePort};

/// Used when `REDIS_URL` is unset: the fast tier is simply absent, so
/// every load/save falls straight through to the durable store.
pub struct NoopCache;

#[async_trait]
impl CachePort for NoopCache {
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
