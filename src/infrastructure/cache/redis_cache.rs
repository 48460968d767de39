use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use redis::AsyncCommands;

use crate::application::ports::cache_port::{CacheError, CachePort};

/// Fast tier in front of the durable version store. `ready` is flipped to
/// `false` the moment a connection is lost so every subsequent call falls
/// straight through to the durable tier without retrying Redis first; it
/// is never cached across an await beyond a single call.
pub struct RedisCache {
    client: redis::Client,
    ready: AtomicBool,
}

impl RedisCache {
    pub fn new(redis_url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self {
            client,
            ready: AtomicBool::new(true),
        })
    }
}

#[async_trait]
impl CachePort for RedisCache {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut conn = match self.client.get_async_connection().await {
            Ok(c) => c,
            Err(e) => {
                self.ready.store(false, Ordering::SeqCst);
                return Err(CacheError::Other(e.into()));
            }
        };
        match conn.get::<_, Option<Vec<u8>>>(key).await {
            Ok(v) => {
                self.ready.store(true, Ordering::SeqCst);
                Ok(v)
            }
            Err(e) if e.is_connection_dropped() || e.is_io_error() => {
                self.ready.store(false, Ordering::SeqCst);
                Err(CacheError::ConnectionLost)
            }
            Err(e) => Err(CacheError::Other(e.into())),
        }
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), CacheError> {
        let mut conn = match self.client.get_async_connection().await {
            Ok(c) => c,
            Err(e) => {
                self.ready.store(false, Ordering::SeqCst);
                return Err(CacheError::Other(e.into()));
            }
        };
        match conn.set::<_, _, ()>(key, value).await {
            Ok(()) => {
                self.ready.store(true, Ordering::SeqCst);
                Ok(())
            }
            Err(e) if e.is_connection_dropped() || e.is_io_error() => {
                self.ready.store(false, Ordering::SeqCst);
                Err(CacheError::ConnectionLost)
            }
            Err(e) => Err(CacheError::Other(e.into())),
        }
    }
}
