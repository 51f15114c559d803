//! Redis-backed [`Kvs`] implementation.
//!
//! Grounded on `proteus/src/agent/utils/redis_utils.py`'s
//! `get_redis_connection()` singleton: we hold one
//! [`redis::aio::ConnectionManager`], which multiplexes and auto-reconnects,
//! rather than opening a connection per call.

use async_trait::async_trait;
use redis::AsyncCommands;

use crate::kvs::Kvs;
use crate::utilities::errors::KvsError;

pub struct RedisKvs {
    conn: redis::aio::ConnectionManager,
}

impl RedisKvs {
    /// Connects to `redis_url` (e.g. `redis://127.0.0.1:6379/0`) and returns
    /// a ready-to-use backend. Connection failures here are non-retryable —
    /// a dead URL won't become reachable by retrying the same call.
    pub async fn connect(redis_url: &str) -> Result<Self, KvsError> {
        let client = redis::Client::open(redis_url).map_err(|e| KvsError::Operation {
            message: format!("invalid redis url: {e}"),
        })?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| KvsError::Transport {
                message: e.to_string(),
            })?;
        Ok(RedisKvs { conn })
    }

    fn classify(err: redis::RedisError) -> KvsError {
        if err.is_timeout() || err.is_connection_dropped() || err.is_connection_refusal() {
            KvsError::Transport {
                message: err.to_string(),
            }
        } else {
            KvsError::Operation {
                message: err.to_string(),
            }
        }
    }
}

#[async_trait]
impl Kvs for RedisKvs {
    async fn rpush(&self, key: &str, value: String) -> Result<(), KvsError> {
        let mut conn = self.conn.clone();
        conn.rpush::<_, _, ()>(key, value)
            .await
            .map_err(Self::classify)
    }

    async fn lpush(&self, key: &str, value: String) -> Result<(), KvsError> {
        let mut conn = self.conn.clone();
        conn.lpush::<_, _, ()>(key, value)
            .await
            .map_err(Self::classify)
    }

    async fn lrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>, KvsError> {
        let mut conn = self.conn.clone();
        conn.lrange(key, start as isize, stop as isize)
            .await
            .map_err(Self::classify)
    }

    async fn ltrim(&self, key: &str, start: isize, stop: isize) -> Result<(), KvsError> {
        let mut conn = self.conn.clone();
        conn.ltrim::<_, ()>(key, start as isize, stop as isize)
            .await
            .map_err(Self::classify)
    }

    async fn llen(&self, key: &str) -> Result<usize, KvsError> {
        let mut conn = self.conn.clone();
        conn.llen(key).await.map_err(Self::classify)
    }

    async fn lrem(&self, key: &str, count: isize, value: &str) -> Result<(), KvsError> {
        let mut conn = self.conn.clone();
        conn.lrem::<_, _, ()>(key, count as isize, value)
            .await
            .map_err(Self::classify)
    }

    async fn blpop(
        &self,
        keys: &[String],
        timeout_secs: f64,
    ) -> Result<Option<(String, String)>, KvsError> {
        let mut conn = self.conn.clone();
        // BLPOP wants an integer timeout; sub-second polling is the caller's
        // job (the listener loop re-issues BLPOP between stop-flag checks).
        let timeout = timeout_secs.max(1.0).round() as usize;
        let result: Option<(String, String)> = conn
            .blpop(keys, timeout as f64)
            .await
            .map_err(Self::classify)?;
        Ok(result)
    }

    async fn expire(&self, key: &str, ttl_secs: i64) -> Result<(), KvsError> {
        let mut conn = self.conn.clone();
        conn.expire::<_, ()>(key, ttl_secs)
            .await
            .map_err(Self::classify)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, KvsError> {
        let mut conn = self.conn.clone();
        conn.get(key).await.map_err(Self::classify)
    }

    async fn set(&self, key: &str, value: String) -> Result<(), KvsError> {
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(key, value).await.map_err(Self::classify)
    }

    async fn set_ex(&self, key: &str, value: String, ttl_secs: i64) -> Result<(), KvsError> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl_secs as u64)
            .await
            .map_err(Self::classify)
    }

    async fn del(&self, key: &str) -> Result<(), KvsError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await.map_err(Self::classify)
    }

    async fn hset(&self, key: &str, field: &str, value: String) -> Result<(), KvsError> {
        let mut conn = self.conn.clone();
        conn.hset::<_, _, _, ()>(key, field, value)
            .await
            .map_err(Self::classify)
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, KvsError> {
        let mut conn = self.conn.clone();
        conn.hget(key, field).await.map_err(Self::classify)
    }
}
