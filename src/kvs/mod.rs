//! The key-value store abstraction underlying role queues, scratchpad
//! persistence, playbooks, and tool memory.
//!
//! Every call is retried through [`with_retry`], which only retries
//! transient transport failures (see [`KvsError::is_retryable`]) and gives
//! up immediately on anything else. The trait itself exposes only the
//! handful of list/string/hash primitives the rest of the crate actually
//! calls (`blpop`, `rpush`, `lrange`, ...) rather than the full backend
//! command surface.

pub mod memory_kvs;
pub mod redis_kvs;

use async_trait::async_trait;
use std::time::Duration;

use crate::utilities::errors::KvsError;

/// Minimal list/string/hash KVS surface the runtime needs. Implemented by
/// [`redis_kvs::RedisKvs`] in production and [`memory_kvs::InMemoryKvs`] in
/// tests.
#[async_trait]
pub trait Kvs: Send + Sync {
    async fn rpush(&self, key: &str, value: String) -> Result<(), KvsError>;
    async fn lpush(&self, key: &str, value: String) -> Result<(), KvsError>;
    async fn lrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>, KvsError>;
    async fn ltrim(&self, key: &str, start: isize, stop: isize) -> Result<(), KvsError>;
    async fn llen(&self, key: &str) -> Result<usize, KvsError>;
    async fn lrem(&self, key: &str, count: isize, value: &str) -> Result<(), KvsError>;

    /// Blocking left-pop across any of `keys`, waiting up to `timeout_secs`
    /// (0 means wait indefinitely in real Redis; our callers always pass a
    /// finite poll interval so an agent listener can check its stop flag).
    /// Returns `(key, value)` of whichever queue produced an item first.
    async fn blpop(
        &self,
        keys: &[String],
        timeout_secs: f64,
    ) -> Result<Option<(String, String)>, KvsError>;

    async fn expire(&self, key: &str, ttl_secs: i64) -> Result<(), KvsError>;
    async fn get(&self, key: &str) -> Result<Option<String>, KvsError>;
    async fn set(&self, key: &str, value: String) -> Result<(), KvsError>;
    async fn set_ex(&self, key: &str, value: String, ttl_secs: i64) -> Result<(), KvsError>;
    async fn del(&self, key: &str) -> Result<(), KvsError>;
    async fn hset(&self, key: &str, field: &str, value: String) -> Result<(), KvsError>;
    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, KvsError>;
}

/// Runs `op` up to `max_attempts` times, backing off `base_delay * 2^n`
/// between attempts, but only for [`KvsError::is_retryable`] failures.
/// Mirrors `redis_utils.py`'s `retry_redis_operation` decorator.
pub async fn with_retry<T, F, Fut>(
    max_attempts: u32,
    base_delay: Duration,
    mut op: F,
) -> Result<T, KvsError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, KvsError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt + 1 < max_attempts => {
                tracing::warn!(attempt, error = %err, "retrying KVS operation");
                tokio::time::sleep(base_delay * 2u32.pow(attempt)).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Queue key for a role's shared inbox: `role_queue:<role>`.
pub fn role_queue_key(role: &str) -> String {
    format!("role_queue:{role}")
}

/// Queue key for a single agent's private inbox (`agent_queue:<agent_id>`).
pub fn agent_queue_key(agent_id: &str) -> String {
    format!("agent_queue:{agent_id}")
}

/// Membership list of agent ids currently serving a role (`role_agents:<role>`).
pub fn role_agents_key(role: &str) -> String {
    format!("role_agents:{role}")
}

/// Roster of every agent id participating in a chat (`team_agents:<chat_id>`).
pub fn team_agents_key(chat_id: &str) -> String {
    format!("team_agents:{chat_id}")
}

/// Single-slot mailbox a paused `wait_for_user_input` blocks on and
/// `set_user_input` fills (`user_input:<node_id>`).
pub fn user_input_key(node_id: &str) -> String {
    format!("user_input:{node_id}")
}
