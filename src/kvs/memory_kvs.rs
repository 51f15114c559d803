//! In-process KVS backend used by tests and by the CLI when no Redis URL is
//! configured. Blocking pop is implemented by polling on a short interval
//! and checking the deadline, since there is no pub/sub to wake us.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::kvs::Kvs;
use crate::utilities::errors::KvsError;

#[derive(Default)]
struct Store {
    lists: HashMap<String, VecDeque<String>>,
    strings: HashMap<String, String>,
    hashes: HashMap<String, HashMap<String, String>>,
}

/// A single-process, non-persistent [`Kvs`]. Cloning an [`InMemoryKvs`]
/// shares the same backing store (it's an `Arc` internally via `Mutex`), so
/// tests can hand out several "connections" that observe each other's writes.
pub struct InMemoryKvs {
    store: Mutex<Store>,
}

impl InMemoryKvs {
    pub fn new() -> Self {
        InMemoryKvs {
            store: Mutex::new(Store::default()),
        }
    }
}

impl Default for InMemoryKvs {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Kvs for InMemoryKvs {
    async fn rpush(&self, key: &str, value: String) -> Result<(), KvsError> {
        let mut store = self.store.lock().await;
        store.lists.entry(key.to_string()).or_default().push_back(value);
        Ok(())
    }

    async fn lpush(&self, key: &str, value: String) -> Result<(), KvsError> {
        let mut store = self.store.lock().await;
        store.lists.entry(key.to_string()).or_default().push_front(value);
        Ok(())
    }

    async fn lrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>, KvsError> {
        let store = self.store.lock().await;
        let list = match store.lists.get(key) {
            Some(l) => l,
            None => return Ok(Vec::new()),
        };
        Ok(slice_range(list, start, stop))
    }

    async fn ltrim(&self, key: &str, start: isize, stop: isize) -> Result<(), KvsError> {
        let mut store = self.store.lock().await;
        if let Some(list) = store.lists.get_mut(key) {
            let trimmed = slice_range(list, start, stop);
            *list = trimmed.into();
        }
        Ok(())
    }

    async fn llen(&self, key: &str) -> Result<usize, KvsError> {
        let store = self.store.lock().await;
        Ok(store.lists.get(key).map(|l| l.len()).unwrap_or(0))
    }

    async fn lrem(&self, key: &str, count: isize, value: &str) -> Result<(), KvsError> {
        let mut store = self.store.lock().await;
        if let Some(list) = store.lists.get_mut(key) {
            if count == 0 {
                list.retain(|item| item != value);
            } else {
                let mut remaining = count.unsigned_abs();
                if count > 0 {
                    let mut kept = VecDeque::new();
                    for item in list.drain(..) {
                        if remaining > 0 && item == value {
                            remaining -= 1;
                        } else {
                            kept.push_back(item);
                        }
                    }
                    *list = kept;
                } else {
                    let mut kept: VecDeque<String> = VecDeque::new();
                    for item in list.drain(..).rev() {
                        if remaining > 0 && item == value {
                            remaining -= 1;
                        } else {
                            kept.push_front(item);
                        }
                    }
                    *list = kept;
                }
            }
        }
        Ok(())
    }

    async fn blpop(
        &self,
        keys: &[String],
        timeout_secs: f64,
    ) -> Result<Option<(String, String)>, KvsError> {
        let deadline = Instant::now() + Duration::from_secs_f64(timeout_secs.max(0.05));
        loop {
            {
                let mut store = self.store.lock().await;
                for key in keys {
                    if let Some(list) = store.lists.get_mut(key) {
                        if let Some(value) = list.pop_front() {
                            return Ok(Some((key.clone(), value)));
                        }
                    }
                }
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    async fn expire(&self, _key: &str, _ttl_secs: i64) -> Result<(), KvsError> {
        // Fire-and-forget: the in-memory store never expires entries on its
        // own. Acceptable for tests; the Redis backend is the one that
        // actually enforces TTLs.
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, KvsError> {
        let store = self.store.lock().await;
        Ok(store.strings.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), KvsError> {
        let mut store = self.store.lock().await;
        store.strings.insert(key.to_string(), value);
        Ok(())
    }

    async fn set_ex(&self, key: &str, value: String, _ttl_secs: i64) -> Result<(), KvsError> {
        self.set(key, value).await
    }

    async fn del(&self, key: &str) -> Result<(), KvsError> {
        let mut store = self.store.lock().await;
        store.lists.remove(key);
        store.strings.remove(key);
        store.hashes.remove(key);
        Ok(())
    }

    async fn hset(&self, key: &str, field: &str, value: String) -> Result<(), KvsError> {
        let mut store = self.store.lock().await;
        store
            .hashes
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value);
        Ok(())
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, KvsError> {
        let store = self.store.lock().await;
        Ok(store.hashes.get(key).and_then(|h| h.get(field).cloned()))
    }
}

/// Redis-style `LRANGE`/`LTRIM` index semantics: negative indices count from
/// the end, `stop` is inclusive.
fn slice_range(list: &VecDeque<String>, start: isize, stop: isize) -> Vec<String> {
    let len = list.len() as isize;
    if len == 0 {
        return Vec::new();
    }
    let norm = |i: isize| -> isize {
        if i < 0 {
            (len + i).max(0)
        } else {
            i.min(len - 1).max(0)
        }
    };
    let start = norm(start);
    let stop = if stop < 0 { len + stop } else { stop }.min(len - 1);
    if start > stop || start >= len {
        return Vec::new();
    }
    list.iter()
        .skip(start as usize)
        .take((stop - start + 1) as usize)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rpush_and_lrange_round_trip() {
        let kvs = InMemoryKvs::new();
        kvs.rpush("k", "a".into()).await.unwrap();
        kvs.rpush("k", "b".into()).await.unwrap();
        kvs.rpush("k", "c".into()).await.unwrap();
        let all = kvs.lrange("k", 0, -1).await.unwrap();
        assert_eq!(all, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn ltrim_keeps_last_n() {
        let kvs = InMemoryKvs::new();
        for i in 0..5 {
            kvs.rpush("k", i.to_string()).await.unwrap();
        }
        kvs.ltrim("k", -3, -1).await.unwrap();
        assert_eq!(kvs.lrange("k", 0, -1).await.unwrap(), vec!["2", "3", "4"]);
    }

    #[tokio::test]
    async fn blpop_returns_none_on_timeout() {
        let kvs = InMemoryKvs::new();
        let result = kvs.blpop(&["empty".to_string()], 0.05).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn blpop_pops_across_multiple_keys() {
        let kvs = InMemoryKvs::new();
        kvs.rpush("b", "value".into()).await.unwrap();
        let result = kvs
            .blpop(&["a".to_string(), "b".to_string()], 0.2)
            .await
            .unwrap();
        assert_eq!(result, Some(("b".to_string(), "value".to_string())));
    }
}
