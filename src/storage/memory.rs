//! In-Memory Storage Backend
//!
//! A process-local stand-in for the column store. It keeps the same row
//! model, one `(value, expiry)` per key, and mimics the store's native expiry:
//! rows past their deadline are invisible to reads immediately (lazy expiry)
//! and are physically removed by the [`ExpirySweeper`](super::ExpirySweeper).
//!
//! Remaining TTL is reported in whole seconds rounded up, so a row written
//! with a 100 second expiry reads back as `100` until a full second passes.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       MemoryStore                           │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │ Shard N │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ RwLock  │           │
//! │  │ HashMap │ │ HashMap │ │ HashMap │ │ HashMap │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! No lock is held across an `.await`; every trait method completes
//! synchronously.

use crate::storage::adapter::{Expiry, Record, RemainingTtl, Storage, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, HashSet};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

/// Number of independently locked shards.
const NUM_SHARDS: usize = 16;

/// A stored row.
#[derive(Debug, Clone)]
struct Row {
    value: Bytes,
    expires_at: Option<Instant>,
}

impl Row {
    fn new(value: Bytes, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        }
    }

    #[inline]
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|exp| now >= exp)
    }

    fn remaining(&self, now: Instant) -> RemainingTtl {
        match self.expires_at {
            None => RemainingTtl::Persistent,
            Some(exp) => {
                let ms = exp.saturating_duration_since(now).as_millis();
                RemainingTtl::Seconds(ms.div_ceil(1000).min(u32::MAX as u128) as u32)
            }
        }
    }
}

type Shard = RwLock<HashMap<Bytes, Row>>;

/// Sharded in-memory table with per-row expiry.
pub struct MemoryStore {
    shards: Vec<Shard>,
    expired_count: AtomicU64,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("shards", &self.shards.len())
            .field("rows", &self.len())
            .finish()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            shards: (0..NUM_SHARDS).map(|_| RwLock::new(HashMap::new())).collect(),
            expired_count: AtomicU64::new(0),
        }
    }

    #[inline]
    fn shard(&self, key: &[u8]) -> &Shard {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % NUM_SHARDS]
    }

    /// Writes a row with an arbitrary (sub-second) lifetime.
    pub fn insert_with_ttl(&self, key: Bytes, value: Bytes, ttl: Option<Duration>) {
        self.shard(&key)
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, Row::new(value, ttl));
    }

    /// Number of physically stored rows, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|s| s.read().unwrap_or_else(PoisonError::into_inner).len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total rows removed by [`MemoryStore::purge_expired`].
    pub fn expired_count(&self) -> u64 {
        self.expired_count.load(Ordering::Relaxed)
    }

    /// Removes every expired row. Returns how many were removed.
    pub fn purge_expired(&self) -> u64 {
        let now = Instant::now();
        let mut purged = 0u64;

        for shard in &self.shards {
            let mut rows = shard.write().unwrap_or_else(PoisonError::into_inner);
            let before = rows.len();
            rows.retain(|_, row| !row.is_expired(now));
            purged += (before - rows.len()) as u64;
        }

        if purged > 0 {
            self.expired_count.fetch_add(purged, Ordering::Relaxed);
        }
        purged
    }

    fn lookup(&self, key: &[u8]) -> Option<Record> {
        let now = Instant::now();
        let rows = self.shard(key).read().unwrap_or_else(PoisonError::into_inner);
        rows.get(key).filter(|row| !row.is_expired(now)).map(|row| Record {
            value: row.value.clone(),
            ttl: row.remaining(now),
        })
    }

    fn contains(&self, key: &[u8], now: Instant) -> bool {
        let rows = self.shard(key).read().unwrap_or_else(PoisonError::into_inner);
        rows.get(key).is_some_and(|row| !row.is_expired(now))
    }
}

#[async_trait]
impl Storage for MemoryStore {
    fn backend_tag(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &[u8]) -> StorageResult<Option<Record>> {
        Ok(self.lookup(key))
    }

    async fn set(&self, key: &[u8], value: &[u8], expiry: Expiry) -> StorageResult<()> {
        let ttl = (!expiry.is_none()).then(|| Duration::from_secs(expiry.secs() as u64));
        self.insert_with_ttl(
            Bytes::copy_from_slice(key),
            Bytes::copy_from_slice(value),
            ttl,
        );
        Ok(())
    }

    async fn delete(&self, keys: &[Bytes]) -> StorageResult<()> {
        for key in keys {
            self.shard(key)
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(key);
        }
        Ok(())
    }

    async fn count(&self, keys: &[Bytes]) -> StorageResult<u64> {
        let now = Instant::now();
        let distinct: HashSet<&Bytes> = keys.iter().collect();
        Ok(distinct.into_iter().filter(|k| self.contains(k, now)).count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(names: &[&str]) -> Vec<Bytes> {
        names.iter().map(|n| Bytes::from(n.to_string())).collect()
    }

    #[tokio::test]
    async fn test_get_missing_row() {
        let store = MemoryStore::new();
        assert_eq!(store.get(b"nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_without_expiry_is_persistent() {
        let store = MemoryStore::new();
        store.set(b"k", b"v", Expiry::NONE).await.unwrap();

        let record = store.get(b"k").await.unwrap().unwrap();
        assert_eq!(record.value, Bytes::from("v"));
        assert_eq!(record.ttl, RemainingTtl::Persistent);
    }

    #[tokio::test]
    async fn test_fresh_expiry_reads_back_whole() {
        let store = MemoryStore::new();
        let expiry = Expiry::from_secs(100).unwrap();
        store.set(b"k", b"v", expiry).await.unwrap();

        let record = store.get(b"k").await.unwrap().unwrap();
        assert_eq!(record.ttl, RemainingTtl::Seconds(100));
    }

    #[tokio::test]
    async fn test_set_is_upsert() {
        let store = MemoryStore::new();
        store
            .set(b"k", b"old", Expiry::from_secs(50).unwrap())
            .await
            .unwrap();
        store.set(b"k", b"new", Expiry::NONE).await.unwrap();

        let record = store.get(b"k").await.unwrap().unwrap();
        assert_eq!(record.value, Bytes::from("new"));
        assert_eq!(record.ttl, RemainingTtl::Persistent);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_expired_rows_are_invisible() {
        let store = MemoryStore::new();
        store.insert_with_ttl(
            Bytes::from("k"),
            Bytes::from("v"),
            Some(Duration::from_millis(10)),
        );
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(store.get(b"k").await.unwrap(), None);
        assert_eq!(store.count(&keys(&["k"])).await.unwrap(), 0);
        assert_eq!(store.len(), 1);

        assert_eq!(store.purge_expired(), 1);
        assert!(store.is_empty());
        assert_eq!(store.expired_count(), 1);
    }

    #[tokio::test]
    async fn test_delete_ignores_absent_keys() {
        let store = MemoryStore::new();
        store.set(b"a", b"1", Expiry::NONE).await.unwrap();

        store.delete(&keys(&["a", "b"])).await.unwrap();
        assert_eq!(store.get(b"a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_count_distinct_present_keys() {
        let store = MemoryStore::new();
        store.set(b"a", b"1", Expiry::NONE).await.unwrap();
        store.set(b"c", b"3", Expiry::NONE).await.unwrap();

        assert_eq!(store.count(&keys(&["a", "b", "c"])).await.unwrap(), 2);
        assert_eq!(store.count(&keys(&["c", "b", "a"])).await.unwrap(), 2);
        assert_eq!(store.count(&keys(&["a", "a"])).await.unwrap(), 1);
    }
}
