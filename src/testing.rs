//! Test doubles shared by the unit tests.

use crate::storage::{
    Expiry, MemoryStore, Record, Storage, StorageError, StorageOp, StorageResult,
};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Mutex;

/// A [`MemoryStore`] that records every call and can fail chosen operations.
#[derive(Debug, Default)]
pub struct RecordingStore {
    pub inner: MemoryStore,
    calls: Mutex<Vec<StorageOp>>,
    failing: Mutex<Vec<StorageOp>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later call of `op` fail.
    pub fn fail_on(&self, op: StorageOp) {
        self.failing.lock().unwrap().push(op);
    }

    /// Operations issued so far, in order.
    pub fn calls(&self) -> Vec<StorageOp> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn enter(&self, op: StorageOp) -> StorageResult<()> {
        self.calls.lock().unwrap().push(op);
        if self.failing.lock().unwrap().contains(&op) {
            return Err(StorageError::new(op, "injected failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for RecordingStore {
    fn backend_tag(&self) -> &'static str {
        "recording"
    }

    async fn get(&self, key: &[u8]) -> StorageResult<Option<Record>> {
        self.enter(StorageOp::Get)?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &[u8], value: &[u8], expiry: Expiry) -> StorageResult<()> {
        self.enter(StorageOp::Set)?;
        self.inner.set(key, value, expiry).await
    }

    async fn delete(&self, keys: &[Bytes]) -> StorageResult<()> {
        self.enter(StorageOp::Delete)?;
        self.inner.delete(keys).await
    }

    async fn count(&self, keys: &[Bytes]) -> StorageResult<u64> {
        self.enter(StorageOp::Count)?;
        self.inner.count(keys).await
    }
}

/// Byte-string tokens from string literals.
pub fn args(parts: &[&str]) -> Vec<Bytes> {
    parts.iter().map(|p| Bytes::from(p.to_string())).collect()
}
