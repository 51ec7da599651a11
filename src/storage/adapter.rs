//! Storage Adapter Contract
//!
//! Every backend stores one logical table of `(key, value, expiry)` rows and
//! answers four calls: point read with remaining TTL, upsert with an optional
//! expiry, unconditional multi-key delete, and a presence count over a key set.
//!
//! Backends must tell "row absent" (`Ok(None)`) apart from a failed call
//! (`Err(StorageError)`). Failures keep the driver's error as their source and
//! name the logical operation that failed.

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use thiserror::Error;

/// TTL reply for a key that does not exist.
pub const TTL_MISSING: i64 = -2;

/// TTL reply for a key that exists without an expiry.
pub const TTL_PERSISTENT: i64 = -1;

/// Largest expiry a client may request, in seconds (20 years).
pub const MAX_EXPIRY_SECS: u32 = 630_720_000;

/// Boxed driver error carried inside [`StorageError`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for storage calls.
pub type StorageResult<T> = Result<T, StorageError>;

/// The logical storage operation a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageOp {
    Connect,
    Prepare,
    Get,
    Set,
    Delete,
    Count,
}

impl fmt::Display for StorageOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StorageOp::Connect => "connect",
            StorageOp::Prepare => "prepare",
            StorageOp::Get => "get",
            StorageOp::Set => "set",
            StorageOp::Delete => "delete",
            StorageOp::Count => "count",
        };
        f.write_str(name)
    }
}

/// A transport, timeout or query failure from a backend.
#[derive(Debug, Error)]
#[error("{op} failed: {source}")]
pub struct StorageError {
    op: StorageOp,
    #[source]
    source: BoxError,
}

impl StorageError {
    pub fn new(op: StorageOp, source: impl Into<BoxError>) -> Self {
        Self {
            op,
            source: source.into(),
        }
    }

    pub fn op(&self) -> StorageOp {
        self.op
    }
}

/// An expiry requested on write. Zero means the row never expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Expiry(u32);

impl Expiry {
    /// No expiry.
    pub const NONE: Expiry = Expiry(0);

    /// Validates an expiry in `[0, MAX_EXPIRY_SECS]`.
    pub fn from_secs(secs: u64) -> Option<Self> {
        if secs > MAX_EXPIRY_SECS as u64 {
            return None;
        }
        Some(Expiry(secs as u32))
    }

    pub fn secs(&self) -> u32 {
        self.0
    }

    pub fn is_none(&self) -> bool {
        self.0 == 0
    }

    /// The TTL a row written with this expiry reports right after the write.
    pub fn as_remaining(&self) -> RemainingTtl {
        match self.0 {
            0 => RemainingTtl::Persistent,
            n => RemainingTtl::Seconds(n),
        }
    }
}

/// Remaining lifetime of a row that exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemainingTtl {
    /// The row has no expiry.
    Persistent,
    /// Whole seconds until the storage layer drops the row.
    Seconds(u32),
}

impl RemainingTtl {
    /// The integer a `TTL` reply carries for this row.
    pub fn sentinel(&self) -> i64 {
        match self {
            RemainingTtl::Persistent => TTL_PERSISTENT,
            RemainingTtl::Seconds(n) => *n as i64,
        }
    }

    /// Converts back into an expiry for rewriting the row elsewhere.
    ///
    /// A row read at zero seconds left still exists, so it is rewritten with
    /// one second rather than with "no expiry".
    pub fn as_expiry(&self) -> Expiry {
        match self {
            RemainingTtl::Persistent => Expiry::NONE,
            RemainingTtl::Seconds(n) => Expiry((*n).clamp(1, MAX_EXPIRY_SECS)),
        }
    }
}

/// A row as read back from storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub value: Bytes,
    pub ttl: RemainingTtl,
}

/// Sentinel TTL for an optional row: `-2` when absent.
pub fn ttl_sentinel(record: Option<&Record>) -> i64 {
    record.map_or(TTL_MISSING, |r| r.ttl.sentinel())
}

/// A key/value table with native per-row expiry.
///
/// Implementations are shared by every connection behind an `Arc`, so they
/// must be `Send + Sync` and must not hold per-connection state.
#[async_trait]
pub trait Storage: Send + Sync + 'static {
    /// Short backend name for logs.
    fn backend_tag(&self) -> &'static str;

    /// Point read. `Ok(None)` when the row does not exist.
    async fn get(&self, key: &[u8]) -> StorageResult<Option<Record>>;

    /// Upsert. Replaces both the value and the expiry of an existing row.
    async fn set(&self, key: &[u8], value: &[u8], expiry: Expiry) -> StorageResult<()>;

    /// Unconditional delete. Absent keys are not an error.
    async fn delete(&self, keys: &[Bytes]) -> StorageResult<()>;

    /// Number of distinct keys in `keys` whose rows exist.
    async fn count(&self, keys: &[Bytes]) -> StorageResult<u64>;
}
