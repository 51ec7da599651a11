//! Storage Adapter Module
//!
//! The bridge keeps no data of its own. Every key lives as one row in a
//! table with native per-row expiry, reached through the [`Storage`] trait.
//!
//! ## Backends
//!
//! ```text
//!                 ┌──────────────────────┐
//!                 │   dyn Storage        │  get / set / delete / count
//!                 └──────────┬───────────┘
//!              ┌─────────────┴─────────────┐
//!              ▼                           ▼
//!   ┌─────────────────────┐     ┌─────────────────────┐
//!   │   CassandraStore    │     │    MemoryStore      │
//!   │  CQL at QUORUM      │     │  sharded RwLock map │
//!   │  USING TTL / TTL()  │     │  + ExpirySweeper    │
//!   └─────────────────────┘     └─────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use cqlbridge::storage::{Expiry, MemoryStore, RemainingTtl, Storage};
//!
//! # tokio_test::block_on(async {
//! let store = MemoryStore::new();
//! store.set(b"session", b"abc", Expiry::from_secs(60).unwrap()).await.unwrap();
//!
//! let record = store.get(b"session").await.unwrap().unwrap();
//! assert_eq!(record.ttl, RemainingTtl::Seconds(60));
//! # });
//! ```

pub mod adapter;
pub mod cassandra;
pub mod expiry;
pub mod memory;

pub use adapter::{
    ttl_sentinel, BoxError, Expiry, Record, RemainingTtl, Storage, StorageError, StorageOp,
    StorageResult, MAX_EXPIRY_SECS, TTL_MISSING, TTL_PERSISTENT,
};
pub use cassandra::{CassandraConfig, CassandraStore};
pub use expiry::{start_expiry_sweeper, ExpiryConfig, ExpirySweeper};
pub use memory::MemoryStore;
