//! # cqlbridge
//!
//! A Redis-protocol front end whose keys live in a Cassandra table. The
//! bridge holds no data itself: every command becomes one or more CQL
//! round-trips, and key expiry is the table's native per-row TTL.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                            cqlbridge                              │
//! │                                                                   │
//! │  ┌─────────────┐    ┌─────────────┐    ┌──────────────────────┐   │
//! │  │ TCP Server  │───>│ Connection  │───>│     Dispatcher       │   │
//! │  │ (Listener)  │    │  Handler    │    │ registry + arity     │   │
//! │  └─────────────┘    └──────┬──────┘    └──────────┬───────────┘   │
//! │                            │                      │               │
//! │                     ┌──────▼──────┐    ┌──────────▼───────────┐   │
//! │                     │ RESP framer │    │  Semantics Engine    │   │
//! │                     └─────────────┘    └──────────┬───────────┘   │
//! │                                                   │               │
//! │                                        ┌──────────▼───────────┐   │
//! │                                        │    dyn Storage       │   │
//! │                                        │ Cassandra | Memory   │   │
//! │                                        └──────────────────────┘   │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Supported Commands
//!
//! `PING`, `QUIT`, `GET`, `SET key value [EX seconds]`, `DEL`/`UNLINK`,
//! `TTL`, `PTTL`, `EXPIRE`, `EXISTS`, `RENAME`.
//!
//! ## Quick Start
//!
//! ```no_run
//! use cqlbridge::commands::Dispatcher;
//! use cqlbridge::connection::{handle_connection, ConnectionStats};
//! use cqlbridge::storage::{start_expiry_sweeper, MemoryStore};
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = Arc::new(MemoryStore::new());
//!     let _sweeper = start_expiry_sweeper(Arc::clone(&store));
//!
//!     let dispatcher = Dispatcher::with_storage(store);
//!     let stats = Arc::new(ConnectionStats::new());
//!     let listener = TcpListener::bind(cqlbridge::DEFAULT_LISTEN).await?;
//!
//!     loop {
//!         let (stream, addr) = listener.accept().await?;
//!         tokio::spawn(handle_connection(stream, addr, dispatcher.clone(), Arc::clone(&stats)));
//!     }
//! }
//! ```

pub mod commands;
pub mod config;
pub mod connection;
pub mod protocol;
pub mod storage;

#[cfg(test)]
pub(crate) mod testing;

pub use commands::{CommandError, Dispatcher, Response};
pub use config::{Backend, Config};
pub use connection::{handle_connection, ConnectionStats};
pub use protocol::{Command, RespValue};
pub use storage::{CassandraStore, MemoryStore, Storage};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Address served when none is configured.
pub const DEFAULT_LISTEN: &str = "0.0.0.0:6380";
