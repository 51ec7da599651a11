//! Connection Module
//!
//! Accepted sockets are handed to [`handle_connection`], which owns the
//! socket for its whole lifetime.
//!
//! ```text
//! TcpListener (main.rs)
//!       │ accept()
//!       ▼
//! tokio::spawn(handle_connection) ── one task per client
//!       │
//!       ▼
//! ┌──────────────────────────────────────────────┐
//! │ read bytes ─> frame ─> dispatch ─> reply      │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use cqlbridge::commands::Dispatcher;
//! use cqlbridge::connection::{handle_connection, ConnectionStats};
//! use cqlbridge::storage::MemoryStore;
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! # async fn serve() -> std::io::Result<()> {
//! let dispatcher = Dispatcher::with_storage(Arc::new(MemoryStore::new()));
//! let stats = Arc::new(ConnectionStats::new());
//! let listener = TcpListener::bind("127.0.0.1:6380").await?;
//!
//! loop {
//!     let (stream, addr) = listener.accept().await?;
//!     tokio::spawn(handle_connection(stream, addr, dispatcher.clone(), Arc::clone(&stats)));
//! }
//! # }
//! ```

pub mod handler;

pub use handler::{handle_connection, ConnectionError, ConnectionHandler, ConnectionStats};
