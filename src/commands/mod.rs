//! Command Module
//!
//! Everything between a parsed [`Command`](crate::protocol::Command) and the
//! storage calls it turns into.
//!
//! ## Architecture
//!
//! ```text
//! Command (verb + args)
//!       │
//!       ▼
//! ┌─────────────────┐
//! │   Dispatcher    │  probe / lookup / arity / argument parsing
//! │  + Registry     │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │     engine      │  sentinels, TTL arithmetic, read-modify-write
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │   dyn Storage   │  (storage module)
//! └─────────────────┘
//! ```
//!
//! ## Supported Commands
//!
//! - `PING`, `QUIT`
//! - `GET key`, `SET key value [EX seconds]`
//! - `DEL key [key ...]` / `UNLINK key [key ...]`
//! - `TTL key`, `PTTL key`, `EXPIRE key seconds`
//! - `EXISTS key [key ...]`, `RENAME key newkey`

pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod registry;

pub use dispatcher::{execute, Dispatcher, Response};
pub use error::{CommandError, CommandResult, ErrorKind};
pub use registry::{Arity, CommandRegistry, Verb, VerbSpec, PROBE_VERBS, STANDARD_VERBS};
