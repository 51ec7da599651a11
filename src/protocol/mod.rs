//! RESP Wire Layer
//!
//! Turns client bytes into [`Command`]s and [`RespValue`] replies back into
//! bytes. Nothing in here knows what a command means.
//!
//! ## Modules
//!
//! - `parser`: incremental request framer (RESP arrays and inline lines)
//! - `command`: verb + argument split of a framed request
//! - `types`: the `RespValue` frame and its serializer
//!
//! ## Example
//!
//! ```
//! use cqlbridge::protocol::{parse_request, Command, RespValue};
//!
//! let (tokens, consumed) = parse_request(b"*2\r\n$3\r\nTTL\r\n$1\r\nk\r\n")
//!     .unwrap()
//!     .unwrap();
//! assert_eq!(consumed, 20);
//!
//! let command = Command::from_tokens(tokens).unwrap();
//! assert_eq!(command.verb(), "ttl");
//!
//! assert_eq!(RespValue::integer(-2).serialize(), b":-2\r\n");
//! ```

pub mod command;
pub mod parser;
pub mod types;

pub use command::Command;
pub use parser::{parse_request, ParseError, ParseResult, RespParser, Tokens};
pub use types::RespValue;
