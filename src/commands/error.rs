//! Command errors and their protocol replies.
//!
//! Every variant ends only the current command; the connection stays open.
//! The `Display` text is the description clients see after `ERR `.

use crate::protocol::RespValue;
use crate::storage::StorageError;
use thiserror::Error;

/// Result type for command execution.
pub type CommandResult<T> = Result<T, CommandError>;

/// Coarse classification used for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected before any storage call.
    Validation,
    /// A key that had to exist did not.
    NotFound,
    /// The storage backend failed.
    Storage,
    /// Unrecognized or intercepted verb.
    UnknownCommand,
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("wrong number of arguments for '{0}' command")]
    WrongArity(String),

    /// A request with no verb at all.
    #[error("wrong number of arguments")]
    EmptyCommand,

    #[error("value is not an integer or out of range")]
    InvalidInteger,

    #[error("syntax error")]
    Syntax,

    #[error("no such key")]
    NoSuchKey,

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("storage query: {0}")]
    Storage(#[from] StorageError),
}

impl CommandError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CommandError::WrongArity(_)
            | CommandError::EmptyCommand
            | CommandError::InvalidInteger
            | CommandError::Syntax => ErrorKind::Validation,
            CommandError::NoSuchKey => ErrorKind::NotFound,
            CommandError::UnknownCommand(_) => ErrorKind::UnknownCommand,
            CommandError::Storage(_) => ErrorKind::Storage,
        }
    }

    /// The `-ERR <description>` reply for this error.
    pub fn to_reply(&self) -> RespValue {
        RespValue::error(format!("ERR {}", self))
    }
}
