//! Incremental RESP Request Parser
//!
//! Clients send each command either as a RESP array of bulk strings
//! (`*2\r\n$3\r\nGET\r\n$4\r\nname\r\n`) or as an inline line
//! (`GET name\r\n`, what `telnet` and `nc` users type). Both forms are
//! reduced to the same thing: an ordered list of byte-string tokens.
//!
//! The parser never blocks and never consumes a partial frame:
//! - `Ok(Some((tokens, consumed)))` - a full request, advance by `consumed`
//! - `Ok(None)` - the request is incomplete, read more bytes
//! - `Err(ParseError)` - the client sent something that is not RESP

use crate::protocol::types::{prefix, CRLF};
use bytes::Bytes;
use thiserror::Error;

/// Errors that can occur while framing a request.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("invalid integer: {0}")]
    InvalidInteger(String),

    #[error("invalid bulk length: {0}")]
    InvalidBulkLength(i64),

    #[error("invalid multibulk length: {0}")]
    InvalidArrayLength(i64),

    /// A request array held something other than a bulk string.
    #[error("expected '$', got byte {0:#04x}")]
    UnexpectedPrefix(u8),

    #[error("{0}")]
    ProtocolError(String),

    #[error("request too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// The tokens of one request, verb first.
pub type Tokens = Vec<Bytes>;

/// Maximum size for a single bulk string (512 MB, same as Redis)
pub const MAX_BULK_SIZE: usize = 512 * 1024 * 1024;

/// Maximum number of tokens in one request.
pub const MAX_TOKENS: usize = 1024 * 1024;

/// A stateless RESP request parser.
#[derive(Debug, Default, Clone, Copy)]
pub struct RespParser;

impl RespParser {
    pub fn new() -> Self {
        Self
    }

    /// Attempts to frame one request from the front of `buf`.
    ///
    /// Blank inline lines before the request are skipped and counted in
    /// `consumed`.
    pub fn parse(&self, buf: &[u8]) -> ParseResult<Option<(Tokens, usize)>> {
        let skipped = self.blank_prefix_len(buf);
        let rest = &buf[skipped..];

        let framed = match rest.first() {
            None => return Ok(None),
            Some(&prefix::ARRAY) => self.parse_array(rest)?,
            Some(_) => self.parse_inline(rest)?,
        };
        Ok(framed.map(|(tokens, consumed)| (tokens, skipped + consumed)))
    }

    /// Length of the complete blank inline lines at the front of `buf`.
    ///
    /// These carry no command and get no reply.
    pub fn blank_prefix_len(&self, buf: &[u8]) -> usize {
        let mut skipped = 0;
        loop {
            let rest = &buf[skipped..];
            if rest.first() == Some(&prefix::ARRAY) {
                return skipped;
            }
            match find_crlf(rest) {
                Some(end) if rest[..end].iter().all(u8::is_ascii_whitespace) => {
                    skipped += end + 2;
                }
                _ => return skipped,
            }
        }
    }

    /// Parses `*<count>\r\n` followed by `count` bulk strings.
    fn parse_array(&self, buf: &[u8]) -> ParseResult<Option<(Tokens, usize)>> {
        let (count, mut consumed) = match read_length(buf)? {
            Some(header) => header,
            None => return Ok(None),
        };

        // Null and empty arrays both carry no verb.
        if count <= 0 {
            if count < -1 {
                return Err(ParseError::InvalidArrayLength(count));
            }
            return Ok(Some((Vec::new(), consumed)));
        }

        let count = count as usize;
        if count > MAX_TOKENS {
            return Err(ParseError::InvalidArrayLength(count as i64));
        }

        let mut tokens = Vec::with_capacity(count.min(64));
        for _ in 0..count {
            match self.parse_bulk_string(&buf[consumed..])? {
                Some((token, used)) => {
                    tokens.push(token);
                    consumed += used;
                }
                None => return Ok(None),
            }
        }

        Ok(Some((tokens, consumed)))
    }

    /// Parses `$<length>\r\n<data>\r\n`.
    fn parse_bulk_string(&self, buf: &[u8]) -> ParseResult<Option<(Bytes, usize)>> {
        match buf.first() {
            None => return Ok(None),
            Some(&prefix::BULK_STRING) => {}
            Some(&other) => return Err(ParseError::UnexpectedPrefix(other)),
        }

        let (length, data_start) = match read_length(buf)? {
            Some(header) => header,
            None => return Ok(None),
        };

        if length < 0 {
            return Err(ParseError::InvalidBulkLength(length));
        }

        let length = length as usize;
        if length > MAX_BULK_SIZE {
            return Err(ParseError::MessageTooLarge {
                size: length,
                max: MAX_BULK_SIZE,
            });
        }

        let total_needed = data_start + length + 2;
        if buf.len() < total_needed {
            return Ok(None);
        }

        if &buf[data_start + length..total_needed] != CRLF {
            return Err(ParseError::ProtocolError(
                "bulk string missing trailing CRLF".to_string(),
            ));
        }

        let data = Bytes::copy_from_slice(&buf[data_start..data_start + length]);
        Ok(Some((data, total_needed)))
    }

    /// Parses a whitespace separated command line.
    fn parse_inline(&self, buf: &[u8]) -> ParseResult<Option<(Tokens, usize)>> {
        let line_end = match find_crlf(buf) {
            Some(pos) => pos,
            None => return Ok(None),
        };

        let tokens = buf[..line_end]
            .split(|b| b.is_ascii_whitespace())
            .filter(|part| !part.is_empty())
            .map(Bytes::copy_from_slice)
            .collect();

        Ok(Some((tokens, line_end + 2)))
    }
}

/// Reads the `<prefix><integer>\r\n` header shared by arrays and bulk strings.
///
/// Returns the integer and the number of header bytes.
fn read_length(buf: &[u8]) -> ParseResult<Option<(i64, usize)>> {
    let end = match find_crlf(&buf[1..]) {
        Some(pos) => pos,
        None => return Ok(None),
    };

    let digits = &buf[1..1 + end];
    let length = std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| ParseError::InvalidInteger(String::from_utf8_lossy(digits).into_owned()))?;

    Ok(Some((length, 1 + end + 2)))
}

/// Finds the position of the first `\r\n`, returning the index of `\r`.
#[inline]
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == CRLF)
}

/// Frames a single request from bytes.
pub fn parse_request(buf: &[u8]) -> ParseResult<Option<(Tokens, usize)>> {
    RespParser::new().parse(buf)
}
