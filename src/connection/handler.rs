//! Connection Handler
//!
//! Each client gets its own task running a strictly sequential loop: a
//! command's storage round-trips all finish and its reply is flushed before
//! the next command is taken from the buffer. Pipelined requests are served
//! in arrival order.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. accept ──> ConnectionHandler spawned inside a `conn` span
//!        │
//!        ▼
//! 2. ┌──────────────────────────────┐
//!    │ frame request from buffer    │◄─── read more bytes when incomplete
//!    │ dispatch (awaits storage)    │
//!    │ write + flush reply          │
//!    └──────────────┬───────────────┘
//!                   │  QUIT, EOF, I/O or framing error
//!                   ▼
//! 3. handler task ends
//! ```
//!
//! Command errors end only the command. Framing errors are answered with
//! `-ERR Protocol error: ...` and then close the connection, because the rest
//! of the byte stream can no longer be trusted.

use crate::commands::Dispatcher;
use crate::protocol::{Command, ParseError, RespParser, RespValue};
use bytes::{Buf, BytesMut};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tracing::{debug, info_span, trace, warn, Instrument};

/// Upper bound for buffered, not yet framed, request bytes.
const MAX_BUFFER_SIZE: usize = crate::protocol::parser::MAX_BULK_SIZE + 64 * 1024;

const INITIAL_BUFFER_SIZE: usize = 4096;

/// Counters shared by every connection.
#[derive(Debug, Default)]
pub struct ConnectionStats {
    pub connections_accepted: AtomicU64,
    pub active_connections: AtomicU64,
    pub commands_processed: AtomicU64,
    pub bytes_read: AtomicU64,
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn command_processed(&self) {
        self.commands_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written.fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// Serves one client connection.
pub struct ConnectionHandler {
    stream: BufWriter<TcpStream>,
    buffer: BytesMut,
    dispatcher: Dispatcher,
    parser: RespParser,
    stats: Arc<ConnectionStats>,
}

impl ConnectionHandler {
    pub fn new(stream: TcpStream, dispatcher: Dispatcher, stats: Arc<ConnectionStats>) -> Self {
        stats.connection_opened();

        Self {
            stream: BufWriter::new(stream),
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            dispatcher,
            parser: RespParser::new(),
            stats,
        }
    }

    /// Runs until the client quits or disconnects, or the connection fails.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        debug!("connection accepted");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => debug!("connection closed"),
            Err(ConnectionError::ClientDisconnected) => debug!("connection closed"),
            Err(ConnectionError::Io(e)) if e.kind() == std::io::ErrorKind::ConnectionReset => {
                debug!("connection reset by client")
            }
            Err(e) => warn!(error = %e, "connection closed"),
        }

        self.stats.connection_closed();
        result
    }

    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            while let Some(tokens) = self.try_frame().await? {
                let response = self.dispatcher.dispatch(Command::from_tokens(tokens)).await;
                self.stats.command_processed();
                self.send(&response.reply).await?;

                if response.close {
                    return Ok(());
                }
            }

            self.read_more_data().await?;
        }
    }

    /// Frames the next request, answering and failing on malformed input.
    async fn try_frame(&mut self) -> Result<Option<Vec<bytes::Bytes>>, ConnectionError> {
        let blank = self.parser.blank_prefix_len(&self.buffer);
        if blank > 0 {
            self.buffer.advance(blank);
        }

        match self.parser.parse(&self.buffer) {
            Ok(Some((tokens, consumed))) => {
                let _ = self.buffer.split_to(consumed);
                trace!(consumed, remaining = self.buffer.len(), "framed request");
                Ok(Some(tokens))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                let reply = RespValue::error(format!("ERR Protocol error: {}", e));
                self.send(&reply).await?;
                Err(ConnectionError::Parse(e))
            }
        }
    }

    async fn read_more_data(&mut self) -> Result<(), ConnectionError> {
        if self.buffer.len() >= MAX_BUFFER_SIZE {
            return Err(ConnectionError::BufferFull);
        }

        if self.buffer.capacity() - self.buffer.len() < 1024 {
            self.buffer.reserve(4096);
        }

        let n = self.stream.get_mut().read_buf(&mut self.buffer).await?;

        if n == 0 {
            return if self.buffer.is_empty() {
                Err(ConnectionError::ClientDisconnected)
            } else {
                Err(ConnectionError::UnexpectedEof)
            };
        }

        self.stats.bytes_read(n);
        trace!(bytes = n, "read data");
        Ok(())
    }

    async fn send(&mut self, reply: &RespValue) -> Result<(), ConnectionError> {
        let bytes = reply.serialize();
        self.stream.write_all(&bytes).await?;
        self.stream.flush().await?;
        self.stats.bytes_written(bytes.len());
        Ok(())
    }
}

/// Errors that end a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Parse(#[from] ParseError),

    #[error("client disconnected")]
    ClientDisconnected,

    #[error("unexpected end of stream")]
    UnexpectedEof,

    #[error("request buffer limit exceeded")]
    BufferFull,
}

/// Serves a connection to completion inside a span carrying the client address.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    dispatcher: Dispatcher,
    stats: Arc<ConnectionStats>,
) {
    let handler = ConnectionHandler::new(stream, dispatcher, stats);
    let _ = handler
        .run()
        .instrument(info_span!("conn", client = %addr))
        .await;
}
