//! Connection session: one TCP stream framed as a message channel.
//!
//! A `Session` owns both halves of the stream. `send` may be called from any
//! number of tasks concurrently (writes are serialized internally); `receive`
//! is intended to be driven by a single reader task, which is how both the
//! master's connection pumps and the worker's listener use it.
//!
//! Any I/O failure moves the session to the closed state. The session never
//! performs registry cleanup itself; its owner reacts to [`Received::Closed`]
//! or a failed `send`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::trace;

use crate::codec;
use crate::message::{Message, WireError};

/// Session-level failures.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The session is closed; no further traffic is possible.
    #[error("session closed")]
    Closed,

    /// The underlying stream failed. The session is closed afterwards.
    #[error("session i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// An inbound line failed to decode. The stream itself is still open.
    #[error(transparent)]
    Wire(#[from] WireError),
}

/// Outcome of a blocking read on the session.
#[derive(Debug)]
pub enum Received {
    /// A full message line arrived and decoded cleanly.
    Message(Message),
    /// The peer closed the stream, or it failed; the session is now closed.
    Closed,
}

/// A line-oriented message channel over one TCP stream.
pub struct Session {
    peer: SocketAddr,
    reader: Mutex<BufReader<OwnedReadHalf>>,
    writer: Mutex<BufWriter<OwnedWriteHalf>>,
    closed: AtomicBool,
}

impl Session {
    /// Wrap a connected stream.
    pub fn new(stream: TcpStream) -> Result<Self, SessionError> {
        let peer = stream.peer_addr()?;
        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            peer,
            reader: Mutex::new(BufReader::new(read_half)),
            writer: Mutex::new(BufWriter::new(write_half)),
            closed: AtomicBool::new(false),
        })
    }

    /// Remote address of this session.
    #[must_use]
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// True once the stream has closed or failed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Encode and write one message, flushing immediately.
    ///
    /// Safe to call from multiple tasks; writes are serialized so frames
    /// never interleave. Fails with [`SessionError::Closed`] once the
    /// session has transitioned to closed.
    pub async fn send(&self, msg: &Message) -> Result<(), SessionError> {
        if self.is_closed() {
            return Err(SessionError::Closed);
        }
        let line = codec::encode(msg);
        let mut writer = self.writer.lock().await;
        let result: std::io::Result<()> = async {
            writer.write_all(line.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await
        }
        .await;
        match result {
            Ok(()) => {
                trace!(peer = %self.peer, message_type = %msg.message_type, "sent");
                Ok(())
            }
            Err(e) => {
                self.closed.store(true, Ordering::Release);
                Err(SessionError::Io(e))
            }
        }
    }

    /// Block until a full line arrives, the stream closes, or it fails.
    ///
    /// EOF and I/O errors both surface as [`Received::Closed`]; a line that
    /// fails to decode surfaces as `Err(SessionError::Wire)` and leaves the
    /// stream open for the owner to decide.
    pub async fn receive(&self) -> Result<Received, SessionError> {
        if self.is_closed() {
            return Ok(Received::Closed);
        }
        let mut reader = self.reader.lock().await;
        let mut line = String::new();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                self.closed.store(true, Ordering::Release);
                Ok(Received::Closed)
            }
            Ok(_) => {
                let msg = codec::decode(&line)?;
                trace!(peer = %self.peer, message_type = %msg.message_type, "received");
                Ok(Received::Message(msg))
            }
            Err(_) => {
                self.closed.store(true, Ordering::Release);
                Ok(Received::Closed)
            }
        }
    }

    /// Close the session, shutting down the write side of the stream.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        let mut writer = self.writer.lock().await;
        // Best effort: the peer may already be gone.
        let _ = writer.shutdown().await;
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("peer", &self.peer)
            .field("closed", &self.is_closed())
            .finish()
    }
}
