//! Server-side session: one command processor per accepted connection.
//!
//! ```text
//!            ┌──────── reply sent ────────┐
//!            ▼                            │
//!     AwaitCommand ── request read ──► Respond
//!            │                            │
//!            └─ EOF / read error ─► Closed ◄── write error
//! ```
//!
//! Each iteration performs a single read of at most `recv_buffer` bytes;
//! the request is classified by prefix and answered in full. No state is
//! carried from one command to the next.

use std::io;
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tracing::{debug, warn};

use crate::command::{self, Command, GET_IMAGE_DATA};
use crate::error::SidsError;
use crate::metadata::MetadataRecord;
use crate::slot::FrameSlot;
use crate::transport::send_exact;

/// Bytes taken by one request read.
pub const RECV_BUFFER_SIZE: usize = 100;

// ── SessionState ─────────────────────────────────────────────────

/// Phase of a server session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Waiting for the next request.
    #[default]
    AwaitCommand,
    /// The connection is released. Terminal.
    Closed,
}

// ── Replies ──────────────────────────────────────────────────────

/// Pre-encoded text replies shared by every session of one server.
#[derive(Debug, Clone)]
pub struct Replies {
    version: Bytes,
    metadata: Bytes,
    help: Bytes,
}

impl Replies {
    /// Encode the replies for a stream once, up front.
    pub fn new(metadata: &MetadataRecord, version: &str) -> Result<Self, SidsError> {
        Ok(Self {
            version: Bytes::from(command::nul_terminated(version)),
            metadata: Bytes::from(metadata.to_wire()?),
            help: Bytes::from(command::help_reply()),
        })
    }

    /// The text reply for `cmd`, or `None` for `GET_IMAGE_DATA`.
    pub fn text(&self, cmd: Command) -> Option<&Bytes> {
        match cmd {
            Command::Version => Some(&self.version),
            Command::MetaData => Some(&self.metadata),
            Command::Unknown => Some(&self.help),
            Command::ImageData => None,
        }
    }
}

// ── CommandProcessor ─────────────────────────────────────────────

/// State machine answering requests on one connection.
pub struct CommandProcessor {
    slot: Arc<FrameSlot>,
    replies: Replies,
    request: Vec<u8>,
    frame: Vec<u8>,
    state: SessionState,
    frames_sent: u64,
}

impl CommandProcessor {
    /// Create a processor reading requests of up to `recv_buffer` bytes.
    pub fn new(slot: Arc<FrameSlot>, replies: Replies, recv_buffer: usize) -> Self {
        let frame = vec![0u8; slot.frame_size()];
        Self {
            slot,
            replies,
            request: vec![0u8; recv_buffer.max(1)],
            frame,
            state: SessionState::AwaitCommand,
            frames_sent: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Serve requests until the session closes. Returns the frame count.
    pub async fn run<S>(mut self, mut io: S) -> u64
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        while self.step(&mut io).await == SessionState::AwaitCommand {}
        self.frames_sent
    }

    /// Handle one request.
    pub async fn step<S>(&mut self, io: &mut S) -> SessionState
    where
        S: AsyncRead + AsyncWrite + Unpin + ?Sized,
    {
        if self.state == SessionState::Closed {
            return self.state;
        }

        let n = match io.read(&mut self.request).await {
            Ok(0) => {
                debug!("peer closed the session");
                return self.close();
            }
            Ok(n) => n,
            Err(e) => {
                debug!("request read failed: {e}");
                return self.close();
            }
        };

        let cmd = Command::parse(&self.request[..n]);
        debug!("request {cmd} ({n} bytes)");

        if let Err(e) = self.respond(io, cmd).await {
            warn!("dropping session: {e}");
            return self.close();
        }
        self.state
    }

    async fn respond<S>(&mut self, io: &mut S, cmd: Command) -> Result<(), SidsError>
    where
        S: AsyncWrite + Unpin + ?Sized,
    {
        if let Some(reply) = self.replies.text(cmd) {
            let op = cmd.token().unwrap_or("help reply");
            return send_exact(io, reply, op).await;
        }

        if !self.slot.try_read(&mut self.frame).await {
            return Err(SidsError::transport(
                GET_IMAGE_DATA,
                io::Error::new(io::ErrorKind::TimedOut, "no frame available from slot"),
            ));
        }
        send_exact(io, &self.frame, GET_IMAGE_DATA).await?;
        self.frames_sent += 1;
        Ok(())
    }

    fn close(&mut self) -> SessionState {
        self.state = SessionState::Closed;
        self.state
    }
}
