//! Domain-specific error types for the image data protocol.
//!
//! All fallible operations return `Result<T, SidsError>`.
//! The variants mirror how far an error is allowed to travel: a
//! connection or grammar error ends the process, a transport error ends
//! one session.

use std::io;

use thiserror::Error;

/// Number of positional tokens in a metadata string.
pub const METADATA_TOKENS: usize = 9;

/// The canonical error type for the image data protocol.
#[derive(Debug, Error)]
pub enum SidsError {
    // ── Connection Errors ────────────────────────────────────────
    /// Listening, connecting or accepting failed.
    #[error("connection error: {context}: {source}")]
    Connection {
        context: String,
        #[source]
        source: io::Error,
    },

    // ── Transport Errors ─────────────────────────────────────────
    /// A send or receive failed mid-session.
    #[error("transport error during {op}: {source}")]
    Transport {
        op: &'static str,
        #[source]
        source: io::Error,
    },

    /// The peer closed the stream before the expected bytes arrived.
    #[error("short read: peer closed after {received} of {expected} bytes")]
    ShortRead { expected: usize, received: usize },

    // ── Protocol Errors ──────────────────────────────────────────
    /// A metadata string did not match the fixed grammar.
    #[error("can't interpret image meta data: matched {matched} of {METADATA_TOKENS} tokens ({reason})")]
    BadMetadata { matched: usize, reason: String },

    /// The stream shape does not satisfy a consumer's precondition.
    #[error("unsupported stream: {0}")]
    UnsupportedStream(String),
}

impl SidsError {
    /// Wrap an I/O error raised while establishing a connection.
    pub fn connection(context: impl Into<String>, source: io::Error) -> Self {
        SidsError::Connection {
            context: context.into(),
            source,
        }
    }

    /// Wrap an I/O error raised by `op` on an established stream.
    pub fn transport(op: &'static str, source: io::Error) -> Self {
        SidsError::Transport { op, source }
    }

    pub(crate) fn bad_metadata(matched: usize, reason: impl Into<String>) -> Self {
        SidsError::BadMetadata {
            matched,
            reason: reason.into(),
        }
    }

    /// Errors that leave the responsible process unable to continue.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::BadMetadata { .. } | Self::UnsupportedStream(_)
        )
    }

    /// Errors that tear down one session or client loop only.
    pub fn is_session_local(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::ShortRead { .. })
    }
}
