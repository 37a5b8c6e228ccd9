//! # sids-core
//!
//! Protocol engine for the standard image data server: a pull-based
//! protocol over TCP where a client asks for the current frame of a
//! fixed-size image stream.
//!
//! This crate contains:
//! - **Metadata**: `MetadataRecord`, the textual stream descriptor and its codec
//! - **Commands**: the `GET_*` request tokens and their text replies
//! - **Transport**: exact-length send/receive over any async stream
//! - **Slot**: `FrameSlot`, the single-frame buffer between producer and sessions
//! - **Producer**: `FrameSource` and the task driving it into a slot
//! - **Server**: accept loop and per-connection `CommandProcessor`
//! - **Client**: handshake plus frame pulling, and `BlobClient`
//! - **Error**: `SidsError`, typed, `thiserror`-based

pub mod client;
pub mod command;
pub mod coord;
pub mod error;
pub mod metadata;
pub mod producer;
pub mod server;
pub mod session;
pub mod slot;
pub mod transport;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use client::{BlobClient, Client, ClientConfig};
pub use command::{CURRENT_VERSION, Command, GET_IMAGE_DATA, GET_META_DATA, GET_VERSION};
pub use coord::BlobCoordinate;
pub use error::SidsError;
pub use metadata::MetadataRecord;
pub use producer::{FrameSource, Producer, ProducerConfig};
pub use server::{Server, ServerConfig};
pub use session::{CommandProcessor, Replies, SessionState};
pub use slot::{FrameSlot, SlotConfig, WaitStrategy};
pub use transport::{receive_exact, receive_exact_into, send_command_and_receive, send_exact};
