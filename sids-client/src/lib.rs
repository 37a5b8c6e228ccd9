//! # sids-client: Standard Image Data Client
//!
//! Connects to an image data server, performs the version and metadata
//! handshake, then pulls frames in a loop.
//!
//! ## Modes
//!
//! - **Pixels**: report frame count, mean intensity and frame rate.
//! - **Blob**: print every non-zero coordinate from a blob detector.

pub mod config;
pub mod display;
pub mod viewer;
