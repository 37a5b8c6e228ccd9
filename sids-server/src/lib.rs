//! # sids-server: Standard Image Data Server
//!
//! Publishes one fixed-size frame stream over TCP. Any number of clients
//! may connect and pull the current frame with `GET_IMAGE_DATA`.
//!
//! ## Sources
//!
//! - **Pattern**: a generated moving gradient in grey or RGB.
//! - **Color filter**: pulls an RGB stream from another server and
//!   publishes a thresholded grey image.
//! - **Blob**: pulls a grey stream from another server and publishes the
//!   centre of the bright region as a 4-byte coordinate.

pub mod config;
pub mod service;
pub mod source;
