//! Command tokens and fixed text replies.
//!
//! Commands are matched by prefix against the received bytes, in a fixed
//! priority order. Anything that matches none of them is `Unknown`, which
//! is answered with a help text rather than an error.

use std::fmt;

/// Literal token requesting the server version.
pub const GET_VERSION: &str = "GET_VERSION";
/// Literal token requesting the stream metadata.
pub const GET_META_DATA: &str = "GET_META_DATA";
/// Literal token requesting the latest frame.
pub const GET_IMAGE_DATA: &str = "GET_IMAGE_DATA";
/// Marker that opens the help text sent for unrecognised commands.
pub const UNKNOWN_COMMAND: &str = "<UNKNOWN_COMMAND>";

/// Version reported by servers built on this crate.
pub const CURRENT_VERSION: &str = "1.00";

// ── Command ──────────────────────────────────────────────────────

/// A request received by a server session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// `GET_VERSION`
    Version,
    /// `GET_META_DATA`
    MetaData,
    /// `GET_IMAGE_DATA`
    ImageData,
    /// Anything else.
    Unknown,
}

impl Command {
    /// Match order. `GET_META_DATA` must be tried before any catch-all.
    const DISPATCH: [Command; 3] = [Command::MetaData, Command::ImageData, Command::Version];

    /// Classify the bytes of one received request.
    pub fn parse(request: &[u8]) -> Self {
        Self::DISPATCH
            .into_iter()
            .find(|cmd| cmd.token().is_some_and(|t| request.starts_with(t.as_bytes())))
            .unwrap_or(Command::Unknown)
    }

    /// The literal token, if this is a recognised command.
    pub fn token(&self) -> Option<&'static str> {
        match self {
            Command::Version => Some(GET_VERSION),
            Command::MetaData => Some(GET_META_DATA),
            Command::ImageData => Some(GET_IMAGE_DATA),
            Command::Unknown => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token().unwrap_or(UNKNOWN_COMMAND))
    }
}

// ── Text replies ─────────────────────────────────────────────────

/// Help text sent for an unknown command, NUL terminator included.
pub fn help_reply() -> Vec<u8> {
    nul_terminated(&format!(
        "{UNKNOWN_COMMAND} please try:\n {GET_VERSION}\n {GET_META_DATA}\n {GET_IMAGE_DATA}\n"
    ))
}

/// Append the NUL terminator every text reply carries.
pub fn nul_terminated(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() + 1);
    out.extend_from_slice(text.as_bytes());
    out.push(0);
    out
}

/// Text of a reply up to its first NUL, lossily decoded.
pub fn reply_text(reply: &[u8]) -> String {
    let end = reply.iter().position(|&b| b == 0).unwrap_or(reply.len());
    String::from_utf8_lossy(&reply[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_literal_tokens() {
        assert_eq!(Command::parse(b"GET_VERSION"), Command::Version);
        assert_eq!(Command::parse(b"GET_META_DATA"), Command::MetaData);
        assert_eq!(Command::parse(b"GET_IMAGE_DATA"), Command::ImageData);
    }

    #[test]
    fn matches_by_prefix() {
        assert_eq!(Command::parse(b"GET_IMAGE_DATA\r\n"), Command::ImageData);
        assert_eq!(Command::parse(b"GET_META_DATA\0junk"), Command::MetaData);
    }

    #[test]
    fn unknown_tokens() {
        assert_eq!(Command::parse(b"GET_IMAGE"), Command::Unknown);
        assert_eq!(Command::parse(b"get_version"), Command::Unknown);
        assert_eq!(Command::parse(b""), Command::Unknown);
    }

    #[test]
    fn help_text_is_exact() {
        assert_eq!(
            help_reply(),
            b"<UNKNOWN_COMMAND> please try:\n GET_VERSION\n GET_META_DATA\n GET_IMAGE_DATA\n\0".to_vec()
        );
    }

    #[test]
    fn reply_text_stops_at_nul() {
        assert_eq!(reply_text(b"1.00\0\0\0"), "1.00");
        assert_eq!(reply_text(b"1.00"), "1.00");
    }

    #[test]
    fn display_uses_tokens() {
        assert_eq!(Command::MetaData.to_string(), "GET_META_DATA");
        assert_eq!(Command::Unknown.to_string(), "<UNKNOWN_COMMAND>");
    }
}
