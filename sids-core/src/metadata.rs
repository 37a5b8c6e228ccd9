//! Frame-description grammar.
//!
//! A stream is described by a single bracketed ASCII line:
//!
//! ```text
//! [W=<width>,H=<height>,O=<origin>,C=<color>,X=<c1><c2><c3>,B=<payload>,BTS=<timestamp>]
//! ```
//!
//! On the wire the line is followed by one NUL terminator. Decoding is
//! positional and all-or-nothing: exactly nine tokens in this order, every
//! literal (brackets, commas, key labels) byte-for-byte, nothing after the
//! closing bracket.

use std::fmt;

use crate::error::{METADATA_TOKENS, SidsError};

/// Origin convention every known server advertises.
pub const DEFAULT_ORIGIN: u8 = b'W';

/// Channel tag used by pixel servers.
pub const TAG_RGB: [u8; 3] = *b"RGB";

/// Channel tag used by the blob detector server.
pub const TAG_BLOB: [u8; 3] = *b"XXX";

// ── MetadataRecord ───────────────────────────────────────────────

/// Shape of one frame stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MetadataRecord {
    /// Pixel columns.
    pub width: u32,
    /// Pixel rows.
    pub height: u32,
    /// Origin convention, carried opaquely.
    pub origin: u8,
    /// `0` for single-channel grey, anything else for interleaved color.
    pub color_depth: u32,
    /// Channel order, carried opaquely.
    pub channel_tag: [u8; 3],
    /// Pixel bytes per frame.
    pub payload_bytes: u32,
    /// Trailing timestamp bytes per frame.
    pub timestamp_bytes: u32,
}

impl MetadataRecord {
    /// A single-channel stream with a conventional payload size.
    pub fn grey(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            origin: DEFAULT_ORIGIN,
            color_depth: 0,
            channel_tag: TAG_RGB,
            payload_bytes: width.saturating_mul(height),
            timestamp_bytes: 0,
        }
    }

    /// An interleaved three-channel RGB stream.
    pub fn rgb(width: u32, height: u32) -> Self {
        Self {
            color_depth: 1,
            payload_bytes: width.saturating_mul(height).saturating_mul(3),
            ..Self::grey(width, height)
        }
    }

    /// The 4×1 grey stream served by a blob detector.
    pub fn blob() -> Self {
        Self {
            channel_tag: TAG_BLOB,
            ..Self::grey(4, 1)
        }
    }

    /// Whether the stream carries a single grey channel.
    pub fn is_grey(&self) -> bool {
        self.color_depth == 0
    }

    /// Interleaved channels per pixel implied by `color_depth`.
    pub fn channels(&self) -> u32 {
        if self.is_grey() { 1 } else { 3 }
    }

    /// Bytes exchanged per `GET_IMAGE_DATA` reply.
    pub fn frame_size(&self) -> usize {
        self.payload_bytes as usize + self.timestamp_bytes as usize
    }

    /// Payload size implied by the geometry, `width * height * channels`.
    pub fn expected_payload(&self) -> u64 {
        self.width as u64 * self.height as u64 * self.channels() as u64
    }

    /// Check that `payload_bytes` agrees with the geometry.
    ///
    /// Legacy servers never enforce this; callers opt in.
    pub fn validate_payload(&self) -> Result<(), SidsError> {
        let expected = self.expected_payload();
        if expected != self.payload_bytes as u64 {
            return Err(SidsError::bad_metadata(
                METADATA_TOKENS,
                format!(
                    "payload B={} does not match {}x{}x{} = {expected}",
                    self.payload_bytes,
                    self.width,
                    self.height,
                    self.channels()
                ),
            ));
        }
        Ok(())
    }

    // ── Encoding ─────────────────────────────────────────────────

    /// Encode to the metadata line, without the NUL terminator.
    pub fn encode(&self) -> Result<String, SidsError> {
        if self.width == 0 || self.height == 0 {
            return Err(SidsError::bad_metadata(
                0,
                format!("dimensions must be positive, got {}x{}", self.width, self.height),
            ));
        }
        if !self.origin.is_ascii_graphic() {
            return Err(SidsError::bad_metadata(2, "origin must be a printable ASCII character"));
        }
        if !self.channel_tag.iter().all(u8::is_ascii_graphic) {
            return Err(SidsError::bad_metadata(
                4,
                "channel tag must be three printable ASCII characters",
            ));
        }
        Ok(self.to_string())
    }

    /// Encode to the bytes sent on the wire, NUL terminator included.
    pub fn to_wire(&self) -> Result<Vec<u8>, SidsError> {
        let mut wire = self.encode()?.into_bytes();
        wire.push(0);
        Ok(wire)
    }

    // ── Decoding ─────────────────────────────────────────────────

    /// Decode a metadata reply.
    ///
    /// The input is read up to its first NUL, like the C string the legacy
    /// peers exchange.
    pub fn decode(input: &[u8]) -> Result<Self, SidsError> {
        let end = input.iter().position(|&b| b == 0).unwrap_or(input.len());
        let line = &input[..end];
        if line.is_empty() {
            return Err(SidsError::bad_metadata(0, "empty input"));
        }

        let mut p = Parser::new(line);
        p.literal("[W=")?;
        let width = p.number()?;
        p.literal(",H=")?;
        let height = p.number()?;
        p.literal(",O=")?;
        let origin = p.character()?;
        p.literal(",C=")?;
        let color_depth = p.number()?;
        p.literal(",X=")?;
        let channel_tag = [p.character()?, p.character()?, p.character()?];
        p.literal(",B=")?;
        let payload_bytes = p.number()?;
        p.literal(",BTS=")?;
        let timestamp_bytes = p.number()?;
        p.literal("]")?;
        p.finish()?;

        Ok(Self {
            width,
            height,
            origin,
            color_depth,
            channel_tag,
            payload_bytes,
            timestamp_bytes,
        })
    }

    /// Decode and additionally require a consistent payload size.
    pub fn decode_strict(input: &[u8]) -> Result<Self, SidsError> {
        let record = Self::decode(input)?;
        record.validate_payload()?;
        Ok(record)
    }
}

impl fmt::Display for MetadataRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [c1, c2, c3] = self.channel_tag;
        write!(
            f,
            "[W={},H={},O={},C={},X={}{}{},B={},BTS={}]",
            self.width,
            self.height,
            self.origin as char,
            self.color_depth,
            c1 as char,
            c2 as char,
            c3 as char,
            self.payload_bytes,
            self.timestamp_bytes
        )
    }
}

// ── Parser ───────────────────────────────────────────────────────

/// Positional tokenizer over one metadata line.
struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
    matched: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            pos: 0,
            matched: 0,
        }
    }

    fn fail(&self, reason: String) -> SidsError {
        SidsError::bad_metadata(self.matched, reason)
    }

    fn literal(&mut self, lit: &str) -> Result<(), SidsError> {
        if self.input[self.pos..].starts_with(lit.as_bytes()) {
            self.pos += lit.len();
            Ok(())
        } else {
            Err(self.fail(format!("expected {lit:?} at offset {}", self.pos)))
        }
    }

    fn number(&mut self) -> Result<u32, SidsError> {
        let digits = self.input[self.pos..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count();
        if digits == 0 {
            return Err(self.fail(format!("expected digits at offset {}", self.pos)));
        }
        let text = &self.input[self.pos..self.pos + digits];
        // ASCII digits are always valid UTF-8.
        let value = std::str::from_utf8(text)
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .ok_or_else(|| self.fail(format!("number out of range at offset {}", self.pos)))?;
        self.pos += digits;
        self.matched += 1;
        Ok(value)
    }

    fn character(&mut self) -> Result<u8, SidsError> {
        match self.input.get(self.pos) {
            Some(&b) if b.is_ascii_graphic() => {
                self.pos += 1;
                self.matched += 1;
                Ok(b)
            }
            Some(_) => Err(self.fail(format!("non-printable character at offset {}", self.pos))),
            None => Err(self.fail("unexpected end of input".to_string())),
        }
    }

    fn finish(&self) -> Result<(), SidsError> {
        if self.pos == self.input.len() {
            Ok(())
        } else {
            Err(self.fail(format!(
                "{} trailing bytes after closing bracket",
                self.input.len() - self.pos
            )))
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
