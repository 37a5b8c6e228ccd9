//! Blob coordinate carried in a 4-byte grey frame.
//!
//! ```text
//! byte 0: X low   byte 1: X high   byte 2: Y low   byte 3: Y high
//! ```

use crate::error::SidsError;

/// Centre of a detected blob, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BlobCoordinate {
    pub x: u16,
    pub y: u16,
}

impl BlobCoordinate {
    /// Encoded size on the wire.
    pub const SIZE: usize = 4;

    pub fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }

    /// `(0, 0)` is what a detector publishes when nothing was found.
    pub fn is_origin(&self) -> bool {
        self.x == 0 && self.y == 0
    }

    /// Serialize to bytes (little-endian per axis).
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let [x0, x1] = self.x.to_le_bytes();
        let [y0, y1] = self.y.to_le_bytes();
        [x0, x1, y0, y1]
    }

    /// Deserialize from the first four bytes of a frame.
    pub fn decode(data: &[u8]) -> Result<Self, SidsError> {
        match data {
            [x0, x1, y0, y1, ..] => Ok(Self {
                x: u16::from_le_bytes([*x0, *x1]),
                y: u16::from_le_bytes([*y0, *y1]),
            }),
            _ => Err(SidsError::UnsupportedStream(format!(
                "blob coordinate needs {} bytes, frame has {}",
                Self::SIZE,
                data.len()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_little_endian_axes() {
        let c = BlobCoordinate::decode(&[0x2C, 0x01, 0x05, 0x00]).unwrap();
        assert_eq!(c, BlobCoordinate::new(300, 5));
    }

    #[test]
    fn encodes_little_endian_axes() {
        assert_eq!(BlobCoordinate::new(300, 5).encode(), [0x2C, 0x01, 0x05, 0x00]);
    }

    #[test]
    fn short_frame_is_rejected() {
        assert!(BlobCoordinate::decode(&[1, 2, 3]).is_err());
    }

    #[test]
    fn origin_means_no_blob() {
        assert!(BlobCoordinate::default().is_origin());
        assert!(!BlobCoordinate::new(0, 1).is_origin());
    }
}
