//! Color filter stage: RGB in, grey out.
//!
//! Each of the three channel filters keeps a pixel's channel value when
//! that channel is strong and the other two are weak, and zeroes it
//! otherwise. The published pixel is the weighted sum of the three filter
//! outputs plus an offset, saturated at 255.

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use sids_core::{Client, FrameSource, MetadataRecord, SidsError};

use crate::config::{ChannelThresholds, FilterConfig};

// ── ColorFilter ──────────────────────────────────────────────────

/// Largest accepted channel weight, in percent.
pub const MAX_WEIGHT: u32 = 100;
/// Largest accepted output offset.
pub const MAX_OFFSET: u32 = 255;

/// Per-pixel filter parameters.
#[derive(Debug, Clone)]
pub struct ColorFilter {
    red: ChannelThresholds,
    green: ChannelThresholds,
    blue: ChannelThresholds,
    weights: [u32; 3],
    offset: u32,
}

impl ColorFilter {
    /// Build a filter, clamping weights to `0..=100` and the offset to
    /// `0..=255`.
    pub fn from_config(config: &FilterConfig) -> Self {
        Self {
            red: config.red,
            green: config.green,
            blue: config.blue,
            weights: config.weights.map(|w| w.min(MAX_WEIGHT)),
            offset: config.offset.min(MAX_OFFSET),
        }
    }

    fn pass(t: &ChannelThresholds, value: u8, first: u8, second: u8) -> u32 {
        if value > t.above && first < t.below_first && second < t.below_second {
            value as u32
        } else {
            0
        }
    }

    /// Filter one RGB pixel to a grey value.
    pub fn pixel(&self, r: u8, g: u8, b: u8) -> u8 {
        let fr = Self::pass(&self.red, r, g, b);
        let fg = Self::pass(&self.green, g, r, b);
        let fb = Self::pass(&self.blue, b, r, g);
        let [wr, wg, wb] = self.weights;
        let sum = (wr * fr + wg * fg + wb * fb) / 100 + self.offset;
        sum.min(255) as u8
    }

    /// Filter interleaved RGB `rgb` into `out`, one byte per pixel.
    pub fn apply(&self, rgb: &[u8], out: &mut [u8]) {
        for (px, o) in rgb.chunks_exact(3).zip(out.iter_mut()) {
            *o = self.pixel(px[0], px[1], px[2]);
        }
    }
}

// ── ColorFilterSource ────────────────────────────────────────────

/// Pulls frames from an upstream color server and filters them.
pub struct ColorFilterSource<S = TcpStream> {
    upstream: Client<S>,
    filter: ColorFilter,
    metadata: MetadataRecord,
    pixels: usize,
}

impl<S> ColorFilterSource<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap an upstream client, which must deliver an RGB stream.
    pub fn new(upstream: Client<S>, filter: ColorFilter) -> Result<Self, SidsError> {
        let up = *upstream.metadata();
        if up.is_grey() {
            return Err(SidsError::UnsupportedStream(format!(
                "color filter needs a color stream, upstream sends {up}"
            )));
        }
        let pixels = up.width as usize * up.height as usize;
        if (up.payload_bytes as usize) < pixels * 3 {
            return Err(SidsError::UnsupportedStream(format!(
                "upstream payload of {} bytes is too small for {}x{} RGB",
                up.payload_bytes, up.width, up.height
            )));
        }
        // Published as grey with the upstream's RGB tag kept.
        let metadata = MetadataRecord::grey(up.width, up.height);
        Ok(Self {
            upstream,
            filter,
            metadata,
            pixels,
        })
    }
}

#[async_trait]
impl<S> FrameSource for ColorFilterSource<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    fn metadata(&self) -> MetadataRecord {
        self.metadata
    }

    async fn fill(&mut self, frame: &mut [u8]) -> Result<(), SidsError> {
        let pixels = self.pixels;
        let rgb = self.upstream.next_frame().await?;
        self.filter.apply(&rgb[..pixels * 3], &mut frame[..pixels]);
        Ok(())
    }
}
