//! Blob detector stage: grey image in, one coordinate out.

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use sids_core::{BlobCoordinate, Client, FrameSource, MetadataRecord, SidsError};

/// Centre of the bounding box of all pixels brighter than `threshold`.
///
/// `pixels` is row-major with `width` columns. Returns the origin when no
/// pixel qualifies.
pub fn detect(pixels: &[u8], width: usize, threshold: u8) -> BlobCoordinate {
    if width == 0 {
        return BlobCoordinate::default();
    }
    let mut bounds: Option<(usize, usize, usize, usize)> = None;
    for (i, _) in pixels.iter().enumerate().filter(|&(_, &v)| v > threshold) {
        let (x, y) = (i % width, i / width);
        bounds = Some(match bounds {
            None => (x, x, y, y),
            Some((min_x, max_x, min_y, max_y)) => {
                (min_x.min(x), max_x.max(x), min_y.min(y), max_y.max(y))
            }
        });
    }
    match bounds {
        Some((min_x, max_x, min_y, max_y)) => BlobCoordinate::new(
            ((max_x - min_x) / 2 + min_x) as u16,
            ((max_y - min_y) / 2 + min_y) as u16,
        ),
        None => BlobCoordinate::default(),
    }
}

/// Pulls grey frames from upstream and publishes the blob centre.
pub struct BlobDetectorSource<S = TcpStream> {
    upstream: Client<S>,
    threshold: u8,
    width: usize,
    pixels: usize,
}

impl<S> BlobDetectorSource<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap an upstream client, which must deliver a grey stream whose
    /// coordinates fit in 16 bits.
    pub fn new(upstream: Client<S>, threshold: u8) -> Result<Self, SidsError> {
        let up = *upstream.metadata();
        if !up.is_grey() {
            return Err(SidsError::UnsupportedStream(format!(
                "blob detector needs a grey stream, upstream sends {up}"
            )));
        }
        if up.width > u16::MAX as u32 + 1 || up.height > u16::MAX as u32 + 1 {
            return Err(SidsError::UnsupportedStream(format!(
                "{}x{} exceeds the coordinate range",
                up.width, up.height
            )));
        }
        let pixels = (up.width as usize * up.height as usize).min(up.payload_bytes as usize);
        Ok(Self {
            upstream,
            threshold,
            width: up.width as usize,
            pixels,
        })
    }
}

#[async_trait]
impl<S> FrameSource for BlobDetectorSource<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    fn metadata(&self) -> MetadataRecord {
        MetadataRecord::blob()
    }

    async fn fill(&mut self, frame: &mut [u8]) -> Result<(), SidsError> {
        let (width, pixels, threshold) = (self.width, self.pixels, self.threshold);
        let image = self.upstream.next_frame().await?;
        let coord = detect(&image[..pixels], width, threshold);
        frame[..BlobCoordinate::SIZE].copy_from_slice(&coord.encode());
        Ok(())
    }
}
