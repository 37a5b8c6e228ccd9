//! Generated test pattern, a stand-in for a camera.

use async_trait::async_trait;

use sids_core::{FrameSource, MetadataRecord, SidsError};

/// A diagonal gradient that shifts by one step per frame.
pub struct TestPattern {
    metadata: MetadataRecord,
    tick: u8,
}

impl TestPattern {
    pub fn new(width: u32, height: u32, color: bool) -> Self {
        let metadata = if color {
            MetadataRecord::rgb(width, height)
        } else {
            MetadataRecord::grey(width, height)
        };
        Self { metadata, tick: 0 }
    }

    /// Value of pixel `(x, y)` in the current frame.
    fn shade(&self, x: u32, y: u32) -> u8 {
        (x.wrapping_add(y) as u8).wrapping_add(self.tick)
    }
}

#[async_trait]
impl FrameSource for TestPattern {
    fn metadata(&self) -> MetadataRecord {
        self.metadata
    }

    async fn fill(&mut self, frame: &mut [u8]) -> Result<(), SidsError> {
        let width = self.metadata.width;
        let height = self.metadata.height.max(1);
        let channels = self.metadata.channels() as usize;

        let pixels = frame[..self.metadata.payload_bytes as usize].chunks_exact_mut(channels);
        for (i, px) in pixels.enumerate() {
            let x = i as u32 % width.max(1);
            let y = i as u32 / width.max(1);
            let v = self.shade(x, y);
            match px {
                [grey] => *grey = v,
                [r, g, b] => {
                    *r = v;
                    *g = 255 - v;
                    *b = (u64::from(y.min(height - 1)) * 255 / u64::from(height)) as u8;
                }
                _ => {}
            }
        }
        self.tick = self.tick.wrapping_add(1);
        Ok(())
    }
}
