//! Producer side of the frame slot.
//!
//! A [`FrameSource`] is whatever generates frames at its own pace: a
//! camera, a filter pulling from another server, a detector. The
//! [`Producer`] drives one source into one [`FrameSlot`] until the
//! process-wide running flag is cleared.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::SidsError;
use crate::metadata::MetadataRecord;
use crate::slot::FrameSlot;

// ── FrameSource ──────────────────────────────────────────────────

/// A generator of fixed-size frames.
#[async_trait]
pub trait FrameSource: Send {
    /// Shape of the frames this source produces. Must not change.
    fn metadata(&self) -> MetadataRecord;

    /// Produce the next frame into `frame`, which is exactly
    /// `metadata().frame_size()` bytes long.
    async fn fill(&mut self, frame: &mut [u8]) -> Result<(), SidsError>;
}

#[async_trait]
impl<T: FrameSource + ?Sized> FrameSource for Box<T> {
    fn metadata(&self) -> MetadataRecord {
        (**self).metadata()
    }

    async fn fill(&mut self, frame: &mut [u8]) -> Result<(), SidsError> {
        (**self).fill(frame).await
    }
}

// ── ProducerConfig ───────────────────────────────────────────────

/// Configuration for [`Producer`].
#[derive(Debug, Clone)]
pub struct ProducerConfig {
    /// Cap on frames per second. `None` runs as fast as the source allows.
    pub target_fps: Option<u32>,
    /// Hold off the next write while a reader waits on the slot.
    pub yield_to_readers: bool,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            target_fps: None,
            yield_to_readers: true,
        }
    }
}

// ── Producer ─────────────────────────────────────────────────────

/// Sole writer of a frame slot.
pub struct Producer<S> {
    source: S,
    slot: Arc<FrameSlot>,
    running: Arc<AtomicBool>,
    config: ProducerConfig,
}

impl<S: FrameSource> Producer<S> {
    pub fn new(
        source: S,
        slot: Arc<FrameSlot>,
        running: Arc<AtomicBool>,
        config: ProducerConfig,
    ) -> Self {
        Self {
            source,
            slot,
            running,
            config,
        }
    }

    /// Run until `running` is cleared or the source fails.
    ///
    /// Returns the number of frames written.
    pub async fn run(mut self) -> Result<u64, SidsError> {
        let mut frame = vec![0u8; self.slot.frame_size()];
        let interval = self
            .config
            .target_fps
            .filter(|&fps| fps > 0)
            .map(|fps| Duration::from_secs_f64(1.0 / fps as f64));
        let mut written: u64 = 0;

        info!(
            "producer started: {} ({} bytes per frame)",
            self.source.metadata(),
            frame.len()
        );

        while self.running.load(Ordering::SeqCst) {
            if self.config.yield_to_readers && self.slot.read_pending() {
                tokio::task::yield_now().await;
                continue;
            }

            let loop_start = Instant::now();
            self.source.fill(&mut frame).await?;
            self.slot.write(&frame)?;
            written += 1;

            if written % 1000 == 0 {
                debug!("producer wrote {written} frames");
            }

            match interval {
                Some(interval) => Self::pace(loop_start, interval).await,
                None => tokio::task::yield_now().await,
            }
        }

        info!("producer stopped after {written} frames");
        Ok(written)
    }

    /// Sleep for the remainder of the frame interval.
    async fn pace(loop_start: Instant, interval: Duration) {
        let elapsed = loop_start.elapsed();
        if elapsed < interval {
            tokio::time::sleep(interval - elapsed).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slot::SlotConfig;

    /// Counts frames and stops the producer after `limit`.
    struct Counter {
        n: u8,
        limit: u8,
        running: Arc<AtomicBool>,
    }

    #[async_trait]
    impl FrameSource for Counter {
        fn metadata(&self) -> MetadataRecord {
            MetadataRecord::grey(2, 1)
        }

        async fn fill(&mut self, frame: &mut [u8]) -> Result<(), SidsError> {
            self.n += 1;
            frame.fill(self.n);
            if self.n == self.limit {
                self.running.store(false, Ordering::SeqCst);
            }
            Ok(())
        }
    }

    struct Broken;

    #[async_trait]
    impl FrameSource for Broken {
        fn metadata(&self) -> MetadataRecord {
            MetadataRecord::grey(1, 1)
        }

        async fn fill(&mut self, _frame: &mut [u8]) -> Result<(), SidsError> {
            Err(SidsError::ShortRead {
                expected: 1,
                received: 0,
            })
        }
    }

    #[tokio::test]
    async fn writes_until_stopped() {
        let running = Arc::new(AtomicBool::new(true));
        let slot = Arc::new(FrameSlot::new(2, SlotConfig::default()));
        let source = Counter {
            n: 0,
            limit: 5,
            running: Arc::clone(&running),
        };
        let producer = Producer::new(source, Arc::clone(&slot), running, ProducerConfig::default());

        assert_eq!(producer.run().await.unwrap(), 5);
        assert_eq!(slot.snapshot().await.unwrap(), vec![5, 5]);
        assert_eq!(slot.generation(), 5);
    }

    #[tokio::test]
    async fn stopped_flag_writes_nothing() {
        let running = Arc::new(AtomicBool::new(false));
        let slot = Arc::new(FrameSlot::new(1, SlotConfig::default()));
        let producer = Producer::new(Broken, Arc::clone(&slot), running, ProducerConfig::default());
        assert_eq!(producer.run().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn source_error_ends_producer() {
        let running = Arc::new(AtomicBool::new(true));
        let slot = Arc::new(FrameSlot::new(1, SlotConfig::default()));
        let producer = Producer::new(
            Box::new(Broken) as Box<dyn FrameSource>,
            slot,
            running,
            ProducerConfig::default(),
        );
        assert!(producer.run().await.is_err());
    }

    #[tokio::test]
    async fn paces_to_target_fps() {
        let running = Arc::new(AtomicBool::new(true));
        let slot = Arc::new(FrameSlot::new(2, SlotConfig::default()));
        let source = Counter {
            n: 0,
            limit: 3,
            running: Arc::clone(&running),
        };
        let config = ProducerConfig {
            target_fps: Some(50),
            ..ProducerConfig::default()
        };
        let start = Instant::now();
        Producer::new(source, slot, running, config).run().await.unwrap();
        // Three frames at 20 ms each.
        assert!(start.elapsed() >= Duration::from_millis(40));
    }
}
