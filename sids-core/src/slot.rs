//! Single-slot frame buffer shared by one producer and many readers.
//!
//! The slot holds exactly one frame. A write replaces it in place; a read
//! copies whatever is resident. There is no queue, so readers can skip
//! frames and can see the same frame twice if the producer has not
//! written in between.
//!
//! The producer raises `busy` for the duration of a write and is never
//! blocked by readers. Readers wait until `busy` is clear before copying.
//! The buffer itself sits behind a mutex so that a reader racing a writer
//! still copies either the old frame or the new one, never a mixture.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio::sync::Notify;
use tracing::warn;

use crate::error::SidsError;

// ── SlotConfig ───────────────────────────────────────────────────

/// How a reader waits while the producer is writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitStrategy {
    /// Poll the busy flag, yielding to the scheduler between polls.
    Spin,
    /// Sleep until the producer signals a finished write, re-checking the
    /// flag at least every `poll_interval`.
    #[default]
    Notify,
}

/// Configuration for [`FrameSlot`].
#[derive(Debug, Clone)]
pub struct SlotConfig {
    /// Reader wait strategy.
    pub wait: WaitStrategy,
    /// Upper bound on one notification wait before the flag is re-checked.
    pub poll_interval: Duration,
    /// Give up a read after waiting this long. `None` waits forever.
    pub max_wait: Option<Duration>,
}

impl Default for SlotConfig {
    fn default() -> Self {
        Self {
            wait: WaitStrategy::Notify,
            poll_interval: Duration::from_millis(10),
            max_wait: None,
        }
    }
}

// ── FrameSlot ────────────────────────────────────────────────────

/// The one shared mutable resource between a producer and its sessions.
#[derive(Debug)]
pub struct FrameSlot {
    buffer: Mutex<Vec<u8>>,
    busy: AtomicBool,
    read_pending: AtomicBool,
    generation: AtomicU64,
    written: Notify,
    config: SlotConfig,
}

impl FrameSlot {
    /// Allocate a zeroed slot for frames of `frame_size` bytes.
    pub fn new(frame_size: usize, config: SlotConfig) -> Self {
        Self {
            buffer: Mutex::new(vec![0u8; frame_size]),
            busy: AtomicBool::new(false),
            read_pending: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            written: Notify::new(),
            config,
        }
    }

    /// Size of every frame held by this slot.
    pub fn frame_size(&self) -> usize {
        self.lock().len()
    }

    /// Number of completed writes.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Whether a reader is currently waiting on a busy slot.
    ///
    /// Producers may consult this to hold off their next write.
    pub fn read_pending(&self) -> bool {
        self.read_pending.load(Ordering::SeqCst)
    }

    /// Replace the resident frame.
    ///
    /// Only one producer may call this; concurrent writers are not guarded.
    pub fn write(&self, data: &[u8]) -> Result<(), SidsError> {
        self.busy.store(true, Ordering::SeqCst);
        let result = {
            let mut buf = self.lock();
            if buf.len() == data.len() {
                buf.copy_from_slice(data);
                Ok(())
            } else {
                Err(SidsError::UnsupportedStream(format!(
                    "frame of {} bytes does not fit slot of {} bytes",
                    data.len(),
                    buf.len()
                )))
            }
        };
        if result.is_ok() {
            self.generation.fetch_add(1, Ordering::SeqCst);
        }
        self.busy.store(false, Ordering::SeqCst);
        self.written.notify_waiters();
        result
    }

    /// Copy the resident frame into `dest` once no write is in progress.
    ///
    /// Returns `false` if `dest` has the wrong size or the configured
    /// `max_wait` elapsed. Without a `max_wait`, a producer that never
    /// clears `busy` starves every reader.
    pub async fn try_read(&self, dest: &mut [u8]) -> bool {
        let started = Instant::now();
        loop {
            if !self.busy.load(Ordering::SeqCst) {
                let buf = self.lock();
                self.read_pending.store(false, Ordering::SeqCst);
                if buf.len() != dest.len() {
                    warn!(
                        "read buffer of {} bytes does not match slot of {} bytes",
                        dest.len(),
                        buf.len()
                    );
                    return false;
                }
                dest.copy_from_slice(&buf);
                return true;
            }

            self.read_pending.store(true, Ordering::SeqCst);
            if let Some(max) = self.config.max_wait {
                if started.elapsed() >= max {
                    self.read_pending.store(false, Ordering::SeqCst);
                    warn!("frame slot busy for {max:?}; giving up read");
                    return false;
                }
            }

            match self.config.wait {
                WaitStrategy::Spin => tokio::task::yield_now().await,
                WaitStrategy::Notify => {
                    let notified = self.written.notified();
                    tokio::pin!(notified);
                    notified.as_mut().enable();
                    if self.busy.load(Ordering::SeqCst) {
                        let _ = tokio::time::timeout(self.config.poll_interval, notified).await;
                    }
                }
            }
        }
    }

    /// Read the resident frame into a new buffer.
    pub async fn snapshot(&self) -> Option<Vec<u8>> {
        let mut out = vec![0u8; self.frame_size()];
        self.try_read(&mut out).await.then_some(out)
    }

    fn lock(&self) -> MutexGuard<'_, Vec<u8>> {
        // A poisoned lock still guards a complete frame buffer.
        self.buffer.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn fresh_slot_reads_zeros() {
        let slot = FrameSlot::new(4, SlotConfig::default());
        assert_eq!(slot.snapshot().await.unwrap(), vec![0; 4]);
        assert_eq!(slot.generation(), 0);
    }

    #[tokio::test]
    async fn freshest_frame_wins() {
        let slot = FrameSlot::new(3, SlotConfig::default());
        slot.write(&[1, 1, 1]).unwrap();
        slot.write(&[2, 2, 2]).unwrap();
        assert_eq!(slot.snapshot().await.unwrap(), vec![2, 2, 2]);
        assert_eq!(slot.generation(), 2);
    }

    #[tokio::test]
    async fn unchanged_frame_can_be_read_twice() {
        let slot = FrameSlot::new(2, SlotConfig::default());
        slot.write(&[7, 8]).unwrap();
        assert_eq!(slot.snapshot().await.unwrap(), vec![7, 8]);
        assert_eq!(slot.snapshot().await.unwrap(), vec![7, 8]);
    }

    #[tokio::test]
    async fn wrong_sizes_are_rejected() {
        let slot = FrameSlot::new(4, SlotConfig::default());
        assert!(slot.write(&[1, 2, 3]).is_err());
        assert_eq!(slot.generation(), 0);
        let mut small = [0u8; 2];
        assert!(!slot.try_read(&mut small).await);
    }

    #[tokio::test]
    async fn stuck_writer_times_out_when_bounded() {
        for wait in [WaitStrategy::Spin, WaitStrategy::Notify] {
            let slot = FrameSlot::new(
                2,
                SlotConfig {
                    wait,
                    poll_interval: Duration::from_millis(1),
                    max_wait: Some(Duration::from_millis(20)),
                },
            );
            slot.busy.store(true, Ordering::SeqCst);
            let mut dest = [0u8; 2];
            assert!(!slot.try_read(&mut dest).await);
            assert!(!slot.read_pending());
        }
    }

    #[tokio::test]
    async fn waiting_reader_raises_read_pending() {
        let slot = Arc::new(FrameSlot::new(1, SlotConfig::default()));
        slot.busy.store(true, Ordering::SeqCst);

        let reader = tokio::spawn({
            let slot = Arc::clone(&slot);
            async move { slot.snapshot().await }
        });

        tokio::time::timeout(Duration::from_secs(5), async {
            while !slot.read_pending() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("reader never waited");

        slot.write(&[9]).unwrap();
        assert_eq!(reader.await.unwrap(), Some(vec![9]));
        assert!(!slot.read_pending());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn readers_never_see_a_mixed_frame() {
        const SIZE: usize = 4096;
        for wait in [WaitStrategy::Spin, WaitStrategy::Notify] {
            let slot = Arc::new(FrameSlot::new(
                SIZE,
                SlotConfig {
                    wait,
                    ..SlotConfig::default()
                },
            ));
            let stop = Arc::new(AtomicBool::new(false));

            let writer = std::thread::spawn({
                let slot = Arc::clone(&slot);
                let stop = Arc::clone(&stop);
                move || {
                    let frames = [vec![0x00u8; SIZE], vec![0xFFu8; SIZE]];
                    let mut i = 0usize;
                    while !stop.load(Ordering::SeqCst) {
                        slot.write(&frames[i % 2]).unwrap();
                        i += 1;
                        if slot.read_pending() {
                            std::thread::sleep(Duration::from_micros(50));
                        }
                    }
                }
            });

            let mut readers = Vec::new();
            for _ in 0..3 {
                let slot = Arc::clone(&slot);
                readers.push(tokio::spawn(async move {
                    let mut dest = vec![0u8; SIZE];
                    for _ in 0..200 {
                        assert!(slot.try_read(&mut dest).await);
                        let first = dest[0];
                        assert!(dest.iter().all(|&b| b == first), "mixed frame");
                    }
                }));
            }
            for r in readers {
                r.await.unwrap();
            }
            stop.store(true, Ordering::SeqCst);
            writer.join().unwrap();
        }
    }
}
