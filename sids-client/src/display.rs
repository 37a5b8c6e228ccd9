//! Text presentation of received frames.

use std::fmt;
use std::time::{Duration, Instant};

use sids_core::BlobCoordinate;

/// Mean pixel value over a payload, 0.0 for an empty one.
pub fn mean_intensity(payload: &[u8]) -> f64 {
    if payload.is_empty() {
        return 0.0;
    }
    let sum: u64 = payload.iter().map(|&b| b as u64).sum();
    sum as f64 / payload.len() as f64
}

/// Running statistics over the received frames.
#[derive(Debug)]
pub struct FrameStats {
    frames: u64,
    last_mean: f64,
    started: Instant,
    window_start: Instant,
    window_frames: u64,
    fps: f64,
}

impl FrameStats {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            frames: 0,
            last_mean: 0.0,
            started: now,
            window_start: now,
            window_frames: 0,
            fps: 0.0,
        }
    }

    /// Account for one frame's payload.
    pub fn record(&mut self, payload: &[u8]) {
        self.frames += 1;
        self.window_frames += 1;
        self.last_mean = mean_intensity(payload);

        let elapsed = self.window_start.elapsed();
        if elapsed >= Duration::from_secs(1) {
            self.fps = self.window_frames as f64 / elapsed.as_secs_f64();
            self.window_start = Instant::now();
            self.window_frames = 0;
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn last_mean(&self) -> f64 {
        self.last_mean
    }

    /// Frames per second over the last full window, or since start
    /// before the first window completes.
    pub fn fps(&self) -> f64 {
        if self.fps > 0.0 {
            return self.fps;
        }
        let secs = self.started.elapsed().as_secs_f64();
        if secs > 0.0 { self.frames as f64 / secs } else { 0.0 }
    }
}

impl Default for FrameStats {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FrameStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "frames={} mean={:.1} fps={:.1}",
            self.frames,
            self.last_mean,
            self.fps()
        )
    }
}

/// One printed line per detected blob.
pub fn coordinate_line(coord: &BlobCoordinate) -> String {
    format!("blob at x={} y={}", coord.x, coord.y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_of_payload() {
        assert_eq!(mean_intensity(&[]), 0.0);
        assert_eq!(mean_intensity(&[0, 255]), 127.5);
        assert_eq!(mean_intensity(&[10; 8]), 10.0);
    }

    #[test]
    fn stats_count_frames() {
        let mut stats = FrameStats::new();
        stats.record(&[100, 200]);
        stats.record(&[0, 0]);
        assert_eq!(stats.frames(), 2);
        assert_eq!(stats.last_mean(), 0.0);
        assert!(stats.to_string().starts_with("frames=2 mean=0.0"));
    }

    #[test]
    fn coordinate_formatting() {
        assert_eq!(coordinate_line(&BlobCoordinate::new(300, 5)), "blob at x=300 y=5");
    }
}
