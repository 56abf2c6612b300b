//! Frame timing for the render loop.

use std::time::{Duration, Instant};

/// Per-frame delta plus a once-a-second FPS average.
#[derive(Debug)]
pub struct Time {
    last_frame: Instant,
    delta: Duration,
    frame_count: u64,
    /// Frames counted since the last FPS report.
    report_frames: u32,
    report_elapsed: Duration,
}

impl Default for Time {
    fn default() -> Self {
        Self::new()
    }
}

impl Time {
    pub fn new() -> Self {
        Self {
            last_frame: Instant::now(),
            delta: Duration::ZERO,
            frame_count: 0,
            report_frames: 0,
            report_elapsed: Duration::ZERO,
        }
    }

    /// Measure the time since the previous call. Call once at the start of each frame.
    pub fn update(&mut self) {
        let now = Instant::now();
        self.advance(now - self.last_frame);
        self.last_frame = now;
    }

    /// Advance by an explicit frame duration.
    pub fn advance(&mut self, delta: Duration) {
        self.delta = delta;
        self.frame_count += 1;
        self.report_frames += 1;
        self.report_elapsed += delta;
    }

    pub fn delta_seconds(&self) -> f32 {
        self.delta.as_secs_f32()
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Average FPS over the last second, returned once per second.
    pub fn take_fps_report(&mut self) -> Option<f32> {
        if self.report_elapsed < Duration::from_secs(1) {
            return None;
        }
        let fps = self.report_frames as f32 / self.report_elapsed.as_secs_f32();
        self.report_frames = 0;
        self.report_elapsed = Duration::ZERO;
        Some(fps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_counts_frames() {
        let mut time = Time::new();
        time.advance(Duration::from_millis(16));
        time.advance(Duration::from_millis(16));
        assert_eq!(time.frame_count(), 2);
        assert!((time.delta_seconds() - 0.016).abs() < 1e-6);
    }

    #[test]
    fn fps_report_once_per_second() {
        let mut time = Time::new();
        for _ in 0..59 {
            time.advance(Duration::from_millis(10));
            assert!(time.take_fps_report().is_none());
        }
        for _ in 0..41 {
            time.advance(Duration::from_millis(10));
        }
        let fps = time.take_fps_report().unwrap_or(0.0);
        assert!((fps - 100.0).abs() < 0.5);
        assert!(time.take_fps_report().is_none());
    }
}
