//! Frame timer used to animate per-frame uniform data.

use std::time::{Duration, Instant};

/// Measures total elapsed time and per-frame deltas.
#[derive(Debug)]
pub struct Timer {
    start: Instant,
    last_tick: Instant,
    frames: u64,
}

impl Timer {
    /// Create a new timer, starting from now.
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_tick: now,
            frames: 0,
        }
    }

    /// Total elapsed time since the timer was created or reset.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Elapsed time in seconds since the timer was created or reset.
    pub fn elapsed_secs(&self) -> f32 {
        self.elapsed().as_secs_f32()
    }

    /// Marks the end of a frame and returns the time since the previous one.
    pub fn tick(&mut self) -> Duration {
        let now = Instant::now();
        let delta = now - self.last_tick;
        self.last_tick = now;
        self.frames += 1;
        delta
    }

    /// Number of frames ticked so far.
    #[inline]
    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    /// Average frames per second since creation, or `0.0` before the first tick.
    pub fn average_fps(&self) -> f64 {
        let secs = self.elapsed().as_secs_f64();
        if self.frames == 0 || secs <= 0.0 {
            return 0.0;
        }
        self.frames as f64 / secs
    }

    /// Reset the timer to the current time.
    pub fn reset(&mut self) {
        let now = Instant::now();
        self.start = now;
        self.last_tick = now;
        self.frames = 0;
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_counts_frames() {
        let mut timer = Timer::new();
        assert_eq!(timer.frame_count(), 0);
        assert_eq!(timer.average_fps(), 0.0);

        timer.tick();
        timer.tick();
        assert_eq!(timer.frame_count(), 2);
    }

    #[test]
    fn test_reset_clears_frames() {
        let mut timer = Timer::new();
        timer.tick();
        timer.reset();
        assert_eq!(timer.frame_count(), 0);
    }

    #[test]
    fn test_elapsed_is_monotonic() {
        let timer = Timer::new();
        let first = timer.elapsed();
        std::thread::sleep(Duration::from_millis(1));
        assert!(timer.elapsed() >= first);
    }
}
