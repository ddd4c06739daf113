// SPDX-License-Identifier: CEPL-1.0
use std::time::{Duration, Instant};

/// Timing for one tick of the main loop.
#[derive(Debug, Clone, Copy)]
pub struct FrameTime {
    /// Seconds since the previous tick, clamped.
    pub dt: f32,
    /// Seconds since the clock was created. Drives time-based animation.
    pub elapsed: f32,
}

/// Per-loop clock. Delta time is clamped so a debugger pause or a long
/// minimize does not produce a huge camera step on the next tick.
#[derive(Debug, Clone)]
pub struct FrameClock {
    start: Instant,
    last: Instant,
    dt_min: Duration,
    dt_max: Duration,
}

impl FrameClock {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last: now,
            dt_min: Duration::from_micros(100),
            dt_max: Duration::from_millis(250),
        }
    }

    pub fn tick(&mut self) -> FrameTime {
        self.tick_at(Instant::now())
    }

    fn tick_at(&mut self, now: Instant) -> FrameTime {
        let dt = now
            .saturating_duration_since(self.last)
            .clamp(self.dt_min, self.dt_max);
        self.last = now;

        FrameTime {
            dt: dt.as_secs_f32(),
            elapsed: now.saturating_duration_since(self.start).as_secs_f32(),
        }
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Exponential moving average of frame time, reported as whole FPS.
#[derive(Debug, Clone)]
pub struct FpsCounter {
    alpha: f32,
    average: f32,
    samples: u64,
}

impl FpsCounter {
    pub const DEFAULT_ALPHA: f32 = 1.0 / 100.0;

    pub fn new() -> Self {
        Self::with_alpha(Self::DEFAULT_ALPHA)
    }

    pub fn with_alpha(alpha: f32) -> Self {
        Self {
            alpha: alpha.clamp(f32::EPSILON, 1.0),
            average: 0.0,
            samples: 0,
        }
    }

    /// Feed one frame delta (seconds). The first sample seeds the average.
    pub fn record(&mut self, dt: f32) -> u32 {
        self.samples += 1;
        if self.samples == 1 {
            self.average = dt;
        } else {
            self.average = self.average * (1.0 - self.alpha) + dt * self.alpha;
        }
        self.fps()
    }

    pub fn fps(&self) -> u32 {
        if self.average <= 0.0 {
            return 0;
        }
        (1.0 / self.average) as u32
    }

    pub fn average_frame_time(&self) -> f32 {
        self.average
    }
}

impl Default for FpsCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_seeds_average() {
        let mut fps = FpsCounter::new();
        assert_eq!(fps.fps(), 0);
        assert_eq!(fps.record(0.02), 50);
        assert!((fps.average_frame_time() - 0.02).abs() < 1e-6);
    }

    #[test]
    fn average_moves_slowly_toward_new_samples() {
        let mut fps = FpsCounter::new();
        fps.record(0.01);
        fps.record(1.0);
        // 0.01 * 0.99 + 1.0 * 0.01
        assert!((fps.average_frame_time() - 0.0199).abs() < 1e-5);
        assert_eq!(fps.fps(), 50);
    }

    #[test]
    fn clock_clamps_long_stalls() {
        let mut clock = FrameClock::new();
        let later = clock.last + Duration::from_secs(5);
        let ft = clock.tick_at(later);
        assert!((ft.dt - 0.25).abs() < 1e-6);
        assert!(ft.elapsed >= 5.0);
        // a second tick at the same instant falls back to the floor
        assert!((clock.tick_at(later).dt - 0.0001).abs() < 1e-6);
    }

    #[test]
    fn clock_clamps_zero_delta() {
        let mut clock = FrameClock::new();
        let now = clock.last;
        let ft = clock.tick_at(now);
        assert!(ft.dt > 0.0);
    }
}
