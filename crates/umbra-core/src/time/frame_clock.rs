// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::time::{Duration, Instant};

/// Frame timing snapshot, read by every updatable system once per frame.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct FrameTime {
    /// Seconds elapsed since the clock was last reset.
    pub total: f64,
    /// Seconds elapsed since the previous frame. Never negative.
    pub delta: f64,
    /// Frames produced since the clock was last reset.
    pub frame_index: u64,
}

/// Monotonic clock producing [`FrameTime`] snapshots.
///
/// The clock is reset whenever a level is loaded. It can be driven by the
/// wall clock through [`tick`](FrameClock::tick) or by a fixed synthetic step
/// through [`advance`](FrameClock::advance), which is what tests and
/// offscreen runs use.
///
/// Wall-clock deltas are clamped to `max_delta` so a stall (debugger,
/// minimised window) does not produce a giant step.
#[derive(Debug, Clone)]
pub struct FrameClock {
    last: Instant,
    current: FrameTime,
    max_delta: Duration,
}

impl FrameClock {
    /// Creates a clock with a 250 ms delta clamp.
    pub fn new() -> Self {
        Self::with_max_delta(Duration::from_millis(250))
    }

    /// Creates a clock with a custom wall-clock delta clamp.
    pub fn with_max_delta(max_delta: Duration) -> Self {
        Self {
            last: Instant::now(),
            current: FrameTime::default(),
            max_delta,
        }
    }

    /// Sets the total to zero and restarts the wall-clock baseline.
    pub fn reset(&mut self) {
        self.last = Instant::now();
        self.current = FrameTime::default();
        log::debug!("Frame clock reset.");
    }

    /// Advances by the wall-clock time since the previous tick.
    pub fn tick(&mut self) -> FrameTime {
        let now = Instant::now();
        let dt = now.saturating_duration_since(self.last).min(self.max_delta);
        self.last = now;
        self.advance(dt.as_secs_f64())
    }

    /// Advances by a fixed step. Negative or non-finite steps count as zero.
    pub fn advance(&mut self, delta: f64) -> FrameTime {
        let delta = if delta.is_finite() && delta > 0.0 {
            delta
        } else {
            0.0
        };
        self.current = FrameTime {
            total: self.current.total + delta,
            delta,
            frame_index: self.current.frame_index.wrapping_add(1),
        };
        self.current
    }

    /// The most recent snapshot.
    pub fn frame_time(&self) -> FrameTime {
        self.current
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn advance_accumulates_total() {
        let mut clock = FrameClock::new();
        for _ in 0..60 {
            clock.advance(0.016);
        }
        let t = clock.frame_time();
        assert_relative_eq!(t.total, 0.96, epsilon = 1e-9);
        assert_relative_eq!(t.delta, 0.016);
        assert_eq!(t.frame_index, 60);
    }

    #[test]
    fn negative_and_nan_steps_clamp_to_zero() {
        let mut clock = FrameClock::new();
        clock.advance(0.5);
        let t = clock.advance(-1.0);
        assert_eq!(t.delta, 0.0);
        assert_relative_eq!(t.total, 0.5);
        let t = clock.advance(f64::NAN);
        assert_eq!(t.delta, 0.0);
        assert_relative_eq!(t.total, 0.5);
    }

    #[test]
    fn tick_is_monotonic() {
        let mut clock = FrameClock::new();
        let mut previous = clock.frame_time().total;
        for _ in 0..100 {
            let t = clock.tick();
            assert!(t.delta >= 0.0);
            assert!(t.total >= previous);
            previous = t.total;
        }
    }

    #[test]
    fn tick_delta_is_clamped() {
        let mut clock = FrameClock::with_max_delta(Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(5));
        let t = clock.tick();
        assert!(t.delta <= 0.001 + 1e-9);
    }

    #[test]
    fn reset_zeroes_total() {
        let mut clock = FrameClock::new();
        clock.advance(3.0);
        clock.reset();
        let t = clock.frame_time();
        assert_eq!(t.total, 0.0);
        assert_eq!(t.frame_index, 0);
    }
}
