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

//! Rolling frame statistics.

use std::collections::{BTreeMap, VecDeque};

use serde::Serialize;
use umbra_core::event::FrameEvent;

/// Accumulated CPU recording time of one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PassTiming {
    /// Number of times the pass ran.
    pub count: u64,
    /// Total CPU time, in microseconds.
    pub total_us: u64,
}

impl PassTiming {
    /// Mean CPU time per run, in microseconds.
    pub fn average_us(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total_us as f64 / self.count as f64
        }
    }
}

/// Frame counters fed by [`FrameEvent`]s.
#[derive(Debug, Clone, Serialize)]
pub struct FrameStats {
    frames_rendered: u64,
    passes: BTreeMap<&'static str, PassTiming>,
    #[serde(skip)]
    window: VecDeque<u64>,
    #[serde(skip)]
    window_len: usize,
}

impl FrameStats {
    /// Creates statistics averaging frame time over the last `window_len` frames.
    pub fn new(window_len: usize) -> Self {
        Self {
            frames_rendered: 0,
            passes: BTreeMap::new(),
            window: VecDeque::with_capacity(window_len.max(1)),
            window_len: window_len.max(1),
        }
    }

    /// Feeds one event.
    pub fn record(&mut self, event: &FrameEvent) {
        match event {
            FrameEvent::FrameEnd { cpu_time_us, .. } => {
                self.frames_rendered += 1;
                if self.window.len() == self.window_len {
                    self.window.pop_front();
                }
                self.window.push_back(*cpu_time_us);
            }
            FrameEvent::PassEnd { tag, cpu_time_us, .. } => {
                let timing = self.passes.entry(*tag).or_default();
                timing.count += 1;
                timing.total_us += *cpu_time_us;
            }
            _ => {}
        }
    }

    /// Frames presented so far.
    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// Mean CPU frame time over the rolling window, in milliseconds.
    pub fn average_frame_time_ms(&self) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }
        let total: u64 = self.window.iter().sum();
        total as f64 / self.window.len() as f64 / 1000.0
    }

    /// Timing of one pass, if it ever ran.
    pub fn pass(&self, tag: &str) -> Option<PassTiming> {
        self.passes.get(tag).copied()
    }

    /// Every pass seen, sorted by tag.
    pub fn passes(&self) -> impl Iterator<Item = (&'static str, PassTiming)> + '_ {
        self.passes.iter().map(|(tag, t)| (*tag, *t))
    }

    /// The statistics as JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}"))
    }

    /// Logs a summary at `info`.
    pub fn log_summary(&self) {
        log::info!(
            "Rendered {} frames, average CPU frame time {:.3} ms",
            self.frames_rendered,
            self.average_frame_time_ms()
        );
        for (tag, timing) in self.passes() {
            log::info!("  {tag:<28} {:>8.1} us/frame", timing.average_us());
        }
    }

    /// Forgets everything.
    pub fn reset(&mut self) {
        self.frames_rendered = 0;
        self.passes.clear();
        self.window.clear();
    }
}

impl Default for FrameStats {
    fn default() -> Self {
        Self::new(120)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn rolling_window_drops_old_frames() {
        let mut stats = FrameStats::new(2);
        for (frame, us) in [(0, 1000), (1, 3000), (2, 5000)] {
            stats.record(&FrameEvent::FrameEnd {
                frame,
                cpu_time_us: us,
            });
        }
        assert_eq!(stats.frames_rendered(), 3);
        assert_relative_eq!(stats.average_frame_time_ms(), 4.0);
    }

    #[test]
    fn pass_timings_accumulate() {
        let mut stats = FrameStats::default();
        for us in [10, 30] {
            stats.record(&FrameEvent::PassEnd {
                tag: "GBuffer",
                frame: 0,
                cpu_time_us: us,
            });
        }
        let timing = stats.pass("GBuffer").unwrap();
        assert_eq!(timing.count, 2);
        assert_relative_eq!(timing.average_us(), 20.0);
        assert!(stats.pass("Fog").is_none());
        assert!(stats.to_json().contains("GBuffer"));
    }
}
