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

//! Service draining the frame event bus into telemetry consumers.

use umbra_core::event::{EventBus, FrameEvent};

use crate::stats::FrameStats;
use crate::trace::PassTrace;

/// Owns the frame statistics and the pass trace.
#[derive(Debug, Default)]
pub struct TelemetryService {
    stats: FrameStats,
    trace: PassTrace,
    keep_trace: bool,
}

impl TelemetryService {
    /// Creates a service. When `keep_trace` is false only the latest frame's
    /// trace is retained.
    pub fn new(keep_trace: bool) -> Self {
        Self {
            stats: FrameStats::default(),
            trace: PassTrace::new(),
            keep_trace,
        }
    }

    /// Should be called once per frame: drains every pending event.
    pub fn tick(&mut self, bus: &EventBus<FrameEvent>) -> usize {
        let events = bus.drain();
        let count = events.len();
        if !self.keep_trace && events.iter().any(|e| matches!(e, FrameEvent::FrameBegin { .. })) {
            self.trace.clear();
        }
        for event in &events {
            match event {
                FrameEvent::LevelLoaded { scene } => log::info!("Level '{scene}' loaded."),
                FrameEvent::LevelUnloaded { scene } => log::info!("Level '{scene}' unloaded."),
                _ => {}
            }
            self.stats.record(event);
            self.trace.record(event);
        }
        log::trace!("Telemetry ingested {count} events.");
        count
    }

    /// Frame statistics.
    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    /// Pass trace.
    pub fn trace(&self) -> &PassTrace {
        &self.trace
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_drains_bus() {
        let bus = EventBus::new();
        bus.publish(FrameEvent::FrameBegin { frame: 0 });
        bus.publish(FrameEvent::PassBegin { tag: "GPU Culling", frame: 0 });
        bus.publish(FrameEvent::FrameEnd { frame: 0, cpu_time_us: 900 });

        let mut telemetry = TelemetryService::new(false);
        assert_eq!(telemetry.tick(&bus), 3);
        assert_eq!(telemetry.stats().frames_rendered(), 1);
        assert_eq!(telemetry.trace().last_frame().unwrap().passes, vec!["GPU Culling"]);
        assert_eq!(telemetry.tick(&bus), 0);
    }
}
