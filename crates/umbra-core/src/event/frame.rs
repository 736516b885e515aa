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

/// Events published by the frame orchestrator while it runs.
///
/// Consumers (telemetry, tests) drain them from the core's event bus after
/// each frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameEvent {
    /// A level finished initialising.
    LevelLoaded {
        /// Name of the scene.
        scene: String,
    },
    /// A level finished tearing down.
    LevelUnloaded {
        /// Name of the scene.
        scene: String,
    },
    /// A frame started recording.
    FrameBegin {
        /// Frame index from the frame clock.
        frame: u64,
    },
    /// A frame was presented.
    FrameEnd {
        /// Frame index from the frame clock.
        frame: u64,
        /// CPU time spent in update + draw, in microseconds.
        cpu_time_us: u64,
    },
    /// A render pass opened its marker scope.
    PassBegin {
        /// The pass tag, e.g. `"Shadow Maps"`.
        tag: &'static str,
        /// Frame index from the frame clock.
        frame: u64,
    },
    /// A render pass closed its marker scope.
    PassEnd {
        /// The pass tag.
        tag: &'static str,
        /// Frame index from the frame clock.
        frame: u64,
        /// CPU time spent recording the pass, in microseconds.
        cpu_time_us: u64,
    },
}
