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

//! Ordered record of the passes each frame went through.

use umbra_core::event::FrameEvent;

/// The passes of one frame, in the order their marker scopes opened.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FrameTrace {
    /// Frame index.
    pub frame: u64,
    /// Pass tags, in order.
    pub passes: Vec<&'static str>,
}

impl FrameTrace {
    /// Position of `tag` in the frame, if the pass ran.
    pub fn position(&self, tag: &str) -> Option<usize> {
        self.passes.iter().position(|p| *p == tag)
    }

    /// Whether `before` ran earlier than `after`.
    pub fn runs_before(&self, before: &str, after: &str) -> bool {
        match (self.position(before), self.position(after)) {
            (Some(a), Some(b)) => a < b,
            _ => false,
        }
    }
}

/// Builds [`FrameTrace`]s from a stream of frame events.
#[derive(Debug, Default)]
pub struct PassTrace {
    frames: Vec<FrameTrace>,
}

impl PassTrace {
    /// Creates an empty trace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one event.
    pub fn record(&mut self, event: &FrameEvent) {
        match event {
            FrameEvent::FrameBegin { frame } => self.frames.push(FrameTrace {
                frame: *frame,
                passes: Vec::new(),
            }),
            FrameEvent::PassBegin { tag, frame } => {
                if self.frames.last().map(|f| f.frame) != Some(*frame) {
                    self.frames.push(FrameTrace {
                        frame: *frame,
                        passes: Vec::new(),
                    });
                }
                if let Some(current) = self.frames.last_mut() {
                    current.passes.push(*tag);
                }
            }
            _ => {}
        }
    }

    /// Every frame seen so far.
    pub fn frames(&self) -> &[FrameTrace] {
        &self.frames
    }

    /// The most recent frame.
    pub fn last_frame(&self) -> Option<&FrameTrace> {
        self.frames.last()
    }

    /// Forgets everything.
    pub fn clear(&mut self) {
        self.frames.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_passes_by_frame() {
        let mut trace = PassTrace::new();
        let events = [
            FrameEvent::FrameBegin { frame: 1 },
            FrameEvent::PassBegin { tag: "GBuffer", frame: 1 },
            FrameEvent::PassEnd { tag: "GBuffer", frame: 1, cpu_time_us: 4 },
            FrameEvent::PassBegin { tag: "Shadow Maps", frame: 1 },
            FrameEvent::FrameBegin { frame: 2 },
            FrameEvent::PassBegin { tag: "GBuffer", frame: 2 },
        ];
        for e in &events {
            trace.record(e);
        }
        assert_eq!(trace.frames().len(), 2);
        let first = &trace.frames()[0];
        assert_eq!(first.passes, vec!["GBuffer", "Shadow Maps"]);
        assert!(first.runs_before("GBuffer", "Shadow Maps"));
        assert!(!first.runs_before("Shadow Maps", "GBuffer"));
        assert!(!first.runs_before("GBuffer", "UI Overlay"));
    }
}
