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

//! Bookkeeping of which resources are referenced by un-retired submissions.

use std::collections::{HashSet, VecDeque};

use super::api::{BufferId, FenceValue, PipelineStateId, TextureId};
use super::command_list::Command;

#[derive(Debug, Default)]
struct Submission {
    fence: FenceValue,
    textures: HashSet<TextureId>,
    buffers: HashSet<BufferId>,
    pipelines: HashSet<PipelineStateId>,
}

/// Tracks resources referenced by submitted work until its fence retires.
///
/// Backends consult it before destroying a resource; destruction while a
/// reference is pending is refused.
#[derive(Debug, Default)]
pub struct InFlightTracker {
    pending: VecDeque<Submission>,
}

impl InFlightTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the resources referenced by a submission signalling `fence`.
    pub fn track(&mut self, fence: FenceValue, commands: &[Command]) {
        let mut submission = Submission {
            fence,
            ..Default::default()
        };
        for command in commands {
            submission.textures.extend(command.referenced_textures());
            submission.buffers.extend(command.referenced_buffers());
            submission.pipelines.extend(command.referenced_pipeline());
        }
        self.pending.push_back(submission);
    }

    /// Forgets every submission whose fence value is `<= completed`.
    pub fn retire(&mut self, completed: FenceValue) {
        while self.pending.front().is_some_and(|s| s.fence <= completed) {
            self.pending.pop_front();
        }
    }

    /// Whether a texture is referenced by pending work.
    pub fn texture_in_use(&self, id: TextureId) -> bool {
        self.pending.iter().any(|s| s.textures.contains(&id))
    }

    /// Whether a buffer is referenced by pending work.
    pub fn buffer_in_use(&self, id: BufferId) -> bool {
        self.pending.iter().any(|s| s.buffers.contains(&id))
    }

    /// Whether a pipeline state is referenced by pending work.
    pub fn pipeline_in_use(&self, id: PipelineStateId) -> bool {
        self.pending.iter().any(|s| s.pipelines.contains(&id))
    }

    /// Number of submissions not yet retired.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Forgets everything; used after a full GPU drain.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
