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

//! Recorded command lists and the Begin / End / Execute protocol.
//!
//! Both backends record into the same [`Command`] packets and share one
//! [`CommandListSet`], so protocol violations are detected identically
//! whichever backend runs. Packets are translated into backend work only at
//! execution time.

use super::api::{
    BlendState, BufferId, CommandListIndex, DepthStencilState, DescriptorHeapId, PipelineStateId,
    RasterizerState, ResourceState, ScissorRect, TextureId, Viewport,
};
use super::error::CommandListError;
use crate::math::LinearRgba;

/// One recorded GPU command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Opens a named debug marker scope.
    BeginEvent(String),
    /// Closes the innermost debug marker scope.
    EndEvent,
    /// Binds a shader-visible descriptor heap.
    SetDescriptorHeap(DescriptorHeapId),
    /// Sets the viewport.
    SetViewport(Viewport),
    /// Sets the scissor rectangle.
    SetRect(ScissorRect),
    /// Overrides depth/stencil state.
    SetDepthStencilState(DepthStencilState),
    /// Overrides rasterizer state.
    SetRasterizerState(RasterizerState),
    /// Overrides blend state.
    SetBlendState(BlendState),
    /// Binds colour targets and an optional depth target.
    SetRenderTargets {
        /// Colour targets.
        colors: Vec<TextureId>,
        /// Depth target.
        depth: Option<TextureId>,
    },
    /// Binds a pipeline state.
    SetPipelineState(PipelineStateId),
    /// Uploads per-draw constants into the given slot.
    SetConstants {
        /// Root constant slot.
        slot: u32,
        /// Raw bytes.
        data: Vec<u8>,
    },
    /// Clears a colour target.
    ClearRenderTarget {
        /// The target.
        target: TextureId,
        /// Clear colour.
        color: LinearRgba,
    },
    /// Clears a depth/stencil target.
    ClearDepthStencil {
        /// The target.
        target: TextureId,
        /// Depth value.
        depth: f32,
        /// Stencil value.
        stencil: u32,
    },
    /// Transitions a texture into a new usage state.
    Transition {
        /// The texture.
        texture: TextureId,
        /// The new state.
        state: ResourceState,
    },
    /// Non-indexed draw.
    Draw {
        /// Vertices per instance.
        vertex_count: u32,
        /// Instances.
        instance_count: u32,
        /// First vertex.
        first_vertex: u32,
        /// First instance.
        first_instance: u32,
    },
    /// Compute dispatch.
    Dispatch {
        /// Groups along X.
        x: u32,
        /// Groups along Y.
        y: u32,
        /// Groups along Z.
        z: u32,
    },
    /// Copies a whole texture into another of the same size and format.
    CopyTexture {
        /// Source.
        src: TextureId,
        /// Destination.
        dst: TextureId,
    },
    /// Copies a whole buffer into another.
    CopyBuffer {
        /// Source.
        src: BufferId,
        /// Destination.
        dst: BufferId,
    },
}

impl Command {
    /// Textures the command reads or writes.
    pub fn referenced_textures(&self) -> Vec<TextureId> {
        match self {
            Command::SetRenderTargets { colors, depth } => {
                colors.iter().copied().chain(depth.iter().copied()).collect()
            }
            Command::ClearRenderTarget { target, .. } | Command::ClearDepthStencil { target, .. } => {
                vec![*target]
            }
            Command::Transition { texture, .. } => vec![*texture],
            Command::CopyTexture { src, dst } => vec![*src, *dst],
            _ => Vec::new(),
        }
    }

    /// Buffers the command reads or writes.
    pub fn referenced_buffers(&self) -> Vec<BufferId> {
        match self {
            Command::CopyBuffer { src, dst } => vec![*src, *dst],
            _ => Vec::new(),
        }
    }

    /// Pipeline states the command binds.
    pub fn referenced_pipeline(&self) -> Option<PipelineStateId> {
        match self {
            Command::SetPipelineState(id) => Some(*id),
            _ => None,
        }
    }
}

/// Lifecycle of one command list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandListState {
    /// Ready to begin. Either never used, or executed.
    Idle,
    /// Accepting recording calls.
    Recording,
    /// Ended, waiting for execution.
    Closed,
}

#[derive(Debug)]
struct CommandList {
    state: CommandListState,
    commands: Vec<Command>,
}

/// The prepare list plus `frames_in_flight` per-frame lists.
#[derive(Debug)]
pub struct CommandListSet {
    lists: Vec<CommandList>,
    open: Option<usize>,
}

impl CommandListSet {
    /// Creates the prepare list (index 0) and `frames_in_flight` frame lists.
    pub fn new(frames_in_flight: usize) -> Self {
        let count = frames_in_flight.max(1) + 1;
        Self {
            lists: (0..count)
                .map(|_| CommandList {
                    state: CommandListState::Idle,
                    commands: Vec::new(),
                })
                .collect(),
            open: None,
        }
    }

    /// Total number of lists, prepare list included.
    pub fn len(&self) -> usize {
        self.lists.len()
    }

    /// Always `false`: the prepare list exists.
    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }

    /// Number of per-frame lists.
    pub fn frames_in_flight(&self) -> usize {
        self.lists.len() - 1
    }

    fn slot(&mut self, index: CommandListIndex) -> Result<&mut CommandList, CommandListError> {
        let count = self.lists.len();
        self.lists
            .get_mut(index.0)
            .ok_or(CommandListError::InvalidIndex { index, count })
    }

    /// State of a list, or `None` for an out-of-range index.
    pub fn state(&self, index: CommandListIndex) -> Option<CommandListState> {
        self.lists.get(index.0).map(|l| l.state)
    }

    /// The list currently recording, if any.
    pub fn open_list(&self) -> Option<CommandListIndex> {
        self.open.map(CommandListIndex)
    }

    /// Opens `index` for recording.
    pub fn begin(&mut self, index: CommandListIndex) -> Result<(), CommandListError> {
        let open = self.open;
        let list = self.slot(index)?;
        match list.state {
            CommandListState::Recording => return Err(CommandListError::AlreadyRecording(index)),
            CommandListState::Closed => return Err(CommandListError::PendingExecution(index)),
            CommandListState::Idle => {}
        }
        if let Some(open) = open {
            return Err(CommandListError::StillRecording {
                requested: index,
                open: CommandListIndex(open),
            });
        }
        list.state = CommandListState::Recording;
        list.commands.clear();
        self.open = Some(index.0);
        Ok(())
    }

    /// Closes `index`.
    pub fn end(&mut self, index: CommandListIndex) -> Result<(), CommandListError> {
        let list = self.slot(index)?;
        match list.state {
            CommandListState::Idle => Err(CommandListError::NotBegun(index)),
            CommandListState::Closed => Err(CommandListError::NotRecording(index)),
            CommandListState::Recording => {
                list.state = CommandListState::Closed;
                self.open = None;
                Ok(())
            }
        }
    }

    /// Hands the recorded commands of a closed list to the backend and
    /// returns the list to `Idle`.
    pub fn take_for_execution(
        &mut self,
        index: CommandListIndex,
    ) -> Result<Vec<Command>, CommandListError> {
        let list = self.slot(index)?;
        match list.state {
            CommandListState::Idle => Err(CommandListError::NotBegun(index)),
            CommandListState::Recording => Err(CommandListError::NotEnded(index)),
            CommandListState::Closed => {
                list.state = CommandListState::Idle;
                Ok(std::mem::take(&mut list.commands))
            }
        }
    }

    /// Appends a command to the open list.
    pub fn record(&mut self, command: Command) -> Result<(), CommandListError> {
        let open = self.open.ok_or(CommandListError::NoOpenCommandList)?;
        self.lists[open].commands.push(command);
        Ok(())
    }

    /// Appends a command, reporting a protocol violation instead of failing.
    ///
    /// Recording calls have no error channel: a violation trips a debug
    /// assertion and is logged and dropped in release builds.
    pub fn record_or_report(&mut self, command: Command) {
        if let Err(err) = self.record(command) {
            report_violation(&err);
        }
    }

    /// Number of commands recorded so far in `index`.
    pub fn recorded_len(&self, index: CommandListIndex) -> usize {
        self.lists.get(index.0).map_or(0, |l| l.commands.len())
    }

    /// Drops every recording and returns all lists to `Idle`.
    pub fn reset(&mut self) {
        for list in &mut self.lists {
            list.state = CommandListState::Idle;
            list.commands.clear();
        }
        self.open = None;
    }
}

/// Logs a contract violation and trips a debug assertion.
pub fn report_violation(err: &CommandListError) {
    log::error!("Command list contract violation: {err}");
    debug_assert!(false, "command list contract violation: {err}");
}
