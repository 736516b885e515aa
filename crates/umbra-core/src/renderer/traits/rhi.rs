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

use std::any::Any;
use std::fmt::Debug;

use crate::math::LinearRgba;
use crate::renderer::api::*;
use crate::renderer::error::{CommandListError, ResourceError, RhiError};

/// The render hardware interface.
///
/// One command-list / fence / descriptor-heap abstraction implemented by every
/// backend, so the frame orchestrator never knows which GPU it drives.
///
/// All methods take `&self`; implementations synchronise internally.
///
/// # Command-list protocol
///
/// A list is begun with [`begin_graphics_command_list`], recorded into, closed
/// with [`end_graphics_command_list`] and submitted with
/// [`execute_command_lists`]. Protocol violations are returned as
/// [`CommandListError`]s before anything reaches the queue. Recording calls
/// made while no list is open are contract violations: they trip a debug
/// assertion and are logged and ignored in release builds.
///
/// [`begin_graphics_command_list`]: Rhi::begin_graphics_command_list
/// [`end_graphics_command_list`]: Rhi::end_graphics_command_list
/// [`execute_command_lists`]: Rhi::execute_command_lists
pub trait Rhi: Send + Sync + Debug + 'static {
    // --- Command lists and synchronisation ---

    /// Opens command list `index` for recording.
    fn begin_graphics_command_list(&self, index: CommandListIndex) -> Result<(), CommandListError>;

    /// Closes command list `index`.
    fn end_graphics_command_list(&self, index: CommandListIndex) -> Result<(), CommandListError>;

    /// Submits a closed command list.
    ///
    /// ## Returns
    /// The fence value signalled once the submission completes.
    fn execute_command_lists(&self, index: CommandListIndex) -> Result<FenceValue, RhiError>;

    /// Blocks the calling thread until every submitted list has completed.
    fn wait_for_gpu_on_graphics_fence(&self) -> Result<(), RhiError>;

    /// Blocks until the submission that returned `value` has completed.
    fn wait_for_fence(&self, value: FenceValue) -> Result<(), RhiError>;

    /// The highest fence value known to have completed.
    fn completed_fence_value(&self) -> FenceValue;

    /// Number of per-frame command lists.
    fn frames_in_flight(&self) -> usize;

    /// Drains the GPU and recreates the backbuffers and the main depth target.
    ///
    /// Previously fetched main render target ids become invalid. Calling it
    /// twice with the same arguments yields the same [`DisplayMode`].
    fn reset_rhi(&self, width: u32, height: u32, fullscreen: bool) -> Result<(), RhiError>;

    /// Presents the current backbuffer and advances to the next one.
    fn present_graphics(&self) -> Result<(), RhiError>;

    // --- State setters on the open list ---

    /// Binds a shader-visible descriptor heap.
    fn set_gpu_descriptor_heap(&self, heap: DescriptorHeapId);

    /// Sets the viewport.
    fn set_viewport(&self, viewport: Viewport);

    /// Sets the scissor rectangle.
    fn set_rect(&self, rect: ScissorRect);

    /// Overrides depth/stencil state for subsequent draws.
    fn set_depth_stencil_state(&self, state: DepthStencilState);

    /// Overrides rasterizer state for subsequent draws.
    fn set_rasterizer_state(&self, state: RasterizerState);

    /// Overrides blend state for subsequent draws.
    fn set_blend_state(&self, state: BlendState);

    /// Binds colour targets and an optional depth target.
    fn set_render_targets(&self, colors: &[TextureId], depth: Option<TextureId>);

    /// Binds the current backbuffer and the main depth target, with a
    /// full-screen viewport and scissor.
    fn set_main_render_target(&self);

    /// Binds a pipeline state.
    fn set_pipeline_state(&self, pipeline: PipelineStateId);

    /// Pushes per-draw constants into `slot`.
    fn set_constants(&self, slot: u32, data: &[u8]);

    // --- Commands on the open list ---

    /// Clears a colour target.
    fn clear_render_target(&self, target: TextureId, color: LinearRgba);

    /// Clears the current backbuffer.
    fn clear_main_render_target(&self, color: LinearRgba);

    /// Clears a depth/stencil target.
    fn clear_depth_stencil_target(&self, target: TextureId, depth: f32, stencil: u32);

    /// Clears the main depth target.
    fn clear_main_depth_stencil_target(&self, depth: f32, stencil: u32);

    /// Transitions a texture into `state`.
    fn transition_resource(&self, texture: TextureId, state: ResourceState);

    /// Transitions the current backbuffer into the presentable state.
    fn transition_main_render_target_to_present(&self);

    /// Non-indexed draw.
    fn draw(&self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32);

    /// Compute dispatch.
    fn dispatch(&self, x: u32, y: u32, z: u32);

    /// Copies a texture into another of the same size and format.
    fn copy_texture(&self, src: TextureId, dst: TextureId);

    /// Copies a buffer into another.
    fn copy_buffer(&self, src: BufferId, dst: BufferId);

    /// Opens a named debug marker scope.
    fn begin_event(&self, label: &str);

    /// Closes the innermost debug marker scope.
    fn end_event(&self);

    // --- Resources ---

    /// Creates a texture.
    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError>;

    /// Uploads the top mip level of a texture. `data` must be tightly packed.
    fn write_texture(&self, texture: TextureId, data: &[u8]) -> Result<(), ResourceError>;

    /// Destroys a texture. Refused with [`ResourceError::InUse`] while
    /// un-retired GPU work references it.
    fn destroy_texture(&self, texture: TextureId) -> Result<(), ResourceError>;

    /// Creates a buffer.
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError>;

    /// Writes `data` into a buffer at `offset`.
    fn write_buffer(&self, buffer: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError>;

    /// Reads back the whole content of a buffer. Only meaningful after a
    /// fence wait covering the work that wrote it.
    fn read_buffer(&self, buffer: BufferId) -> Result<Vec<u8>, ResourceError>;

    /// Destroys a buffer. Refused while un-retired GPU work references it.
    fn destroy_buffer(&self, buffer: BufferId) -> Result<(), ResourceError>;

    /// Creates a descriptor heap.
    fn create_descriptor_heap(
        &self,
        descriptor: &DescriptorHeapDescriptor,
    ) -> Result<DescriptorHeapId, ResourceError>;

    /// Allocates a slot in a heap.
    fn allocate_descriptor(&self, heap: DescriptorHeapId) -> Result<DescriptorSlot, ResourceError>;

    /// Returns a slot to its heap.
    fn free_descriptor(&self, slot: DescriptorSlot) -> Result<(), ResourceError>;

    /// Destroys a descriptor heap.
    fn destroy_descriptor_heap(&self, heap: DescriptorHeapId) -> Result<(), ResourceError>;

    /// Compiles a pipeline state.
    fn create_pipeline_state(
        &self,
        descriptor: &PipelineStateDescriptor,
    ) -> Result<PipelineStateId, ResourceError>;

    /// Destroys a pipeline state. Refused while un-retired GPU work binds it.
    fn destroy_pipeline_state(&self, pipeline: PipelineStateId) -> Result<(), ResourceError>;

    // --- Queries ---

    /// The current backbuffer.
    fn main_render_target(&self) -> TextureId;

    /// The main depth target.
    fn main_depth_target(&self) -> TextureId;

    /// Resolution, fullscreen flag and present mode of the backbuffers.
    fn display_mode(&self) -> DisplayMode;

    /// The adapter behind this RHI.
    fn adapter_info(&self) -> AdapterInfo;

    /// Number of live textures, buffers, heaps and pipelines, in that order.
    fn live_resource_counts(&self) -> [usize; 4];

    /// Downcasting hook for backend-specific tests and tools.
    fn as_any(&self) -> &dyn Any;
}
