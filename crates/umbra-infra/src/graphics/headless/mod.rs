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

//! A CPU-side virtual GPU.
//!
//! [`HeadlessRhi`] implements the full RHI contract without a graphics
//! adapter: command lists are validated and recorded exactly as on the wgpu
//! backend, then executed by a dedicated queue thread that tracks resource
//! states, counts work and signals the graphics fence. It runs the engine in
//! CI, in tests and for offscreen runs.

mod queue;
mod resources;

pub use queue::ExecutedList;

use std::any::Any;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use umbra_core::math::LinearRgba;
use umbra_core::renderer::{
    report_violation, AdapterInfo, BlendState, BufferDescriptor, BufferId, Command, CommandListError,
    CommandListIndex, CommandListSet, DepthStencilState, DescriptorHeapDescriptor,
    DescriptorHeapId, DescriptorSlot, DisplayMode, FenceValue, GraphicsBackendType,
    InFlightTracker, PipelineStateDescriptor, PipelineStateId, PresentMode, RasterizerState,
    ResourceError, ResourceState, Rhi, RhiError, ScissorRect, TextureDescriptor, TextureFormat,
    TextureId, Viewport,
};

use queue::{QueueShared, QueueThread, Submission};
use resources::ResourceTable;

/// Number of backbuffers in the swap ring.
const BACKBUFFER_COUNT: usize = 2;

/// Construction parameters of a [`HeadlessRhi`].
#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessConfig {
    /// Backbuffer width.
    pub width: u32,
    /// Backbuffer height.
    pub height: u32,
    /// Reported fullscreen flag.
    pub fullscreen: bool,
    /// Number of per-frame command lists.
    pub frames_in_flight: usize,
    /// Artificial delay applied by the queue to every submission.
    pub simulated_latency: Duration,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            fullscreen: false,
            frames_in_flight: 2,
            simulated_latency: Duration::ZERO,
        }
    }
}

#[derive(Debug)]
struct DeviceState {
    lists: CommandListSet,
    tracker: InFlightTracker,
    last_submitted: u64,
    display: DisplayMode,
    backbuffers: Vec<TextureId>,
    current_backbuffer: usize,
    main_depth: TextureId,
    presents: u64,
}

/// The headless RHI backend.
#[derive(Debug)]
pub struct HeadlessRhi {
    state: Mutex<DeviceState>,
    shared: Arc<QueueShared>,
    queue: QueueThread,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn create_swap_targets(
    resources: &mut ResourceTable,
    width: u32,
    height: u32,
) -> Result<(Vec<TextureId>, TextureId), ResourceError> {
    let backbuffers = (0..BACKBUFFER_COUNT)
        .map(|i| {
            resources.insert_texture(&TextureDescriptor::render_target(
                format!("Backbuffer {i}"),
                width,
                height,
                TextureFormat::Bgra8UnormSrgb,
            ))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let depth = resources.insert_texture(&TextureDescriptor::render_target(
        "Main Depth",
        width,
        height,
        TextureFormat::Depth32Float,
    ))?;
    Ok((backbuffers, depth))
}

impl HeadlessRhi {
    /// Creates the device, its swap targets and its queue thread.
    pub fn new(config: HeadlessConfig) -> Result<Self, RhiError> {
        let shared = Arc::new(QueueShared::default());
        let (backbuffers, main_depth) = {
            let mut resources = lock(&shared.resources);
            create_swap_targets(&mut resources, config.width, config.height)
                .map_err(|e| RhiError::DeviceCreation(e.to_string()))?
        };
        let queue = QueueThread::spawn(Arc::clone(&shared), config.simulated_latency)
            .map_err(|e| RhiError::DeviceCreation(format!("failed to spawn queue thread: {e}")))?;

        log::info!(
            "Headless RHI created: {}x{}, {} frames in flight",
            config.width,
            config.height,
            config.frames_in_flight.max(1)
        );

        Ok(Self {
            state: Mutex::new(DeviceState {
                lists: CommandListSet::new(config.frames_in_flight),
                tracker: InFlightTracker::new(),
                last_submitted: 0,
                display: DisplayMode {
                    width: config.width,
                    height: config.height,
                    fullscreen: config.fullscreen,
                    present_mode: PresentMode::Fifo,
                },
                backbuffers,
                current_backbuffer: 0,
                main_depth,
                presents: 0,
            }),
            shared,
            queue,
        })
    }

    fn record(&self, command: Command) {
        lock(&self.state).lists.record_or_report(command);
    }

    fn current_backbuffer(state: &DeviceState) -> TextureId {
        state.backbuffers[state.current_backbuffer]
    }

    /// The most recent executed submissions, oldest first.
    pub fn executed_lists(&self) -> Vec<ExecutedList> {
        lock(&self.shared.executed).iter().cloned().collect()
    }

    /// Total draws executed since creation.
    pub fn total_draws(&self) -> u64 {
        self.shared.total_draws.load(Ordering::Relaxed)
    }

    /// Total dispatches executed since creation.
    pub fn total_dispatches(&self) -> u64 {
        self.shared.total_dispatches.load(Ordering::Relaxed)
    }

    /// Commands the queue found referencing missing resources, unbound
    /// pipelines or unbalanced markers.
    pub fn invalid_references(&self) -> u64 {
        self.shared.invalid_references.load(Ordering::Relaxed)
    }

    /// Number of `present_graphics` calls.
    pub fn present_count(&self) -> u64 {
        lock(&self.state).presents
    }

    /// The usage state a texture was last transitioned into by executed work.
    pub fn texture_state(&self, texture: TextureId) -> Option<ResourceState> {
        lock(&self.shared.resources)
            .textures
            .get(&texture)
            .map(|t| t.state)
    }

    /// Number of `write_texture` uploads a texture received.
    pub fn texture_uploads(&self, texture: TextureId) -> Option<u32> {
        lock(&self.shared.resources)
            .textures
            .get(&texture)
            .map(|t| t.uploads)
    }

    /// Slots currently allocated in a heap.
    pub fn allocated_descriptors(&self, heap: DescriptorHeapId) -> Option<u32> {
        lock(&self.shared.resources)
            .heaps
            .get(&heap)
            .map(|h| h.allocator.allocated())
    }
}

impl Rhi for HeadlessRhi {
    fn begin_graphics_command_list(&self, index: CommandListIndex) -> Result<(), CommandListError> {
        let result = lock(&self.state).lists.begin(index);
        result.inspect_err(report_violation)
    }

    fn end_graphics_command_list(&self, index: CommandListIndex) -> Result<(), CommandListError> {
        let result = lock(&self.state).lists.end(index);
        result.inspect_err(report_violation)
    }

    fn execute_command_lists(&self, index: CommandListIndex) -> Result<FenceValue, RhiError> {
        let mut state = lock(&self.state);
        let commands = match state.lists.take_for_execution(index) {
            Ok(commands) => commands,
            Err(e) => {
                drop(state);
                report_violation(&e);
                return Err(e.into());
            }
        };
        let fence = FenceValue(state.last_submitted + 1);
        state.tracker.track(fence, &commands);
        if !self.queue.submit(Submission {
            index,
            fence,
            commands,
        }) {
            // nothing can complete any more, so nothing is in flight
            state.tracker.clear();
            return Err(RhiError::DeviceLost("headless queue thread is gone".into()));
        }
        state.last_submitted = fence.0;
        log::trace!("Headless RHI: submitted {index} as fence {}", fence.0);
        Ok(fence)
    }

    fn wait_for_gpu_on_graphics_fence(&self) -> Result<(), RhiError> {
        let last = FenceValue(lock(&self.state).last_submitted);
        self.wait_for_fence(last)
    }

    fn wait_for_fence(&self, value: FenceValue) -> Result<(), RhiError> {
        let target = {
            let state = lock(&self.state);
            FenceValue(value.0.min(state.last_submitted))
        };
        self.shared.fence.wait(target);
        lock(&self.state)
            .tracker
            .retire(self.shared.fence.completed());
        Ok(())
    }

    fn completed_fence_value(&self) -> FenceValue {
        self.shared.fence.completed()
    }

    fn frames_in_flight(&self) -> usize {
        lock(&self.state).lists.frames_in_flight()
    }

    fn reset_rhi(&self, width: u32, height: u32, fullscreen: bool) -> Result<(), RhiError> {
        if width == 0 || height == 0 {
            return Err(RhiError::Resource(ResourceError::InvalidDescriptor(format!(
                "cannot reset to {width}x{height}"
            ))));
        }
        self.wait_for_gpu_on_graphics_fence()?;

        let mut guard = lock(&self.state);
        let state = &mut *guard;
        let mut resources = lock(&self.shared.resources);
        for old in state.backbuffers.drain(..).chain([state.main_depth]) {
            resources.textures.remove(&old);
        }
        let (backbuffers, main_depth) = create_swap_targets(&mut resources, width, height)?;
        state.backbuffers = backbuffers;
        state.main_depth = main_depth;
        state.current_backbuffer = 0;
        state.lists.reset();
        state.tracker.clear();
        state.display = DisplayMode {
            width,
            height,
            fullscreen,
            present_mode: state.display.present_mode,
        };
        log::info!("Headless RHI reset to {width}x{height} (fullscreen: {fullscreen})");
        Ok(())
    }

    fn present_graphics(&self) -> Result<(), RhiError> {
        let mut state = lock(&self.state);
        state.current_backbuffer = (state.current_backbuffer + 1) % state.backbuffers.len();
        state.presents += 1;
        Ok(())
    }

    fn set_gpu_descriptor_heap(&self, heap: DescriptorHeapId) {
        self.record(Command::SetDescriptorHeap(heap));
    }

    fn set_viewport(&self, viewport: Viewport) {
        self.record(Command::SetViewport(viewport));
    }

    fn set_rect(&self, rect: ScissorRect) {
        self.record(Command::SetRect(rect));
    }

    fn set_depth_stencil_state(&self, state: DepthStencilState) {
        self.record(Command::SetDepthStencilState(state));
    }

    fn set_rasterizer_state(&self, state: RasterizerState) {
        self.record(Command::SetRasterizerState(state));
    }

    fn set_blend_state(&self, state: BlendState) {
        self.record(Command::SetBlendState(state));
    }

    fn set_render_targets(&self, colors: &[TextureId], depth: Option<TextureId>) {
        self.record(Command::SetRenderTargets {
            colors: colors.to_vec(),
            depth,
        });
    }

    fn set_main_render_target(&self) {
        let mut state = lock(&self.state);
        let target = Self::current_backbuffer(&state);
        let depth = state.main_depth;
        let DisplayMode { width, height, .. } = state.display;
        state.lists.record_or_report(Command::SetRenderTargets {
            colors: vec![target],
            depth: Some(depth),
        });
        state
            .lists
            .record_or_report(Command::SetViewport(Viewport::full(width, height)));
        state
            .lists
            .record_or_report(Command::SetRect(ScissorRect::full(width, height)));
    }

    fn set_pipeline_state(&self, pipeline: PipelineStateId) {
        self.record(Command::SetPipelineState(pipeline));
    }

    fn set_constants(&self, slot: u32, data: &[u8]) {
        self.record(Command::SetConstants {
            slot,
            data: data.to_vec(),
        });
    }

    fn clear_render_target(&self, target: TextureId, color: LinearRgba) {
        self.record(Command::ClearRenderTarget { target, color });
    }

    fn clear_main_render_target(&self, color: LinearRgba) {
        let mut state = lock(&self.state);
        let target = Self::current_backbuffer(&state);
        state
            .lists
            .record_or_report(Command::ClearRenderTarget { target, color });
    }

    fn clear_depth_stencil_target(&self, target: TextureId, depth: f32, stencil: u32) {
        self.record(Command::ClearDepthStencil {
            target,
            depth,
            stencil,
        });
    }

    fn clear_main_depth_stencil_target(&self, depth: f32, stencil: u32) {
        let mut state = lock(&self.state);
        let target = state.main_depth;
        state.lists.record_or_report(Command::ClearDepthStencil {
            target,
            depth,
            stencil,
        });
    }

    fn transition_resource(&self, texture: TextureId, state: ResourceState) {
        self.record(Command::Transition { texture, state });
    }

    fn transition_main_render_target_to_present(&self) {
        let mut state = lock(&self.state);
        let texture = Self::current_backbuffer(&state);
        state.lists.record_or_report(Command::Transition {
            texture,
            state: ResourceState::Present,
        });
    }

    fn draw(&self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) {
        self.record(Command::Draw {
            vertex_count,
            instance_count,
            first_vertex,
            first_instance,
        });
    }

    fn dispatch(&self, x: u32, y: u32, z: u32) {
        self.record(Command::Dispatch { x, y, z });
    }

    fn copy_texture(&self, src: TextureId, dst: TextureId) {
        self.record(Command::CopyTexture { src, dst });
    }

    fn copy_buffer(&self, src: BufferId, dst: BufferId) {
        self.record(Command::CopyBuffer { src, dst });
    }

    fn begin_event(&self, label: &str) {
        self.record(Command::BeginEvent(label.to_string()));
    }

    fn end_event(&self) {
        self.record(Command::EndEvent);
    }

    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError> {
        let id = lock(&self.shared.resources).insert_texture(descriptor)?;
        log::debug!("Headless RHI: created texture '{}' as {id:?}", descriptor.label);
        Ok(id)
    }

    fn write_texture(&self, texture: TextureId, data: &[u8]) -> Result<(), ResourceError> {
        let mut resources = lock(&self.shared.resources);
        let entry = resources
            .textures
            .get_mut(&texture)
            .ok_or(ResourceError::InvalidHandle)?;
        if data.len() as u64 != entry.descriptor.byte_size() {
            return Err(ResourceError::OutOfBounds);
        }
        entry.uploads += 1;
        Ok(())
    }

    fn destroy_texture(&self, texture: TextureId) -> Result<(), ResourceError> {
        let mut state = lock(&self.state);
        state.tracker.retire(self.shared.fence.completed());
        let mut resources = lock(&self.shared.resources);
        let label = resources
            .texture_label(texture)
            .ok_or(ResourceError::InvalidHandle)?;
        if state.tracker.texture_in_use(texture) {
            return Err(ResourceError::InUse { label });
        }
        resources.textures.remove(&texture);
        log::debug!("Headless RHI: destroyed texture '{label}'");
        Ok(())
    }

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        let id = lock(&self.shared.resources).insert_buffer(descriptor)?;
        log::debug!("Headless RHI: created buffer '{}' as {id:?}", descriptor.label);
        Ok(id)
    }

    fn write_buffer(&self, buffer: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        let mut resources = lock(&self.shared.resources);
        let entry = resources
            .buffers
            .get_mut(&buffer)
            .ok_or(ResourceError::InvalidHandle)?;
        let start = usize::try_from(offset).map_err(|_| ResourceError::OutOfBounds)?;
        let end = start
            .checked_add(data.len())
            .filter(|end| *end <= entry.data.len())
            .ok_or(ResourceError::OutOfBounds)?;
        entry.data[start..end].copy_from_slice(data);
        Ok(())
    }

    fn read_buffer(&self, buffer: BufferId) -> Result<Vec<u8>, ResourceError> {
        lock(&self.shared.resources)
            .buffers
            .get(&buffer)
            .map(|b| b.data.clone())
            .ok_or(ResourceError::InvalidHandle)
    }

    fn destroy_buffer(&self, buffer: BufferId) -> Result<(), ResourceError> {
        let mut state = lock(&self.state);
        state.tracker.retire(self.shared.fence.completed());
        let mut resources = lock(&self.shared.resources);
        let label = resources
            .buffer_label(buffer)
            .ok_or(ResourceError::InvalidHandle)?;
        if state.tracker.buffer_in_use(buffer) {
            return Err(ResourceError::InUse { label });
        }
        resources.buffers.remove(&buffer);
        Ok(())
    }

    fn create_descriptor_heap(
        &self,
        descriptor: &DescriptorHeapDescriptor,
    ) -> Result<DescriptorHeapId, ResourceError> {
        lock(&self.shared.resources).insert_heap(descriptor)
    }

    fn allocate_descriptor(&self, heap: DescriptorHeapId) -> Result<DescriptorSlot, ResourceError> {
        let mut resources = lock(&self.shared.resources);
        let entry = resources
            .heaps
            .get_mut(&heap)
            .ok_or(ResourceError::InvalidHandle)?;
        let index = entry
            .allocator
            .allocate()
            .ok_or(ResourceError::HeapExhausted {
                capacity: entry.descriptor.capacity,
            })?;
        Ok(DescriptorSlot { heap, index })
    }

    fn free_descriptor(&self, slot: DescriptorSlot) -> Result<(), ResourceError> {
        let mut resources = lock(&self.shared.resources);
        let entry = resources
            .heaps
            .get_mut(&slot.heap)
            .ok_or(ResourceError::InvalidHandle)?;
        entry.allocator.release(slot.index);
        Ok(())
    }

    fn destroy_descriptor_heap(&self, heap: DescriptorHeapId) -> Result<(), ResourceError> {
        lock(&self.shared.resources)
            .heaps
            .remove(&heap)
            .map(|_| ())
            .ok_or(ResourceError::InvalidHandle)
    }

    fn create_pipeline_state(
        &self,
        descriptor: &PipelineStateDescriptor,
    ) -> Result<PipelineStateId, ResourceError> {
        let id = lock(&self.shared.resources).insert_pipeline(descriptor)?;
        log::debug!("Headless RHI: compiled pipeline '{}' as {id:?}", descriptor.label);
        Ok(id)
    }

    fn destroy_pipeline_state(&self, pipeline: PipelineStateId) -> Result<(), ResourceError> {
        let mut state = lock(&self.state);
        state.tracker.retire(self.shared.fence.completed());
        let mut resources = lock(&self.shared.resources);
        let label = resources
            .pipeline_label(pipeline)
            .ok_or(ResourceError::InvalidHandle)?;
        if state.tracker.pipeline_in_use(pipeline) {
            return Err(ResourceError::InUse { label });
        }
        resources.pipelines.remove(&pipeline);
        Ok(())
    }

    fn main_render_target(&self) -> TextureId {
        Self::current_backbuffer(&lock(&self.state))
    }

    fn main_depth_target(&self) -> TextureId {
        lock(&self.state).main_depth
    }

    fn display_mode(&self) -> DisplayMode {
        lock(&self.state).display
    }

    fn adapter_info(&self) -> AdapterInfo {
        AdapterInfo {
            name: "Umbra Headless Device".into(),
            backend: GraphicsBackendType::Headless,
            api: "None".into(),
        }
    }

    fn live_resource_counts(&self) -> [usize; 4] {
        lock(&self.shared.resources).counts()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use umbra_core::renderer::{BufferUsage, DescriptorHeapKind, TextureUsage};

    const FRAME: CommandListIndex = CommandListIndex(1);

    fn rhi() -> HeadlessRhi {
        HeadlessRhi::new(HeadlessConfig::default()).unwrap()
    }

    /// Runs a call that breaks the command-list protocol. Debug builds trip
    /// the contract assertion; release builds get the error back.
    fn violation<T, E>(call: impl FnOnce() -> Result<T, E>) -> Option<E> {
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(call));
        if cfg!(debug_assertions) {
            assert!(outcome.is_err(), "the violation was not asserted");
            None
        } else {
            outcome.ok().and_then(Result::err)
        }
    }

    #[test]
    fn execute_requires_begin_and_end() {
        let rhi = rhi();
        let err = violation(|| rhi.execute_command_lists(FRAME));
        assert!(
            err.is_none()
                || matches!(err, Some(RhiError::CommandList(CommandListError::NotBegun(_))))
        );
        rhi.begin_graphics_command_list(FRAME).unwrap();
        let err = violation(|| rhi.execute_command_lists(FRAME));
        assert!(
            err.is_none()
                || matches!(err, Some(RhiError::CommandList(CommandListError::NotEnded(_))))
        );
        rhi.end_graphics_command_list(FRAME).unwrap();
        let fence = rhi.execute_command_lists(FRAME).unwrap();
        rhi.wait_for_fence(fence).unwrap();
        assert_eq!(rhi.completed_fence_value(), fence);
        // Nothing reached the queue for the refused calls.
        assert_eq!(rhi.executed_lists().len(), 1);
    }

    #[test]
    fn end_without_begin_is_refused() {
        let rhi = rhi();
        let list = CommandListIndex(2);
        let err = violation(|| rhi.end_graphics_command_list(list));
        assert!(err.is_none() || err == Some(CommandListError::NotBegun(list)));
        // the list is still usable afterwards
        rhi.begin_graphics_command_list(list).unwrap();
        rhi.end_graphics_command_list(list).unwrap();
        rhi.execute_command_lists(list).unwrap();
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "command list contract violation")]
    fn execute_without_end_asserts_in_debug_builds() {
        let rhi = rhi();
        rhi.begin_graphics_command_list(FRAME).unwrap();
        let _ = rhi.execute_command_lists(FRAME);
    }

    #[test]
    fn out_of_range_list_is_refused() {
        let rhi = rhi();
        let err = violation(|| rhi.begin_graphics_command_list(CommandListIndex(9)));
        assert!(
            err.is_none()
                || matches!(err, Some(CommandListError::InvalidIndex { count: 3, .. }))
        );
    }

    #[test]
    fn lost_queue_does_not_advance_the_fence() {
        let mut rhi = rhi();
        rhi.queue.shut_down();
        rhi.begin_graphics_command_list(FRAME).unwrap();
        rhi.end_graphics_command_list(FRAME).unwrap();
        assert!(matches!(
            rhi.execute_command_lists(FRAME),
            Err(RhiError::DeviceLost(_))
        ));
        // returns at once instead of waiting for a fence nobody signals
        rhi.wait_for_gpu_on_graphics_fence().unwrap();
        assert_eq!(rhi.completed_fence_value(), FenceValue(0));
    }

    #[test]
    fn reset_is_idempotent_and_invalidates_main_target() {
        let rhi = rhi();
        let before = rhi.main_render_target();
        rhi.reset_rhi(800, 600, true).unwrap();
        let first = rhi.display_mode();
        let after = rhi.main_render_target();
        rhi.reset_rhi(800, 600, true).unwrap();
        assert_eq!(rhi.display_mode(), first);
        assert_eq!(first.width, 800);
        assert!(first.fullscreen);
        assert_ne!(before, after);
        assert!(rhi.texture_state(before).is_none());
        assert!(rhi.reset_rhi(0, 600, false).is_err());
    }

    #[test]
    fn destroy_refused_until_fence_retires() {
        let rhi = HeadlessRhi::new(HeadlessConfig {
            simulated_latency: Duration::from_millis(30),
            ..HeadlessConfig::default()
        })
        .unwrap();
        let texture = rhi
            .create_texture(&TextureDescriptor::render_target(
                "Scratch",
                4,
                4,
                TextureFormat::Rgba8Unorm,
            ))
            .unwrap();

        rhi.begin_graphics_command_list(FRAME).unwrap();
        rhi.clear_render_target(texture, LinearRgba::BLACK);
        rhi.end_graphics_command_list(FRAME).unwrap();
        rhi.execute_command_lists(FRAME).unwrap();

        assert!(matches!(
            rhi.destroy_texture(texture),
            Err(ResourceError::InUse { label }) if label == "Scratch"
        ));
        rhi.wait_for_gpu_on_graphics_fence().unwrap();
        rhi.destroy_texture(texture).unwrap();
        assert_eq!(rhi.destroy_texture(texture), Err(ResourceError::InvalidHandle));
    }

    #[test]
    fn copy_buffer_is_visible_after_fence() {
        let rhi = rhi();
        let desc = BufferDescriptor {
            label: "Readback".into(),
            size: 8,
            usage: BufferUsage::STORAGE | BufferUsage::READBACK,
        };
        let src = rhi.create_buffer(&desc).unwrap();
        let dst = rhi.create_buffer(&desc).unwrap();
        rhi.write_buffer(src, 0, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        assert_eq!(rhi.write_buffer(src, 4, &[0; 8]), Err(ResourceError::OutOfBounds));

        rhi.begin_graphics_command_list(CommandListIndex::PREPARE).unwrap();
        rhi.copy_buffer(src, dst);
        rhi.end_graphics_command_list(CommandListIndex::PREPARE).unwrap();
        rhi.execute_command_lists(CommandListIndex::PREPARE).unwrap();
        rhi.wait_for_gpu_on_graphics_fence().unwrap();

        assert_eq!(rhi.read_buffer(dst).unwrap(), vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn markers_and_transitions_reach_the_queue() {
        let rhi = rhi();
        rhi.begin_graphics_command_list(FRAME).unwrap();
        rhi.begin_event("GBuffer");
        rhi.set_main_render_target();
        rhi.clear_main_render_target(LinearRgba::BLACK);
        rhi.end_event();
        rhi.transition_main_render_target_to_present();
        rhi.end_graphics_command_list(FRAME).unwrap();
        let target = rhi.main_render_target();
        rhi.execute_command_lists(FRAME).unwrap();
        rhi.wait_for_gpu_on_graphics_fence().unwrap();
        rhi.present_graphics().unwrap();

        assert_eq!(rhi.texture_state(target), Some(ResourceState::Present));
        assert_ne!(rhi.main_render_target(), target);
        let executed = rhi.executed_lists();
        assert_eq!(executed[0].markers, vec!["GBuffer".to_string()]);
        assert_eq!(rhi.invalid_references(), 0);
    }

    #[test]
    fn descriptor_heap_exhaustion() {
        let rhi = rhi();
        let heap = rhi
            .create_descriptor_heap(&DescriptorHeapDescriptor {
                label: "Materials".into(),
                kind: DescriptorHeapKind::ShaderResource,
                capacity: 1,
            })
            .unwrap();
        let slot = rhi.allocate_descriptor(heap).unwrap();
        assert_eq!(
            rhi.allocate_descriptor(heap),
            Err(ResourceError::HeapExhausted { capacity: 1 })
        );
        rhi.free_descriptor(slot).unwrap();
        assert_eq!(rhi.allocated_descriptors(heap), Some(0));
    }

    #[test]
    fn write_texture_checks_size() {
        let rhi = rhi();
        let mut desc = TextureDescriptor::sampled("Albedo", 2, 2, TextureFormat::Rgba8UnormSrgb);
        desc.usage = desc.usage | TextureUsage::COPY_SRC;
        let texture = rhi.create_texture(&desc).unwrap();
        assert_eq!(rhi.write_texture(texture, &[0; 3]), Err(ResourceError::OutOfBounds));
        rhi.write_texture(texture, &[255; 16]).unwrap();
        assert_eq!(rhi.texture_uploads(texture), Some(1));
    }

    #[test]
    fn invalid_descriptors_are_rejected() {
        let rhi = rhi();
        assert!(matches!(
            rhi.create_texture(&TextureDescriptor::sampled("Empty", 0, 4, TextureFormat::R32Float)),
            Err(ResourceError::InvalidDescriptor(_))
        ));
        let bad = PipelineStateDescriptor::graphics("Bad", vec![TextureFormat::Depth32Float], None);
        assert!(matches!(
            rhi.create_pipeline_state(&bad),
            Err(ResourceError::InvalidDescriptor(_))
        ));
    }
}
