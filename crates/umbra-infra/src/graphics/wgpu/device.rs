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

//! The wgpu implementation of the [`Rhi`] trait.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use umbra_core::math::LinearRgba;
use umbra_core::renderer::{
    report_violation, AdapterInfo, BlendState, BufferDescriptor, BufferId, Command,
    CommandListError, CommandListIndex, CommandListSet, DepthStencilState, DescriptorAllocator,
    DescriptorHeapDescriptor, DescriptorHeapId, DescriptorSlot, DisplayMode, FenceValue,
    GraphicsBackendType, InFlightTracker, PipelineKind, PipelineStateDescriptor,
    PipelineStateId, RasterizerState, ResourceError, ResourceState, Rhi, RhiError, ScissorRect,
    ShaderSource, TextureDescriptor, TextureDimension, TextureFormat, TextureId, Viewport,
    COMPUTE_ENTRY,
};

use super::context::{backend_name, WgpuContext};
use super::conversions::{texture_usages, IntoWgpu};
use super::executor::{self, CommandEncoder};
use super::resources::{
    ConstantRing, PipelineProgram, WgpuBufferEntry, WgpuHeapEntry, WgpuPipelineEntry,
    WgpuResources, WgpuTextureEntry,
};
use super::WgpuConfig;
use crate::graphics::validation;

const BACKBUFFER_COUNT: usize = 2;

#[derive(Debug)]
struct DeviceState {
    lists: CommandListSet,
    tracker: InFlightTracker,
    last_submitted: u64,
    display: DisplayMode,
    backbuffers: Vec<TextureId>,
    current_backbuffer: usize,
    main_depth: TextureId,
}

/// The wgpu RHI backend. Renders offscreen into a ring of backbuffer textures.
#[derive(Debug)]
pub struct WgpuRhi {
    context: WgpuContext,
    constants: ConstantRing,
    state: Mutex<DeviceState>,
    resources: Mutex<WgpuResources>,
    completed: Arc<AtomicU64>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn create_texture_entry(
    device: &wgpu::Device,
    descriptor: &TextureDescriptor,
) -> Result<WgpuTextureEntry, ResourceError> {
    validation::texture(descriptor)?;
    let layers = match descriptor.dimension {
        TextureDimension::Cube => 6,
        _ => descriptor.depth_or_layers.max(1),
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(&descriptor.label),
        size: wgpu::Extent3d {
            width: descriptor.width,
            height: descriptor.height,
            depth_or_array_layers: layers,
        },
        mip_level_count: descriptor.mip_levels,
        sample_count: 1,
        dimension: descriptor.dimension.into_wgpu(),
        format: descriptor.format.into_wgpu(),
        usage: texture_usages(descriptor.usage, descriptor.format),
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor {
        label: Some(&descriptor.label),
        dimension: Some(descriptor.dimension.into_wgpu()),
        ..Default::default()
    });
    Ok(WgpuTextureEntry {
        texture,
        view,
        descriptor: descriptor.clone(),
        state: ResourceState::Common,
    })
}

fn create_swap_targets(
    device: &wgpu::Device,
    resources: &mut WgpuResources,
    width: u32,
    height: u32,
) -> Result<(Vec<TextureId>, TextureId), ResourceError> {
    let mut backbuffers = Vec::with_capacity(BACKBUFFER_COUNT);
    for i in 0..BACKBUFFER_COUNT {
        let entry = create_texture_entry(
            device,
            &TextureDescriptor::render_target(
                format!("Backbuffer {i}"),
                width,
                height,
                TextureFormat::Bgra8UnormSrgb,
            ),
        )?;
        let id = TextureId(resources.next_id());
        resources.textures.insert(id, entry);
        backbuffers.push(id);
    }
    let entry = create_texture_entry(
        device,
        &TextureDescriptor::render_target("Main Depth", width, height, TextureFormat::Depth32Float),
    )?;
    let depth = TextureId(resources.next_id());
    resources.textures.insert(depth, entry);
    Ok((backbuffers, depth))
}

impl WgpuRhi {
    /// Creates the device, the offscreen swap targets and the constant ring.
    pub fn new(config: WgpuConfig) -> Result<Self, RhiError> {
        let context = pollster::block_on(WgpuContext::new(config.power_preference))
            .map_err(|e| RhiError::AdapterNotFound(e.to_string()))?;
        let constants = ConstantRing::new(&context.device);
        let mut resources = WgpuResources::default();
        let (backbuffers, main_depth) =
            create_swap_targets(&context.device, &mut resources, config.width, config.height)
                .map_err(|e| RhiError::DeviceCreation(e.to_string()))?;

        log::info!(
            "wgpu RHI created on '{}': {}x{}, {} frames in flight",
            context.adapter_name,
            config.width,
            config.height,
            config.frames_in_flight.max(1)
        );

        Ok(Self {
            context,
            constants,
            state: Mutex::new(DeviceState {
                lists: CommandListSet::new(config.frames_in_flight),
                tracker: InFlightTracker::new(),
                last_submitted: 0,
                display: DisplayMode {
                    width: config.width,
                    height: config.height,
                    fullscreen: config.fullscreen,
                    present_mode: config.present_mode,
                },
                backbuffers,
                current_backbuffer: 0,
                main_depth,
            }),
            resources: Mutex::new(resources),
            completed: Arc::new(AtomicU64::new(0)),
        })
    }

    fn record(&self, command: Command) {
        lock(&self.state).lists.record_or_report(command);
    }

    fn current_backbuffer(state: &DeviceState) -> TextureId {
        state.backbuffers[state.current_backbuffer]
    }

    /// Number of render pipeline variants compiled for a graphics pipeline.
    pub fn pipeline_variant_count(&self, pipeline: PipelineStateId) -> usize {
        executor::variant_counts(&lock(&self.resources))
            .get(&pipeline)
            .copied()
            .unwrap_or(0)
    }

    /// Blocks until every submission completed, then retires them.
    fn drain(&self) {
        let last = lock(&self.state).last_submitted;
        self.context.poll_blocking();
        self.completed.fetch_max(last, Ordering::SeqCst);
        lock(&self.state)
            .tracker
            .retire(FenceValue(self.completed.load(Ordering::SeqCst)));
    }
}

impl Rhi for WgpuRhi {
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
        state.last_submitted += 1;
        let fence = FenceValue(state.last_submitted);
        state.tracker.track(fence, &commands);

        let (buffer, staged, stats) = {
            let mut resources = lock(&self.resources);
            CommandEncoder::new(
                &self.context.device,
                &mut resources,
                &self.constants,
                &format!("Umbra Command List {}", index.0),
            )
            .encode(&commands)
        };
        if !staged.is_empty() {
            self.context
                .queue
                .write_buffer(&self.constants.buffer, 0, &staged);
        }
        self.context.queue.submit(std::iter::once(buffer));
        let completed = Arc::clone(&self.completed);
        self.context.queue.on_submitted_work_done(move || {
            completed.fetch_max(fence.0, Ordering::SeqCst);
        });
        self.context.poll_non_blocking();
        log::trace!(
            "wgpu RHI: submitted {index} as fence {} ({} draws, {} dispatches, {} skipped)",
            fence.0,
            stats.draws,
            stats.dispatches,
            stats.skipped
        );
        Ok(fence)
    }

    fn wait_for_gpu_on_graphics_fence(&self) -> Result<(), RhiError> {
        self.drain();
        Ok(())
    }

    fn wait_for_fence(&self, value: FenceValue) -> Result<(), RhiError> {
        let target = value.0.min(lock(&self.state).last_submitted);
        if self.completed.load(Ordering::SeqCst) < target {
            self.drain();
        } else {
            lock(&self.state)
                .tracker
                .retire(FenceValue(self.completed.load(Ordering::SeqCst)));
        }
        Ok(())
    }

    fn completed_fence_value(&self) -> FenceValue {
        FenceValue(self.completed.load(Ordering::SeqCst))
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
        self.drain();

        let mut guard = lock(&self.state);
        let state = &mut *guard;
        let mut resources = lock(&self.resources);
        for old in state.backbuffers.drain(..).chain([state.main_depth]) {
            if let Some(entry) = resources.textures.remove(&old) {
                entry.texture.destroy();
            }
        }
        let (backbuffers, main_depth) =
            create_swap_targets(&self.context.device, &mut resources, width, height)?;
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
        log::info!("wgpu RHI reset to {width}x{height} (fullscreen: {fullscreen})");
        Ok(())
    }

    fn present_graphics(&self) -> Result<(), RhiError> {
        let mut state = lock(&self.state);
        state.current_backbuffer = (state.current_backbuffer + 1) % state.backbuffers.len();
        drop(state);
        self.context.poll_non_blocking();
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
        let entry = create_texture_entry(&self.context.device, descriptor)?;
        let mut resources = lock(&self.resources);
        let id = TextureId(resources.next_id());
        resources.textures.insert(id, entry);
        log::debug!("wgpu RHI: created texture '{}' as {id:?}", descriptor.label);
        Ok(id)
    }

    fn write_texture(&self, texture: TextureId, data: &[u8]) -> Result<(), ResourceError> {
        let resources = lock(&self.resources);
        let entry = resources
            .textures
            .get(&texture)
            .ok_or(ResourceError::InvalidHandle)?;
        let descriptor = &entry.descriptor;
        if data.len() as u64 != descriptor.byte_size() {
            return Err(ResourceError::OutOfBounds);
        }
        if descriptor.format.is_depth() {
            return Err(ResourceError::InvalidDescriptor(format!(
                "depth texture '{}' cannot receive CPU uploads",
                descriptor.label
            )));
        }
        let layers = (data.len() as u64
            / (u64::from(descriptor.width)
                * u64::from(descriptor.height)
                * u64::from(descriptor.format.bytes_per_pixel()))) as u32;
        self.context.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &entry.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(descriptor.width * descriptor.format.bytes_per_pixel()),
                rows_per_image: Some(descriptor.height),
            },
            wgpu::Extent3d {
                width: descriptor.width,
                height: descriptor.height,
                depth_or_array_layers: layers,
            },
        );
        Ok(())
    }

    fn destroy_texture(&self, texture: TextureId) -> Result<(), ResourceError> {
        let mut state = lock(&self.state);
        state
            .tracker
            .retire(FenceValue(self.completed.load(Ordering::SeqCst)));
        let mut resources = lock(&self.resources);
        let entry = resources
            .textures
            .get(&texture)
            .ok_or(ResourceError::InvalidHandle)?;
        if state.tracker.texture_in_use(texture) {
            return Err(ResourceError::InUse {
                label: entry.descriptor.label.clone(),
            });
        }
        if let Some(entry) = resources.textures.remove(&texture) {
            log::debug!("wgpu RHI: destroyed texture '{}'", entry.descriptor.label);
            entry.texture.destroy();
        }
        Ok(())
    }

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        validation::buffer(descriptor)?;
        let size = descriptor.size.next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT);
        let buffer = self.context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&descriptor.label),
            size,
            usage: descriptor.usage.into_wgpu(),
            mapped_at_creation: false,
        });
        let mut resources = lock(&self.resources);
        let id = BufferId(resources.next_id());
        resources.buffers.insert(
            id,
            WgpuBufferEntry {
                buffer,
                descriptor: descriptor.clone(),
            },
        );
        log::debug!("wgpu RHI: created buffer '{}' as {id:?}", descriptor.label);
        Ok(id)
    }

    fn write_buffer(&self, buffer: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        let resources = lock(&self.resources);
        let entry = resources
            .buffers
            .get(&buffer)
            .ok_or(ResourceError::InvalidHandle)?;
        let end = offset
            .checked_add(data.len() as u64)
            .filter(|end| *end <= entry.descriptor.size)
            .ok_or(ResourceError::OutOfBounds)?;
        if offset % wgpu::COPY_BUFFER_ALIGNMENT != 0 || data.len() as u64 % wgpu::COPY_BUFFER_ALIGNMENT != 0 {
            return Err(ResourceError::InvalidDescriptor(format!(
                "write of {} bytes at offset {offset} into '{}' is not 4-byte aligned",
                data.len(),
                entry.descriptor.label
            )));
        }
        if end > offset {
            self.context.queue.write_buffer(&entry.buffer, offset, data);
        }
        Ok(())
    }

    fn read_buffer(&self, buffer: BufferId) -> Result<Vec<u8>, ResourceError> {
        let (staging, len) = {
            let resources = lock(&self.resources);
            let entry = resources
                .buffers
                .get(&buffer)
                .ok_or(ResourceError::InvalidHandle)?;
            let size = entry.buffer.size();
            let staging = self.context.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Umbra Readback Staging"),
                size,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let mut encoder =
                self.context
                    .device
                    .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                        label: Some("Umbra Readback"),
                    });
            encoder.copy_buffer_to_buffer(&entry.buffer, 0, &staging, 0, size);
            self.context.queue.submit(std::iter::once(encoder.finish()));
            (staging, entry.descriptor.size as usize)
        };

        let slice = staging.slice(..);
        let (sender, receiver) = flume::bounded(1);
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.context.poll_blocking();
        match receiver.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(ResourceError::BackendError(format!("map_async failed: {e}"))),
            Err(_) => {
                return Err(ResourceError::BackendError(
                    "readback callback was dropped".into(),
                ))
            }
        }
        let data = slice.get_mapped_range()[..len].to_vec();
        staging.unmap();
        Ok(data)
    }

    fn destroy_buffer(&self, buffer: BufferId) -> Result<(), ResourceError> {
        let mut state = lock(&self.state);
        state
            .tracker
            .retire(FenceValue(self.completed.load(Ordering::SeqCst)));
        let mut resources = lock(&self.resources);
        let entry = resources
            .buffers
            .get(&buffer)
            .ok_or(ResourceError::InvalidHandle)?;
        if state.tracker.buffer_in_use(buffer) {
            return Err(ResourceError::InUse {
                label: entry.descriptor.label.clone(),
            });
        }
        if let Some(entry) = resources.buffers.remove(&buffer) {
            entry.buffer.destroy();
        }
        Ok(())
    }

    fn create_descriptor_heap(
        &self,
        descriptor: &DescriptorHeapDescriptor,
    ) -> Result<DescriptorHeapId, ResourceError> {
        validation::heap(descriptor)?;
        let mut resources = lock(&self.resources);
        let id = DescriptorHeapId(resources.next_id());
        resources.heaps.insert(
            id,
            WgpuHeapEntry {
                descriptor: descriptor.clone(),
                allocator: DescriptorAllocator::new(descriptor.capacity),
            },
        );
        Ok(id)
    }

    fn allocate_descriptor(&self, heap: DescriptorHeapId) -> Result<DescriptorSlot, ResourceError> {
        let mut resources = lock(&self.resources);
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
        let mut resources = lock(&self.resources);
        let entry = resources
            .heaps
            .get_mut(&slot.heap)
            .ok_or(ResourceError::InvalidHandle)?;
        entry.allocator.release(slot.index);
        Ok(())
    }

    fn destroy_descriptor_heap(&self, heap: DescriptorHeapId) -> Result<(), ResourceError> {
        lock(&self.resources)
            .heaps
            .remove(&heap)
            .map(|_| ())
            .ok_or(ResourceError::InvalidHandle)
    }

    fn create_pipeline_state(
        &self,
        descriptor: &PipelineStateDescriptor,
    ) -> Result<PipelineStateId, ResourceError> {
        validation::pipeline(descriptor)?;
        let device = &self.context.device;
        let program = match (&descriptor.shader, descriptor.kind) {
            (ShaderSource::Builtin(name), _) => {
                log::debug!(
                    "wgpu RHI: pipeline '{}' uses builtin program '{name}', its work is skipped",
                    descriptor.label
                );
                PipelineProgram::Builtin
            }
            (ShaderSource::Wgsl(source), kind) => {
                let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(&descriptor.label),
                    source: wgpu::ShaderSource::Wgsl(source.as_str().into()),
                });
                match kind {
                    PipelineKind::Graphics => PipelineProgram::Graphics {
                        module,
                        variants: HashMap::new(),
                    },
                    PipelineKind::Compute => {
                        let pipeline =
                            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                                label: Some(&descriptor.label),
                                layout: Some(&self.constants.pipeline_layout),
                                module: &module,
                                entry_point: Some(COMPUTE_ENTRY),
                                compilation_options: Default::default(),
                                cache: None,
                            });
                        PipelineProgram::Compute { pipeline }
                    }
                }
            }
        };
        let mut resources = lock(&self.resources);
        let id = PipelineStateId(resources.next_id());
        resources.pipelines.insert(
            id,
            WgpuPipelineEntry {
                descriptor: descriptor.clone(),
                program,
            },
        );
        log::debug!("wgpu RHI: created pipeline '{}' as {id:?}", descriptor.label);
        Ok(id)
    }

    fn destroy_pipeline_state(&self, pipeline: PipelineStateId) -> Result<(), ResourceError> {
        let mut state = lock(&self.state);
        state
            .tracker
            .retire(FenceValue(self.completed.load(Ordering::SeqCst)));
        let mut resources = lock(&self.resources);
        let entry = resources
            .pipelines
            .get(&pipeline)
            .ok_or(ResourceError::InvalidHandle)?;
        if state.tracker.pipeline_in_use(pipeline) {
            return Err(ResourceError::InUse {
                label: entry.descriptor.label.clone(),
            });
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
            name: self.context.adapter_name.clone(),
            backend: GraphicsBackendType::Wgpu,
            api: backend_name(self.context.adapter_backend).to_string(),
        }
    }

    fn live_resource_counts(&self) -> [usize; 4] {
        lock(&self.resources).counts()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for WgpuRhi {
    fn drop(&mut self) {
        self.context.poll_blocking();
    }
}
