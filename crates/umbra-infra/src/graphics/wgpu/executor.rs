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

//! Translates recorded command packets into a wgpu command buffer.
//!
//! Each clear and each draw opens its own render pass against the bound
//! targets, and each dispatch its own compute pass. Resource transitions are
//! bookkeeping only: wgpu tracks barriers itself.

use std::collections::HashMap;

use umbra_core::renderer::{
    BlendState, BufferId, Command, DepthStencilState, PipelineStateId, RasterizerState, ScissorRect,
    TextureDimension, TextureId, TextureUsage, Viewport, FRAGMENT_ENTRY, VERTEX_ENTRY,
};

use super::conversions::{depth_stencil_state, IntoWgpu};
use super::resources::{
    ConstantRing, PipelineProgram, VariantKey, WgpuResources, CONSTANT_BLOCK_COUNT,
    CONSTANT_BLOCK_SIZE,
};

/// Counters reported after encoding one submission.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct EncodeStats {
    pub(crate) draws: u32,
    pub(crate) dispatches: u32,
    pub(crate) skipped: u32,
}

#[derive(Debug, Default)]
struct BoundState {
    colors: Vec<TextureId>,
    depth: Option<TextureId>,
    viewport: Option<Viewport>,
    rect: Option<ScissorRect>,
    pipeline: Option<PipelineStateId>,
    depth_stencil: Option<DepthStencilState>,
    rasterizer: Option<RasterizerState>,
    blend: Option<BlendState>,
    constant_offset: u32,
}

/// Encodes one command list.
pub(crate) struct CommandEncoder<'a> {
    device: &'a wgpu::Device,
    resources: &'a mut WgpuResources,
    constants: &'a ConstantRing,
    encoder: wgpu::CommandEncoder,
    staged_constants: Vec<u8>,
    bound: BoundState,
    open_markers: usize,
    stats: EncodeStats,
}

impl<'a> CommandEncoder<'a> {
    pub(crate) fn new(
        device: &'a wgpu::Device,
        resources: &'a mut WgpuResources,
        constants: &'a ConstantRing,
        label: &str,
    ) -> Self {
        let encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some(label),
        });
        Self {
            device,
            resources,
            constants,
            encoder,
            staged_constants: Vec::new(),
            bound: BoundState::default(),
            open_markers: 0,
            stats: EncodeStats::default(),
        }
    }

    /// Encodes every command and returns the finished buffer together with
    /// the constant bytes that must be written to the ring before submission.
    pub(crate) fn encode(
        mut self,
        commands: &[Command],
    ) -> (wgpu::CommandBuffer, Vec<u8>, EncodeStats) {
        for command in commands {
            self.apply(command);
        }
        if self.open_markers > 0 {
            log::warn!(
                "Command list closed with {} open debug marker(s)",
                self.open_markers
            );
            for _ in 0..self.open_markers {
                self.encoder.pop_debug_group();
            }
        }
        (self.encoder.finish(), self.staged_constants, self.stats)
    }

    fn apply(&mut self, command: &Command) {
        match command {
            Command::BeginEvent(label) => {
                self.encoder.push_debug_group(label);
                self.open_markers += 1;
            }
            Command::EndEvent => {
                if self.open_markers == 0 {
                    log::warn!("EndEvent without a matching BeginEvent");
                    return;
                }
                self.encoder.pop_debug_group();
                self.open_markers -= 1;
            }
            Command::SetDescriptorHeap(heap) => {
                if !self.resources.heaps.contains_key(heap) {
                    log::warn!("Bound unknown descriptor heap {heap:?}");
                }
            }
            Command::SetViewport(viewport) => self.bound.viewport = Some(*viewport),
            Command::SetRect(rect) => self.bound.rect = Some(*rect),
            Command::SetDepthStencilState(state) => self.bound.depth_stencil = Some(*state),
            Command::SetRasterizerState(state) => self.bound.rasterizer = Some(*state),
            Command::SetBlendState(state) => self.bound.blend = Some(*state),
            Command::SetRenderTargets { colors, depth } => {
                self.bound.colors = colors.clone();
                self.bound.depth = *depth;
            }
            Command::SetPipelineState(pipeline) => self.bound.pipeline = Some(*pipeline),
            Command::SetConstants { slot, data } => self.stage_constants(*slot, data),
            Command::ClearRenderTarget { target, color } => {
                self.clear_color(*target, (*color).into_wgpu())
            }
            Command::ClearDepthStencil {
                target,
                depth,
                stencil,
            } => self.clear_depth(*target, *depth, *stencil),
            Command::Transition { texture, state } => {
                if let Some(entry) = self.resources.textures.get_mut(texture) {
                    entry.state = *state;
                } else {
                    log::warn!("Transition of unknown texture {texture:?}");
                }
            }
            Command::Draw {
                vertex_count,
                instance_count,
                first_vertex,
                first_instance,
            } => self.draw(*vertex_count, *instance_count, *first_vertex, *first_instance),
            Command::Dispatch { x, y, z } => self.dispatch(*x, *y, *z),
            Command::CopyTexture { src, dst } => self.copy_texture(*src, *dst),
            Command::CopyBuffer { src, dst } => self.copy_buffer(*src, *dst),
        }
    }

    fn stage_constants(&mut self, slot: u32, data: &[u8]) {
        if slot != 0 {
            log::debug!("Constants for slot {slot} ignored: only slot 0 is bound");
            return;
        }
        let block = CONSTANT_BLOCK_SIZE as usize;
        let used = self.staged_constants.len() / block;
        if used as u64 >= CONSTANT_BLOCK_COUNT {
            log::warn!("Constant ring full, reusing the last block");
            return;
        }
        if data.len() > block {
            log::warn!(
                "Constants of {} bytes truncated to {block} bytes",
                data.len()
            );
        }
        let offset = self.staged_constants.len();
        self.staged_constants.resize(offset + block, 0);
        let len = data.len().min(block);
        self.staged_constants[offset..offset + len].copy_from_slice(&data[..len]);
        self.bound.constant_offset = offset as u32;
    }

    fn clear_color(&mut self, target: TextureId, color: wgpu::Color) {
        let Some(entry) = self.resources.textures.get(&target) else {
            log::warn!("Clear of unknown render target {target:?}");
            self.stats.skipped += 1;
            return;
        };
        if entry.descriptor.dimension != TextureDimension::D2
            || !entry.descriptor.usage.contains(TextureUsage::RENDER_TARGET)
        {
            log::warn!(
                "Texture '{}' cannot be cleared as a colour target",
                entry.descriptor.label
            );
            self.stats.skipped += 1;
            return;
        }
        let _pass = self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Umbra Clear Color"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &entry.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(color),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
    }

    fn clear_depth(&mut self, target: TextureId, depth: f32, stencil: u32) {
        let Some(entry) = self.resources.textures.get(&target) else {
            log::warn!("Clear of unknown depth target {target:?}");
            self.stats.skipped += 1;
            return;
        };
        let format = entry.descriptor.format;
        if !format.is_depth() || entry.descriptor.dimension != TextureDimension::D2 {
            log::warn!(
                "Texture '{}' cannot be cleared as a depth target",
                entry.descriptor.label
            );
            self.stats.skipped += 1;
            return;
        }
        let stencil_ops = format.has_stencil().then_some(wgpu::Operations {
            load: wgpu::LoadOp::Clear(stencil),
            store: wgpu::StoreOp::Store,
        });
        let _pass = self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Umbra Clear Depth"),
            color_attachments: &[],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &entry.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(depth),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
    }

    /// Size of the first bound target, used to clamp viewport and scissor.
    fn target_extent(&self) -> Option<(u32, u32)> {
        self.bound
            .colors
            .iter()
            .chain(self.bound.depth.iter())
            .find_map(|id| self.resources.textures.get(id))
            .map(|t| (t.descriptor.width, t.descriptor.height))
    }

    /// Compiles the render pipeline variant matching the bound state, if needed.
    fn prepare_variant(&mut self, pipeline: PipelineStateId) -> Option<VariantKey> {
        let mut colors = Vec::with_capacity(self.bound.colors.len());
        for id in &self.bound.colors {
            let entry = self.resources.textures.get(id)?;
            colors.push(entry.descriptor.format);
        }
        let depth = match self.bound.depth {
            Some(id) => Some(self.resources.textures.get(&id)?.descriptor.format),
            None => None,
        };
        let entry = self.resources.pipelines.get_mut(&pipeline)?;
        let key = VariantKey {
            colors,
            depth,
            depth_stencil: self
                .bound
                .depth_stencil
                .unwrap_or(entry.descriptor.depth_stencil),
            rasterizer: self.bound.rasterizer.unwrap_or(entry.descriptor.rasterizer),
            blend: self.bound.blend.unwrap_or(entry.descriptor.blend),
        };
        let PipelineProgram::Graphics { module, variants } = &mut entry.program else {
            return None;
        };
        if !variants.contains_key(&key) {
            let compiled = compile_variant(
                self.device,
                &self.constants.pipeline_layout,
                module,
                &entry.descriptor.label,
                &key,
            );
            log::debug!(
                "Compiled variant {} of pipeline '{}'",
                variants.len() + 1,
                entry.descriptor.label
            );
            variants.insert(key.clone(), compiled);
        }
        Some(key)
    }

    fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) {
        let Some(pipeline) = self.bound.pipeline else {
            log::warn!("Draw without a bound pipeline");
            self.stats.skipped += 1;
            return;
        };
        match self.resources.pipelines.get(&pipeline).map(|p| &p.program) {
            Some(PipelineProgram::Graphics { .. }) => {}
            Some(PipelineProgram::Builtin) => {
                log::trace!("Draw with builtin pipeline {pipeline:?} skipped");
                self.stats.skipped += 1;
                return;
            }
            Some(PipelineProgram::Compute { .. }) | None => {
                log::warn!("Draw with non-graphics pipeline {pipeline:?}");
                self.stats.skipped += 1;
                return;
            }
        }
        let Some(key) = self.prepare_variant(pipeline) else {
            log::warn!("Draw against unknown render targets");
            self.stats.skipped += 1;
            return;
        };
        let extent = self.target_extent();

        let resources = &*self.resources;
        let Some(PipelineProgram::Graphics { variants, .. }) =
            resources.pipelines.get(&pipeline).map(|p| &p.program)
        else {
            return;
        };
        let Some(render_pipeline) = variants.get(&key) else {
            return;
        };
        let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment<'_>>> = self
            .bound
            .colors
            .iter()
            .filter_map(|id| resources.textures.get(id))
            .map(|t| {
                Some(wgpu::RenderPassColorAttachment {
                    view: &t.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })
            })
            .collect();
        let depth_attachment = self
            .bound
            .depth
            .and_then(|id| resources.textures.get(&id))
            .map(|t| wgpu::RenderPassDepthStencilAttachment {
                view: &t.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: t.descriptor.format.has_stencil().then_some(wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                }),
            });

        let mut pass = self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Umbra Draw"),
            color_attachments: &color_attachments,
            depth_stencil_attachment: depth_attachment,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
        pass.set_pipeline(render_pipeline);
        pass.set_bind_group(0, &self.constants.bind_group, &[self.bound.constant_offset]);
        if let Some((width, height)) = extent {
            if let Some(v) = self.bound.viewport {
                let x = v.x.clamp(0.0, width as f32);
                let y = v.y.clamp(0.0, height as f32);
                let w = v.width.clamp(0.0, width as f32 - x);
                let h = v.height.clamp(0.0, height as f32 - y);
                if w > 0.0 && h > 0.0 {
                    pass.set_viewport(x, y, w, h, v.min_depth, v.max_depth);
                }
            }
            if let Some(r) = self.bound.rect {
                let x = r.x.min(width);
                let y = r.y.min(height);
                pass.set_scissor_rect(x, y, r.width.min(width - x), r.height.min(height - y));
            }
        }
        pass.draw(
            first_vertex..first_vertex.saturating_add(vertex_count),
            first_instance..first_instance.saturating_add(instance_count),
        );
        self.stats.draws += 1;
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        let Some(pipeline) = self.bound.pipeline else {
            log::warn!("Dispatch without a bound pipeline");
            self.stats.skipped += 1;
            return;
        };
        let compute = match self.resources.pipelines.get(&pipeline).map(|p| &p.program) {
            Some(PipelineProgram::Compute { pipeline }) => pipeline,
            Some(PipelineProgram::Builtin) => {
                log::trace!("Dispatch with builtin pipeline {pipeline:?} skipped");
                self.stats.skipped += 1;
                return;
            }
            Some(PipelineProgram::Graphics { .. }) | None => {
                log::warn!("Dispatch with non-compute pipeline {pipeline:?}");
                self.stats.skipped += 1;
                return;
            }
        };
        let mut pass = self.encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Umbra Dispatch"),
            timestamp_writes: None,
        });
        pass.set_pipeline(compute);
        pass.set_bind_group(0, &self.constants.bind_group, &[self.bound.constant_offset]);
        pass.dispatch_workgroups(x, y, z);
        self.stats.dispatches += 1;
    }

    fn copy_texture(&mut self, src: TextureId, dst: TextureId) {
        let (Some(s), Some(d)) = (
            self.resources.textures.get(&src),
            self.resources.textures.get(&dst),
        ) else {
            log::warn!("Copy between unknown textures {src:?} -> {dst:?}");
            self.stats.skipped += 1;
            return;
        };
        let same_shape = s.descriptor.width == d.descriptor.width
            && s.descriptor.height == d.descriptor.height
            && s.descriptor.format == d.descriptor.format
            && s.descriptor.dimension == d.descriptor.dimension;
        if !same_shape {
            log::warn!(
                "Copy from '{}' to '{}' skipped: shapes differ",
                s.descriptor.label,
                d.descriptor.label
            );
            self.stats.skipped += 1;
            return;
        }
        let layers = match s.descriptor.dimension {
            TextureDimension::Cube => 6,
            _ => s.descriptor.depth_or_layers.max(1),
        };
        self.encoder.copy_texture_to_texture(
            s.texture.as_image_copy(),
            d.texture.as_image_copy(),
            wgpu::Extent3d {
                width: s.descriptor.width,
                height: s.descriptor.height,
                depth_or_array_layers: layers,
            },
        );
    }

    fn copy_buffer(&mut self, src: BufferId, dst: BufferId) {
        let (Some(s), Some(d)) = (
            self.resources.buffers.get(&src),
            self.resources.buffers.get(&dst),
        ) else {
            log::warn!("Copy between unknown buffers {src:?} -> {dst:?}");
            self.stats.skipped += 1;
            return;
        };
        let size = s.buffer.size().min(d.buffer.size());
        self.encoder
            .copy_buffer_to_buffer(&s.buffer, 0, &d.buffer, 0, size);
        log::trace!(
            "Copied {size} bytes from '{}' to '{}'",
            s.descriptor.label,
            d.descriptor.label
        );
    }
}

fn compile_variant(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    module: &wgpu::ShaderModule,
    label: &str,
    key: &VariantKey,
) -> wgpu::RenderPipeline {
    let targets: Vec<Option<wgpu::ColorTargetState>> = key
        .colors
        .iter()
        .map(|format| {
            Some(wgpu::ColorTargetState {
                format: (*format).into_wgpu(),
                blend: key.blend.into_wgpu(),
                write_mask: wgpu::ColorWrites::ALL,
            })
        })
        .collect();
    let fragment = (!targets.is_empty()).then(|| wgpu::FragmentState {
        module,
        entry_point: Some(FRAGMENT_ENTRY),
        targets: &targets,
        compilation_options: Default::default(),
    });
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module,
            entry_point: Some(VERTEX_ENTRY),
            buffers: &[],
            compilation_options: Default::default(),
        },
        fragment,
        primitive: key.rasterizer.into_wgpu(),
        depth_stencil: key
            .depth
            .map(|format| depth_stencil_state(key.depth_stencil, key.rasterizer, format)),
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    })
}

/// Compiled variants per pipeline, for diagnostics.
pub(crate) fn variant_counts(resources: &WgpuResources) -> HashMap<PipelineStateId, usize> {
    resources
        .pipelines
        .iter()
        .filter_map(|(id, entry)| match &entry.program {
            PipelineProgram::Graphics { variants, .. } => Some((*id, variants.len())),
            _ => None,
        })
        .collect()
}
