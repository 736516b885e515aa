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

//! GPU objects owned by the wgpu backend, keyed by RHI handle.

use std::collections::HashMap;
use std::num::NonZeroU64;

use umbra_core::renderer::{
    BlendState, BufferDescriptor, BufferId, DepthStencilState, DescriptorAllocator,
    DescriptorHeapDescriptor, DescriptorHeapId, PipelineStateDescriptor, PipelineStateId,
    RasterizerState, ResourceState, TextureDescriptor, TextureFormat, TextureId,
};

/// Bytes reserved per `set_constants` call in the constant ring.
pub(crate) const CONSTANT_BLOCK_SIZE: u64 = 256;
/// Number of constant blocks available to one submission.
pub(crate) const CONSTANT_BLOCK_COUNT: u64 = 1024;

#[derive(Debug)]
pub(crate) struct WgpuTextureEntry {
    pub(crate) texture: wgpu::Texture,
    pub(crate) view: wgpu::TextureView,
    pub(crate) descriptor: TextureDescriptor,
    pub(crate) state: ResourceState,
}

#[derive(Debug)]
pub(crate) struct WgpuBufferEntry {
    pub(crate) buffer: wgpu::Buffer,
    pub(crate) descriptor: BufferDescriptor,
}

#[derive(Debug)]
pub(crate) struct WgpuHeapEntry {
    pub(crate) descriptor: DescriptorHeapDescriptor,
    pub(crate) allocator: DescriptorAllocator,
}

/// Everything a render pipeline is specialised on at draw time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct VariantKey {
    pub(crate) colors: Vec<TextureFormat>,
    pub(crate) depth: Option<TextureFormat>,
    pub(crate) depth_stencil: DepthStencilState,
    pub(crate) rasterizer: RasterizerState,
    pub(crate) blend: BlendState,
}

#[derive(Debug)]
pub(crate) enum PipelineProgram {
    /// Backend-provided program: the pipeline state exists but records no GPU work.
    Builtin,
    Graphics {
        module: wgpu::ShaderModule,
        variants: HashMap<VariantKey, wgpu::RenderPipeline>,
    },
    Compute {
        pipeline: wgpu::ComputePipeline,
    },
}

#[derive(Debug)]
pub(crate) struct WgpuPipelineEntry {
    pub(crate) descriptor: PipelineStateDescriptor,
    pub(crate) program: PipelineProgram,
}

#[derive(Debug, Default)]
pub(crate) struct WgpuResources {
    next_id: u64,
    pub(crate) textures: HashMap<TextureId, WgpuTextureEntry>,
    pub(crate) buffers: HashMap<BufferId, WgpuBufferEntry>,
    pub(crate) heaps: HashMap<DescriptorHeapId, WgpuHeapEntry>,
    pub(crate) pipelines: HashMap<PipelineStateId, WgpuPipelineEntry>,
}

impl WgpuResources {
    pub(crate) fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub(crate) fn counts(&self) -> [usize; 4] {
        [
            self.textures.len(),
            self.buffers.len(),
            self.heaps.len(),
            self.pipelines.len(),
        ]
    }
}

/// The uniform ring behind `set_constants`, bound at group 0, binding 0
/// with a dynamic offset.
#[derive(Debug)]
pub(crate) struct ConstantRing {
    pub(crate) pipeline_layout: wgpu::PipelineLayout,
    pub(crate) buffer: wgpu::Buffer,
    pub(crate) bind_group: wgpu::BindGroup,
}

impl ConstantRing {
    pub(crate) fn new(device: &wgpu::Device) -> Self {
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Umbra Constants Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX
                    | wgpu::ShaderStages::FRAGMENT
                    | wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Umbra Constants Pipeline Layout"),
            bind_group_layouts: &[Some(&layout)],
            immediate_size: 0,
        });
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Umbra Constant Ring"),
            size: CONSTANT_BLOCK_SIZE * CONSTANT_BLOCK_COUNT,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Umbra Constants"),
            layout: &layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: NonZeroU64::new(CONSTANT_BLOCK_SIZE),
                }),
            }],
        });
        Self {
            pipeline_layout,
            buffer,
            bind_group,
        }
    }
}
