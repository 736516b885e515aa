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

//! Froxel-based volumetric fog.
//!
//! Fog is injected into a camera-aligned froxel volume by a compute pass,
//! then integrated and blended over the HDR scene colour.

use bytemuck::{Pod, Zeroable};
use umbra_core::renderer::{
    BlendState, DepthStencilState, PipelineStateDescriptor, PipelineStateId, RasterizerState,
    ResourceError, ResourceState, Rhi, TextureDescriptor, TextureId,
};
use umbra_core::QualitySettings;

use crate::render_lane::HDR_FORMAT;
use crate::system::{FrameContext, OwnedResources, RenderSystem, Updatable};

/// Screen pixels covered by one froxel column.
pub const FROXEL_TILE: u32 = 8;
/// Depth slices of the froxel volume.
pub const FROXEL_SLICES: u32 = 64;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
struct FogConstants {
    view_projection: [f32; 16],
    camera_position: [f32; 4],
    steps: u32,
    density: f32,
    time: f32,
    _pad: f32,
}

/// The fog volume and its passes.
#[derive(Debug)]
pub struct VolumetricFog {
    resources: OwnedResources,
    froxels: TextureId,
    inject_pipeline: PipelineStateId,
    apply_pipeline: PipelineStateId,
    extent: (u32, u32, u32),
    enabled: bool,
    steps: u32,
    density: f32,
    constants: FogConstants,
}

impl VolumetricFog {
    /// Creates the froxel volume. The pass only draws when both the scene
    /// and the quality settings enable fog.
    pub fn new(rhi: &dyn Rhi, quality: &QualitySettings, scene_fog: bool) -> Result<Self, ResourceError> {
        let extent = (
            quality.width.div_ceil(FROXEL_TILE),
            quality.height.div_ceil(FROXEL_TILE),
            FROXEL_SLICES,
        );
        let (resources, (froxels, inject_pipeline, apply_pipeline)) =
            OwnedResources::create_with("VolumetricFog", rhi, |res| {
                let froxels = res.texture(
                    rhi,
                    &TextureDescriptor::volume("fog.froxels", extent.0, extent.1, extent.2, HDR_FORMAT),
                )?;
                let inject_pipeline = res.pipeline(rhi, &PipelineStateDescriptor::compute("fog_inject"))?;
                let apply_pipeline = res.pipeline(
                    rhi,
                    &PipelineStateDescriptor::graphics("volumetric_fog", vec![HDR_FORMAT], None).with_states(
                        DepthStencilState::Disabled,
                        RasterizerState::CullNone,
                        BlendState::AlphaBlend,
                    ),
                )?;
                Ok((froxels, inject_pipeline, apply_pipeline))
            })?;
        let enabled = scene_fog && quality.fog_enabled();
        log::info!("VolumetricFog: enabled={enabled}, {}x{}x{} froxels", extent.0, extent.1, extent.2);
        Ok(Self {
            resources,
            froxels,
            inject_pipeline,
            apply_pipeline,
            extent,
            enabled,
            steps: quality.fog_steps(),
            density: 0.02,
            constants: FogConstants::default(),
        })
    }

    /// Whether the pass draws anything.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Froxels along x, y and depth.
    pub fn extent(&self) -> (u32, u32, u32) {
        self.extent
    }

    /// Sets the base extinction density; negative values clamp to zero.
    pub fn set_density(&mut self, density: f32) {
        self.density = density.max(0.0);
    }

    /// Injects the fog and blends it over `hdr`. Returns whether anything
    /// was drawn.
    pub fn draw(&self, rhi: &dyn Rhi, hdr: TextureId) -> bool {
        if !self.enabled {
            return false;
        }
        let (x, y, z) = self.extent;
        rhi.transition_resource(self.froxels, ResourceState::UnorderedAccess);
        rhi.set_pipeline_state(self.inject_pipeline);
        rhi.set_constants(0, bytemuck::bytes_of(&self.constants));
        rhi.dispatch(x.div_ceil(8), y.div_ceil(8), z);
        rhi.transition_resource(self.froxels, ResourceState::ShaderResource);

        rhi.transition_resource(hdr, ResourceState::RenderTarget);
        rhi.set_render_targets(&[hdr], None);
        rhi.set_pipeline_state(self.apply_pipeline);
        rhi.draw(3, 1, 0, 0);
        true
    }
}

impl Updatable for VolumetricFog {
    fn update(&mut self, frame: &FrameContext<'_>) {
        let camera = frame.camera;
        let p = camera.position;
        self.constants = FogConstants {
            view_projection: camera.view_projection().to_cols_array(),
            camera_position: [p.x, p.y, p.z, 1.0],
            steps: self.steps,
            density: self.density,
            time: frame.time.total as f32,
            _pad: 0.0,
        };
    }
}

impl RenderSystem for VolumetricFog {
    fn name(&self) -> &'static str {
        "VolumetricFog"
    }

    fn release(&mut self, rhi: &dyn Rhi) {
        self.resources.release(rhi);
    }
}
