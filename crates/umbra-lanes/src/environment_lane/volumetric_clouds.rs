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

//! Raymarched volumetric clouds over the HDR scene colour.

use bytemuck::{Pod, Zeroable};
use umbra_core::math::Vec3;
use umbra_core::renderer::{
    BlendState, DepthStencilState, PipelineStateDescriptor, PipelineStateId, RasterizerState,
    ResourceError, ResourceState, Rhi, TextureDescriptor, TextureFormat, TextureId,
};
use umbra_core::QualitySettings;

use super::wind::Wind;
use crate::render_lane::HDR_FORMAT;
use crate::system::{FrameContext, OwnedResources, RenderSystem};

/// Edge of the tiling cloud noise volume.
pub const NOISE_SIZE: u32 = 64;

/// Altitude of the cloud layer base.
const CLOUD_BASE: f32 = 1500.0;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
struct CloudConstants {
    offset: [f32; 4],
    sun_direction: [f32; 4],
    steps: u32,
    base: f32,
    time: f32,
    _pad: f32,
}

/// The cloud layer.
#[derive(Debug)]
pub struct VolumetricClouds {
    resources: OwnedResources,
    noise: TextureId,
    noise_pipeline: PipelineStateId,
    march_pipeline: PipelineStateId,
    enabled: bool,
    steps: u32,
    offset: Vec3,
    constants: CloudConstants,
}

impl VolumetricClouds {
    /// Creates the noise volume and the raymarch pipeline.
    pub fn new(rhi: &dyn Rhi, quality: &QualitySettings) -> Result<Self, ResourceError> {
        let (resources, (noise, noise_pipeline, march_pipeline)) =
            OwnedResources::create_with("VolumetricClouds", rhi, |res| {
                let noise = res.texture(
                    rhi,
                    &TextureDescriptor::volume("clouds.noise", NOISE_SIZE, NOISE_SIZE, NOISE_SIZE, TextureFormat::Rgba8Unorm),
                )?;
                let noise_pipeline = res.pipeline(rhi, &PipelineStateDescriptor::compute("cloud_noise"))?;
                let march_pipeline = res.pipeline(
                    rhi,
                    &PipelineStateDescriptor::graphics("volumetric_clouds", vec![HDR_FORMAT], None).with_states(
                        DepthStencilState::Disabled,
                        RasterizerState::CullNone,
                        BlendState::Premultiplied,
                    ),
                )?;
                Ok((noise, noise_pipeline, march_pipeline))
            })?;
        let enabled = quality.clouds_enabled();
        let steps = quality.cloud_steps();
        log::info!("VolumetricClouds: enabled={enabled}, {steps} steps");
        Ok(Self {
            resources,
            noise,
            noise_pipeline,
            march_pipeline,
            enabled,
            steps,
            offset: Vec3::ZERO,
            constants: CloudConstants::default(),
        })
    }

    /// Whether the pass draws anything.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// How far the wind has carried the clouds.
    pub fn offset(&self) -> Vec3 {
        self.offset
    }

    /// Generates the noise volume; part of the prepare list.
    pub fn prepare(&self, rhi: &dyn Rhi) {
        let groups = NOISE_SIZE / 4;
        rhi.transition_resource(self.noise, ResourceState::UnorderedAccess);
        rhi.set_pipeline_state(self.noise_pipeline);
        rhi.dispatch(groups, groups, groups);
        rhi.transition_resource(self.noise, ResourceState::ShaderResource);
    }

    /// Advects the clouds with the wind and follows the sun.
    pub fn update(&mut self, frame: &FrameContext<'_>, wind: &Wind, sun_direction: Vec3) {
        self.offset = self.offset + wind.sample(frame.time.total) * frame.time.delta as f32;
        self.constants = CloudConstants {
            offset: [self.offset.x, self.offset.y, self.offset.z, 0.0],
            sun_direction: [sun_direction.x, sun_direction.y, sun_direction.z, 0.0],
            steps: self.steps,
            base: CLOUD_BASE,
            time: frame.time.total as f32,
            _pad: 0.0,
        };
    }

    /// Blends the clouds over `hdr`. Returns whether anything was drawn.
    pub fn draw(&self, rhi: &dyn Rhi, hdr: TextureId) -> bool {
        if !self.enabled {
            return false;
        }
        rhi.transition_resource(hdr, ResourceState::RenderTarget);
        rhi.set_render_targets(&[hdr], None);
        rhi.set_pipeline_state(self.march_pipeline);
        rhi.set_constants(0, bytemuck::bytes_of(&self.constants));
        rhi.draw(3, 1, 0, 0);
        true
    }
}

impl RenderSystem for VolumetricClouds {
    fn name(&self) -> &'static str {
        "VolumetricClouds"
    }

    fn release(&mut self, rhi: &dyn Rhi) {
        self.resources.release(rhi);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_lane::PostProcessingStack;
    use crate::system::test_support::{quality, rhi, submit};
    use approx::assert_relative_eq;
    use umbra_core::renderer::Camera;
    use umbra_core::FrameTime;
    use umbra_data::scene::WindSettings;

    #[test]
    fn wind_carries_the_clouds() {
        let rhi = rhi();
        let mut clouds = VolumetricClouds::new(rhi.as_ref(), &quality(2)).unwrap();
        let wind = Wind::new(&WindSettings {
            direction: Vec3::Z,
            strength: 10.0,
            gust_frequency: 0.0,
        });
        let camera = Camera::default();
        for i in 1..=10 {
            let frame = FrameContext {
                rhi: rhi.as_ref(),
                time: FrameTime {
                    total: f64::from(i) * 0.5,
                    delta: 0.5,
                    frame_index: i as u64,
                },
                camera: &camera,
            };
            clouds.update(&frame, &wind, Vec3::new(0.0, -1.0, 0.0));
        }
        assert_relative_eq!(clouds.offset().z, 50.0, epsilon = 1e-3);
    }

    #[test]
    fn lowest_quality_skips_the_pass() {
        let rhi = rhi();
        let post = PostProcessingStack::new(rhi.as_ref(), &quality(0)).unwrap();
        let off = VolumetricClouds::new(rhi.as_ref(), &quality(0)).unwrap();
        let on = VolumetricClouds::new(rhi.as_ref(), &quality(1)).unwrap();
        submit(rhi.as_ref(), |rhi| {
            off.prepare(rhi);
            assert!(!off.draw(rhi, post.hdr_target()));
            assert!(on.draw(rhi, post.hdr_target()));
        });
        assert_eq!(rhi.total_dispatches(), 1);
        assert_eq!(rhi.total_draws(), 1);
    }
}
