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

//! The sky, drawn behind the opaque geometry.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use umbra_core::math::{Mat4, Vec3};
use umbra_core::renderer::{
    BlendState, DepthStencilState, PipelineStateDescriptor, PipelineStateId, RasterizerState,
    ResourceError, Rhi,
};
use umbra_data::GpuTexture;

use super::gbuffer::{GBUFFER_DEPTH_FORMAT, GBUFFER_FORMATS};
use crate::system::{Drawable, FrameContext, OwnedResources, RenderSystem, Updatable};

/// Radians per second the sky drifts around the vertical axis.
const SKY_DRIFT: f64 = 0.005;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
struct SkyConstants {
    view_projection: [f32; 16],
    sun_direction: [f32; 4],
    rotation: f32,
    _pad: [f32; 3],
}

/// Draws the sky texture where the geometry buffer depth is still clear.
#[derive(Debug)]
pub struct Skybox {
    resources: OwnedResources,
    pipeline: PipelineStateId,
    texture: Arc<GpuTexture>,
    sun_direction: Vec3,
    rotation: f64,
    constants: SkyConstants,
}

impl Skybox {
    /// Creates the sky pass sampling `texture`.
    pub fn new(rhi: &dyn Rhi, texture: Arc<GpuTexture>) -> Result<Self, ResourceError> {
        let (resources, pipeline) = OwnedResources::create_with("Skybox", rhi, |res| {
            res.pipeline(
                rhi,
                &PipelineStateDescriptor::graphics("skybox", GBUFFER_FORMATS.to_vec(), Some(GBUFFER_DEPTH_FORMAT))
                    .with_states(DepthStencilState::ReadOnly, RasterizerState::CullNone, BlendState::Disabled),
            )
        })?;
        log::info!("Skybox using '{}'", texture.source);
        Ok(Self {
            resources,
            pipeline,
            texture,
            sun_direction: Vec3::new(0.0, -1.0, 0.0),
            rotation: 0.0,
            constants: SkyConstants::default(),
        })
    }

    /// The sky texture.
    pub fn texture(&self) -> &Arc<GpuTexture> {
        &self.texture
    }

    /// Follows the sun, for the sky's sun disc.
    pub fn track_sun(&mut self, direction: Vec3) {
        self.sun_direction = direction;
    }

    /// Current drift angle, in radians.
    pub fn rotation(&self) -> f64 {
        self.rotation
    }
}

impl Updatable for Skybox {
    fn update(&mut self, frame: &FrameContext<'_>) {
        self.rotation = (self.rotation + frame.time.delta * SKY_DRIFT) % std::f64::consts::TAU;
        // translation-free view: the sky stays at infinity
        let forward = frame.camera.forward();
        let view = Mat4::look_at_rh(Vec3::ZERO, forward, Vec3::Y).unwrap_or(Mat4::IDENTITY);
        let d = self.sun_direction;
        self.constants = SkyConstants {
            view_projection: (frame.camera.projection() * view).to_cols_array(),
            sun_direction: [d.x, d.y, d.z, 0.0],
            rotation: self.rotation as f32,
            _pad: [0.0; 3],
        };
    }
}

impl Drawable for Skybox {
    fn draw(&mut self, frame: &FrameContext<'_>) {
        let rhi = frame.rhi;
        rhi.set_pipeline_state(self.pipeline);
        rhi.set_depth_stencil_state(DepthStencilState::ReadOnly);
        rhi.set_constants(0, bytemuck::bytes_of(&self.constants));
        rhi.draw(3, 1, 0, 0);
        rhi.set_depth_stencil_state(DepthStencilState::ReadWrite);
    }
}

impl RenderSystem for Skybox {
    fn name(&self) -> &'static str {
        "Skybox"
    }

    fn release(&mut self, rhi: &dyn Rhi) {
        self.resources.release(rhi);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::test_support::{rhi, submit};
    use approx::assert_relative_eq;
    use umbra_core::renderer::{Camera, TextureFormat, TextureId};
    use umbra_core::FrameTime;

    fn sky() -> Arc<GpuTexture> {
        Arc::new(GpuTexture {
            id: TextureId(1),
            width: 1,
            height: 1,
            format: TextureFormat::Rgba8UnormSrgb,
            source: "sky.png".into(),
        })
    }

    #[test]
    fn drifts_with_time_and_draws_one_triangle() {
        let rhi = rhi();
        let mut skybox = Skybox::new(rhi.as_ref(), sky()).unwrap();
        let camera = Camera::default();
        submit(rhi.as_ref(), |rhi| {
            let frame = FrameContext {
                rhi,
                time: FrameTime {
                    total: 2.0,
                    delta: 2.0,
                    frame_index: 1,
                },
                camera: &camera,
            };
            skybox.update(&frame);
            skybox.draw(&frame);
        });
        assert_relative_eq!(skybox.rotation(), 2.0 * SKY_DRIFT);
        assert_eq!(rhi.total_draws(), 1);
    }
}
