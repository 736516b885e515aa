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

//! Cascaded shadow maps of the sun.
//!
//! The cascades live in one depth atlas, two tiles per row. The mapper
//! subscribes to the light's rotation and refits its cascades synchronously,
//! before the rotation setter returns.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytemuck::{Pod, Zeroable};
use umbra_core::event::Subscription;
use umbra_core::math::{Mat4, Vec3};
use umbra_core::renderer::{
    BlendState, DepthStencilState, DirectionalLight, PipelineStateDescriptor, PipelineStateId,
    RasterizerState, ResourceError, ResourceState, Rhi, ScissorRect, TextureDescriptor,
    TextureFormat, TextureId, Viewport,
};
use umbra_core::QualitySettings;
use umbra_data::Scene;

use super::material::{MaterialSystem, SHADOW_PASS};
use crate::system::{FrameContext, OwnedResources, RenderSystem, Updatable};

/// Format of the shadow atlas.
pub const SHADOW_FORMAT: TextureFormat = TextureFormat::Depth32Float;

/// Half extent of the first cascade; each next one is three times larger.
const FIRST_CASCADE_EXTENT: f32 = 8.0;

/// The camera must move this far before the cascades are refitted.
const REFIT_DISTANCE: f32 = 1.0;

/// One cascade of the shadow atlas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowCascade {
    /// World-to-light-clip matrix.
    pub view_projection: Mat4,
    /// Half extent covered, in world units.
    pub extent: f32,
}

/// Fits `count` cascades around `focus` for a light travelling along `direction`.
pub fn fit_cascades(direction: Vec3, focus: Vec3, count: u32) -> Vec<ShadowCascade> {
    let direction = direction.normalize();
    let up = if direction.y.abs() > 0.99 { Vec3::Z } else { Vec3::Y };
    (0..count)
        .map(|i| {
            let extent = FIRST_CASCADE_EXTENT * 3f32.powi(i as i32);
            let eye = focus - direction * (extent * 2.0);
            let view = Mat4::look_at_rh(eye, focus, up).unwrap_or(Mat4::IDENTITY);
            let projection = Mat4::orthographic_rh_zo(-extent, extent, -extent, extent, 0.1, extent * 4.0);
            ShadowCascade {
                view_projection: projection * view,
                extent,
            }
        })
        .collect()
}

#[derive(Debug)]
struct CascadeState {
    direction: Vec3,
    focus: Vec3,
    count: u32,
    cascades: Vec<ShadowCascade>,
    refits: u64,
}

impl CascadeState {
    fn refit(&mut self) {
        self.cascades = fit_cascades(self.direction, self.focus, self.count);
        self.refits += 1;
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct ShadowConstants {
    light_view_projection: [f32; 16],
    model: [f32; 16],
    cascade: u32,
    _pad: [u32; 3],
}

/// Renders the scene depth from the sun into a cascade atlas.
#[derive(Debug)]
pub struct ShadowMapper {
    resources: OwnedResources,
    atlas: TextureId,
    pipeline: PipelineStateId,
    resolution: u32,
    state: Arc<Mutex<CascadeState>>,
    _rotation: Subscription,
}

impl ShadowMapper {
    /// Creates the atlas and subscribes to `light`'s rotation.
    pub fn new(rhi: &dyn Rhi, quality: &QualitySettings, light: &DirectionalLight) -> Result<Self, ResourceError> {
        let resolution = quality.shadow_map_resolution();
        let count = quality.shadow_cascades();
        let (columns, rows) = Self::atlas_grid(count);
        let (resources, (atlas, pipeline)) = OwnedResources::create_with("ShadowMapper", rhi, |res| {
            let atlas = res.texture(
                rhi,
                &TextureDescriptor::render_target("shadow.atlas", resolution * columns, resolution * rows, SHADOW_FORMAT),
            )?;
            let pipeline = res.pipeline(
                rhi,
                &PipelineStateDescriptor::graphics("shadow_depth", Vec::new(), Some(SHADOW_FORMAT)).with_states(
                    DepthStencilState::ReadWrite,
                    RasterizerState::ShadowDepthBias,
                    BlendState::Disabled,
                ),
            )?;
            Ok((atlas, pipeline))
        })?;

        let mut state = CascadeState {
            direction: light.direction(),
            focus: Vec3::ZERO,
            count,
            cascades: Vec::new(),
            refits: 0,
        };
        state.refit();
        let state = Arc::new(Mutex::new(state));
        let listener = Arc::clone(&state);
        let rotation = light.on_rotation_changed(move |rotation| {
            let mut state = listener.lock().unwrap_or_else(PoisonError::into_inner);
            state.direction = rotation.direction;
            state.refit();
        });
        log::info!("ShadowMapper: {count} cascades at {resolution}px");

        Ok(Self {
            resources,
            atlas,
            pipeline,
            resolution,
            state,
            _rotation: rotation,
        })
    }

    fn atlas_grid(count: u32) -> (u32, u32) {
        if count > 1 {
            (2, count.div_ceil(2))
        } else {
            (1, 1)
        }
    }

    fn state(&self) -> MutexGuard<'_, CascadeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The depth atlas.
    pub fn shadow_map(&self) -> TextureId {
        self.atlas
    }

    /// Side of one cascade tile, in texels.
    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    /// The current cascades, finest first.
    pub fn cascades(&self) -> Vec<ShadowCascade> {
        self.state().cascades.clone()
    }

    /// The light direction the cascades were last fitted to.
    pub fn light_direction(&self) -> Vec3 {
        self.state().direction
    }

    /// How many times the cascades were fitted.
    pub fn refit_count(&self) -> u64 {
        self.state().refits
    }

    /// Puts the atlas in its sampled state; recorded in the prepare list.
    pub fn prepare(&self, rhi: &dyn Rhi) {
        rhi.transition_resource(self.atlas, ResourceState::DepthRead);
    }

    /// Renders every object with a loaded model into each cascade. Objects
    /// with a shadow material use its pipeline, others the default one.
    pub fn draw(&self, rhi: &dyn Rhi, scene: &Scene, materials: &MaterialSystem) -> usize {
        let cascades = self.cascades();
        let (columns, _) = Self::atlas_grid(cascades.len() as u32);
        rhi.transition_resource(self.atlas, ResourceState::DepthWrite);
        rhi.set_render_targets(&[], Some(self.atlas));
        rhi.clear_depth_stencil_target(self.atlas, 1.0, 0);
        rhi.set_rasterizer_state(RasterizerState::ShadowDepthBias);

        let mut draws = 0;
        for (index, cascade) in cascades.iter().enumerate() {
            let (x, y) = (index as u32 % columns, index as u32 / columns);
            let mut viewport = Viewport::full(self.resolution, self.resolution);
            viewport.x = (x * self.resolution) as f32;
            viewport.y = (y * self.resolution) as f32;
            rhi.set_viewport(viewport);
            rhi.set_rect(ScissorRect {
                x: x * self.resolution,
                y: y * self.resolution,
                width: self.resolution,
                height: self.resolution,
            });
            for object in scene.objects() {
                let Some(model) = object.model() else {
                    continue;
                };
                let pipeline = materials
                    .pipeline_for(object, SHADOW_PASS)
                    .unwrap_or(self.pipeline);
                rhi.set_pipeline_state(pipeline);
                let constants = ShadowConstants {
                    light_view_projection: cascade.view_projection.to_cols_array(),
                    model: object.transform.matrix().to_cols_array(),
                    cascade: index as u32,
                    _pad: [0; 3],
                };
                rhi.set_constants(0, bytemuck::bytes_of(&constants));
                // coarsest LOD is enough for depth
                for mesh in &model.meshes {
                    if let Some(lod) = mesh.lods.last() {
                        rhi.draw(lod.vertex_count, 1, 0, 0);
                        draws += 1;
                    }
                }
            }
        }
        rhi.set_rasterizer_state(RasterizerState::CullBack);
        rhi.transition_resource(self.atlas, ResourceState::DepthRead);
        draws
    }
}

impl Updatable for ShadowMapper {
    fn update(&mut self, frame: &FrameContext<'_>) {
        let position = frame.camera.position;
        let mut state = self.state();
        if (position - state.focus).length() > REFIT_DISTANCE {
            state.focus = Vec3::new(position.x.round(), position.y.round(), position.z.round());
            state.refit();
        }
    }
}

impl RenderSystem for ShadowMapper {
    fn name(&self) -> &'static str {
        "ShadowMapper"
    }

    fn release(&mut self, rhi: &dyn Rhi) {
        self.resources.release(rhi);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_lane::material::tests::{model, scene};
    use crate::system::test_support::{quality, rhi, submit};
    use approx::assert_relative_eq;

    #[test]
    fn cascades_grow_and_look_along_the_light() {
        let cascades = fit_cascades(Vec3::new(0.0, -1.0, 0.0), Vec3::ZERO, 3);
        assert_eq!(cascades.len(), 3);
        assert_relative_eq!(cascades[1].extent, cascades[0].extent * 3.0);
        // the focus projects to the centre of every cascade
        for cascade in &cascades {
            let clip = cascade.view_projection.transform_point(Vec3::ZERO);
            assert_relative_eq!(clip.x, 0.0, epsilon = 1e-4);
            assert_relative_eq!(clip.y, 0.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn rotation_refits_before_the_setter_returns() {
        let rhi = rhi();
        let mut light = DirectionalLight::default();
        let mapper = ShadowMapper::new(rhi.as_ref(), &quality(1), &light).unwrap();
        assert_eq!(light.listener_count(), 1);
        let refits = mapper.refit_count();

        light.set_direction(Vec3::new(1.0, -1.0, 0.0));
        assert_eq!(mapper.refit_count(), refits + 1);
        assert_relative_eq!(mapper.light_direction().x, light.direction().x, epsilon = 1e-5);

        drop(mapper);
        assert_eq!(light.listener_count(), 0);
    }

    #[test]
    fn draws_every_model_in_every_cascade() {
        let rhi = rhi();
        let mut scene = scene();
        for object in scene.objects_mut() {
            object.set_model(Some(model(2)));
        }
        let materials = MaterialSystem::build(rhi.as_ref(), &scene).unwrap();
        let light = DirectionalLight::default();
        let mapper = ShadowMapper::new(rhi.as_ref(), &quality(2), &light).unwrap();
        submit(rhi.as_ref(), |rhi| {
            let draws = mapper.draw(rhi, &scene, &materials);
            assert_eq!(draws, 2 * 3);
        });
        assert_eq!(rhi.total_draws(), 6);
    }
}
