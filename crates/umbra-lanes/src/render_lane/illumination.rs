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

//! Scene lighting: the dynamic global illumination volume, the local
//! (point) light accumulation and the composite into the HDR target.

use bytemuck::{Pod, Zeroable};
use umbra_core::math::{LinearRgba, Mat4};
use umbra_core::renderer::{
    BlendState, DepthStencilState, DirectionalLight, PipelineStateDescriptor, PipelineStateId,
    PointLight, RasterizerState, ResourceError, ResourceState, Rhi, TextureDescriptor, TextureId, Viewport,
};
use umbra_core::QualitySettings;

use super::gbuffer::GBuffer;
use super::post_processing::HDR_FORMAT;
use super::shadow_mapper::ShadowMapper;
use crate::system::{FrameContext, OwnedResources, RenderSystem};

/// Workgroup edge of the GI compute program.
const GI_WORKGROUP: u32 = 4;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
struct SunConstants {
    light_view_projection: [f32; 16],
    direction: [f32; 4],
    radiance: [f32; 4],
    time: f32,
    grid: u32,
    probes_registered: u32,
    _pad: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct PointLightConstants {
    position_radius: [f32; 4],
    radiance: [f32; 4],
}

/// Global and local lighting of the geometry buffer.
#[derive(Debug)]
pub struct Illumination {
    resources: OwnedResources,
    gi_volume: TextureId,
    local_target: TextureId,
    gi_pipeline: PipelineStateId,
    local_pipeline: PipelineStateId,
    composite_pipeline: PipelineStateId,
    shadow_map: TextureId,
    probe_volume: Option<TextureId>,
    grid: u32,
    sun: SunConstants,
    point_lights: Vec<PointLightConstants>,
}

impl Illumination {
    /// Creates the lighting targets. Reads the shadow atlas of `shadows` and
    /// starts lit by `light`.
    pub fn new(
        rhi: &dyn Rhi,
        quality: &QualitySettings,
        shadows: &ShadowMapper,
        light: &DirectionalLight,
    ) -> Result<Self, ResourceError> {
        let grid = quality.gi_probe_grid();
        let (width, height) = (quality.width, quality.height);
        let (resources, (gi_volume, local_target, gi_pipeline, local_pipeline, composite_pipeline)) =
            OwnedResources::create_with("Illumination", rhi, |res| {
                let gi_volume = res.texture(rhi, &TextureDescriptor::volume("illumination.gi", grid, grid, grid, HDR_FORMAT))?;
                let local_target = res.texture(
                    rhi,
                    &TextureDescriptor::render_target("illumination.local", width, height, HDR_FORMAT),
                )?;
                let gi_pipeline = res.pipeline(rhi, &PipelineStateDescriptor::compute("dynamic_gi"))?;
                let local_pipeline = res.pipeline(
                    rhi,
                    &PipelineStateDescriptor::graphics("local_lights", vec![HDR_FORMAT], None).with_states(
                        DepthStencilState::Disabled,
                        RasterizerState::CullNone,
                        BlendState::Additive,
                    ),
                )?;
                let composite_pipeline = res.pipeline(
                    rhi,
                    &PipelineStateDescriptor::graphics("composite_lighting", vec![HDR_FORMAT], None).with_states(
                        DepthStencilState::Disabled,
                        RasterizerState::CullNone,
                        BlendState::Disabled,
                    ),
                )?;
                Ok((gi_volume, local_target, gi_pipeline, local_pipeline, composite_pipeline))
            })?;
        log::info!("Illumination: {grid}^3 GI volume");

        let mut illumination = Self {
            resources,
            gi_volume,
            local_target,
            gi_pipeline,
            local_pipeline,
            composite_pipeline,
            shadow_map: shadows.shadow_map(),
            probe_volume: None,
            grid,
            sun: SunConstants::default(),
            point_lights: Vec::new(),
        };
        illumination.update_sun(light, shadows, 0.0);
        Ok(illumination)
    }

    /// Makes a baked probe volume available to the composite.
    pub fn register_probe_volume(&mut self, volume: TextureId) {
        log::debug!("Illumination: probe volume {volume:?} registered");
        self.probe_volume = Some(volume);
    }

    /// The probe volume registered by the light probes, if any.
    pub fn probe_volume(&self) -> Option<TextureId> {
        self.probe_volume
    }

    /// The dynamic GI volume.
    pub fn gi_volume(&self) -> TextureId {
        self.gi_volume
    }

    /// Probes per axis of the GI volume.
    pub fn grid(&self) -> u32 {
        self.grid
    }

    /// The shadow atlas sampled by the lighting passes.
    pub fn shadow_map(&self) -> TextureId {
        self.shadow_map
    }

    /// Point lights staged for the current frame.
    pub fn staged_lights(&self) -> usize {
        self.point_lights.len()
    }

    fn update_sun(&mut self, light: &DirectionalLight, shadows: &ShadowMapper, time: f32) {
        let cascade = shadows
            .cascades()
            .first()
            .map(|c| c.view_projection)
            .unwrap_or(Mat4::IDENTITY);
        let direction = light.direction();
        let radiance = light.color.scaled(light.intensity);
        self.sun = SunConstants {
            light_view_projection: cascade.to_cols_array(),
            direction: [direction.x, direction.y, direction.z, 0.0],
            radiance: radiance.to_array(),
            time,
            grid: self.grid,
            probes_registered: u32::from(self.probe_volume.is_some()),
            _pad: 0,
        };
    }

    /// Refreshes the sun constants and drops last frame's point lights.
    pub fn update(&mut self, frame: &FrameContext<'_>, light: &DirectionalLight, shadows: &ShadowMapper) {
        self.update_sun(light, shadows, frame.time.total as f32);
        self.point_lights.clear();
    }

    /// Stages one point light for this frame. Lights that cannot contribute
    /// are dropped.
    pub fn stage_point_light(&mut self, light: &PointLight) {
        if light.radius <= 0.0 || light.intensity <= 0.0 {
            return;
        }
        let LinearRgba { r, g, b, .. } = light.color.scaled(light.intensity);
        let p = light.position;
        self.point_lights.push(PointLightConstants {
            position_radius: [p.x, p.y, p.z, light.radius],
            radiance: [r, g, b, 1.0],
        });
    }

    /// Puts the lighting targets in their sampled state; recorded in the
    /// prepare list.
    pub fn prepare(&self, rhi: &dyn Rhi) {
        rhi.transition_resource(self.gi_volume, ResourceState::ShaderResource);
        rhi.transition_resource(self.local_target, ResourceState::ShaderResource);
    }

    /// Injects the sun into the GI volume.
    pub fn draw_global(&self, rhi: &dyn Rhi) {
        let groups = self.grid.div_ceil(GI_WORKGROUP);
        rhi.transition_resource(self.gi_volume, ResourceState::UnorderedAccess);
        rhi.set_pipeline_state(self.gi_pipeline);
        rhi.set_constants(0, bytemuck::bytes_of(&self.sun));
        rhi.dispatch(groups, groups, groups);
        rhi.transition_resource(self.gi_volume, ResourceState::ShaderResource);
    }

    /// Accumulates the staged point lights. Returns how many were drawn.
    pub fn draw_local(&self, rhi: &dyn Rhi, gbuffer: &GBuffer) -> usize {
        let (width, height) = gbuffer.extent();
        rhi.transition_resource(self.local_target, ResourceState::RenderTarget);
        rhi.set_render_targets(&[self.local_target], None);
        rhi.clear_render_target(self.local_target, LinearRgba::BLACK);
        rhi.set_viewport(Viewport::full(width, height));
        rhi.set_pipeline_state(self.local_pipeline);
        for light in &self.point_lights {
            rhi.set_constants(0, bytemuck::bytes_of(light));
            rhi.draw(3, 1, 0, 0);
        }
        rhi.transition_resource(self.local_target, ResourceState::ShaderResource);
        self.point_lights.len()
    }

    /// Combines the geometry buffer, the GI volume and the local lights into
    /// `hdr`, which must already be bound.
    pub fn draw_composite(&self, rhi: &dyn Rhi, hdr: TextureId) {
        rhi.set_render_targets(&[hdr], None);
        rhi.clear_render_target(hdr, LinearRgba::BLACK);
        rhi.set_pipeline_state(self.composite_pipeline);
        rhi.set_constants(0, bytemuck::bytes_of(&self.sun));
        rhi.draw(3, 1, 0, 0);
    }
}

impl RenderSystem for Illumination {
    fn name(&self) -> &'static str {
        "Illumination"
    }

    fn release(&mut self, rhi: &dyn Rhi) {
        self.probe_volume = None;
        self.resources.release(rhi);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::test_support::{quality, rhi, submit};
    use umbra_core::math::Vec3;

    #[test]
    fn only_contributing_point_lights_are_staged() {
        let rhi = rhi();
        let light = DirectionalLight::default();
        let shadows = ShadowMapper::new(rhi.as_ref(), &quality(0), &light).unwrap();
        let mut illumination = Illumination::new(rhi.as_ref(), &quality(0), &shadows, &light).unwrap();

        illumination.stage_point_light(&PointLight::new(Vec3::ZERO, 5.0, LinearRgba::WHITE, 1.0));
        illumination.stage_point_light(&PointLight::new(Vec3::ZERO, 0.0, LinearRgba::WHITE, 1.0));
        illumination.stage_point_light(&PointLight::new(Vec3::ZERO, 5.0, LinearRgba::WHITE, 0.0));
        assert_eq!(illumination.staged_lights(), 1);

        let gbuffer = GBuffer::new(rhi.as_ref(), &quality(0)).unwrap();
        submit(rhi.as_ref(), |rhi| {
            illumination.draw_global(rhi);
            assert_eq!(illumination.draw_local(rhi, &gbuffer), 1);
        });
        assert_eq!(rhi.total_dispatches(), 1);
        assert_eq!(rhi.total_draws(), 1);
        assert_eq!(
            rhi.texture_state(illumination.gi_volume()),
            Some(ResourceState::ShaderResource)
        );
        assert_eq!(rhi.invalid_references(), 0);
    }

    #[test]
    fn registered_probes_are_visible_to_the_composite() {
        let rhi = rhi();
        let light = DirectionalLight::default();
        let shadows = ShadowMapper::new(rhi.as_ref(), &quality(1), &light).unwrap();
        let mut illumination = Illumination::new(rhi.as_ref(), &quality(1), &shadows, &light).unwrap();
        assert_eq!(illumination.grid(), 8);
        assert_eq!(illumination.probe_volume(), None);
        illumination.register_probe_volume(TextureId(42));
        assert_eq!(illumination.probe_volume(), Some(TextureId(42)));
        assert_eq!(illumination.shadow_map(), shadows.shadow_map());
    }
}
