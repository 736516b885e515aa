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

//! Wireframe gizmos for the sun and the point lights, drawn over the
//! geometry buffer albedo.

use std::sync::{Arc, Mutex, PoisonError};

use bytemuck::{Pod, Zeroable};
use umbra_core::event::Subscription;
use umbra_core::math::{LinearRgba, Vec3};
use umbra_core::renderer::{
    BlendState, DepthStencilState, DirectionalLight, PipelineStateDescriptor, PipelineStateId,
    PointLight, RasterizerState, ResourceError, ResourceState, Rhi,
};

use super::gbuffer::{GBuffer, GBUFFER_DEPTH_FORMAT, GBUFFER_FORMATS};
use crate::system::{OwnedResources, RenderSystem};

/// Vertices of the wire sphere drawn around a point light.
const SPHERE_VERTICES: u32 = 3 * 32 * 2;
/// Vertices of the sun direction arrow.
const ARROW_VERTICES: u32 = 6;

const SELECTED: LinearRgba = LinearRgba::rgb(1.0, 0.8, 0.1);

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct GizmoConstants {
    center_scale: [f32; 4],
    color: [f32; 4],
}

/// Draws light proxies for inspection.
#[derive(Debug)]
pub struct DebugGizmos {
    resources: OwnedResources,
    pipeline: PipelineStateId,
    proxies: Vec<GizmoConstants>,
    sun_direction: Arc<Mutex<Vec3>>,
    _rotation: Subscription,
}

impl DebugGizmos {
    /// Compiles the wireframe pipeline and follows `light`'s rotation.
    pub fn new(rhi: &dyn Rhi, light: &DirectionalLight) -> Result<Self, ResourceError> {
        let (resources, pipeline) = OwnedResources::create_with("DebugGizmos", rhi, |res| {
            res.pipeline(
                rhi,
                &PipelineStateDescriptor::graphics("debug_gizmo", vec![GBUFFER_FORMATS[0]], Some(GBUFFER_DEPTH_FORMAT))
                    .with_states(DepthStencilState::ReadOnly, RasterizerState::Wireframe, BlendState::Disabled),
            )
        })?;
        let sun_direction = Arc::new(Mutex::new(light.direction()));
        let listener = Arc::clone(&sun_direction);
        let rotation = light.on_rotation_changed(move |rotation| {
            *listener.lock().unwrap_or_else(PoisonError::into_inner) = rotation.direction;
        });
        Ok(Self {
            resources,
            pipeline,
            proxies: Vec::new(),
            sun_direction,
            _rotation: rotation,
        })
    }

    /// Direction of the sun arrow.
    pub fn sun_direction(&self) -> Vec3 {
        *self.sun_direction.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Rebuilds the point light proxies.
    pub fn update_proxies(&mut self, lights: &[PointLight]) {
        self.proxies.clear();
        self.proxies.extend(lights.iter().map(|light| {
            let color = if light.selected_in_editor { SELECTED } else { light.color };
            let p = light.position;
            GizmoConstants {
                center_scale: [p.x, p.y, p.z, light.radius],
                color: color.to_array(),
            }
        }));
    }

    /// Number of point light proxies.
    pub fn proxy_count(&self) -> usize {
        self.proxies.len()
    }

    /// Draws the sun arrow and every proxy. Returns the number of gizmos.
    pub fn draw(&self, rhi: &dyn Rhi, gbuffer: &GBuffer) -> usize {
        let albedo = gbuffer.albedo();
        rhi.transition_resource(albedo, ResourceState::RenderTarget);
        rhi.set_render_targets(&[albedo], Some(gbuffer.depth()));
        rhi.set_pipeline_state(self.pipeline);

        let sun = self.sun_direction();
        let arrow = GizmoConstants {
            center_scale: [sun.x, sun.y, sun.z, 0.0],
            color: LinearRgba::WHITE.to_array(),
        };
        rhi.set_constants(0, bytemuck::bytes_of(&arrow));
        rhi.draw(ARROW_VERTICES, 1, 0, 0);
        for proxy in &self.proxies {
            rhi.set_constants(0, bytemuck::bytes_of(proxy));
            rhi.draw(SPHERE_VERTICES, 1, 0, 0);
        }
        rhi.set_rasterizer_state(RasterizerState::CullBack);
        rhi.transition_resource(albedo, ResourceState::ShaderResource);
        1 + self.proxies.len()
    }
}

impl RenderSystem for DebugGizmos {
    fn name(&self) -> &'static str {
        "DebugGizmos"
    }

    fn release(&mut self, rhi: &dyn Rhi) {
        self.proxies.clear();
        self.resources.release(rhi);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::test_support::{quality, rhi, submit};
    use approx::assert_relative_eq;

    #[test]
    fn follows_the_sun_and_draws_one_proxy_per_light() {
        let rhi = rhi();
        let mut light = DirectionalLight::default();
        let mut gizmos = DebugGizmos::new(rhi.as_ref(), &light).unwrap();
        light.set_direction(Vec3::new(0.0, -1.0, 0.0));
        assert_relative_eq!(gizmos.sun_direction().y, -1.0, epsilon = 1e-5);

        let mut selected = PointLight::new(Vec3::ZERO, 2.0, LinearRgba::WHITE, 1.0);
        selected.selected_in_editor = true;
        gizmos.update_proxies(&[selected, PointLight::new(Vec3::X, 1.0, LinearRgba::WHITE, 1.0)]);
        assert_eq!(gizmos.proxy_count(), 2);

        let gbuffer = GBuffer::new(rhi.as_ref(), &quality(0)).unwrap();
        submit(rhi.as_ref(), |rhi| {
            assert_eq!(gizmos.draw(rhi, &gbuffer), 3);
        });
        assert_eq!(rhi.total_draws(), 3);
        assert_eq!(rhi.texture_state(gbuffer.albedo()), Some(ResourceState::ShaderResource));
    }
}
