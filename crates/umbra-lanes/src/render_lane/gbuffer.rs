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

//! The geometry buffer: albedo, normals, material parameters, velocity and
//! depth of the opaque scene.

use bytemuck::{Pod, Zeroable};
use umbra_core::math::{LinearRgba, Mat4, Vec3};
use umbra_core::renderer::{
    Camera, ResourceError, ResourceState, Rhi, ScissorRect, TextureDescriptor, TextureFormat,
    TextureId, Viewport,
};
use umbra_core::QualitySettings;
use umbra_data::{RenderingObject, Scene};

use super::gpu_culler::Visibility;
use super::material::{CallbackKey, DrawContext, MaterialCallbacks, MaterialSystem, GBUFFER_PASS};
use crate::system::{FrameContext, OwnedResources, RenderSystem, Updatable};

/// Formats of the colour targets: albedo, normal, material, velocity.
pub const GBUFFER_FORMATS: [TextureFormat; 4] = [
    TextureFormat::Rgba8UnormSrgb,
    TextureFormat::Rgba16Float,
    TextureFormat::Rgba8Unorm,
    TextureFormat::Rg16Float,
];

/// Format of the depth target.
pub const GBUFFER_DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
struct CameraConstants {
    view_projection: [f32; 16],
    previous_view_projection: [f32; 16],
    position: [f32; 4],
}

/// Fraction of the screen height covered by a sphere.
pub fn screen_fraction(camera_position: Vec3, tan_half_fov: f32, center: Vec3, radius: f32) -> f32 {
    let distance = (center - camera_position).length();
    if distance <= radius {
        return 1.0;
    }
    (radius / (distance * tan_half_fov.max(1e-4))).clamp(0.0, 1.0)
}

/// The geometry buffer targets and the opaque object pass.
#[derive(Debug)]
pub struct GBuffer {
    resources: OwnedResources,
    colors: [TextureId; 4],
    depth: TextureId,
    width: u32,
    height: u32,
    camera: CameraConstants,
    view_projection: Mat4,
    camera_position: Vec3,
    tan_half_fov: f32,
    objects_drawn: usize,
}

impl GBuffer {
    /// Creates the targets at the quality resolution.
    pub fn new(rhi: &dyn Rhi, quality: &QualitySettings) -> Result<Self, ResourceError> {
        let (width, height) = (quality.width, quality.height);
        let (resources, (colors, depth)) = OwnedResources::create_with("GBuffer", rhi, |res| {
            let names = ["albedo", "normal", "material", "velocity"];
            let mut colors = [TextureId::INVALID; 4];
            for (i, format) in GBUFFER_FORMATS.iter().enumerate() {
                let label = format!("gbuffer.{}", names[i]);
                colors[i] = res.texture(rhi, &TextureDescriptor::render_target(label, width, height, *format))?;
            }
            let depth = res.texture(
                rhi,
                &TextureDescriptor::render_target("gbuffer.depth", width, height, GBUFFER_DEPTH_FORMAT),
            )?;
            Ok((colors, depth))
        })?;
        log::info!("GBuffer created at {width}x{height}");

        let camera = Camera::default();
        Ok(Self {
            resources,
            colors,
            depth,
            width,
            height,
            camera: CameraConstants::default(),
            view_projection: camera.view_projection(),
            camera_position: camera.position,
            tan_half_fov: (camera.fov_y * 0.5).tan(),
            objects_drawn: 0,
        })
    }

    /// The four colour targets, in [`GBUFFER_FORMATS`] order.
    pub fn color_targets(&self) -> [TextureId; 4] {
        self.colors
    }

    /// The albedo target.
    pub fn albedo(&self) -> TextureId {
        self.colors[0]
    }

    /// The normal target.
    pub fn normal(&self) -> TextureId {
        self.colors[1]
    }

    /// The depth target.
    pub fn depth(&self) -> TextureId {
        self.depth
    }

    /// Resolution of the targets.
    pub fn extent(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// World-to-clip matrix of the current frame.
    pub fn view_projection(&self) -> Mat4 {
        self.view_projection
    }

    /// Objects drawn by the last [`draw_objects`](Self::draw_objects).
    pub fn objects_drawn(&self) -> usize {
        self.objects_drawn
    }

    /// Puts the targets in their sampled state; recorded in the prepare list.
    pub fn prepare(&self, rhi: &dyn Rhi) {
        for target in self.colors {
            rhi.transition_resource(target, ResourceState::ShaderResource);
        }
        rhi.transition_resource(self.depth, ResourceState::DepthRead);
    }

    /// Binds and clears the targets.
    pub fn begin(&self, rhi: &dyn Rhi) {
        for target in self.colors {
            rhi.transition_resource(target, ResourceState::RenderTarget);
            rhi.clear_render_target(target, LinearRgba::TRANSPARENT);
        }
        rhi.transition_resource(self.depth, ResourceState::DepthWrite);
        rhi.clear_depth_stencil_target(self.depth, 1.0, 0);
        rhi.set_render_targets(&self.colors, Some(self.depth));
        rhi.set_viewport(Viewport::full(self.width, self.height));
        rhi.set_rect(ScissorRect::full(self.width, self.height));
        rhi.set_constants(1, bytemuck::bytes_of(&self.camera));
    }

    fn draw_object(
        &self,
        rhi: &dyn Rhi,
        object: &RenderingObject,
        materials: &MaterialSystem,
        callbacks: &MaterialCallbacks,
    ) -> bool {
        let (Some(model), Some(pipeline)) = (object.model(), materials.pipeline_for(object, GBUFFER_PASS)) else {
            return false;
        };
        let fraction = object
            .bounding_sphere()
            .map(|(center, radius)| screen_fraction(self.camera_position, self.tan_half_fov, center, radius))
            .unwrap_or(0.0);
        rhi.set_pipeline_state(pipeline);
        for (mesh_index, mesh) in model.meshes.iter().enumerate() {
            let lod = mesh.select_lod(fraction);
            let Some(level) = mesh.lods.get(lod) else {
                continue;
            };
            let ctx = DrawContext {
                object,
                view_projection: self.view_projection,
                lod,
            };
            callbacks.prepare(
                rhi,
                &CallbackKey::new(object.name(), GBUFFER_PASS, mesh_index, lod),
                &ctx,
            );
            rhi.draw(level.vertex_count, 1, 0, 0);
        }
        true
    }

    /// Draws every visible object with a loaded model and a geometry buffer
    /// material. Returns how many were drawn.
    pub fn draw_objects(
        &mut self,
        rhi: &dyn Rhi,
        scene: &Scene,
        visibility: &Visibility,
        materials: &MaterialSystem,
        callbacks: &MaterialCallbacks,
    ) -> usize {
        let drawn = scene
            .objects()
            .enumerate()
            .filter(|(index, _)| visibility.is_visible(*index))
            .filter(|(_, object)| self.draw_object(rhi, object, materials, callbacks))
            .count();
        log::trace!("GBuffer drew {drawn} objects");
        self.objects_drawn = drawn;
        drawn
    }

    /// Leaves the targets readable by the lighting passes.
    pub fn end(&self, rhi: &dyn Rhi) {
        for target in self.colors {
            rhi.transition_resource(target, ResourceState::ShaderResource);
        }
        rhi.transition_resource(self.depth, ResourceState::DepthRead);
    }
}

impl Updatable for GBuffer {
    fn update(&mut self, frame: &FrameContext<'_>) {
        let view_projection = frame.camera.view_projection();
        self.camera = CameraConstants {
            view_projection: view_projection.to_cols_array(),
            previous_view_projection: self.view_projection.to_cols_array(),
            position: [
                frame.camera.position.x,
                frame.camera.position.y,
                frame.camera.position.z,
                1.0,
            ],
        };
        self.view_projection = view_projection;
        self.camera_position = frame.camera.position;
        self.tan_half_fov = (frame.camera.fov_y * 0.5).tan();
    }
}

impl RenderSystem for GBuffer {
    fn name(&self) -> &'static str {
        "GBuffer"
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
    fn screen_fraction_grows_when_closer() {
        let far = screen_fraction(Vec3::ZERO, 0.5, Vec3::new(0.0, 0.0, -100.0), 1.0);
        let near = screen_fraction(Vec3::ZERO, 0.5, Vec3::new(0.0, 0.0, -4.0), 1.0);
        assert!(near > far);
        assert_relative_eq!(near, 0.5);
        assert_relative_eq!(screen_fraction(Vec3::ZERO, 0.5, Vec3::ZERO, 1.0), 1.0);
    }

    #[test]
    fn draws_visible_objects_with_models() {
        let rhi = rhi();
        let mut scene = scene();
        for object in scene.objects_mut() {
            if object.name() == "rock" {
                object.set_model(Some(model(2)));
            }
        }
        let materials = MaterialSystem::build(rhi.as_ref(), &scene).unwrap();
        let mut callbacks = MaterialCallbacks::new();
        for object in scene.objects() {
            callbacks.register_standard(object);
        }
        let mut gbuffer = GBuffer::new(rhi.as_ref(), &quality(1)).unwrap();
        let camera = Camera::default();
        submit(rhi.as_ref(), |rhi| {
            gbuffer.update(&FrameContext {
                rhi,
                time: Default::default(),
                camera: &camera,
            });
            gbuffer.begin(rhi);
            let drawn = gbuffer.draw_objects(rhi, &scene, &Visibility::all(), &materials, &callbacks);
            gbuffer.end(rhi);
            // the tree has no model
            assert_eq!(drawn, 1);
        });
        assert_eq!(callbacks.invocations(), 1);
        assert_eq!(rhi.total_draws(), 1);
        assert_eq!(
            rhi.texture_state(gbuffer.albedo()),
            Some(ResourceState::ShaderResource)
        );
    }
}
