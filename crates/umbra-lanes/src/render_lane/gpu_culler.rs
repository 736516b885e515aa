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

//! Frustum culling of the scene objects.
//!
//! Object bounds are uploaded every frame and a compute pass writes the
//! visibility buffer consumed by indirect draws; the same test runs on the
//! CPU so the geometry buffer pass knows which objects to record.

use bytemuck::{Pod, Zeroable};
use umbra_core::math::{Mat4, Vec3, Vec4};
use umbra_core::renderer::{
    BufferDescriptor, BufferId, BufferUsage, PipelineStateDescriptor, PipelineStateId,
    ResourceError, Rhi,
};
use umbra_data::Scene;

use crate::system::{OwnedResources, RenderSystem};

const GROUP_SIZE: u32 = 64;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct GpuBounds {
    center_radius: [f32; 4],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct CullConstants {
    planes: [[f32; 4]; 6],
    object_count: u32,
    _pad: [u32; 3],
}

/// The six planes of a view frustum, normals pointing inwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    planes: [Vec4; 6],
}

impl Frustum {
    /// Extracts the planes of a `[0, 1]` depth-range projection.
    pub fn from_view_projection(m: &Mat4) -> Self {
        let (r0, r1, r2, r3) = (m.get_row(0), m.get_row(1), m.get_row(2), m.get_row(3));
        let normalize = |p: Vec4| {
            let len = p.truncate().length();
            if len > 0.0 {
                p * (1.0 / len)
            } else {
                p
            }
        };
        Self {
            planes: [
                normalize(r3 + r0),
                normalize(r3 + r0 * -1.0),
                normalize(r3 + r1),
                normalize(r3 + r1 * -1.0),
                normalize(r2),
                normalize(r3 + r2 * -1.0),
            ],
        }
    }

    /// Whether a sphere touches the frustum.
    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        self.planes
            .iter()
            .all(|p| p.truncate().dot(center) + p.w >= -radius)
    }
}

/// Per-object visibility of the last cull, in scene order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Visibility {
    flags: Vec<bool>,
    all: bool,
}

impl Visibility {
    /// Everything visible; used before the first cull.
    pub fn all() -> Self {
        Self {
            flags: Vec::new(),
            all: true,
        }
    }

    /// Whether object `index` survived the cull.
    pub fn is_visible(&self, index: usize) -> bool {
        self.all || self.flags.get(index).copied().unwrap_or(false)
    }

    /// Objects that survived.
    pub fn visible_count(&self) -> usize {
        self.flags.iter().filter(|v| **v).count()
    }
}

/// Culls scene objects against the camera frustum.
#[derive(Debug)]
pub struct GpuCuller {
    resources: OwnedResources,
    bounds: BufferId,
    visibility_buffer: BufferId,
    pipeline: PipelineStateId,
    capacity: usize,
    visibility: Visibility,
}

impl GpuCuller {
    /// Creates buffers sized for `object_count` objects.
    pub fn new(rhi: &dyn Rhi, object_count: usize) -> Result<Self, ResourceError> {
        let capacity = object_count.max(1);
        let (resources, (bounds, visibility_buffer, pipeline)) =
            OwnedResources::create_with("GpuCuller", rhi, |res| {
                let bounds = res.buffer(
                    rhi,
                    &BufferDescriptor {
                        label: "culler.bounds".into(),
                        size: (capacity * std::mem::size_of::<GpuBounds>()) as u64,
                        usage: BufferUsage::STORAGE | BufferUsage::COPY_DST,
                    },
                )?;
                let visibility_buffer = res.buffer(
                    rhi,
                    &BufferDescriptor {
                        label: "culler.visibility".into(),
                        size: (capacity * 4) as u64,
                        usage: BufferUsage::STORAGE | BufferUsage::INDIRECT | BufferUsage::READBACK,
                    },
                )?;
                let pipeline = res.pipeline(rhi, &PipelineStateDescriptor::compute("gpu_culling"))?;
                Ok((bounds, visibility_buffer, pipeline))
            })?;
        Ok(Self {
            resources,
            bounds,
            visibility_buffer,
            pipeline,
            capacity,
            visibility: Visibility::all(),
        })
    }

    /// Uploads the bounds of `scene`, dispatches the cull and returns the
    /// visibility. Objects without a loaded model are never visible.
    pub fn cull(&mut self, rhi: &dyn Rhi, scene: &Scene, view_projection: &Mat4) -> &Visibility {
        let frustum = Frustum::from_view_projection(view_projection);
        let mut bounds = Vec::with_capacity(scene.object_count());
        let mut flags = Vec::with_capacity(scene.object_count());
        for object in scene.objects() {
            match object.bounding_sphere() {
                Some((center, radius)) => {
                    bounds.push(GpuBounds {
                        center_radius: [center.x, center.y, center.z, radius],
                    });
                    flags.push(frustum.intersects_sphere(center, radius));
                }
                None => {
                    bounds.push(GpuBounds {
                        center_radius: [0.0, 0.0, 0.0, -1.0],
                    });
                    flags.push(false);
                }
            }
        }

        let uploaded = bounds.len().min(self.capacity);
        if uploaded < bounds.len() {
            log::warn!(
                "GpuCuller sized for {} objects, scene has {}",
                self.capacity,
                bounds.len()
            );
        }
        if uploaded > 0 {
            if let Err(e) = rhi.write_buffer(self.bounds, 0, bytemuck::cast_slice(&bounds[..uploaded])) {
                log::warn!("GpuCuller failed to upload bounds: {e}");
            }
            let planes = frustum.planes.map(|p| [p.x, p.y, p.z, p.w]);
            let constants = CullConstants {
                planes,
                object_count: uploaded as u32,
                _pad: [0; 3],
            };
            rhi.set_pipeline_state(self.pipeline);
            rhi.set_constants(0, bytemuck::bytes_of(&constants));
            rhi.dispatch((uploaded as u32).div_ceil(GROUP_SIZE), 1, 1);
        }

        self.visibility = Visibility { flags, all: false };
        &self.visibility
    }

    /// The visibility of the last cull.
    pub fn visibility(&self) -> &Visibility {
        &self.visibility
    }

    /// The buffer the compute pass writes visibility into.
    pub fn visibility_buffer(&self) -> BufferId {
        self.visibility_buffer
    }
}

impl RenderSystem for GpuCuller {
    fn name(&self) -> &'static str {
        "GpuCuller"
    }

    fn release(&mut self, rhi: &dyn Rhi) {
        self.resources.release(rhi);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_lane::material::tests::{model, scene};
    use crate::system::test_support::{rhi, submit};
    use umbra_core::renderer::Camera;

    #[test]
    fn frustum_keeps_objects_in_front() {
        let camera = Camera::new(Vec3::ZERO, 0.0, 0.0, 1.0);
        let frustum = Frustum::from_view_projection(&camera.view_projection());
        let ahead = camera.forward() * 10.0;
        assert!(frustum.intersects_sphere(ahead, 1.0));
        assert!(!frustum.intersects_sphere(ahead * -1.0, 1.0));
        // straddling the near plane still counts
        assert!(frustum.intersects_sphere(Vec3::ZERO, 0.5));
    }

    #[test]
    fn cull_marks_objects_without_model_invisible() {
        let rhi = rhi();
        let mut scene = scene();
        for object in scene.objects_mut() {
            if object.name() == "rock" {
                object.set_model(Some(model(1)));
            }
        }
        let mut culler = GpuCuller::new(rhi.as_ref(), scene.object_count()).unwrap();
        assert!(culler.visibility().is_visible(1));

        let camera = Camera::new(Vec3::new(0.0, 0.0, 5.0), 0.0, 0.0, 1.0);
        let rock_ahead = Frustum::from_view_projection(&camera.view_projection())
            .intersects_sphere(Vec3::new(0.0, 0.0, -5.0), 1.0);
        submit(rhi.as_ref(), |rhi| {
            let visibility = culler.cull(rhi, &scene, &camera.view_projection());
            // objects iterate by name: rock, tree
            assert_eq!(visibility.is_visible(0), rock_ahead);
            assert!(!visibility.is_visible(1));
        });
        assert_eq!(rhi.total_dispatches(), 1);
    }
}
