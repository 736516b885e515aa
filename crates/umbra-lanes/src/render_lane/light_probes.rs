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

//! Baked global light probes.
//!
//! The probes are baked into a volume on the first Draw and again whenever
//! the sun rotates or the camera leaves the baked region. A rotation only
//! marks the probes dirty; the bake itself runs on the next Draw.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use bytemuck::{Pod, Zeroable};
use umbra_core::event::Subscription;
use umbra_core::math::Vec3;
use umbra_core::renderer::{
    DirectionalLight, PipelineStateDescriptor, PipelineStateId, ResourceError, ResourceState, Rhi,
    TextureDescriptor, TextureId,
};
use umbra_core::QualitySettings;

use super::illumination::Illumination;
use super::post_processing::HDR_FORMAT;
use crate::system::{FrameContext, OwnedResources, RenderSystem, Updatable};

/// World units between two probes.
pub const PROBE_SPACING: f32 = 4.0;

const BAKE_WORKGROUP: u32 = 4;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct BakeConstants {
    origin: [f32; 4],
    sun_direction: [f32; 4],
    grid: u32,
    spacing: f32,
    _pad: [u32; 2],
}

/// Owns the probe volume and decides when it must be baked again.
#[derive(Debug)]
pub struct LightProbesManager {
    resources: OwnedResources,
    volume: TextureId,
    pipeline: PipelineStateId,
    grid: u32,
    enabled: bool,
    origin: Vec3,
    sun_direction: Arc<Mutex<Vec3>>,
    dirty: Arc<AtomicBool>,
    ready: bool,
    bakes: u64,
    _rotation: Subscription,
}

impl LightProbesManager {
    /// Creates the probe volume, registers it with `illumination` and
    /// subscribes to `light`'s rotation.
    pub fn new(
        rhi: &dyn Rhi,
        quality: &QualitySettings,
        illumination: &mut Illumination,
        light: &DirectionalLight,
    ) -> Result<Self, ResourceError> {
        let grid = quality.gi_probe_grid();
        let (resources, (volume, pipeline)) = OwnedResources::create_with("LightProbesManager", rhi, |res| {
            let volume = res.texture(rhi, &TextureDescriptor::volume("light_probes.volume", grid, grid, grid, HDR_FORMAT))?;
            let pipeline = res.pipeline(rhi, &PipelineStateDescriptor::compute("probe_bake"))?;
            Ok((volume, pipeline))
        })?;
        illumination.register_probe_volume(volume);

        let sun_direction = Arc::new(Mutex::new(light.direction()));
        let dirty = Arc::new(AtomicBool::new(true));
        let rotation = {
            let sun_direction = Arc::clone(&sun_direction);
            let dirty = Arc::clone(&dirty);
            light.on_rotation_changed(move |rotation| {
                *sun_direction.lock().unwrap_or_else(PoisonError::into_inner) = rotation.direction;
                dirty.store(true, Ordering::Release);
            })
        };
        log::info!("LightProbesManager: {grid}^3 probes every {PROBE_SPACING} units");

        Ok(Self {
            resources,
            volume,
            pipeline,
            grid,
            enabled: quality.gi > 0,
            origin: Vec3::ZERO,
            sun_direction,
            dirty,
            ready: false,
            bakes: 0,
            _rotation: rotation,
        })
    }

    /// Whether the probes follow the camera; off at the lowest GI quality.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// The baked probe volume.
    pub fn volume(&self) -> TextureId {
        self.volume
    }

    /// Corner of the baked region.
    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    /// Number of bakes recorded so far.
    pub fn bake_count(&self) -> u64 {
        self.bakes
    }

    /// Whether the probes were baked and nothing invalidated them since.
    pub fn are_global_probes_ready(&self) -> bool {
        self.ready && !self.dirty.load(Ordering::Acquire)
    }

    /// Forces a bake on the next Draw.
    pub fn invalidate(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    fn region_extent(&self) -> f32 {
        self.grid as f32 * PROBE_SPACING
    }

    /// Records a bake if the probes are dirty. Returns whether one was
    /// recorded.
    pub fn compute_or_load(&mut self, rhi: &dyn Rhi) -> bool {
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return false;
        }
        let sun = *self.sun_direction.lock().unwrap_or_else(PoisonError::into_inner);
        let constants = BakeConstants {
            origin: [self.origin.x, self.origin.y, self.origin.z, 0.0],
            sun_direction: [sun.x, sun.y, sun.z, 0.0],
            grid: self.grid,
            spacing: PROBE_SPACING,
            _pad: [0; 2],
        };
        let groups = self.grid.div_ceil(BAKE_WORKGROUP);
        rhi.begin_event("probe_bake");
        rhi.transition_resource(self.volume, ResourceState::UnorderedAccess);
        rhi.set_pipeline_state(self.pipeline);
        rhi.set_constants(0, bytemuck::bytes_of(&constants));
        rhi.dispatch(groups, groups, groups);
        rhi.transition_resource(self.volume, ResourceState::ShaderResource);
        rhi.end_event();
        self.ready = true;
        self.bakes += 1;
        log::debug!("LightProbesManager: bake #{} around {:?}", self.bakes, self.origin);
        true
    }
}

impl Updatable for LightProbesManager {
    /// Re-centres the baked region when the camera gets within a quarter of
    /// its edge.
    fn update(&mut self, frame: &FrameContext<'_>) {
        if !self.enabled {
            return;
        }
        let extent = self.region_extent();
        let half = extent * 0.5;
        let center = self.origin + Vec3::new(half, half, half);
        let offset = frame.camera.position - center;
        if offset.x.abs().max(offset.y.abs()).max(offset.z.abs()) > extent * 0.25 {
            let p = frame.camera.position;
            let snap = |v: f32| (v / PROBE_SPACING).round() * PROBE_SPACING - half;
            self.origin = Vec3::new(snap(p.x), snap(p.y), snap(p.z));
            self.invalidate();
        }
    }
}

impl RenderSystem for LightProbesManager {
    fn name(&self) -> &'static str {
        "LightProbesManager"
    }

    fn release(&mut self, rhi: &dyn Rhi) {
        self.ready = false;
        self.resources.release(rhi);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_lane::shadow_mapper::ShadowMapper;
    use crate::system::test_support::{quality, rhi, submit};
    use umbra_core::renderer::Camera;

    #[test]
    fn bakes_once_then_again_after_the_sun_rotates() {
        let rhi = rhi();
        let mut light = DirectionalLight::default();
        let q = quality(1);
        let shadows = ShadowMapper::new(rhi.as_ref(), &q, &light).unwrap();
        let mut illumination = Illumination::new(rhi.as_ref(), &q, &shadows, &light).unwrap();
        let mut probes = LightProbesManager::new(rhi.as_ref(), &q, &mut illumination, &light).unwrap();
        assert_eq!(illumination.probe_volume(), Some(probes.volume()));
        assert!(!probes.are_global_probes_ready());

        submit(rhi.as_ref(), |rhi| {
            assert!(probes.compute_or_load(rhi));
            assert!(!probes.compute_or_load(rhi));
        });
        assert!(probes.are_global_probes_ready());
        assert_eq!(probes.bake_count(), 1);

        light.rotate(Vec3::X, 0.3);
        assert!(!probes.are_global_probes_ready());
        submit(rhi.as_ref(), |rhi| {
            assert!(probes.compute_or_load(rhi));
        });
        assert_eq!(probes.bake_count(), 2);
        assert_eq!(rhi.total_dispatches(), 2);
    }

    #[test]
    fn camera_far_from_the_region_recentres_it() {
        let rhi = rhi();
        let light = DirectionalLight::default();
        let q = quality(1);
        let shadows = ShadowMapper::new(rhi.as_ref(), &q, &light).unwrap();
        let mut illumination = Illumination::new(rhi.as_ref(), &q, &shadows, &light).unwrap();
        let mut probes = LightProbesManager::new(rhi.as_ref(), &q, &mut illumination, &light).unwrap();
        submit(rhi.as_ref(), |rhi| {
            probes.compute_or_load(rhi);
        });

        let camera = Camera::new(Vec3::new(200.0, 0.0, 0.0), 0.0, 0.0, 16.0 / 9.0);
        let frame = FrameContext {
            rhi: rhi.as_ref(),
            time: Default::default(),
            camera: &camera,
        };
        probes.update(&frame);
        assert!(!probes.are_global_probes_ready());
        let extent = 8.0 * PROBE_SPACING;
        assert!((probes.origin().x + extent * 0.5 - 200.0).abs() <= PROBE_SPACING);

        let origin = probes.origin();
        submit(rhi.as_ref(), |rhi| {
            probes.compute_or_load(rhi);
        });
        probes.update(&frame);
        assert_eq!(probes.origin(), origin);
        assert!(probes.are_global_probes_ready());
    }
}
