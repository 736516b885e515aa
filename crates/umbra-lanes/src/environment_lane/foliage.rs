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

//! Instanced foliage scattered over the scene's foliage zones.

use std::f32::consts::TAU;

use bytemuck::{Pod, Zeroable};
use umbra_core::math::Vec3;
use umbra_core::renderer::{
    BlendState, BufferDescriptor, BufferId, BufferUsage, DepthStencilState, PipelineStateDescriptor,
    PipelineStateId, RasterizerState, ResourceError, Rhi,
};
use umbra_core::QualitySettings;
use umbra_data::scene::FoliageZone;

use super::terrain::Terrain;
use super::wind::Wind;
use crate::render_lane::{GBUFFER_DEPTH_FORMAT, GBUFFER_FORMATS};
use crate::system::{Drawable, FrameContext, OwnedResources, RenderSystem};

/// Upper bound of instances in one zone.
pub const MAX_INSTANCES_PER_ZONE: u32 = 4096;

/// Vertices of one blade cluster.
const CLUSTER_VERTICES: u32 = 3 * 6;

/// One placed foliage instance.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct FoliageInstance {
    /// World position of the base.
    pub position: [f32; 3],
    /// Uniform scale.
    pub scale: f32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
struct FoliageConstants {
    wind: [f32; 4],
    time: f32,
    _pad: [f32; 3],
}

/// Instances a zone holds at `density_scale`.
pub fn zone_instance_count(zone: &FoliageZone, density_scale: f32) -> u32 {
    let area = std::f32::consts::PI * zone.radius.max(0.0).powi(2);
    let count = (area * zone.density.max(0.0) * density_scale).round();
    (count as u32).min(MAX_INSTANCES_PER_ZONE)
}

/// SplitMix64 step; a stable per-instance random stream.
fn mix(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}

fn unit(x: u64) -> f32 {
    (x >> 40) as f32 / (1u64 << 24) as f32
}

/// Places the instances of one zone. The same zone always yields the same
/// instances.
pub fn scatter(zone_index: usize, zone: &FoliageZone, count: u32, terrain: Option<&Terrain>) -> Vec<FoliageInstance> {
    (0..count)
        .map(|i| {
            let seed = mix(((zone_index as u64) << 32) | u64::from(i));
            let r = zone.radius * unit(seed).sqrt();
            let angle = TAU * unit(mix(seed));
            let x = zone.center.x + r * angle.cos();
            let z = zone.center.z + r * angle.sin();
            let y = terrain.map_or(zone.center.y, |t| t.height_at(x, z));
            FoliageInstance {
                position: [x, y, z],
                scale: 0.75 + 0.5 * unit(mix(seed ^ 0xF0F0)),
            }
        })
        .collect()
}

/// Owns the foliage instances and draws them in the geometry buffer pass.
#[derive(Debug)]
pub struct FoliageManager {
    resources: OwnedResources,
    instance_buffer: BufferId,
    pipeline: PipelineStateId,
    zones: Vec<FoliageZone>,
    counts: Vec<u32>,
    instances: Vec<FoliageInstance>,
    constants: FoliageConstants,
}

impl FoliageManager {
    /// Sizes the instance buffer for `zones` at the quality's density.
    pub fn new(rhi: &dyn Rhi, quality: &QualitySettings, zones: &[FoliageZone]) -> Result<Self, ResourceError> {
        let density = quality.foliage_density();
        let counts: Vec<u32> = zones.iter().map(|z| zone_instance_count(z, density)).collect();
        let capacity = counts.iter().sum::<u32>().max(1);
        let (resources, (instance_buffer, pipeline)) = OwnedResources::create_with("FoliageManager", rhi, |res| {
            let instance_buffer = res.buffer(
                rhi,
                &BufferDescriptor {
                    label: "foliage.instances".into(),
                    size: u64::from(capacity) * std::mem::size_of::<FoliageInstance>() as u64,
                    usage: BufferUsage::VERTEX | BufferUsage::COPY_DST,
                },
            )?;
            let pipeline = res.pipeline(
                rhi,
                &PipelineStateDescriptor::graphics("foliage", GBUFFER_FORMATS.to_vec(), Some(GBUFFER_DEPTH_FORMAT))
                    .with_states(DepthStencilState::ReadWrite, RasterizerState::CullNone, BlendState::Disabled),
            )?;
            Ok((instance_buffer, pipeline))
        })?;
        log::info!("FoliageManager: {} zones, up to {capacity} instances", zones.len());
        Ok(Self {
            resources,
            instance_buffer,
            pipeline,
            zones: zones.to_vec(),
            counts,
            instances: Vec::new(),
            constants: FoliageConstants::default(),
        })
    }

    /// Scatters the instances, on `terrain` when there is one, and uploads
    /// them. Runs after the prepare list so terrain placement is known.
    pub fn place(&mut self, rhi: &dyn Rhi, terrain: Option<&Terrain>) -> Result<usize, ResourceError> {
        self.instances = self
            .zones
            .iter()
            .zip(&self.counts)
            .enumerate()
            .flat_map(|(index, (zone, count))| scatter(index, zone, *count, terrain))
            .collect();
        if !self.instances.is_empty() {
            rhi.write_buffer(self.instance_buffer, 0, bytemuck::cast_slice(&self.instances))?;
        }
        log::debug!("FoliageManager: placed {} instances", self.instances.len());
        Ok(self.instances.len())
    }

    /// The placed instances.
    pub fn instances(&self) -> &[FoliageInstance] {
        &self.instances
    }

    /// Bends the foliage along the wind.
    pub fn update(&mut self, frame: &FrameContext<'_>, wind: &Wind) {
        let w = wind.sample(frame.time.total);
        self.constants = FoliageConstants {
            wind: [w.x, w.y, w.z, 0.0],
            time: frame.time.total as f32,
            _pad: [0.0; 3],
        };
    }

    /// The wind bend pushed with the last draw.
    pub fn wind_bend(&self) -> Vec3 {
        let [x, y, z, _] = self.constants.wind;
        Vec3::new(x, y, z)
    }
}

impl Drawable for FoliageManager {
    fn draw(&mut self, frame: &FrameContext<'_>) {
        if self.instances.is_empty() {
            return;
        }
        let rhi = frame.rhi;
        rhi.set_pipeline_state(self.pipeline);
        rhi.set_constants(0, bytemuck::bytes_of(&self.constants));
        rhi.draw(CLUSTER_VERTICES, self.instances.len() as u32, 0, 0);
    }
}

impl RenderSystem for FoliageManager {
    fn name(&self) -> &'static str {
        "FoliageManager"
    }

    fn release(&mut self, rhi: &dyn Rhi) {
        self.instances.clear();
        self.resources.release(rhi);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::test_support::{quality, rhi, submit};
    use umbra_core::renderer::Camera;
    use umbra_core::FrameTime;
    use umbra_data::scene::{TerrainSettings, WindSettings};

    fn zone() -> FoliageZone {
        FoliageZone {
            center: Vec3::new(10.0, 2.0, -5.0),
            radius: 4.0,
            density: 2.0,
        }
    }

    #[test]
    fn density_follows_quality() {
        assert_eq!(zone_instance_count(&zone(), 0.0), 0);
        assert_eq!(zone_instance_count(&zone(), 1.0), 101);
        let huge = FoliageZone {
            radius: 1000.0,
            ..zone()
        };
        assert_eq!(zone_instance_count(&huge, 1.0), MAX_INSTANCES_PER_ZONE);
    }

    #[test]
    fn scatter_is_deterministic_and_stays_in_the_zone() {
        let a = scatter(0, &zone(), 50, None);
        let b = scatter(0, &zone(), 50, None);
        assert_eq!(a, b);
        assert_ne!(a, scatter(1, &zone(), 50, None));
        for instance in &a {
            let [x, y, z] = instance.position;
            assert!(((x - 10.0).powi(2) + (z + 5.0).powi(2)).sqrt() <= 4.0 + 1e-4);
            assert_eq!(y, 2.0);
        }
    }

    #[test]
    fn placed_on_terrain_and_drawn_instanced() {
        let rhi = rhi();
        let terrain = Terrain::new(
            rhi.as_ref(),
            &TerrainSettings {
                tiles: 2,
                tile_size: 32.0,
                height_scale: 5.0,
            },
        )
        .unwrap();
        let mut foliage = FoliageManager::new(rhi.as_ref(), &quality(3), &[zone()]).unwrap();
        let placed = foliage.place(rhi.as_ref(), Some(&terrain)).unwrap();
        assert_eq!(placed, 101);
        for instance in foliage.instances() {
            let [x, y, z] = instance.position;
            assert!((y - terrain.height_at(x, z)).abs() < 1e-5);
        }

        let wind = Wind::new(&WindSettings {
            direction: Vec3::X,
            strength: 1.0,
            gust_frequency: 0.0,
        });
        let camera = Camera::default();
        submit(rhi.as_ref(), |rhi| {
            let frame = FrameContext {
                rhi,
                time: FrameTime {
                    total: 1.0,
                    delta: 0.016,
                    frame_index: 60,
                },
                camera: &camera,
            };
            foliage.update(&frame, &wind);
            foliage.draw(&frame);
        });
        assert_eq!(foliage.wind_bend(), Vec3::X);
        assert_eq!(rhi.total_draws(), 1);
    }
}
