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

//! Tiled heightmap terrain.
//!
//! The heightmap is generated on the CPU and uploaded at creation. A compute
//! pass in the prepare list places every tile on the surface; the placements
//! are read back once the prepare list's fence has been waited on.

use bytemuck::{Pod, Zeroable};
use umbra_core::math::Vec3;
use umbra_core::renderer::{
    BlendState, BufferDescriptor, BufferId, BufferUsage, DepthStencilState, PipelineStateDescriptor,
    PipelineStateId, RasterizerState, ResourceError, Rhi, TextureDescriptor, TextureFormat, TextureId,
};
use umbra_data::scene::TerrainSettings;

use crate::render_lane::{GBUFFER_DEPTH_FORMAT, GBUFFER_FORMATS};
use crate::system::{Drawable, FrameContext, OwnedResources, RenderSystem, Updatable};

/// Heightmap samples along one tile edge.
pub const SAMPLES_PER_TILE: u32 = 16;

/// Vertices of one tile mesh: two triangles per heightmap cell.
const TILE_VERTICES: u32 = SAMPLES_PER_TILE * SAMPLES_PER_TILE * 6;

/// Largest tile count along one edge. Keeps the heightmap within the 8192
/// texel limit of the default device limits.
pub const MAX_TILES: u32 = 256;

/// Tiles farther than this many tile sizes from the camera are not drawn.
const DRAW_DISTANCE_TILES: f32 = 6.0;

/// Where the placement pass put one tile.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct TilePlacement {
    /// Centre of the tile on the surface.
    pub center: [f32; 3],
    /// Height range covered by the tile.
    pub height_range: f32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct TerrainConstants {
    camera_position: [f32; 4],
    tiles: u32,
    tile_size: f32,
    height_scale: f32,
    samples_per_tile: u32,
}

/// Deterministic rolling hills in `[0, 1]`.
fn hills(x: f32, z: f32) -> f32 {
    let a = (x * 0.13).sin() * (z * 0.11).cos();
    let b = ((x + z) * 0.071).sin();
    let c = (x * 0.37 - z * 0.29).cos() * 0.25;
    ((a + 0.5 * b + c) / 1.75 * 0.5 + 0.5).clamp(0.0, 1.0)
}

/// The terrain of a scene.
#[derive(Debug)]
pub struct Terrain {
    resources: OwnedResources,
    heightmap: TextureId,
    placement_buffer: BufferId,
    placement_pipeline: PipelineStateId,
    draw_pipeline: PipelineStateId,
    settings: TerrainSettings,
    side: u32,
    heights: Vec<f32>,
    placements: Vec<TilePlacement>,
    camera_position: Vec3,
    visible_tiles: u32,
}

impl Terrain {
    /// Generates and uploads the heightmap for `settings`.
    pub fn new(rhi: &dyn Rhi, settings: &TerrainSettings) -> Result<Self, ResourceError> {
        if settings.tiles == 0 || !settings.tile_size.is_finite() || settings.tile_size <= 0.0 {
            return Err(ResourceError::InvalidDescriptor(format!(
                "terrain needs at least one tile of positive size, got {} x {}",
                settings.tiles, settings.tile_size
            )));
        }
        if settings.tiles > MAX_TILES {
            return Err(ResourceError::InvalidDescriptor(format!(
                "terrain of {0}x{0} tiles exceeds the {MAX_TILES}x{MAX_TILES} limit",
                settings.tiles
            )));
        }
        let side = settings.tiles * SAMPLES_PER_TILE + 1;
        let spacing = settings.tile_size / SAMPLES_PER_TILE as f32;
        let origin = -(settings.tiles as f32 * settings.tile_size) * 0.5;
        let heights: Vec<f32> = (0..side * side)
            .map(|i| {
                let (col, row) = (i % side, i / side);
                hills(origin + col as f32 * spacing, origin + row as f32 * spacing) * settings.height_scale
            })
            .collect();
        let tile_count = (settings.tiles * settings.tiles) as usize;

        let (resources, (heightmap, placement_buffer, placement_pipeline, draw_pipeline)) =
            OwnedResources::create_with("Terrain", rhi, |res| {
                let heightmap = res.texture(
                    rhi,
                    &TextureDescriptor::sampled("terrain.heightmap", side, side, TextureFormat::R32Float),
                )?;
                rhi.write_texture(heightmap, bytemuck::cast_slice(&heights))?;
                let placement_buffer = res.buffer(
                    rhi,
                    &BufferDescriptor {
                        label: "terrain.placements".into(),
                        size: (tile_count * std::mem::size_of::<TilePlacement>()) as u64,
                        usage: BufferUsage::STORAGE | BufferUsage::COPY_DST | BufferUsage::READBACK,
                    },
                )?;
                let placement_pipeline = res.pipeline(rhi, &PipelineStateDescriptor::compute("terrain_placement"))?;
                let draw_pipeline = res.pipeline(
                    rhi,
                    &PipelineStateDescriptor::graphics("terrain", GBUFFER_FORMATS.to_vec(), Some(GBUFFER_DEPTH_FORMAT))
                        .with_states(DepthStencilState::ReadWrite, RasterizerState::CullBack, BlendState::Disabled),
                )?;
                Ok((heightmap, placement_buffer, placement_pipeline, draw_pipeline))
            })?;
        log::info!(
            "Terrain: {0}x{0} tiles of {1} units, heightmap {side}x{side}",
            settings.tiles,
            settings.tile_size
        );

        let mut terrain = Self {
            resources,
            heightmap,
            placement_buffer,
            placement_pipeline,
            draw_pipeline,
            settings: *settings,
            side,
            heights,
            placements: Vec::new(),
            camera_position: Vec3::ZERO,
            visible_tiles: 0,
        };
        let seeds = terrain.seed_placements();
        if let Err(e) = rhi.write_buffer(placement_buffer, 0, bytemuck::cast_slice(&seeds)) {
            terrain.resources.release(rhi);
            return Err(e);
        }
        Ok(terrain)
    }

    fn origin(&self) -> f32 {
        -(self.settings.tiles as f32 * self.settings.tile_size) * 0.5
    }

    /// Tile centres at the sampled surface height, the input of the
    /// placement pass.
    fn seed_placements(&self) -> Vec<TilePlacement> {
        let tiles = self.settings.tiles;
        let size = self.settings.tile_size;
        let origin = self.origin();
        (0..tiles * tiles)
            .map(|i| {
                let x = origin + ((i % tiles) as f32 + 0.5) * size;
                let z = origin + ((i / tiles) as f32 + 0.5) * size;
                TilePlacement {
                    center: [x, self.height_at(x, z), z],
                    height_range: self.settings.height_scale,
                }
            })
            .collect()
    }

    /// The heightmap texture.
    pub fn heightmap(&self) -> TextureId {
        self.heightmap
    }

    /// Tiles along one edge.
    pub fn tiles(&self) -> u32 {
        self.settings.tiles
    }

    /// Half of the terrain edge length.
    pub fn half_extent(&self) -> f32 {
        -self.origin()
    }

    /// Placements read back after the prepare list; empty before.
    pub fn placements(&self) -> &[TilePlacement] {
        &self.placements
    }

    /// Whether the placement readback happened.
    pub fn is_placed(&self) -> bool {
        !self.placements.is_empty()
    }

    /// Tiles drawn by the last Draw.
    pub fn visible_tiles(&self) -> u32 {
        self.visible_tiles
    }

    /// Surface height at world `(x, z)`, bilinearly filtered. Positions
    /// outside the terrain clamp to its border.
    pub fn height_at(&self, x: f32, z: f32) -> f32 {
        let spacing = self.settings.tile_size / SAMPLES_PER_TILE as f32;
        let max = (self.side - 1) as f32;
        let u = ((x - self.origin()) / spacing).clamp(0.0, max);
        let v = ((z - self.origin()) / spacing).clamp(0.0, max);
        let (c0, r0) = (u.floor() as u32, v.floor() as u32);
        let (c1, r1) = ((c0 + 1).min(self.side - 1), (r0 + 1).min(self.side - 1));
        let (fu, fv) = (u - c0 as f32, v - r0 as f32);
        let h = |c: u32, r: u32| self.heights[(r * self.side + c) as usize];
        let top = h(c0, r0) + (h(c1, r0) - h(c0, r0)) * fu;
        let bottom = h(c0, r1) + (h(c1, r1) - h(c0, r1)) * fu;
        top + (bottom - top) * fv
    }

    fn constants(&self) -> TerrainConstants {
        let p = self.camera_position;
        TerrainConstants {
            camera_position: [p.x, p.y, p.z, 1.0],
            tiles: self.settings.tiles,
            tile_size: self.settings.tile_size,
            height_scale: self.settings.height_scale,
            samples_per_tile: SAMPLES_PER_TILE,
        }
    }

    /// Records the placement pass; part of the prepare list.
    pub fn prepare(&self, rhi: &dyn Rhi) {
        rhi.set_pipeline_state(self.placement_pipeline);
        rhi.set_constants(0, bytemuck::bytes_of(&self.constants()));
        rhi.dispatch(self.settings.tiles.div_ceil(8), self.settings.tiles.div_ceil(8), 1);
    }

    /// Reads the placements back. Only valid once the prepare list's fence
    /// has been waited on.
    pub fn on_prepared(&mut self, rhi: &dyn Rhi) -> Result<(), ResourceError> {
        let bytes = rhi.read_buffer(self.placement_buffer)?;
        let floats: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        self.placements = floats
            .chunks_exact(4)
            .map(|f| TilePlacement {
                center: [f[0], f[1], f[2]],
                height_range: f[3],
            })
            .collect();
        log::debug!("Terrain: {} tile placements read back", self.placements.len());
        Ok(())
    }

    fn count_visible_tiles(&self) -> u32 {
        let reach = self.settings.tile_size * DRAW_DISTANCE_TILES;
        let camera = self.camera_position;
        self.placements
            .iter()
            .filter(|tile| {
                let dx = tile.center[0] - camera.x;
                let dz = tile.center[2] - camera.z;
                dx * dx + dz * dz <= reach * reach
            })
            .count() as u32
    }
}

impl Updatable for Terrain {
    fn update(&mut self, frame: &FrameContext<'_>) {
        self.camera_position = frame.camera.position;
        self.visible_tiles = self.count_visible_tiles();
    }
}

impl Drawable for Terrain {
    /// Draws the visible tiles, instanced. Draws nothing before the
    /// placements are read back.
    fn draw(&mut self, frame: &FrameContext<'_>) {
        if self.visible_tiles == 0 {
            return;
        }
        let rhi = frame.rhi;
        rhi.set_pipeline_state(self.draw_pipeline);
        rhi.set_constants(0, bytemuck::bytes_of(&self.constants()));
        rhi.draw(TILE_VERTICES, self.visible_tiles, 0, 0);
    }
}

impl RenderSystem for Terrain {
    fn name(&self) -> &'static str {
        "Terrain"
    }

    fn release(&mut self, rhi: &dyn Rhi) {
        self.placements.clear();
        self.resources.release(rhi);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::test_support::{rhi, submit};
    use approx::assert_relative_eq;
    use umbra_core::renderer::Camera;

    fn settings() -> TerrainSettings {
        TerrainSettings {
            tiles: 4,
            tile_size: 16.0,
            height_scale: 10.0,
        }
    }

    #[test]
    fn heights_stay_in_range_and_interpolate() {
        let rhi = rhi();
        let terrain = Terrain::new(rhi.as_ref(), &settings()).unwrap();
        assert_relative_eq!(terrain.half_extent(), 32.0);
        for (x, z) in [(-40.0, 0.0), (0.0, 0.0), (13.3, -7.1), (31.9, 31.9)] {
            let h = terrain.height_at(x, z);
            assert!((0.0..=10.0).contains(&h), "{h} out of range at ({x}, {z})");
        }
        // sample points are exact
        assert_relative_eq!(terrain.height_at(-32.0, -32.0), hills(-32.0, -32.0) * 10.0, epsilon = 1e-4);
        assert_eq!(rhi.texture_uploads(terrain.heightmap()), Some(1));
    }

    #[test]
    fn placements_are_read_back_after_the_prepare_list() {
        let rhi = rhi();
        let mut terrain = Terrain::new(rhi.as_ref(), &settings()).unwrap();
        assert!(!terrain.is_placed());
        submit(rhi.as_ref(), |rhi| terrain.prepare(rhi));
        terrain.on_prepared(rhi.as_ref()).unwrap();
        assert_eq!(terrain.placements().len(), 16);
        let first = terrain.placements()[0];
        assert_relative_eq!(first.center[0], -24.0);
        assert_relative_eq!(first.center[1], terrain.height_at(-24.0, -24.0));

        let camera = Camera::new(Vec3::new(0.0, 5.0, 0.0), 0.0, 0.0, 1.0);
        submit(rhi.as_ref(), |rhi| {
            let frame = FrameContext {
                rhi,
                time: Default::default(),
                camera: &camera,
            };
            terrain.update(&frame);
            terrain.draw(&frame);
        });
        assert_eq!(terrain.visible_tiles(), 16);
        assert_eq!(rhi.total_dispatches(), 1);
        assert_eq!(rhi.total_draws(), 1);
    }

    #[test]
    fn oversized_terrain_is_rejected() {
        let rhi = rhi();
        let before = rhi.live_resource_counts();
        let mut huge = settings();
        huge.tiles = 4096;
        assert!(matches!(
            Terrain::new(rhi.as_ref(), &huge),
            Err(ResourceError::InvalidDescriptor(_))
        ));
        assert_eq!(rhi.live_resource_counts(), before);
    }

    #[test]
    fn empty_terrain_is_rejected() {
        let rhi = rhi();
        let mut bad = settings();
        bad.tiles = 0;
        assert!(matches!(
            Terrain::new(rhi.as_ref(), &bad),
            Err(ResourceError::InvalidDescriptor(_))
        ));
    }
}
