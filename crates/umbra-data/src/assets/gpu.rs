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

use umbra_core::renderer::{BufferId, TextureFormat, TextureId};

/// A texture uploaded to the GPU.
#[derive(Debug, Clone, PartialEq)]
pub struct GpuTexture {
    /// The RHI handle.
    pub id: TextureId,
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// Pixel format.
    pub format: TextureFormat,
    /// The path it was loaded from.
    pub source: String,
}

/// One level of detail of a mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshLod {
    /// Vertex data.
    pub vertex_buffer: BufferId,
    /// Vertices to draw.
    pub vertex_count: u32,
    /// Switch to the next LOD below this projected screen fraction.
    pub screen_fraction: f32,
}

/// A mesh with at least one LOD, finest first.
#[derive(Debug, Clone, PartialEq)]
pub struct GpuMesh {
    /// Mesh name inside its model.
    pub name: String,
    /// Levels of detail, finest first.
    pub lods: Vec<MeshLod>,
}

impl GpuMesh {
    /// Picks the LOD for an object covering `screen_fraction` of the screen height.
    pub fn select_lod(&self, screen_fraction: f32) -> usize {
        self.lods
            .iter()
            .position(|lod| screen_fraction >= lod.screen_fraction)
            .unwrap_or(self.lods.len().saturating_sub(1))
    }
}

/// A model uploaded to the GPU.
#[derive(Debug, Clone, PartialEq)]
pub struct GpuModel {
    /// Meshes of the model.
    pub meshes: Vec<GpuMesh>,
    /// Radius of the bounding sphere, in model space.
    pub bounding_radius: f32,
    /// The path it was loaded from.
    pub source: String,
}

impl GpuModel {
    /// Every vertex buffer of every LOD.
    pub fn buffers(&self) -> impl Iterator<Item = BufferId> + '_ {
        self.meshes
            .iter()
            .flat_map(|m| m.lods.iter().map(|lod| lod.vertex_buffer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mesh() -> GpuMesh {
        GpuMesh {
            name: "body".into(),
            lods: vec![
                MeshLod { vertex_buffer: BufferId(1), vertex_count: 300, screen_fraction: 0.5 },
                MeshLod { vertex_buffer: BufferId(2), vertex_count: 90, screen_fraction: 0.1 },
                MeshLod { vertex_buffer: BufferId(3), vertex_count: 12, screen_fraction: 0.0 },
            ],
        }
    }

    #[test]
    fn lod_selection_by_screen_fraction() {
        let m = mesh();
        assert_eq!(m.select_lod(0.9), 0);
        assert_eq!(m.select_lod(0.2), 1);
        assert_eq!(m.select_lod(0.01), 2);
    }
}
