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

//! Procedural model generation and upload.
//!
//! A model file is a small JSON document naming primitive meshes:
//!
//! ```json
//! { "meshes": [ { "name": "body", "shape": "sphere", "size": 2.0, "lods": 3 } ] }
//! ```
//!
//! Each mesh is generated as a non-indexed triangle list with one vertex
//! buffer per level of detail.

use std::f32::consts::{PI, TAU};
use std::path::Path;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use serde::Deserialize;
use umbra_core::renderer::{BufferDescriptor, BufferId, BufferUsage, ResourceError, Rhi};
use umbra_data::assets::{GpuMesh, MeshLod};
use umbra_data::{GpuModel, LoadError, ResourceLoader};

/// Upper bound on the number of LODs per mesh.
const MAX_LODS: u32 = 4;

/// The primitive a mesh is generated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    /// Axis-aligned cube, `size` is the edge length.
    Cube,
    /// UV sphere, `size` is the diameter.
    Sphere,
    /// Square in the XZ plane facing +Y, `size` is the edge length.
    Plane,
}

fn default_size() -> f32 {
    1.0
}

fn default_lods() -> u32 {
    1
}

/// One mesh entry of a model file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelMesh {
    /// Mesh name inside the model.
    pub name: String,
    /// Primitive to generate.
    pub shape: Shape,
    /// Extent of the primitive.
    #[serde(default = "default_size")]
    pub size: f32,
    /// Requested LOD count, clamped to `1..=4`.
    #[serde(default = "default_lods")]
    pub lods: u32,
}

/// The content of a model file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelFile {
    /// Meshes of the model; at least one.
    pub meshes: Vec<ModelMesh>,
}

/// Vertex layout of generated meshes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// Model-space position.
    pub position: [f32; 3],
    /// Unit normal.
    pub normal: [f32; 3],
}

impl Shape {
    /// Radius of the bounding sphere of a primitive of extent `size`.
    pub fn bounding_radius(self, size: f32) -> f32 {
        match self {
            Shape::Cube => size * 3f32.sqrt() * 0.5,
            Shape::Sphere => size * 0.5,
            Shape::Plane => size * 2f32.sqrt() * 0.5,
        }
    }

    /// How many distinct LODs the primitive supports.
    fn max_lods(self) -> u32 {
        match self {
            Shape::Sphere => MAX_LODS,
            Shape::Cube | Shape::Plane => 1,
        }
    }

    /// Generates the triangle list for LOD `lod` (0 is the finest).
    pub fn vertices(self, size: f32, lod: u32) -> Vec<Vertex> {
        match self {
            Shape::Cube => cube(size * 0.5),
            Shape::Plane => plane(size * 0.5),
            Shape::Sphere => sphere(size * 0.5, (32 >> lod).max(4)),
        }
    }
}

fn quad(corners: [[f32; 3]; 4], normal: [f32; 3], out: &mut Vec<Vertex>) {
    for i in [0, 1, 2, 0, 2, 3] {
        out.push(Vertex {
            position: corners[i],
            normal,
        });
    }
}

fn cube(h: f32) -> Vec<Vertex> {
    let mut v = Vec::with_capacity(36);
    quad([[-h, -h, h], [h, -h, h], [h, h, h], [-h, h, h]], [0.0, 0.0, 1.0], &mut v);
    quad([[h, -h, -h], [-h, -h, -h], [-h, h, -h], [h, h, -h]], [0.0, 0.0, -1.0], &mut v);
    quad([[h, -h, h], [h, -h, -h], [h, h, -h], [h, h, h]], [1.0, 0.0, 0.0], &mut v);
    quad([[-h, -h, -h], [-h, -h, h], [-h, h, h], [-h, h, -h]], [-1.0, 0.0, 0.0], &mut v);
    quad([[-h, h, h], [h, h, h], [h, h, -h], [-h, h, -h]], [0.0, 1.0, 0.0], &mut v);
    quad([[-h, -h, -h], [h, -h, -h], [h, -h, h], [-h, -h, h]], [0.0, -1.0, 0.0], &mut v);
    v
}

fn plane(h: f32) -> Vec<Vertex> {
    let mut v = Vec::with_capacity(6);
    quad([[-h, 0.0, h], [h, 0.0, h], [h, 0.0, -h], [-h, 0.0, -h]], [0.0, 1.0, 0.0], &mut v);
    v
}

fn sphere(radius: f32, segments: u32) -> Vec<Vertex> {
    let rings = (segments / 2).max(2);
    let point = |ring: u32, seg: u32| {
        let theta = PI * ring as f32 / rings as f32;
        let phi = TAU * seg as f32 / segments as f32;
        let n = [theta.sin() * phi.cos(), theta.cos(), theta.sin() * phi.sin()];
        Vertex {
            position: [n[0] * radius, n[1] * radius, n[2] * radius],
            normal: n,
        }
    };
    let mut v = Vec::with_capacity((rings * segments * 6) as usize);
    for ring in 0..rings {
        for seg in 0..segments {
            let a = point(ring, seg);
            let b = point(ring + 1, seg);
            let c = point(ring + 1, seg + 1);
            let d = point(ring, seg + 1);
            v.extend_from_slice(&[a, d, c, a, c, b]);
        }
    }
    v
}

/// Screen-fraction threshold of LOD `lod` out of `count`.
fn lod_threshold(lod: u32, count: u32) -> f32 {
    if lod + 1 >= count {
        0.0
    } else {
        0.4 / (1u32 << lod) as f32
    }
}

/// Reads a model file, generates its meshes and uploads them.
#[derive(Debug, Clone)]
pub struct ProceduralModelLoader {
    rhi: Arc<dyn Rhi>,
}

impl ProceduralModelLoader {
    /// Creates a loader uploading through `rhi`.
    pub fn new(rhi: Arc<dyn Rhi>) -> Self {
        Self { rhi }
    }

    /// Parses and validates a model file.
    pub fn parse(path: &Path, text: &str) -> Result<ModelFile, LoadError> {
        let decode = |message: String| LoadError::Decode {
            path: path.to_path_buf(),
            message,
        };
        let file: ModelFile = serde_json::from_str(text).map_err(|e| decode(e.to_string()))?;
        if file.meshes.is_empty() {
            return Err(decode("model has no mesh".into()));
        }
        if let Some(mesh) = file
            .meshes
            .iter()
            .find(|m| !m.size.is_finite() || m.size <= 0.0)
        {
            return Err(decode(format!(
                "mesh '{}' has an invalid size {}",
                mesh.name, mesh.size
            )));
        }
        Ok(file)
    }

    fn upload(&self, label: &str, vertices: &[Vertex]) -> Result<BufferId, ResourceError> {
        let bytes: &[u8] = bytemuck::cast_slice(vertices);
        let id = self.rhi.create_buffer(&BufferDescriptor {
            label: label.to_string(),
            size: bytes.len() as u64,
            usage: BufferUsage::VERTEX | BufferUsage::COPY_DST,
        })?;
        if let Err(e) = self.rhi.write_buffer(id, 0, bytes) {
            let _ = self.rhi.destroy_buffer(id);
            return Err(e);
        }
        Ok(id)
    }

    fn release(&self, meshes: &[GpuMesh]) {
        for lod in meshes.iter().flat_map(|m| m.lods.iter()) {
            if let Err(e) = self.rhi.destroy_buffer(lod.vertex_buffer) {
                log::warn!("Failed to release vertex buffer {:?}: {e}", lod.vertex_buffer);
            }
        }
    }
}

impl ResourceLoader<Arc<GpuModel>> for ProceduralModelLoader {
    fn load(&self, path: &Path) -> Result<Arc<GpuModel>, LoadError> {
        let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file = Self::parse(path, &text)?;
        let source = path.to_string_lossy().into_owned();

        let mut meshes = Vec::with_capacity(file.meshes.len());
        let mut bounding_radius: f32 = 0.0;
        for mesh in &file.meshes {
            let count = mesh.lods.clamp(1, mesh.shape.max_lods());
            let mut lods = Vec::with_capacity(count as usize);
            for lod in 0..count {
                let vertices = mesh.shape.vertices(mesh.size, lod);
                let label = format!("{source}:{}:lod{lod}", mesh.name);
                match self.upload(&label, &vertices) {
                    Ok(vertex_buffer) => lods.push(MeshLod {
                        vertex_buffer,
                        vertex_count: vertices.len() as u32,
                        screen_fraction: lod_threshold(lod, count),
                    }),
                    Err(e) => {
                        meshes.push(GpuMesh {
                            name: mesh.name.clone(),
                            lods,
                        });
                        self.release(&meshes);
                        return Err(LoadError::Gpu {
                            path: path.to_path_buf(),
                            source: e,
                        });
                    }
                }
            }
            bounding_radius = bounding_radius.max(mesh.shape.bounding_radius(mesh.size));
            meshes.push(GpuMesh {
                name: mesh.name.clone(),
                lods,
            });
        }
        log::debug!("Loaded model '{source}' ({} meshes)", meshes.len());

        Ok(Arc::new(GpuModel {
            meshes,
            bounding_radius,
            source,
        }))
    }
}
