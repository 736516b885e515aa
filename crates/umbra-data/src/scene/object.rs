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

//! Renderable objects and their materials.

use std::collections::BTreeMap;
use std::sync::Arc;

use umbra_core::math::{degrees_to_radians, LinearRgba, Mat4, Quaternion, Vec3, Vec4};
use umbra_core::FrameTime;

use super::description::{MaterialDescription, ObjectDescription};
use crate::assets::{GpuModel, GpuTexture};

/// Position, rotation and scale of an object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// World position.
    pub position: Vec3,
    /// World rotation.
    pub rotation: Quaternion,
    /// Per-axis scale.
    pub scale: Vec3,
}

impl Transform {
    /// Model-to-world matrix.
    pub fn matrix(&self) -> Mat4 {
        let rotation = Mat4::from_quat(self.rotation);
        let scale = Mat4::from_cols(
            Vec4::new(self.scale.x, 0.0, 0.0, 0.0),
            Vec4::new(0.0, self.scale.y, 0.0, 0.0),
            Vec4::new(0.0, 0.0, self.scale.z, 0.0),
            Vec4::W,
        );
        Mat4::from_translation(self.position) * rotation * scale
    }

    /// Largest scale factor, used to scale bounding radii.
    pub fn max_scale(&self) -> f32 {
        self.scale.x.abs().max(self.scale.y.abs()).max(self.scale.z.abs())
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quaternion::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

/// How a material is driven at draw time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaterialKind {
    /// Gets a generic per-draw prepare callback.
    Standard,
    /// Records its own commands (e.g. the shadow-map material).
    Special,
}

/// A material bound to one pass of an object.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    /// The pass that uses it, e.g. `"gbuffer"` or `"shadow"`.
    pub pass: String,
    /// The shader program it runs.
    pub shader: String,
    /// Standard or self-managed.
    pub kind: MaterialKind,
    /// Texture paths, in binding order.
    pub texture_paths: Vec<String>,
    /// Base colour multiplier.
    pub base_color: LinearRgba,
    /// Roughness in `[0, 1]`.
    pub roughness: f32,
    /// Metalness in `[0, 1]`.
    pub metallic: f32,
}

impl Material {
    fn from_description(pass: &str, desc: &MaterialDescription) -> Self {
        let [r, g, b, a] = desc.base_color;
        Self {
            pass: pass.to_string(),
            shader: desc.shader.clone(),
            kind: if desc.special {
                MaterialKind::Special
            } else {
                MaterialKind::Standard
            },
            texture_paths: desc.textures.clone(),
            base_color: LinearRgba::new(r, g, b, a),
            roughness: desc.roughness.clamp(0.0, 1.0),
            metallic: desc.metallic.clamp(0.0, 1.0),
        }
    }

    /// The key its pipeline state is compiled under: `"<pass>/<shader>"`.
    pub fn pipeline_key(&self) -> String {
        format!("{}/{}", self.pass, self.shader)
    }
}

/// An object of the scene: transform, model and per-pass materials.
///
/// The model and textures are resolved through the resource caches during
/// level initialisation; an object whose model failed to load keeps `None`
/// and is skipped at draw time.
#[derive(Debug, Clone)]
pub struct RenderingObject {
    name: String,
    /// World transform.
    pub transform: Transform,
    model_path: String,
    materials: BTreeMap<String, Material>,
    spin_radians_per_second: f32,
    model: Option<Arc<GpuModel>>,
    textures: BTreeMap<String, Arc<GpuTexture>>,
}

impl RenderingObject {
    pub(crate) fn from_description(desc: &ObjectDescription) -> Self {
        let [rx, ry, rz] = desc.rotation_degrees.map(degrees_to_radians);
        let rotation = Quaternion::from_axis_angle(Vec3::Z, rz)
            * Quaternion::from_axis_angle(Vec3::Y, ry)
            * Quaternion::from_axis_angle(Vec3::X, rx);
        Self {
            name: desc.name.clone(),
            transform: Transform {
                position: Vec3::from(desc.position),
                rotation,
                scale: Vec3::from(desc.scale),
            },
            model_path: desc.model.clone(),
            materials: desc
                .materials
                .iter()
                .map(|(pass, m)| (pass.clone(), Material::from_description(pass, m)))
                .collect(),
            spin_radians_per_second: degrees_to_radians(desc.spin_degrees_per_second),
            model: None,
            textures: BTreeMap::new(),
        }
    }

    /// Unique name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path of the model.
    pub fn model_path(&self) -> &str {
        &self.model_path
    }

    /// Materials keyed by pass, sorted by pass name.
    pub fn materials(&self) -> &BTreeMap<String, Material> {
        &self.materials
    }

    /// The material of `pass`, if any.
    pub fn material(&self, pass: &str) -> Option<&Material> {
        self.materials.get(pass)
    }

    /// Every texture path referenced by any material.
    pub fn texture_paths(&self) -> impl Iterator<Item = &str> {
        self.materials
            .values()
            .flat_map(|m| m.texture_paths.iter().map(String::as_str))
    }

    /// The resolved model, if it loaded.
    pub fn model(&self) -> Option<&Arc<GpuModel>> {
        self.model.as_ref()
    }

    /// Installs the resolved model.
    pub fn set_model(&mut self, model: Option<Arc<GpuModel>>) {
        self.model = model;
    }

    /// The resolved texture for `path`.
    pub fn texture(&self, path: &str) -> Option<&Arc<GpuTexture>> {
        self.textures.get(path)
    }

    /// Installs a resolved texture (or its fallback).
    pub fn set_texture(&mut self, path: &str, texture: Arc<GpuTexture>) {
        self.textures.insert(path.to_string(), texture);
    }

    /// Drops every resolved resource handle.
    pub fn release_resources(&mut self) {
        self.model = None;
        self.textures.clear();
    }

    /// World-space bounding sphere, if the model is loaded.
    pub fn bounding_sphere(&self) -> Option<(Vec3, f32)> {
        self.model
            .as_ref()
            .map(|m| (self.transform.position, m.bounding_radius * self.transform.max_scale()))
    }

    /// Per-frame update: applies the object's spin.
    pub fn update(&mut self, frame_time: &FrameTime) {
        if self.spin_radians_per_second != 0.0 {
            let angle = self.spin_radians_per_second * frame_time.delta as f32;
            self.transform.rotation =
                (Quaternion::from_axis_angle(Vec3::Y, angle) * self.transform.rotation).normalize();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn description() -> ObjectDescription {
        let mut materials = BTreeMap::new();
        materials.insert(
            "gbuffer".to_string(),
            MaterialDescription {
                shader: "pbr".into(),
                special: false,
                textures: vec!["albedo.png".into(), "normal.png".into()],
                base_color: [1.0; 4],
                roughness: 3.0,
                metallic: 0.0,
            },
        );
        materials.insert(
            "shadow".to_string(),
            MaterialDescription {
                shader: "shadow_depth".into(),
                special: true,
                textures: vec![],
                base_color: [1.0; 4],
                roughness: 0.5,
                metallic: 0.0,
            },
        );
        ObjectDescription {
            name: "crate".into(),
            model: "crate.model".into(),
            position: [1.0, 2.0, 3.0],
            rotation_degrees: [0.0; 3],
            scale: [2.0, 1.0, 1.0],
            spin_degrees_per_second: 90.0,
            materials,
        }
    }

    #[test]
    fn builds_materials_per_pass() {
        let object = RenderingObject::from_description(&description());
        assert_eq!(object.material("shadow").unwrap().kind, MaterialKind::Special);
        let gbuffer = object.material("gbuffer").unwrap();
        assert_eq!(gbuffer.kind, MaterialKind::Standard);
        assert_eq!(gbuffer.roughness, 1.0);
        assert_eq!(gbuffer.pipeline_key(), "gbuffer/pbr");
        assert_eq!(object.texture_paths().count(), 2);
    }

    #[test]
    fn transform_matrix_applies_scale_then_translation() {
        let object = RenderingObject::from_description(&description());
        let p = object.transform.matrix().transform_point(Vec3::X);
        assert_relative_eq!(p.x, 3.0, epsilon = 1e-5);
        assert_relative_eq!(p.y, 2.0, epsilon = 1e-5);
    }

    #[test]
    fn spin_rotates_over_time() {
        let mut object = RenderingObject::from_description(&description());
        object.update(&FrameTime {
            total: 1.0,
            delta: 1.0,
            frame_index: 1,
        });
        let forward = object.transform.rotation.rotate_vec3(Vec3::new(0.0, 0.0, -1.0));
        assert_relative_eq!(forward.x, -1.0, epsilon = 1e-4);
        assert!(object.bounding_sphere().is_none());
    }
}
