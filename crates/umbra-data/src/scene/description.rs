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

//! The on-disk scene description, read once per level load.
//!
//! Vectors are plain `[x, y, z]` arrays; every section except `objects` is
//! optional.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::SceneError;

/// Top-level scene document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneDescription {
    /// Renderable objects.
    pub objects: Vec<ObjectDescription>,
    /// Local lights.
    #[serde(default)]
    pub point_lights: Vec<PointLightDescription>,
    /// The sun; a default sun is used when absent.
    #[serde(default)]
    pub sun: Option<SunDescription>,
    /// Where the camera starts.
    #[serde(default)]
    pub camera: Option<CameraDescription>,
    /// Whether volumetric fog is rendered.
    #[serde(default = "default_true")]
    pub fog_enabled: bool,
    /// Terrain tiles; no terrain when absent.
    #[serde(default)]
    pub terrain: Option<TerrainDescription>,
    /// Foliage zones; no foliage when empty.
    #[serde(default)]
    pub foliage_zones: Vec<FoliageZoneDescription>,
    /// Wind parameters.
    #[serde(default)]
    pub wind: Option<WindDescription>,
    /// Path of the sky texture.
    #[serde(default)]
    pub skybox: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_scale() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

fn default_color() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

fn default_intensity() -> f32 {
    1.0
}

/// One renderable object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectDescription {
    /// Unique object name.
    pub name: String,
    /// Path of the model.
    pub model: String,
    /// World position.
    #[serde(default)]
    pub position: [f32; 3],
    /// Euler rotation in degrees (X, Y, Z applied in that order).
    #[serde(default)]
    pub rotation_degrees: [f32; 3],
    /// Per-axis scale.
    #[serde(default = "default_scale")]
    pub scale: [f32; 3],
    /// Spin around +Y, in degrees per second.
    #[serde(default)]
    pub spin_degrees_per_second: f32,
    /// Materials keyed by the pass that uses them.
    pub materials: BTreeMap<String, MaterialDescription>,
}

/// A material bound to one pass of an object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialDescription {
    /// The shader program the material runs.
    pub shader: String,
    /// Self-managed materials record their own commands and get no
    /// per-draw prepare callback.
    #[serde(default)]
    pub special: bool,
    /// Texture paths, in binding order.
    #[serde(default)]
    pub textures: Vec<String>,
    /// Base colour multiplier, RGBA.
    #[serde(default = "default_base_color")]
    pub base_color: [f32; 4],
    /// Roughness in `[0, 1]`.
    #[serde(default = "default_roughness")]
    pub roughness: f32,
    /// Metalness in `[0, 1]`.
    #[serde(default)]
    pub metallic: f32,
}

fn default_base_color() -> [f32; 4] {
    [1.0, 1.0, 1.0, 1.0]
}

fn default_roughness() -> f32 {
    0.5
}

/// A point light.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointLightDescription {
    /// World position.
    pub position: [f32; 3],
    /// Radius of influence.
    pub radius: f32,
    /// Linear RGB colour.
    #[serde(default = "default_color")]
    pub color: [f32; 3],
    /// Intensity multiplier.
    #[serde(default = "default_intensity")]
    pub intensity: f32,
    /// Editor selection flag.
    #[serde(default)]
    pub selected_in_editor: bool,
}

/// The sun.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SunDescription {
    /// Direction the light travels along.
    pub direction: [f32; 3],
    /// Linear RGB colour.
    #[serde(default = "default_color")]
    pub color: [f32; 3],
    /// Intensity multiplier.
    #[serde(default = "default_intensity")]
    pub intensity: f32,
    /// Rotation speed around +Y, in degrees per second. Zero keeps the sun still.
    #[serde(default)]
    pub rotation_degrees_per_second: f32,
}

/// Camera start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraDescription {
    /// World position.
    pub position: [f32; 3],
    /// Yaw in degrees.
    #[serde(default)]
    pub yaw_degrees: f32,
    /// Pitch in degrees.
    #[serde(default)]
    pub pitch_degrees: f32,
}

/// Terrain layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrainDescription {
    /// Tiles per side of the terrain square.
    pub tiles: u32,
    /// World size of one tile.
    #[serde(default = "default_tile_size")]
    pub tile_size: f32,
    /// Height multiplier of the heightmap.
    #[serde(default = "default_intensity")]
    pub height_scale: f32,
}

fn default_tile_size() -> f32 {
    64.0
}

/// A circular area covered by foliage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoliageZoneDescription {
    /// Centre of the zone.
    pub center: [f32; 3],
    /// Radius of the zone.
    pub radius: f32,
    /// Instances per square unit at full foliage quality.
    #[serde(default = "default_intensity")]
    pub density: f32,
}

/// Wind parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindDescription {
    /// Horizontal direction the wind blows towards.
    pub direction: [f32; 3],
    /// Base strength.
    pub strength: f32,
    /// Gust oscillation frequency, in Hz.
    #[serde(default)]
    pub gust_frequency: f32,
}

impl SceneDescription {
    /// Path of the description of `scene_name` inside `scene_folder`.
    pub fn path_for(scene_folder: &Path, scene_name: &str) -> PathBuf {
        scene_folder.join(format!("{scene_name}.json"))
    }

    /// Parses a description.
    pub fn from_json_str(json: &str) -> Result<Self, SceneError> {
        serde_json::from_str(json).map_err(|source| SceneError::Parse {
            path: PathBuf::from("<memory>"),
            source,
        })
    }

    /// Reads `<scene_folder>/<scene_name>.json`.
    pub fn load(scene_folder: &Path, scene_name: &str) -> Result<Self, SceneError> {
        let path = Self::path_for(scene_folder, scene_name);
        let contents = std::fs::read_to_string(&path).map_err(|source| SceneError::Io {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| SceneError::Parse { path, source })
    }
}
