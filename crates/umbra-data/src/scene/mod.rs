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

//! The scene of a level: named objects, point lights and scene-wide settings.

mod description;
mod object;

pub use description::{
    CameraDescription, FoliageZoneDescription, MaterialDescription, ObjectDescription,
    PointLightDescription, SceneDescription, SunDescription, TerrainDescription, WindDescription,
};
pub use object::{Material, MaterialKind, RenderingObject, Transform};

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use umbra_core::math::{degrees_to_radians, LinearRgba, Vec3};
use umbra_core::renderer::{DirectionalLight, PointLight};
use umbra_core::FrameTime;

/// Errors raised while reading or building a scene.
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    /// The scene file could not be read.
    #[error("failed to read scene '{}': {source}", .path.display())]
    Io {
        /// The scene file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The scene file is not a valid scene description.
    #[error("failed to parse scene '{}': {source}", .path.display())]
    Parse {
        /// The scene file.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
    /// Two objects share a name.
    #[error("duplicate object name '{0}'")]
    DuplicateObject(String),
    /// A value is out of range.
    #[error("invalid scene: {0}")]
    Invalid(String),
}

/// The sun as described by the scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SunSettings {
    /// Direction the light travels along (normalised).
    pub direction: Vec3,
    /// Linear colour.
    pub color: LinearRgba,
    /// Intensity multiplier.
    pub intensity: f32,
    /// Rotation speed around +Y, in radians per second.
    pub rotation_speed: f32,
}

impl SunSettings {
    /// Builds the directional light for this sun.
    pub fn to_light(&self) -> DirectionalLight {
        DirectionalLight::from_direction(self.direction, self.color, self.intensity)
    }
}

impl Default for SunSettings {
    fn default() -> Self {
        Self {
            direction: DirectionalLight::default_direction(),
            color: LinearRgba::WHITE,
            intensity: 1.0,
            rotation_speed: 0.0,
        }
    }
}

/// Where the camera starts, angles in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraStart {
    /// World position.
    pub position: Vec3,
    /// Yaw.
    pub yaw: f32,
    /// Pitch.
    pub pitch: f32,
}

impl Default for CameraStart {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 2.0, 10.0),
            yaw: 0.0,
            pitch: 0.0,
        }
    }
}

/// Terrain layout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TerrainSettings {
    /// Tiles per side.
    pub tiles: u32,
    /// World size of a tile.
    pub tile_size: f32,
    /// Heightmap multiplier.
    pub height_scale: f32,
}

/// A foliage zone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FoliageZone {
    /// Centre.
    pub center: Vec3,
    /// Radius.
    pub radius: f32,
    /// Instances per square unit at full quality.
    pub density: f32,
}

/// Wind parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindSettings {
    /// Horizontal unit direction.
    pub direction: Vec3,
    /// Base strength.
    pub strength: f32,
    /// Gust frequency, in Hz.
    pub gust_frequency: f32,
}

impl Default for WindSettings {
    fn default() -> Self {
        Self {
            direction: Vec3::X,
            strength: 0.0,
            gust_frequency: 0.0,
        }
    }
}

/// Scene-wide configuration.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SceneSettings {
    /// The sun.
    pub sun: SunSettings,
    /// Camera start.
    pub camera: CameraStart,
    /// Whether volumetric fog is rendered.
    pub fog_enabled: bool,
    /// Terrain; `None` when the scene has no tiles.
    pub terrain: Option<TerrainSettings>,
    /// Foliage zones.
    pub foliage_zones: Vec<FoliageZone>,
    /// Wind.
    pub wind: WindSettings,
    /// Sky texture path.
    pub skybox: Option<String>,
}

/// A loaded scene.
///
/// Objects are keyed by unique name and iterate in name order.
#[derive(Debug)]
pub struct Scene {
    name: String,
    objects: BTreeMap<String, RenderingObject>,
    point_lights: Vec<PointLight>,
    settings: SceneSettings,
}

fn finite3(v: [f32; 3], what: &str) -> Result<Vec3, SceneError> {
    let v = Vec3::from(v);
    if v.is_finite() {
        Ok(v)
    } else {
        Err(SceneError::Invalid(format!("{what} is not finite")))
    }
}

fn non_negative(value: f32, what: &str) -> Result<f32, SceneError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(SceneError::Invalid(format!(
            "{what} must be a finite non-negative number, got {value}"
        )))
    }
}

impl Scene {
    /// Reads `<scene_folder>/<scene_name>.json` and builds the scene.
    pub fn load(scene_folder: &Path, scene_name: &str) -> Result<Self, SceneError> {
        let description = SceneDescription::load(scene_folder, scene_name)?;
        Self::from_description(scene_name, &description)
    }

    /// Builds a scene from its description.
    pub fn from_description(name: &str, desc: &SceneDescription) -> Result<Self, SceneError> {
        let mut objects = BTreeMap::new();
        for object in &desc.objects {
            finite3(object.position, &format!("position of '{}'", object.name))?;
            if objects.contains_key(&object.name) {
                return Err(SceneError::DuplicateObject(object.name.clone()));
            }
            objects.insert(
                object.name.clone(),
                RenderingObject::from_description(object),
            );
        }

        let point_lights = desc
            .point_lights
            .iter()
            .enumerate()
            .map(|(i, light)| {
                let position = finite3(light.position, &format!("point light {i} position"))?;
                let radius = non_negative(light.radius, &format!("point light {i} radius"))?;
                let [r, g, b] = light.color;
                let mut point = PointLight::new(position, radius, LinearRgba::rgb(r, g, b), light.intensity);
                point.selected_in_editor = light.selected_in_editor;
                Ok(point)
            })
            .collect::<Result<Vec<_>, SceneError>>()?;

        let sun = match &desc.sun {
            Some(sun) => {
                let [r, g, b] = sun.color;
                SunSettings {
                    direction: finite3(sun.direction, "sun direction")?.normalize(),
                    color: LinearRgba::rgb(r, g, b),
                    intensity: non_negative(sun.intensity, "sun intensity")?,
                    rotation_speed: degrees_to_radians(sun.rotation_degrees_per_second),
                }
            }
            None => SunSettings::default(),
        };

        let camera = match &desc.camera {
            Some(camera) => CameraStart {
                position: finite3(camera.position, "camera position")?,
                yaw: degrees_to_radians(camera.yaw_degrees),
                pitch: degrees_to_radians(camera.pitch_degrees),
            },
            None => CameraStart::default(),
        };

        let terrain = match &desc.terrain {
            Some(t) if t.tiles > 0 => Some(TerrainSettings {
                tiles: t.tiles,
                tile_size: non_negative(t.tile_size, "terrain tile size")?,
                height_scale: t.height_scale,
            }),
            _ => None,
        };

        let foliage_zones = desc
            .foliage_zones
            .iter()
            .enumerate()
            .map(|(i, zone)| {
                Ok(FoliageZone {
                    center: finite3(zone.center, &format!("foliage zone {i} center"))?,
                    radius: non_negative(zone.radius, &format!("foliage zone {i} radius"))?,
                    density: non_negative(zone.density, &format!("foliage zone {i} density"))?,
                })
            })
            .collect::<Result<Vec<_>, SceneError>>()?;

        let wind = match &desc.wind {
            Some(wind) => {
                let direction = finite3(wind.direction, "wind direction")?;
                let horizontal = Vec3::new(direction.x, 0.0, direction.z).normalize();
                WindSettings {
                    direction: if horizontal == Vec3::ZERO { Vec3::X } else { horizontal },
                    strength: non_negative(wind.strength, "wind strength")?,
                    gust_frequency: non_negative(wind.gust_frequency, "wind gust frequency")?,
                }
            }
            None => WindSettings::default(),
        };

        log::info!(
            "Scene '{}' built: {} objects, {} point lights",
            name,
            objects.len(),
            point_lights.len()
        );

        Ok(Self {
            name: name.to_string(),
            objects,
            point_lights,
            settings: SceneSettings {
                sun,
                camera,
                fog_enabled: desc.fog_enabled,
                terrain,
                foliage_zones,
                wind,
                skybox: desc.skybox.clone(),
            },
        })
    }

    /// The scene name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Scene-wide settings.
    pub fn settings(&self) -> &SceneSettings {
        &self.settings
    }

    /// Objects, in name order.
    pub fn objects(&self) -> impl Iterator<Item = &RenderingObject> {
        self.objects.values()
    }

    /// Mutable objects, in name order.
    pub fn objects_mut(&mut self) -> impl Iterator<Item = &mut RenderingObject> {
        self.objects.values_mut()
    }

    /// The object called `name`.
    pub fn object(&self, name: &str) -> Option<&RenderingObject> {
        self.objects.get(name)
    }

    /// Number of objects.
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Point lights, in declaration order.
    pub fn point_lights(&self) -> &[PointLight] {
        &self.point_lights
    }

    /// Mutable point lights.
    pub fn point_lights_mut(&mut self) -> &mut [PointLight] {
        &mut self.point_lights
    }

    /// Every texture path the scene references, deduplicated and sorted.
    pub fn texture_paths(&self) -> BTreeSet<String> {
        let mut paths: BTreeSet<String> = self
            .objects
            .values()
            .flat_map(|o| o.texture_paths().map(str::to_string))
            .collect();
        if let Some(sky) = &self.settings.skybox {
            paths.insert(sky.clone());
        }
        paths
    }

    /// Every model path the scene references, deduplicated and sorted.
    pub fn model_paths(&self) -> BTreeSet<String> {
        self.objects
            .values()
            .map(|o| o.model_path().to_string())
            .collect()
    }

    /// Distinct materials by pipeline key, in key order.
    pub fn distinct_materials(&self) -> BTreeMap<String, &Material> {
        let mut out = BTreeMap::new();
        for material in self.objects.values().flat_map(|o| o.materials().values()) {
            out.entry(material.pipeline_key()).or_insert(material);
        }
        out
    }

    /// Whether the scene has terrain tiles.
    pub fn has_terrain(&self) -> bool {
        self.settings.terrain.is_some()
    }

    /// Whether the scene has foliage zones.
    pub fn has_foliage(&self) -> bool {
        !self.settings.foliage_zones.is_empty()
    }

    /// Per-frame update of every object.
    pub fn update_objects(&mut self, frame_time: &FrameTime) {
        for object in self.objects.values_mut() {
            object.update(frame_time);
        }
    }

    /// Drops every resolved GPU handle held by the objects.
    pub fn release_resources(&mut self) {
        for object in self.objects.values_mut() {
            object.release_resources();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const SCENE: &str = r#"{
        "objects": [
            { "name": "b", "model": "rock.model", "materials": {
                "gbuffer": { "shader": "pbr", "textures": ["rock.png"] },
                "shadow": { "shader": "shadow_depth", "special": true } } },
            { "name": "a", "model": "tree.model", "materials": {
                "gbuffer": { "shader": "pbr", "textures": ["bark.png", "rock.png"] } } }
        ],
        "point_lights": [ { "position": [0, 1, 0], "radius": 4.0 } ],
        "camera": { "position": [1, 2, 3], "yaw_degrees": 90 },
        "wind": { "direction": [0, 1, 2], "strength": 1.5 }
    }"#;

    fn scene() -> Scene {
        let desc = SceneDescription::from_json_str(SCENE).unwrap();
        Scene::from_description("test", &desc).unwrap()
    }

    #[test]
    fn objects_iterate_in_name_order() {
        let names: Vec<_> = scene().objects().map(|o| o.name().to_string()).collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[test]
    fn collects_distinct_paths_and_materials() {
        let scene = scene();
        assert_eq!(
            scene.texture_paths().into_iter().collect::<Vec<_>>(),
            ["bark.png", "rock.png"]
        );
        assert_eq!(scene.model_paths().len(), 2);
        let keys: Vec<_> = scene.distinct_materials().into_keys().collect();
        assert_eq!(keys, ["gbuffer/pbr", "shadow/shadow_depth"]);
    }

    #[test]
    fn settings_have_defaults() {
        let scene = scene();
        let settings = scene.settings();
        assert!(settings.fog_enabled);
        assert!(!scene.has_terrain());
        assert!(!scene.has_foliage());
        assert_eq!(settings.camera.position, Vec3::new(1.0, 2.0, 3.0));
        assert_relative_eq!(settings.camera.yaw, std::f32::consts::FRAC_PI_2, epsilon = 1e-6);
        assert_relative_eq!(settings.wind.direction.z, 1.0, epsilon = 1e-6);
        assert_eq!(settings.sun.direction, DirectionalLight::default_direction());
    }

    #[test]
    fn rejects_duplicate_names() {
        let mut desc = SceneDescription::from_json_str(SCENE).unwrap();
        desc.objects[1].name = "b".into();
        assert!(matches!(
            Scene::from_description("dup", &desc),
            Err(SceneError::DuplicateObject(name)) if name == "b"
        ));
    }

    #[test]
    fn rejects_negative_light_radius() {
        let mut desc = SceneDescription::from_json_str(SCENE).unwrap();
        desc.point_lights[0].radius = -1.0;
        assert!(matches!(
            Scene::from_description("neg", &desc),
            Err(SceneError::Invalid(_))
        ));
    }

    #[test]
    fn zero_tiles_means_no_terrain() {
        let mut desc = SceneDescription::from_json_str(SCENE).unwrap();
        desc.terrain = Some(TerrainDescription {
            tiles: 0,
            tile_size: 64.0,
            height_scale: 1.0,
        });
        assert!(!Scene::from_description("flat", &desc).unwrap().has_terrain());
    }
}
