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

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{ConfigError, QualitySettings, MAX_QUALITY_LEVEL};

/// One named quality preset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphicsPreset {
    /// Unique preset name, e.g. `"high"`.
    pub name: String,
    /// Backbuffer width in pixels.
    pub resolution_width: u32,
    /// Backbuffer height in pixels.
    pub resolution_height: u32,
    /// Texture quality level.
    pub texture_quality: u8,
    /// Foliage density level.
    pub foliage_quality: u8,
    /// Shadow map quality level.
    pub shadow_quality: u8,
    /// Global illumination quality level.
    pub gi_quality: u8,
    /// Anti-aliasing level.
    pub aa_quality: u8,
    /// Subsurface scattering level.
    pub sss_quality: u8,
    /// Volumetric fog level; 0 disables the effect.
    pub volumetric_fog_quality: u8,
    /// Volumetric clouds level; 0 disables the effect.
    pub volumetric_clouds_quality: u8,
}

impl GraphicsPreset {
    fn levels(&self) -> [(&'static str, u8); 8] {
        [
            ("texture_quality", self.texture_quality),
            ("foliage_quality", self.foliage_quality),
            ("shadow_quality", self.shadow_quality),
            ("gi_quality", self.gi_quality),
            ("aa_quality", self.aa_quality),
            ("sss_quality", self.sss_quality),
            ("volumetric_fog_quality", self.volumetric_fog_quality),
            ("volumetric_clouds_quality", self.volumetric_clouds_quality),
        ]
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.resolution_width == 0 || self.resolution_height == 0 {
            return Err(ConfigError::Invalid(format!(
                "preset '{}' has a zero resolution ({}x{})",
                self.name, self.resolution_width, self.resolution_height
            )));
        }
        for (field, level) in self.levels() {
            if level > MAX_QUALITY_LEVEL {
                return Err(ConfigError::Invalid(format!(
                    "preset '{}': {field} = {level} exceeds the maximum level {MAX_QUALITY_LEVEL}",
                    self.name
                )));
            }
        }
        Ok(())
    }
}

/// The graphics configuration document.
///
/// ```json
/// {
///   "presets": [ { "name": "low", "resolution_width": 1280, ... } ],
///   "current_preset": "low"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphicsConfig {
    /// Every available preset.
    pub presets: Vec<GraphicsPreset>,
    /// Name of the preset in use.
    pub current_preset: String,
}

impl GraphicsConfig {
    /// Parses and validates a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: GraphicsConfig =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json_str(&contents)?;
        log::info!(
            "Loaded graphics config from '{}' ({} presets, current '{}')",
            path.display(),
            config.presets.len(),
            config.current_preset
        );
        Ok(config)
    }

    /// Checks preset names, quality ranges and the current selector.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.presets.is_empty() {
            return Err(ConfigError::Invalid("no presets defined".to_string()));
        }
        let mut seen = HashSet::new();
        for preset in &self.presets {
            if !seen.insert(preset.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate preset name '{}'",
                    preset.name
                )));
            }
            preset.validate()?;
        }
        if self.preset(&self.current_preset).is_none() {
            return Err(ConfigError::Invalid(format!(
                "current preset '{}' is not defined",
                self.current_preset
            )));
        }
        Ok(())
    }

    /// Looks up a preset by name.
    pub fn preset(&self, name: &str) -> Option<&GraphicsPreset> {
        self.presets.iter().find(|p| p.name == name)
    }

    /// The preset named by `current_preset`.
    pub fn current(&self) -> Result<&GraphicsPreset, ConfigError> {
        self.preset(&self.current_preset).ok_or_else(|| {
            ConfigError::Invalid(format!(
                "current preset '{}' is not defined",
                self.current_preset
            ))
        })
    }

    /// Switches the current preset.
    pub fn select(&mut self, name: &str) -> Result<&GraphicsPreset, ConfigError> {
        if self.preset(name).is_none() {
            return Err(ConfigError::Invalid(format!("unknown preset '{name}'")));
        }
        self.current_preset = name.to_string();
        self.current()
    }

    /// Derives the quality settings of the current preset.
    pub fn quality(&self) -> Result<QualitySettings, ConfigError> {
        self.current().map(QualitySettings::from_preset)
    }
}

impl Default for GraphicsConfig {
    /// A single `"medium"` preset at 1280x720.
    fn default() -> Self {
        Self {
            presets: vec![GraphicsPreset {
                name: "medium".to_string(),
                resolution_width: 1280,
                resolution_height: 720,
                texture_quality: 2,
                foliage_quality: 2,
                shadow_quality: 2,
                gi_quality: 2,
                aa_quality: 1,
                sss_quality: 1,
                volumetric_fog_quality: 2,
                volumetric_clouds_quality: 2,
            }],
            current_preset: "medium".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const TWO_PRESETS: &str = r#"{
        "presets": [
            { "name": "low", "resolution_width": 640, "resolution_height": 360,
              "texture_quality": 0, "foliage_quality": 0, "shadow_quality": 0, "gi_quality": 0,
              "aa_quality": 0, "sss_quality": 0, "volumetric_fog_quality": 0,
              "volumetric_clouds_quality": 0 },
            { "name": "ultra", "resolution_width": 1920, "resolution_height": 1080,
              "texture_quality": 3, "foliage_quality": 3, "shadow_quality": 3, "gi_quality": 3,
              "aa_quality": 3, "sss_quality": 3, "volumetric_fog_quality": 3,
              "volumetric_clouds_quality": 3 }
        ],
        "current_preset": "ultra"
    }"#;

    #[test]
    fn parses_presets_and_selector() {
        let config = GraphicsConfig::from_json_str(TWO_PRESETS).unwrap();
        assert_eq!(config.presets.len(), 2);
        assert_eq!(config.current().unwrap().resolution_width, 1920);
    }

    #[test]
    fn missing_field_is_a_parse_error_naming_it() {
        let json = r#"{ "presets": [ { "name": "x", "resolution_width": 1 } ], "current_preset": "x" }"#;
        let err = GraphicsConfig::from_json_str(json).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("resolution_height"));
    }

    #[test]
    fn unknown_selector_is_invalid() {
        let json = TWO_PRESETS.replace("\"current_preset\": \"ultra\"", "\"current_preset\": \"epic\"");
        let err = GraphicsConfig::from_json_str(&json).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(err.to_string().contains("epic"));
    }

    #[test]
    fn out_of_range_level_is_invalid() {
        let json = TWO_PRESETS.replace("\"gi_quality\": 3", "\"gi_quality\": 9");
        let err = GraphicsConfig::from_json_str(&json).unwrap_err();
        assert!(err.to_string().contains("gi_quality"));
    }

    #[test]
    fn duplicate_names_are_invalid() {
        let json = TWO_PRESETS.replace("\"name\": \"ultra\"", "\"name\": \"low\"");
        assert!(GraphicsConfig::from_json_str(&json).is_err());
    }

    #[test]
    fn select_switches_preset() {
        let mut config = GraphicsConfig::from_json_str(TWO_PRESETS).unwrap();
        assert_eq!(config.select("low").unwrap().resolution_height, 360);
        assert_eq!(config.current_preset, "low");
        assert!(config.select("missing").is_err());
        assert_eq!(config.current_preset, "low");
    }

    #[test]
    fn load_reads_file_and_reports_missing_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(TWO_PRESETS.as_bytes()).unwrap();
        let config = GraphicsConfig::load(file.path()).unwrap();
        assert_eq!(config.current_preset, "ultra");

        let err = GraphicsConfig::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn default_is_valid() {
        GraphicsConfig::default().validate().unwrap();
    }
}
