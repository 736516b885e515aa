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

use super::GraphicsPreset;

/// Highest quality level a preset may request.
pub const MAX_QUALITY_LEVEL: u8 = 3;

/// Quality levels of the active preset, handed to every subsystem constructor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualitySettings {
    /// Backbuffer width in pixels.
    pub width: u32,
    /// Backbuffer height in pixels.
    pub height: u32,
    /// Texture quality level.
    pub textures: u8,
    /// Foliage density level.
    pub foliage: u8,
    /// Shadow quality level.
    pub shadows: u8,
    /// Global illumination quality level.
    pub gi: u8,
    /// Anti-aliasing level.
    pub aa: u8,
    /// Subsurface scattering level.
    pub sss: u8,
    /// Volumetric fog level.
    pub volumetric_fog: u8,
    /// Volumetric clouds level.
    pub volumetric_clouds: u8,
}

impl QualitySettings {
    /// Extracts the settings of `preset`, clamping levels into range.
    pub fn from_preset(preset: &GraphicsPreset) -> Self {
        let clamp = |level: u8| level.min(MAX_QUALITY_LEVEL);
        Self {
            width: preset.resolution_width.max(1),
            height: preset.resolution_height.max(1),
            textures: clamp(preset.texture_quality),
            foliage: clamp(preset.foliage_quality),
            shadows: clamp(preset.shadow_quality),
            gi: clamp(preset.gi_quality),
            aa: clamp(preset.aa_quality),
            sss: clamp(preset.sss_quality),
            volumetric_fog: clamp(preset.volumetric_fog_quality),
            volumetric_clouds: clamp(preset.volumetric_clouds_quality),
        }
    }

    /// Width over height.
    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    /// Side of the square shadow map, from 512 up to 4096 texels.
    pub fn shadow_map_resolution(&self) -> u32 {
        512 << self.shadows
    }

    /// Number of shadow cascades.
    pub fn shadow_cascades(&self) -> u32 {
        u32::from(self.shadows) + 1
    }

    /// Light probes per axis of the global probe grid.
    pub fn gi_probe_grid(&self) -> u32 {
        4 << self.gi
    }

    /// Mip levels dropped when uploading textures.
    pub fn texture_mip_bias(&self) -> u32 {
        u32::from(MAX_QUALITY_LEVEL - self.textures)
    }

    /// Fraction of foliage instances kept, in `[0, 1]`.
    pub fn foliage_density(&self) -> f32 {
        f32::from(self.foliage) / f32::from(MAX_QUALITY_LEVEL)
    }

    /// Whether the volumetric fog pass does any work.
    pub fn fog_enabled(&self) -> bool {
        self.volumetric_fog > 0
    }

    /// Raymarch steps for the volumetric fog.
    pub fn fog_steps(&self) -> u32 {
        16 << self.volumetric_fog
    }

    /// Whether the volumetric clouds pass does any work.
    pub fn clouds_enabled(&self) -> bool {
        self.volumetric_clouds > 0
    }

    /// Raymarch steps for the volumetric clouds.
    pub fn cloud_steps(&self) -> u32 {
        32 << self.volumetric_clouds
    }

    /// Whether the anti-aliasing effect runs in post-processing.
    pub fn aa_enabled(&self) -> bool {
        self.aa > 0
    }

    /// Whether the subsurface scattering effect runs in post-processing.
    pub fn sss_enabled(&self) -> bool {
        self.sss > 0
    }
}

impl Default for QualitySettings {
    fn default() -> Self {
        let config = super::GraphicsConfig::default();
        Self::from_preset(&config.presets[0])
    }
}
