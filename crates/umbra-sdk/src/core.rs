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

//! The engine core: the RHI, services, clock, graphics configuration and the
//! resource caches that outlive a level.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use umbra_core::event::{EventBus, FrameEvent};
use umbra_core::renderer::{Camera, KeyboardInput, ResourceError, Rhi, TextureDescriptor, TextureFormat};
use umbra_core::{EngineError, FrameClock, GraphicsConfig, QualitySettings, ServiceRegistry};
use umbra_data::{GpuModel, GpuTexture, ResourceCache, ResourceLoader};
use umbra_infra::{ImageTextureLoader, ProceduralModelLoader};

/// The camera, shared through the service registry.
pub type CameraService = Arc<RwLock<Camera>>;

/// The keyboard state, shared through the service registry.
pub type KeyboardService = Arc<dyn KeyboardInput>;

/// Edge of the fallback textures.
const FALLBACK_SIZE: u32 = 4;

/// Which fallback replaces a texture that failed to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    /// Opaque white, for colour and mask textures.
    White,
    /// A +Z tangent-space normal.
    FlatNormal,
}

impl Fallback {
    /// The fallback for the texture bound at `slot` of a material. Slot 1
    /// holds the normal map.
    pub fn for_slot(slot: usize) -> Self {
        if slot == 1 {
            Fallback::FlatNormal
        } else {
            Fallback::White
        }
    }
}

/// Textures substituted for failed loads, created once per core.
#[derive(Debug)]
pub struct FallbackTextures {
    white: Arc<GpuTexture>,
    flat_normal: Arc<GpuTexture>,
}

impl FallbackTextures {
    fn solid(rhi: &dyn Rhi, name: &str, texel: [u8; 4]) -> Result<Arc<GpuTexture>, ResourceError> {
        let source = format!("<fallback:{name}>");
        let descriptor = TextureDescriptor::sampled(source.clone(), FALLBACK_SIZE, FALLBACK_SIZE, TextureFormat::Rgba8Unorm);
        let id = rhi.create_texture(&descriptor)?;
        let data: Vec<u8> = texel.repeat((FALLBACK_SIZE * FALLBACK_SIZE) as usize);
        if let Err(e) = rhi.write_texture(id, &data) {
            let _ = rhi.destroy_texture(id);
            return Err(e);
        }
        Ok(Arc::new(GpuTexture {
            id,
            width: FALLBACK_SIZE,
            height: FALLBACK_SIZE,
            format: TextureFormat::Rgba8Unorm,
            source,
        }))
    }

    /// Creates and uploads both textures.
    pub fn new(rhi: &dyn Rhi) -> Result<Self, ResourceError> {
        let white = Self::solid(rhi, "white", [255, 255, 255, 255])?;
        let flat_normal = match Self::solid(rhi, "flat_normal", [128, 128, 255, 255]) {
            Ok(texture) => texture,
            Err(e) => {
                let _ = rhi.destroy_texture(white.id);
                return Err(e);
            }
        };
        Ok(Self { white, flat_normal })
    }

    /// The texture for `kind`.
    pub fn get(&self, kind: Fallback) -> &Arc<GpuTexture> {
        match kind {
            Fallback::White => &self.white,
            Fallback::FlatNormal => &self.flat_normal,
        }
    }

    fn release(&self, rhi: &dyn Rhi) {
        for texture in [&self.white, &self.flat_normal] {
            if let Err(e) = rhi.destroy_texture(texture.id) {
                log::warn!("Failed to release fallback texture '{}': {e}", texture.source);
            }
        }
    }
}

/// State shared by every level of a running engine.
pub struct Core {
    rhi: Arc<dyn Rhi>,
    services: ServiceRegistry,
    clock: FrameClock,
    graphics: GraphicsConfig,
    quality: QualitySettings,
    textures: Arc<ResourceCache<Arc<GpuTexture>>>,
    models: Arc<ResourceCache<Arc<GpuModel>>>,
    texture_loader: Box<dyn ResourceLoader<Arc<GpuTexture>>>,
    model_loader: Box<dyn ResourceLoader<Arc<GpuModel>>>,
    fallbacks: FallbackTextures,
    events: EventBus<FrameEvent>,
    asset_root: PathBuf,
}

impl std::fmt::Debug for Core {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Core")
            .field("adapter", &self.rhi.adapter_info().name)
            .field("preset", &self.graphics.current_preset)
            .field("textures", &self.textures.len())
            .field("models", &self.models.len())
            .field("asset_root", &self.asset_root)
            .finish_non_exhaustive()
    }
}

impl Core {
    /// Creates a core on `rhi`. Fails on an invalid graphics configuration
    /// or when the fallback textures cannot be created.
    pub fn new(rhi: Arc<dyn Rhi>, graphics: GraphicsConfig, asset_root: impl Into<PathBuf>) -> Result<Self, EngineError> {
        graphics.validate()?;
        let quality = graphics.quality()?;
        let fallbacks = FallbackTextures::new(rhi.as_ref())?;
        let adapter = rhi.adapter_info();
        log::info!(
            "Core created on {} ({}), preset '{}'",
            adapter.name,
            adapter.backend,
            graphics.current_preset
        );
        Ok(Self {
            texture_loader: Box::new(ImageTextureLoader::new(Arc::clone(&rhi))),
            model_loader: Box::new(ProceduralModelLoader::new(Arc::clone(&rhi))),
            rhi,
            services: ServiceRegistry::new(),
            clock: FrameClock::new(),
            graphics,
            quality,
            textures: Arc::new(ResourceCache::new("Texture")),
            models: Arc::new(ResourceCache::new("Model")),
            fallbacks,
            events: EventBus::new(),
            asset_root: asset_root.into(),
        })
    }

    /// The RHI.
    pub fn rhi(&self) -> &dyn Rhi {
        self.rhi.as_ref()
    }

    /// A shared handle to the RHI.
    pub fn rhi_handle(&self) -> Arc<dyn Rhi> {
        Arc::clone(&self.rhi)
    }

    /// The service registry.
    pub fn services(&self) -> &ServiceRegistry {
        &self.services
    }

    /// The service registry, for registration.
    pub fn services_mut(&mut self) -> &mut ServiceRegistry {
        &mut self.services
    }

    /// The frame clock.
    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    /// The frame clock, to advance it.
    pub fn clock_mut(&mut self) -> &mut FrameClock {
        &mut self.clock
    }

    /// The graphics configuration.
    pub fn graphics(&self) -> &GraphicsConfig {
        &self.graphics
    }

    /// Quality settings of the current preset.
    pub fn quality(&self) -> &QualitySettings {
        &self.quality
    }

    /// The frame event bus.
    pub fn events(&self) -> &EventBus<FrameEvent> {
        &self.events
    }

    /// Root of the asset paths.
    pub fn asset_root(&self) -> &Path {
        &self.asset_root
    }

    /// The texture cache.
    pub fn textures(&self) -> &Arc<ResourceCache<Arc<GpuTexture>>> {
        &self.textures
    }

    /// The model cache.
    pub fn models(&self) -> &Arc<ResourceCache<Arc<GpuModel>>> {
        &self.models
    }

    /// The fallback textures.
    pub fn fallbacks(&self) -> &FallbackTextures {
        &self.fallbacks
    }

    /// Replaces the texture loader.
    pub fn set_texture_loader(&mut self, loader: Box<dyn ResourceLoader<Arc<GpuTexture>>>) {
        self.texture_loader = loader;
    }

    /// Replaces the model loader.
    pub fn set_model_loader(&mut self, loader: Box<dyn ResourceLoader<Arc<GpuModel>>>) {
        self.model_loader = loader;
    }

    /// Resolves a texture through the cache. A failed load yields the
    /// `fallback` texture and leaves no cache entry.
    pub fn load_texture(&self, path: &str, fallback: Fallback) -> Arc<GpuTexture> {
        self.textures
            .get_or_load_with(&self.asset_root, path, self.texture_loader.as_ref())
            .resource
            .unwrap_or_else(|| {
                log::warn!("Texture '{path}' unavailable, using the {fallback:?} fallback");
                Arc::clone(self.fallbacks.get(fallback))
            })
    }

    /// Resolves a model through the cache; `None` when it failed to load.
    pub fn load_model(&self, path: &str) -> Option<Arc<GpuModel>> {
        let model = self
            .models
            .get_or_load_with(&self.asset_root, path, self.model_loader.as_ref())
            .resource;
        if model.is_none() {
            log::warn!("Model '{path}' unavailable, objects using it will be skipped");
        }
        model
    }

    /// Empties both caches and destroys what they held. Must only be
    /// called once the GPU is idle.
    pub fn release_level_resources(&self) -> usize {
        let rhi = self.rhi.as_ref();
        let textures = self.textures.clear();
        let models = self.models.clear();
        for texture in &textures {
            if let Err(e) = rhi.destroy_texture(texture.id) {
                log::warn!("Failed to release texture '{}': {e}", texture.source);
            }
        }
        for buffer in models.iter().flat_map(|m| m.buffers()) {
            if let Err(e) = rhi.destroy_buffer(buffer) {
                log::warn!("Failed to release vertex buffer {buffer:?}: {e}");
            }
        }
        log::info!(
            "Released {} textures and {} models",
            textures.len(),
            models.len()
        );
        textures.len() + models.len()
    }

    /// Switches the graphics preset and resizes the backbuffers to its
    /// resolution. The GPU is drained first.
    pub fn apply_preset(&mut self, name: &str) -> Result<QualitySettings, EngineError> {
        let mut graphics = self.graphics.clone();
        graphics.select(name)?;
        let quality = graphics.quality()?;
        self.rhi.wait_for_gpu_on_graphics_fence()?;
        let fullscreen = self.rhi.display_mode().fullscreen;
        self.rhi.reset_rhi(quality.width, quality.height, fullscreen)?;
        self.graphics = graphics;
        self.quality = quality;
        log::info!("Preset '{name}' applied at {}x{}", quality.width, quality.height);
        Ok(quality)
    }
}

impl Drop for Core {
    fn drop(&mut self) {
        if let Err(e) = self.rhi.wait_for_gpu_on_graphics_fence() {
            log::warn!("GPU wait failed while dropping the core: {e}");
        }
        self.release_level_resources();
        self.fallbacks.release(self.rhi.as_ref());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use umbra_infra::{HeadlessConfig, HeadlessRhi};

    fn core() -> (Arc<HeadlessRhi>, Core) {
        let rhi = Arc::new(HeadlessRhi::new(HeadlessConfig::default()).unwrap());
        let core = Core::new(rhi.clone(), GraphicsConfig::default(), "does/not/exist").unwrap();
        (rhi, core)
    }

    #[test]
    fn missing_textures_fall_back_without_caching() {
        let (rhi, core) = core();
        let white = core.load_texture("missing.png", Fallback::White);
        assert_eq!(white.source, "<fallback:white>");
        let normal = core.load_texture("missing_n.png", Fallback::for_slot(1));
        assert_eq!(normal.source, "<fallback:flat_normal>");
        assert!(core.textures().is_empty());
        assert_eq!(rhi.texture_uploads(white.id), Some(1));
        assert!(core.load_model("missing.model").is_none());
        assert!(core.models().is_empty());
    }

    #[test]
    fn preset_switch_resizes_the_backbuffers() {
        let (rhi, mut core) = core();
        let mut graphics = GraphicsConfig::default();
        let mut low = graphics.presets[0].clone();
        low.name = "low".into();
        low.resolution_width = 640;
        low.resolution_height = 360;
        graphics.presets.push(low);
        core.graphics = graphics;

        let quality = core.apply_preset("low").unwrap();
        assert_eq!((quality.width, quality.height), (640, 360));
        assert_eq!(rhi.display_mode().width, 640);
        assert_eq!(core.graphics().current_preset, "low");

        assert!(matches!(core.apply_preset("ultra"), Err(EngineError::Config(_))));
        assert_eq!(core.graphics().current_preset, "low");
    }

    #[test]
    fn dropping_the_core_releases_the_fallbacks() {
        let (rhi, core) = core();
        let before = rhi.live_resource_counts()[0];
        drop(core);
        assert_eq!(rhi.live_resource_counts()[0], before - 2);
    }
}
