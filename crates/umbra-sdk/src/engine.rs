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

//! The engine: backend creation, level lifecycle and the frame loop.

use std::sync::{Arc, RwLock};

use umbra_core::renderer::{Camera, NoInput, Rhi};
use umbra_core::{EngineError, FrameTime, QualitySettings};
use umbra_infra::{HeadlessConfig, HeadlessRhi, WgpuConfig, WgpuRhi};
use umbra_telemetry::{init_logging, FrameStats, PassTrace, TelemetryService};

use crate::config::{Backend, EngineConfig};
use crate::core::{CameraService, Core, KeyboardService};
use crate::sandbox::Sandbox;

fn create_rhi(config: &EngineConfig, quality: &QualitySettings) -> Result<Arc<dyn Rhi>, EngineError> {
    let rhi: Arc<dyn Rhi> = match config.backend {
        Backend::Headless => Arc::new(HeadlessRhi::new(HeadlessConfig {
            width: quality.width,
            height: quality.height,
            fullscreen: false,
            frames_in_flight: config.frames_in_flight,
            simulated_latency: config.simulated_latency,
        })?),
        Backend::Wgpu => Arc::new(WgpuRhi::new(WgpuConfig {
            width: quality.width,
            height: quality.height,
            frames_in_flight: config.frames_in_flight,
            present_mode: config.present_mode,
            ..WgpuConfig::default()
        })?),
    };
    Ok(rhi)
}

/// A running engine: one [`Core`] and at most one loaded level.
#[derive(Debug)]
pub struct Engine {
    core: Core,
    sandbox: Option<Sandbox>,
    level: Option<String>,
    telemetry: TelemetryService,
    config: EngineConfig,
}

impl Engine {
    /// Sets up logging, creates the backend at the current preset's
    /// resolution and registers the default camera and keyboard services.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        if let Some(logging) = config.logging.clone() {
            init_logging(logging);
        }
        config.graphics.validate()?;
        let quality = config.graphics.quality()?;
        let rhi = create_rhi(&config, &quality)?;
        let mut core = Core::new(rhi, config.graphics.clone(), config.asset_root.clone())?;

        let camera: CameraService = Arc::new(RwLock::new(Camera::default()));
        let keyboard: KeyboardService = Arc::new(NoInput);
        core.services_mut().insert(camera);
        core.services_mut().insert(keyboard);

        log::info!(
            "Engine started: {:?} backend, preset '{}' at {}x{}",
            config.backend,
            config.graphics.current_preset,
            quality.width,
            quality.height
        );
        Ok(Self {
            core,
            sandbox: None,
            level: None,
            telemetry: TelemetryService::new(config.keep_trace),
            config,
        })
    }

    /// Loads `scene`, unloading the current level first. The caches are
    /// emptied before the new level resolves anything.
    pub fn load_level(&mut self, scene: &str) -> Result<(), EngineError> {
        self.unload_level()?;
        let mut sandbox = Sandbox::new(self.config.debug_gizmos);
        if let Err(e) = sandbox.initialize(&mut self.core, scene, &self.config.scene_folder) {
            self.core.release_level_resources();
            self.telemetry.tick(self.core.events());
            return Err(e);
        }
        self.sandbox = Some(sandbox);
        self.level = Some(scene.to_string());
        self.telemetry.tick(self.core.events());
        Ok(())
    }

    /// Destroys the current level and releases its cached resources.
    /// Does nothing when no level is loaded.
    pub fn unload_level(&mut self) -> Result<(), EngineError> {
        let Some(mut sandbox) = self.sandbox.take() else {
            return Ok(());
        };
        self.level = None;
        let destroyed = sandbox.destroy(&self.core);
        self.core.release_level_resources();
        self.telemetry.tick(self.core.events());
        destroyed
    }

    /// Runs one update and one draw of the loaded level.
    pub fn frame(&mut self) -> Result<FrameTime, EngineError> {
        let sandbox = self.sandbox.as_mut().ok_or(EngineError::InvalidState {
            operation: "frame",
            state: "no level loaded".into(),
        })?;
        let time = match self.config.fixed_delta {
            Some(delta) => self.core.clock_mut().advance(delta),
            None => self.core.clock_mut().tick(),
        };
        let ran = sandbox
            .update(&self.core, &time)
            .and_then(|()| sandbox.draw(&self.core, &time));
        if let Err(e) = ran {
            sandbox.abort_frame(&self.core);
            self.telemetry.tick(self.core.events());
            return Err(e);
        }
        self.telemetry.tick(self.core.events());
        log::trace!("Frame {} done", time.frame_index);
        Ok(time)
    }

    /// Runs `count` frames, stopping at the first error.
    pub fn run_frames(&mut self, count: u64) -> Result<(), EngineError> {
        for _ in 0..count {
            self.frame()?;
        }
        Ok(())
    }

    /// Switches to preset `name`. The level is unloaded, the backbuffers
    /// are resized and the level is loaded again at the new quality.
    pub fn apply_preset(&mut self, name: &str) -> Result<QualitySettings, EngineError> {
        if self.core.graphics().preset(name).is_none() {
            return Err(umbra_core::ConfigError::Invalid(format!("unknown preset '{name}'")).into());
        }
        let level = self.level.clone();
        self.unload_level()?;
        let quality = self.core.apply_preset(name)?;
        self.config.graphics = self.core.graphics().clone();
        if let Some(level) = level {
            self.load_level(&level)?;
        }
        Ok(quality)
    }

    /// The engine core.
    pub fn core(&self) -> &Core {
        &self.core
    }

    /// The engine core, e.g. to replace services or loaders.
    pub fn core_mut(&mut self) -> &mut Core {
        &mut self.core
    }

    /// The loaded level.
    pub fn sandbox(&self) -> Option<&Sandbox> {
        self.sandbox.as_ref()
    }

    /// The loaded level, e.g. to steer its sun.
    pub fn sandbox_mut(&mut self) -> Option<&mut Sandbox> {
        self.sandbox.as_mut()
    }

    /// Name of the loaded level.
    pub fn level(&self) -> Option<&str> {
        self.level.as_deref()
    }

    /// Frame statistics so far.
    pub fn stats(&self) -> &FrameStats {
        self.telemetry.stats()
    }

    /// Recorded pass order.
    pub fn trace(&self) -> &PassTrace {
        self.telemetry.trace()
    }

    /// The configuration the engine was started with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Unloads the level and logs the frame statistics.
    pub fn shutdown(mut self) -> Result<(), EngineError> {
        let unloaded = self.unload_level();
        self.telemetry.stats().log_summary();
        log::info!("Engine shut down");
        unloaded
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Err(e) = self.unload_level() {
            log::warn!("Failed to unload the level while dropping the engine: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::SandboxState;

    #[test]
    fn engine_starts_without_a_level() {
        let mut engine = Engine::new(EngineConfig::default()).unwrap();
        assert!(engine.sandbox().is_none());
        assert!(engine.core().services().get::<CameraService>().is_some());
        assert!(engine.core().services().get::<KeyboardService>().is_some());
        assert!(matches!(engine.frame(), Err(EngineError::InvalidState { .. })));
        engine.unload_level().unwrap();
        engine.shutdown().unwrap();
    }

    #[test]
    fn unknown_preset_is_rejected_up_front() {
        let mut engine = Engine::new(EngineConfig::default()).unwrap();
        assert!(matches!(engine.apply_preset("ultra"), Err(EngineError::Config(_))));
        assert_eq!(engine.core().graphics().current_preset, "medium");
    }

    #[test]
    fn an_unfinished_frame_is_abandoned_and_the_next_one_runs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("empty.json"), r#"{ "objects": [] }"#).unwrap();
        let config = EngineConfig {
            fixed_delta: Some(0.016),
            ..EngineConfig::headless(dir.path())
        };
        let mut engine = Engine::new(config).unwrap();
        engine.load_level("empty").unwrap();

        // an update nobody drew leaves the level mid-frame
        let time = engine.core.clock_mut().advance(0.016);
        let sandbox = engine.sandbox.as_mut().unwrap();
        sandbox.update(&engine.core, &time).unwrap();
        assert_eq!(sandbox.state(), SandboxState::Updated);

        assert!(matches!(
            engine.frame(),
            Err(EngineError::InvalidState { operation: "update", .. })
        ));
        assert_eq!(engine.sandbox().map(Sandbox::state), Some(SandboxState::Ready));
        engine.frame().unwrap();
        engine.frame().unwrap();
        engine.unload_level().unwrap();
    }

    #[test]
    fn missing_scene_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = Engine::new(EngineConfig::headless(dir.path())).unwrap();
        assert!(matches!(engine.load_level("nowhere"), Err(EngineError::Scene(_))));
        assert!(engine.sandbox().is_none());
    }
}
