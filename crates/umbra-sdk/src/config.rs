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

//! Engine start-up configuration, built in code by the application.

use std::path::PathBuf;
use std::time::Duration;

use umbra_core::renderer::PresentMode;
use umbra_core::GraphicsConfig;
use umbra_telemetry::LoggingConfig;

/// Which RHI backend the engine runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    /// The CPU-side virtual GPU.
    #[default]
    Headless,
    /// A native GPU through wgpu, rendering offscreen.
    Wgpu,
}

/// Everything the engine needs before the first level loads.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// The RHI backend.
    pub backend: Backend,
    /// Per-frame command lists.
    pub frames_in_flight: usize,
    /// Presentation mode requested from the wgpu backend.
    pub present_mode: PresentMode,
    /// Artificial GPU latency of the headless backend.
    pub simulated_latency: Duration,
    /// Quality presets and the one in use.
    pub graphics: GraphicsConfig,
    /// Folder holding `<scene>.json` descriptions.
    pub scene_folder: PathBuf,
    /// Root that texture and model paths are relative to.
    pub asset_root: PathBuf,
    /// Logger set-up; `None` leaves logging to the application.
    pub logging: Option<LoggingConfig>,
    /// Records the Debug Gizmos pass.
    pub debug_gizmos: bool,
    /// Fixed time step in seconds; `None` follows the wall clock.
    pub fixed_delta: Option<f64>,
    /// Keeps the pass trace of every frame instead of only the last one.
    pub keep_trace: bool,
}

impl EngineConfig {
    /// A headless configuration reading scenes and assets from `root`.
    pub fn headless(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            scene_folder: root.clone(),
            asset_root: root,
            ..Self::default()
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Headless,
            frames_in_flight: 2,
            present_mode: PresentMode::Fifo,
            simulated_latency: Duration::ZERO,
            graphics: GraphicsConfig::default(),
            scene_folder: PathBuf::from("assets/scenes"),
            asset_root: PathBuf::from("assets"),
            logging: None,
            debug_gizmos: false,
            fixed_delta: None,
            keep_trace: false,
        }
    }
}
