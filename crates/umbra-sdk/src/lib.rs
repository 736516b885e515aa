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

//! # Umbra SDK
//!
//! The entry layer of the engine. [`Engine`] creates the backend and the
//! [`Core`], loads levels into a [`Sandbox`] and runs frames:
//!
//! ```no_run
//! use umbra_sdk::{Engine, EngineConfig};
//!
//! # fn main() -> Result<(), umbra_sdk::EngineError> {
//! let mut engine = Engine::new(EngineConfig::headless("assets"))?;
//! engine.load_level("meadow")?;
//! engine.run_frames(60)?;
//! engine.shutdown()?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod config;
mod core;
mod engine;
mod sandbox;

pub use self::config::{Backend, EngineConfig};
pub use self::core::{CameraService, Core, Fallback, FallbackTextures, KeyboardService};
pub use self::engine::Engine;
pub use self::sandbox::{Sandbox, SandboxState};

pub use umbra_core::{EngineError, FrameTime, GraphicsConfig, QualitySettings};
pub use umbra_telemetry::{FrameStats, LoggingConfig, PassTrace};
