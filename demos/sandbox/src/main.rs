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

// Umbra sandbox
// Runs a level for a number of frames, optionally switches preset and level,
// then prints the frame statistics.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use umbra_sdk::{Backend, Engine, EngineConfig, GraphicsConfig, LoggingConfig};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BackendArg {
    Headless,
    Wgpu,
}

impl From<BackendArg> for Backend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Headless => Backend::Headless,
            BackendArg::Wgpu => Backend::Wgpu,
        }
    }
}

#[derive(Debug, Parser)]
#[command(version, about = "Runs Umbra levels for a fixed number of frames")]
struct Args {
    /// RHI backend.
    #[arg(long, value_enum, default_value_t = BackendArg::Headless)]
    backend: BackendArg,
    /// Frames per level.
    #[arg(long, default_value_t = 120)]
    frames: u64,
    /// First level.
    #[arg(long, default_value = "meadow")]
    scene: String,
    /// Level loaded after the first one.
    #[arg(long)]
    then: Option<String>,
    /// Preset applied before the second run.
    #[arg(long)]
    preset: Option<String>,
    /// Asset folder, with `scenes/` and `graphics.json`.
    #[arg(long, default_value = concat!(env!("CARGO_MANIFEST_DIR"), "/assets"))]
    assets: PathBuf,
    /// Records the debug gizmo pass.
    #[arg(long)]
    gizmos: bool,
    /// Log filter, `RUST_LOG` syntax.
    #[arg(long)]
    log: Option<String>,
}

fn run_level(engine: &mut Engine, frames: u64) -> Result<()> {
    let level = engine.level().unwrap_or("<none>").to_string();
    engine
        .run_frames(frames)
        .with_context(|| format!("while rendering '{level}'"))?;
    log::info!(
        "'{level}': {} frames, {:.3} ms average CPU frame time",
        engine.stats().frames_rendered(),
        engine.stats().average_frame_time_ms()
    );
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let graphics_path = args.assets.join("graphics.json");
    let graphics = GraphicsConfig::load(&graphics_path)
        .with_context(|| format!("loading {}", graphics_path.display()))?;
    let config = EngineConfig {
        backend: args.backend.into(),
        graphics,
        scene_folder: args.assets.join("scenes"),
        asset_root: args.assets.clone(),
        logging: Some(LoggingConfig {
            env_filter: args.log.clone(),
            ..LoggingConfig::default()
        }),
        debug_gizmos: args.gizmos,
        ..EngineConfig::default()
    };

    let mut engine = Engine::new(config).context("starting the engine")?;
    engine
        .load_level(&args.scene)
        .with_context(|| format!("loading level '{}'", args.scene))?;
    run_level(&mut engine, args.frames)?;

    if let Some(preset) = &args.preset {
        let quality = engine
            .apply_preset(preset)
            .with_context(|| format!("applying preset '{preset}'"))?;
        log::info!("Now rendering at {}x{}", quality.width, quality.height);
        run_level(&mut engine, args.frames)?;
    }

    if let Some(next) = &args.then {
        engine
            .load_level(next)
            .with_context(|| format!("loading level '{next}'"))?;
        run_level(&mut engine, args.frames)?;
    }

    println!("{}", engine.stats().to_json());
    engine.shutdown()?;
    Ok(())
}
