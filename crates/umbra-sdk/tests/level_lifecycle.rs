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

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Result;
use approx::assert_relative_eq;
use umbra_core::math::Vec3;
use umbra_core::renderer::Rhi;
use umbra_data::{GpuTexture, LoadError, ResourceCache, ResourceLoader};
use umbra_infra::{HeadlessRhi, ImageTextureLoader};
use umbra_sdk::{
    CameraService, Core, Engine, EngineConfig, EngineError, GraphicsConfig, KeyboardService,
    Sandbox, SandboxState,
};

const MEADOW: &str = r#"{
    "objects": [
        { "name": "boulder", "model": "models/boulder.json", "position": [0, 0, -6],
          "materials": {
            "gbuffer": { "shader": "pbr", "textures": ["textures/rock.png", "textures/rock_n.png"] },
            "shadow": { "shader": "shadow_depth" } } },
        { "name": "crate", "model": "models/crate.json", "position": [4, 0, -9],
          "spin_degrees_per_second": 45,
          "materials": { "gbuffer": { "shader": "pbr", "textures": ["textures/wood.png"] } } }
    ],
    "point_lights": [ { "position": [2, 3, -4], "radius": 6, "selected_in_editor": true } ],
    "sun": { "direction": [-0.3, -1, -0.2], "rotation_degrees_per_second": 12 },
    "camera": { "position": [0, 2, 12], "yaw_degrees": 0, "pitch_degrees": -5 },
    "skybox": "textures/sky.png"
}"#;

const VALLEY: &str = r#"{
    "objects": [
        { "name": "tower", "model": "models/tower.json", "position": [0, 0, -20],
          "materials": { "gbuffer": { "shader": "pbr", "textures": ["textures/stone.png"] } } }
    ],
    "camera": { "position": [0, 12, 40] },
    "fog_enabled": false,
    "terrain": { "tiles": 4, "tile_size": 16, "height_scale": 3 },
    "foliage_zones": [ { "center": [0, 0, 0], "radius": 5, "density": 1.5 } ],
    "wind": { "direction": [1, 0, 1], "strength": 2, "gust_frequency": 0.5 }
}"#;

const GRAPHICS: &str = r#"{
    "presets": [
        { "name": "low", "resolution_width": 640, "resolution_height": 360,
          "texture_quality": 0, "foliage_quality": 0, "shadow_quality": 0, "gi_quality": 0,
          "aa_quality": 0, "sss_quality": 0, "volumetric_fog_quality": 0,
          "volumetric_clouds_quality": 0 },
        { "name": "high", "resolution_width": 1280, "resolution_height": 720,
          "texture_quality": 2, "foliage_quality": 2, "shadow_quality": 2, "gi_quality": 2,
          "aa_quality": 2, "sss_quality": 2, "volumetric_fog_quality": 2,
          "volumetric_clouds_quality": 2 }
    ],
    "current_preset": "high"
}"#;

const MEADOW_TEXTURES: [&str; 4] = [
    "textures/rock.png",
    "textures/rock_n.png",
    "textures/wood.png",
    "textures/sky.png",
];

fn write_texture(root: &Path, path: &str, texel: [u8; 4]) -> Result<()> {
    let path = root.join(path);
    fs::create_dir_all(path.parent().unwrap_or(root))?;
    image::RgbaImage::from_pixel(8, 8, image::Rgba(texel)).save(path)?;
    Ok(())
}

fn write_model(root: &Path, path: &str, shape: &str, lods: u32) -> Result<()> {
    let path = root.join(path);
    fs::create_dir_all(path.parent().unwrap_or(root))?;
    let model = serde_json::json!({
        "meshes": [ { "name": "body", "shape": shape, "size": 2.0, "lods": lods } ]
    });
    fs::write(path, serde_json::to_string_pretty(&model)?)?;
    Ok(())
}

/// Writes both scenes and every asset they use.
fn write_assets(root: &Path) -> Result<()> {
    fs::write(root.join("meadow.json"), MEADOW)?;
    fs::write(root.join("valley.json"), VALLEY)?;
    for texture in MEADOW_TEXTURES {
        write_texture(root, texture, [200, 180, 160, 255])?;
    }
    write_texture(root, "textures/stone.png", [90, 90, 100, 255])?;
    write_model(root, "models/boulder.json", "sphere", 3)?;
    write_model(root, "models/crate.json", "cube", 1)?;
    write_model(root, "models/tower.json", "cube", 1)?;
    Ok(())
}

fn engine(root: &Path) -> Result<Engine> {
    let config = EngineConfig {
        graphics: GraphicsConfig::from_json_str(GRAPHICS)?,
        fixed_delta: Some(0.016),
        keep_trace: true,
        ..EngineConfig::headless(root)
    };
    Ok(Engine::new(config)?)
}

fn headless(engine: &Engine) -> &HeadlessRhi {
    engine
        .core()
        .rhi()
        .as_any()
        .downcast_ref::<HeadlessRhi>()
        .expect("headless backend")
}

#[test]
fn meadow_runs_sixty_frames() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write_assets(dir.path())?;
    let mut engine = engine(dir.path())?;
    engine.load_level("meadow")?;

    engine.frame()?;
    let sandbox = engine.sandbox().expect("level loaded");
    assert!(sandbox.are_global_probes_ready());
    assert_eq!(sandbox.state(), SandboxState::Ready);

    engine.run_frames(59)?;
    assert_eq!(engine.stats().frames_rendered(), 60);
    assert_eq!(headless(&engine).invalid_references(), 0);
    assert_eq!(headless(&engine).present_count(), 60);
    assert!(engine.sandbox().is_some_and(Sandbox::are_global_probes_ready));

    let camera = engine.core().services().require::<CameraService>()?.clone();
    let camera = camera.read().unwrap_or_else(PoisonError::into_inner);
    assert_eq!(camera.position, Vec3::new(0.0, 2.0, 12.0));
    assert_relative_eq!(camera.pitch, (-5.0f32).to_radians(), epsilon = 1e-6);

    for texture in MEADOW_TEXTURES {
        assert!(engine.core().textures().is_in_cache(texture), "{texture}");
    }
    assert_eq!(engine.core().textures().load_count(), 4);
    Ok(())
}

#[test]
fn draw_records_passes_in_pipeline_order() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write_assets(dir.path())?;
    let mut engine = engine(dir.path())?;
    engine.load_level("meadow")?;
    engine.run_frames(3)?;

    let frame = engine.trace().last_frame().expect("a traced frame");
    assert_eq!(frame.passes.first(), Some(&"GPU Culling"));
    assert_eq!(frame.passes.last(), Some(&"UI Overlay"));
    assert!(frame.runs_before("Shadow Maps", "Dynamic Global Illumination"));
    assert!(frame.runs_before("Dynamic Global Illumination", "Composite Illumination"));
    assert!(frame.position("Debug Gizmos").is_none());
    assert_eq!(frame.passes, engine.sandbox().expect("level").pass_order());
    assert_eq!(engine.trace().frames().len(), 3);
    Ok(())
}

#[test]
fn gizmos_run_between_local_and_composite_illumination() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write_assets(dir.path())?;
    let config = EngineConfig {
        debug_gizmos: true,
        fixed_delta: Some(0.016),
        ..EngineConfig::headless(dir.path())
    };
    let mut engine = Engine::new(config)?;
    engine.load_level("meadow")?;
    engine.frame()?;

    let frame = engine.trace().last_frame().expect("a traced frame");
    assert!(frame.runs_before("Local Illumination", "Debug Gizmos"));
    assert!(frame.runs_before("Debug Gizmos", "Composite Illumination"));
    assert_eq!(frame.passes.len(), 11);
    Ok(())
}

#[test]
fn missing_keyboard_service_aborts_the_level() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write_assets(dir.path())?;
    let mut engine = engine(dir.path())?;
    assert!(engine
        .core_mut()
        .services_mut()
        .remove::<KeyboardService>()
        .is_some());

    let err = engine.load_level("meadow").unwrap_err();
    assert!(matches!(err, EngineError::MissingService(name) if name.contains("KeyboardInput")));
    assert!(engine.sandbox().is_none());
    assert!(engine.core().textures().is_empty());
    Ok(())
}

/// Records, at its first load, which of the guarded paths were cached.
struct ObservingLoader {
    inner: ImageTextureLoader,
    cache: Arc<ResourceCache<Arc<GpuTexture>>>,
    guarded: BTreeSet<String>,
    cached_at_first_load: Arc<Mutex<Option<Vec<String>>>>,
}

impl ResourceLoader<Arc<GpuTexture>> for ObservingLoader {
    fn load(&self, path: &Path) -> Result<Arc<GpuTexture>, LoadError> {
        let mut seen = self
            .cached_at_first_load
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if seen.is_none() {
            let cached = self
                .guarded
                .iter()
                .filter(|p| self.cache.is_in_cache(p))
                .cloned()
                .collect();
            *seen = Some(cached);
        }
        drop(seen);
        self.inner.load(path)
    }
}

#[test]
fn switching_levels_empties_the_caches_first() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write_assets(dir.path())?;
    let mut engine = engine(dir.path())?;
    engine.load_level("meadow")?;
    engine.run_frames(2)?;

    let guarded = engine.core().textures().paths().into_iter().collect::<BTreeSet<_>>();
    assert_eq!(guarded.len(), MEADOW_TEXTURES.len());
    let cached_at_first_load = Arc::new(Mutex::new(None));
    let loader = ObservingLoader {
        inner: ImageTextureLoader::new(engine.core().rhi_handle()),
        cache: Arc::clone(engine.core().textures()),
        guarded,
        cached_at_first_load: Arc::clone(&cached_at_first_load),
    };
    engine.core_mut().set_texture_loader(Box::new(loader));

    engine.load_level("valley")?;
    let cached = cached_at_first_load
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();
    assert_eq!(cached, Some(Vec::new()));
    assert_eq!(engine.core().textures().paths(), vec!["textures/stone.png".to_string()]);

    engine.run_frames(10)?;
    assert_eq!(engine.level(), Some("valley"));
    assert_eq!(headless(&engine).invalid_references(), 0);
    Ok(())
}

#[test]
fn missing_assets_fall_back_and_frames_continue() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write_assets(dir.path())?;
    fs::remove_file(dir.path().join("textures/rock_n.png"))?;
    fs::remove_file(dir.path().join("models/crate.json"))?;
    let mut engine = engine(dir.path())?;
    engine.load_level("meadow")?;
    engine.run_frames(5)?;

    let core = engine.core();
    assert!(!core.textures().is_in_cache("textures/rock_n.png"));
    assert!(!core.models().is_in_cache("models/crate.json"));
    let scene = engine.sandbox().and_then(Sandbox::scene).expect("scene");
    let boulder = scene.object("boulder").expect("boulder");
    let normal = boulder.texture("textures/rock_n.png").expect("fallback bound");
    assert_eq!(normal.source, "<fallback:flat_normal>");
    assert!(scene.object("crate").is_some_and(|o| o.model().is_none()));
    assert_eq!(headless(&engine).invalid_references(), 0);
    Ok(())
}

#[test]
fn preset_switch_reloads_the_level_at_the_new_resolution() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write_assets(dir.path())?;
    let mut engine = engine(dir.path())?;
    engine.load_level("valley")?;
    engine.run_frames(2)?;
    assert_eq!(engine.core().rhi().display_mode().width, 1280);

    let quality = engine.apply_preset("low")?;
    assert_eq!((quality.width, quality.height), (640, 360));
    let mode = engine.core().rhi().display_mode();
    assert_eq!((mode.width, mode.height), (640, 360));
    assert_eq!(engine.level(), Some("valley"));
    assert_eq!(engine.sandbox().map(Sandbox::state), Some(SandboxState::Ready));

    engine.run_frames(2)?;
    assert_eq!(headless(&engine).invalid_references(), 0);
    Ok(())
}

#[test]
fn reset_rhi_twice_keeps_the_same_display_mode() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let engine = engine(dir.path())?;
    let rhi = engine.core().rhi();
    rhi.reset_rhi(800, 600, false)?;
    let first = rhi.display_mode();
    rhi.reset_rhi(800, 600, false)?;
    assert_eq!(rhi.display_mode(), first);
    assert_eq!((first.width, first.height), (800, 600));
    Ok(())
}

#[test]
fn abandoned_frame_submits_its_list_and_the_level_carries_on() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write_assets(dir.path())?;
    let rhi = Arc::new(HeadlessRhi::new(Default::default())?);
    let mut core = Core::new(rhi.clone(), GraphicsConfig::from_json_str(GRAPHICS)?, dir.path())?;
    let camera: CameraService = Default::default();
    let keyboard: KeyboardService = Arc::new(umbra_core::renderer::NoInput);
    core.services_mut().insert(camera);
    core.services_mut().insert(keyboard);

    let mut sandbox = Sandbox::new(false);
    sandbox.initialize(&mut core, "valley", dir.path())?;
    rhi.wait_for_gpu_on_graphics_fence()?;
    let submitted = rhi.executed_lists().len();

    // outside a frame there is nothing to abandon
    sandbox.abort_frame(&core);
    assert_eq!(sandbox.state(), SandboxState::Ready);
    assert_eq!(rhi.executed_lists().len(), submitted);

    let time = core.clock_mut().advance(0.016);
    sandbox.update(&core, &time)?;
    sandbox.abort_frame(&core);
    assert_eq!(sandbox.state(), SandboxState::Ready);
    rhi.wait_for_gpu_on_graphics_fence()?;
    assert_eq!(rhi.executed_lists().len(), submitted + 1);

    // the same list slot is usable again
    for _ in 0..rhi.frames_in_flight() + 1 {
        let time = core.clock_mut().advance(0.016);
        sandbox.update(&core, &time)?;
        sandbox.draw(&core, &time)?;
    }
    assert_eq!(sandbox.state(), SandboxState::Ready);
    sandbox.destroy(&core)?;
    core.release_level_resources();
    assert_eq!(rhi.invalid_references(), 0);
    Ok(())
}

#[test]
fn sandbox_teardown_releases_everything_it_built() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write_assets(dir.path())?;
    let rhi = Arc::new(HeadlessRhi::new(Default::default())?);
    let mut core = Core::new(rhi.clone(), GraphicsConfig::from_json_str(GRAPHICS)?, dir.path())?;
    let camera: CameraService = Default::default();
    let keyboard: KeyboardService = Arc::new(umbra_core::renderer::NoInput);
    core.services_mut().insert(camera);
    core.services_mut().insert(keyboard);
    let baseline = rhi.live_resource_counts();

    let mut sandbox = Sandbox::new(true);
    sandbox.initialize(&mut core, "valley", dir.path())?;
    assert!(rhi.live_resource_counts()[0] > baseline[0]);
    for _ in 0..3 {
        let time = core.clock_mut().advance(0.016);
        sandbox.update(&core, &time)?;
        assert!(matches!(
            sandbox.update(&core, &time),
            Err(EngineError::InvalidState { operation: "update", .. })
        ));
        sandbox.draw(&core, &time)?;
    }
    let time = core.clock_mut().advance(0.016);
    sandbox.update(&core, &time)?;

    sandbox.destroy(&core)?;
    assert_eq!(sandbox.state(), SandboxState::Destroyed);
    let log = sandbox.teardown_log();
    assert_eq!(log.first(), Some(&"MaterialSystem"));
    assert_eq!(log.last(), Some(&"GBuffer"));
    let position = |name: &str| log.iter().position(|n| *n == name);
    assert!(position("Terrain") < position("ShadowMapper"));
    assert!(position("FoliageManager") < position("Terrain"));

    core.release_level_resources();
    assert_eq!(rhi.live_resource_counts(), baseline);
    assert_eq!(rhi.invalid_references(), 0);
    Ok(())
}
