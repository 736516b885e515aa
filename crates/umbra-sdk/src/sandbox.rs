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

//! The frame orchestrator of one level.
//!
//! [`Sandbox`] owns the render systems built for a scene, drives them in a
//! fixed order every frame and tears them down in reverse construction order.
//! Each frame is one command list: [`Sandbox::update`] opens it and records
//! the CPU-driven work, [`Sandbox::draw`] records the passes, submits the
//! list and presents.

use std::fmt;
use std::path::Path;
use std::sync::PoisonError;

use umbra_core::event::FrameEvent;
use umbra_core::math::Vec3;
use umbra_core::renderer::{Camera, CommandListIndex, DirectionalLight, FenceValue, Rhi};
use umbra_core::time::Stopwatch;
use umbra_core::{EngineError, FrameTime};
use umbra_data::Scene;
use umbra_lanes::environment_lane::{FoliageManager, Terrain, VolumetricClouds, VolumetricFog, Wind};
use umbra_lanes::render_lane::{
    draw_order, tags, DebugGizmos, FrameTimeOverlay, GBuffer, GpuCuller, Illumination,
    LightProbesManager, MaterialCallbacks, MaterialSystem, PassSchedule, PassScope,
    PostProcessingStack, ShadowMapper, Skybox, UiOverlay,
};
use umbra_lanes::{Drawable, FrameContext, RenderSystem, Updatable};

use crate::core::{CameraService, Core, Fallback, KeyboardService};

/// Lifecycle of a [`Sandbox`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SandboxState {
    /// Created, no level loaded.
    Uninitialized,
    /// Building the level.
    Initializing,
    /// Waiting for the next update.
    Ready,
    /// Updated; the frame list is open and waits for the draw.
    Updated,
    /// Releasing the level.
    Destroying,
    /// Released.
    Destroyed,
}

impl fmt::Display for SandboxState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Systems built so far. Construction fills the fields in order; teardown
/// empties them in reverse.
#[derive(Default)]
struct PartialLevel {
    gbuffer: Option<GBuffer>,
    skybox: Option<Skybox>,
    shadows: Option<ShadowMapper>,
    post: Option<PostProcessingStack>,
    illumination: Option<Illumination>,
    clouds: Option<VolumetricClouds>,
    fog: Option<VolumetricFog>,
    probes: Option<LightProbesManager>,
    terrain: Option<Terrain>,
    foliage: Option<FoliageManager>,
    wind: Option<Wind>,
    culler: Option<GpuCuller>,
    gizmos: Option<DebugGizmos>,
    overlay: Option<UiOverlay>,
    materials: Option<MaterialSystem>,
    callbacks: MaterialCallbacks,
}

fn release<S: RenderSystem>(slot: &mut Option<S>, rhi: &dyn Rhi, released: &mut Vec<&'static str>) {
    if let Some(mut system) = slot.take() {
        system.release(rhi);
        log::debug!("Released {}", system.name());
        released.push(system.name());
    }
}

fn missing(system: &'static str) -> EngineError {
    EngineError::InvalidState {
        operation: "finish level",
        state: format!("{system} was not built"),
    }
}

impl PartialLevel {
    /// Releases every built system, last built first. The GPU must be idle.
    fn teardown(&mut self, rhi: &dyn Rhi) -> Vec<&'static str> {
        let mut released = Vec::new();
        self.callbacks.clear();
        release(&mut self.materials, rhi, &mut released);
        release(&mut self.overlay, rhi, &mut released);
        release(&mut self.gizmos, rhi, &mut released);
        release(&mut self.culler, rhi, &mut released);
        if self.wind.take().is_some() {
            released.push("Wind");
        }
        release(&mut self.foliage, rhi, &mut released);
        release(&mut self.terrain, rhi, &mut released);
        release(&mut self.probes, rhi, &mut released);
        release(&mut self.fog, rhi, &mut released);
        release(&mut self.clouds, rhi, &mut released);
        release(&mut self.illumination, rhi, &mut released);
        release(&mut self.post, rhi, &mut released);
        release(&mut self.shadows, rhi, &mut released);
        release(&mut self.skybox, rhi, &mut released);
        release(&mut self.gbuffer, rhi, &mut released);
        released
    }

    fn finish(self) -> Result<LevelSystems, EngineError> {
        Ok(LevelSystems {
            gbuffer: self.gbuffer.ok_or_else(|| missing("GBuffer"))?,
            skybox: self.skybox.ok_or_else(|| missing("Skybox"))?,
            shadows: self.shadows.ok_or_else(|| missing("ShadowMapper"))?,
            post: self.post.ok_or_else(|| missing("PostProcessingStack"))?,
            illumination: self.illumination.ok_or_else(|| missing("Illumination"))?,
            clouds: self.clouds.ok_or_else(|| missing("VolumetricClouds"))?,
            fog: self.fog.ok_or_else(|| missing("VolumetricFog"))?,
            probes: self.probes.ok_or_else(|| missing("LightProbesManager"))?,
            terrain: self.terrain,
            foliage: self.foliage,
            wind: self.wind.ok_or_else(|| missing("Wind"))?,
            culler: self.culler.ok_or_else(|| missing("GpuCuller"))?,
            gizmos: self.gizmos,
            overlay: self.overlay.ok_or_else(|| missing("UiOverlay"))?,
            materials: self.materials.ok_or_else(|| missing("MaterialSystem"))?,
            callbacks: self.callbacks,
        })
    }
}

/// The systems of a fully built level.
struct LevelSystems {
    gbuffer: GBuffer,
    skybox: Skybox,
    shadows: ShadowMapper,
    post: PostProcessingStack,
    illumination: Illumination,
    clouds: VolumetricClouds,
    fog: VolumetricFog,
    probes: LightProbesManager,
    terrain: Option<Terrain>,
    foliage: Option<FoliageManager>,
    wind: Wind,
    culler: GpuCuller,
    gizmos: Option<DebugGizmos>,
    overlay: UiOverlay,
    materials: MaterialSystem,
    callbacks: MaterialCallbacks,
}

impl LevelSystems {
    fn into_partial(self) -> PartialLevel {
        PartialLevel {
            gbuffer: Some(self.gbuffer),
            skybox: Some(self.skybox),
            shadows: Some(self.shadows),
            post: Some(self.post),
            illumination: Some(self.illumination),
            clouds: Some(self.clouds),
            fog: Some(self.fog),
            probes: Some(self.probes),
            terrain: self.terrain,
            foliage: self.foliage,
            wind: Some(self.wind),
            culler: Some(self.culler),
            gizmos: self.gizmos,
            overlay: Some(self.overlay),
            materials: Some(self.materials),
            callbacks: self.callbacks,
        }
    }

    fn teardown(self, rhi: &dyn Rhi) -> Vec<&'static str> {
        self.into_partial().teardown(rhi)
    }
}

/// A loaded level and the systems rendering it.
pub struct Sandbox {
    state: SandboxState,
    debug_gizmos: bool,
    scene: Option<Scene>,
    light: Option<DirectionalLight>,
    systems: Option<LevelSystems>,
    camera: Camera,
    list_fences: Vec<Option<FenceValue>>,
    open_list: Option<CommandListIndex>,
    frame_timer: Stopwatch,
    teardown_log: Vec<&'static str>,
}

impl fmt::Debug for Sandbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sandbox")
            .field("state", &self.state)
            .field("scene", &self.scene.as_ref().map(Scene::name))
            .field("debug_gizmos", &self.debug_gizmos)
            .finish_non_exhaustive()
    }
}

impl Sandbox {
    /// Creates an empty sandbox. `debug_gizmos` adds the gizmo pass.
    pub fn new(debug_gizmos: bool) -> Self {
        Self {
            state: SandboxState::Uninitialized,
            debug_gizmos,
            scene: None,
            light: None,
            systems: None,
            camera: Camera::default(),
            list_fences: Vec::new(),
            open_list: None,
            frame_timer: Stopwatch::new(),
            teardown_log: Vec::new(),
        }
    }

    /// The current state.
    pub fn state(&self) -> SandboxState {
        self.state
    }

    /// The loaded scene.
    pub fn scene(&self) -> Option<&Scene> {
        self.scene.as_ref()
    }

    /// The sun of the loaded level.
    pub fn light(&self) -> Option<&DirectionalLight> {
        self.light.as_ref()
    }

    /// The sun of the loaded level, to rotate it.
    pub fn light_mut(&mut self) -> Option<&mut DirectionalLight> {
        self.light.as_mut()
    }

    /// Whether the global light probes hold a bake for the current sun.
    pub fn are_global_probes_ready(&self) -> bool {
        self.systems
            .as_ref()
            .is_some_and(|s| s.probes.are_global_probes_ready())
    }

    /// Systems released by the last teardown, in release order.
    pub fn teardown_log(&self) -> &[&'static str] {
        &self.teardown_log
    }

    /// Pass tags recorded by [`draw`](Self::draw), in order.
    pub fn pass_order(&self) -> Vec<&'static str> {
        draw_order(self.debug_gizmos)
    }

    fn expect_state(&self, expected: &[SandboxState], operation: &'static str) -> Result<(), EngineError> {
        if expected.contains(&self.state) {
            return Ok(());
        }
        log::error!("Sandbox: {operation} called in state {}", self.state);
        Err(EngineError::InvalidState {
            operation,
            state: self.state.to_string(),
        })
    }

    /// Loads `scene_name` from `scene_folder` and builds its systems.
    ///
    /// On failure everything built so far is released and the sandbox ends
    /// up [`Destroyed`](SandboxState::Destroyed).
    pub fn initialize(&mut self, core: &mut Core, scene_name: &str, scene_folder: &Path) -> Result<(), EngineError> {
        self.expect_state(&[SandboxState::Uninitialized, SandboxState::Destroyed], "initialize")?;
        self.state = SandboxState::Initializing;
        log::info!("Sandbox: initializing level '{scene_name}'");

        let mut partial = PartialLevel::default();
        match self.build(core, scene_name, scene_folder, &mut partial) {
            Ok(()) => {
                let systems = partial.finish()?;
                self.systems = Some(systems);
                self.list_fences = vec![None; core.rhi().frames_in_flight().max(1) + 1];
                self.state = SandboxState::Ready;
                core.clock_mut().reset();
                core.events().publish(FrameEvent::LevelLoaded {
                    scene: scene_name.to_string(),
                });
                log::info!("Sandbox: level '{scene_name}' ready");
                Ok(())
            }
            Err(e) => {
                log::error!("Sandbox: failed to initialize '{scene_name}': {e}");
                if let Err(wait) = core.rhi().wait_for_gpu_on_graphics_fence() {
                    log::warn!("Sandbox: GPU wait failed during cleanup: {wait}");
                }
                self.teardown_log = partial.teardown(core.rhi());
                if let Some(mut scene) = self.scene.take() {
                    scene.release_resources();
                }
                self.light = None;
                self.state = SandboxState::Destroyed;
                Err(e)
            }
        }
    }

    fn build(
        &mut self,
        core: &Core,
        scene_name: &str,
        scene_folder: &Path,
        level: &mut PartialLevel,
    ) -> Result<(), EngineError> {
        let mut scene = Scene::load(scene_folder, scene_name).map_err(|e| EngineError::Scene(e.to_string()))?;

        let camera_service = core.services().require::<CameraService>()?.clone();
        core.services().require::<KeyboardService>()?;

        PassSchedule::standard(self.debug_gizmos).check_order(&draw_order(self.debug_gizmos))?;

        let quality = *core.quality();
        let settings = scene.settings().clone();
        let rhi = core.rhi();

        level.gbuffer = Some(GBuffer::new(rhi, &quality)?);
        let light = settings.sun.to_light();
        let sky_texture = match &settings.skybox {
            Some(path) => core.load_texture(path, Fallback::White),
            None => core.fallbacks().get(Fallback::White).clone(),
        };
        let mut skybox = Skybox::new(rhi, sky_texture)?;
        skybox.track_sun(light.direction());
        level.skybox = Some(skybox);
        let shadows = level.shadows.insert(ShadowMapper::new(rhi, &quality, &light)?);
        level.post = Some(PostProcessingStack::new(rhi, &quality)?);
        level.illumination = Some(Illumination::new(rhi, &quality, shadows, &light)?);
        level.clouds = Some(VolumetricClouds::new(rhi, &quality)?);
        level.fog = Some(VolumetricFog::new(rhi, &quality, settings.fog_enabled)?);
        if let Some(illumination) = level.illumination.as_mut() {
            level.probes = Some(LightProbesManager::new(rhi, &quality, illumination, &light)?);
        }
        if let Some(terrain) = &settings.terrain {
            level.terrain = Some(Terrain::new(rhi, terrain)?);
        }
        if !settings.foliage_zones.is_empty() {
            level.foliage = Some(FoliageManager::new(rhi, &quality, &settings.foliage_zones)?);
        }
        level.wind = Some(Wind::new(&settings.wind));
        level.culler = Some(GpuCuller::new(rhi, scene.object_count())?);
        if self.debug_gizmos {
            level.gizmos = Some(DebugGizmos::new(rhi, &light)?);
        }
        let mut overlay = UiOverlay::new();
        overlay.add(Box::new(FrameTimeOverlay::new(rhi)?));
        level.overlay = Some(overlay);

        level.materials = Some(MaterialSystem::build(rhi, &scene)?);

        for object in scene.objects_mut() {
            let textures: Vec<(String, Fallback)> = object
                .materials()
                .values()
                .flat_map(|m| {
                    m.texture_paths
                        .iter()
                        .enumerate()
                        .map(|(slot, path)| (path.clone(), Fallback::for_slot(slot)))
                })
                .collect();
            for (path, fallback) in textures {
                let texture = core.load_texture(&path, fallback);
                object.set_texture(&path, texture);
            }
            let model = core.load_model(object.model_path());
            object.set_model(model);
            level.callbacks.register_standard(object);
        }
        log::info!(
            "Sandbox: {} objects, {} pipelines, {} draw callbacks",
            scene.object_count(),
            level.materials.as_ref().map_or(0, MaterialSystem::len),
            level.callbacks.len()
        );

        let prepare = CommandListIndex::PREPARE;
        rhi.begin_graphics_command_list(prepare)?;
        rhi.begin_event("prepare");
        if let Some(gbuffer) = &level.gbuffer {
            gbuffer.prepare(rhi);
        }
        if let Some(shadows) = &level.shadows {
            shadows.prepare(rhi);
        }
        if let Some(post) = &level.post {
            post.prepare(rhi);
        }
        if let Some(illumination) = &level.illumination {
            illumination.prepare(rhi);
        }
        if let Some(clouds) = &level.clouds {
            clouds.prepare(rhi);
        }
        if let Some(terrain) = &level.terrain {
            terrain.prepare(rhi);
        }
        rhi.end_event();
        rhi.end_graphics_command_list(prepare)?;
        rhi.execute_command_lists(prepare)?;
        rhi.wait_for_gpu_on_graphics_fence()?;

        if let Some(terrain) = level.terrain.as_mut() {
            terrain.on_prepared(rhi)?;
        }
        if let Some(foliage) = level.foliage.as_mut() {
            let placed = foliage.place(rhi, level.terrain.as_ref())?;
            log::debug!("Sandbox: placed {placed} foliage instances");
        }

        let start = settings.camera;
        let camera = Camera::new(start.position, start.yaw, start.pitch, quality.aspect_ratio());
        *camera_service.write().unwrap_or_else(PoisonError::into_inner) = camera.clone();
        self.camera = camera;
        self.light = Some(light);
        self.scene = Some(scene);
        Ok(())
    }

    /// Moves the camera, advances the sun and updates every system in order.
    /// Opens the frame's command list.
    pub fn update(&mut self, core: &Core, time: &FrameTime) -> Result<(), EngineError> {
        self.expect_state(&[SandboxState::Ready], "update")?;
        let camera_service = core.services().require::<CameraService>()?.clone();
        let keyboard = core.services().require::<KeyboardService>()?.clone();
        let Self {
            scene: Some(scene),
            light: Some(light),
            systems: Some(systems),
            ..
        } = self
        else {
            return Err(EngineError::InvalidState {
                operation: "update",
                state: "no level loaded".into(),
            });
        };
        self.frame_timer = Stopwatch::new();

        let camera = {
            let mut camera = camera_service.write().unwrap_or_else(PoisonError::into_inner);
            camera.update(keyboard.as_ref(), time.delta as f32);
            camera.clone()
        };
        let rotation_speed = scene.settings().sun.rotation_speed;
        if rotation_speed != 0.0 {
            light.rotate(Vec3::Y, rotation_speed * time.delta as f32);
        }

        let rhi = core.rhi();
        let list = CommandListIndex::for_frame(time.frame_index, rhi.frames_in_flight());
        if let Some(fence) = self.list_fences.get(list.0).copied().flatten() {
            rhi.wait_for_fence(fence)?;
        }
        rhi.begin_graphics_command_list(list)?;
        self.open_list = Some(list);
        core.events().publish(FrameEvent::FrameBegin {
            frame: time.frame_index,
        });

        let frame = FrameContext {
            rhi,
            time: *time,
            camera: &camera,
        };
        let sun = light.direction();
        systems.wind.update(time);
        systems.skybox.track_sun(sun);
        systems.skybox.update(&frame);
        systems.gbuffer.update(&frame);
        systems.post.update(&frame);
        systems.clouds.update(&frame, &systems.wind, sun);
        systems.fog.update(&frame);
        if let Some(terrain) = systems.terrain.as_mut() {
            terrain.update(&frame);
        }
        systems.illumination.update(&frame, light, &systems.shadows);
        if systems.probes.enabled() {
            systems.probes.update(&frame);
        }
        systems.shadows.update(&frame);
        if let Some(foliage) = systems.foliage.as_mut() {
            foliage.update(&frame, &systems.wind);
        }
        if let Some(gizmos) = systems.gizmos.as_mut() {
            gizmos.update_proxies(scene.point_lights());
        }
        scene.update_objects(time);
        for point_light in scene.point_lights() {
            systems.illumination.stage_point_light(point_light);
        }

        self.camera = camera;
        self.state = SandboxState::Updated;
        Ok(())
    }

    /// Records every pass in order, submits the frame list and presents.
    pub fn draw(&mut self, core: &Core, time: &FrameTime) -> Result<(), EngineError> {
        self.expect_state(&[SandboxState::Updated], "draw")?;
        let Self {
            scene: Some(scene),
            systems: Some(s),
            camera,
            ..
        } = self
        else {
            return Err(EngineError::InvalidState {
                operation: "draw",
                state: "no level loaded".into(),
            });
        };
        let rhi = core.rhi();
        let events = core.events();
        let index = time.frame_index;
        let frame = FrameContext {
            rhi,
            time: *time,
            camera,
        };

        {
            let _pass = PassScope::begin(rhi, events, tags::GPU_CULLING, index);
            let visible = s.culler.cull(rhi, scene, &s.gbuffer.view_projection()).visible_count();
            log::trace!("Sandbox: {visible} objects visible");
        }
        {
            let _pass = PassScope::begin(rhi, events, tags::GBUFFER, index);
            s.gbuffer.begin(rhi);
            s.skybox.draw(&frame);
            s.gbuffer
                .draw_objects(rhi, scene, s.culler.visibility(), &s.materials, &s.callbacks);
            if let Some(terrain) = s.terrain.as_mut() {
                terrain.draw(&frame);
            }
            if let Some(foliage) = s.foliage.as_mut() {
                foliage.draw(&frame);
            }
            s.gbuffer.end(rhi);
        }
        {
            let _pass = PassScope::begin(rhi, events, tags::SHADOW_MAPS, index);
            s.shadows.draw(rhi, scene, &s.materials);
        }
        {
            let _pass = PassScope::begin(rhi, events, tags::GLOBAL_ILLUMINATION, index);
            s.probes.compute_or_load(rhi);
            s.illumination.draw_global(rhi);
        }
        {
            let _pass = PassScope::begin(rhi, events, tags::LOCAL_ILLUMINATION, index);
            s.illumination.draw_local(rhi, &s.gbuffer);
        }
        if let Some(gizmos) = s.gizmos.as_ref() {
            let _pass = PassScope::begin(rhi, events, tags::DEBUG_GIZMOS, index);
            gizmos.draw(rhi, &s.gbuffer);
        }
        let hdr = s.post.hdr_target();
        {
            let _pass = PassScope::begin(rhi, events, tags::COMPOSITE_ILLUMINATION, index);
            s.post.bind_hdr(rhi);
            s.illumination.draw_composite(rhi, hdr);
        }
        {
            let _pass = PassScope::begin(rhi, events, tags::VOLUMETRIC_FOG, index);
            s.fog.draw(rhi, hdr);
        }
        {
            let _pass = PassScope::begin(rhi, events, tags::VOLUMETRIC_CLOUDS, index);
            s.clouds.draw(rhi, hdr);
        }
        {
            let _pass = PassScope::begin(rhi, events, tags::POST_PROCESSING, index);
            s.post.begin(rhi);
            s.post.apply_effects(rhi);
            s.post.end(rhi);
        }
        rhi.set_main_render_target();
        {
            let _pass = PassScope::begin(rhi, events, tags::UI_OVERLAY, index);
            s.overlay.draw(rhi, time);
        }
        rhi.transition_main_render_target_to_present();

        let list = self
            .open_list
            .take()
            .unwrap_or_else(|| CommandListIndex::for_frame(index, rhi.frames_in_flight()));
        // the list is closed or lost from here on, either way the frame is over
        self.state = SandboxState::Ready;
        rhi.end_graphics_command_list(list)?;
        let fence = rhi.execute_command_lists(list)?;
        if let Some(slot) = self.list_fences.get_mut(list.0) {
            *slot = Some(fence);
        }
        rhi.present_graphics()?;
        events.publish(FrameEvent::FrameEnd {
            frame: index,
            cpu_time_us: self.frame_timer.elapsed_us(),
        });
        Ok(())
    }

    /// Submits the list opened by the last update, if it is still open.
    fn flush_open_list(&mut self, rhi: &dyn Rhi) {
        let Some(list) = self.open_list.take() else {
            return;
        };
        let flushed = rhi
            .end_graphics_command_list(list)
            .map_err(EngineError::from)
            .and_then(|()| rhi.execute_command_lists(list).map_err(EngineError::from));
        match flushed {
            Ok(fence) => {
                if let Some(slot) = self.list_fences.get_mut(list.0) {
                    *slot = Some(fence);
                }
            }
            Err(e) => log::warn!("Sandbox: could not flush the open frame list: {e}"),
        }
    }

    /// Abandons a frame that failed after `update`, so the next frame can
    /// start. Does nothing outside a frame.
    pub fn abort_frame(&mut self, core: &Core) {
        if self.state != SandboxState::Updated {
            return;
        }
        log::warn!("Sandbox: abandoning the current frame");
        self.flush_open_list(core.rhi());
        self.state = SandboxState::Ready;
    }

    /// Waits for the GPU and releases the level, last built system first.
    pub fn destroy(&mut self, core: &Core) -> Result<(), EngineError> {
        self.expect_state(&[SandboxState::Ready, SandboxState::Updated], "destroy")?;
        let rhi = core.rhi();
        self.flush_open_list(rhi);
        self.state = SandboxState::Destroying;
        let scene_name = self.scene.as_ref().map(|s| s.name().to_string()).unwrap_or_default();
        log::info!("Sandbox: destroying level '{scene_name}'");

        let waited = rhi.wait_for_gpu_on_graphics_fence();
        if let Some(systems) = self.systems.take() {
            self.teardown_log = systems.teardown(rhi);
        }
        if let Some(mut scene) = self.scene.take() {
            scene.release_resources();
        }
        self.light = None;
        self.list_fences.clear();
        self.state = SandboxState::Destroyed;
        core.events().publish(FrameEvent::LevelUnloaded { scene: scene_name });
        waited?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn teardown_runs_in_reverse_construction_order() {
        let mut partial = PartialLevel::default();
        partial.wind = Some(Wind::new(&Default::default()));
        let rhi = umbra_infra::HeadlessRhi::new(Default::default()).unwrap();
        let released = partial.teardown(&rhi);
        assert_eq!(released, vec!["Wind"]);
        assert!(partial.wind.is_none());
    }

    #[test]
    fn finishing_an_incomplete_level_fails() {
        let err = PartialLevel::default().finish().err().unwrap();
        assert!(matches!(err, EngineError::InvalidState { .. }));
    }

    #[test]
    fn frames_need_a_loaded_level() {
        let rhi = std::sync::Arc::new(umbra_infra::HeadlessRhi::new(Default::default()).unwrap());
        let core = Core::new(rhi, Default::default(), ".").unwrap();
        let mut sandbox = Sandbox::new(false);
        let time = FrameTime::default();
        assert!(matches!(
            sandbox.update(&core, &time),
            Err(EngineError::InvalidState { operation: "update", .. })
        ));
        assert!(matches!(
            sandbox.draw(&core, &time),
            Err(EngineError::InvalidState { operation: "draw", .. })
        ));
        assert_eq!(sandbox.state(), SandboxState::Uninitialized);
        assert_eq!(sandbox.pass_order().first(), Some(&tags::GPU_CULLING));
    }
}
