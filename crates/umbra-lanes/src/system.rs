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

//! Capabilities shared by the render systems.

use umbra_core::renderer::{
    BufferDescriptor, BufferId, Camera, PipelineStateDescriptor, PipelineStateId, ResourceError,
    Rhi, TextureDescriptor, TextureId,
};
use umbra_core::FrameTime;

/// What a system sees of the current frame.
#[derive(Clone, Copy)]
pub struct FrameContext<'a> {
    /// The RHI, with the frame's command list open.
    pub rhi: &'a dyn Rhi,
    /// Timing of the frame.
    pub time: FrameTime,
    /// The camera, after this frame's movement.
    pub camera: &'a Camera,
}

impl std::fmt::Debug for FrameContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameContext")
            .field("time", &self.time)
            .field("camera", &self.camera.position)
            .finish()
    }
}

/// A system with per-frame CPU-side state.
pub trait Updatable {
    /// Advances the system by one frame.
    fn update(&mut self, frame: &FrameContext<'_>);
}

/// A system that records a self-contained pass.
pub trait Drawable {
    /// Records the system's GPU work into the open command list.
    fn draw(&mut self, frame: &FrameContext<'_>);
}

/// A system owning GPU resources.
pub trait RenderSystem {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Destroys every GPU resource the system owns.
    ///
    /// Must only be called once the graphics fence covers all work that
    /// referenced them.
    fn release(&mut self, rhi: &dyn Rhi);
}

/// The GPU resources created by one system, destroyed together.
#[derive(Debug, Default)]
pub struct OwnedResources {
    owner: &'static str,
    textures: Vec<TextureId>,
    buffers: Vec<BufferId>,
    pipelines: Vec<PipelineStateId>,
}

impl OwnedResources {
    /// An empty set owned by `owner`.
    pub fn new(owner: &'static str) -> Self {
        Self {
            owner,
            ..Default::default()
        }
    }

    /// Runs `create` against a fresh set owned by `owner`. If it fails,
    /// whatever it created so far is destroyed before the error is returned.
    pub fn create_with<T>(
        owner: &'static str,
        rhi: &dyn Rhi,
        create: impl FnOnce(&mut Self) -> Result<T, ResourceError>,
    ) -> Result<(Self, T), ResourceError> {
        let mut resources = Self::new(owner);
        match create(&mut resources) {
            Ok(value) => Ok((resources, value)),
            Err(e) => {
                log::error!("{owner}: failed to create GPU resources: {e}");
                resources.release(rhi);
                Err(e)
            }
        }
    }

    /// Creates a texture and takes ownership of it.
    pub fn texture(
        &mut self,
        rhi: &dyn Rhi,
        descriptor: &TextureDescriptor,
    ) -> Result<TextureId, ResourceError> {
        let id = rhi.create_texture(descriptor)?;
        self.textures.push(id);
        Ok(id)
    }

    /// Creates a buffer and takes ownership of it.
    pub fn buffer(
        &mut self,
        rhi: &dyn Rhi,
        descriptor: &BufferDescriptor,
    ) -> Result<BufferId, ResourceError> {
        let id = rhi.create_buffer(descriptor)?;
        self.buffers.push(id);
        Ok(id)
    }

    /// Compiles a pipeline state and takes ownership of it.
    pub fn pipeline(
        &mut self,
        rhi: &dyn Rhi,
        descriptor: &PipelineStateDescriptor,
    ) -> Result<PipelineStateId, ResourceError> {
        let id = rhi.create_pipeline_state(descriptor)?;
        self.pipelines.push(id);
        Ok(id)
    }

    /// Number of resources held.
    pub fn len(&self) -> usize {
        self.textures.len() + self.buffers.len() + self.pipelines.len()
    }

    /// Whether nothing is held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Destroys everything, pipelines first.
    pub fn release(&mut self, rhi: &dyn Rhi) {
        let owner = self.owner;
        for id in self.pipelines.drain(..).rev() {
            if let Err(e) = rhi.destroy_pipeline_state(id) {
                log::warn!("{owner}: failed to destroy pipeline {id:?}: {e}");
            }
        }
        for id in self.buffers.drain(..).rev() {
            if let Err(e) = rhi.destroy_buffer(id) {
                log::warn!("{owner}: failed to destroy buffer {id:?}: {e}");
            }
        }
        for id in self.textures.drain(..).rev() {
            if let Err(e) = rhi.destroy_texture(id) {
                log::warn!("{owner}: failed to destroy texture {id:?}: {e}");
            }
        }
    }
}

/// Test scaffolding shared by the system tests.
#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use umbra_core::renderer::{CommandListIndex, Rhi};
    use umbra_core::QualitySettings;
    use umbra_infra::{HeadlessConfig, HeadlessRhi};

    pub fn rhi() -> Arc<HeadlessRhi> {
        Arc::new(HeadlessRhi::new(HeadlessConfig::default()).expect("headless rhi"))
    }

    pub fn quality(level: u8) -> QualitySettings {
        QualitySettings {
            width: 320,
            height: 180,
            textures: level,
            foliage: level,
            shadows: level,
            gi: level,
            aa: level,
            sss: level,
            volumetric_fog: level,
            volumetric_clouds: level,
        }
    }

    /// Runs `record` inside the prepare list and waits for it.
    pub fn submit(rhi: &dyn Rhi, record: impl FnOnce(&dyn Rhi)) {
        rhi.begin_graphics_command_list(CommandListIndex::PREPARE)
            .expect("begin");
        record(rhi);
        rhi.end_graphics_command_list(CommandListIndex::PREPARE)
            .expect("end");
        rhi.execute_command_lists(CommandListIndex::PREPARE)
            .expect("execute");
        rhi.wait_for_gpu_on_graphics_fence().expect("wait");
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::rhi;
    use super::*;
    use umbra_core::renderer::{BufferUsage, TextureFormat};

    #[test]
    fn release_destroys_everything_once() {
        let rhi = rhi();
        let before = rhi.live_resource_counts();
        let mut owned = OwnedResources::new("test");
        owned
            .texture(
                rhi.as_ref(),
                &TextureDescriptor::render_target("t", 8, 8, TextureFormat::Rgba8Unorm),
            )
            .unwrap();
        owned
            .buffer(
                rhi.as_ref(),
                &BufferDescriptor {
                    label: "b".into(),
                    size: 16,
                    usage: BufferUsage::STORAGE,
                },
            )
            .unwrap();
        owned
            .pipeline(rhi.as_ref(), &PipelineStateDescriptor::compute("c"))
            .unwrap();
        assert_eq!(owned.len(), 3);

        owned.release(rhi.as_ref());
        assert!(owned.is_empty());
        assert_eq!(rhi.live_resource_counts(), before);
        owned.release(rhi.as_ref());
    }

    #[test]
    fn failed_creation_releases_partial_work() {
        let rhi = rhi();
        let before = rhi.live_resource_counts();
        let result = OwnedResources::create_with("test", rhi.as_ref(), |owned| {
            owned.pipeline(rhi.as_ref(), &PipelineStateDescriptor::compute("ok"))?;
            owned.texture(
                rhi.as_ref(),
                &TextureDescriptor::render_target("empty", 0, 0, TextureFormat::Rgba8Unorm),
            )
        });
        assert!(matches!(result, Err(ResourceError::InvalidDescriptor(_))));
        assert_eq!(rhi.live_resource_counts(), before);
    }
}
