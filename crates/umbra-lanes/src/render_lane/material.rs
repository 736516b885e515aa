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

//! Pipeline states of the scene materials and their per-draw callbacks.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use bytemuck::{Pod, Zeroable};
use umbra_core::math::Mat4;
use umbra_core::renderer::{
    BlendState, DepthStencilState, PipelineStateDescriptor, PipelineStateId, RasterizerState,
    ResourceError, Rhi, ShaderSource, TextureFormat,
};
use umbra_data::{Material, MaterialKind, RenderingObject, Scene};

use super::gbuffer::{GBUFFER_DEPTH_FORMAT, GBUFFER_FORMATS};
use super::post_processing::HDR_FORMAT;
use crate::system::{OwnedResources, RenderSystem};

/// Pass name of materials drawn into the geometry buffer.
pub const GBUFFER_PASS: &str = "gbuffer";
/// Pass name of materials drawn into the shadow maps.
pub const SHADOW_PASS: &str = "shadow";

/// One pipeline state per distinct material of a scene.
#[derive(Debug)]
pub struct MaterialSystem {
    resources: OwnedResources,
    pipelines: BTreeMap<String, PipelineStateId>,
}

impl MaterialSystem {
    /// Compiles a pipeline state for every distinct material of `scene`.
    pub fn build(rhi: &dyn Rhi, scene: &Scene) -> Result<Self, ResourceError> {
        let (resources, pipelines) = OwnedResources::create_with("MaterialSystem", rhi, |res| {
            let mut pipelines = BTreeMap::new();
            for (key, material) in scene.distinct_materials() {
                let id = res.pipeline(rhi, &Self::descriptor(&key, material))?;
                pipelines.insert(key, id);
            }
            Ok(pipelines)
        })?;
        log::info!("Compiled {} material pipelines", pipelines.len());
        Ok(Self {
            resources,
            pipelines,
        })
    }

    fn descriptor(key: &str, material: &Material) -> PipelineStateDescriptor {
        let shader = ShaderSource::Builtin(material.shader.clone());
        match material.pass.as_str() {
            GBUFFER_PASS => PipelineStateDescriptor::graphics(
                key,
                GBUFFER_FORMATS.to_vec(),
                Some(GBUFFER_DEPTH_FORMAT),
            ),
            SHADOW_PASS => PipelineStateDescriptor::graphics(key, Vec::new(), Some(TextureFormat::Depth32Float))
                .with_states(
                    DepthStencilState::ReadWrite,
                    RasterizerState::ShadowDepthBias,
                    BlendState::Disabled,
                ),
            _ => PipelineStateDescriptor::graphics(key, vec![HDR_FORMAT], Some(GBUFFER_DEPTH_FORMAT))
                .with_states(
                    DepthStencilState::ReadOnly,
                    RasterizerState::CullBack,
                    BlendState::AlphaBlend,
                ),
        }
        .with_shader(shader)
    }

    /// The pipeline compiled for a material's [`Material::pipeline_key`].
    pub fn pipeline(&self, key: &str) -> Option<PipelineStateId> {
        self.pipelines.get(key).copied()
    }

    /// The pipeline of `object`'s material for `pass`.
    pub fn pipeline_for(&self, object: &RenderingObject, pass: &str) -> Option<PipelineStateId> {
        object
            .material(pass)
            .and_then(|m| self.pipeline(&m.pipeline_key()))
    }

    /// Number of compiled pipelines.
    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    /// Whether the scene had no material.
    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }
}

impl RenderSystem for MaterialSystem {
    fn name(&self) -> &'static str {
        "MaterialSystem"
    }

    fn release(&mut self, rhi: &dyn Rhi) {
        self.pipelines.clear();
        self.resources.release(rhi);
    }
}

/// Per-draw constants pushed by the standard material callback.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct DrawConstants {
    /// Model-to-world matrix.
    pub model: [f32; 16],
    /// World-to-clip matrix.
    pub view_projection: [f32; 16],
    /// Base colour multiplier.
    pub base_color: [f32; 4],
    /// Roughness, metalness, LOD index, unused.
    pub surface: [f32; 4],
}

/// What a prepare callback gets to see.
#[derive(Debug, Clone, Copy)]
pub struct DrawContext<'a> {
    /// The object about to be drawn.
    pub object: &'a RenderingObject,
    /// World-to-clip matrix of the pass.
    pub view_projection: Mat4,
    /// The LOD picked for this draw.
    pub lod: usize,
}

/// Invoked right before a draw to push its constants.
pub type PrepareCallback = Box<dyn Fn(&dyn Rhi, &DrawContext<'_>) + Send + Sync>;

/// Identifies one draw of one object: pass, mesh and LOD.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CallbackKey {
    /// Object name.
    pub object: String,
    /// Pass name.
    pub pass: String,
    /// Mesh index in the model.
    pub mesh: usize,
    /// LOD index in the mesh.
    pub lod: usize,
}

impl CallbackKey {
    /// Builds a key.
    pub fn new(object: &str, pass: &str, mesh: usize, lod: usize) -> Self {
        Self {
            object: object.to_string(),
            pass: pass.to_string(),
            mesh,
            lod,
        }
    }
}

/// Registry of the prepare callbacks of every standard material.
#[derive(Default)]
pub struct MaterialCallbacks {
    callbacks: BTreeMap<CallbackKey, PrepareCallback>,
    invocations: AtomicU64,
}

impl MaterialCallbacks {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` for `key`, replacing any previous one.
    pub fn register(&mut self, key: CallbackKey, callback: PrepareCallback) {
        self.callbacks.insert(key, callback);
    }

    /// Registers the standard callback for every mesh and LOD of every
    /// standard material of `object`. Objects without a model get none.
    ///
    /// Returns how many callbacks were registered.
    pub fn register_standard(&mut self, object: &RenderingObject) -> usize {
        let Some(model) = object.model() else {
            return 0;
        };
        let mut registered = 0;
        for (pass, material) in object.materials() {
            if material.kind != MaterialKind::Standard {
                continue;
            }
            for (mesh_index, mesh) in model.meshes.iter().enumerate() {
                for lod in 0..mesh.lods.len() {
                    let base_color = material.base_color.to_array();
                    let surface = [material.roughness, material.metallic, lod as f32, 0.0];
                    self.register(
                        CallbackKey::new(object.name(), pass, mesh_index, lod),
                        Box::new(move |rhi, ctx| {
                            let constants = DrawConstants {
                                model: ctx.object.transform.matrix().to_cols_array(),
                                view_projection: ctx.view_projection.to_cols_array(),
                                base_color,
                                surface,
                            };
                            rhi.set_constants(0, bytemuck::bytes_of(&constants));
                        }),
                    );
                    registered += 1;
                }
            }
        }
        registered
    }

    /// Runs the callback of `key`. Returns `false` when none is registered.
    pub fn prepare(&self, rhi: &dyn Rhi, key: &CallbackKey, ctx: &DrawContext<'_>) -> bool {
        match self.callbacks.get(key) {
            Some(callback) => {
                callback(rhi, ctx);
                self.invocations.fetch_add(1, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    /// Whether `key` has a callback.
    pub fn contains(&self, key: &CallbackKey) -> bool {
        self.callbacks.contains_key(key)
    }

    /// Number of registered callbacks.
    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    /// Whether no callback is registered.
    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Callbacks run so far.
    pub fn invocations(&self) -> u64 {
        self.invocations.load(Ordering::Relaxed)
    }

    /// Drops every callback.
    pub fn clear(&mut self) {
        self.callbacks.clear();
    }
}

impl fmt::Debug for MaterialCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MaterialCallbacks")
            .field("registered", &self.callbacks.len())
            .field("invocations", &self.invocations())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::system::test_support::{rhi, submit};
    use std::sync::Arc;
    use umbra_data::assets::{GpuMesh, MeshLod};
    use umbra_data::{GpuModel, SceneDescription};
    use umbra_core::renderer::BufferId;

    pub(crate) const SCENE: &str = r#"{
        "objects": [
            { "name": "rock", "model": "rock.model", "position": [0, 0, -5], "materials": {
                "gbuffer": { "shader": "pbr", "base_color": [0.5, 0.5, 0.5, 1.0] },
                "shadow": { "shader": "shadow_depth", "special": true } } },
            { "name": "tree", "model": "tree.model", "position": [3, 0, -8], "materials": {
                "gbuffer": { "shader": "pbr" },
                "glass": { "shader": "transparent" } } }
        ]
    }"#;

    pub(crate) fn scene() -> Scene {
        let desc: SceneDescription = serde_json::from_str(SCENE).unwrap();
        Scene::from_description("test", &desc).unwrap()
    }

    pub(crate) fn model(lods: usize) -> Arc<GpuModel> {
        Arc::new(GpuModel {
            meshes: vec![GpuMesh {
                name: "body".into(),
                lods: (0..lods)
                    .map(|i| MeshLod {
                        vertex_buffer: BufferId(100 + i as u64),
                        vertex_count: 36,
                        screen_fraction: if i + 1 == lods { 0.0 } else { 0.3 },
                    })
                    .collect(),
            }],
            bounding_radius: 1.0,
            source: "test.model".into(),
        })
    }

    #[test]
    fn one_pipeline_per_distinct_material() {
        let rhi = rhi();
        let scene = scene();
        let mut materials = MaterialSystem::build(rhi.as_ref(), &scene).unwrap();
        // pbr shared by both objects, plus shadow_depth and transparent
        assert_eq!(materials.len(), 3);
        let rock = scene.object("rock").unwrap();
        assert!(materials.pipeline_for(rock, SHADOW_PASS).is_some());
        assert!(materials.pipeline_for(rock, "glass").is_none());

        let before = rhi.live_resource_counts()[3];
        materials.release(rhi.as_ref());
        assert_eq!(rhi.live_resource_counts()[3], before - 3);
    }

    #[test]
    fn standard_materials_get_one_callback_per_mesh_lod() {
        let mut scene = scene();
        for object in scene.objects_mut() {
            object.set_model(Some(model(3)));
        }
        let mut callbacks = MaterialCallbacks::new();
        let rock = scene.object("rock").unwrap();
        // gbuffer only; the shadow material is special
        assert_eq!(callbacks.register_standard(rock), 3);
        let tree = scene.object("tree").unwrap();
        assert_eq!(callbacks.register_standard(tree), 6);
        assert!(callbacks.contains(&CallbackKey::new("tree", "glass", 0, 2)));
        assert!(!callbacks.contains(&CallbackKey::new("rock", SHADOW_PASS, 0, 0)));
    }

    #[test]
    fn prepare_pushes_constants() {
        let rhi = rhi();
        let mut scene = scene();
        for object in scene.objects_mut() {
            object.set_model(Some(model(1)));
        }
        let mut callbacks = MaterialCallbacks::new();
        let rock = scene.object("rock").unwrap();
        callbacks.register_standard(rock);
        let key = CallbackKey::new("rock", GBUFFER_PASS, 0, 0);
        submit(rhi.as_ref(), |rhi| {
            let ctx = DrawContext {
                object: rock,
                view_projection: Mat4::IDENTITY,
                lod: 0,
            };
            assert!(callbacks.prepare(rhi, &key, &ctx));
            assert!(!callbacks.prepare(rhi, &CallbackKey::new("ghost", GBUFFER_PASS, 0, 0), &ctx));
        });
        assert_eq!(callbacks.invocations(), 1);
    }

    #[test]
    fn objects_without_model_register_nothing() {
        let scene = scene();
        let mut callbacks = MaterialCallbacks::new();
        assert_eq!(callbacks.register_standard(scene.object("rock").unwrap()), 0);
        assert!(callbacks.is_empty());
    }
}
