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

//! Pipeline state descriptions.
//!
//! Shader programs are opaque to the engine. A pipeline either names a
//! program the backend provides (`ShaderSource::Builtin`) or carries WGSL
//! source with `vs_main`/`fs_main` (graphics) or `cs_main` (compute) entry
//! points.

use super::{BlendState, DepthStencilState, RasterizerState, TextureFormat};

/// Whether a pipeline rasterises or computes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineKind {
    /// Vertex + fragment.
    Graphics,
    /// Compute.
    Compute,
}

/// Where the shader program of a pipeline comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ShaderSource {
    /// A program identified by name and supplied by the backend, if it has one.
    Builtin(String),
    /// WGSL source.
    Wgsl(String),
}

/// Entry point of the vertex stage.
pub const VERTEX_ENTRY: &str = "vs_main";
/// Entry point of the fragment stage.
pub const FRAGMENT_ENTRY: &str = "fs_main";
/// Entry point of the compute stage.
pub const COMPUTE_ENTRY: &str = "cs_main";

/// Describes a pipeline state object.
///
/// The fixed-function fields are the defaults the pipeline was compiled
/// with; the state setters on a command list may override them per draw.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PipelineStateDescriptor {
    /// Debug label; also the material or pass it belongs to.
    pub label: String,
    /// Graphics or compute.
    pub kind: PipelineKind,
    /// The shader program.
    pub shader: ShaderSource,
    /// Formats of the colour targets.
    pub color_formats: Vec<TextureFormat>,
    /// Format of the depth target, if any.
    pub depth_format: Option<TextureFormat>,
    /// Depth/stencil defaults.
    pub depth_stencil: DepthStencilState,
    /// Rasterizer defaults.
    pub rasterizer: RasterizerState,
    /// Blend defaults.
    pub blend: BlendState,
}

impl PipelineStateDescriptor {
    /// A graphics pipeline using a backend-provided program.
    pub fn graphics(label: impl Into<String>, color_formats: Vec<TextureFormat>, depth_format: Option<TextureFormat>) -> Self {
        let label = label.into();
        Self {
            shader: ShaderSource::Builtin(label.clone()),
            label,
            kind: PipelineKind::Graphics,
            color_formats,
            depth_stencil: if depth_format.is_some() {
                DepthStencilState::ReadWrite
            } else {
                DepthStencilState::Disabled
            },
            depth_format,
            rasterizer: RasterizerState::CullBack,
            blend: BlendState::Disabled,
        }
    }

    /// A compute pipeline using a backend-provided program.
    pub fn compute(label: impl Into<String>) -> Self {
        let label = label.into();
        Self {
            shader: ShaderSource::Builtin(label.clone()),
            label,
            kind: PipelineKind::Compute,
            color_formats: Vec::new(),
            depth_format: None,
            depth_stencil: DepthStencilState::Disabled,
            rasterizer: RasterizerState::CullNone,
            blend: BlendState::Disabled,
        }
    }

    /// Replaces the shader program.
    pub fn with_shader(mut self, shader: ShaderSource) -> Self {
        self.shader = shader;
        self
    }

    /// Replaces the fixed-function defaults.
    pub fn with_states(mut self, depth_stencil: DepthStencilState, rasterizer: RasterizerState, blend: BlendState) -> Self {
        self.depth_stencil = depth_stencil;
        self.rasterizer = rasterizer;
        self.blend = blend;
        self
    }
}
