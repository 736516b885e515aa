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

//! Fixed-function state set on the current command list.

/// Depth and stencil test configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DepthStencilState {
    /// No depth test, no depth write.
    Disabled,
    /// Depth test `LessEqual`, no write.
    ReadOnly,
    /// Depth test `Less` with write.
    #[default]
    ReadWrite,
    /// Depth test with write, stencil replace on pass.
    ReadWriteStencil,
}

/// Rasterizer configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RasterizerState {
    /// Cull back faces.
    #[default]
    CullBack,
    /// Cull front faces.
    CullFront,
    /// No culling.
    CullNone,
    /// Lines, no culling.
    Wireframe,
    /// Front-face culling with a slope-scaled depth bias, for shadow maps.
    ShadowDepthBias,
}

/// Colour blending configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendState {
    /// Overwrite the target.
    #[default]
    Disabled,
    /// Classic `src * a + dst * (1 - a)`.
    AlphaBlend,
    /// `src + dst`.
    Additive,
    /// `src + dst * (1 - a)`.
    Premultiplied,
}

/// A viewport rectangle with a depth range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Left edge, in pixels.
    pub x: f32,
    /// Top edge, in pixels.
    pub y: f32,
    /// Width, in pixels.
    pub width: f32,
    /// Height, in pixels.
    pub height: f32,
    /// Minimum depth.
    pub min_depth: f32,
    /// Maximum depth.
    pub max_depth: f32,
}

impl Viewport {
    /// A viewport covering `width x height` with the full depth range.
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// A scissor rectangle, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScissorRect {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width.
    pub width: u32,
    /// Height.
    pub height: u32,
}

impl ScissorRect {
    /// A rectangle covering `width x height`.
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }
}

/// The usage state a resource is transitioned into before it is accessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResourceState {
    /// No particular usage.
    #[default]
    Common,
    /// Bound as a colour target.
    RenderTarget,
    /// Bound as a writable depth target.
    DepthWrite,
    /// Bound as a read-only depth target.
    DepthRead,
    /// Sampled by shaders.
    ShaderResource,
    /// Read and written by compute shaders.
    UnorderedAccess,
    /// Source of a copy.
    CopySource,
    /// Destination of a copy.
    CopyDest,
    /// Ready to be presented.
    Present,
}
