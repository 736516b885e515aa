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

//! Conversions from RHI types to wgpu types.

use umbra_core::math::LinearRgba;
use umbra_core::renderer::{
    BlendState, BufferUsage, DepthStencilState, RasterizerState, TextureDimension, TextureFormat,
    TextureUsage,
};

/// A local extension trait converting RHI types into wgpu types.
/// This avoids Rust's orphan rules while keeping an idiomatic `.into_wgpu()` syntax.
pub trait IntoWgpu<T> {
    /// Consumes self and converts it into a wgpu-compatible type.
    fn into_wgpu(self) -> T;
}

impl IntoWgpu<wgpu::TextureFormat> for TextureFormat {
    fn into_wgpu(self) -> wgpu::TextureFormat {
        match self {
            TextureFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
            TextureFormat::Rgba8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
            TextureFormat::Bgra8UnormSrgb => wgpu::TextureFormat::Bgra8UnormSrgb,
            TextureFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
            TextureFormat::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
            TextureFormat::Rg16Float => wgpu::TextureFormat::Rg16Float,
            TextureFormat::R32Float => wgpu::TextureFormat::R32Float,
            TextureFormat::Depth32Float => wgpu::TextureFormat::Depth32Float,
            TextureFormat::Depth24PlusStencil8 => wgpu::TextureFormat::Depth24PlusStencil8,
        }
    }
}

/// Whether a format may be bound as a storage texture.
pub fn supports_storage(format: TextureFormat) -> bool {
    matches!(
        format,
        TextureFormat::Rgba8Unorm
            | TextureFormat::Rgba16Float
            | TextureFormat::Rgba32Float
            | TextureFormat::R32Float
    )
}

impl IntoWgpu<wgpu::TextureDimension> for TextureDimension {
    fn into_wgpu(self) -> wgpu::TextureDimension {
        match self {
            TextureDimension::D2 | TextureDimension::Cube => wgpu::TextureDimension::D2,
            TextureDimension::D3 => wgpu::TextureDimension::D3,
        }
    }
}

impl IntoWgpu<wgpu::TextureViewDimension> for TextureDimension {
    fn into_wgpu(self) -> wgpu::TextureViewDimension {
        match self {
            TextureDimension::D2 => wgpu::TextureViewDimension::D2,
            TextureDimension::D3 => wgpu::TextureViewDimension::D3,
            TextureDimension::Cube => wgpu::TextureViewDimension::Cube,
        }
    }
}

/// Texture usages for a texture of `format`. Copies are always allowed so
/// that readback and `copy_texture` work on any texture.
pub fn texture_usages(usage: TextureUsage, format: TextureFormat) -> wgpu::TextureUsages {
    let mut usages = wgpu::TextureUsages::COPY_SRC | wgpu::TextureUsages::COPY_DST;
    if usage.contains(TextureUsage::RENDER_TARGET) || usage.contains(TextureUsage::DEPTH_STENCIL) {
        usages |= wgpu::TextureUsages::RENDER_ATTACHMENT;
    }
    if usage.contains(TextureUsage::SHADER_RESOURCE) {
        usages |= wgpu::TextureUsages::TEXTURE_BINDING;
    }
    if usage.contains(TextureUsage::UNORDERED_ACCESS) && supports_storage(format) {
        usages |= wgpu::TextureUsages::STORAGE_BINDING;
    }
    usages
}

impl IntoWgpu<wgpu::BufferUsages> for BufferUsage {
    fn into_wgpu(self) -> wgpu::BufferUsages {
        // Readback goes through a staging copy, so every buffer is a copy source.
        let mut usages = wgpu::BufferUsages::COPY_SRC;
        if self.contains(BufferUsage::COPY_DST) || self.contains(BufferUsage::READBACK) {
            usages |= wgpu::BufferUsages::COPY_DST;
        }
        if self.contains(BufferUsage::INDEX) {
            usages |= wgpu::BufferUsages::INDEX;
        }
        if self.contains(BufferUsage::VERTEX) {
            usages |= wgpu::BufferUsages::VERTEX;
        }
        if self.contains(BufferUsage::CONSTANT) {
            usages |= wgpu::BufferUsages::UNIFORM;
        }
        if self.contains(BufferUsage::STORAGE) {
            usages |= wgpu::BufferUsages::STORAGE;
        }
        if self.contains(BufferUsage::INDIRECT) {
            usages |= wgpu::BufferUsages::INDIRECT;
        }
        usages
    }
}

impl IntoWgpu<wgpu::Color> for LinearRgba {
    fn into_wgpu(self) -> wgpu::Color {
        wgpu::Color {
            r: self.r as f64,
            g: self.g as f64,
            b: self.b as f64,
            a: self.a as f64,
        }
    }
}

/// Builds the depth/stencil state of a pipeline variant targeting `format`.
pub fn depth_stencil_state(
    state: DepthStencilState,
    rasterizer: RasterizerState,
    format: TextureFormat,
) -> wgpu::DepthStencilState {
    let (depth_write_enabled, depth_compare) = match state {
        DepthStencilState::Disabled => (false, wgpu::CompareFunction::Always),
        DepthStencilState::ReadOnly => (false, wgpu::CompareFunction::LessEqual),
        DepthStencilState::ReadWrite | DepthStencilState::ReadWriteStencil => {
            (true, wgpu::CompareFunction::Less)
        }
    };
    let stencil = if state == DepthStencilState::ReadWriteStencil && format.has_stencil() {
        let face = wgpu::StencilFaceState {
            compare: wgpu::CompareFunction::Always,
            fail_op: wgpu::StencilOperation::Keep,
            depth_fail_op: wgpu::StencilOperation::Keep,
            pass_op: wgpu::StencilOperation::Replace,
        };
        wgpu::StencilState {
            front: face,
            back: face,
            read_mask: 0xff,
            write_mask: 0xff,
        }
    } else {
        wgpu::StencilState::default()
    };
    let bias = if rasterizer == RasterizerState::ShadowDepthBias {
        wgpu::DepthBiasState {
            constant: 2,
            slope_scale: 2.0,
            clamp: 0.0,
        }
    } else {
        wgpu::DepthBiasState::default()
    };
    wgpu::DepthStencilState {
        format: format.into_wgpu(),
        depth_write_enabled: Some(depth_write_enabled),
        depth_compare: Some(depth_compare),
        stencil,
        bias,
    }
}

impl IntoWgpu<wgpu::PrimitiveState> for RasterizerState {
    fn into_wgpu(self) -> wgpu::PrimitiveState {
        let (cull_mode, polygon_mode) = match self {
            RasterizerState::CullBack | RasterizerState::ShadowDepthBias => {
                (Some(wgpu::Face::Back), wgpu::PolygonMode::Fill)
            }
            RasterizerState::CullFront => (Some(wgpu::Face::Front), wgpu::PolygonMode::Fill),
            RasterizerState::CullNone => (None, wgpu::PolygonMode::Fill),
            RasterizerState::Wireframe => (None, wgpu::PolygonMode::Line),
        };
        wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode,
            polygon_mode,
            unclipped_depth: false,
            conservative: false,
        }
    }
}

impl IntoWgpu<Option<wgpu::BlendState>> for BlendState {
    fn into_wgpu(self) -> Option<wgpu::BlendState> {
        match self {
            BlendState::Disabled => None,
            BlendState::AlphaBlend => Some(wgpu::BlendState::ALPHA_BLENDING),
            BlendState::Premultiplied => Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
            BlendState::Additive => Some(wgpu::BlendState {
                color: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::One,
                    dst_factor: wgpu::BlendFactor::One,
                    operation: wgpu::BlendOperation::Add,
                },
                alpha: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::One,
                    dst_factor: wgpu::BlendFactor::One,
                    operation: wgpu::BlendOperation::Add,
                },
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn texture_format_conversion() {
        let f: wgpu::TextureFormat = TextureFormat::Depth32Float.into_wgpu();
        assert_eq!(f, wgpu::TextureFormat::Depth32Float);
        let f: wgpu::TextureFormat = TextureFormat::Bgra8UnormSrgb.into_wgpu();
        assert_eq!(f, wgpu::TextureFormat::Bgra8UnormSrgb);
    }

    #[test]
    fn storage_usage_only_for_storable_formats() {
        let srgb = texture_usages(TextureUsage::UNORDERED_ACCESS, TextureFormat::Rgba8UnormSrgb);
        assert!(!srgb.contains(wgpu::TextureUsages::STORAGE_BINDING));
        let hdr = texture_usages(TextureUsage::UNORDERED_ACCESS, TextureFormat::Rgba16Float);
        assert!(hdr.contains(wgpu::TextureUsages::STORAGE_BINDING));
    }

    #[test]
    fn every_buffer_is_a_copy_source() {
        let usages: wgpu::BufferUsages = BufferUsage::VERTEX.into_wgpu();
        assert!(usages.contains(wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::VERTEX));
        assert!(!usages.contains(wgpu::BufferUsages::COPY_DST));
    }

    #[test]
    fn read_only_depth_never_writes() {
        let ds = depth_stencil_state(
            DepthStencilState::ReadOnly,
            RasterizerState::CullBack,
            TextureFormat::Depth32Float,
        );
        assert_eq!(ds.depth_write_enabled, Some(false));
        assert_eq!(ds.depth_compare, Some(wgpu::CompareFunction::LessEqual));
    }

    #[test]
    fn wireframe_uses_line_polygons() {
        let p: wgpu::PrimitiveState = RasterizerState::Wireframe.into_wgpu();
        assert_eq!(p.polygon_mode, wgpu::PolygonMode::Line);
    }
}
