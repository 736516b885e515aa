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

//! Texture, buffer and descriptor-heap descriptions.

use std::ops::BitOr;

/// Pixel formats understood by every backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// 8-bit RGBA, linear.
    Rgba8Unorm,
    /// 8-bit RGBA, sRGB encoded.
    Rgba8UnormSrgb,
    /// 8-bit BGRA, sRGB encoded; the backbuffer format.
    Bgra8UnormSrgb,
    /// 16-bit float RGBA, used for HDR targets.
    Rgba16Float,
    /// 32-bit float RGBA.
    Rgba32Float,
    /// 16-bit float RG, used for velocity and normals.
    Rg16Float,
    /// 32-bit float single channel.
    R32Float,
    /// 32-bit float depth.
    Depth32Float,
    /// 24-bit depth with 8-bit stencil.
    Depth24PlusStencil8,
}

impl TextureFormat {
    /// Size of one texel in bytes.
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            TextureFormat::Rgba8Unorm
            | TextureFormat::Rgba8UnormSrgb
            | TextureFormat::Bgra8UnormSrgb
            | TextureFormat::Rg16Float
            | TextureFormat::R32Float
            | TextureFormat::Depth32Float
            | TextureFormat::Depth24PlusStencil8 => 4,
            TextureFormat::Rgba16Float => 8,
            TextureFormat::Rgba32Float => 16,
        }
    }

    /// Whether the format holds depth.
    pub fn is_depth(self) -> bool {
        matches!(
            self,
            TextureFormat::Depth32Float | TextureFormat::Depth24PlusStencil8
        )
    }

    /// Whether the format holds stencil.
    pub fn has_stencil(self) -> bool {
        matches!(self, TextureFormat::Depth24PlusStencil8)
    }
}

/// How a texture may be used, combinable with `|`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureUsage {
    bits: u32,
}

impl TextureUsage {
    /// Colour target.
    pub const RENDER_TARGET: Self = Self { bits: 1 << 0 };
    /// Depth/stencil target.
    pub const DEPTH_STENCIL: Self = Self { bits: 1 << 1 };
    /// Sampled by shaders.
    pub const SHADER_RESOURCE: Self = Self { bits: 1 << 2 };
    /// Written by compute shaders.
    pub const UNORDERED_ACCESS: Self = Self { bits: 1 << 3 };
    /// Copy source.
    pub const COPY_SRC: Self = Self { bits: 1 << 4 };
    /// Copy destination, including CPU uploads.
    pub const COPY_DST: Self = Self { bits: 1 << 5 };

    /// Returns the raw bits.
    pub const fn bits(&self) -> u32 {
        self.bits
    }

    /// Checks whether every flag of `other` is set.
    pub const fn contains(&self, other: Self) -> bool {
        (self.bits & other.bits) == other.bits
    }
}

impl BitOr for TextureUsage {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self {
            bits: self.bits | rhs.bits,
        }
    }
}

/// Texture shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureDimension {
    /// A 2D texture or 2D array.
    #[default]
    D2,
    /// A 3D volume, used by volumetrics and probe grids.
    D3,
    /// A cube map (six layers).
    Cube,
}

/// Describes a texture to create.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureDescriptor {
    /// Debug label.
    pub label: String,
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// Depth for 3D textures, layer count otherwise.
    pub depth_or_layers: u32,
    /// Number of mip levels.
    pub mip_levels: u32,
    /// Pixel format.
    pub format: TextureFormat,
    /// Shape.
    pub dimension: TextureDimension,
    /// Allowed usages.
    pub usage: TextureUsage,
}

impl TextureDescriptor {
    /// A single-mip 2D render target that can also be sampled.
    pub fn render_target(label: impl Into<String>, width: u32, height: u32, format: TextureFormat) -> Self {
        let usage = if format.is_depth() {
            TextureUsage::DEPTH_STENCIL | TextureUsage::SHADER_RESOURCE
        } else {
            TextureUsage::RENDER_TARGET | TextureUsage::SHADER_RESOURCE | TextureUsage::COPY_SRC
        };
        Self {
            label: label.into(),
            width,
            height,
            depth_or_layers: 1,
            mip_levels: 1,
            format,
            dimension: TextureDimension::D2,
            usage,
        }
    }

    /// A sampled 2D texture that receives CPU uploads.
    pub fn sampled(label: impl Into<String>, width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            label: label.into(),
            width,
            height,
            depth_or_layers: 1,
            mip_levels: 1,
            format,
            dimension: TextureDimension::D2,
            usage: TextureUsage::SHADER_RESOURCE | TextureUsage::COPY_DST,
        }
    }

    /// A 3D volume written by compute and sampled afterwards.
    pub fn volume(label: impl Into<String>, width: u32, height: u32, depth: u32, format: TextureFormat) -> Self {
        Self {
            label: label.into(),
            width,
            height,
            depth_or_layers: depth,
            mip_levels: 1,
            format,
            dimension: TextureDimension::D3,
            usage: TextureUsage::SHADER_RESOURCE | TextureUsage::UNORDERED_ACCESS,
        }
    }

    /// Bytes of the top mip level.
    pub fn byte_size(&self) -> u64 {
        let layers = match self.dimension {
            TextureDimension::Cube => 6,
            _ => self.depth_or_layers.max(1),
        };
        u64::from(self.width)
            * u64::from(self.height)
            * u64::from(layers)
            * u64::from(self.format.bytes_per_pixel())
    }
}

/// How a buffer may be used, combinable with `|`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferUsage {
    bits: u32,
}

impl BufferUsage {
    /// Vertex data.
    pub const VERTEX: Self = Self { bits: 1 << 0 };
    /// Index data.
    pub const INDEX: Self = Self { bits: 1 << 1 };
    /// Shader constants.
    pub const CONSTANT: Self = Self { bits: 1 << 2 };
    /// Read/write storage for compute.
    pub const STORAGE: Self = Self { bits: 1 << 3 };
    /// Indirect draw arguments.
    pub const INDIRECT: Self = Self { bits: 1 << 4 };
    /// Receives CPU uploads.
    pub const COPY_DST: Self = Self { bits: 1 << 5 };
    /// Read back by the CPU after a fence wait.
    pub const READBACK: Self = Self { bits: 1 << 6 };

    /// Returns the raw bits.
    pub const fn bits(&self) -> u32 {
        self.bits
    }

    /// Checks whether every flag of `other` is set.
    pub const fn contains(&self, other: Self) -> bool {
        (self.bits & other.bits) == other.bits
    }
}

impl BitOr for BufferUsage {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self {
            bits: self.bits | rhs.bits,
        }
    }
}

/// Describes a buffer to create.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferDescriptor {
    /// Debug label.
    pub label: String,
    /// Size in bytes.
    pub size: u64,
    /// Allowed usages.
    pub usage: BufferUsage,
}

/// The kind of descriptors a heap holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorHeapKind {
    /// Shader resource, constant and unordered-access views.
    ShaderResource,
    /// Samplers.
    Sampler,
}

/// Describes a descriptor heap to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorHeapDescriptor {
    /// Debug label.
    pub label: String,
    /// What the heap holds.
    pub kind: DescriptorHeapKind,
    /// Number of slots.
    pub capacity: u32,
}

/// Linear slot allocator backing a descriptor heap.
///
/// Both backends keep one of these per heap; released slots are reused
/// before the high-water mark grows.
#[derive(Debug, Clone)]
pub struct DescriptorAllocator {
    capacity: u32,
    next: u32,
    free: Vec<u32>,
}

impl DescriptorAllocator {
    /// Creates an allocator with `capacity` slots.
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity,
            next: 0,
            free: Vec::new(),
        }
    }

    /// Takes a free slot, or `None` when the heap is full.
    pub fn allocate(&mut self) -> Option<u32> {
        if let Some(index) = self.free.pop() {
            return Some(index);
        }
        if self.next < self.capacity {
            self.next += 1;
            Some(self.next - 1)
        } else {
            None
        }
    }

    /// Returns a slot to the heap.
    pub fn release(&mut self, index: u32) {
        if index < self.next && !self.free.contains(&index) {
            self.free.push(index);
        }
    }

    /// Slots currently handed out.
    pub fn allocated(&self) -> u32 {
        self.next - self.free.len() as u32
    }

    /// Total slots.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_flags_combine() {
        let usage = TextureUsage::RENDER_TARGET | TextureUsage::SHADER_RESOURCE;
        assert!(usage.contains(TextureUsage::RENDER_TARGET));
        assert!(!usage.contains(TextureUsage::COPY_DST));
    }

    #[test]
    fn render_target_picks_depth_usage_for_depth_formats() {
        let desc = TextureDescriptor::render_target("depth", 4, 4, TextureFormat::Depth32Float);
        assert!(desc.usage.contains(TextureUsage::DEPTH_STENCIL));
        assert!(!desc.usage.contains(TextureUsage::RENDER_TARGET));
    }

    #[test]
    fn byte_size_counts_cube_faces() {
        let mut desc = TextureDescriptor::sampled("sky", 8, 8, TextureFormat::Rgba16Float);
        desc.dimension = TextureDimension::Cube;
        assert_eq!(desc.byte_size(), 8 * 8 * 6 * 8);
    }

    #[test]
    fn allocator_exhausts_and_reuses() {
        let mut heap = DescriptorAllocator::new(2);
        assert_eq!(heap.allocate(), Some(0));
        assert_eq!(heap.allocate(), Some(1));
        assert_eq!(heap.allocate(), None);
        heap.release(0);
        assert_eq!(heap.allocated(), 1);
        assert_eq!(heap.allocate(), Some(0));
    }
}
