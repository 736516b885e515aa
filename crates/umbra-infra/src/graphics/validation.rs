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

//! Descriptor checks shared by both backends, run before anything is allocated.

use umbra_core::renderer::{
    BufferDescriptor, DescriptorHeapDescriptor, PipelineStateDescriptor, ResourceError,
    TextureDescriptor, TextureDimension,
};

pub(crate) fn texture(descriptor: &TextureDescriptor) -> Result<(), ResourceError> {
    if descriptor.width == 0 || descriptor.height == 0 {
        return Err(ResourceError::InvalidDescriptor(format!(
            "texture '{}' has a zero dimension ({}x{})",
            descriptor.label, descriptor.width, descriptor.height
        )));
    }
    if descriptor.mip_levels == 0 {
        return Err(ResourceError::InvalidDescriptor(format!(
            "texture '{}' has no mip level",
            descriptor.label
        )));
    }
    if descriptor.dimension == TextureDimension::Cube && descriptor.width != descriptor.height {
        return Err(ResourceError::InvalidDescriptor(format!(
            "cube texture '{}' is not square ({}x{})",
            descriptor.label, descriptor.width, descriptor.height
        )));
    }
    Ok(())
}

pub(crate) fn buffer(descriptor: &BufferDescriptor) -> Result<(), ResourceError> {
    if descriptor.size == 0 {
        return Err(ResourceError::InvalidDescriptor(format!(
            "buffer '{}' has size 0",
            descriptor.label
        )));
    }
    Ok(())
}

pub(crate) fn heap(descriptor: &DescriptorHeapDescriptor) -> Result<(), ResourceError> {
    if descriptor.capacity == 0 {
        return Err(ResourceError::InvalidDescriptor(format!(
            "descriptor heap '{}' has no slot",
            descriptor.label
        )));
    }
    Ok(())
}

pub(crate) fn pipeline(descriptor: &PipelineStateDescriptor) -> Result<(), ResourceError> {
    if descriptor.color_formats.iter().any(|f| f.is_depth()) {
        return Err(ResourceError::InvalidDescriptor(format!(
            "pipeline '{}' uses a depth format as a colour target",
            descriptor.label
        )));
    }
    if descriptor.depth_format.is_some_and(|f| !f.is_depth()) {
        return Err(ResourceError::InvalidDescriptor(format!(
            "pipeline '{}' uses a colour format as its depth target",
            descriptor.label
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use umbra_core::renderer::TextureFormat;

    #[test]
    fn cube_textures_must_be_square() {
        let mut desc = TextureDescriptor::sampled("sky", 64, 32, TextureFormat::Rgba8UnormSrgb);
        desc.dimension = TextureDimension::Cube;
        assert!(texture(&desc).is_err());
        desc.height = 64;
        assert!(texture(&desc).is_ok());
    }

    #[test]
    fn depth_colour_targets_are_rejected() {
        let desc = PipelineStateDescriptor::graphics("bad", vec![TextureFormat::Depth32Float], None);
        assert!(pipeline(&desc).is_err());
    }
}
