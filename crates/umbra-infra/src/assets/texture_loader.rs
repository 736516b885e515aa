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

//! Image decoding and upload.

use std::path::Path;
use std::sync::Arc;

use umbra_core::renderer::{Rhi, TextureDescriptor, TextureFormat};
use umbra_data::{GpuTexture, LoadError, ResourceLoader};

/// Decodes any format the `image` crate understands into an sRGB RGBA8
/// texture and uploads it.
#[derive(Debug, Clone)]
pub struct ImageTextureLoader {
    rhi: Arc<dyn Rhi>,
}

impl ImageTextureLoader {
    /// Creates a loader uploading through `rhi`.
    pub fn new(rhi: Arc<dyn Rhi>) -> Self {
        Self { rhi }
    }
}

impl ResourceLoader<Arc<GpuTexture>> for ImageTextureLoader {
    fn load(&self, path: &Path) -> Result<Arc<GpuTexture>, LoadError> {
        let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let img = image::load_from_memory(&bytes).map_err(|e| LoadError::Decode {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        // Keep the texels in sRGB space.
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        let label = path.to_string_lossy().into_owned();
        let descriptor =
            TextureDescriptor::sampled(label.clone(), width, height, TextureFormat::Rgba8UnormSrgb);

        let gpu_error = |source| LoadError::Gpu {
            path: path.to_path_buf(),
            source,
        };
        let id = self.rhi.create_texture(&descriptor).map_err(gpu_error)?;
        if let Err(e) = self.rhi.write_texture(id, rgba.as_raw()) {
            if let Err(destroy) = self.rhi.destroy_texture(id) {
                log::warn!("Failed to release texture '{label}' after a failed upload: {destroy}");
            }
            return Err(gpu_error(e));
        }
        log::debug!("Loaded texture '{label}' ({width}x{height})");

        Ok(Arc::new(GpuTexture {
            id,
            width,
            height,
            format: TextureFormat::Rgba8UnormSrgb,
            source: label,
        }))
    }
}
