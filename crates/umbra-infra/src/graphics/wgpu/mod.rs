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

//! The wgpu backend: native GPU rendering into offscreen backbuffers.

mod context;
pub mod conversions;
mod device;
mod executor;
mod resources;

pub use context::backend_name;
pub use device::WgpuRhi;

use umbra_core::renderer::PresentMode;

/// Construction parameters of a [`WgpuRhi`].
#[derive(Debug, Clone, PartialEq)]
pub struct WgpuConfig {
    /// Backbuffer width.
    pub width: u32,
    /// Backbuffer height.
    pub height: u32,
    /// Reported fullscreen flag.
    pub fullscreen: bool,
    /// Number of per-frame command lists.
    pub frames_in_flight: usize,
    /// Reported presentation mode.
    pub present_mode: PresentMode,
    /// Adapter selection preference.
    pub power_preference: ::wgpu::PowerPreference,
}

impl Default for WgpuConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            fullscreen: false,
            frames_in_flight: 2,
            present_mode: PresentMode::Fifo,
            power_preference: ::wgpu::PowerPreference::HighPerformance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use umbra_core::math::LinearRgba;
    use umbra_core::renderer::{
        BufferDescriptor, BufferUsage, CommandListIndex, GraphicsBackendType, ResourceError, Rhi,
        TextureDescriptor, TextureFormat,
    };

    fn try_rhi() -> Option<WgpuRhi> {
        match WgpuRhi::new(WgpuConfig {
            width: 64,
            height: 64,
            ..Default::default()
        }) {
            Ok(rhi) => Some(rhi),
            Err(e) => {
                eprintln!("skipping wgpu test, no adapter: {e}");
                None
            }
        }
    }

    #[test]
    fn frame_protocol_on_gpu() {
        let Some(rhi) = try_rhi() else { return };
        assert_eq!(rhi.adapter_info().backend, GraphicsBackendType::Wgpu);
        let list = CommandListIndex(1);
        rhi.begin_graphics_command_list(list).unwrap();
        rhi.set_main_render_target();
        rhi.clear_main_render_target(LinearRgba::BLACK);
        rhi.clear_main_depth_stencil_target(1.0, 0);
        rhi.transition_main_render_target_to_present();
        rhi.end_graphics_command_list(list).unwrap();
        let fence = rhi.execute_command_lists(list).unwrap();
        rhi.present_graphics().unwrap();
        rhi.wait_for_fence(fence).unwrap();
        assert!(rhi.completed_fence_value() >= fence);
    }

    #[test]
    fn buffer_readback_on_gpu() {
        let Some(rhi) = try_rhi() else { return };
        let buffer = rhi
            .create_buffer(&BufferDescriptor {
                label: "readback".into(),
                size: 16,
                usage: BufferUsage::COPY_DST | BufferUsage::READBACK,
            })
            .unwrap();
        let bytes: Vec<u8> = (0..16).collect();
        rhi.write_buffer(buffer, 0, &bytes).unwrap();
        assert_eq!(rhi.read_buffer(buffer).unwrap(), bytes);
        assert!(matches!(
            rhi.write_buffer(buffer, 8, &bytes),
            Err(ResourceError::OutOfBounds)
        ));
        rhi.destroy_buffer(buffer).unwrap();
    }

    #[test]
    fn rejects_invalid_textures_on_gpu() {
        let Some(rhi) = try_rhi() else { return };
        let desc = TextureDescriptor::sampled("empty", 0, 4, TextureFormat::Rgba8UnormSrgb);
        assert!(matches!(
            rhi.create_texture(&desc),
            Err(ResourceError::InvalidDescriptor(_))
        ));
    }
}
