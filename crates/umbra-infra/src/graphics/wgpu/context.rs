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

//! Instance, adapter, device and queue of the wgpu backend.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use wgpu::{Backend, Features, Instance};

/// Returns a human-readable name for a backend.
pub fn backend_name(backend: Backend) -> &'static str {
    match backend {
        Backend::Vulkan => "Vulkan",
        Backend::Metal => "Metal",
        Backend::Dx12 => "DirectX 12",
        Backend::Gl => "OpenGL",
        Backend::BrowserWebGpu => "WebGPU",
        Backend::Noop => "No-op",
    }
}

/// Holds the core wgpu objects. Rendering is offscreen: the backbuffers are
/// regular textures owned by the RHI, so no surface is created here.
#[derive(Debug)]
pub(crate) struct WgpuContext {
    pub(crate) device: wgpu::Device,
    pub(crate) queue: wgpu::Queue,
    pub(crate) adapter_name: String,
    pub(crate) adapter_backend: Backend,
}

impl WgpuContext {
    /// Picks an adapter and creates the logical device.
    pub(crate) async fn new(power_preference: wgpu::PowerPreference) -> Result<Self> {
        log::info!("Initializing wgpu context...");
        let instance = Instance::new(wgpu::InstanceDescriptor::new_without_display_handle());

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| anyhow!("Failed to find a suitable adapter: {e}"))?;

        let adapter_info = adapter.get_info();
        log::info!(
            "Using graphics adapter: \"{}\" (Backend: {})",
            adapter_info.name,
            backend_name(adapter_info.backend)
        );

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Umbra Logical Device"),
                required_features: Features::empty(),
                required_limits: wgpu::Limits::default(),
                experimental_features: wgpu::ExperimentalFeatures::default(),
                memory_hints: wgpu::MemoryHints::default(),
                trace: wgpu::Trace::default(),
            })
            .await
            .map_err(|e| anyhow!("Failed to create logical device: {e}"))?;
        log::info!("Logical device and command queue created.");

        device.on_uncaptured_error(Arc::new(|e| {
            log::error!("WGPU Uncaptured Error: {e:?}");
        }));

        Ok(Self {
            device,
            queue,
            adapter_name: adapter_info.name,
            adapter_backend: adapter_info.backend,
        })
    }

    /// Blocks until the queue is empty and every completion callback ran.
    pub(crate) fn poll_blocking(&self) {
        if let Err(e) = self.device.poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout: None,
        }) {
            log::warn!("Failed to poll device: {e:?}");
        }
    }

    /// Processes finished work without blocking.
    pub(crate) fn poll_non_blocking(&self) {
        if let Err(e) = self.device.poll(wgpu::PollType::Poll) {
            log::warn!("Failed to poll device (non-blocking): {e:?}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_names() {
        assert_eq!(backend_name(Backend::Vulkan), "Vulkan");
        assert_eq!(backend_name(Backend::Metal), "Metal");
        assert_eq!(backend_name(Backend::Dx12), "DirectX 12");
        assert_eq!(backend_name(Backend::Gl), "OpenGL");
    }
}
