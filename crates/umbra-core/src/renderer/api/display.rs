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

//! Display and adapter information.

use std::fmt;

/// How frames are queued for presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PresentMode {
    /// Vertical sync.
    #[default]
    Fifo,
    /// Latest frame wins, no tearing.
    Mailbox,
    /// No sync, may tear.
    Immediate,
}

/// The observable configuration of the backbuffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DisplayMode {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Whether the output is fullscreen.
    pub fullscreen: bool,
    /// Presentation mode.
    pub present_mode: PresentMode,
}

/// The backend implementing the RHI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GraphicsBackendType {
    /// Native GPU through wgpu.
    Wgpu,
    /// CPU-side virtual GPU.
    Headless,
}

impl fmt::Display for GraphicsBackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphicsBackendType::Wgpu => write!(f, "wgpu"),
            GraphicsBackendType::Headless => write!(f, "headless"),
        }
    }
}

/// Information about the adapter behind an RHI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterInfo {
    /// Adapter name as reported by the driver.
    pub name: String,
    /// The backend implementing the RHI.
    pub backend: GraphicsBackendType,
    /// The native API in use, e.g. `"Vulkan"`.
    pub api: String,
}
