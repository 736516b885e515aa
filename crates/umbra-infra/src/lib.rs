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

//! # Umbra Infra
//!
//! Concrete implementations of the contracts in `umbra-core`: the wgpu and
//! headless RHI backends, plus the texture and model loaders that turn files
//! into GPU resources through any RHI.

#![warn(missing_docs)]

pub mod assets;
pub mod graphics;

pub use assets::{ImageTextureLoader, ProceduralModelLoader};
pub use graphics::headless::{ExecutedList, HeadlessConfig, HeadlessRhi};
pub use graphics::wgpu::{WgpuConfig, WgpuRhi};
