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

//! # Umbra Lanes
//!
//! The render systems driven by the frame orchestrator, grouped in lanes:
//!
//! - [`render_lane`]: geometry buffer, sky, shadows, illumination, light
//!   probes, post-processing, culling, gizmos and the UI overlay, plus the
//!   pass schedule and the material system.
//! - [`environment_lane`]: terrain, foliage, wind and the volumetric fog and
//!   clouds.
//!
//! Every system records into whichever command list is open on the [`Rhi`];
//! none of them begins, ends or submits lists.
//!
//! [`Rhi`]: umbra_core::renderer::Rhi

#![warn(missing_docs)]

pub mod environment_lane;
pub mod render_lane;
pub mod system;

pub use system::{Drawable, FrameContext, OwnedResources, RenderSystem, Updatable};
