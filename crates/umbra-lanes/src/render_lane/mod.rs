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

//! Render lane: the systems behind the fixed Draw pass order, from culling
//! to the UI overlay.

mod debug_gizmos;
mod gbuffer;
mod gpu_culler;
mod illumination;
mod light_probes;
mod material;
mod pass;
mod post_processing;
mod shadow_mapper;
mod skybox;
mod ui_overlay;

pub use debug_gizmos::*;
pub use gbuffer::*;
pub use gpu_culler::*;
pub use illumination::*;
pub use light_probes::*;
pub use material::*;
pub use pass::*;
pub use post_processing::*;
pub use shadow_mapper::*;
pub use skybox::*;
pub use ui_overlay::*;
