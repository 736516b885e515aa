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

//! The render hardware interface and the renderer-facing core types.

pub mod api;
pub mod camera;
pub mod command_list;
pub mod error;
pub mod in_flight;
pub mod input;
pub mod light;
pub mod traits;

pub use self::api::*;
pub use self::camera::Camera;
pub use self::command_list::{report_violation, Command, CommandListSet, CommandListState};
pub use self::error::{CommandListError, ResourceError, RhiError};
pub use self::in_flight::InFlightTracker;
pub use self::input::{Key, KeyboardInput, NoInput, PressedKeys};
pub use self::light::{DirectionalLight, LightRotation, PointLight};
pub use self::traits::Rhi;
