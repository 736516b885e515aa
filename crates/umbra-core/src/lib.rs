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

//! # Umbra Core
//!
//! Foundational crate containing the render hardware interface contract,
//! the command-list protocol, core types and errors shared by every other
//! Umbra crate.

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod event;
pub mod graph;
pub mod math;
pub mod renderer;
pub mod service_registry;
pub mod time;

pub use config::{ConfigError, GraphicsConfig, QualitySettings};
pub use error::EngineError;
pub use service_registry::ServiceRegistry;
pub use time::{FrameClock, FrameTime, Stopwatch};
