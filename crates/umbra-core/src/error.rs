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

//! The top-level error of the engine.

use std::fmt;

use crate::config::ConfigError;
use crate::renderer::error::{CommandListError, ResourceError, RhiError};

/// A fatal error surfaced to the entry point.
///
/// Startup aborts on any of these before the frame loop begins.
#[derive(Debug)]
pub enum EngineError {
    /// The graphics configuration is missing or malformed.
    Config(ConfigError),
    /// The graphics device failed.
    Rhi(RhiError),
    /// A required service was never registered. Carries the type name.
    MissingService(&'static str),
    /// The scene description could not be loaded.
    Scene(String),
    /// The command-list protocol was violated by the orchestrator.
    CommandList(CommandListError),
    /// A resource the engine cannot run without failed.
    Resource(ResourceError),
    /// An operation was attempted in the wrong lifecycle state.
    InvalidState {
        /// The operation attempted.
        operation: &'static str,
        /// The state the object was in.
        state: String,
    },
    /// The declared pass dependencies are inconsistent.
    Schedule(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Config(err) => write!(f, "{err}"),
            EngineError::Rhi(err) => write!(f, "{err}"),
            EngineError::MissingService(name) => {
                write!(f, "Required service '{name}' is not registered")
            }
            EngineError::Scene(msg) => write!(f, "Scene load failed: {msg}"),
            EngineError::CommandList(err) => write!(f, "{err}"),
            EngineError::Resource(err) => write!(f, "{err}"),
            EngineError::InvalidState { operation, state } => {
                write!(f, "Cannot {operation} while {state}")
            }
            EngineError::Schedule(msg) => write!(f, "Invalid pass schedule: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Config(err) => Some(err),
            EngineError::Rhi(err) => Some(err),
            EngineError::CommandList(err) => Some(err),
            EngineError::Resource(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ConfigError> for EngineError {
    fn from(err: ConfigError) -> Self {
        EngineError::Config(err)
    }
}

impl From<RhiError> for EngineError {
    fn from(err: RhiError) -> Self {
        EngineError::Rhi(err)
    }
}

impl From<CommandListError> for EngineError {
    fn from(err: CommandListError) -> Self {
        EngineError::CommandList(err)
    }
}

impl From<ResourceError> for EngineError {
    fn from(err: ResourceError) -> Self {
        EngineError::Resource(err)
    }
}
