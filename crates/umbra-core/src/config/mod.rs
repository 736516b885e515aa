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

//! Graphics configuration: named quality presets loaded from JSON, and the
//! [`QualitySettings`] value derived from the selected preset.
//!
//! Quality is never global state. Every subsystem receives the settings it
//! needs through its constructor.

mod graphics;
mod quality;

pub use graphics::{GraphicsConfig, GraphicsPreset};
pub use quality::{QualitySettings, MAX_QUALITY_LEVEL};

use std::fmt;
use std::path::PathBuf;

/// An error raised while loading or validating the graphics configuration.
///
/// Every variant is fatal at startup.
#[derive(Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    Io {
        /// The path that was being read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
    /// The JSON was malformed or a required field was missing.
    Parse(String),
    /// The document parsed but its values are inconsistent.
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "Failed to read config '{}': {source}", path.display())
            }
            ConfigError::Parse(msg) => write!(f, "Malformed graphics config: {msg}"),
            ConfigError::Invalid(msg) => write!(f, "Invalid graphics config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}
