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

//! One-time initialisation of the global `env_logger` backend.

use std::sync::Once;

/// Logger configuration.
///
/// `env_filter` follows the `env_logger` filter syntax, e.g.
/// `"info"` or `"umbra_lanes=debug,wgpu=warn"`.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Explicit filter. Falls back to `RUST_LOG`, then `info`.
    pub env_filter: Option<String>,
    /// ANSI colouring behaviour.
    pub write_style: env_logger::WriteStyle,
    /// Route output through the test harness capture.
    pub is_test: bool,
}

impl LoggingConfig {
    /// A configuration with an explicit filter.
    pub fn with_filter(filter: impl Into<String>) -> Self {
        Self {
            env_filter: Some(filter.into()),
            ..Self::default()
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: None,
            write_style: env_logger::WriteStyle::Auto,
            is_test: false,
        }
    }
}

static INIT: Once = Once::new();

/// Initialises the global logger once; later calls are ignored.
///
/// `wgpu` and `naga` are capped at `warn` unless the filter names them.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();
        builder
            .filter_module("wgpu_core", log::LevelFilter::Warn)
            .filter_module("wgpu_hal", log::LevelFilter::Warn)
            .filter_module("naga", log::LevelFilter::Warn);

        if let Some(filter) = config.env_filter {
            builder.parse_filters(&filter);
        } else if let Ok(filter) = std::env::var("RUST_LOG") {
            builder.parse_filters(&filter);
        } else {
            builder.filter_level(log::LevelFilter::Info);
        }

        builder.write_style(config.write_style);
        builder.is_test(config.is_test);

        // Another logger may already be installed (e.g. by a host application).
        if builder.try_init().is_err() {
            log::debug!("A global logger was already installed; keeping it.");
        }
        log::debug!("logging initialized");
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init_logging(LoggingConfig {
            is_test: true,
            ..LoggingConfig::with_filter("debug")
        });
        init_logging(LoggingConfig::default());
        log::info!("still logging");
    }
}
