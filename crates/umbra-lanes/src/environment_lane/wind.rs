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

use std::f64::consts::TAU;

use umbra_core::math::Vec3;
use umbra_core::FrameTime;
use umbra_data::scene::WindSettings;

/// Relative strength added by a gust at its peak.
pub const GUST_AMPLITUDE: f32 = 0.35;

/// The scene wind. Passive: foliage and clouds sample it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Wind {
    direction: Vec3,
    strength: f32,
    gust_frequency: f32,
    time: f64,
}

impl Wind {
    /// Creates the wind described by `settings`. A degenerate direction
    /// falls back to +X.
    pub fn new(settings: &WindSettings) -> Self {
        let direction = if settings.direction.length_squared() > 1e-8 && settings.direction.is_finite() {
            settings.direction.normalize()
        } else {
            Vec3::X
        };
        Self {
            direction,
            strength: settings.strength.max(0.0),
            gust_frequency: settings.gust_frequency.max(0.0),
            time: 0.0,
        }
    }

    /// Unit direction the wind blows towards.
    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    /// Base strength.
    pub fn strength(&self) -> f32 {
        self.strength
    }

    /// The wind velocity at `time` seconds.
    pub fn sample(&self, time: f64) -> Vec3 {
        let gust = (TAU * f64::from(self.gust_frequency) * time).sin() as f32;
        self.direction * (self.strength * (1.0 + GUST_AMPLITUDE * gust))
    }

    /// The wind velocity at the last update.
    pub fn current(&self) -> Vec3 {
        self.sample(self.time)
    }

    /// Advances the wind clock.
    pub fn update(&mut self, time: &FrameTime) {
        self.time = time.total;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn gusts_oscillate_around_the_base_strength() {
        let wind = Wind::new(&WindSettings {
            direction: Vec3::new(0.0, 0.0, 2.0),
            strength: 2.0,
            gust_frequency: 1.0,
        });
        assert_relative_eq!(wind.direction().z, 1.0);
        assert_relative_eq!(wind.sample(0.0).z, 2.0, epsilon = 1e-5);
        assert_relative_eq!(wind.sample(0.25).z, 2.0 * 1.35, epsilon = 1e-4);
        assert_relative_eq!(wind.sample(0.75).z, 2.0 * 0.65, epsilon = 1e-4);
    }

    #[test]
    fn calm_and_degenerate_settings() {
        let wind = Wind::new(&WindSettings {
            direction: Vec3::ZERO,
            strength: -1.0,
            gust_frequency: 3.0,
        });
        assert_eq!(wind.direction(), Vec3::X);
        assert_eq!(wind.sample(1.3), Vec3::ZERO);

        let mut steady = Wind::new(&WindSettings::default());
        steady.update(&FrameTime {
            total: 5.0,
            delta: 0.016,
            frame_index: 300,
        });
        assert_eq!(steady.current(), Vec3::ZERO);
    }
}
