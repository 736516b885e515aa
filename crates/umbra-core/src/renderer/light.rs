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

//! Light sources.
//!
//! The [`DirectionalLight`] broadcasts its orientation through a
//! [`Signal`]; shadow mapping, debug gizmos and light probes subscribe
//! without the light knowing who they are.

use crate::event::{Signal, Subscription};
use crate::math::{LinearRgba, Quaternion, Vec3};

/// The axis a directional light points along before rotation.
pub const LIGHT_FORWARD: Vec3 = Vec3::new(0.0, 0.0, -1.0);

/// Orientation of a directional light, broadcast on every change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightRotation {
    /// The rotation applied to [`LIGHT_FORWARD`].
    pub rotation: Quaternion,
    /// The resulting unit direction the light travels along.
    pub direction: Vec3,
}

impl LightRotation {
    /// Builds the broadcast payload for `rotation`.
    pub fn from_rotation(rotation: Quaternion) -> Self {
        let rotation = rotation.normalize();
        Self {
            rotation,
            direction: rotation.rotate_vec3(LIGHT_FORWARD).normalize(),
        }
    }
}

/// An infinitely distant light, like the sun.
#[derive(Debug)]
pub struct DirectionalLight {
    rotation: LightRotation,
    /// Colour in linear space.
    pub color: LinearRgba,
    /// Intensity multiplier.
    pub intensity: f32,
    rotation_changed: Signal<LightRotation>,
}

impl DirectionalLight {
    /// The sun direction used when a scene does not declare one.
    pub fn default_direction() -> Vec3 {
        Vec3::new(-0.3, -1.0, -0.4).normalize()
    }

    /// Creates a light pointing along `direction`.
    pub fn from_direction(direction: Vec3, color: LinearRgba, intensity: f32) -> Self {
        let direction = if direction.length_squared() > 0.0 && direction.is_finite() {
            direction
        } else {
            Self::default_direction()
        };
        Self {
            rotation: LightRotation::from_rotation(Quaternion::from_rotation_arc(
                LIGHT_FORWARD,
                direction,
            )),
            color,
            intensity: intensity.max(0.0),
            rotation_changed: Signal::new(),
        }
    }

    /// Current orientation.
    pub fn rotation(&self) -> LightRotation {
        self.rotation
    }

    /// Current unit direction.
    pub fn direction(&self) -> Vec3 {
        self.rotation.direction
    }

    /// Changes the orientation and notifies every listener before returning.
    pub fn set_rotation(&mut self, rotation: Quaternion) {
        self.rotation = LightRotation::from_rotation(rotation);
        log::trace!("Sun direction is now {:?}", self.rotation.direction);
        self.rotation_changed.emit(&self.rotation);
    }

    /// Points the light along `direction` and notifies listeners.
    pub fn set_direction(&mut self, direction: Vec3) {
        self.set_rotation(Quaternion::from_rotation_arc(LIGHT_FORWARD, direction));
    }

    /// Rotates the light by `angle_radians` around `axis` and notifies listeners.
    pub fn rotate(&mut self, axis: Vec3, angle_radians: f32) {
        let delta = Quaternion::from_axis_angle(axis, angle_radians);
        let rotation = delta * self.rotation.rotation;
        self.set_rotation(rotation);
    }

    /// Registers a listener for orientation changes.
    #[must_use = "dropping the subscription immediately unregisters the listener"]
    pub fn on_rotation_changed<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&LightRotation) + Send + Sync + 'static,
    {
        self.rotation_changed.subscribe(listener)
    }

    /// Number of live rotation listeners.
    pub fn listener_count(&self) -> usize {
        self.rotation_changed.listener_count()
    }
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self::from_direction(Self::default_direction(), LinearRgba::WHITE, 1.0)
    }
}

/// A local light emitting in all directions from a point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    /// World-space position.
    pub position: Vec3,
    /// Radius of influence; never negative.
    pub radius: f32,
    /// Colour in linear space.
    pub color: LinearRgba,
    /// Intensity multiplier.
    pub intensity: f32,
    /// Editor selection flag, carried but unused by rendering.
    pub selected_in_editor: bool,
}

impl PointLight {
    /// Creates a point light, clamping a negative radius to zero.
    pub fn new(position: Vec3, radius: f32, color: LinearRgba, intensity: f32) -> Self {
        Self {
            position,
            radius: radius.max(0.0),
            color,
            intensity,
            selected_in_editor: false,
        }
    }

    /// Whether `point` lies within the light's radius.
    pub fn reaches(&self, point: Vec3) -> bool {
        (point - self.position).length_squared() <= self.radius * self.radius
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::sync::{Arc, Mutex};

    #[test]
    fn from_direction_points_the_light() {
        let light = DirectionalLight::from_direction(Vec3::new(0.0, -1.0, 0.0), LinearRgba::WHITE, 2.0);
        assert_relative_eq!(light.direction().y, -1.0, epsilon = 1e-5);
    }

    #[test]
    fn degenerate_direction_falls_back_to_default() {
        let light = DirectionalLight::from_direction(Vec3::ZERO, LinearRgba::WHITE, 1.0);
        let expected = DirectionalLight::default_direction();
        assert_relative_eq!(light.direction().x, expected.x, epsilon = 1e-4);
    }

    #[test]
    fn listeners_see_new_rotation_before_setter_returns() {
        let mut light = DirectionalLight::default();
        let seen = Arc::new(Mutex::new(None));
        let _sub = {
            let seen = Arc::clone(&seen);
            light.on_rotation_changed(move |r| *seen.lock().unwrap() = Some(r.direction))
        };

        light.set_direction(Vec3::new(1.0, -1.0, 0.0));
        let direction = seen.lock().unwrap().expect("listener not called");
        assert_relative_eq!(direction.x, light.direction().x, epsilon = 1e-6);
        assert_relative_eq!(direction.x, std::f32::consts::FRAC_1_SQRT_2, epsilon = 1e-4);
    }

    #[test]
    fn rotate_composes_with_current_orientation() {
        let mut light = DirectionalLight::from_direction(Vec3::new(0.0, 0.0, -1.0), LinearRgba::WHITE, 1.0);
        light.rotate(Vec3::Y, std::f32::consts::FRAC_PI_2);
        // -Z rotated a quarter turn around +Y lands on -X.
        assert_relative_eq!(light.direction().x, -1.0, epsilon = 1e-4);
    }

    #[test]
    fn dropped_subscription_is_not_called() {
        let mut light = DirectionalLight::default();
        let sub = light.on_rotation_changed(|_| panic!("should be unsubscribed"));
        assert_eq!(light.listener_count(), 1);
        drop(sub);
        light.set_direction(Vec3::new(0.0, -1.0, 0.1));
        assert_eq!(light.listener_count(), 0);
    }

    #[test]
    fn point_light_radius_is_clamped() {
        let light = PointLight::new(Vec3::ZERO, -3.0, LinearRgba::WHITE, 1.0);
        assert_eq!(light.radius, 0.0);
        assert!(light.reaches(Vec3::ZERO));
        assert!(!light.reaches(Vec3::X));
    }
}
