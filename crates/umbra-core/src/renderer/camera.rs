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

//! A free-flying perspective camera.

use crate::math::{Mat4, Vec3, FRAC_PI_2};

use super::input::{Key, KeyboardInput};

/// A first-person camera driven by the keyboard.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    /// World-space position.
    pub position: Vec3,
    /// Rotation around +Y, in radians. Zero looks down -Z.
    pub yaw: f32,
    /// Rotation above the horizon, in radians.
    pub pitch: f32,
    /// Vertical field of view, in radians.
    pub fov_y: f32,
    /// Width over height.
    pub aspect_ratio: f32,
    /// Near plane distance.
    pub z_near: f32,
    /// Far plane distance.
    pub z_far: f32,
    /// Units per second.
    pub move_speed: f32,
    /// Radians per second.
    pub turn_speed: f32,
}

impl Camera {
    /// Creates a camera at `position` looking along `yaw`/`pitch`.
    pub fn new(position: Vec3, yaw: f32, pitch: f32, aspect_ratio: f32) -> Self {
        Self {
            position,
            yaw,
            pitch: pitch.clamp(-FRAC_PI_2 + 0.01, FRAC_PI_2 - 0.01),
            fov_y: 60f32.to_radians(),
            aspect_ratio,
            z_near: 0.1,
            z_far: 1000.0,
            move_speed: 5.0,
            turn_speed: 1.5,
        }
    }

    /// Unit view direction.
    pub fn forward(&self) -> Vec3 {
        let (sy, cy) = self.yaw.sin_cos();
        let (sp, cp) = self.pitch.sin_cos();
        Vec3::new(-sy * cp, sp, -cy * cp)
    }

    /// Unit vector to the camera's right, parallel to the ground.
    pub fn right(&self) -> Vec3 {
        self.forward().cross(Vec3::Y).normalize()
    }

    /// World-to-view matrix.
    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.forward(), Vec3::Y)
            .unwrap_or(Mat4::IDENTITY)
    }

    /// View-to-clip matrix.
    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh_zo(self.fov_y, self.aspect_ratio, self.z_near, self.z_far)
    }

    /// World-to-clip matrix.
    pub fn view_projection(&self) -> Mat4 {
        self.projection() * self.view()
    }

    /// Applies one frame of keyboard movement.
    ///
    /// Returns `true` if the camera moved or turned.
    pub fn update(&mut self, keyboard: &dyn KeyboardInput, delta: f32) -> bool {
        let axis = |pos: Key, neg: Key| -> f32 {
            (keyboard.is_key_down(pos) as i32 - keyboard.is_key_down(neg) as i32) as f32
        };

        let forward = axis(Key::W, Key::S);
        let strafe = axis(Key::D, Key::A);
        let lift = axis(Key::E, Key::Q);
        let yaw = axis(Key::Left, Key::Right);
        let pitch = axis(Key::Up, Key::Down);

        if forward == 0.0 && strafe == 0.0 && lift == 0.0 && yaw == 0.0 && pitch == 0.0 {
            return false;
        }

        let speed = if keyboard.is_key_down(Key::Shift) {
            self.move_speed * 4.0
        } else {
            self.move_speed
        };
        let step = speed * delta;
        self.position = self.position
            + self.forward() * (forward * step)
            + self.right() * (strafe * step)
            + Vec3::Y * (lift * step);

        self.yaw += yaw * self.turn_speed * delta;
        self.pitch = (self.pitch + pitch * self.turn_speed * delta)
            .clamp(-FRAC_PI_2 + 0.01, FRAC_PI_2 - 0.01);
        true
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Vec3::new(0.0, 2.0, 10.0), 0.0, 0.0, 16.0 / 9.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::input::{NoInput, PressedKeys};
    use approx::assert_relative_eq;

    #[test]
    fn zero_yaw_looks_down_negative_z() {
        let camera = Camera::new(Vec3::ZERO, 0.0, 0.0, 1.0);
        assert_relative_eq!(camera.forward().z, -1.0);
        assert_relative_eq!(camera.right().x, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn idle_keyboard_leaves_camera_alone() {
        let mut camera = Camera::default();
        let before = camera.clone();
        assert!(!camera.update(&NoInput, 0.016));
        assert_eq!(camera, before);
    }

    #[test]
    fn w_moves_forward() {
        let mut camera = Camera::new(Vec3::ZERO, 0.0, 0.0, 1.0);
        let keys = PressedKeys::new();
        keys.set(Key::W, true);
        assert!(camera.update(&keys, 1.0));
        assert_relative_eq!(camera.position.z, -camera.move_speed, epsilon = 1e-5);
    }

    #[test]
    fn pitch_is_clamped() {
        let mut camera = Camera::default();
        let keys = PressedKeys::new();
        keys.set(Key::Up, true);
        camera.update(&keys, 100.0);
        assert!(camera.pitch < FRAC_PI_2);
    }
}
