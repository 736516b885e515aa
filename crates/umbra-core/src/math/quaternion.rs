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

//! Unit quaternions for 3D rotations.

use serde::{Deserialize, Serialize};
use std::ops::Mul;

use super::{Vec3, EPSILON};

/// A rotation stored as `(x, y, z, w)`, where `w` is the scalar part.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[repr(C)]
pub struct Quaternion {
    /// The x component of the vector part.
    pub x: f32,
    /// The y component of the vector part.
    pub y: f32,
    /// The z component of the vector part.
    pub z: f32,
    /// The scalar part.
    pub w: f32,
}

impl Quaternion {
    /// The identity quaternion, representing no rotation.
    pub const IDENTITY: Quaternion = Quaternion {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };

    /// Creates a new quaternion from its raw components.
    #[inline]
    pub fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    /// Creates a rotation of `angle_radians` around `axis`.
    pub fn from_axis_angle(axis: Vec3, angle_radians: f32) -> Self {
        let axis = axis.normalize();
        let (s, c) = (angle_radians * 0.5).sin_cos();
        Self::new(axis.x * s, axis.y * s, axis.z * s, c)
    }

    /// Creates the shortest rotation taking unit vector `from` onto unit vector `to`.
    pub fn from_rotation_arc(from: Vec3, to: Vec3) -> Self {
        let from = from.normalize();
        let to = to.normalize();
        let d = from.dot(to);
        if d >= 1.0 - EPSILON {
            return Self::IDENTITY;
        }
        if d <= -1.0 + EPSILON {
            // Opposite vectors: any orthogonal axis works.
            let mut axis = Vec3::X.cross(from);
            if axis.length_squared() < EPSILON {
                axis = Vec3::Y.cross(from);
            }
            return Self::from_axis_angle(axis, std::f32::consts::PI);
        }
        let c = from.cross(to);
        Self::new(c.x, c.y, c.z, 1.0 + d).normalize()
    }

    /// Returns a unit-length copy of the quaternion.
    pub fn normalize(&self) -> Self {
        let mag = (self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w).sqrt();
        if mag > EPSILON {
            let inv = 1.0 / mag;
            Self::new(self.x * inv, self.y * inv, self.z * inv, self.w * inv)
        } else {
            Self::IDENTITY
        }
    }

    /// Rotates a 3D vector by this quaternion.
    pub fn rotate_vec3(&self, v: Vec3) -> Vec3 {
        let u = Vec3::new(self.x, self.y, self.z);
        let s = self.w;
        2.0 * u.dot(v) * u + (s * s - u.dot(u)) * v + 2.0 * s * u.cross(v)
    }
}

impl Mul for Quaternion {
    type Output = Self;
    /// Hamilton product: applies `rhs` first, then `self`.
    fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
            self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
        )
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn rotation_arc_maps_from_onto_to() {
        let from = Vec3::new(0.0, 0.0, -1.0);
        let to = Vec3::new(0.3, -0.9, 0.1).normalize();
        let q = Quaternion::from_rotation_arc(from, to);
        let r = q.rotate_vec3(from);
        assert_relative_eq!(r.x, to.x, epsilon = 1e-4);
        assert_relative_eq!(r.y, to.y, epsilon = 1e-4);
        assert_relative_eq!(r.z, to.z, epsilon = 1e-4);
    }

    #[test]
    fn rotation_arc_handles_opposite_vectors() {
        let q = Quaternion::from_rotation_arc(Vec3::Z, -Vec3::Z);
        let r = q.rotate_vec3(Vec3::Z);
        assert_relative_eq!(r.z, -1.0, epsilon = 1e-4);
    }

    #[test]
    fn axis_angle_quarter_turn() {
        let q = Quaternion::from_axis_angle(Vec3::Y, std::f32::consts::FRAC_PI_2);
        let r = q.rotate_vec3(Vec3::X);
        assert_relative_eq!(r.z, -1.0, epsilon = 1e-5);
    }
}
