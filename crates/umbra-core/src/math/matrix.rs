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

//! Column-major 4x4 matrix.

use std::ops::Mul;

use super::{Quaternion, Vec3, Vec4, EPSILON};

/// A 4x4 column-major matrix, used for transforms and camera projections.
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct Mat4 {
    /// The columns of the matrix. `cols[0]` is the first column, and so on.
    pub cols: [Vec4; 4],
}

impl Mat4 {
    /// The 4x4 identity matrix.
    pub const IDENTITY: Self = Self {
        cols: [Vec4::X, Vec4::Y, Vec4::Z, Vec4::W],
    };

    /// Creates a new matrix from four column vectors.
    #[inline]
    pub fn from_cols(c0: Vec4, c1: Vec4, c2: Vec4, c3: Vec4) -> Self {
        Self {
            cols: [c0, c1, c2, c3],
        }
    }

    /// Returns a row of the matrix as a `Vec4`.
    #[inline]
    pub fn get_row(&self, index: usize) -> Vec4 {
        Vec4::new(
            self.cols[0].get(index),
            self.cols[1].get(index),
            self.cols[2].get(index),
            self.cols[3].get(index),
        )
    }

    /// Creates a translation matrix.
    #[inline]
    pub fn from_translation(v: Vec3) -> Self {
        let mut m = Self::IDENTITY;
        m.cols[3] = Vec4::from_vec3(v, 1.0);
        m
    }

    /// Creates a rotation matrix from a unit quaternion.
    pub fn from_quat(q: Quaternion) -> Self {
        let x2 = q.x + q.x;
        let y2 = q.y + q.y;
        let z2 = q.z + q.z;
        let xx = q.x * x2;
        let xy = q.x * y2;
        let xz = q.x * z2;
        let yy = q.y * y2;
        let yz = q.y * z2;
        let zz = q.z * z2;
        let wx = q.w * x2;
        let wy = q.w * y2;
        let wz = q.w * z2;

        Self::from_cols(
            Vec4::new(1.0 - (yy + zz), xy + wz, xz - wy, 0.0),
            Vec4::new(xy - wz, 1.0 - (xx + zz), yz + wx, 0.0),
            Vec4::new(xz + wy, yz - wx, 1.0 - (xx + yy), 0.0),
            Vec4::W,
        )
    }

    /// Creates a right-handed perspective projection with a [0, 1] depth range.
    ///
    /// `z_near` must be positive and smaller than `z_far`.
    pub fn perspective_rh_zo(fov_y_radians: f32, aspect_ratio: f32, z_near: f32, z_far: f32) -> Self {
        let f = 1.0 / (fov_y_radians / 2.0).tan();
        let range = z_far / (z_near - z_far);

        Self::from_cols(
            Vec4::new(f / aspect_ratio, 0.0, 0.0, 0.0),
            Vec4::new(0.0, f, 0.0, 0.0),
            Vec4::new(0.0, 0.0, range, -1.0),
            Vec4::new(0.0, 0.0, range * z_near, 0.0),
        )
    }

    /// Creates a right-handed orthographic projection with a [0, 1] depth range.
    pub fn orthographic_rh_zo(
        left: f32,
        right: f32,
        bottom: f32,
        top: f32,
        z_near: f32,
        z_far: f32,
    ) -> Self {
        let rml = right - left;
        let tmb = top - bottom;
        let fmn = z_far - z_near;

        Self::from_cols(
            Vec4::new(2.0 / rml, 0.0, 0.0, 0.0),
            Vec4::new(0.0, 2.0 / tmb, 0.0, 0.0),
            Vec4::new(0.0, 0.0, -1.0 / fmn, 0.0),
            Vec4::new(-(right + left) / rml, -(top + bottom) / tmb, -z_near / fmn, 1.0),
        )
    }

    /// Creates a right-handed view matrix looking from `eye` towards `target`.
    ///
    /// Returns `None` if `eye` and `target` coincide, or if `up` is parallel to
    /// the view direction.
    pub fn look_at_rh(eye: Vec3, target: Vec3, up: Vec3) -> Option<Self> {
        let forward = target - eye;
        if forward.length_squared() < EPSILON * EPSILON {
            return None;
        }
        let f = forward.normalize();
        let s = f.cross(up);
        if s.length_squared() < EPSILON * EPSILON {
            return None;
        }
        let s = s.normalize();
        let u = s.cross(f);

        Some(Self::from_cols(
            Vec4::new(s.x, u.x, -f.x, 0.0),
            Vec4::new(s.y, u.y, -f.y, 0.0),
            Vec4::new(s.z, u.z, -f.z, 0.0),
            Vec4::new(-eye.dot(s), -eye.dot(u), eye.dot(f), 1.0),
        ))
    }

    /// Transforms a point (w = 1), without perspective divide.
    #[inline]
    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        (*self * Vec4::from_vec3(p, 1.0)).truncate()
    }

    /// Flattens the matrix into 16 floats, column by column.
    #[inline]
    pub fn to_cols_array(&self) -> [f32; 16] {
        bytemuck::cast(*self)
    }
}

impl Default for Mat4 {
    #[inline]
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul<Mat4> for Mat4 {
    type Output = Self;
    fn mul(self, rhs: Mat4) -> Self {
        let mut cols = [Vec4::ZERO; 4];
        for (c, col) in cols.iter_mut().enumerate() {
            let rhs_col = rhs.cols[c];
            *col = Vec4::new(
                self.get_row(0).dot(rhs_col),
                self.get_row(1).dot(rhs_col),
                self.get_row(2).dot(rhs_col),
                self.get_row(3).dot(rhs_col),
            );
        }
        Mat4 { cols }
    }
}

impl Mul<Vec4> for Mat4 {
    type Output = Vec4;
    #[inline]
    fn mul(self, rhs: Vec4) -> Vec4 {
        self.cols[0] * rhs.x + self.cols[1] * rhs.y + self.cols[2] * rhs.z + self.cols[3] * rhs.w
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn look_at_rejects_degenerate_input() {
        assert!(Mat4::look_at_rh(Vec3::ZERO, Vec3::ZERO, Vec3::Y).is_none());
        assert!(Mat4::look_at_rh(Vec3::ZERO, Vec3::Y, Vec3::Y).is_none());
    }

    #[test]
    fn look_at_moves_target_onto_negative_z() {
        let eye = Vec3::new(0.0, 0.0, 5.0);
        let view = Mat4::look_at_rh(eye, Vec3::ZERO, Vec3::Y).unwrap();
        let p = view.transform_point(Vec3::ZERO);
        assert_relative_eq!(p.z, -5.0, epsilon = 1e-5);
        assert_relative_eq!(p.x, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn orthographic_maps_near_and_far_to_unit_depth() {
        let proj = Mat4::orthographic_rh_zo(-1.0, 1.0, -1.0, 1.0, 1.0, 11.0);
        let near = proj.transform_point(Vec3::new(0.0, 0.0, -1.0));
        let far = proj.transform_point(Vec3::new(0.0, 0.0, -11.0));
        assert_relative_eq!(near.z, 0.0, epsilon = 1e-5);
        assert_relative_eq!(far.z, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn perspective_maps_near_plane_to_zero() {
        let proj = Mat4::perspective_rh_zo(1.0, 1.5, 0.1, 100.0);
        let clip = proj * Vec4::new(0.0, 0.0, -0.1, 1.0);
        assert_relative_eq!(clip.z / clip.w, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn identity_times_translation() {
        let t = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(Mat4::IDENTITY * t, t);
        assert_eq!(t.transform_point(Vec3::ZERO), Vec3::new(1.0, 2.0, 3.0));
    }
}
