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

//! Fixed-size square matrices, stored row-major.

use serde::{Deserialize, Serialize};

use super::vector::Vec3;

/// A 3x3 matrix with `f32` components, stored row-major.
#[derive(
    Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable, Serialize, Deserialize,
)]
#[repr(C)]
pub struct Mat3 {
    /// The matrix elements in row-major order.
    pub m: [f32; 9],
}

impl Mat3 {
    /// The identity matrix.
    pub const IDENTITY: Self = Self {
        m: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
    };

    /// Creates a matrix from row-major elements.
    #[inline]
    pub const fn from_rows(m: [f32; 9]) -> Self {
        Self { m }
    }
}

impl Default for Mat3 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// A 4x4 matrix with `f32` components, stored row-major.
///
/// Entity and shape transforms use this type. Only affine content is
/// expected from the scene description; the last row is carried anyway so
/// the emitted shader code can consume a full matrix.
#[derive(
    Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable, Serialize, Deserialize,
)]
#[repr(C)]
pub struct Mat4 {
    /// The matrix elements in row-major order.
    pub m: [f32; 16],
}

impl Mat4 {
    /// The identity matrix.
    pub const IDENTITY: Self = Self {
        m: [
            1.0, 0.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, 0.0, //
            0.0, 0.0, 1.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ],
    };

    /// Creates a matrix from row-major elements.
    #[inline]
    pub const fn from_rows(m: [f32; 16]) -> Self {
        Self { m }
    }

    /// Embeds a 3x3 matrix into the upper-left block of an identity.
    pub fn from_mat3(r: Mat3) -> Self {
        let mut out = Self::IDENTITY;
        for row in 0..3 {
            for col in 0..3 {
                out.m[row * 4 + col] = r.m[row * 3 + col];
            }
        }
        out
    }

    /// Builds a translation matrix.
    pub fn from_translation(t: Vec3) -> Self {
        let mut out = Self::IDENTITY;
        out.m[3] = t.x;
        out.m[7] = t.y;
        out.m[11] = t.z;
        out
    }

    /// Builds a non-uniform scale matrix.
    pub fn from_scale(s: Vec3) -> Self {
        let mut out = Self::IDENTITY;
        out.m[0] = s.x;
        out.m[5] = s.y;
        out.m[10] = s.z;
        out
    }

    /// Returns the element at `(row, col)`.
    #[inline]
    pub fn at(&self, row: usize, col: usize) -> f32 {
        self.m[row * 4 + col]
    }

    /// Multiplies two matrices (`self * rhs`).
    pub fn mul(&self, rhs: &Mat4) -> Mat4 {
        let mut out = [0.0f32; 16];
        for row in 0..4 {
            for col in 0..4 {
                let mut acc = 0.0;
                for k in 0..4 {
                    acc += self.at(row, k) * rhs.at(k, col);
                }
                out[row * 4 + col] = acc;
            }
        }
        Mat4 { m: out }
    }

    /// Transforms a point (applies translation).
    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        Vec3::new(
            self.at(0, 0) * p.x + self.at(0, 1) * p.y + self.at(0, 2) * p.z + self.at(0, 3),
            self.at(1, 0) * p.x + self.at(1, 1) * p.y + self.at(1, 2) * p.z + self.at(1, 3),
            self.at(2, 0) * p.x + self.at(2, 1) * p.y + self.at(2, 2) * p.z + self.at(2, 3),
        )
    }

    /// Transforms a direction (ignores translation).
    pub fn transform_direction(&self, d: Vec3) -> Vec3 {
        Vec3::new(
            self.at(0, 0) * d.x + self.at(0, 1) * d.y + self.at(0, 2) * d.z,
            self.at(1, 0) * d.x + self.at(1, 1) * d.y + self.at(1, 2) * d.z,
            self.at(2, 0) * d.x + self.at(2, 1) * d.y + self.at(2, 2) * d.z,
        )
    }

    /// The translation column of an affine transform.
    #[inline]
    pub fn translation(&self) -> Vec3 {
        Vec3::new(self.m[3], self.m[7], self.m[11])
    }
}

impl Default for Mat4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_neutral() {
        let p = Vec3::new(1.0, -2.0, 3.0);
        assert_eq!(Mat4::IDENTITY.transform_point(p), p);
        assert_eq!(Mat4::IDENTITY.mul(&Mat4::IDENTITY), Mat4::IDENTITY);
    }

    #[test]
    fn translation_applies_to_points_only() {
        let t = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(t.transform_point(Vec3::ZERO), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(t.transform_direction(Vec3::X), Vec3::X);
    }

    #[test]
    fn scale_then_translate_composes() {
        let s = Mat4::from_scale(Vec3::splat(2.0));
        let t = Mat4::from_translation(Vec3::X);
        let m = t.mul(&s);
        assert_eq!(m.transform_point(Vec3::ONE), Vec3::new(3.0, 2.0, 2.0));
    }
}
