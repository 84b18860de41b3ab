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

//! Math types used throughout the renderer.

mod bounding_box;
mod dense_matrix;
mod matrix;
mod vector;

pub use bounding_box::BoundingBox;
pub use dense_matrix::DenseMatrix;
pub use matrix::{Mat3, Mat4};
pub use vector::{Vec2, Vec3, Vec4};

/// A small tolerance for floating-point comparisons.
pub const EPSILON: f32 = 1e-6;

/// Machine epsilon guard used when normalizing distributions.
pub const FLT_EPS: f32 = f32::EPSILON;

/// Archimedes' constant as `f32`.
pub const PI: f32 = std::f32::consts::PI;

/// Converts degrees to radians.
#[inline]
pub fn deg_to_rad(deg: f32) -> f32 {
    deg * (PI / 180.0)
}
