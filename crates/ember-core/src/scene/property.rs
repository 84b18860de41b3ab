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

//! The typed property variant stored in scene objects.

use crate::math::{Mat4, Vec2, Vec3};

/// A single scene-object property.
///
/// The type is fixed at parse time. Accessors take a default and return it
/// on a type mismatch; silent coercion is forbidden, with two documented
/// exceptions: integers widen to numbers, and a number broadcasts to a
/// `Vec3` where a scale is expected ([`Property::vec3_or_broadcast`]).
#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    /// A boolean flag.
    Bool(bool),
    /// A signed integer.
    Integer(i32),
    /// A floating-point number.
    Number(f32),
    /// A string. Object references are carried as the referenced name.
    Str(String),
    /// A 2-component vector.
    Vec2(Vec2),
    /// A 3-component vector; also used for linear RGB colors.
    Vec3(Vec3),
    /// A 4x4 transform.
    Transform(Mat4),
}

impl Property {
    /// The boolean value, or `default` on mismatch.
    pub fn bool_or(&self, default: bool) -> bool {
        match self {
            Property::Bool(v) => *v,
            _ => default,
        }
    }

    /// The integer value, or `default` on mismatch.
    pub fn integer_or(&self, default: i32) -> i32 {
        match self {
            Property::Integer(v) => *v,
            _ => default,
        }
    }

    /// The numeric value; integers widen. `default` on mismatch.
    pub fn number_or(&self, default: f32) -> f32 {
        match self {
            Property::Number(v) => *v,
            Property::Integer(v) => *v as f32,
            _ => default,
        }
    }

    /// The string value, or `default` on mismatch.
    pub fn string_or<'a>(&'a self, default: &'a str) -> &'a str {
        match self {
            Property::Str(v) => v.as_str(),
            _ => default,
        }
    }

    /// The vector value, or `default` on mismatch.
    pub fn vec3_or(&self, default: Vec3) -> Vec3 {
        match self {
            Property::Vec3(v) => *v,
            _ => default,
        }
    }

    /// Like [`Property::vec3_or`], but a plain number broadcasts to all
    /// three components. Only scale-like properties document this.
    pub fn vec3_or_broadcast(&self, default: Vec3) -> Vec3 {
        match self {
            Property::Vec3(v) => *v,
            Property::Number(v) => Vec3::splat(*v),
            Property::Integer(v) => Vec3::splat(*v as f32),
            _ => default,
        }
    }

    /// The transform value, or `default` on mismatch.
    pub fn transform_or(&self, default: Mat4) -> Mat4 {
        match self {
            Property::Transform(m) => *m,
            _ => default,
        }
    }

    /// `true` for string properties. Used to detect textured parameters.
    pub fn is_string(&self) -> bool {
        matches!(self, Property::Str(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatched_types_fall_back_to_defaults() {
        let p = Property::Str("red_tex".into());
        assert_eq!(p.number_or(0.5), 0.5);
        assert_eq!(p.vec3_or(Vec3::ONE), Vec3::ONE);
        assert_eq!(p.string_or(""), "red_tex");
    }

    #[test]
    fn integers_widen_to_numbers_only() {
        let p = Property::Integer(3);
        assert_eq!(p.number_or(0.0), 3.0);
        assert_eq!(p.bool_or(false), false);
    }

    #[test]
    fn scale_broadcast_is_explicit() {
        let p = Property::Number(2.0);
        assert_eq!(p.vec3_or(Vec3::ONE), Vec3::ONE);
        assert_eq!(p.vec3_or_broadcast(Vec3::ONE), Vec3::splat(2.0));
    }
}
