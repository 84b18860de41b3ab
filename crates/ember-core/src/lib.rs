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

//! # Ember Core
//!
//! Foundational crate for the Ember rendering runtime: math types, the
//! scene data model (typed property bags parsed from the JSON scene
//! description), the aligned binary serialization contract shared by all
//! exported resources, and small containers used by the code generator.

#![warn(missing_docs)]

pub mod container;
pub mod math;
pub mod scene;
pub mod serialization;

pub use math::{BoundingBox, DenseMatrix, Mat3, Mat4, Vec2, Vec3, Vec4};
pub use scene::{ObjectKind, Property, Scene, SceneObject};
pub use serialization::{FileSerializer, Serializer, SerializerError, Transferable, VectorSerializer};
