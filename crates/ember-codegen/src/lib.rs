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

//! # Ember Codegen
//!
//! Turns a parsed scene into shading-language source for the external JIT
//! compiler. The heart of the crate is the [`ShadingTree`]: a
//! context-threaded code-generation environment that resolves scene
//! properties into baked literals or runtime-registry lookups. Around it
//! sit the plugin graphs (BSDFs, lights, textures, cameras, media,
//! techniques), the technique variant declarations the runtime schedules,
//! and the shader composition for the ray-generation, miss, hit, and
//! callback entry points.

pub mod bsdf;
pub mod cache;
pub mod camera;
pub mod context;
pub mod error;
pub mod light;
pub mod medium;
pub mod registry;
pub mod shader;
pub mod technique;
pub mod texture;
pub mod tree;

pub use cache::{CacheManager, ExportedData, ExportedPayload};
pub use context::{GlobalRegistry, LoaderContext, Material, Target};
pub use error::GenerateError;
pub use technique::{
    CallbackType, ShadowHandlingMode, TechniqueInfo, VariantInfo, DEFAULT_MAX_RAY_DEPTH,
    DEFAULT_MIN_RAY_DEPTH,
};
pub use tree::{ColorOptions, IntegerOptions, NumberOptions, ShadingTree, VectorOptions};
