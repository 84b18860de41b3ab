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

//! Composition of the emitted shader entry points.
//!
//! The generated program exposes four roles to the runtime dispatcher:
//! ray generation, miss, hit, and (for advanced shadow handling) the
//! shadow shader, plus the per-iteration callback entry points techniques
//! register. Every entry point is a self-contained script; the reducer
//! collapses identical (script, entry) pairs to one shader group.

mod hit;
mod miss;
mod ray_generation;
mod reducer;

pub use hit::{generate_material_shader, setup_advanced_shadow_shader, setup_hit_shader};
pub use miss::setup_miss_shader;
pub use ray_generation::{begin_ray_generation, end_ray_generation, setup_ray_generation_shader};
pub use reducer::ShaderReducer;

use crate::context::{LoaderContext, Target};
use crate::technique::{Technique, TechniqueInfo, VariantInfo};
use crate::tree::{SerializationInput, ShadingTree};
use crate::GenerateError;

/// The `device` binding for a target.
pub fn construct_device(target: Target) -> String {
    match target {
        Target::Avx => "let device = make_avx_device();".to_string(),
        Target::Avx2 => "let device = make_avx2_device();".to_string(),
        Target::Avx512 => "let device = make_avx512_device();".to_string(),
        Target::Sse42 => "let device = make_sse42_device();".to_string(),
        Target::Asimd => "let device = make_asimd_device();".to_string(),
        Target::Nvvm => "let device = make_nvvm_device(settings.device);".to_string(),
        Target::Amdgpu => "let device = make_amdgpu_device(settings.device);".to_string(),
        Target::Generic => "let device = make_cpu_default_device();".to_string(),
    }
}

/// Loads the scene database tables into scope.
pub fn generate_database() -> String {
    "  let dtb      = device.load_scene_database();\n  let shapes   = device.load_shape_table(dtb.shapes); maybe_unused(shapes);\n  let entities = device.load_entity_table(dtb.entities); maybe_unused(entities);\n".to_string()
}

/// The world bounds as a literal, for samplers that need scene scale.
pub fn inline_scene_bbox(ctx: &LoaderContext) -> String {
    let min = ctx.scene_bbox.min;
    let max = ctx.scene_bbox.max;
    format!(
        "  let scene_bbox = make_bbox(make_vec3({:?}, {:?}, {:?}), make_vec3({:?}, {:?}, {:?})); maybe_unused(scene_bbox);\n",
        min.x, min.y, min.z, max.x, max.y, max.z
    )
}

/// Payload-layout statics every entry point of a variant starts with.
pub fn generate_header(info: &VariantInfo) -> String {
    format!(
        "static RayPayloadComponents = {};\nstatic SecondaryRayPayloadComponents = {};\n",
        info.primary_payload_count, info.secondary_payload_count
    )
}

/// The samples-per-iteration constant for the current variant.
pub fn inline_spi(ctx: &LoaderContext, info: &VariantInfo) -> u32 {
    info.override_spi.unwrap_or(ctx.samples_per_iteration)
}

/// Opens a callback entry point: header, export, device, scene bounds.
pub fn begin_callback(ctx: &LoaderContext, info: &VariantInfo) -> String {
    let mut stream = generate_header(info);
    stream.push_str("#[export] fn ig_callback_shader(settings: &Settings, iter: i32) -> () {\n");
    stream.push_str("  maybe_unused(settings);\n  ");
    stream.push_str(&construct_device(ctx.target));
    stream.push('\n');
    stream.push_str(&inline_scene_bbox(ctx));
    stream
}

/// Closes a callback entry point.
pub fn end_callback() -> String {
    "}\n".to_string()
}

/// Generates the `technique` binding for the current variant into
/// `stream`, resolving its parameters through a fresh shading tree.
pub fn generate_technique(
    technique: &dyn Technique,
    ctx: &mut LoaderContext,
    stream: &mut String,
) -> Result<(), GenerateError> {
    let mut tree = ShadingTree::new(ctx);
    tree.begin_closure("__technique");
    let mut input = SerializationInput {
        stream,
        tree: &mut tree,
    };
    technique.generate_body(&mut input)?;
    // Techniques pull their headers before use; anything left over is
    // flushed so no lookup declaration is silently dropped.
    let header = tree.pull_header();
    if !header.is_empty() {
        stream.push_str(&header);
    }
    tree.end_closure()
}

/// Runs a variant's callback generator, if declared.
pub fn generate_callback(
    info: &TechniqueInfo,
    variant: usize,
    which: crate::technique::CallbackType,
    ctx: &mut LoaderContext,
) -> Option<String> {
    let generator = info.variants[variant].callback_generators[which as usize].as_ref()?;
    Some(generator(ctx))
}
