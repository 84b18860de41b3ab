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

//! The hit-shader entry points, one per surface material.

use crate::context::LoaderContext;
use crate::technique::{Technique, VariantInfo};
use crate::tree::ShadingTree;
use crate::{bsdf, camera, light, medium, GenerateError};

use super::{
    construct_device, generate_database, generate_header, generate_technique, inline_scene_bbox,
    inline_spi,
};

/// Builds the material shader binding for `material_id`: the entity's
/// BSDF, its medium interface, and (for emitting entities) the attached
/// area light.
pub fn generate_material_shader(
    ctx: &mut LoaderContext,
    material_id: usize,
    require_lights: bool,
    output_var: &str,
    stream: &mut String,
) -> Result<(), GenerateError> {
    let material = ctx.materials[material_id].clone();

    let mut tree = ShadingTree::new(ctx);
    bsdf::generate(&material.bsdf, &mut tree, stream)?;
    let bsdf_id = tree.closure_id(&material.bsdf).unwrap_or(0);

    if material.has_medium_interface() {
        let inner = medium_index(tree.context(), material.medium_inner.as_deref());
        let outer = medium_index(tree.context(), material.medium_outer.as_deref());
        stream.push_str(&format!(
            "  let medium_interface = make_medium_interface({inner}, {outer});\n"
        ));
    } else {
        stream.push_str("  let medium_interface = no_medium_interface();\n");
    }

    if require_lights && material.has_emission() {
        let light_id = material.light_id.expect("emission checked above");
        stream.push_str(&format!(
            "  let {output_var} : Shader = @|ctx| make_emissive_material({material_id}, ctx.surf, bsdf_{bsdf_id}(ctx), medium_interface, @lights({light_id}));\n"
        ));
    } else {
        stream.push_str(&format!(
            "  let {output_var} : Shader = @|ctx| make_material({material_id}, bsdf_{bsdf_id}(ctx), medium_interface);\n"
        ));
    }
    Ok(())
}

fn medium_index(ctx: &LoaderContext, name: Option<&str>) -> i32 {
    match name {
        Some(name) => ctx.scene.media.id_of(name).map(|id| id as i32).unwrap_or_else(|| {
            log::error!("Unknown medium '{name}'");
            -1
        }),
        None => -1,
    }
}

/// Builds the full hit shader for one material of the current variant.
pub fn setup_hit_shader(
    ctx: &mut LoaderContext,
    technique: &dyn Technique,
    info: &VariantInfo,
    material_id: usize,
) -> Result<String, GenerateError> {
    let mut stream = generate_header(info);
    stream.push_str(
        "#[export] fn ig_hit_shader(settings: &Settings, entity_start: i32, entity_end: i32, first: i32, last: i32) -> () {\n",
    );
    stream.push_str("  maybe_unused(settings);\n  ");
    stream.push_str(&construct_device(ctx.target));
    stream.push('\n');
    stream.push_str(&inline_scene_bbox(ctx));
    stream.push_str(&generate_database());

    if info.uses_lights {
        let mut tree = ShadingTree::new(ctx);
        light::generate(&mut tree, &mut stream, false)?;
    }
    if info.uses_media {
        let mut tree = ShadingTree::new(ctx);
        medium::generate(&mut tree, &mut stream)?;
    }
    if info.requires_explicit_camera {
        camera::generate(ctx, &mut stream)?;
    }

    generate_material_shader(ctx, material_id, info.uses_lights, "shader", &mut stream)?;

    stream.push_str(&format!("  let spi = {} : i32;\n", inline_spi(ctx, info)));
    generate_technique(technique, ctx, &mut stream)?;

    stream.push_str(
        "  device.handle_hit_shader(shader, technique, entity_start, entity_end, first, last, spi)\n}\n",
    );
    Ok(stream)
}

/// Builds the advanced-shadow entry point of the current variant. The
/// `is_hit` form runs on occluded rays, the other on unoccluded ones.
pub fn setup_advanced_shadow_shader(
    ctx: &mut LoaderContext,
    technique: &dyn Technique,
    info: &VariantInfo,
    is_hit: bool,
) -> Result<String, GenerateError> {
    let mut stream = generate_header(info);
    stream.push_str(
        "#[export] fn ig_advanced_shadow_shader(settings: &Settings, first: i32, last: i32) -> () {\n",
    );
    stream.push_str("  maybe_unused(settings);\n  ");
    stream.push_str(&construct_device(ctx.target));
    stream.push('\n');
    stream.push_str(&inline_scene_bbox(ctx));
    stream.push_str(&generate_database());

    if info.uses_lights {
        let mut tree = ShadingTree::new(ctx);
        light::generate(&mut tree, &mut stream, false)?;
    }
    if info.requires_explicit_camera {
        camera::generate(ctx, &mut stream)?;
    }

    stream.push_str(&format!("  let spi = {} : i32;\n", inline_spi(ctx, info)));
    generate_technique(technique, ctx, &mut stream)?;

    stream.push_str(&format!(
        "  device.handle_advanced_shadow_shader(technique, first, last, spi, {})\n}}\n",
        is_hit,
    ));
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Target;
    use crate::technique;
    use ember_core::scene::parse_scene_string;
    use std::path::Path;

    const SCENE: &str = r#"{
        "technique": { "type": "path" },
        "bsdfs": [ { "name": "white", "type": "diffuse" } ],
        "shapes": [ { "name": "panel", "type": "rectangle" } ],
        "entities": [
            { "name": "wall", "shape": "panel", "bsdf": "white" },
            { "name": "glow", "shape": "panel", "bsdf": "white" }
        ],
        "lights": [ { "name": "lamp", "type": "area", "entity": "glow" } ]
    }"#;

    #[test]
    fn emitting_materials_bind_their_light() {
        let scene = parse_scene_string(SCENE, Path::new(".")).unwrap();
        let mut ctx = LoaderContext::new(scene, Target::Generic, Path::new("cache"));
        let tech = technique::create(&ctx);
        let info = tech.info(&ctx);

        let plain = setup_hit_shader(&mut ctx, tech.as_ref(), &info.variants[0], 0).unwrap();
        assert!(plain.contains("make_material(0, bsdf_"));
        assert!(!plain.contains("make_emissive_material(0"));

        let emitting = setup_hit_shader(&mut ctx, tech.as_ref(), &info.variants[0], 1).unwrap();
        assert!(emitting.contains("make_emissive_material(1"));
        assert!(emitting.contains("@lights(0)"));
    }
}
