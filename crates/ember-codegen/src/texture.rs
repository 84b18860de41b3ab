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

//! Texture plugins.
//!
//! Each plugin emits a `let tex_{id} = ...;` line binding a texture
//! function. Unknown names or types degrade to an invalid texture with a
//! log line; rendering continues with visibly wrong output instead of
//! aborting.

use ember_core::math::Vec3;
use ember_core::SceneObject;
use std::sync::OnceLock;

use crate::registry::PluginRegistry;
use crate::tree::{ColorOptions, NumberOptions, ShadingTree};
use crate::GenerateError;

type TextureFactory =
    fn(&SceneObject, &mut ShadingTree, &mut String) -> Result<(), GenerateError>;

fn registry() -> &'static PluginRegistry<TextureFactory> {
    static REGISTRY: OnceLock<PluginRegistry<TextureFactory>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut registry = PluginRegistry::new();
        registry.register(&["image", "bitmap"], serialize_image as TextureFactory);
        registry.register(&["checkerboard"], serialize_checkerboard as TextureFactory);
        registry.register(&["constant"], serialize_constant as TextureFactory);
        registry
    })
}

/// Generates the texture `name` into `stream` and returns the closure id
/// of the emitted `tex_{id}` symbol.
pub fn generate(
    name: &str,
    tree: &mut ShadingTree,
    stream: &mut String,
) -> Result<usize, GenerateError> {
    let Some(object) = tree.context().scene.textures.get(name).cloned() else {
        log::error!("Unknown texture '{name}'");
        tree.begin_closure(name);
        let id = tree.current_closure_id();
        stream.push_str(&format!("  let tex_{id} : Texture = make_invalid_texture();\n"));
        tree.end_closure()?;
        return Ok(id);
    };

    tree.begin_closure(name);
    let id = tree.current_closure_id();

    match registry().lookup(object.plugin_type()) {
        Some(factory) => factory(&object, tree, stream)?,
        None => {
            log::error!(
                "Texture '{name}' has unknown type '{}'",
                object.plugin_type()
            );
            stream.push_str(&format!("  let tex_{id} : Texture = make_invalid_texture();\n"));
        }
    }

    tree.end_closure()?;
    Ok(id)
}

fn serialize_image(
    object: &SceneObject,
    tree: &mut ShadingTree,
    stream: &mut String,
) -> Result<(), GenerateError> {
    let id = tree.current_closure_id();
    let filename = object.resolve_path(object.string_property("filename", ""));
    let filter = match object.string_property("filter_type", "bilinear") {
        "nearest" => "tex_filter_nearest",
        _ => "tex_filter_bilinear",
    };
    let wrap = match object.string_property("wrap_mode", "repeat") {
        "clamp" => "tex_wrap_clamp",
        "mirror" => "tex_wrap_mirror",
        _ => "tex_wrap_repeat",
    };

    let res_id = tree
        .context_mut()
        .register_external_resource(&filename);
    stream.push_str(&format!(
        "  let tex_{id} : Texture = make_image_texture(device.load_image_by_id({res_id}), {filter}, {wrap});\n"
    ));
    Ok(())
}

fn serialize_checkerboard(
    object: &SceneObject,
    tree: &mut ShadingTree,
    stream: &mut String,
) -> Result<(), GenerateError> {
    tree.add_color("color0", object, Vec3::ZERO, ColorOptions::new())?;
    tree.add_color("color1", object, Vec3::ONE, ColorOptions::new())?;
    tree.add_number("scale_x", object, 2.0, NumberOptions::new())?;
    tree.add_number("scale_y", object, 2.0, NumberOptions::new())?;

    let id = tree.current_closure_id();
    let header = tree.pull_header();
    stream.push_str(&header);
    stream.push_str(&format!(
        "  let tex_{id} : Texture = make_checkerboard_texture(make_vec2({}, {}), {}, {});\n",
        tree.inline("scale_x"),
        tree.inline("scale_y"),
        tree.inline("color0"),
        tree.inline("color1"),
    ));
    Ok(())
}

fn serialize_constant(
    object: &SceneObject,
    tree: &mut ShadingTree,
    stream: &mut String,
) -> Result<(), GenerateError> {
    tree.add_color("color", object, Vec3::ONE, ColorOptions::new())?;

    let id = tree.current_closure_id();
    let header = tree.pull_header();
    stream.push_str(&header);
    stream.push_str(&format!(
        "  let tex_{id} : Texture = make_constant_texture({});\n",
        tree.inline("color"),
    ));
    Ok(())
}
