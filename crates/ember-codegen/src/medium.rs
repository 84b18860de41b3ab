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

//! Participating-medium plugins.

use std::sync::OnceLock;

use ember_core::math::Vec3;
use ember_core::SceneObject;

use crate::registry::PluginRegistry;
use crate::tree::{ColorOptions, NumberOptions, SerializationInput, ShadingTree};
use crate::GenerateError;

type MediumFactory =
    fn(&SceneObject, &mut SerializationInput) -> Result<(), GenerateError>;

fn registry() -> &'static PluginRegistry<MediumFactory> {
    static REGISTRY: OnceLock<PluginRegistry<MediumFactory>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut registry = PluginRegistry::new();
        registry.register(
            &["homogeneous", "constant"],
            serialize_homogeneous as MediumFactory,
        );
        registry
    })
}

/// Generates the media table for the volume techniques. Media are indexed
/// by declaration order; a vacuum entry closes the match.
pub fn generate(tree: &mut ShadingTree, stream: &mut String) -> Result<(), GenerateError> {
    let media: Vec<SceneObject> = tree.context().scene.media.iter().cloned().collect();

    for (index, object) in media.iter().enumerate() {
        tree.begin_closure(object.name());
        match registry().lookup(object.plugin_type()) {
            Some(factory) => {
                let mut input = SerializationInput {
                    stream: &mut *stream,
                    tree: &mut *tree,
                };
                factory(object, &mut input)?;
            }
            None => {
                log::error!(
                    "Medium '{}' has unknown type '{}'",
                    object.name(),
                    object.plugin_type()
                );
                let id = tree.current_closure_id();
                stream.push_str(&format!("  let medium_{id} = make_vacuum_medium();\n"));
            }
        }
        let id = tree.current_closure_id();
        stream.push_str(&format!("  let medium_entry_{index} = medium_{id};\n"));
        tree.end_closure()?;
    }

    stream.push_str("  let media = @|id:i32| -> Medium {\n    match(id) {\n");
    for index in 0..media.len() {
        stream.push_str(&format!("      {index} => medium_entry_{index},\n"));
    }
    stream.push_str("      _ => make_vacuum_medium()\n    }\n  };\n");
    Ok(())
}

fn serialize_homogeneous(
    object: &SceneObject,
    input: &mut SerializationInput,
) -> Result<(), GenerateError> {
    input.tree.add_color(
        "sigma_a",
        object,
        Vec3::splat(0.1),
        ColorOptions::new(),
    )?;
    input.tree.add_color(
        "sigma_s",
        object,
        Vec3::splat(0.1),
        ColorOptions::new(),
    )?;
    input
        .tree
        .add_number("g", object, 0.0, NumberOptions::zero())?;

    let id = input.tree.current_closure_id();
    let header = input.tree.pull_header();
    input.stream.push_str(&header);
    input.stream.push_str(&format!(
        "  let medium_{id} = make_homogeneous_medium({}, {}, make_henyeygreenstein_phase({}));\n",
        input.tree.inline("sigma_a"),
        input.tree.inline("sigma_s"),
        input.tree.inline("g"),
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{LoaderContext, Target};
    use ember_core::scene::parse_scene_string;
    use std::path::Path;

    #[test]
    fn media_table_indexes_by_declaration_order() {
        let scene = parse_scene_string(
            r#"{ "media": [
                { "name": "fog", "type": "homogeneous", "sigma_s": [0.4, 0.4, 0.4] },
                { "name": "milk", "type": "homogeneous", "g": 0.7 }
            ] }"#,
            Path::new("."),
        )
        .unwrap();
        let mut ctx = LoaderContext::new(scene, Target::Generic, Path::new("cache"));
        let mut tree = ShadingTree::new(&mut ctx);
        let mut stream = String::new();
        generate(&mut tree, &mut stream).unwrap();

        assert_eq!(stream.matches("make_homogeneous_medium").count(), 2);
        assert!(stream.contains("0 => medium_entry_0"));
        assert!(stream.contains("1 => medium_entry_1"));
        assert!(stream.contains("make_henyeygreenstein_phase(0.7)"));
    }
}
