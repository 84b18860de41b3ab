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

use ember_core::math::Vec3;
use ember_core::SceneObject;

use super::{generate, inline_error, Bsdf};
use crate::tree::{ColorOptions, NumberOptions, SerializationInput};
use crate::GenerateError;

#[derive(PartialEq, Clone, Copy)]
enum MapType {
    Normal,
    Bump,
}

pub(super) fn normalmap_factory(name: &str, object: SceneObject) -> Box<dyn Bsdf> {
    Box::new(MapBsdf {
        name: name.to_string(),
        object,
        map_type: MapType::Normal,
    })
}

pub(super) fn bumpmap_factory(name: &str, object: SceneObject) -> Box<dyn Bsdf> {
    Box::new(MapBsdf {
        name: name.to_string(),
        object,
        map_type: MapType::Bump,
    })
}

struct MapBsdf {
    name: String,
    object: SceneObject,
    map_type: MapType,
}

impl Bsdf for MapBsdf {
    fn name(&self) -> &str {
        &self.name
    }

    fn serialize(&self, input: &mut SerializationInput) -> Result<(), GenerateError> {
        input.tree.begin_closure(&self.name);
        let inner = self.object.string_property("bsdf", "").to_string();
        if self.map_type == MapType::Normal {
            input
                .tree
                .add_color("map", &self.object, Vec3::ONE, ColorOptions::dynamic())?;
        } else {
            // Bump gradients need the texture itself, not one sample.
            input.tree.add_texture("map", &self.object)?;
        }

        input
            .tree
            .add_number("strength", &self.object, 1.0, NumberOptions::new())?;

        let bsdf_id = input.tree.current_closure_id();
        if inner.is_empty() {
            log::error!("Bsdf '{}' has no inner bsdf given", self.name);
            input.stream.push_str(&inline_error(bsdf_id));
            input.stream.push('\n');
        } else {
            generate(&inner, input.tree, input.stream)?;
            let inner_id = input.tree.closure_id(&inner).unwrap_or(0);

            let header = input.tree.pull_header();
            input.stream.push_str(&header);
            if self.map_type == MapType::Normal {
                input.stream.push_str(&format!(
                    "  let bsdf_{bsdf_id} : BSDFShader = @|ctx| make_normalmap(ctx, @|surf2| bsdf_{inner_id}(ctx.{{surf=surf2}}), {}, {});\n",
                    input.tree.inline("map"),
                    input.tree.inline("strength"),
                ));
            } else {
                let map = input.tree.inline("map");
                input.stream.push_str(&format!(
                    "  let bsdf_{bsdf_id} : BSDFShader = @|ctx| make_bumpmap(ctx, @|surf2| -> Bsdf {{ bsdf_{inner_id}(ctx.{{surf=surf2}}) }}, texture_dx({map}, ctx).r, texture_dy({map}, ctx).r, {});\n",
                    input.tree.inline("strength"),
                ));
            }
        }

        input.tree.end_closure()
    }
}
