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

use ember_core::SceneObject;

use super::{generate, inline_error, Bsdf};
use crate::tree::{NumberOptions, SerializationInput};
use crate::GenerateError;

#[derive(PartialEq, Clone, Copy)]
enum BlendType {
    Mix,
    Add,
}

pub(super) fn mix_factory(name: &str, object: SceneObject) -> Box<dyn Bsdf> {
    Box::new(BlendBsdf {
        name: name.to_string(),
        object,
        blend_type: BlendType::Mix,
    })
}

pub(super) fn add_factory(name: &str, object: SceneObject) -> Box<dyn Bsdf> {
    Box::new(BlendBsdf {
        name: name.to_string(),
        object,
        blend_type: BlendType::Add,
    })
}

struct BlendBsdf {
    name: String,
    object: SceneObject,
    blend_type: BlendType,
}

impl Bsdf for BlendBsdf {
    fn name(&self) -> &str {
        &self.name
    }

    fn serialize(&self, input: &mut SerializationInput) -> Result<(), GenerateError> {
        input.tree.begin_closure(&self.name);
        let first = self.object.string_property("first", "").to_string();
        let second = self.object.string_property("second", "").to_string();

        let bsdf_id = input.tree.current_closure_id();
        if first.is_empty() || second.is_empty() {
            log::error!("Bsdf '{}' has no inner bsdfs given", self.name);
            input.stream.push_str(&inline_error(bsdf_id));
            input.stream.push('\n');
        } else if first == second {
            generate(&first, input.tree, input.stream)?;
            let first_id = input.tree.closure_id(&first).unwrap_or(0);
            if self.blend_type == BlendType::Mix {
                // Mixing something with itself is that something.
                input.stream.push_str(&format!(
                    "  let bsdf_{bsdf_id} = bsdf_{first_id};\n"
                ));
            } else {
                let header = input.tree.pull_header();
                input.stream.push_str(&header);
                input.stream.push_str(&format!(
                    "  let bsdf_{bsdf_id} : BSDFShader = @|ctx| make_add_bsdf(bsdf_{first_id}(ctx), bsdf_{first_id}(ctx), 0);\n"
                ));
            }
        } else {
            if self.blend_type == BlendType::Mix {
                input
                    .tree
                    .add_number("weight", &self.object, 0.5, NumberOptions::new())?;
            }

            generate(&first, input.tree, input.stream)?;
            generate(&second, input.tree, input.stream)?;

            let first_id = input.tree.closure_id(&first).unwrap_or(0);
            let second_id = input.tree.closure_id(&second).unwrap_or(0);
            let header = input.tree.pull_header();
            input.stream.push_str(&header);
            if self.blend_type == BlendType::Mix {
                input.stream.push_str(&format!(
                    "  let bsdf_{bsdf_id} : BSDFShader = @|ctx| make_mix_bsdf(bsdf_{first_id}(ctx), bsdf_{second_id}(ctx), {});\n",
                    input.tree.inline("weight"),
                ));
            } else {
                input.stream.push_str(&format!(
                    "  let bsdf_{bsdf_id} : BSDFShader = @|ctx| make_add_bsdf(bsdf_{first_id}(ctx), bsdf_{second_id}(ctx), 0);\n"
                ));
            }
        }
        input.tree.end_closure()
    }
}
