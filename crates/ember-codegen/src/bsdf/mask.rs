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
enum MaskType {
    Mask,
    Cutoff,
}

pub(super) fn mask_factory(name: &str, object: SceneObject) -> Box<dyn Bsdf> {
    Box::new(MaskBsdf {
        name: name.to_string(),
        object,
        mask_type: MaskType::Mask,
    })
}

pub(super) fn cutoff_factory(name: &str, object: SceneObject) -> Box<dyn Bsdf> {
    Box::new(MaskBsdf {
        name: name.to_string(),
        object,
        mask_type: MaskType::Cutoff,
    })
}

struct MaskBsdf {
    name: String,
    object: SceneObject,
    mask_type: MaskType,
}

impl Bsdf for MaskBsdf {
    fn name(&self) -> &str {
        &self.name
    }

    fn serialize(&self, input: &mut SerializationInput) -> Result<(), GenerateError> {
        input.tree.begin_closure(&self.name);
        let masked = self.object.string_property("bsdf", "").to_string();
        let inverted = self.object.bool_property("inverted", false);

        let bsdf_id = input.tree.current_closure_id();
        if masked.is_empty() {
            log::error!("Bsdf '{}' has no inner bsdf given", self.name);
            input.stream.push_str(&inline_error(bsdf_id));
            input.stream.push('\n');
        } else {
            input
                .tree
                .add_number("weight", &self.object, 0.5, NumberOptions::new())?;
            if self.mask_type == MaskType::Cutoff {
                input
                    .tree
                    .add_number("cutoff", &self.object, 0.5, NumberOptions::new())?;
            }

            generate(&masked, input.tree, input.stream)?;
            let masked_id = input.tree.closure_id(&masked).unwrap_or(0);

            let header = input.tree.pull_header();
            input.stream.push_str(&header);
            input.stream.push_str(&format!(
                "  let bsdf_{bsdf_id} : BSDFShader = @|ctx| make_mix_bsdf("
            ));
            if inverted {
                input.stream.push_str(&format!(
                    "make_passthrough_bsdf(ctx.surf), bsdf_{masked_id}(ctx), "
                ));
            } else {
                input.stream.push_str(&format!(
                    "bsdf_{masked_id}(ctx), make_passthrough_bsdf(ctx.surf), "
                ));
            }

            match self.mask_type {
                MaskType::Mask => {
                    input
                        .stream
                        .push_str(&format!("{});\n", input.tree.inline("weight")));
                }
                MaskType::Cutoff => {
                    // The comparison is resolved at shading time but is
                    // deterministic: either fully masked or fully kept.
                    input.stream.push_str(&format!(
                        "select({} < {}, 0:f32, 1:f32));\n",
                        input.tree.inline("weight"),
                        input.tree.inline("cutoff"),
                    ));
                }
            }
        }

        input.tree.end_closure()
    }
}
