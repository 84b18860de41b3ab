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
use crate::tree::{SerializationInput, VectorOptions};
use crate::GenerateError;

pub(super) fn factory(name: &str, object: SceneObject) -> Box<dyn Bsdf> {
    Box::new(TransformBsdf {
        name: name.to_string(),
        object,
    })
}

struct TransformBsdf {
    name: String,
    object: SceneObject,
}

impl Bsdf for TransformBsdf {
    fn name(&self) -> &str {
        &self.name
    }

    fn serialize(&self, input: &mut SerializationInput) -> Result<(), GenerateError> {
        input.tree.begin_closure(&self.name);
        let inner = self.object.string_property("bsdf", "").to_string();
        input
            .tree
            .add_vector("normal", &self.object, Vec3::Z, VectorOptions::new())?;

        let bsdf_id = input.tree.current_closure_id();
        if inner.is_empty() {
            log::error!("Bsdf '{}' has no inner bsdf given", self.name);
            input.stream.push_str(&inline_error(bsdf_id));
            input.stream.push('\n');
        } else {
            generate(&inner, input.tree, input.stream)?;
            let inner_id = input.tree.closure_id(&inner).unwrap_or(0);

            if self.object.has_property("tangent") {
                input
                    .tree
                    .add_vector("tangent", &self.object, Vec3::X, VectorOptions::new())?;
                let header = input.tree.pull_header();
                input.stream.push_str(&header);
                input.stream.push_str(&format!(
                    "  let bsdf_{bsdf_id} : BSDFShader = @|ctx| make_normal_tangent_set(ctx, @|surf2| -> Bsdf {{ bsdf_{inner_id}(ctx.{{surf=surf2}}) }}, {}, {});\n",
                    input.tree.inline("normal"),
                    input.tree.inline("tangent"),
                ));
            } else {
                let header = input.tree.pull_header();
                input.stream.push_str(&header);
                input.stream.push_str(&format!(
                    "  let bsdf_{bsdf_id} : BSDFShader = @|ctx| make_normal_set(ctx, @|surf2| -> Bsdf {{ bsdf_{inner_id}(ctx.{{surf=surf2}}) }}, {});\n",
                    input.tree.inline("normal"),
                ));
            }
        }

        input.tree.end_closure()
    }
}
