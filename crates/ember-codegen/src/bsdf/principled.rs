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

use super::{dielectric_ior, Bsdf};
use crate::tree::{ColorOptions, NumberOptions, SerializationInput};
use crate::GenerateError;

pub(super) fn factory(name: &str, object: SceneObject) -> Box<dyn Bsdf> {
    Box::new(PrincipledBsdf {
        name: name.to_string(),
        use_explicit_roughness: object.has_property("roughness_u")
            || object.has_property("roughness_v"),
        object,
    })
}

struct PrincipledBsdf {
    name: String,
    object: SceneObject,
    use_explicit_roughness: bool,
}

impl Bsdf for PrincipledBsdf {
    fn name(&self) -> &str {
        &self.name
    }

    fn serialize(&self, input: &mut SerializationInput) -> Result<(), GenerateError> {
        let int_ior_default = dielectric_ior("bk7").expect("known material");
        let ior_spec = dielectric_ior(self.object.string_property("ior_material", ""));

        let tree = &mut *input.tree;
        tree.begin_closure(&self.name);
        tree.add_color("base_color", &self.object, Vec3::splat(0.8), ColorOptions::new())?;
        tree.add_number(
            "ior",
            &self.object,
            ior_spec.unwrap_or(int_ior_default),
            NumberOptions::dynamic(),
        )?;
        tree.add_number("diffuse_transmission", &self.object, 0.0, NumberOptions::zero())?;
        tree.add_number("specular_transmission", &self.object, 0.0, NumberOptions::new())?;
        tree.add_number("specular_tint", &self.object, 0.0, NumberOptions::new())?;
        if self.use_explicit_roughness {
            tree.add_number("roughness_u", &self.object, 0.5, NumberOptions::dynamic())?;
            tree.add_number("roughness_v", &self.object, 0.5, NumberOptions::dynamic())?;
        } else {
            tree.add_number("roughness", &self.object, 0.5, NumberOptions::dynamic())?;
            tree.add_number("anisotropic", &self.object, 0.0, NumberOptions::zero())?;
        }
        tree.add_number("flatness", &self.object, 0.0, NumberOptions::new())?;
        tree.add_number("metallic", &self.object, 0.0, NumberOptions::new())?;
        tree.add_number("sheen", &self.object, 0.0, NumberOptions::zero())?;
        tree.add_number("sheen_tint", &self.object, 0.0, NumberOptions::new())?;
        tree.add_number("clearcoat", &self.object, 0.0, NumberOptions::zero())?;
        tree.add_number("clearcoat_gloss", &self.object, 0.0, NumberOptions::new())?;
        tree.add_number("clearcoat_roughness", &self.object, 0.1, NumberOptions::dynamic())?;

        let is_thin = self.object.bool_property("thin", false);
        let clearcoat_top_only = self.object.bool_property("clearcoat_top_only", true);

        let bsdf_id = tree.current_closure_id();
        let header = tree.pull_header();
        input.stream.push_str(&header);
        input
            .stream
            .push_str(&format!("  let bsdf_{bsdf_id} : BSDFShader = @|ctx| {{ "));

        if self.use_explicit_roughness {
            input.stream.push_str(&format!(
                "let ru = {}; let rv = {}; ",
                tree.inline("roughness_u"),
                tree.inline("roughness_v"),
            ));
        } else {
            input.stream.push_str(&format!(
                "let (ru, rv) = principled::compute_roughness({}, {}); ",
                tree.inline("roughness"),
                tree.inline("anisotropic"),
            ));
        }

        input.stream.push_str(&format!(
            "make_principled_bsdf(ctx.surf, {}, {}, {}, {}, {}, ru, rv, {}, {}, {}, {}, {}, {}, {}, {}, {}) }};\n",
            tree.inline("base_color"),
            tree.inline("ior"),
            tree.inline("diffuse_transmission"),
            tree.inline("specular_transmission"),
            tree.inline("specular_tint"),
            tree.inline("flatness"),
            tree.inline("metallic"),
            tree.inline("sheen"),
            tree.inline("sheen_tint"),
            tree.inline("clearcoat"),
            tree.inline("clearcoat_gloss"),
            tree.inline("clearcoat_roughness"),
            if is_thin { "true" } else { "false" },
            if clearcoat_top_only { "true" } else { "false" },
        ));
        tree.end_closure()
    }
}
