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

use super::{dielectric_ior, setup_roughness, Bsdf};
use crate::tree::{ColorOptions, NumberOptions, SerializationInput};
use crate::GenerateError;

pub(super) fn factory(name: &str, object: SceneObject) -> Box<dyn Bsdf> {
    Box::new(PlasticBsdf {
        name: name.to_string(),
        object,
    })
}

struct PlasticBsdf {
    name: String,
    object: SceneObject,
}

impl Bsdf for PlasticBsdf {
    fn name(&self) -> &str {
        &self.name
    }

    fn serialize(&self, input: &mut SerializationInput) -> Result<(), GenerateError> {
        let ext_default = dielectric_ior("vacuum").expect("known material");
        let int_default = dielectric_ior("polypropylene").expect("known material");

        let ext_spec = dielectric_ior(self.object.string_property("ext_ior_material", ""));
        let int_spec = dielectric_ior(self.object.string_property("int_ior_material", ""));

        input.tree.begin_closure(&self.name);
        input.tree.add_color(
            "specular_reflectance",
            &self.object,
            Vec3::ONE,
            ColorOptions::new(),
        )?;
        input.tree.add_color(
            "diffuse_reflectance",
            &self.object,
            Vec3::splat(0.8),
            ColorOptions::new(),
        )?;
        input.tree.add_number(
            "ext_ior",
            &self.object,
            ext_spec.unwrap_or(ext_default),
            NumberOptions::new(),
        )?;
        input.tree.add_number(
            "int_ior",
            &self.object,
            int_spec.unwrap_or(int_default),
            NumberOptions::new(),
        )?;

        setup_roughness(&self.object, input)?;

        let bsdf_id = input.tree.current_closure_id();
        let header = input.tree.pull_header();
        input.stream.push_str(&header);
        input.stream.push_str(&format!(
            "  let bsdf_{bsdf_id} : BSDFShader = @|ctx| make_plastic_bsdf(ctx.surf, {}, {}, {}, make_conductor_bsdf(ctx.surf, color_builtins::black, color_builtins::white, {}, md_{bsdf_id}(ctx)));\n",
            input.tree.inline("ext_ior"),
            input.tree.inline("int_ior"),
            input.tree.inline("diffuse_reflectance"),
            input.tree.inline("specular_reflectance"),
        ));
        input.tree.end_closure()
    }
}
