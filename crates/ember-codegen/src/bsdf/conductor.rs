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

use super::{conductor, setup_roughness, Bsdf};
use crate::tree::{ColorOptions, SerializationInput};
use crate::GenerateError;

pub(super) fn factory(name: &str, object: SceneObject) -> Box<dyn Bsdf> {
    Box::new(ConductorBsdf {
        name: name.to_string(),
        object,
    })
}

struct ConductorBsdf {
    name: String,
    object: SceneObject,
}

impl Bsdf for ConductorBsdf {
    fn name(&self) -> &str {
        &self.name
    }

    fn serialize(&self, input: &mut SerializationInput) -> Result<(), GenerateError> {
        let default = conductor("none").expect("known material");
        let spec = conductor(self.object.string_property("material", "")).unwrap_or(default);

        input.tree.begin_closure(&self.name);
        input.tree.add_color(
            "specular_reflectance",
            &self.object,
            Vec3::ONE,
            ColorOptions::new(),
        )?;
        input
            .tree
            .add_color("eta", &self.object, spec.eta, ColorOptions::new())?;
        input
            .tree
            .add_color("k", &self.object, spec.kappa, ColorOptions::new())?;

        setup_roughness(&self.object, input)?;

        let bsdf_id = input.tree.current_closure_id();
        let header = input.tree.pull_header();
        input.stream.push_str(&header);
        input.stream.push_str(&format!(
            "  let bsdf_{bsdf_id} : BSDFShader = @|ctx| make_conductor_bsdf(ctx.surf, {}, {}, {}, md_{bsdf_id}(ctx));\n",
            input.tree.inline("eta"),
            input.tree.inline("k"),
            input.tree.inline("specular_reflectance"),
        ));
        input.tree.end_closure()
    }
}
