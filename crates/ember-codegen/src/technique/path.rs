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

use super::{
    ShadowHandlingMode, Technique, TechniqueInfo, DEFAULT_MAX_RAY_DEPTH, DEFAULT_MIN_RAY_DEPTH,
};
use crate::context::LoaderContext;
use crate::light;
use crate::tree::{IntegerOptions, NumberOptions, SerializationInput};
use crate::GenerateError;

pub(super) fn factory(object: SceneObject) -> Box<dyn Technique> {
    let light_selector = object.string_property("light_selector", "").to_string();
    let enable_nee = object.bool_property("nee", true);
    let mis_aovs = object.bool_property("aov_mis", false);
    Box::new(PathTechnique {
        object,
        light_selector,
        enable_nee,
        mis_aovs,
    })
}

struct PathTechnique {
    object: SceneObject,
    light_selector: String,
    enable_nee: bool,
    mis_aovs: bool,
}

impl Technique for PathTechnique {
    fn type_name(&self) -> &str {
        "path"
    }

    fn has_denoiser_support(&self) -> bool {
        true
    }

    fn info(&self, _ctx: &LoaderContext) -> TechniqueInfo {
        let mut info = TechniqueInfo::default();

        if self.mis_aovs {
            info.enabled_aovs.push("BSDF Weights".to_string());
            info.enabled_aovs.push("NEE Weights".to_string());
            info.variants[0].shadow_handling_mode = ShadowHandlingMode::Advanced;
        }

        info.variants[0].uses_lights = true;
        info.variants[0].primary_payload_count = 6;
        info.variants[0].emitter_payload_initializer =
            "make_simple_payload_initializer(init_pt_raypayload)".to_string();
        info
    }

    fn generate_body(&self, input: &mut SerializationInput) -> Result<(), GenerateError> {
        input.tree.add_integer(
            "max_depth",
            &self.object,
            DEFAULT_MAX_RAY_DEPTH,
            IntegerOptions::dynamic().make_global(),
        )?;
        input.tree.add_integer(
            "min_depth",
            &self.object,
            DEFAULT_MIN_RAY_DEPTH,
            IntegerOptions::dynamic().make_global(),
        )?;
        input.tree.add_number(
            "clamp",
            &self.object,
            0.0,
            NumberOptions::zero().make_global(),
        )?;

        // Handle AOVs
        if self.mis_aovs {
            input.stream.push_str(
                "  let aov_di  = device.load_aov_image(\"BSDF Weights\", spi);\n  let aov_nee = device.load_aov_image(\"NEE Weights\", spi);\n",
            );
        }

        input
            .stream
            .push_str("  let aovs = @|id:i32| -> AOVImage {\n    match(id) {\n");
        if self.mis_aovs {
            input
                .stream
                .push_str("      1 => aov_di,\n      2 => aov_nee,\n");
        }
        input
            .stream
            .push_str("      _ => make_empty_aov_image(0, 0)\n    }\n  };\n");

        let header = input.tree.pull_header();
        input.stream.push_str(&header);
        light::generate_light_selector(&self.light_selector, input.tree, input.stream)?;
        input.stream.push_str(&format!(
            "  let technique = make_path_renderer({}, {}, light_selector, aovs, {}, {});\n",
            input.tree.inline("max_depth"),
            input.tree.inline("min_depth"),
            input.tree.inline("clamp"),
            self.enable_nee,
        ));
        Ok(())
    }
}
