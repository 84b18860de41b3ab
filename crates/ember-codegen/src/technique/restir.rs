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

//! Reservoir-based spatiotemporal importance resampling.

use ember_core::SceneObject;

use super::{
    CallbackType, ShadowHandlingMode, Technique, TechniqueInfo, DEFAULT_MAX_RAY_DEPTH,
};
use crate::context::LoaderContext;
use crate::shader;
use crate::tree::{IntegerOptions, NumberOptions, SerializationInput};
use crate::{light, GenerateError};

pub(super) fn factory(object: SceneObject) -> Box<dyn Technique> {
    let light_selector = object.string_property("light_selector", "").to_string();
    Box::new(RestirTechnique {
        object,
        light_selector,
    })
}

struct RestirTechnique {
    object: SceneObject,
    light_selector: String,
}

fn resampling_generator(ctx: &mut LoaderContext) -> String {
    let info = super::VariantInfo {
        primary_payload_count: 6,
        ..Default::default()
    };
    let spi = ctx.samples_per_iteration;
    let mut stream = shader::begin_callback(ctx, &info);
    stream.push_str(&shader::generate_database());
    stream.push_str(&format!("  let spi = {spi} : i32;\n"));
    stream.push_str("  resampling_pass(device, iter, spi, settings.frame);\n");
    stream.push_str(&shader::end_callback());
    stream
}

impl Technique for RestirTechnique {
    fn type_name(&self) -> &str {
        "restir"
    }

    fn info(&self, _ctx: &LoaderContext) -> TechniqueInfo {
        let mut info = TechniqueInfo::default();

        info.enabled_aovs.push("ReSTIR".to_string());
        info.enabled_aovs.push("Direct Light".to_string());
        info.enabled_aovs.push("Depth Info".to_string());

        info.variants[0].shadow_handling_mode = ShadowHandlingMode::Advanced;
        info.variants[0].requires_explicit_camera = true;
        info.variants[0].uses_lights = true;
        info.variants[0].primary_payload_count = 6;
        info.variants[0].emitter_payload_initializer =
            "make_simple_payload_initializer(init_rs_raypayload)".to_string();

        info.variants[0].callback_generators[CallbackType::AfterIteration as usize] =
            Some(Box::new(resampling_generator));
        info
    }

    fn generate_body(&self, input: &mut SerializationInput) -> Result<(), GenerateError> {
        input.tree.add_integer(
            "max_depth",
            &self.object,
            DEFAULT_MAX_RAY_DEPTH,
            IntegerOptions::dynamic().make_global(),
        )?;
        input.tree.add_number(
            "clamp",
            &self.object,
            0.0,
            NumberOptions::zero().make_global(),
        )?;

        // Handle AOVs
        input.stream.push_str(
            "  let aov_restir = device.load_aov_image(\"ReSTIR\", spi); aov_restir.mark_as_used();\n  let aov_direct_light = device.load_aov_image(\"Direct Light\", spi); aov_direct_light.mark_as_used();\n  let aov_depth_info = device.load_aov_image(\"Depth Info\", 1); aov_depth_info.mark_as_used();\n",
        );
        input.stream.push_str(
            "  let aovs = @|id:i32| -> AOVImage {\n    match(id) {\n      1 => aov_restir,\n      2 => aov_direct_light,\n      3 => aov_depth_info,\n      _ => make_empty_aov_image(0, 0)\n    }\n  };\n",
        );

        let header = input.tree.pull_header();
        input.stream.push_str(&header);
        light::generate_light_selector(&self.light_selector, input.tree, input.stream)?;
        input.stream.push_str(&format!(
            "  let technique = make_restir_renderer(camera, device, {}, light_selector, aovs, {}, settings.frame);\n",
            input.tree.inline("max_depth"),
            input.tree.inline("clamp"),
        ));
        Ok(())
    }
}
