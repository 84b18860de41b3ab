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
use crate::shader;
use crate::tree::{IntegerOptions, NumberOptions, SerializationInput, ShadingTree};
use crate::{light, GenerateError};

pub(super) fn factory(object: SceneObject) -> Box<dyn Technique> {
    let light_selector = object.string_property("light_selector", "").to_string();
    Box::new(LightTracerTechnique {
        object,
        light_selector,
    })
}

struct LightTracerTechnique {
    object: SceneObject,
    light_selector: String,
}

/// Ray generation starting on a light source instead of the camera.
pub(super) fn light_camera_generator(
    light_selector: String,
    emitter: &'static str,
) -> impl Fn(&mut LoaderContext) -> String {
    move |ctx: &mut LoaderContext| {
        let info = super::VariantInfo {
            primary_payload_count: 5,
            secondary_payload_count: 2,
            ..Default::default()
        };
        let mut stream = shader::begin_ray_generation(ctx, &info);
        stream.push_str(&shader::generate_database());

        let mut tree = ShadingTree::new(ctx);
        let result = light::generate(&mut tree, &mut stream, false).and_then(|_| {
            light::generate_light_selector(&light_selector, &mut tree, &mut stream)
        });
        if let Err(err) = result {
            log::error!("Could not generate light emitter: {err}");
        }

        stream.push_str(&format!("  let emitter = {emitter}(light_selector, render_config);\n"));
        stream.push_str(&shader::end_ray_generation());
        stream
    }
}

impl Technique for LightTracerTechnique {
    fn type_name(&self) -> &str {
        "lighttracer"
    }

    fn info(&self, _ctx: &LoaderContext) -> TechniqueInfo {
        let mut info = TechniqueInfo::default();

        // LT makes no use of other lights (but starts on one).
        info.variants[0].uses_lights = false;
        info.variants[0].primary_payload_count = 5;
        info.variants[0].secondary_payload_count = 2;
        info.variants[0].requires_explicit_camera = true;
        info.variants[0].shadow_handling_mode = ShadowHandlingMode::Advanced;

        let selector = self.light_selector.clone();
        info.variants[0].override_camera_generator = Some(Box::new(light_camera_generator(
            selector,
            "make_lt_emitter",
        )));
        info
    }

    fn generate_body(&self, input: &mut SerializationInput) -> Result<(), GenerateError> {
        let max_depth = if self.object.has_property("max_depth") {
            "max_depth"
        } else {
            "max_light_depth"
        };
        let min_depth = if self.object.has_property("min_depth") {
            "min_depth"
        } else {
            "min_light_depth"
        };

        input.tree.add_integer(
            max_depth,
            &self.object,
            DEFAULT_MAX_RAY_DEPTH,
            IntegerOptions::dynamic().make_global(),
        )?;
        input.tree.add_integer(
            min_depth,
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

        let header = input.tree.pull_header();
        input.stream.push_str(&header);
        input
            .stream
            .push_str("  let framebuffer = device.load_aov_image(\"\", spi);\n");
        input.stream.push_str(&format!(
            "  let technique = make_lt_renderer(camera, framebuffer, {}, {}, {});\n",
            input.tree.inline(max_depth),
            input.tree.inline(min_depth),
            input.tree.inline("clamp"),
        ));
        Ok(())
    }
}
