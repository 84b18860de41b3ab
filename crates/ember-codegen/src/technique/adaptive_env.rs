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

//! Path tracing with an adaptively learned environment-map CDF.
//!
//! Pass 0 spends the first iteration learning the environment
//! distribution; every following iteration samples through the learned
//! CDF in pass 1.

use ember_core::SceneObject;

use super::{
    CallbackType, Technique, TechniqueInfo, VariantInfo, DEFAULT_MAX_RAY_DEPTH,
    DEFAULT_MIN_RAY_DEPTH,
};
use crate::context::LoaderContext;
use crate::shader;
use crate::tree::{IntegerOptions, NumberOptions, SerializationInput};
use crate::{light, GenerateError};

pub(super) fn factory(object: SceneObject) -> Box<dyn Technique> {
    let light_selector = object.string_property("light_selector", "").to_string();
    Box::new(AdaptiveEnvTechnique {
        object,
        light_selector,
    })
}

struct AdaptiveEnvTechnique {
    object: SceneObject,
    light_selector: String,
}

fn learning_callback(call: &'static str) -> impl Fn(&mut LoaderContext) -> String {
    move |ctx: &mut LoaderContext| {
        let info = VariantInfo {
            primary_payload_count: 11,
            ..Default::default()
        };
        let mut stream = shader::begin_callback(ctx, &info);
        stream.push_str(&format!("  {call}(device, settings.iter);\n"));
        stream.push_str(&shader::end_callback());
        stream
    }
}

impl Technique for AdaptiveEnvTechnique {
    fn type_name(&self) -> &str {
        "adaptive_env"
    }

    fn info(&self, _ctx: &LoaderContext) -> TechniqueInfo {
        let mut info = TechniqueInfo::default();

        // Two passes: 0 -> learning, 1 -> sampling.
        info.variants = vec![VariantInfo::default(), VariantInfo::default()];
        info.variants[0].uses_lights = true;
        info.variants[1].uses_lights = true;

        info.variants[0].primary_payload_count = 11;
        info.variants[1].primary_payload_count = 6;

        info.variants[0].emitter_payload_initializer =
            "make_simple_payload_initializer(init_adaptive_env_learning_raypayload)".to_string();
        info.variants[1].emitter_payload_initializer =
            "make_simple_payload_initializer(init_adaptive_env_sampling_raypayload)".to_string();

        // The learning pass needs a CDF construction step afterwards.
        info.variants[0].callback_generators[CallbackType::BeforeIteration as usize] =
            Some(Box::new(learning_callback(
                "aept_handle_before_iteration_learning",
            )));
        info.variants[0].callback_generators[CallbackType::AfterIteration as usize] =
            Some(Box::new(learning_callback(
                "aept_handle_after_iteration_learning",
            )));

        info.variants[0].lock_framebuffer = true; // Learning does not contribute.

        info.enabled_aovs.push("Guiding".to_string());
        info.enabled_aovs.push("Guiding PDF".to_string());

        info.variant_selector = Some(Box::new(|iteration| {
            if iteration < 1 {
                vec![0]
            } else {
                vec![1]
            }
        }));

        info
    }

    fn generate_body(&self, input: &mut SerializationInput) -> Result<(), GenerateError> {
        let is_learning_pass = input.tree.context().current_variant == 0;

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

        let enable_nee = false; // NEE interferes with the learned distribution.

        let header = input.tree.pull_header();
        input.stream.push_str(&header);
        light::generate_light_selector(&self.light_selector, input.tree, input.stream)?;

        let renderer = if is_learning_pass {
            "make_adaptive_env_learning_path_renderer(device"
        } else {
            "make_adaptive_env_sampling_path_renderer(device, spi"
        };
        input.stream.push_str(&format!(
            "  let technique = {renderer}, {}, {}, light_selector, {}, {});\n",
            input.tree.inline("max_depth"),
            input.tree.inline("min_depth"),
            input.tree.inline("clamp"),
            enable_nee,
        ));
        Ok(())
    }
}
