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

//! Progressive photon mapping.
//!
//! Two passes per iteration: pass 0 emits photons from the lights into
//! the light cache, pass 1 gathers by path tracing with merging. The
//! before-iteration hook resets the cache (pass 0) or builds the query
//! structure over it (pass 1).

use ember_core::SceneObject;

use super::lighttracer::light_camera_generator;
use super::{
    CallbackType, Technique, TechniqueInfo, VariantInfo, DEFAULT_MAX_RAY_DEPTH,
    DEFAULT_MIN_RAY_DEPTH,
};
use crate::context::LoaderContext;
use crate::shader;
use crate::tree::{IntegerOptions, NumberOptions, SerializationInput};
use crate::GenerateError;

pub(super) fn factory(object: SceneObject) -> Box<dyn Technique> {
    let photon_count = object.integer_property("photons", 1_000_000).max(100) as usize;
    let light_selector = object.string_property("light_selector", "").to_string();
    let aov = object.bool_property("aov", false);
    Box::new(PhotonMappingTechnique {
        object,
        photon_count,
        light_selector,
        aov,
    })
}

struct PhotonMappingTechnique {
    object: SceneObject,
    photon_count: usize,
    light_selector: String,
    aov: bool,
}

fn before_iteration_generator(variant: usize) -> impl Fn(&mut LoaderContext) -> String {
    move |ctx: &mut LoaderContext| {
        let info = VariantInfo {
            primary_payload_count: 7,
            ..Default::default()
        };
        let mut stream = shader::begin_callback(ctx, &info);
        stream.push_str(
            "  let tech_photons = registry::get_global_parameter_i32(\"__tech_photon_count\", 1000);\n",
        );
        stream.push_str(&format!(
            "  ppm_handle_before_iteration(device, settings.iter, {variant}, tech_photons, scene_bbox);\n"
        ));
        stream.push_str(&shader::end_callback());
        stream
    }
}

impl Technique for PhotonMappingTechnique {
    fn type_name(&self) -> &str {
        "ppm"
    }

    fn info(&self, _ctx: &LoaderContext) -> TechniqueInfo {
        let mut info = TechniqueInfo::default();

        // Two passes: 0 -> light emission, 1 -> path tracing with merging.
        info.variants = vec![VariantInfo::default(), VariantInfo::default()];
        info.variants[0].uses_lights = false; // Photon emission starts on a light.
        info.variants[1].uses_lights = true; // Standard PT still uses lights in the miss shader.

        info.variants[0].primary_payload_count = 7;
        info.variants[1].primary_payload_count = 7;

        info.variants[1].emitter_payload_initializer =
            "make_simple_payload_initializer(init_ppm_raypayload)".to_string();

        // Photon emission starts from a light source, not the camera.
        info.variants[0].override_camera_generator = Some(Box::new(light_camera_generator(
            self.light_selector.clone(),
            "make_ppm_light_emitter",
        )));

        // Pass 0 resets the light cache, pass 1 builds the query structure.
        info.variants[0].callback_generators[CallbackType::BeforeIteration as usize] =
            Some(Box::new(before_iteration_generator(0)));
        info.variants[1].callback_generators[CallbackType::BeforeIteration as usize] =
            Some(Box::new(before_iteration_generator(1)));

        // The emission pass works independent of the framebuffer and uses
        // the photon count as its launch width.
        info.variants[0].override_width = Some(self.photon_count);
        info.variants[0].override_height = Some(1);
        info.variants[0].override_spi = Some(1);
        info.variants[0].lock_framebuffer = true;

        if self.aov {
            info.enabled_aovs.push("Direct Weights".to_string());
            info.enabled_aovs.push("Merging Weights".to_string());
        }

        info
    }

    fn generate_body(&self, input: &mut SerializationInput) -> Result<(), GenerateError> {
        let is_light_pass = input.tree.context().current_variant == 0;

        let max_depth = if self.object.has_property("max_depth") {
            "max_depth"
        } else {
            "max_camera_depth"
        };
        let min_depth = if self.object.has_property("min_depth") {
            "min_depth"
        } else {
            "min_camera_depth"
        };

        let scene_diameter = input.tree.context().scene_diameter;
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
        input.tree.add_integer(
            "max_light_depth",
            &self.object,
            8,
            IntegerOptions::dynamic().make_global(),
        )?;
        input.tree.add_number(
            "radius",
            &self.object,
            0.01 * scene_diameter,
            NumberOptions::zero().make_global(),
        )?;
        input.tree.add_number(
            "clamp",
            &self.object,
            0.0,
            NumberOptions::zero().make_global(),
        )?;
        input.tree.add_computed_integer(
            "photon_count",
            self.photon_count as i32,
            IntegerOptions::dynamic().make_global(),
        );

        // Handle AOVs
        if is_light_pass {
            input.stream.push_str(
                "  let aovs = @|id:i32| -> AOVImage {\n    match(id) {\n      _ => make_empty_aov_image(0, 0)\n    }\n  };\n",
            );
        } else {
            if self.aov {
                input.stream.push_str(
                    "  let aov_di   = device.load_aov_image(\"Direct Weights\", spi);\n  let aov_merg = device.load_aov_image(\"Merging Weights\", spi);\n",
                );
            }
            input
                .stream
                .push_str("  let aovs = @|id:i32| -> AOVImage {\n    match(id) {\n");
            if self.aov {
                input
                    .stream
                    .push_str("      1 => aov_di,\n      2 => aov_merg,\n");
            }
            input
                .stream
                .push_str("      _ => make_empty_aov_image(0, 0)\n    }\n  };\n");
        }

        let header = input.tree.pull_header();
        input.stream.push_str(&header);
        input.stream.push_str(&format!(
            "  let light_cache = make_ppm_lightcache(device, {}, scene_bbox);\n",
            input.tree.inline("photon_count"),
        ));

        if is_light_pass {
            input.stream.push_str(&format!(
                "  let technique = make_ppm_light_renderer({}, aovs, light_cache);\n",
                input.tree.inline("max_light_depth"),
            ));
        } else {
            crate::light::generate_light_selector(&self.light_selector, input.tree, input.stream)?;
            input.stream.push_str(&format!(
                "  let ppm_radius = ppm_compute_radius({}, settings.iter);\n",
                input.tree.inline("radius"),
            ));
            input.stream.push_str(&format!(
                "  let technique = make_ppm_path_renderer({}, {}, light_selector, ppm_radius, aovs, {}, light_cache);\n",
                input.tree.inline(max_depth),
                input.tree.inline(min_depth),
                input.tree.inline("clamp"),
            ));
        }
        Ok(())
    }
}
