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

//! The ray-generation entry point.

use crate::camera;
use crate::context::LoaderContext;
use crate::technique::VariantInfo;
use crate::GenerateError;

use super::{construct_device, generate_header, inline_scene_bbox, inline_spi};

/// Opens the ray-generation entry point. Techniques that override the
/// camera generator (light tracing, photon emission) start from this and
/// provide their own `emitter`.
pub fn begin_ray_generation(ctx: &LoaderContext, info: &VariantInfo) -> String {
    let mut stream = generate_header(info);
    stream.push_str(
        "#[export] fn ig_ray_generation_shader(settings: &Settings, iter: i32, id: &mut i32, size: i32, xmin: i32, ymin: i32, xmax: i32, ymax: i32) -> i32 {\n",
    );
    stream.push_str("  maybe_unused(settings);\n  ");
    stream.push_str(&construct_device(ctx.target));
    stream.push('\n');
    stream.push_str(&inline_scene_bbox(ctx));
    stream.push_str(&format!("  let spp = {} : i32;\n", inline_spi(ctx, info)));
    stream
}

/// Closes the ray-generation entry point.
pub fn end_ray_generation() -> String {
    "  device.generate_rays(emitter, id, size, xmin, ymin, xmax, ymax, spp)\n}\n".to_string()
}

/// The standard camera-driven ray generation. In tracer mode the camera
/// is replaced by the registered ray list.
pub fn setup_ray_generation_shader(
    ctx: &mut LoaderContext,
    info: &VariantInfo,
) -> Result<String, GenerateError> {
    let mut stream = begin_ray_generation(ctx, info);

    if ctx.is_tracer {
        stream.push_str(
            "  let emitter = make_list_emitter(device.load_rays(), iter, init_raypayload);\n",
        );
    } else {
        camera::generate(ctx, &mut stream)?;

        let pixel_sampler = match ctx.pixel_sampler.as_str() {
            "halton" => {
                stream.push_str(
                    "  let halton_setup = setup_halton_pixel_sampler(device, settings.width, settings.height, iter, xmin, ymin, xmax, ymax);\n",
                );
                "make_halton_pixel_sampler(halton_setup)"
            }
            "mjitt" => "make_mjitt_pixel_sampler(4, 4)",
            _ => "make_uniform_pixel_sampler()",
        };

        stream.push_str(&format!(
            "  let emitter = make_camera_emitter(camera, iter, spp, {pixel_sampler}, {});\n",
            payload_initializer(info),
        ));
    }

    stream.push_str(&end_ray_generation());
    Ok(stream)
}

fn payload_initializer(info: &VariantInfo) -> &str {
    &info.emitter_payload_initializer
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Target;
    use ember_core::scene::parse_scene_string;
    use std::path::Path;

    fn context(tracer: bool) -> LoaderContext {
        let scene = parse_scene_string(
            r#"{ "camera": { "type": "perspective" } }"#,
            Path::new("."),
        )
        .unwrap();
        let mut ctx = LoaderContext::new(scene, Target::Avx2, Path::new("cache"));
        ctx.is_tracer = tracer;
        ctx.samples_per_iteration = 4;
        ctx
    }

    #[test]
    fn camera_mode_emits_camera_emitter() {
        let mut ctx = context(false);
        let mut info = VariantInfo::default();
        info.primary_payload_count = 6;
        info.emitter_payload_initializer =
            "make_simple_payload_initializer(init_pt_raypayload)".to_string();

        let shader = setup_ray_generation_shader(&mut ctx, &info).unwrap();
        assert!(shader.starts_with("static RayPayloadComponents = 6;"));
        assert!(shader.contains("make_avx2_device()"));
        assert!(shader.contains("let spp = 4 : i32;"));
        assert!(shader.contains("make_camera_emitter(camera, iter, spp, make_uniform_pixel_sampler(), make_simple_payload_initializer(init_pt_raypayload))"));
        assert!(shader.contains("device.generate_rays(emitter"));
    }

    #[test]
    fn tracer_mode_reads_the_ray_list() {
        let mut ctx = context(true);
        let info = VariantInfo::default();
        let shader = setup_ray_generation_shader(&mut ctx, &info).unwrap();
        assert!(shader.contains("make_list_emitter(device.load_rays(), iter, init_raypayload)"));
        assert!(!shader.contains("make_perspective_camera"));
    }

    #[test]
    fn spi_override_wins() {
        let mut ctx = context(false);
        let mut info = VariantInfo::default();
        info.override_spi = Some(1);
        let shader = setup_ray_generation_shader(&mut ctx, &info).unwrap();
        assert!(shader.contains("let spp = 1 : i32;"));
    }
}
