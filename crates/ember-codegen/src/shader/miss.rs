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

//! The miss-shader entry point.

use crate::context::LoaderContext;
use crate::technique::{Technique, VariantInfo};
use crate::tree::ShadingTree;
use crate::{camera, light, medium, GenerateError};

use super::{
    construct_device, generate_database, generate_header, generate_technique, inline_scene_bbox,
    inline_spi,
};

/// Builds the miss shader for the current variant. Lights only appear
/// when the technique samples them; the environment contribution lives
/// here.
pub fn setup_miss_shader(
    ctx: &mut LoaderContext,
    technique: &dyn Technique,
    info: &VariantInfo,
) -> Result<String, GenerateError> {
    let mut stream = generate_header(info);
    stream.push_str("#[export] fn ig_miss_shader(settings: &Settings, first: i32, last: i32) -> () {\n");
    stream.push_str("  maybe_unused(settings);\n  ");
    stream.push_str(&construct_device(ctx.target));
    stream.push('\n');
    stream.push_str(&inline_scene_bbox(ctx));
    stream.push_str(&generate_database());

    if info.uses_lights {
        let mut tree = ShadingTree::new(ctx);
        light::generate(&mut tree, &mut stream, false)?;
    }
    if info.uses_media {
        let mut tree = ShadingTree::new(ctx);
        medium::generate(&mut tree, &mut stream)?;
    }
    if info.requires_explicit_camera {
        camera::generate(ctx, &mut stream)?;
    }

    stream.push_str(&format!("  let spi = {} : i32;\n", inline_spi(ctx, info)));

    generate_technique(technique, ctx, &mut stream)?;

    stream.push_str("  device.handle_miss_shader(technique, first, last, spi)\n}\n");
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Target;
    use crate::technique;
    use ember_core::scene::parse_scene_string;
    use std::path::Path;

    #[test]
    fn miss_shader_carries_lights_and_technique() {
        let scene = parse_scene_string(
            r#"{
                "technique": { "type": "path", "max_depth": 4 },
                "lights": [ { "name": "sky", "type": "env" } ]
            }"#,
            Path::new("."),
        )
        .unwrap();
        let mut ctx = LoaderContext::new(scene, Target::Generic, Path::new("cache"));
        let tech = technique::create(&ctx);
        let info = tech.info(&ctx);

        let shader = setup_miss_shader(&mut ctx, tech.as_ref(), &info.variants[0]).unwrap();
        assert!(shader.contains("ig_miss_shader"));
        assert!(shader.contains("make_environment_light"));
        assert!(shader.contains("make_path_renderer"));
        assert!(shader.contains("handle_miss_shader(technique, first, last, spi)"));
    }

    #[test]
    fn lights_stay_out_without_sampling() {
        let scene = parse_scene_string(
            r#"{
                "technique": { "type": "ao" },
                "lights": [ { "name": "sky", "type": "env" } ]
            }"#,
            Path::new("."),
        )
        .unwrap();
        let mut ctx = LoaderContext::new(scene, Target::Generic, Path::new("cache"));
        let tech = technique::create(&ctx);
        let info = tech.info(&ctx);

        let shader = setup_miss_shader(&mut ctx, tech.as_ref(), &info.variants[0]).unwrap();
        assert!(!shader.contains("make_environment_light"));
        assert!(shader.contains("make_ao_renderer"));
    }
}
