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

//! Technique plugins and their variant declarations.
//!
//! A technique expands into one or more variants per iteration. Each
//! variant declares its payload layout, shadow handling, framebuffer
//! behavior, and optional shader-source callbacks; the runtime driver
//! executes whatever the variant selector returns for the current
//! iteration.

mod adaptive_env;
mod ao;
mod debug;
mod lighttracer;
mod path;
mod photonmapping;
mod restir;
mod volpath;
mod wireframe;

use ember_core::SceneObject;
use std::sync::OnceLock;

use crate::context::LoaderContext;
use crate::registry::PluginRegistry;
use crate::tree::SerializationInput;
use crate::GenerateError;

/// Hard upper bound for camera/light path lengths.
pub const DEFAULT_MAX_RAY_DEPTH: i32 = 64;
/// Default lower bound before Russian roulette may terminate a path.
pub const DEFAULT_MIN_RAY_DEPTH: i32 = 2;

/// How shadow rays of a variant are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShadowHandlingMode {
    /// Plain any-hit visibility.
    #[default]
    Simple,
    /// A dedicated advanced-shadow shader runs per shadow ray.
    Advanced,
    /// Advanced handling with material evaluation on the shadow path.
    AdvancedWithMaterials,
}

impl ShadowHandlingMode {
    /// `true` when the variant needs the advanced-shadow entry point.
    pub fn is_advanced(&self) -> bool {
        !matches!(self, ShadowHandlingMode::Simple)
    }
}

/// The two per-iteration callback slots of a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackType {
    /// Runs before the ray-generation dispatch.
    BeforeIteration = 0,
    /// Runs after all kernels of the variant finished.
    AfterIteration = 1,
}

/// A function producing shader source from the loader context.
pub type ShaderGenerator = Box<dyn Fn(&mut LoaderContext) -> String>;

/// Declaration of a single technique variant.
pub struct VariantInfo {
    /// f32 words reserved per primary ray.
    pub primary_payload_count: usize,
    /// f32 words reserved per secondary (shadow) ray.
    pub secondary_payload_count: usize,
    /// Shadow resolution mode.
    pub shadow_handling_mode: ShadowHandlingMode,
    /// `true` when the variant samples scene lights.
    pub uses_lights: bool,
    /// `true` when the variant marches participating media.
    pub uses_media: bool,
    /// `true` when the variant needs the camera object in scope even
    /// with an override generator present.
    pub requires_explicit_camera: bool,
    /// The variant does not contribute to the framebuffer.
    pub lock_framebuffer: bool,
    /// Samples-per-iteration override.
    pub override_spi: Option<u32>,
    /// Launch-width override.
    pub override_width: Option<usize>,
    /// Launch-height override.
    pub override_height: Option<usize>,
    /// Expression initializing the per-ray payload at emission.
    pub emitter_payload_initializer: String,
    /// Optional shader-source callbacks, indexed by [`CallbackType`].
    pub callback_generators: [Option<ShaderGenerator>; 2],
    /// Replaces the standard camera-driven ray generation.
    pub override_camera_generator: Option<ShaderGenerator>,
}

impl Default for VariantInfo {
    fn default() -> Self {
        Self {
            primary_payload_count: 0,
            secondary_payload_count: 0,
            shadow_handling_mode: ShadowHandlingMode::Simple,
            uses_lights: false,
            uses_media: false,
            requires_explicit_camera: false,
            lock_framebuffer: false,
            override_spi: None,
            override_width: None,
            override_height: None,
            emitter_payload_initializer: "make_empty_payload_initializer()".to_string(),
            callback_generators: [None, None],
            override_camera_generator: None,
        }
    }
}

/// A full technique declaration: variants, extra AOVs, and the selector
/// deciding which variants run at a given iteration.
pub struct TechniqueInfo {
    /// At least one variant.
    pub variants: Vec<VariantInfo>,
    /// AOV names this technique wants allocated.
    pub enabled_aovs: Vec<String>,
    /// Maps an iteration number to the variants to execute, in order.
    /// `None` runs all variants once.
    pub variant_selector: Option<Box<dyn Fn(usize) -> Vec<usize>>>,
}

impl Default for TechniqueInfo {
    fn default() -> Self {
        Self {
            variants: vec![VariantInfo::default()],
            enabled_aovs: Vec::new(),
            variant_selector: None,
        }
    }
}

impl TechniqueInfo {
    /// The variants to run at `iteration`. The default selector returns
    /// every variant once, in declaration order.
    pub fn variant_selection(&self, iteration: usize) -> Vec<usize> {
        match &self.variant_selector {
            Some(selector) => selector(iteration),
            None => (0..self.variants.len()).collect(),
        }
    }
}

/// A technique plugin.
pub trait Technique {
    /// The plugin type string.
    fn type_name(&self) -> &str;

    /// `true` when the beauty output is compatible with the denoiser.
    fn has_denoiser_support(&self) -> bool {
        false
    }

    /// The variant declaration the runtime schedules.
    fn info(&self, ctx: &LoaderContext) -> TechniqueInfo;

    /// Emits the `technique` binding for the current variant.
    fn generate_body(&self, input: &mut SerializationInput) -> Result<(), GenerateError>;
}

type TechniqueFactory = fn(SceneObject) -> Box<dyn Technique>;

fn registry() -> &'static PluginRegistry<TechniqueFactory> {
    static REGISTRY: OnceLock<PluginRegistry<TechniqueFactory>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut registry = PluginRegistry::new();
        registry.register(&["ao"], ao::factory as TechniqueFactory);
        registry.register(&["path"], path::factory as TechniqueFactory);
        registry.register(&["volpath"], volpath::factory as TechniqueFactory);
        registry.register(
            &["lighttracer", "lt" /* Deprecated */],
            lighttracer::factory as TechniqueFactory,
        );
        registry.register(
            &["ppm", "photonmapper", "photon"],
            photonmapping::factory as TechniqueFactory,
        );
        registry.register(&["adaptive_env", "aept"], adaptive_env::factory as TechniqueFactory);
        registry.register(&["restir"], restir::factory as TechniqueFactory);
        registry.register(&["wireframe"], wireframe::factory as TechniqueFactory);
        registry.register(&["debug"], debug::factory as TechniqueFactory);
        registry
    })
}

/// All registered technique type strings.
pub fn available_types() -> Vec<&'static str> {
    registry().known_types()
}

/// Instantiates the scene's technique. A missing or unknown type falls
/// back to the path tracer with an error log; rendering continues.
pub fn create(ctx: &LoaderContext) -> Box<dyn Technique> {
    let object = match &ctx.scene.technique {
        Some(object) => object.clone(),
        None => SceneObject::new(
            ember_core::ObjectKind::Technique,
            "__technique",
            "path",
            std::path::Path::new("."),
        ),
    };

    match registry().lookup(object.plugin_type()) {
        Some(factory) => factory(object),
        None => {
            log::error!(
                "Unknown technique type '{}', falling back to 'path'",
                object.plugin_type()
            );
            path::factory(object)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Target;
    use crate::tree::ShadingTree;
    use ember_core::scene::parse_scene_string;
    use std::path::Path;

    fn context(json: &str) -> LoaderContext {
        let scene = parse_scene_string(json, Path::new(".")).unwrap();
        LoaderContext::new(scene, Target::Generic, Path::new("cache"))
    }

    #[test]
    fn default_selector_runs_all_variants_once() {
        let info = TechniqueInfo {
            variants: vec![VariantInfo::default(), VariantInfo::default()],
            ..Default::default()
        };
        for iteration in 0..4 {
            assert_eq!(info.variant_selection(iteration), vec![0, 1]);
        }
    }

    #[test]
    fn unknown_technique_falls_back_to_path() {
        let ctx = context(r#"{ "technique": { "type": "warp_drive" } }"#);
        let technique = create(&ctx);
        assert_eq!(technique.type_name(), "path");
    }

    #[test]
    fn path_declares_six_payload_words_and_lights() {
        let ctx = context(r#"{ "technique": { "type": "path", "max_depth": 4 } }"#);
        let technique = create(&ctx);
        let info = technique.info(&ctx);
        assert_eq!(info.variants.len(), 1);
        assert_eq!(info.variants[0].primary_payload_count, 6);
        assert!(info.variants[0].uses_lights);
        assert!(technique.has_denoiser_support());
    }

    #[test]
    fn path_body_resolves_depth_through_the_registry() {
        let mut ctx = context(
            r#"{ "technique": { "type": "path", "max_depth": 4, "clamp": 0 } }"#,
        );
        let technique = create(&ctx);
        let mut tree = ShadingTree::new(&mut ctx);
        let mut stream = String::new();

        tree.begin_closure("technique");
        let mut input = SerializationInput {
            stream: &mut stream,
            tree: &mut tree,
        };
        technique.generate_body(&mut input).unwrap();
        tree.end_closure().unwrap();

        assert!(stream.contains("get_global_parameter_i32(\"__tech_max_depth\", 0)"));
        assert!(stream.contains("make_path_renderer("));
        // clamp is zero with the Zero option: no registry lookup for it.
        assert!(!stream.contains("__tech_clamp"));
        assert_eq!(ctx.registry.int_parameters["__tech_max_depth"], 4);
    }

    #[test]
    fn ppm_declares_the_two_pass_layout() {
        let ctx = context(r#"{ "technique": { "type": "ppm", "photons": 1000 } }"#);
        let technique = create(&ctx);
        let info = technique.info(&ctx);

        assert_eq!(info.variants.len(), 2);
        let light_pass = &info.variants[0];
        assert_eq!(light_pass.override_width, Some(1000));
        assert_eq!(light_pass.override_height, Some(1));
        assert_eq!(light_pass.override_spi, Some(1));
        assert!(light_pass.lock_framebuffer);
        assert!(light_pass.callback_generators[CallbackType::BeforeIteration as usize].is_some());
        assert!(light_pass.override_camera_generator.is_some());

        let gather_pass = &info.variants[1];
        assert!(gather_pass.uses_lights);
        assert!(!gather_pass.lock_framebuffer);
        assert!(gather_pass.callback_generators[CallbackType::BeforeIteration as usize].is_some());

        // Both passes run each iteration.
        assert_eq!(info.variant_selection(0), vec![0, 1]);
        assert_eq!(info.variant_selection(5), vec![0, 1]);
    }

    #[test]
    fn adaptive_env_switches_passes_after_learning() {
        let ctx = context(r#"{ "technique": { "type": "adaptive_env" } }"#);
        let technique = create(&ctx);
        let info = technique.info(&ctx);

        assert_eq!(info.variants.len(), 2);
        assert_eq!(info.variant_selection(0), vec![0]);
        assert_eq!(info.variant_selection(1), vec![1]);
        assert_eq!(info.variant_selection(100), vec![1]);
        assert_eq!(info.variants[0].primary_payload_count, 11);
        assert_eq!(info.variants[1].primary_payload_count, 6);
    }
}
