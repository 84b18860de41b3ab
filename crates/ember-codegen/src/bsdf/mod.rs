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

//! BSDF plugins.
//!
//! Every plugin contributes one `let bsdf_{id} : BSDFShader = ...;`
//! binding to the emitted program, resolved through the shading tree.
//! Missing references never abort generation; they substitute the error
//! BSDF and log loudly.

mod blend;
mod conductor;
mod dielectric;
mod diffuse;
mod djmeasured;
mod doublesided;
mod klems;
mod map;
mod mask;
mod passthrough;
mod phong;
mod plastic;
mod principled;
mod transform;
mod transparent;

use ember_core::math::Vec3;
use ember_core::SceneObject;
use std::sync::OnceLock;

use crate::registry::PluginRegistry;
use crate::tree::{NumberOptions, SerializationInput, ShadingTree};
use crate::GenerateError;

/// A BSDF plugin's sole behavioral contract: emit shader code.
pub trait Bsdf {
    /// The scene name of this BSDF instance.
    fn name(&self) -> &str;

    /// Writes the `bsdf_{id}` binding (and all dependencies) to the
    /// stream.
    fn serialize(&self, input: &mut SerializationInput) -> Result<(), GenerateError>;
}

type BsdfFactory = fn(&str, SceneObject) -> Box<dyn Bsdf>;

fn registry() -> &'static PluginRegistry<BsdfFactory> {
    static REGISTRY: OnceLock<PluginRegistry<BsdfFactory>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut registry = PluginRegistry::new();
        registry.register(
            &["diffuse", "roughdiffuse" /* Deprecated */],
            diffuse::factory as BsdfFactory,
        );
        registry.register(
            &[
                "glass", // Deprecated
                "dielectric",
                "roughdielectric", // Deprecated
                "thindielectric",  // Deprecated
            ],
            dielectric::factory as BsdfFactory,
        );
        registry.register(
            &["conductor", "roughconductor" /* Deprecated */],
            conductor::factory as BsdfFactory,
        );
        registry.register(
            &["plastic", "roughplastic" /* Deprecated */],
            plastic::factory as BsdfFactory,
        );
        registry.register(&["phong"], phong::factory as BsdfFactory);
        registry.register(&["principled"], principled::factory as BsdfFactory);
        registry.register(&["blend", "mix"], blend::mix_factory as BsdfFactory);
        registry.register(&["add"], blend::add_factory as BsdfFactory);
        registry.register(&["mask"], mask::mask_factory as BsdfFactory);
        registry.register(&["cutoff"], mask::cutoff_factory as BsdfFactory);
        registry.register(&["normalmap"], map::normalmap_factory as BsdfFactory);
        registry.register(&["bumpmap"], map::bumpmap_factory as BsdfFactory);
        registry.register(&["transform"], transform::factory as BsdfFactory);
        registry.register(&["doublesided"], doublesided::factory as BsdfFactory);
        registry.register(&["passthrough", "null"], passthrough::factory as BsdfFactory);
        registry.register(&["transparent"], transparent::factory as BsdfFactory);
        registry.register(&["klems"], klems::factory as BsdfFactory);
        registry.register(&["tensortree"], klems::tensortree_factory as BsdfFactory);
        registry.register(&["djmeasured"], djmeasured::factory as BsdfFactory);
        registry
    })
}

/// All registered BSDF type strings.
pub fn available_types() -> Vec<&'static str> {
    registry().known_types()
}

/// The error-BSDF binding for a closure id. Emitted whenever a required
/// inner BSDF is missing; compilation continues and the material renders
/// in an unmistakable error color.
pub fn inline_error(id: usize) -> String {
    format!("  let bsdf_{id} : BSDFShader = @|ctx| make_error_bsdf(ctx.surf);")
}

/// Generates the BSDF `name` and all of its dependencies into `stream`.
/// Unknown names and unknown plugin types degrade to the error BSDF.
pub fn generate(
    name: &str,
    tree: &mut ShadingTree,
    stream: &mut String,
) -> Result<(), GenerateError> {
    if tree.mark_bsdf_generated(name) {
        return Ok(()); // Shared dependency, already in the stream.
    }

    let Some(object) = tree.context().scene.bsdfs.get(name).cloned() else {
        log::error!("Unknown bsdf '{name}'");
        tree.begin_closure(name);
        let id = tree.current_closure_id();
        stream.push_str(&inline_error(id));
        stream.push('\n');
        tree.end_closure()?;
        return Ok(());
    };

    let plugin = match registry().lookup(object.plugin_type()) {
        Some(factory) => factory(name, object),
        None => {
            log::error!(
                "Bsdf '{name}' has unknown type '{}'",
                object.plugin_type()
            );
            tree.begin_closure(name);
            let id = tree.current_closure_id();
            stream.push_str(&inline_error(id));
            stream.push('\n');
            tree.end_closure()?;
            return Ok(());
        }
    };

    let mut input = SerializationInput { stream, tree };
    plugin.serialize(&mut input)
}

// Dielectric IORs by material name.
const DIELECTRICS: &[(&str, f32)] = &[
    ("vacuum", 1.0),
    ("bk7", 1.5046),
    ("glass", 1.5046),
    ("helium", 1.00004),
    ("hydrogen", 1.00013),
    ("air", 1.000277),
    ("water", 1.333),
    ("ethanol", 1.361),
    ("diamond", 2.419),
    ("polypropylene", 1.49),
];

/// Looks up a dielectric's index of refraction by material name.
pub fn dielectric_ior(material: &str) -> Option<f32> {
    let material = material.to_lowercase();
    DIELECTRICS
        .iter()
        .find(|(name, _)| *name == material)
        .map(|(_, ior)| *ior)
}

/// Complex index of refraction of a conductor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConductorSpec {
    /// Real part per RGB channel.
    pub eta: Vec3,
    /// Imaginary part per RGB channel.
    pub kappa: Vec3,
}

// Materials from https://chris.hindefjord.se/resources/rgb-ior-metals/
const CONDUCTORS: &[(&str, ConductorSpec)] = &[
    (
        "aluminum",
        ConductorSpec {
            eta: Vec3::new(1.34560, 0.96521, 0.61722),
            kappa: Vec3::new(7.47460, 6.39950, 5.30310),
        },
    ),
    (
        "brass",
        ConductorSpec {
            eta: Vec3::new(0.44400, 0.52700, 1.09400),
            kappa: Vec3::new(3.69500, 2.76500, 1.82900),
        },
    ),
    (
        "copper",
        ConductorSpec {
            eta: Vec3::new(0.27105, 0.67693, 1.31640),
            kappa: Vec3::new(3.60920, 2.62480, 2.29210),
        },
    ),
    (
        "gold",
        ConductorSpec {
            eta: Vec3::new(0.18299, 0.42108, 1.37340),
            kappa: Vec3::new(3.42420, 2.34590, 1.77040),
        },
    ),
    (
        "iron",
        ConductorSpec {
            eta: Vec3::new(2.91140, 2.94970, 2.58450),
            kappa: Vec3::new(3.08930, 2.93180, 2.76700),
        },
    ),
    (
        "lead",
        ConductorSpec {
            eta: Vec3::new(1.91000, 1.83000, 1.44000),
            kappa: Vec3::new(3.51000, 3.40000, 3.18000),
        },
    ),
    (
        "mercury",
        ConductorSpec {
            eta: Vec3::new(2.07330, 1.55230, 1.06060),
            kappa: Vec3::new(5.33830, 4.65100, 3.86280),
        },
    ),
    (
        "platinum",
        ConductorSpec {
            eta: Vec3::new(2.37570, 2.08470, 1.84530),
            kappa: Vec3::new(4.26550, 3.71530, 3.13650),
        },
    ),
    (
        "silver",
        ConductorSpec {
            eta: Vec3::new(0.15943, 0.14512, 0.13547),
            kappa: Vec3::new(3.92910, 3.19000, 2.38080),
        },
    ),
    (
        "titanium",
        ConductorSpec {
            eta: Vec3::new(2.74070, 2.54180, 2.26700),
            kappa: Vec3::new(3.81430, 3.43450, 3.03850),
        },
    ),
    (
        "none",
        ConductorSpec {
            eta: Vec3::new(0.0, 0.0, 0.0),
            kappa: Vec3::new(1.0, 1.0, 1.0),
        },
    ),
];

/// Looks up a conductor's complex IOR by material name.
pub fn conductor(material: &str) -> Option<ConductorSpec> {
    let material = material.to_lowercase();
    CONDUCTORS
        .iter()
        .find(|(name, _)| *name == material)
        .map(|(_, spec)| *spec)
}

/// Emits the microfacet-distribution closure `md_{id}` for a BSDF with
/// roughness controls. Returns `false` when the object carries no
/// roughness property at all; the emitted distribution is then a delta
/// and the caller may skip distribution lookups.
///
/// The deprecated `alpha` spelling takes precedence over `roughness`
/// when present. `roughness_u`/`roughness_v` select the explicit
/// anisotropic form.
pub fn setup_roughness(
    bsdf: &SceneObject,
    input: &mut SerializationInput,
) -> Result<bool, GenerateError> {
    let use_old_name = bsdf.has_property("alpha")
        || bsdf.has_property("alpha_u")
        || bsdf.has_property("alpha_v");
    let param = if use_old_name { "alpha" } else { "roughness" };
    let param_u = format!("{param}_u");
    let param_v = format!("{param}_v");

    // Check if simply delta.
    if !bsdf.has_property(param) && !bsdf.has_property(&param_u) && !bsdf.has_property(&param_v) {
        let md_id = input.tree.current_closure_id();
        input.stream.push_str(&format!(
            "  let md_{md_id} = @|ctx : ShadingContext| microfacet::make_delta_distribution(ctx.surf.local);\n"
        ));
        return Ok(false);
    }

    let is_explicit = bsdf.has_property(&param_u) || bsdf.has_property(&param_v);

    if is_explicit {
        input
            .tree
            .add_number(&param_u, bsdf, 0.1, NumberOptions::zero())?;
        input
            .tree
            .add_number(&param_v, bsdf, 0.1, NumberOptions::zero())?;
    } else {
        input
            .tree
            .add_number(param, bsdf, 0.1, NumberOptions::zero())?;
        input
            .tree
            .add_number("anisotropic", bsdf, 0.0, NumberOptions::zero())?;
    }

    let distribution = match bsdf.string_property("distribution", "vndf_ggx") {
        "ggx" => "microfacet::make_ggx_distribution(",
        "beckmann" => "microfacet::make_beckmann_distribution(",
        _ => "microfacet::make_vndf_ggx_distribution(ctx.surf.face_normal, ",
    };

    let md_id = input.tree.current_closure_id();
    let header = input.tree.pull_header();
    input.stream.push_str(&header);
    if is_explicit {
        input.stream.push_str(&format!(
            "  let md_{md_id} = @|ctx : ShadingContext| {distribution}ctx.surf.local, {}, {});\n",
            input.tree.inline(&param_u),
            input.tree.inline(&param_v),
        ));
    } else {
        input.stream.push_str(&format!(
            "  let md_{md_id} = @|ctx : ShadingContext| {{ let (ru, rv) = microfacet::compute_explicit({}, {}); {distribution}ctx.surf.local, ru, rv) }};\n",
            input.tree.inline(param),
            input.tree.inline("anisotropic"),
        ));
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{LoaderContext, Target};
    use ember_core::scene::parse_scene_string;
    use std::path::Path;

    fn context(json: &str) -> LoaderContext {
        let scene = parse_scene_string(json, Path::new(".")).unwrap();
        LoaderContext::new(scene, Target::Generic, Path::new("cache"))
    }

    #[test]
    fn unknown_bsdf_degrades_to_the_error_stub() {
        let mut ctx = context(r#"{ "bsdfs": [] }"#);
        let mut tree = ShadingTree::new(&mut ctx);
        let mut stream = String::new();

        generate("ghost", &mut tree, &mut stream).unwrap();
        assert!(stream.contains("make_error_bsdf"));
        assert!(!tree.has_open_closures());
    }

    #[test]
    fn diffuse_emits_one_closure_with_literals() {
        let mut ctx = context(
            r#"{ "bsdfs": [
                { "name": "gray", "type": "diffuse", "reflectance": [0.8, 0.8, 0.8] }
            ] }"#,
        );
        let mut tree = ShadingTree::new(&mut ctx);
        let mut stream = String::new();

        generate("gray", &mut tree, &mut stream).unwrap();
        assert!(stream.contains("make_diffuse_bsdf(ctx.surf, 0, make_color(0.8, 0.8, 0.8, 1))"));
        assert!(stream.contains("let bsdf_1 : BSDFShader"));
    }

    #[test]
    fn shared_dependencies_generate_once() {
        let mut ctx = context(
            r#"{ "bsdfs": [
                { "name": "inner", "type": "diffuse" },
                { "name": "b", "type": "blend", "first": "inner", "second": "inner" }
            ] }"#,
        );
        let mut tree = ShadingTree::new(&mut ctx);
        let mut stream = String::new();

        generate("b", &mut tree, &mut stream).unwrap();
        assert_eq!(stream.matches("make_diffuse_bsdf").count(), 1);
    }

    #[test]
    fn blend_with_missing_inner_substitutes_error() {
        let mut ctx = context(
            r#"{ "bsdfs": [ { "name": "b", "type": "blend" } ] }"#,
        );
        let mut tree = ShadingTree::new(&mut ctx);
        let mut stream = String::new();

        generate("b", &mut tree, &mut stream).unwrap();
        assert!(stream.contains("make_error_bsdf"));
    }

    #[test]
    fn roughness_helper_handles_all_three_forms() {
        // No roughness property: delta distribution, returns false.
        let mut ctx = context(
            r#"{ "bsdfs": [
                { "name": "a", "type": "conductor" },
                { "name": "b", "type": "conductor", "roughness": 0.4 },
                { "name": "c", "type": "conductor", "roughness_u": 0.2, "roughness_v": 0.3,
                  "distribution": "beckmann" }
            ] }"#,
        );

        for (name, needle) in [
            ("a", "make_delta_distribution"),
            ("b", "compute_explicit(0.4, 0)"),
            ("c", "make_beckmann_distribution(ctx.surf.local, 0.2, 0.3)"),
        ] {
            let mut tree = ShadingTree::new(&mut ctx);
            let mut stream = String::new();
            generate(name, &mut tree, &mut stream).unwrap();
            assert!(stream.contains(needle), "{name}: missing {needle} in {stream}");
        }
    }

    #[test]
    fn material_tables_resolve_case_insensitively() {
        assert_eq!(dielectric_ior("BK7"), Some(1.5046));
        assert_eq!(dielectric_ior("unknownium"), None);
        assert!(conductor("Gold").is_some());
        assert_eq!(conductor("none").unwrap().eta, Vec3::ZERO);
    }
}
