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

//! The loader context threaded through all code generation.

use ember_core::math::{BoundingBox, Vec3, Vec4};
use ember_core::{Mat4, ObjectKind, Scene};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::cache::CacheManager;

/// The compilation target handed to the JIT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Target {
    /// Scalar fallback without vector extensions.
    #[default]
    Generic,
    /// x86 with SSE 4.2 lanes.
    Sse42,
    /// x86 with AVX lanes.
    Avx,
    /// x86 with AVX2 lanes.
    Avx2,
    /// x86 with AVX-512 lanes.
    Avx512,
    /// AArch64 with ASIMD lanes.
    Asimd,
    /// NVIDIA GPUs through NVVM.
    Nvvm,
    /// AMD GPUs.
    Amdgpu,
}

impl Target {
    /// `true` for GPU targets.
    pub fn is_gpu(&self) -> bool {
        matches!(self, Target::Nvvm | Target::Amdgpu)
    }

    /// Parses the CLI spelling of a target.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "generic" => Some(Target::Generic),
            "sse42" => Some(Target::Sse42),
            "avx" => Some(Target::Avx),
            "avx2" => Some(Target::Avx2),
            "avx512" => Some(Target::Avx512),
            "asimd" => Some(Target::Asimd),
            "nvvm" => Some(Target::Nvvm),
            "amdgpu" => Some(Target::Amdgpu),
            _ => None,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Target::Generic => "generic",
            Target::Sse42 => "sse42",
            Target::Avx => "avx",
            Target::Avx2 => "avx2",
            Target::Avx512 => "avx512",
            Target::Asimd => "asimd",
            Target::Nvvm => "nvvm",
            Target::Amdgpu => "amdgpu",
        };
        f.write_str(name)
    }
}

/// The runtime-wide parameter registry.
///
/// Shader generation seeds defaults here; the runtime driver overrides
/// entries between iterations through `set_parameter`. Generated code
/// reads entries through `registry::get_global_parameter_*` lookups.
#[derive(Debug, Default, Clone)]
pub struct GlobalRegistry {
    /// Integer parameters.
    pub int_parameters: HashMap<String, i32>,
    /// Floating-point parameters.
    pub float_parameters: HashMap<String, f32>,
    /// Three-component vector parameters.
    pub vec3_parameters: HashMap<String, Vec3>,
    /// Four-component vector parameters.
    pub vec4_parameters: HashMap<String, Vec4>,
}

/// One surface material: the BSDF bound to an entity, plus the area light
/// and media attached to it.
#[derive(Debug, Clone)]
pub struct Material {
    /// Name of the BSDF scene object.
    pub bsdf: String,
    /// Name of the entity this material instance belongs to.
    pub entity: String,
    /// Index into the light arena when the entity emits.
    pub light_id: Option<usize>,
    /// Medium on the inside of the surface.
    pub medium_inner: Option<String>,
    /// Medium on the outside of the surface.
    pub medium_outer: Option<String>,
}

impl Material {
    /// `true` when an area light references this material's entity.
    pub fn has_emission(&self) -> bool {
        self.light_id.is_some()
    }

    /// `true` when either side of the surface carries a medium.
    pub fn has_medium_interface(&self) -> bool {
        self.medium_inner.is_some() || self.medium_outer.is_some()
    }
}

/// Everything shader generation needs besides the scene objects
/// themselves: the target, per-scene derived data, the exported-resource
/// cache, and the parameter registry the emitted lookups read from.
pub struct LoaderContext {
    /// The parsed scene.
    pub scene: Scene,
    /// JIT compilation target.
    pub target: Target,
    /// GPU device index for GPU targets.
    pub device: u32,
    /// Samples per iteration baked into the ray-generation shader.
    pub samples_per_iteration: u32,
    /// `true` when driven by the ray-stream tracer front-end.
    pub is_tracer: bool,
    /// Bakes every parameter as a literal, ignoring `Dynamic` options.
    pub force_specialization: bool,
    /// Pixel sampler selection (`uniform`, `halton`, `mjitt`).
    pub pixel_sampler: String,
    /// The technique variant currently being generated.
    pub current_variant: usize,
    /// World bounds derived from the entities.
    pub scene_bbox: BoundingBox,
    /// Diagonal of the world bounds, at least epsilon.
    pub scene_diameter: f32,
    /// Exported-resource cache.
    pub cache: CacheManager,
    /// The global parameter registry.
    pub registry: GlobalRegistry,
    /// Surface materials in entity order.
    pub materials: Vec<Material>,

    external_resources: Vec<PathBuf>,
    resource_index: HashMap<PathBuf, usize>,
}

impl LoaderContext {
    /// Builds a context over a parsed scene.
    pub fn new(scene: Scene, target: Target, cache_dir: &Path) -> Self {
        let scene_bbox = compute_scene_bbox(&scene);
        let scene_diameter = scene_bbox.diameter().max(1e-5);
        let materials = collect_materials(&scene);

        Self {
            scene,
            target,
            device: 0,
            samples_per_iteration: 1,
            is_tracer: false,
            force_specialization: false,
            pixel_sampler: "uniform".to_string(),
            current_variant: 0,
            scene_bbox,
            scene_diameter,
            cache: CacheManager::new(cache_dir.to_path_buf()),
            registry: GlobalRegistry::default(),
            materials,
            external_resources: Vec::new(),
            resource_index: HashMap::new(),
        }
    }

    /// Registers a file the JIT-compiled kernels will map as a device
    /// buffer, deduplicated by path. Returns the resource id used in
    /// `device.load_buffer_by_id(..)` expressions.
    pub fn register_external_resource(&mut self, path: &Path) -> usize {
        if let Some(&id) = self.resource_index.get(path) {
            return id;
        }
        let id = self.external_resources.len();
        self.external_resources.push(path.to_path_buf());
        self.resource_index.insert(path.to_path_buf(), id);
        id
    }

    /// All registered resources in id order.
    pub fn external_resources(&self) -> &[PathBuf] {
        &self.external_resources
    }
}

fn compute_scene_bbox(scene: &Scene) -> BoundingBox {
    let mut bbox = BoundingBox::EMPTY;

    for entity in scene.entities.iter() {
        let transform = entity
            .property("transform")
            .map_or(Mat4::IDENTITY, |p| p.transform_or(Mat4::IDENTITY));
        let origin = transform.translation();

        let shape_name = entity.string_property("shape", "");
        let Some(shape) = scene.shapes.get(shape_name) else {
            bbox.extend(origin);
            continue;
        };

        match shape.plugin_type() {
            "sphere" => {
                let radius = shape.number_property("radius", 1.0);
                let center = transform.transform_point(shape.vec3_property("origin", Vec3::ZERO));
                bbox.extend(center - Vec3::splat(radius));
                bbox.extend(center + Vec3::splat(radius));
            }
            "rectangle" | "plane" => {
                let width = shape.number_property("width", 2.0);
                let height = shape.number_property("height", 2.0);
                let hx = width * 0.5;
                let hy = height * 0.5;
                for corner in [
                    Vec3::new(-hx, -hy, 0.0),
                    Vec3::new(hx, -hy, 0.0),
                    Vec3::new(-hx, hy, 0.0),
                    Vec3::new(hx, hy, 0.0),
                ] {
                    bbox.extend(transform.transform_point(corner));
                }
            }
            _ => bbox.extend(origin),
        }
    }

    if bbox.is_empty() {
        bbox.extend(Vec3::splat(-1.0));
        bbox.extend(Vec3::splat(1.0));
    }
    bbox
}

fn collect_materials(scene: &Scene) -> Vec<Material> {
    let mut area_lights: HashMap<&str, usize> = HashMap::new();
    for (id, light) in scene.lights.iter().enumerate() {
        if light.kind() == ObjectKind::Light && light.plugin_type() == "area" {
            area_lights.insert(light.string_property("entity", ""), id);
        }
    }

    scene
        .entities
        .iter()
        .map(|entity| Material {
            bsdf: entity.string_property("bsdf", "").to_string(),
            entity: entity.name().to_string(),
            light_id: area_lights.get(entity.name()).copied(),
            medium_inner: non_empty(entity.string_property("inner_medium", "")),
            medium_outer: non_empty(entity.string_property("outer_medium", "")),
        })
        .collect()
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::scene::parse_scene_string;

    const SCENE: &str = r#"{
        "technique": { "type": "path" },
        "bsdfs": [ { "name": "white", "type": "diffuse" } ],
        "shapes": [
            { "name": "ball", "type": "sphere", "radius": 4 },
            { "name": "panel", "type": "rectangle", "width": 2, "height": 2 }
        ],
        "entities": [
            { "name": "e0", "shape": "ball", "bsdf": "white" },
            { "name": "glow", "shape": "panel", "bsdf": "white",
              "transform": { "position": [0, 0, 6] } }
        ],
        "lights": [
            { "name": "lamp", "type": "area", "entity": "glow", "radiance": [5, 5, 5] }
        ]
    }"#;

    fn context() -> LoaderContext {
        let scene = parse_scene_string(SCENE, Path::new(".")).unwrap();
        LoaderContext::new(scene, Target::Generic, Path::new("cache"))
    }

    #[test]
    fn scene_bounds_cover_all_entities() {
        let ctx = context();
        assert!(ctx.scene_bbox.min.z <= -4.0);
        assert!(ctx.scene_bbox.max.z >= 6.0);
        assert!(ctx.scene_diameter > 8.0);
    }

    #[test]
    fn area_lights_bind_to_their_entities() {
        let ctx = context();
        assert_eq!(ctx.materials.len(), 2);
        assert!(!ctx.materials[0].has_emission());
        assert_eq!(ctx.materials[1].light_id, Some(0));
    }

    #[test]
    fn external_resources_deduplicate() {
        let mut ctx = context();
        let a = ctx.register_external_resource(Path::new("cache/klems.bin"));
        let b = ctx.register_external_resource(Path::new("cache/hierarchy.bin"));
        let c = ctx.register_external_resource(Path::new("cache/klems.bin"));
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(ctx.external_resources().len(), 2);
    }
}
