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

//! Light plugins and the light-selector generation.
//!
//! Every light contributes a `let light_{i} = ...;` binding plus an entry
//! in the light table the technique samples from. Finite lights
//! additionally embed a flat record used to build the sampling hierarchy.

pub mod hierarchy;

use ember_core::math::{Vec3, PI};
use ember_core::{SceneObject, Serializer, SerializerError, Transferable};
use std::sync::OnceLock;

use crate::context::LoaderContext;
use crate::registry::PluginRegistry;
use crate::tree::{ColorOptions, NumberOptions, SerializationInput, ShadingTree};
use crate::GenerateError;

/// A light plugin.
pub trait Light {
    /// The scene name of this light.
    fn name(&self) -> &str;

    /// Index into the light table.
    fn id(&self) -> usize;

    /// `true` for lights at infinity (environment, directional, sun).
    fn is_infinite(&self) -> bool {
        false
    }

    /// `true` for lights without area (point, directional).
    fn is_delta(&self) -> bool {
        false
    }

    /// Representative position of a finite light.
    fn position(&self, _ctx: &LoaderContext) -> Option<Vec3> {
        None
    }

    /// Main emission direction, when the light has one.
    fn direction(&self) -> Option<Vec3> {
        None
    }

    /// The entity an area light is bound to.
    fn entity(&self) -> Option<&str> {
        None
    }

    /// Total emitted flux, used to build importance-sampling structures.
    fn compute_flux(&self, ctx: &LoaderContext) -> f32;

    /// Writes the `light_{id}` binding.
    fn serialize(&self, input: &mut SerializationInput) -> Result<(), GenerateError>;
}

type LightFactory = fn(&str, usize, SceneObject) -> Box<dyn Light>;

fn registry() -> &'static PluginRegistry<LightFactory> {
    static REGISTRY: OnceLock<PluginRegistry<LightFactory>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut registry = PluginRegistry::new();
        registry.register(&["point"], PointLight::factory as LightFactory);
        registry.register(&["area"], AreaLight::factory as LightFactory);
        registry.register(
            &["directional", "direction" /* Deprecated */],
            DirectionalLight::factory as LightFactory,
        );
        registry.register(&["sun"], SunLight::factory as LightFactory);
        registry.register(
            &["env", "envmap", "constant"],
            EnvironmentLight::factory as LightFactory,
        );
        registry
    })
}

/// Instantiates every light in the scene, in declaration order. Unknown
/// types are skipped with an error log; the render loses the light but
/// continues.
pub fn build_lights(ctx: &LoaderContext) -> Vec<Box<dyn Light>> {
    let mut lights: Vec<Box<dyn Light>> = Vec::new();
    for object in ctx.scene.lights.iter() {
        let id = lights.len();
        match registry().lookup(object.plugin_type()) {
            Some(factory) => lights.push(factory(object.name(), id, object.clone())),
            None => {
                log::error!(
                    "Light '{}' has unknown type '{}'",
                    object.name(),
                    object.plugin_type()
                );
            }
        }
    }
    lights
}

/// Generates all light bindings plus the light table. With
/// `only_infinite`, finite lights are skipped; the miss shader uses that
/// form when the technique never samples them there.
pub fn generate(
    tree: &mut ShadingTree,
    stream: &mut String,
    only_infinite: bool,
) -> Result<(), GenerateError> {
    let lights = build_lights(tree.context());

    let mut table = Vec::new();
    for light in &lights {
        if only_infinite && !light.is_infinite() {
            continue;
        }
        let mut input = SerializationInput {
            stream: &mut *stream,
            tree: &mut *tree,
        };
        light.serialize(&mut input)?;
        table.push(light.id());
    }

    stream.push_str("  let lights = @|id:i32| -> Light {\n    match(id) {\n");
    for id in &table {
        stream.push_str(&format!("      {id} => light_{id},\n"));
    }
    stream.push_str("      _ => make_null_light()\n    }\n  };\n");
    stream.push_str(&format!("  let num_lights = {};\n", lights.len()));
    Ok(())
}

/// Generates the light selector the technique samples lights through.
pub fn generate_light_selector(
    selector: &str,
    tree: &mut ShadingTree,
    stream: &mut String,
) -> Result<(), GenerateError> {
    match selector {
        "hierarchy" => {
            let lights = build_lights(tree.context());
            match hierarchy::setup(&lights, tree)? {
                Some(path) => {
                    let res_id = tree.context_mut().register_external_resource(&path);
                    stream.push_str(&format!(
                        "  let light_selector = make_hierarchy_light_selector(lights, num_lights, device.load_buffer_by_id({res_id}));\n"
                    ));
                }
                None => {
                    // No finite lights to build over.
                    stream.push_str(
                        "  let light_selector = make_uniform_light_selector(lights, num_lights);\n",
                    );
                }
            }
        }
        "" | "uniform" => {
            stream.push_str(
                "  let light_selector = make_uniform_light_selector(lights, num_lights);\n",
            );
        }
        other => {
            log::warn!("Unknown light selector '{other}', falling back to uniform");
            stream.push_str(
                "  let light_selector = make_uniform_light_selector(lights, num_lights);\n",
            );
        }
    }
    Ok(())
}

/// One flat record of the embedded light table. The on-disk record is
/// padded to 16 floats.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LightEntry {
    /// Representative position.
    pub position: Vec3,
    /// Total flux for importance sampling.
    pub flux: f32,
    /// Averaged main direction.
    pub direction: Vec3,
    /// Light id, or `-(left_child + 1)` for hierarchy inner nodes.
    pub id: i32,
}

impl Transferable for LightEntry {
    fn write_to<S: Serializer + ?Sized>(&self, serializer: &mut S) -> Result<(), SerializerError> {
        serializer.write_f32(self.position.x)?;
        serializer.write_f32(self.position.y)?;
        serializer.write_f32(self.position.z)?;
        serializer.write_f32(self.flux)?;
        serializer.write_f32(self.direction.x)?;
        serializer.write_f32(self.direction.y)?;
        serializer.write_f32(self.direction.z)?;
        serializer.write_i32(self.id)?;
        // 16 floats per record.
        for _ in 0..8 {
            serializer.write_f32(0.0)?;
        }
        Ok(())
    }

    fn read_from<S: Serializer + ?Sized>(
        &mut self,
        serializer: &mut S,
    ) -> Result<(), SerializerError> {
        self.position.x = serializer.read_f32()?;
        self.position.y = serializer.read_f32()?;
        self.position.z = serializer.read_f32()?;
        self.flux = serializer.read_f32()?;
        self.direction.x = serializer.read_f32()?;
        self.direction.y = serializer.read_f32()?;
        self.direction.z = serializer.read_f32()?;
        self.id = serializer.read_i32()?;
        for _ in 0..8 {
            serializer.read_f32()?;
        }
        Ok(())
    }
}

// --- Plugins ---

struct PointLight {
    name: String,
    id: usize,
    object: SceneObject,
}

impl PointLight {
    fn factory(name: &str, id: usize, object: SceneObject) -> Box<dyn Light> {
        Box::new(Self {
            name: name.to_string(),
            id,
            object,
        })
    }
}

impl Light for PointLight {
    fn name(&self) -> &str {
        &self.name
    }

    fn id(&self) -> usize {
        self.id
    }

    fn is_delta(&self) -> bool {
        true
    }

    fn position(&self, _ctx: &LoaderContext) -> Option<Vec3> {
        Some(self.object.vec3_property("position", Vec3::ZERO))
    }

    fn compute_flux(&self, _ctx: &LoaderContext) -> f32 {
        let intensity = self.object.vec3_property("intensity", Vec3::ONE);
        4.0 * PI * intensity.average()
    }

    fn serialize(&self, input: &mut SerializationInput) -> Result<(), GenerateError> {
        input.tree.begin_closure(&self.name);
        input
            .tree
            .add_vector("position", &self.object, Vec3::ZERO, Default::default())?;
        input
            .tree
            .add_color("intensity", &self.object, Vec3::ONE, ColorOptions::new())?;

        let header = input.tree.pull_header();
        input.stream.push_str(&header);
        input.stream.push_str(&format!(
            "  let light_{} = make_point_light({}, {});\n",
            self.id,
            input.tree.inline("position"),
            input.tree.inline("intensity"),
        ));
        input.tree.end_closure()
    }
}

struct AreaLight {
    name: String,
    id: usize,
    object: SceneObject,
}

impl AreaLight {
    fn factory(name: &str, id: usize, object: SceneObject) -> Box<dyn Light> {
        Box::new(Self {
            name: name.to_string(),
            id,
            object,
        })
    }

    fn surface_area(&self, ctx: &LoaderContext) -> f32 {
        let Some(entity) = ctx.scene.entities.get(self.object.string_property("entity", ""))
        else {
            return 1.0;
        };
        let Some(shape) = ctx.scene.shapes.get(entity.string_property("shape", "")) else {
            return 1.0;
        };
        match shape.plugin_type() {
            "sphere" => {
                let r = shape.number_property("radius", 1.0);
                4.0 * PI * r * r
            }
            "rectangle" | "plane" => {
                shape.number_property("width", 2.0) * shape.number_property("height", 2.0)
            }
            _ => 1.0,
        }
    }
}

impl Light for AreaLight {
    fn name(&self) -> &str {
        &self.name
    }

    fn id(&self) -> usize {
        self.id
    }

    fn entity(&self) -> Option<&str> {
        Some(self.object.string_property("entity", ""))
    }

    fn position(&self, ctx: &LoaderContext) -> Option<Vec3> {
        let entity = ctx.scene.entities.get(self.object.string_property("entity", ""))?;
        let transform = entity
            .property("transform")
            .map_or(ember_core::Mat4::IDENTITY, |p| {
                p.transform_or(ember_core::Mat4::IDENTITY)
            });
        Some(transform.translation())
    }

    fn compute_flux(&self, ctx: &LoaderContext) -> f32 {
        let radiance = self.object.vec3_property("radiance", Vec3::ONE);
        radiance.average() * PI * self.surface_area(ctx)
    }

    fn serialize(&self, input: &mut SerializationInput) -> Result<(), GenerateError> {
        let entity_name = self.object.string_property("entity", "").to_string();
        let entity_id = input
            .tree
            .context()
            .scene
            .entities
            .id_of(&entity_name)
            .unwrap_or_else(|| {
                log::error!(
                    "Area light '{}' references unknown entity '{entity_name}'",
                    self.name
                );
                0
            });

        input.tree.begin_closure(&self.name);
        input
            .tree
            .add_color("radiance", &self.object, Vec3::ONE, ColorOptions::new())?;

        let header = input.tree.pull_header();
        input.stream.push_str(&header);
        input.stream.push_str(&format!(
            "  let light_{} = make_area_light({}, entities, shapes, {entity_id}, {});\n",
            self.id,
            self.id,
            input.tree.inline("radiance"),
        ));
        input.tree.end_closure()
    }
}

struct DirectionalLight {
    name: String,
    id: usize,
    object: SceneObject,
}

impl DirectionalLight {
    fn factory(name: &str, id: usize, object: SceneObject) -> Box<dyn Light> {
        Box::new(Self {
            name: name.to_string(),
            id,
            object,
        })
    }
}

impl Light for DirectionalLight {
    fn name(&self) -> &str {
        &self.name
    }

    fn id(&self) -> usize {
        self.id
    }

    fn is_infinite(&self) -> bool {
        true
    }

    fn is_delta(&self) -> bool {
        true
    }

    fn direction(&self) -> Option<Vec3> {
        Some(
            self.object
                .vec3_property("direction", -Vec3::Z)
                .normalize(),
        )
    }

    fn compute_flux(&self, ctx: &LoaderContext) -> f32 {
        let irradiance = self.object.vec3_property("irradiance", Vec3::ONE);
        let radius = ctx.scene_diameter * 0.5;
        irradiance.average() * PI * radius * radius
    }

    fn serialize(&self, input: &mut SerializationInput) -> Result<(), GenerateError> {
        let direction = self.direction().expect("directional light has a direction");

        input.tree.begin_closure(&self.name);
        input
            .tree
            .add_color("irradiance", &self.object, Vec3::ONE, ColorOptions::new())?;

        let header = input.tree.pull_header();
        input.stream.push_str(&header);
        input.stream.push_str(&format!(
            "  let light_{} = make_directional_light(make_vec3({:?}, {:?}, {:?}), scene_bbox, {});\n",
            self.id,
            direction.x,
            direction.y,
            direction.z,
            input.tree.inline("irradiance"),
        ));
        input.tree.end_closure()
    }
}

struct SunLight {
    name: String,
    id: usize,
    object: SceneObject,
}

impl SunLight {
    fn factory(name: &str, id: usize, object: SceneObject) -> Box<dyn Light> {
        Box::new(Self {
            name: name.to_string(),
            id,
            object,
        })
    }
}

impl Light for SunLight {
    fn name(&self) -> &str {
        &self.name
    }

    fn id(&self) -> usize {
        self.id
    }

    fn is_infinite(&self) -> bool {
        true
    }

    fn is_delta(&self) -> bool {
        true
    }

    fn direction(&self) -> Option<Vec3> {
        Some(
            self.object
                .vec3_property("direction", Vec3::Z)
                .normalize(),
        )
    }

    fn compute_flux(&self, _ctx: &LoaderContext) -> f32 {
        self.object.number_property("sun_scale", 1.0) * PI
    }

    fn serialize(&self, input: &mut SerializationInput) -> Result<(), GenerateError> {
        let direction = self.direction().expect("sun light has a direction");

        input.tree.begin_closure(&self.name);
        let tree = &mut *input.tree;
        tree.add_number("sun_scale", &self.object, 1.0, NumberOptions::new())?;
        tree.add_number("sun_radius_scale", &self.object, 1.0, NumberOptions::new())?;

        let header = tree.pull_header();
        input.stream.push_str(&header);
        input.stream.push_str(&format!(
            "  let light_{} = make_sun_light(make_vec3({:?}, {:?}, {:?}), scene_bbox, {}, {});\n",
            self.id,
            direction.x,
            direction.y,
            direction.z,
            tree.inline("sun_radius_scale"),
            tree.inline("sun_scale"),
        ));
        input.tree.end_closure()
    }
}

struct EnvironmentLight {
    name: String,
    id: usize,
    object: SceneObject,
}

impl EnvironmentLight {
    fn factory(name: &str, id: usize, object: SceneObject) -> Box<dyn Light> {
        Box::new(Self {
            name: name.to_string(),
            id,
            object,
        })
    }
}

impl Light for EnvironmentLight {
    fn name(&self) -> &str {
        &self.name
    }

    fn id(&self) -> usize {
        self.id
    }

    fn is_infinite(&self) -> bool {
        true
    }

    fn compute_flux(&self, ctx: &LoaderContext) -> f32 {
        let radiance = self.object.vec3_property("radiance", Vec3::ONE);
        let scale = self.object.number_property("scale", 1.0);
        let radius = ctx.scene_diameter * 0.5;
        radiance.average() * scale * 4.0 * PI * PI * radius * radius
    }

    fn serialize(&self, input: &mut SerializationInput) -> Result<(), GenerateError> {
        input.tree.begin_closure(&self.name);
        input
            .tree
            .add_color("radiance", &self.object, Vec3::ONE, ColorOptions::new())?;
        input
            .tree
            .add_number("scale", &self.object, 1.0, NumberOptions::new())?;

        let header = input.tree.pull_header();
        input.stream.push_str(&header);
        input.stream.push_str(&format!(
            "  let light_{} = make_environment_light(scene_bbox, color_mulf({}, {}));\n",
            self.id,
            input.tree.inline("radiance"),
            input.tree.inline("scale"),
        ));
        input.tree.end_closure()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Target;
    use approx::assert_relative_eq;
    use ember_core::scene::parse_scene_string;
    use ember_core::VectorSerializer;
    use std::path::Path;

    const SCENE: &str = r#"{
        "shapes": [ { "name": "panel", "type": "rectangle", "width": 2, "height": 3 } ],
        "entities": [ { "name": "glow", "shape": "panel", "bsdf": "x",
                        "transform": { "position": [0, 0, 5] } } ],
        "lights": [
            { "name": "lamp", "type": "area", "entity": "glow", "radiance": [2, 2, 2] },
            { "name": "spot", "type": "point", "position": [1, 0, 0], "intensity": [1, 1, 1] },
            { "name": "sky", "type": "env", "radiance": [0.5, 0.5, 0.5] }
        ]
    }"#;

    fn context() -> LoaderContext {
        let scene = parse_scene_string(SCENE, Path::new(".")).unwrap();
        LoaderContext::new(scene, Target::Generic, Path::new("cache"))
    }

    #[test]
    fn lights_expose_their_metadata() {
        let ctx = context();
        let lights = build_lights(&ctx);
        assert_eq!(lights.len(), 3);

        assert!(!lights[0].is_infinite());
        assert_eq!(lights[0].position(&ctx), Some(Vec3::new(0.0, 0.0, 5.0)));
        assert_relative_eq!(lights[0].compute_flux(&ctx), 2.0 * PI * 6.0, epsilon = 1e-4);

        assert!(lights[1].is_delta());
        assert!(lights[2].is_infinite());
    }

    #[test]
    fn light_table_covers_all_lights() {
        let mut ctx = context();
        let mut tree = ShadingTree::new(&mut ctx);
        let mut stream = String::new();
        generate(&mut tree, &mut stream, false).unwrap();

        assert!(stream.contains("make_area_light(0, entities, shapes, 0,"));
        assert!(stream.contains("make_point_light("));
        assert!(stream.contains("make_environment_light("));
        assert!(stream.contains("let num_lights = 3;"));
        assert!(stream.contains("0 => light_0"));
        assert!(stream.contains("2 => light_2"));
    }

    #[test]
    fn only_infinite_skips_finite_lights() {
        let mut ctx = context();
        let mut tree = ShadingTree::new(&mut ctx);
        let mut stream = String::new();
        generate(&mut tree, &mut stream, true).unwrap();

        assert!(!stream.contains("make_area_light"));
        assert!(!stream.contains("make_point_light"));
        assert!(stream.contains("make_environment_light"));
        // The table size stays stable so light ids keep their meaning.
        assert!(stream.contains("let num_lights = 3;"));
    }

    #[test]
    fn light_entries_are_sixteen_floats() {
        let entry = LightEntry {
            position: Vec3::new(1.0, 2.0, 3.0),
            flux: 4.0,
            direction: Vec3::Z,
            id: 7,
        };
        let mut out = VectorSerializer::new();
        entry.write_to(&mut out).unwrap();
        assert_eq!(out.current_size(), 16 * 4);

        let mut input = VectorSerializer::from_vec(out.into_inner());
        let mut back = LightEntry::default();
        back.read_from(&mut input).unwrap();
        assert_eq!(back, entry);
    }
}
