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

//! The shading tree: the code-generation environment every plugin
//! serializes through.
//!
//! A tree is a stack of closures. Each plugin opens a closure, declares
//! its inputs, pulls the accumulated header lines into its output, and
//! closes the closure again. Parameter resolution decides per input
//! whether the emitted expression is a baked literal or a lookup into the
//! runtime parameter registry; lookups are declared once in the closure's
//! pulled header and referenced by a mangled variable name.

use ember_core::math::Vec3;
use ember_core::{ObjectKind, Property, SceneObject};
use std::collections::{HashMap, HashSet};

use crate::cache::escape_identifier;
use crate::context::LoaderContext;
use crate::{texture, GenerateError};

/// Options for number parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumberOptions {
    /// Force a registry lookup even when a literal is available.
    pub dynamic: bool,
    /// A literal zero is a meaningful optimization: skip emission.
    pub zero: bool,
    /// Also store the parameter in the global registry for overrides.
    pub global: bool,
}

impl NumberOptions {
    /// Plain resolution: literal if possible, else registry lookup.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts with the `Dynamic` flag set.
    pub fn dynamic() -> Self {
        Self {
            dynamic: true,
            ..Self::default()
        }
    }

    /// Starts with the `Zero` flag set.
    pub fn zero() -> Self {
        Self {
            zero: true,
            ..Self::default()
        }
    }

    /// Adds the `MakeGlobal` flag.
    pub fn make_global(mut self) -> Self {
        self.global = true;
        self
    }
}

/// Options for integer parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntegerOptions {
    /// Force a registry lookup even when a literal is available.
    pub dynamic: bool,
    /// Also store the parameter in the global registry for overrides.
    pub global: bool,
}

impl IntegerOptions {
    /// Plain resolution.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts with the `Dynamic` flag set.
    pub fn dynamic() -> Self {
        Self {
            dynamic: true,
            global: false,
        }
    }

    /// Adds the `MakeGlobal` flag.
    pub fn make_global(mut self) -> Self {
        self.global = true;
        self
    }
}

/// Options for color parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct ColorOptions {
    /// Force a registry lookup even when a literal is available.
    pub dynamic: bool,
    /// Also store the parameter in the global registry for overrides.
    pub global: bool,
}

impl ColorOptions {
    /// Plain resolution.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts with the `Dynamic` flag set.
    pub fn dynamic() -> Self {
        Self {
            dynamic: true,
            global: false,
        }
    }
}

/// Options for vector parameters.
pub type VectorOptions = ColorOptions;

/// What a resolved parameter stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    /// A scalar number.
    Number,
    /// A signed integer.
    Integer,
    /// A linear RGB color.
    Color,
    /// A direction or position.
    Vector,
    /// A texture sample.
    Texture,
}

/// A resolved parameter: the expression to splice into emitted code plus
/// whether it reads the runtime registry.
#[derive(Debug, Clone)]
pub struct ResolvedParameter {
    /// The expression usable inside emitted code.
    pub inline: String,
    /// `true` when the expression reads the parameter registry, so
    /// specialization cannot bake it.
    pub is_dynamic: bool,
    /// The parameter's kind.
    pub kind: ParameterKind,
}

struct Closure {
    id: usize,
    name: String,
    parameters: HashMap<String, ResolvedParameter>,
    headers: Vec<String>,
    header_set: HashSet<String>,
}

impl Closure {
    fn new(id: usize, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            parameters: HashMap::new(),
            headers: Vec::new(),
            header_set: HashSet::new(),
        }
    }
}

/// Input handed to every plugin's `serialize`.
pub struct SerializationInput<'a, 'ctx> {
    /// The output stream the plugin writes shader code into.
    pub stream: &'a mut String,
    /// The shading tree.
    pub tree: &'a mut ShadingTree<'ctx>,
}

/// The context-threaded code-generation environment.
pub struct ShadingTree<'ctx> {
    context: &'ctx mut LoaderContext,
    stack: Vec<Closure>,
    closure_ids: HashMap<String, usize>,
    generated_bsdfs: HashSet<String>,
    generated_textures: HashMap<String, usize>,
    next_id: usize,
}

impl<'ctx> ShadingTree<'ctx> {
    /// Creates a tree with the scene-global root closure on the stack.
    pub fn new(context: &'ctx mut LoaderContext) -> Self {
        Self {
            context,
            stack: vec![Closure::new(0, "")],
            closure_ids: HashMap::new(),
            generated_bsdfs: HashSet::new(),
            generated_textures: HashMap::new(),
            next_id: 1,
        }
    }

    /// The loader context.
    pub fn context(&self) -> &LoaderContext {
        self.context
    }

    /// Mutable access to the loader context.
    pub fn context_mut(&mut self) -> &mut LoaderContext {
        self.context
    }

    /// Opens a closure for `name`. Must be balanced by
    /// [`ShadingTree::end_closure`].
    pub fn begin_closure(&mut self, name: &str) {
        let id = self.next_id;
        self.next_id += 1;
        self.closure_ids.insert(name.to_string(), id);
        self.stack.push(Closure::new(id, name));
    }

    /// Closes the innermost closure. Header lines that were never pulled
    /// move to the parent so they are not lost.
    pub fn end_closure(&mut self) -> Result<(), GenerateError> {
        if self.stack.len() <= 1 {
            return Err(GenerateError::UnbalancedClosure {
                name: self
                    .stack
                    .last()
                    .map(|c| c.name.clone())
                    .unwrap_or_default(),
            });
        }
        let closed = self.stack.pop().expect("stack checked above");
        let parent = self.top_mut();
        for line in closed.headers {
            if parent.header_set.insert(line.clone()) {
                parent.headers.push(line);
            }
        }
        Ok(())
    }

    /// `true` while any plugin closure is open.
    pub fn has_open_closures(&self) -> bool {
        self.stack.len() > 1
    }

    /// The unique id of the innermost closure. Emitted identifiers are
    /// mangled with it (`bsdf_{id}`, `md_{id}`).
    pub fn current_closure_id(&self) -> usize {
        self.top().id
    }

    /// The id a generated dependency received, by its scene name.
    pub fn closure_id(&self, name: &str) -> Option<usize> {
        self.closure_ids.get(name).copied()
    }

    /// Returns the accumulated header lines of the current closure and
    /// clears them.
    pub fn pull_header(&mut self) -> String {
        let closure = self.top_mut();
        closure.header_set.clear();
        let mut out = String::new();
        for line in closure.headers.drain(..) {
            out.push_str(&line);
            out.push('\n');
        }
        out
    }

    /// The resolved expression for a declared input.
    pub fn inline(&self, name: &str) -> String {
        match self.top().parameters.get(name) {
            Some(param) => param.inline.clone(),
            None => {
                log::error!("Trying to inline undeclared parameter '{name}'");
                "0".to_string()
            }
        }
    }

    /// The resolved parameter record for a declared input.
    pub fn parameter(&self, name: &str) -> Option<&ResolvedParameter> {
        self.top().parameters.get(name)
    }

    /// Adds a raw header line to the current closure; duplicates coalesce.
    pub fn add_header(&mut self, line: String) {
        let closure = self.top_mut();
        if closure.header_set.insert(line.clone()) {
            closure.headers.push(line);
        }
    }

    // --- Parameter declaration ---

    /// Declares a number input backed by the property `name` of `obj`.
    pub fn add_number(
        &mut self,
        name: &str,
        obj: &SceneObject,
        default: f32,
        options: NumberOptions,
    ) -> Result<(), GenerateError> {
        let param = match obj.property(name) {
            Some(Property::Str(tex)) => {
                let tex = tex.clone();
                let id = self.generate_texture(&tex)?;
                ResolvedParameter {
                    inline: format!("color_average(tex_{id}(ctx))"),
                    is_dynamic: true,
                    kind: ParameterKind::Texture,
                }
            }
            prop => {
                let value = prop.map_or(default, |p| p.number_or(default));
                self.resolve_number(name, obj, value, options)
            }
        };
        self.top_mut().parameters.insert(name.to_string(), param);
        Ok(())
    }

    /// Declares an integer input backed by the property `name` of `obj`.
    pub fn add_integer(
        &mut self,
        name: &str,
        obj: &SceneObject,
        default: i32,
        options: IntegerOptions,
    ) -> Result<(), GenerateError> {
        let value = obj.integer_property(name, default);
        let param = self.resolve_integer(name, obj.kind(), value, options);
        self.top_mut().parameters.insert(name.to_string(), param);
        Ok(())
    }

    /// Declares a color input backed by the property `name` of `obj`.
    pub fn add_color(
        &mut self,
        name: &str,
        obj: &SceneObject,
        default: Vec3,
        options: ColorOptions,
    ) -> Result<(), GenerateError> {
        let param = match obj.property(name) {
            Some(Property::Str(tex)) => {
                let tex = tex.clone();
                let id = self.generate_texture(&tex)?;
                ResolvedParameter {
                    inline: format!("tex_{id}(ctx)"),
                    is_dynamic: true,
                    kind: ParameterKind::Texture,
                }
            }
            prop => {
                let value = prop.map_or(default, |p| p.vec3_or(default));
                self.resolve_color(name, obj.kind(), value, options)
            }
        };
        self.top_mut().parameters.insert(name.to_string(), param);
        Ok(())
    }

    /// Declares a vector input backed by the property `name` of `obj`.
    pub fn add_vector(
        &mut self,
        name: &str,
        obj: &SceneObject,
        default: Vec3,
        options: VectorOptions,
    ) -> Result<(), GenerateError> {
        let value = obj.vec3_property(name, default);
        let dynamic = options.dynamic && !self.context.force_specialization;
        let param = if dynamic {
            let key = self.registry_key(obj.kind(), name);
            self.context
                .registry
                .vec3_parameters
                .insert(key.clone(), value);
            let var = self.declare_lookup(name, &key, "registry::get_global_parameter_vec3");
            ResolvedParameter {
                inline: var,
                is_dynamic: true,
                kind: ParameterKind::Vector,
            }
        } else {
            ResolvedParameter {
                inline: inline_vector(value),
                is_dynamic: false,
                kind: ParameterKind::Vector,
            }
        };
        self.top_mut().parameters.insert(name.to_string(), param);
        Ok(())
    }

    /// Declares a texture input. The property must name a texture object;
    /// a missing property resolves to a black texture with a warning.
    pub fn add_texture(&mut self, name: &str, obj: &SceneObject) -> Result<(), GenerateError> {
        let param = match obj.property(name) {
            Some(Property::Str(tex)) => {
                let tex = tex.clone();
                let id = self.generate_texture(&tex)?;
                ResolvedParameter {
                    inline: format!("tex_{id}"),
                    is_dynamic: true,
                    kind: ParameterKind::Texture,
                }
            }
            _ => {
                log::warn!(
                    "Object '{}' has no texture property '{name}', using black",
                    obj.name()
                );
                ResolvedParameter {
                    inline: "make_black_texture()".to_string(),
                    is_dynamic: false,
                    kind: ParameterKind::Texture,
                }
            }
        };
        self.top_mut().parameters.insert(name.to_string(), param);
        Ok(())
    }

    /// Declares an integer input with no scene-object property behind it.
    /// Techniques use this when they supply a value directly.
    pub fn add_computed_integer(&mut self, name: &str, value: i32, options: IntegerOptions) {
        let param = self.resolve_integer(name, ObjectKind::Technique, value, options);
        self.top_mut().parameters.insert(name.to_string(), param);
    }

    /// Declares a number input with no scene-object property behind it.
    pub fn add_computed_number(&mut self, name: &str, value: f32, options: NumberOptions) {
        let param = self.resolve_number_for_kind(name, ObjectKind::Technique, value, options);
        self.top_mut().parameters.insert(name.to_string(), param);
    }

    // --- Internals ---

    fn top(&self) -> &Closure {
        self.stack.last().expect("stack always holds the root")
    }

    fn top_mut(&mut self) -> &mut Closure {
        self.stack.last_mut().expect("stack always holds the root")
    }

    fn registry_key(&self, kind: ObjectKind, name: &str) -> String {
        match kind {
            ObjectKind::Technique => format!("__tech_{name}"),
            _ => format!(
                "__param_{}_{name}",
                escape_identifier(&self.top().name)
            ),
        }
    }

    fn declare_lookup(&mut self, name: &str, key: &str, getter: &str) -> String {
        let var = format!("var_{}_{}", self.current_closure_id(), escape_identifier(name));
        let default = match getter {
            "registry::get_global_parameter_vec3" => "make_vec3(0, 0, 0)",
            _ => "0",
        };
        self.add_header(format!("  let {var} = {getter}(\"{key}\", {default});"));
        var
    }

    fn resolve_number(
        &mut self,
        name: &str,
        obj: &SceneObject,
        value: f32,
        options: NumberOptions,
    ) -> ResolvedParameter {
        self.resolve_number_for_kind(name, obj.kind(), value, options)
    }

    fn resolve_number_for_kind(
        &mut self,
        name: &str,
        kind: ObjectKind,
        value: f32,
        options: NumberOptions,
    ) -> ResolvedParameter {
        let dynamic = options.dynamic && !self.context.force_specialization;

        // Dead-code shortcut: a literal zero with the Zero option never
        // reaches the registry or the headers.
        if options.zero && !dynamic && value == 0.0 {
            return ResolvedParameter {
                inline: "0".to_string(),
                is_dynamic: false,
                kind: ParameterKind::Number,
            };
        }

        if dynamic || options.global {
            let key = self.registry_key(kind, name);
            self.context
                .registry
                .float_parameters
                .insert(key.clone(), value);
            if dynamic {
                let var = self.declare_lookup(name, &key, "registry::get_global_parameter_f32");
                return ResolvedParameter {
                    inline: var,
                    is_dynamic: true,
                    kind: ParameterKind::Number,
                };
            }
        }

        ResolvedParameter {
            inline: inline_number(value),
            is_dynamic: false,
            kind: ParameterKind::Number,
        }
    }

    fn resolve_integer(
        &mut self,
        name: &str,
        kind: ObjectKind,
        value: i32,
        options: IntegerOptions,
    ) -> ResolvedParameter {
        let dynamic = options.dynamic && !self.context.force_specialization;

        if dynamic || options.global {
            let key = self.registry_key(kind, name);
            self.context
                .registry
                .int_parameters
                .insert(key.clone(), value);
            if dynamic {
                let var = self.declare_lookup(name, &key, "registry::get_global_parameter_i32");
                return ResolvedParameter {
                    inline: var,
                    is_dynamic: true,
                    kind: ParameterKind::Integer,
                };
            }
        }

        ResolvedParameter {
            inline: format!("{value}"),
            is_dynamic: false,
            kind: ParameterKind::Integer,
        }
    }

    fn resolve_color(
        &mut self,
        name: &str,
        kind: ObjectKind,
        value: Vec3,
        options: ColorOptions,
    ) -> ResolvedParameter {
        let dynamic = options.dynamic && !self.context.force_specialization;

        if dynamic || options.global {
            let key = self.registry_key(kind, name);
            self.context
                .registry
                .vec3_parameters
                .insert(key.clone(), value);
            if dynamic {
                let var = self.declare_lookup(name, &key, "registry::get_global_parameter_vec3");
                return ResolvedParameter {
                    inline: format!("vec3_to_color({var})"),
                    is_dynamic: true,
                    kind: ParameterKind::Color,
                };
            }
        }

        ResolvedParameter {
            inline: inline_color(value),
            is_dynamic: false,
            kind: ParameterKind::Color,
        }
    }

    /// Generates the texture object `name` once per tree and returns its
    /// closure id. The generated lines land in the current closure's
    /// header so the texture symbol is in scope before its first use.
    pub fn generate_texture(&mut self, name: &str) -> Result<usize, GenerateError> {
        if let Some(&id) = self.generated_textures.get(name) {
            return Ok(id);
        }

        let mut buffer = String::new();
        let id = texture::generate(name, self, &mut buffer)?;
        self.generated_textures.insert(name.to_string(), id);
        for line in buffer.lines() {
            self.add_header(line.to_string());
        }
        Ok(id)
    }

    /// `true` when the BSDF `name` was already generated into this tree.
    pub fn mark_bsdf_generated(&mut self, name: &str) -> bool {
        !self.generated_bsdfs.insert(name.to_string())
    }
}

/// Formats a number literal for emitted code.
pub fn inline_number(value: f32) -> String {
    format!("{value:?}")
}

/// Formats a color literal for emitted code.
pub fn inline_color(value: Vec3) -> String {
    format!(
        "make_color({:?}, {:?}, {:?}, 1)",
        value.x, value.y, value.z
    )
}

/// Formats a vector literal for emitted code.
pub fn inline_vector(value: Vec3) -> String {
    format!("make_vec3({:?}, {:?}, {:?})", value.x, value.y, value.z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Target;
    use ember_core::scene::parse_scene_string;
    use std::path::Path;

    const SCENE: &str = r#"{
        "technique": { "type": "path", "clamp": 0, "max_depth": 8 },
        "bsdfs": [
            { "name": "mat", "type": "diffuse", "reflectance": [0.8, 0.8, 0.8], "roughness": 0 }
        ]
    }"#;

    fn context() -> LoaderContext {
        let scene = parse_scene_string(SCENE, Path::new(".")).unwrap();
        LoaderContext::new(scene, Target::Generic, Path::new("cache"))
    }

    #[test]
    fn closure_ids_are_unique_and_monotone() {
        let mut ctx = context();
        let mut tree = ShadingTree::new(&mut ctx);

        tree.begin_closure("a");
        let a = tree.current_closure_id();
        tree.begin_closure("b");
        let b = tree.current_closure_id();
        tree.end_closure().unwrap();
        tree.begin_closure("c");
        let c = tree.current_closure_id();
        tree.end_closure().unwrap();
        tree.end_closure().unwrap();

        assert!(a < b && b < c);
        assert_eq!(tree.closure_id("a"), Some(a));
        assert_eq!(tree.closure_id("b"), Some(b));
        assert!(!tree.has_open_closures());
    }

    #[test]
    fn unbalanced_end_is_an_error() {
        let mut ctx = context();
        let mut tree = ShadingTree::new(&mut ctx);
        assert!(matches!(
            tree.end_closure(),
            Err(GenerateError::UnbalancedClosure { .. })
        ));
    }

    #[test]
    fn literal_parameters_bake_inline() {
        let mut ctx = context();
        let obj = ctx.scene.bsdfs.get("mat").unwrap().clone();
        let mut tree = ShadingTree::new(&mut ctx);

        tree.begin_closure("mat");
        tree.add_color("reflectance", &obj, Vec3::ONE, ColorOptions::new())
            .unwrap();
        assert_eq!(tree.inline("reflectance"), "make_color(0.8, 0.8, 0.8, 1)");
        assert!(!tree.parameter("reflectance").unwrap().is_dynamic);
        assert_eq!(tree.pull_header(), "");
        tree.end_closure().unwrap();
    }

    #[test]
    fn zero_option_skips_emission_entirely() {
        let mut ctx = context();
        let obj = ctx.scene.technique.as_ref().unwrap().clone();
        let mut tree = ShadingTree::new(&mut ctx);

        tree.begin_closure("t");
        tree.add_number("clamp", &obj, 0.0, NumberOptions::zero().make_global())
            .unwrap();
        assert_eq!(tree.inline("clamp"), "0");
        assert_eq!(tree.pull_header(), "");
        tree.end_closure().unwrap();

        // Not even the global registry saw it.
        assert!(!ctx.registry.float_parameters.contains_key("__tech_clamp"));
    }

    #[test]
    fn dynamic_parameters_declare_a_lookup_header() {
        let mut ctx = context();
        let obj = ctx.scene.technique.as_ref().unwrap().clone();
        let mut tree = ShadingTree::new(&mut ctx);

        tree.begin_closure("t");
        tree.add_integer("max_depth", &obj, 64, IntegerOptions::dynamic().make_global())
            .unwrap();
        let id = tree.current_closure_id();

        let inline = tree.inline("max_depth");
        assert_eq!(inline, format!("var_{id}_max_depth"));
        assert!(tree.parameter("max_depth").unwrap().is_dynamic);

        let header = tree.pull_header();
        assert!(header.contains(
            "let var_1_max_depth = registry::get_global_parameter_i32(\"__tech_max_depth\", 0);"
        ));
        // Pulling again yields nothing.
        assert_eq!(tree.pull_header(), "");
        tree.end_closure().unwrap();

        assert_eq!(ctx.registry.int_parameters["__tech_max_depth"], 8);
    }

    #[test]
    fn duplicate_headers_coalesce() {
        let mut ctx = context();
        let mut tree = ShadingTree::new(&mut ctx);
        tree.begin_closure("x");
        tree.add_header("  let a = 1;".to_string());
        tree.add_header("  let a = 1;".to_string());
        assert_eq!(tree.pull_header(), "  let a = 1;\n");
        tree.end_closure().unwrap();
    }

    #[test]
    fn force_specialization_bakes_dynamic_parameters() {
        let mut ctx = context();
        ctx.force_specialization = true;
        let obj = ctx.scene.technique.as_ref().unwrap().clone();
        let mut tree = ShadingTree::new(&mut ctx);

        tree.begin_closure("t");
        tree.add_integer("max_depth", &obj, 64, IntegerOptions::dynamic())
            .unwrap();
        assert_eq!(tree.inline("max_depth"), "8");
        assert!(!tree.parameter("max_depth").unwrap().is_dynamic);
        tree.end_closure().unwrap();
    }
}
