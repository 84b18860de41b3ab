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

//! Scene objects: typed bags of named properties.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::math::Vec3;

use super::Property;

/// The kind of a scene object. Purely diagnostic; behavior comes from the
/// plugin type string and the registries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// Geometry description.
    Shape,
    /// A texture node.
    Texture,
    /// A surface scattering model.
    Bsdf,
    /// A light emitter.
    Light,
    /// A participating medium.
    Medium,
    /// A shape/bsdf binding placed in the world.
    Entity,
    /// The camera.
    Camera,
    /// The integrator / render technique.
    Technique,
    /// Output film settings.
    Film,
}

/// A typed bag of named properties, as parsed from the scene description.
#[derive(Debug, Clone)]
pub struct SceneObject {
    kind: ObjectKind,
    name: String,
    plugin_type: String,
    properties: HashMap<String, Property>,
    base_dir: PathBuf,
}

impl SceneObject {
    /// Creates an empty object.
    pub fn new(kind: ObjectKind, name: &str, plugin_type: &str, base_dir: &Path) -> Self {
        Self {
            kind,
            name: name.to_string(),
            plugin_type: plugin_type.to_string(),
            properties: HashMap::new(),
            base_dir: base_dir.to_path_buf(),
        }
    }

    /// The object's kind.
    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    /// The object's name. Anonymous singletons use a fixed name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The plugin type string, e.g. `"diffuse"` or `"path"`.
    pub fn plugin_type(&self) -> &str {
        &self.plugin_type
    }

    /// The directory the containing scene file lives in. Relative resource
    /// paths resolve against it.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Stores a property, replacing any previous value.
    pub fn set_property(&mut self, name: &str, value: Property) {
        self.properties.insert(name.to_string(), value);
    }

    /// Looks a property up by name.
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.get(name)
    }

    /// `true` if the property exists, whatever its type.
    pub fn has_property(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    /// Boolean property with default.
    pub fn bool_property(&self, name: &str, default: bool) -> bool {
        self.property(name).map_or(default, |p| p.bool_or(default))
    }

    /// Integer property with default.
    pub fn integer_property(&self, name: &str, default: i32) -> i32 {
        self.property(name)
            .map_or(default, |p| p.integer_or(default))
    }

    /// Number property with default (integers widen).
    pub fn number_property(&self, name: &str, default: f32) -> f32 {
        self.property(name)
            .map_or(default, |p| p.number_or(default))
    }

    /// String property with default.
    pub fn string_property<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.property(name)
            .map_or(default, |p| p.string_or(default))
    }

    /// Vector property with default.
    pub fn vec3_property(&self, name: &str, default: Vec3) -> Vec3 {
        self.property(name).map_or(default, |p| p.vec3_or(default))
    }

    /// Resolves a (possibly relative) resource path property against the
    /// scene directory.
    pub fn resolve_path(&self, value: &str) -> PathBuf {
        let path = Path::new(value);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaulted_accessors() {
        let mut obj = SceneObject::new(ObjectKind::Bsdf, "mat", "diffuse", Path::new("."));
        obj.set_property("roughness", Property::Number(0.3));
        assert_eq!(obj.number_property("roughness", 0.0), 0.3);
        assert_eq!(obj.number_property("missing", 0.1), 0.1);
        assert!(obj.has_property("roughness"));
        assert!(!obj.has_property("missing"));
    }

    #[test]
    fn relative_paths_resolve_against_scene_dir() {
        let obj = SceneObject::new(ObjectKind::Bsdf, "k", "klems", Path::new("/scenes/win"));
        assert_eq!(
            obj.resolve_path("data/blinds.xml"),
            PathBuf::from("/scenes/win/data/blinds.xml")
        );
        assert_eq!(obj.resolve_path("/abs.xml"), PathBuf::from("/abs.xml"));
    }
}
