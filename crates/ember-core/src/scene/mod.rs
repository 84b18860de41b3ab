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

//! The scene data model.
//!
//! A scene is a set of named, typed bags of properties. The parser fixes
//! each property's type once; downstream readers ask for a value with a
//! default and either get a compatible type or the default. Object
//! references travel as names and are resolved by the plugin registries.

mod error;
mod object;
mod parser;
mod property;

pub use error::SceneError;
pub use object::{ObjectKind, SceneObject};
pub use parser::{parse_scene_file, parse_scene_string};
pub use property::Property;

use std::collections::HashMap;

/// A flat arena of named scene objects of one kind.
///
/// Objects keep their declaration order (light tables and shader group IDs
/// depend on it); lookup by name goes through a side index.
#[derive(Debug, Default)]
pub struct ObjectArena {
    objects: Vec<SceneObject>,
    index: HashMap<String, usize>,
}

impl ObjectArena {
    /// Adds an object, replacing any previous object of the same name.
    pub fn insert(&mut self, object: SceneObject) {
        if let Some(&id) = self.index.get(object.name()) {
            self.objects[id] = object;
        } else {
            self.index.insert(object.name().to_string(), self.objects.len());
            self.objects.push(object);
        }
    }

    /// Looks an object up by name.
    pub fn get(&self, name: &str) -> Option<&SceneObject> {
        self.index.get(name).map(|&id| &self.objects[id])
    }

    /// The arena index of `name`, if present.
    pub fn id_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// All objects in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &SceneObject> {
        self.objects.iter()
    }

    /// Number of objects stored.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// `true` when no objects are stored.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

/// A fully parsed scene description.
///
/// The anonymous singletons (`camera`, `technique`, `film`) are optional;
/// the runtime fills in defaults where the description stays silent.
#[derive(Debug, Default)]
pub struct Scene {
    /// The anonymous camera object.
    pub camera: Option<SceneObject>,
    /// The anonymous technique object.
    pub technique: Option<SceneObject>,
    /// The anonymous film object (carries `size: [w, h]`).
    pub film: Option<SceneObject>,
    /// Named textures.
    pub textures: ObjectArena,
    /// Named BSDFs.
    pub bsdfs: ObjectArena,
    /// Named shapes.
    pub shapes: ObjectArena,
    /// Named entities (shape + bsdf + transform bindings).
    pub entities: ObjectArena,
    /// Named lights.
    pub lights: ObjectArena,
    /// Named participating media.
    pub media: ObjectArena,
}
