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

//! The plugin registry shared by all plugin graphs.
//!
//! Every graph (BSDF, light, texture, camera, medium, technique) maps a
//! plugin type string to a factory. A factory may be registered under
//! several aliases; deprecated spellings stay routable that way.

use std::collections::HashMap;

/// A type-string to factory map with alias support.
pub struct PluginRegistry<F> {
    entries: HashMap<&'static str, F>,
}

impl<F: Clone> PluginRegistry<F> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Registers `factory` under every alias.
    pub fn register(&mut self, aliases: &[&'static str], factory: F) {
        for alias in aliases {
            self.entries.insert(alias, factory.clone());
        }
    }

    /// Looks up the factory for a plugin type string.
    pub fn lookup(&self, plugin_type: &str) -> Option<&F> {
        self.entries.get(plugin_type)
    }

    /// All registered type strings, sorted.
    pub fn known_types(&self) -> Vec<&'static str> {
        let mut types: Vec<_> = self.entries.keys().copied().collect();
        types.sort_unstable();
        types
    }
}

impl<F: Clone> Default for PluginRegistry<F> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_route_to_the_same_factory() {
        let mut registry: PluginRegistry<u32> = PluginRegistry::new();
        registry.register(&["glass", "dielectric", "roughdielectric"], 7);
        registry.register(&["diffuse"], 1);

        assert_eq!(registry.lookup("glass"), Some(&7));
        assert_eq!(registry.lookup("roughdielectric"), Some(&7));
        assert_eq!(registry.lookup("diffuse"), Some(&1));
        assert_eq!(registry.lookup("unknown"), None);
        assert_eq!(
            registry.known_types(),
            vec!["dielectric", "diffuse", "glass", "roughdielectric"]
        );
    }
}
