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

//! Shader-group reduction.
//!
//! A group id is the content hash of a (script, entry-function) pair.
//! Identical shaders across variants and materials share one id, so the
//! JIT compiles each distinct program exactly once.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

/// Collapses identical (script, entry) pairs onto one group id.
#[derive(Debug, Default)]
pub struct ShaderReducer {
    groups: HashMap<u64, Vec<String>>,
}

impl ShaderReducer {
    /// Creates an empty reducer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a shader under its group and returns the group id.
    pub fn register_group(&mut self, label: &str, script: &str, entry: &str) -> u64 {
        let id = Self::group_id(script, entry);
        self.groups.entry(id).or_default().push(label.to_string());
        id
    }

    /// The group id of a (script, entry) pair.
    pub fn group_id(script: &str, entry: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        script.hash(&mut hasher);
        entry.hash(&mut hasher);
        hasher.finish()
    }

    /// Number of registered shaders, duplicates included.
    pub fn entry_count(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    /// Number of distinct shader groups.
    pub fn unique_count(&self) -> usize {
        self.groups.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_shaders_share_a_group() {
        let mut reducer = ShaderReducer::new();
        let a = reducer.register_group("hit:0", "fn main() {}", "ig_hit_shader");
        let b = reducer.register_group("hit:1", "fn main() {}", "ig_hit_shader");
        let c = reducer.register_group("miss", "fn main() {}", "ig_miss_shader");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(reducer.entry_count(), 3);
        assert_eq!(reducer.unique_count(), 2);
    }
}
