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

//! The exported-resource cache.
//!
//! Producers (the Klems loader, the light hierarchy builder) write a
//! binary once per logical identifier and park the resulting path, plus
//! any specification the shader code needs, under a content-addressed
//! key of the form `category:fingerprint`. Later requests for the same
//! key are read hits. The cache lives exactly as long as its runtime.

use ember_measured::{KlemsSpecification, TensorTreeSpecification};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::GenerateError;

/// Specification payload attached to a cache entry.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportedPayload {
    /// A plain exported file without extra metadata.
    None,
    /// A Klems export with its shape summary.
    Klems(KlemsSpecification),
    /// A tensor-tree export with its shape summary.
    TensorTree(TensorTreeSpecification),
}

/// One cache entry: where the blob lives and what it is.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedData {
    /// On-disk location of the exported binary.
    pub path: PathBuf,
    /// Producer-specific metadata.
    pub payload: ExportedPayload,
}

/// Owns the cache directory and the logical-id map.
#[derive(Debug, Default)]
pub struct CacheManager {
    directory: PathBuf,
    entries: HashMap<String, ExportedData>,
}

impl CacheManager {
    /// Creates a manager rooted at `directory`. Nothing is touched on
    /// disk until the first export needs the directory.
    pub fn new(directory: PathBuf) -> Self {
        Self {
            directory,
            entries: HashMap::new(),
        }
    }

    /// The cache directory, created on demand.
    pub fn directory(&self) -> Result<&Path, GenerateError> {
        std::fs::create_dir_all(&self.directory).map_err(GenerateError::CacheDirectory)?;
        Ok(&self.directory)
    }

    /// Looks up a previous export.
    pub fn find(&self, logical_id: &str) -> Option<&ExportedData> {
        self.entries.get(logical_id)
    }

    /// Stores an export under its logical id.
    pub fn insert(&mut self, logical_id: &str, data: ExportedData) {
        self.entries.insert(logical_id.to_string(), data);
    }

    /// Number of cached exports.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when nothing was exported yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Escapes a scene-object name so it is safe inside a file name or an
/// emitted identifier.
pub fn escape_identifier(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_request_is_a_read_hit() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = CacheManager::new(dir.path().join("cache"));

        assert!(cache.find("klems:blinds.xml").is_none());
        cache.insert(
            "klems:blinds.xml",
            ExportedData {
                path: PathBuf::from("cache/klems_blinds.bin"),
                payload: ExportedPayload::None,
            },
        );

        let hit = cache.find("klems:blinds.xml").unwrap();
        assert_eq!(hit.path, PathBuf::from("cache/klems_blinds.bin"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn directory_is_created_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested").join("cache");
        let cache = CacheManager::new(target.clone());
        assert!(!target.exists());
        cache.directory().unwrap();
        assert!(target.exists());
    }

    #[test]
    fn identifiers_are_escaped() {
        assert_eq!(escape_identifier("glass/pane 1"), "glass_pane_1");
    }
}
