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

//! The light hierarchy: a binary point BVH over all finite lights.
//!
//! Inner nodes aggregate their subtree (box center as position, averaged
//! direction, summed flux) and reference their left child through a
//! negated id, so the sampler can descend without a separate topology
//! table. The export is deduplicated through the data cache.

use ember_core::container::{PointBvh, Positioned};
use ember_core::math::Vec3;
use ember_core::{FileSerializer, Serializer};
use std::path::PathBuf;

use super::{Light, LightEntry};
use crate::cache::{ExportedData, ExportedPayload};
use crate::tree::ShadingTree;
use crate::GenerateError;

impl Positioned for LightEntry {
    fn position(&self) -> Vec3 {
        self.position
    }
}

const EXPORT_ID: &str = "light:hierarchy";

/// Builds and exports the hierarchy over all finite lights. Returns the
/// export path, or `None` when there is nothing to build over.
pub fn setup(
    lights: &[Box<dyn Light>],
    tree: &mut ShadingTree,
) -> Result<Option<PathBuf>, GenerateError> {
    let finite: Vec<&Box<dyn Light>> = lights.iter().filter(|l| !l.is_infinite()).collect();
    if finite.is_empty() {
        return Ok(None);
    }

    if let Some(data) = tree.context().cache.find(EXPORT_ID) {
        return Ok(Some(data.path.clone()));
    }

    let mut entries = Vec::with_capacity(finite.len());
    for light in finite {
        let position = light
            .position(tree.context())
            .expect("finite lights return a position");
        entries.push(LightEntry {
            position,
            flux: light.compute_flux(tree.context()),
            direction: light.direction().unwrap_or(Vec3::Z),
            id: light.id() as i32,
        });
    }

    let bvh = PointBvh::build(entries);

    // Flux and averaged direction for inner nodes.
    let mut nodes = vec![LightEntry::default(); bvh.inner_nodes().len()];
    populate_inner_nodes(0, &bvh, &mut nodes);

    let ctx = tree.context_mut();
    let path = ctx.cache.directory()?.join("light_hierarchy.bin");
    let mut serializer = FileSerializer::open(&path, false)?;
    serializer.write_records(&nodes, false)?;

    ctx.cache.insert(
        EXPORT_ID,
        ExportedData {
            path: path.clone(),
            payload: ExportedPayload::None,
        },
    );
    Ok(Some(path))
}

fn populate_inner_nodes(
    id: usize,
    bvh: &PointBvh<LightEntry>,
    entries: &mut Vec<LightEntry>,
) -> LightEntry {
    let node = &bvh.inner_nodes()[id];
    if node.is_leaf() {
        entries[id] = bvh.leaf_nodes()[node.index];
    } else {
        let left = populate_inner_nodes(node.left_index(), bvh, entries);
        let right = populate_inner_nodes(node.right_index(), bvh, entries);

        entries[id] = LightEntry {
            position: node.bbox.center(),
            direction: (left.direction + right.direction) * 0.5,
            flux: left.flux + right.flux,
            id: -(node.left_index() as i32 + 1),
        };
    }
    entries[id]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{LoaderContext, Target};
    use crate::light::build_lights;
    use ember_core::scene::parse_scene_string;
    use ember_core::{Serializer, Transferable, VectorSerializer};
    use std::path::Path;

    const SCENE: &str = r#"{
        "lights": [
            { "name": "a", "type": "point", "position": [-4, 0, 0], "intensity": [1, 1, 1] },
            { "name": "b", "type": "point", "position": [4, 0, 0], "intensity": [2, 2, 2] },
            { "name": "c", "type": "point", "position": [0, 3, 0], "intensity": [3, 3, 3] },
            { "name": "sky", "type": "env" }
        ]
    }"#;

    #[test]
    fn hierarchy_aggregates_and_exports() {
        let dir = tempfile::tempdir().unwrap();
        let scene = parse_scene_string(SCENE, Path::new(".")).unwrap();
        let mut ctx = LoaderContext::new(scene, Target::Generic, &dir.path().join("cache"));
        let total_flux: f32 = {
            let lights = build_lights(&ctx);
            lights
                .iter()
                .filter(|l| !l.is_infinite())
                .map(|l| l.compute_flux(&ctx))
                .sum()
        };

        let lights = build_lights(&ctx);
        let mut tree = ShadingTree::new(&mut ctx);
        let path = setup(&lights, &mut tree).unwrap().expect("finite lights");
        assert!(path.exists());

        // A second request hits the cache instead of re-exporting.
        let again = setup(&lights, &mut tree).unwrap().unwrap();
        assert_eq!(path, again);

        // Read the root record back: flux must sum over all finite lights.
        let bytes = std::fs::read(&path).unwrap();
        let mut input = VectorSerializer::from_vec(bytes);
        let count = input.read_u32().unwrap();
        assert_eq!(count, 2 * 3 - 1); // Binary tree over three leaves.

        let mut root = LightEntry::default();
        root.read_from(&mut input).unwrap();
        assert!(root.id < 0, "root must be an inner node");
        assert!((root.flux - total_flux).abs() < 1e-3);
    }

    #[test]
    fn no_finite_lights_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let scene = parse_scene_string(r#"{ "lights": [ { "name": "sky", "type": "env" } ] }"#, Path::new(".")).unwrap();
        let mut ctx = LoaderContext::new(scene, Target::Generic, &dir.path().join("cache"));
        let lights = build_lights(&ctx);
        let mut tree = ShadingTree::new(&mut ctx);
        assert!(setup(&lights, &mut tree).unwrap().is_none());
    }
}
