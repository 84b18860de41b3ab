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

//! A basic binary BVH over points, without SAH.
//!
//! Built once from a fixed set of elements by median split along the
//! widest axis. Sibling nodes sit next to each other in the node array, so
//! an inner node only stores the index of its left child.

use crate::math::{BoundingBox, Vec3};

/// Provides the representative position of a stored element.
pub trait Positioned {
    /// The point this element occupies.
    fn position(&self) -> Vec3;
}

/// One node of a [`PointBvh`].
#[derive(Debug, Clone)]
pub struct PointBvhNode {
    /// Leaf: index into the leaf array. Inner: index of the left child
    /// node; the right child is at `index + 1`.
    pub index: usize,
    /// Bounds of everything below this node.
    pub bbox: BoundingBox,
    /// The split axis, or a negative value for leaves.
    pub axis: i32,
}

impl PointBvhNode {
    /// `true` if this node references a leaf element.
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.axis < 0
    }

    /// Index of the left child. Only valid for inner nodes.
    #[inline]
    pub fn left_index(&self) -> usize {
        self.index
    }

    /// Index of the right child. Only valid for inner nodes.
    #[inline]
    pub fn right_index(&self) -> usize {
        self.index + 1
    }
}

/// A binary point BVH with median-axis splits.
#[derive(Debug, Default)]
pub struct PointBvh<T> {
    inner_nodes: Vec<PointBvhNode>,
    leaf_nodes: Vec<T>,
}

impl<T: Positioned> PointBvh<T> {
    /// Builds the hierarchy over `elements`. The element order in
    /// [`PointBvh::leaf_nodes`] follows the recursive partitioning, not the
    /// input order.
    pub fn build(elements: Vec<T>) -> Self {
        let mut bvh = Self {
            inner_nodes: Vec::new(),
            leaf_nodes: Vec::new(),
        };
        if elements.is_empty() {
            return bvh;
        }

        let mut items = elements;
        bvh.inner_nodes.push(PointBvhNode {
            index: 0,
            bbox: BoundingBox::EMPTY,
            axis: -1,
        });
        bvh.build_node(0, &mut items);

        // The recursion drained `items` front to back.
        bvh
    }

    fn build_node(&mut self, node_id: usize, items: &mut Vec<T>) {
        let len = items.len();
        self.build_range(node_id, items, 0, len);
        // Partitioned order becomes the leaf order.
        self.leaf_nodes = std::mem::take(items);
    }

    fn build_range(&mut self, node_id: usize, items: &mut [T], lo: usize, hi: usize) {
        let mut bbox = BoundingBox::EMPTY;
        for item in &items[lo..hi] {
            bbox.extend(item.position());
        }

        if hi - lo == 1 {
            self.inner_nodes[node_id] = PointBvhNode {
                index: lo,
                bbox,
                axis: -1,
            };
            return;
        }

        let axis = bbox.longest_axis();
        items[lo..hi].sort_by(|a, b| {
            a.position()[axis]
                .partial_cmp(&b.position()[axis])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let mid = lo + (hi - lo) / 2;

        let left = self.inner_nodes.len();
        self.inner_nodes.push(PointBvhNode {
            index: 0,
            bbox: BoundingBox::EMPTY,
            axis: -1,
        });
        self.inner_nodes.push(PointBvhNode {
            index: 0,
            bbox: BoundingBox::EMPTY,
            axis: -1,
        });
        self.inner_nodes[node_id] = PointBvhNode {
            index: left,
            bbox,
            axis: axis as i32,
        };

        self.build_range(left, items, lo, mid);
        self.build_range(left + 1, items, mid, hi);
    }

    /// All nodes; the root is at index 0.
    pub fn inner_nodes(&self) -> &[PointBvhNode] {
        &self.inner_nodes
    }

    /// The stored elements, in partitioned order.
    pub fn leaf_nodes(&self) -> &[T] {
        &self.leaf_nodes
    }

    /// Number of stored elements.
    pub fn stored_elements(&self) -> usize {
        self.leaf_nodes.len()
    }

    /// `true` when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.leaf_nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct P(Vec3);

    impl Positioned for P {
        fn position(&self) -> Vec3 {
            self.0
        }
    }

    #[test]
    fn single_element_is_a_leaf_root() {
        let bvh = PointBvh::build(vec![P(Vec3::ONE)]);
        assert_eq!(bvh.inner_nodes().len(), 1);
        assert!(bvh.inner_nodes()[0].is_leaf());
        assert_eq!(bvh.stored_elements(), 1);
    }

    #[test]
    fn siblings_are_adjacent_and_bboxes_nest() {
        let pts = vec![
            P(Vec3::new(0.0, 0.0, 0.0)),
            P(Vec3::new(10.0, 0.0, 0.0)),
            P(Vec3::new(5.0, 1.0, 0.0)),
            P(Vec3::new(2.0, -1.0, 0.0)),
        ];
        let bvh = PointBvh::build(pts);

        // N elements produce 2N - 1 nodes in a binary tree.
        assert_eq!(bvh.inner_nodes().len(), 2 * 4 - 1);

        let root = &bvh.inner_nodes()[0];
        assert!(!root.is_leaf());
        assert_eq!(root.right_index(), root.left_index() + 1);

        for node in bvh.inner_nodes() {
            if !node.is_leaf() {
                let l = &bvh.inner_nodes()[node.left_index()];
                let r = &bvh.inner_nodes()[node.right_index()];
                let mut merged = BoundingBox::EMPTY;
                merged.extend_box(&l.bbox);
                merged.extend_box(&r.bbox);
                assert_eq!(merged, node.bbox);
            }
        }
    }

    #[test]
    fn leaves_reference_valid_elements() {
        let pts: Vec<P> = (0..7)
            .map(|i| P(Vec3::new(i as f32, (i % 3) as f32, 0.0)))
            .collect();
        let bvh = PointBvh::build(pts);

        let mut seen = vec![false; bvh.stored_elements()];
        for node in bvh.inner_nodes() {
            if node.is_leaf() {
                seen[node.index] = true;
            }
        }
        assert!(seen.iter().all(|&s| s));
    }
}
