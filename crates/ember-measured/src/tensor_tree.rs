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

//! Loader for Radiance tensor-tree BSDF XML files.
//!
//! The scattering data is a brace-nested tree over the Shirley-Chiu
//! square: internal nodes carry exactly `2^ndim` children, leaves carry
//! either one value (compressed) or `2^ndim` values. The tree is
//! linearized into a flat `nodes` array of signed cells: non-negative
//! cells index the child group inside `nodes`, a cell `-k-1` points at
//! slot `k` of the `values` array. Single-value leaves store their value
//! with the sign bit set so the sampler can detect them cheaply.

use std::path::Path;
use std::sync::Arc;

use ember_core::math::{FLT_EPS, PI};
use ember_core::{FileSerializer, Serializer};

use crate::xml;
use crate::MeasuredError;

#[derive(Debug, Default)]
struct TensorTreeNode {
    children: Vec<TensorTreeNode>,
    values: Vec<f32>,
}

impl TensorTreeNode {
    fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// The root is the only node with one child. Get rid of this special
    /// case by replacing the root with that child.
    fn eat(&mut self) {
        debug_assert!(self.values.is_empty() && self.children.len() == 1);
        let child = self.children.pop().unwrap();
        self.values = child.values;
        self.children = child.children;
    }

    /// Fraction of the mean scattering value this subtree contributes,
    /// with every child weighing an equal share of its parent's domain.
    fn mean_value(&self) -> f32 {
        if self.is_leaf() {
            if self.values.is_empty() {
                0.0
            } else {
                self.values.iter().sum::<f32>() / self.values.len() as f32
            }
        } else {
            self.children.iter().map(TensorTreeNode::mean_value).sum::<f32>()
                / self.children.len() as f32
        }
    }

    fn max_depth(&self, depth: usize) -> usize {
        if self.is_leaf() {
            depth
        } else {
            self.children
                .iter()
                .map(|c| c.max_depth(depth + 1))
                .max()
                .unwrap_or(depth)
        }
    }
}

/// One linearized directional component.
#[derive(Debug)]
pub struct TensorTreeComponent {
    ndim: u32,
    max_values_per_node: u32,
    nodes: Vec<i32>,
    values: Vec<f32>,
    total: f32,
    max_depth: usize,
    min_proj_sa: f32,
    root_is_leaf: bool,
}

impl TensorTreeComponent {
    fn new(ndim: u32) -> Self {
        Self {
            ndim,
            max_values_per_node: 1 << ndim,
            nodes: Vec::new(),
            values: Vec::new(),
            total: 0.0,
            max_depth: 0,
            min_proj_sa: PI,
            root_is_leaf: false,
        }
    }

    /// A black component: one full node group whose cells all point at a
    /// single negative-zero value.
    fn make_black(ndim: u32) -> Self {
        let mut component = Self::new(ndim);
        component.nodes = vec![-1; component.max_values_per_node as usize];
        component.values = vec![f32::copysign(0.0, -1.0)];
        component.total = 0.0;
        component.min_proj_sa = PI;
        component
    }

    fn set_root(&mut self, root: &TensorTreeNode, path: &Path) -> Result<(), MeasuredError> {
        self.add_node(root, None, path)?;
        self.total = PI * root.mean_value();
        self.max_depth = root.max_depth(1);
        self.min_proj_sa = PI / (1u32 << self.max_depth) as f32;
        Ok(())
    }

    fn add_node(
        &mut self,
        node: &TensorTreeNode,
        parent_slot: Option<usize>,
        path: &Path,
    ) -> Result<(), MeasuredError> {
        if node.is_leaf() {
            let off = self.values.len();
            match parent_slot {
                Some(slot) => self.nodes[slot] = -(off as i32) - 1,
                None => self.root_is_leaf = true,
            }

            if node.values.len() == 1 {
                self.values.push(f32::copysign(node.values[0], -1.0));
            } else {
                self.values.extend_from_slice(&node.values);
            }
        } else {
            if node.children.len() != self.max_values_per_node as usize {
                return Err(MeasuredError::format(
                    path,
                    "Misformed scatter data. Bad amount of children per node",
                ));
            }

            let off = self.nodes.len();
            if let Some(slot) = parent_slot {
                self.nodes[slot] = off as i32;
            }

            // Reserve the group first to linearize access.
            self.nodes
                .resize(off + node.children.len(), 0);

            for (i, child) in node.children.iter().enumerate() {
                self.add_node(child, Some(off + i), path)?;
            }
        }
        Ok(())
    }

    /// Dimensionality of the tree (3 isotropic, 4 anisotropic).
    pub fn ndim(&self) -> u32 {
        self.ndim
    }

    /// The linearized node cells.
    pub fn nodes(&self) -> &[i32] {
        &self.nodes
    }

    /// The leaf value pool.
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Number of node cells.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of pooled values.
    pub fn value_count(&self) -> usize {
        self.values.len()
    }

    /// Integrated flux of the component.
    pub fn total(&self) -> f32 {
        self.total
    }

    /// `true` when the whole component is a single leaf.
    pub fn is_root_leaf(&self) -> bool {
        self.root_is_leaf
    }

    /// Smallest projected solid angle at any leaf.
    pub fn min_proj_sa(&self) -> f32 {
        self.min_proj_sa
    }

    fn write<S: Serializer>(&self, os: &mut S) -> Result<(), ember_core::SerializerError> {
        // The header is not consumed by our kernels but keeps the blob
        // self-describing.
        os.write_u32(self.ndim)?;
        os.write_u32(self.max_values_per_node)?;
        os.write_u32(self.nodes.len() as u32)?;
        os.write_u32(self.values.len() as u32)?;

        os.write_pod_slice(&self.nodes, true)?;
        os.write_pod_slice(&self.values, true)
    }
}

/// Summary of one component, embedded into generated shader code.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TensorTreeComponentSpecification {
    /// Number of linearized node cells.
    pub node_count: usize,
    /// Number of pooled leaf values.
    pub value_count: usize,
    /// Integrated flux.
    pub total: f32,
    /// `true` when the component is a single leaf.
    pub root_is_leaf: bool,
    /// Smallest projected solid angle at any leaf; the sampler needs it
    /// for bounds.
    pub min_proj_sa: f32,
}

/// Summary of a full tensor-tree BSDF.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TensorTreeSpecification {
    /// Dimensionality (3 or 4).
    pub ndim: usize,
    /// Front-side reflection summary.
    pub front_reflection: TensorTreeComponentSpecification,
    /// Back-side reflection summary.
    pub back_reflection: TensorTreeComponentSpecification,
    /// Front-side transmission summary.
    pub front_transmission: TensorTreeComponentSpecification,
    /// Back-side transmission summary.
    pub back_transmission: TensorTreeComponentSpecification,
}

/// A loaded four-component tensor tree.
#[derive(Debug)]
pub struct TensorTree {
    /// `true` for `TensorTree3` input.
    pub is_isotropic: bool,
    /// Reflection seen from the front side.
    pub front_reflection: Arc<TensorTreeComponent>,
    /// Reflection seen from the back side.
    pub back_reflection: Arc<TensorTreeComponent>,
    /// Transmission entering from the front side.
    pub front_transmission: Arc<TensorTreeComponent>,
    /// Transmission entering from the back side.
    pub back_transmission: Arc<TensorTreeComponent>,
}

impl TensorTree {
    /// Loads and assembles all four components from a Radiance XML file.
    pub fn load(path: &Path) -> Result<Self, MeasuredError> {
        let text = xml::read_document(path)?;
        let doc = xml::parse_document(path, &text)?;
        let layer = xml::find_layer(path, &doc)?;

        let datadef = xml::child(layer, "DataDefinition")
            .ok_or_else(|| MeasuredError::format(path, "No DataDefinition tag"))?;

        let structure = xml::child_value(datadef, "IncidentDataStructure").unwrap_or("");
        let dim4 = structure == "TensorTree4";
        if !dim4 && structure != "TensorTree3" {
            return Err(MeasuredError::format(
                path,
                format!(
                    "Expected IncidentDataStructure of 'TensorTree4' or 'TensorTree3' but got '{structure}' instead"
                ),
            ));
        }
        let ndim = if dim4 { 4 } else { 3 };

        let mut reflection_front: Option<Arc<TensorTreeComponent>> = None;
        let mut transmission_front: Option<Arc<TensorTreeComponent>> = None;
        let mut reflection_back: Option<Arc<TensorTreeComponent>> = None;
        let mut transmission_back: Option<Arc<TensorTreeComponent>> = None;

        for block in xml::visible_blocks(path, layer)? {
            let basis = xml::child_value(block, "AngleBasis").unwrap_or("");
            if basis.is_empty() {
                return Err(MeasuredError::format(
                    path,
                    "WavelengthDataBlock has no angle basis given",
                ));
            }
            if basis != "LBNL/Shirley-Chiu" {
                return Err(MeasuredError::format(
                    path,
                    "AngleBasis is not 'LBNL/Shirley-Chiu'",
                ));
            }

            let data = xml::child_value(block, "ScatteringData").unwrap_or("");
            let mut root = parse_scattering_tree(path, data, 1usize << ndim)?;

            // Make sure the root has children instead of being a leaf.
            if root.children.is_empty() && root.values.is_empty() {
                return Err(MeasuredError::format(path, "Root of scatter data has no data"));
            }
            if !root.values.is_empty() || root.children.len() != 1 {
                return Err(MeasuredError::format(
                    path,
                    "Root of scatter data has invalid data",
                ));
            }
            root.eat(); // Eat the only node we have.

            if root.children.is_empty() && root.values.is_empty() {
                return Err(MeasuredError::format(path, "No data given"));
            }

            let mut component = TensorTreeComponent::new(ndim as u32);
            component.set_root(&root, path)?;
            let component = Arc::new(component);

            // The window definition flips front & back.
            match xml::child_value(block, "WavelengthDataDirection").unwrap_or("") {
                "Transmission Front" => transmission_back = Some(component),
                "Scattering Back" | "Reflection Back" => reflection_front = Some(component),
                "Transmission Back" => transmission_front = Some(component),
                _ => reflection_back = Some(component),
            }
        }

        // Reflection components not given stay black.
        let reflection_back =
            reflection_back.unwrap_or_else(|| Arc::new(TensorTreeComponent::make_black(4)));
        let reflection_front =
            reflection_front.unwrap_or_else(|| Arc::new(TensorTreeComponent::make_black(4)));

        // Both transmission sides stay equal unless specified otherwise.
        let near_zero = |c: &Option<Arc<TensorTreeComponent>>| {
            c.as_ref().is_some_and(|c| c.total() <= FLT_EPS)
        };
        let transmission_back = if transmission_back.is_none()
            || (transmission_front.is_some() && near_zero(&transmission_back))
        {
            transmission_front.clone()
        } else {
            transmission_back
        };
        let transmission_front = if transmission_front.is_none()
            || (transmission_back.is_some() && near_zero(&transmission_front))
        {
            transmission_back.clone()
        } else {
            transmission_front
        };

        let (Some(transmission_front), Some(transmission_back)) =
            (transmission_front, transmission_back)
        else {
            return Err(MeasuredError::format(path, "No transmission data found"));
        };

        Ok(Self {
            is_isotropic: !dim4,
            front_reflection: reflection_front,
            back_reflection: reflection_back,
            front_transmission: transmission_front,
            back_transmission: transmission_back,
        })
    }

    /// Loads `in_xml` and, when `out_data` is given, exports the binary
    /// blob. Returns the per-component summary either way.
    pub fn prepare(
        in_xml: &Path,
        out_data: Option<&Path>,
    ) -> Result<TensorTreeSpecification, MeasuredError> {
        let tree = Self::load(in_xml)?;

        let assign = |c: &TensorTreeComponent| TensorTreeComponentSpecification {
            node_count: c.node_count(),
            value_count: c.value_count(),
            total: c.total(),
            root_is_leaf: c.is_root_leaf(),
            min_proj_sa: c.min_proj_sa(),
        };

        let spec = TensorTreeSpecification {
            ndim: if tree.is_isotropic { 3 } else { 4 },
            front_reflection: assign(&tree.front_reflection),
            back_reflection: assign(&tree.back_reflection),
            front_transmission: assign(&tree.front_transmission),
            back_transmission: assign(&tree.back_transmission),
        };

        if let Some(out_data) = out_data {
            // Note: Order matters!
            let mut serializer = FileSerializer::open(out_data, false)?;
            tree.front_reflection.write(&mut serializer)?;
            tree.front_transmission.write(&mut serializer)?;
            tree.back_reflection.write(&mut serializer)?;
            tree.back_transmission.write(&mut serializer)?;
        }

        Ok(spec)
    }
}

/// Parses the brace-nested scattering payload with a manual streaming
/// tokenizer. `{` opens a child under the current node, `}` closes it,
/// anything else is a run of floats belonging to the current node.
fn parse_scattering_tree(
    path: &Path,
    text: &str,
    max_values_per_node: usize,
) -> Result<TensorTreeNode, MeasuredError> {
    let mut cursor = text.char_indices().peekable();
    let mut root = TensorTreeNode::default();
    let mut did_warn_sign = false;

    loop {
        skip_separators(&mut cursor);
        match cursor.peek().map(|&(_, c)| c) {
            None => break,
            Some('{') => {
                cursor.next();
                let child = parse_node(
                    path,
                    text,
                    &mut cursor,
                    max_values_per_node,
                    &mut did_warn_sign,
                )?;
                root.children.push(child);
            }
            Some(_) => {
                return Err(MeasuredError::format(path, "Misformed scatter data"));
            }
        }
    }

    Ok(root)
}

fn parse_node(
    path: &Path,
    text: &str,
    cursor: &mut std::iter::Peekable<std::str::CharIndices>,
    max_values_per_node: usize,
    did_warn_sign: &mut bool,
) -> Result<TensorTreeNode, MeasuredError> {
    let mut node = TensorTreeNode::default();

    loop {
        skip_separators(cursor);
        match cursor.peek().map(|&(_, c)| c) {
            None => return Err(MeasuredError::format(path, "Misformed scatter data")),
            Some('{') => {
                cursor.next();
                let child =
                    parse_node(path, text, cursor, max_values_per_node, did_warn_sign)?;
                node.children.push(child);
            }
            Some('}') => {
                cursor.next();
                break;
            }
            Some(_) => {
                let value = parse_float(path, text, cursor)?;
                if value.is_sign_negative() && !*did_warn_sign {
                    log::warn!(
                        "Data contains negative values in {}: Using absolute value instead",
                        path.display()
                    );
                    *did_warn_sign = true;
                }
                node.values.push(value.abs());
                if node.values.len() > max_values_per_node {
                    return Err(MeasuredError::format(
                        path,
                        "Misformed scatter data. Bad amount of values per node",
                    ));
                }
            }
        }
    }

    if !node.values.is_empty()
        && node.values.len() != 1
        && node.values.len() != max_values_per_node
    {
        return Err(MeasuredError::format(
            path,
            "Misformed scatter data. Bad amount of values per node",
        ));
    }

    Ok(node)
}

fn skip_separators(cursor: &mut std::iter::Peekable<std::str::CharIndices>) {
    while let Some(&(_, c)) = cursor.peek() {
        if c == ',' || c.is_whitespace() {
            cursor.next();
        } else {
            break;
        }
    }
}

fn parse_float(
    path: &Path,
    text: &str,
    cursor: &mut std::iter::Peekable<std::str::CharIndices>,
) -> Result<f32, MeasuredError> {
    let start = cursor.peek().map(|&(i, _)| i).unwrap_or(text.len());
    let mut end = start;
    while let Some(&(i, c)) = cursor.peek() {
        if c == ',' || c == '{' || c == '}' || c.is_whitespace() {
            break;
        }
        end = i + c.len_utf8();
        cursor.next();
    }

    text[start..end]
        .parse()
        .map_err(|_| MeasuredError::format(path, format!("Invalid value '{}'", &text[start..end])))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Write;

    fn tree_xml(structure: &str, direction: &str, data: &str) -> String {
        format!(
            "<WindowElement><Optical><Layer>\
             <DataDefinition>\
               <IncidentDataStructure>{structure}</IncidentDataStructure>\
             </DataDefinition>\
             <WavelengthData><Wavelength>Visible</Wavelength>\
               <WavelengthDataBlock>\
                 <AngleBasis>LBNL/Shirley-Chiu</AngleBasis>\
                 <WavelengthDataDirection>{direction}</WavelengthDataDirection>\
                 <ScatteringData>{data}</ScatteringData>\
               </WavelengthDataBlock>\
             </WavelengthData>\
             </Layer></Optical></WindowElement>"
        )
    }

    fn write_temp(content: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tree.xml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        (dir, path)
    }

    #[test]
    fn isotropic_two_level_tree_linearizes() {
        let xml = tree_xml(
            "TensorTree3",
            "Transmission Front",
            "{ {1} {2} {3} {4} {5} {6} {7} {8} }",
        );
        let (_dir, path) = write_temp(&xml);
        let tree = TensorTree::load(&path).unwrap();
        assert!(tree.is_isotropic);

        let component = &tree.back_transmission;
        assert_eq!(component.node_count(), 8);
        assert!(component.nodes().iter().all(|&n| n < 0));
        assert_eq!(component.value_count(), 8);
        assert!(component.values().iter().all(|v| v.is_sign_negative()));

        // Every negative cell must reference a valid value slot.
        for &cell in component.nodes() {
            let slot = (-cell - 1) as usize;
            assert!(slot < component.value_count());
        }

        // total is pi times the mean leaf value.
        let expected = PI * (1..=8).sum::<i32>() as f32 / 8.0;
        assert_relative_eq!(component.total(), expected, epsilon = 1e-4);

        // Root at depth 1, leaves at depth 2.
        assert_relative_eq!(component.min_proj_sa(), PI / 4.0);
        assert!(!component.is_root_leaf());
    }

    #[test]
    fn full_leaf_root_is_detected() {
        let xml = tree_xml(
            "TensorTree3",
            "Transmission Front",
            "{ 1 1 1 1 1 1 1 1 }",
        );
        let (_dir, path) = write_temp(&xml);
        let tree = TensorTree::load(&path).unwrap();

        let component = &tree.back_transmission;
        assert!(component.is_root_leaf());
        assert_eq!(component.node_count(), 0);
        assert_eq!(component.value_count(), 8);
        // Full leaves keep their raw sign.
        assert!(component.values().iter().all(|v| !v.is_sign_negative()));
        assert_relative_eq!(component.total(), PI, epsilon = 1e-5);
    }

    #[test]
    fn anisotropic_trees_use_sixteen_values() {
        let leaves: String = (0..16).map(|_| "{0.5} ".to_string()).collect();
        let xml = tree_xml(
            "TensorTree4",
            "Transmission Front",
            &format!("{{ {leaves} }}"),
        );
        let (_dir, path) = write_temp(&xml);
        let tree = TensorTree::load(&path).unwrap();
        assert!(!tree.is_isotropic);
        assert_eq!(tree.back_transmission.node_count(), 16);
    }

    #[test]
    fn wrong_fan_out_is_fatal() {
        let xml = tree_xml("TensorTree3", "Transmission Front", "{ {1} {2} }");
        let (_dir, path) = write_temp(&xml);
        assert!(matches!(
            TensorTree::load(&path),
            Err(MeasuredError::Format { .. })
        ));
    }

    #[test]
    fn unbalanced_braces_are_fatal() {
        let xml = tree_xml("TensorTree3", "Transmission Front", "{ {1} {2} {3}");
        let (_dir, path) = write_temp(&xml);
        assert!(matches!(
            TensorTree::load(&path),
            Err(MeasuredError::Format { .. })
        ));
    }

    #[test]
    fn missing_reflection_components_are_black() {
        let xml = tree_xml(
            "TensorTree3",
            "Transmission Front",
            "{ {1} {2} {3} {4} {5} {6} {7} {8} }",
        );
        let (_dir, path) = write_temp(&xml);
        let tree = TensorTree::load(&path).unwrap();

        let black = &tree.front_reflection;
        assert_eq!(black.total(), 0.0);
        assert!(black.nodes().iter().all(|&n| n == -1));
        assert_eq!(black.value_count(), 1);
        assert!(black.values()[0].is_sign_negative());
    }

    #[test]
    fn export_carries_headers_and_payload() {
        let xml = tree_xml(
            "TensorTree3",
            "Transmission Front",
            "{ {1} {2} {3} {4} {5} {6} {7} {8} }",
        );
        let (dir, path) = write_temp(&xml);
        let out = dir.path().join("tree.bin");
        let spec = TensorTree::prepare(&path, Some(&out)).unwrap();

        assert_eq!(spec.ndim, 3);
        assert_eq!(spec.front_transmission.node_count, 8);
        assert_eq!(spec.front_transmission.value_count, 8);

        // Four components, 16-byte header each, plus node and value
        // payloads (black components hold 16 nodes and 1 value).
        let expected = 2 * (16 + 8 * 4 + 8 * 4) + 2 * (16 + 16 * 4 + 4);
        let len = std::fs::metadata(&out).unwrap().len();
        assert_eq!(len, expected as u64);
    }
}
