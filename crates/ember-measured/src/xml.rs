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

//! Shared navigation for the Radiance `WindowElement` XML envelope.

use std::path::Path;

use crate::MeasuredError;

pub(crate) fn read_document(path: &Path) -> Result<String, MeasuredError> {
    std::fs::read_to_string(path).map_err(|source| MeasuredError::Io {
        path: path.display().to_string(),
        source,
    })
}

pub(crate) fn parse_document<'a>(
    path: &Path,
    text: &'a str,
) -> Result<roxmltree::Document<'a>, MeasuredError> {
    roxmltree::Document::parse(text).map_err(|source| MeasuredError::Xml {
        path: path.display().to_string(),
        source,
    })
}

/// First child element with the given tag name.
pub(crate) fn child<'a, 'input>(
    node: roxmltree::Node<'a, 'input>,
    tag: &str,
) -> Option<roxmltree::Node<'a, 'input>> {
    node.children()
        .find(|c| c.is_element() && c.tag_name().name() == tag)
}

/// Trimmed text of the first child element with the given tag name.
pub(crate) fn child_value<'a>(node: roxmltree::Node<'a, '_>, tag: &str) -> Option<&'a str> {
    child(node, tag).and_then(|c| c.text()).map(str::trim)
}

/// Descends `WindowElement/Optical/Layer`, the anchor both loaders share.
pub(crate) fn find_layer<'a, 'input>(
    path: &Path,
    doc: &'a roxmltree::Document<'input>,
) -> Result<roxmltree::Node<'a, 'input>, MeasuredError> {
    let root = doc.root_element();
    if root.tag_name().name() != "WindowElement" {
        return Err(MeasuredError::format(path, "No WindowElement tag"));
    }
    child(root, "Optical")
        .and_then(|optical| child(optical, "Layer"))
        .ok_or_else(|| MeasuredError::format(path, "No Layer tag"))
}

/// All `WavelengthData` blocks restricted to the visible range, already
/// unwrapped to their inner `WavelengthDataBlock`.
pub(crate) fn visible_blocks<'a, 'input>(
    path: &Path,
    layer: roxmltree::Node<'a, 'input>,
) -> Result<Vec<roxmltree::Node<'a, 'input>>, MeasuredError> {
    let mut blocks = Vec::new();
    for data in layer
        .children()
        .filter(|c| c.is_element() && c.tag_name().name() == "WavelengthData")
    {
        // Skip entries for non-visible wavelengths.
        if child_value(data, "Wavelength") != Some("Visible") {
            continue;
        }
        let block = child(data, "WavelengthDataBlock")
            .ok_or_else(|| MeasuredError::format(path, "No WavelengthDataBlock given"))?;
        blocks.push(block);
    }
    Ok(blocks)
}
