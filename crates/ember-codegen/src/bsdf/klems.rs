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

//! Measured BSDFs backed by Radiance XML data.
//!
//! Both plugins funnel the XML through the measured loaders exactly once
//! per file (exported-data cache), register the exported binary as an
//! external resource, and emit code constructing the sampler model over
//! the mapped buffer.

use ember_core::math::Vec3;
use ember_core::SceneObject;
use ember_measured::{
    Klems, KlemsComponentSpecification, KlemsSpecification, TensorTree,
    TensorTreeComponentSpecification, TensorTreeSpecification,
};
use std::path::PathBuf;

use super::Bsdf;
use crate::cache::{escape_identifier, ExportedData, ExportedPayload};
use crate::tree::{ColorOptions, SerializationInput};
use crate::GenerateError;

pub(super) fn factory(name: &str, object: SceneObject) -> Box<dyn Bsdf> {
    Box::new(KlemsBsdf {
        name: name.to_string(),
        object,
    })
}

pub(super) fn tensortree_factory(name: &str, object: SceneObject) -> Box<dyn Bsdf> {
    Box::new(TensorTreeBsdf {
        name: name.to_string(),
        object,
    })
}

struct KlemsBsdf {
    name: String,
    object: SceneObject,
}

fn setup_klems(
    name: &str,
    object: &SceneObject,
    input: &mut SerializationInput,
) -> Result<(PathBuf, KlemsSpecification), GenerateError> {
    let filename = object.resolve_path(object.string_property("filename", ""));
    let logical_id = format!("klems:{}", filename.display());

    let ctx = input.tree.context_mut();
    if let Some(data) = ctx.cache.find(&logical_id) {
        if let ExportedPayload::Klems(spec) = data.payload {
            return Ok((data.path.clone(), spec));
        }
    }

    let path = ctx
        .cache
        .directory()?
        .join(format!("klems_{}.bin", escape_identifier(name)));
    let spec = Klems::prepare(&filename, Some(&path))?;
    ctx.cache.insert(
        &logical_id,
        ExportedData {
            path: path.clone(),
            payload: ExportedPayload::Klems(spec),
        },
    );
    Ok((path, spec))
}

fn dump_klems_component(spec: &KlemsComponentSpecification) -> String {
    format!(
        "KlemsComponentSpecification{{ total = {:?}, theta_count = [{}, {}], entry_count = [{}, {}] }}",
        spec.total,
        spec.theta_count.0,
        spec.theta_count.1,
        spec.entry_count.0,
        spec.entry_count.1,
    )
}

fn dump_klems_specification(spec: &KlemsSpecification) -> String {
    format!(
        "KlemsSpecification{{ front_reflection = {}, back_reflection = {}, front_transmission = {}, back_transmission = {} }}",
        dump_klems_component(&spec.front_reflection),
        dump_klems_component(&spec.back_reflection),
        dump_klems_component(&spec.front_transmission),
        dump_klems_component(&spec.back_transmission),
    )
}

impl Bsdf for KlemsBsdf {
    fn name(&self) -> &str {
        &self.name
    }

    fn serialize(&self, input: &mut SerializationInput) -> Result<(), GenerateError> {
        input.tree.begin_closure(&self.name);
        input
            .tree
            .add_color("base_color", &self.object, Vec3::ONE, ColorOptions::new())?;

        let up = self.object.vec3_property("up", Vec3::Z).normalize();

        let (buffer_path, spec) = setup_klems(&self.name, &self.object, input)?;
        let res_id = input
            .tree
            .context_mut()
            .register_external_resource(&buffer_path);

        let bsdf_id = input.tree.current_closure_id();
        let header = input.tree.pull_header();
        input.stream.push_str(&header);
        input.stream.push_str(&format!(
            "  let klems_{bsdf_id} = make_klems_model(device.load_buffer_by_id({res_id}), {});\n",
            dump_klems_specification(&spec),
        ));
        input.stream.push_str(&format!(
            "  let bsdf_{bsdf_id} : BSDFShader = @|ctx| make_klems_bsdf(ctx.surf, {}, make_vec3({:?}, {:?}, {:?}), klems_{bsdf_id});\n",
            input.tree.inline("base_color"),
            up.x,
            up.y,
            up.z,
        ));

        input.tree.end_closure()
    }
}

struct TensorTreeBsdf {
    name: String,
    object: SceneObject,
}

fn setup_tensortree(
    name: &str,
    object: &SceneObject,
    input: &mut SerializationInput,
) -> Result<(PathBuf, TensorTreeSpecification), GenerateError> {
    let filename = object.resolve_path(object.string_property("filename", ""));
    let logical_id = format!("tensortree:{}", filename.display());

    let ctx = input.tree.context_mut();
    if let Some(data) = ctx.cache.find(&logical_id) {
        if let ExportedPayload::TensorTree(spec) = data.payload {
            return Ok((data.path.clone(), spec));
        }
    }

    let path = ctx
        .cache
        .directory()?
        .join(format!("tensortree_{}.bin", escape_identifier(name)));
    let spec = TensorTree::prepare(&filename, Some(&path))?;
    ctx.cache.insert(
        &logical_id,
        ExportedData {
            path: path.clone(),
            payload: ExportedPayload::TensorTree(spec),
        },
    );
    Ok((path, spec))
}

fn dump_tt_component(spec: &TensorTreeComponentSpecification) -> String {
    format!(
        "TensorTreeComponentSpecification{{ node_count = {}, value_count = {}, total = {:?}, root_is_leaf = {}, min_proj_sa = {:?} }}",
        spec.node_count, spec.value_count, spec.total, spec.root_is_leaf, spec.min_proj_sa,
    )
}

impl Bsdf for TensorTreeBsdf {
    fn name(&self) -> &str {
        &self.name
    }

    fn serialize(&self, input: &mut SerializationInput) -> Result<(), GenerateError> {
        input.tree.begin_closure(&self.name);
        input
            .tree
            .add_color("base_color", &self.object, Vec3::ONE, ColorOptions::new())?;

        let up = self.object.vec3_property("up", Vec3::Z).normalize();

        let (buffer_path, spec) = setup_tensortree(&self.name, &self.object, input)?;
        let res_id = input
            .tree
            .context_mut()
            .register_external_resource(&buffer_path);

        let bsdf_id = input.tree.current_closure_id();
        let header = input.tree.pull_header();
        input.stream.push_str(&header);
        input.stream.push_str(&format!(
            "  let tt_{bsdf_id} = make_tensortree_model(device.load_buffer_by_id({res_id}), TensorTreeSpecification{{ ndim = {}, front_reflection = {}, back_reflection = {}, front_transmission = {}, back_transmission = {} }});\n",
            spec.ndim,
            dump_tt_component(&spec.front_reflection),
            dump_tt_component(&spec.back_reflection),
            dump_tt_component(&spec.front_transmission),
            dump_tt_component(&spec.back_transmission),
        ));
        input.stream.push_str(&format!(
            "  let bsdf_{bsdf_id} : BSDFShader = @|ctx| make_tensortree_bsdf(ctx.surf, {}, make_vec3({:?}, {:?}, {:?}), tt_{bsdf_id});\n",
            input.tree.inline("base_color"),
            up.x,
            up.y,
            up.z,
        ));

        input.tree.end_closure()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{LoaderContext, Target};
    use ember_core::scene::parse_scene_string;
    use std::io::Write;
    use std::path::Path;

    const KLEMS_XML: &str = "<WindowElement><Optical><Layer>\
        <DataDefinition>\
          <IncidentDataStructure>Columns</IncidentDataStructure>\
          <AngleBasis><AngleBasisName>Tiny</AngleBasisName>\
            <AngleBasisBlock><ThetaBounds><LowerTheta>0</LowerTheta>\
              <UpperTheta>90</UpperTheta></ThetaBounds><nPhis>2</nPhis></AngleBasisBlock>\
          </AngleBasis>\
        </DataDefinition>\
        <WavelengthData><Wavelength>Visible</Wavelength>\
          <WavelengthDataBlock>\
            <ColumnAngleBasis>Tiny</ColumnAngleBasis>\
            <RowAngleBasis>Tiny</RowAngleBasis>\
            <WavelengthDataDirection>Transmission Front</WavelengthDataDirection>\
            <ScatteringData>0.5 0.5 0.5 0.5</ScatteringData>\
          </WavelengthDataBlock>\
        </WavelengthData>\
        </Layer></Optical></WindowElement>";

    #[test]
    fn klems_bsdf_exports_once_and_references_the_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let xml_path = dir.path().join("pane.xml");
        std::fs::File::create(&xml_path)
            .unwrap()
            .write_all(KLEMS_XML.as_bytes())
            .unwrap();

        let json = format!(
            r#"{{ "bsdfs": [
                {{ "name": "pane", "type": "klems", "filename": "{}" }},
                {{ "name": "pane2", "type": "klems", "filename": "{}" }}
            ] }}"#,
            xml_path.display(),
            xml_path.display(),
        );
        let scene = parse_scene_string(&json, dir.path()).unwrap();
        let mut ctx = LoaderContext::new(scene, Target::Generic, &dir.path().join("cache"));

        let mut tree = crate::tree::ShadingTree::new(&mut ctx);
        let mut stream = String::new();
        crate::bsdf::generate("pane", &mut tree, &mut stream).unwrap();
        crate::bsdf::generate("pane2", &mut tree, &mut stream).unwrap();

        assert!(stream.contains("make_klems_model(device.load_buffer_by_id(0)"));
        assert!(stream.contains("make_klems_bsdf"));

        // Same source file: one cache entry, one export, one resource id.
        assert_eq!(ctx.cache.len(), 1);
        assert_eq!(ctx.external_resources().len(), 1);
        assert!(ctx.external_resources()[0].exists());
    }
}
