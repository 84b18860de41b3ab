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

use ember_core::math::Vec3;
use ember_core::SceneObject;

use super::Bsdf;
use crate::tree::{ColorOptions, SerializationInput};
use crate::GenerateError;

pub(super) fn factory(name: &str, object: SceneObject) -> Box<dyn Bsdf> {
    Box::new(DjMeasuredBsdf {
        name: name.to_string(),
        object,
    })
}

/// Dupuy-Jakob measured BRDF. The `.bsdf` container already holds the
/// sampler tables (NDF, VNDF, sigma, luminance, RGB) as sub-buffers; the
/// kernels map them through one registered resource per table.
struct DjMeasuredBsdf {
    name: String,
    object: SceneObject,
}

const TABLES: [&str; 5] = ["ndf", "vndf", "sigma", "luminance", "rgb"];

impl Bsdf for DjMeasuredBsdf {
    fn name(&self) -> &str {
        &self.name
    }

    fn serialize(&self, input: &mut SerializationInput) -> Result<(), GenerateError> {
        let filename = self
            .object
            .resolve_path(self.object.string_property("filename", ""));
        let isotropic = self.object.bool_property("isotropic", true);
        let jacobian = self.object.bool_property("jacobian", true);

        input.tree.begin_closure(&self.name);
        input
            .tree
            .add_color("tint", &self.object, Vec3::ONE, ColorOptions::new())?;

        let bsdf_id = input.tree.current_closure_id();

        let mut buffers = Vec::with_capacity(TABLES.len());
        for table in TABLES {
            let table_path = filename.with_extension(format!("{table}.bin"));
            let res_id = input
                .tree
                .context_mut()
                .register_external_resource(&table_path);
            buffers.push(res_id);
        }

        let header = input.tree.pull_header();
        input.stream.push_str(&header);
        for (table, res_id) in TABLES.iter().zip(&buffers) {
            input.stream.push_str(&format!(
                "  let buffer_{bsdf_id}_{table} : DeviceBuffer = device.load_buffer_by_id({res_id});\n"
            ));
        }
        input.stream.push_str(&format!(
            "  let bsdf_{bsdf_id} : BSDFShader = @|ctx| make_djmeasured_bsdf(ctx.surf, {}, {}, buffer_{bsdf_id}_ndf, buffer_{bsdf_id}_vndf, buffer_{bsdf_id}_sigma, buffer_{bsdf_id}_luminance, buffer_{bsdf_id}_rgb, {});\n",
            if isotropic { "true" } else { "false" },
            if jacobian { "true" } else { "false" },
            input.tree.inline("tint"),
        ));

        input.tree.end_closure()
    }
}
