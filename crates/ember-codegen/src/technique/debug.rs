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

use ember_core::SceneObject;

use super::{Technique, TechniqueInfo};
use crate::context::LoaderContext;
use crate::tree::{IntegerOptions, SerializationInput};
use crate::GenerateError;

pub(super) fn factory(object: SceneObject) -> Box<dyn Technique> {
    Box::new(DebugTechnique { object })
}

/// Visualizes a single shading quantity (normals, uv, depth) selected by
/// a dynamic mode parameter, so front-ends can cycle without recompiling.
struct DebugTechnique {
    object: SceneObject,
}

impl Technique for DebugTechnique {
    fn type_name(&self) -> &str {
        "debug"
    }

    fn info(&self, _ctx: &LoaderContext) -> TechniqueInfo {
        TechniqueInfo::default()
    }

    fn generate_body(&self, input: &mut SerializationInput) -> Result<(), GenerateError> {
        input.tree.add_integer(
            "mode",
            &self.object,
            0,
            IntegerOptions::dynamic().make_global(),
        )?;

        let header = input.tree.pull_header();
        input.stream.push_str(&header);
        input.stream.push_str(&format!(
            "  let technique = make_debug_renderer({});\n",
            input.tree.inline("mode"),
        ));
        Ok(())
    }
}
