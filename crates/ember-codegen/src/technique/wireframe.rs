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
use crate::tree::SerializationInput;
use crate::GenerateError;

pub(super) fn factory(_object: SceneObject) -> Box<dyn Technique> {
    Box::new(WireframeTechnique)
}

struct WireframeTechnique;

impl Technique for WireframeTechnique {
    fn type_name(&self) -> &str {
        "wireframe"
    }

    fn info(&self, _ctx: &LoaderContext) -> TechniqueInfo {
        let mut info = TechniqueInfo::default();
        info.variants[0].primary_payload_count = 1;
        info
    }

    fn generate_body(&self, input: &mut SerializationInput) -> Result<(), GenerateError> {
        input
            .stream
            .push_str("  let technique = make_wireframe_renderer();\n");
        Ok(())
    }
}
