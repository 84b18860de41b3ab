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
    Box::new(AoTechnique)
}

struct AoTechnique;

impl Technique for AoTechnique {
    fn type_name(&self) -> &str {
        "ao"
    }

    fn has_denoiser_support(&self) -> bool {
        true
    }

    fn info(&self, _ctx: &LoaderContext) -> TechniqueInfo {
        TechniqueInfo::default()
    }

    fn generate_body(&self, input: &mut SerializationInput) -> Result<(), GenerateError> {
        input
            .stream
            .push_str("  let technique = make_ao_renderer();\n");
        Ok(())
    }
}
