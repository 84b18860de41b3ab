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

use super::Bsdf;
use crate::tree::SerializationInput;
use crate::GenerateError;

pub(super) fn factory(name: &str, _object: SceneObject) -> Box<dyn Bsdf> {
    Box::new(PassthroughBsdf {
        name: name.to_string(),
    })
}

struct PassthroughBsdf {
    name: String,
}

impl Bsdf for PassthroughBsdf {
    fn name(&self) -> &str {
        &self.name
    }

    fn serialize(&self, input: &mut SerializationInput) -> Result<(), GenerateError> {
        input.tree.begin_closure(&self.name);
        let bsdf_id = input.tree.current_closure_id();
        input.stream.push_str(&format!(
            "  let bsdf_{bsdf_id} : BSDFShader = @|ctx| make_passthrough_bsdf(ctx.surf);\n"
        ));
        input.tree.end_closure()
    }
}
