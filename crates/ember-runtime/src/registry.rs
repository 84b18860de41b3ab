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

//! The runtime parameter registry.
//!
//! Generated shaders read the registry through `get_global_parameter_*`
//! lookups; front-ends override entries between iterations. The map is
//! behind a mutex so cross-thread writes between steps are safe; a write
//! becomes visible to the next `step`, never the running one.

use ember_codegen::GlobalRegistry;
use ember_core::math::{Vec3, Vec4};
use std::sync::Mutex;

use crate::RuntimeError;

/// Thread-safe wrapper around the registry seeded at load time.
#[derive(Debug, Default)]
pub struct ParameterRegistry {
    inner: Mutex<GlobalRegistry>,
}

impl ParameterRegistry {
    /// Wraps a registry seeded by shader generation.
    pub fn new(registry: GlobalRegistry) -> Self {
        Self {
            inner: Mutex::new(registry),
        }
    }

    /// A snapshot of the current state, taken once per step.
    pub fn snapshot(&self) -> GlobalRegistry {
        self.inner.lock().expect("registry lock poisoned").clone()
    }

    /// Overrides an integer parameter. The parameter must have been
    /// declared dynamic or global by the loaded scene.
    pub fn set_integer(&self, name: &str, value: i32) -> Result<(), RuntimeError> {
        let mut inner = self.inner.lock().expect("registry lock poisoned");
        match inner.int_parameters.get_mut(name) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(self.mismatch(&inner, name, "i32")),
        }
    }

    /// Overrides a float parameter.
    pub fn set_number(&self, name: &str, value: f32) -> Result<(), RuntimeError> {
        let mut inner = self.inner.lock().expect("registry lock poisoned");
        match inner.float_parameters.get_mut(name) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(self.mismatch(&inner, name, "f32")),
        }
    }

    /// Overrides a vector parameter.
    pub fn set_vec3(&self, name: &str, value: Vec3) -> Result<(), RuntimeError> {
        let mut inner = self.inner.lock().expect("registry lock poisoned");
        match inner.vec3_parameters.get_mut(name) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(self.mismatch(&inner, name, "vec3")),
        }
    }

    /// Overrides a four-component vector parameter.
    pub fn set_vec4(&self, name: &str, value: Vec4) -> Result<(), RuntimeError> {
        let mut inner = self.inner.lock().expect("registry lock poisoned");
        match inner.vec4_parameters.get_mut(name) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(self.mismatch(&inner, name, "vec4")),
        }
    }

    fn mismatch(&self, inner: &GlobalRegistry, name: &str, _wanted: &str) -> RuntimeError {
        let exists = inner.int_parameters.contains_key(name)
            || inner.float_parameters.contains_key(name)
            || inner.vec3_parameters.contains_key(name)
            || inner.vec4_parameters.contains_key(name);
        if exists {
            RuntimeError::WrongParameterType {
                name: name.to_string(),
            }
        } else {
            RuntimeError::NoSuchParameter {
                name: name.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ParameterRegistry {
        let mut inner = GlobalRegistry::default();
        inner.int_parameters.insert("__tech_max_depth".into(), 8);
        inner.float_parameters.insert("__tech_clamp".into(), 0.0);
        ParameterRegistry::new(inner)
    }

    #[test]
    fn overrides_apply_to_existing_slots() {
        let registry = registry();
        registry.set_number("__tech_clamp", 2.5).unwrap();
        assert_eq!(registry.snapshot().float_parameters["__tech_clamp"], 2.5);
    }

    #[test]
    fn unknown_names_and_wrong_types_fail_unchanged() {
        let registry = registry();
        assert!(matches!(
            registry.set_number("__tech_nope", 1.0),
            Err(RuntimeError::NoSuchParameter { .. })
        ));
        assert!(matches!(
            registry.set_number("__tech_max_depth", 1.0),
            Err(RuntimeError::WrongParameterType { .. })
        ));
        assert_eq!(registry.snapshot().int_parameters["__tech_max_depth"], 8);
    }
}
