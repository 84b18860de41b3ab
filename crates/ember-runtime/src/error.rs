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

//! Runtime driver errors.

use ember_codegen::GenerateError;
use ember_core::scene::SceneError;
use std::fmt;

use crate::device::DeviceError;

/// An error raised by the runtime driver.
#[derive(Debug)]
pub enum RuntimeError {
    /// A second runtime was constructed while one is alive.
    AlreadyRunning,
    /// No scene was loaded before stepping or tracing.
    NotLoaded,
    /// The scene description could not be parsed.
    Scene(SceneError),
    /// Shader generation failed.
    Generate(GenerateError),
    /// The JIT rejected a shader group; the runtime is not usable.
    Device(DeviceError),
    /// `set_parameter` named a parameter the registry does not know.
    NoSuchParameter {
        /// The offending name.
        name: String,
    },
    /// `set_parameter` used a value of the wrong type.
    WrongParameterType {
        /// The offending name.
        name: String,
    },
    /// `trace` was called on a runtime not loaded in tracer mode.
    NotATracer,
    /// A caller-provided buffer has the wrong size.
    BufferSize {
        /// Bytes or elements expected.
        expected: usize,
        /// What the caller provided.
        got: usize,
    },
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::AlreadyRunning => {
                write!(f, "Trying to create multiple runtime instances")
            }
            RuntimeError::NotLoaded => write!(f, "No scene loaded"),
            RuntimeError::Scene(err) => write!(f, "{err}"),
            RuntimeError::Generate(err) => write!(f, "{err}"),
            RuntimeError::Device(err) => write!(f, "{err}"),
            RuntimeError::NoSuchParameter { name } => {
                write!(f, "No parameter named '{name}'")
            }
            RuntimeError::WrongParameterType { name } => {
                write!(f, "Parameter '{name}' has a different type")
            }
            RuntimeError::NotATracer => {
                write!(f, "Runtime was not loaded in tracer mode")
            }
            RuntimeError::BufferSize { expected, got } => {
                write!(f, "Buffer has the wrong size: expected {expected}, got {got}")
            }
        }
    }
}

impl std::error::Error for RuntimeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RuntimeError::Scene(err) => Some(err),
            RuntimeError::Generate(err) => Some(err),
            RuntimeError::Device(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SceneError> for RuntimeError {
    fn from(err: SceneError) -> Self {
        RuntimeError::Scene(err)
    }
}

impl From<GenerateError> for RuntimeError {
    fn from(err: GenerateError) -> Self {
        RuntimeError::Generate(err)
    }
}

impl From<DeviceError> for RuntimeError {
    fn from(err: DeviceError) -> Self {
        RuntimeError::Device(err)
    }
}
