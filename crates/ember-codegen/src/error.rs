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

//! Code-generation errors.
//!
//! Plugin code never aborts a render over a missing reference; it emits a
//! placeholder and logs. What does surface here are resource problems:
//! a measured-BSDF file that cannot be loaded or an export that cannot be
//! written.

use ember_core::SerializerError;
use ember_measured::MeasuredError;
use std::fmt;

/// A hard failure during shader generation.
#[derive(Debug)]
pub enum GenerateError {
    /// A measured-BSDF resource could not be prepared.
    Measured(MeasuredError),
    /// An exported resource could not be written.
    Export(SerializerError),
    /// The cache directory could not be created.
    CacheDirectory(std::io::Error),
    /// Closure bookkeeping was violated; this is a plugin bug.
    UnbalancedClosure {
        /// The closure name that was still open (or closed twice).
        name: String,
    },
}

impl fmt::Display for GenerateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerateError::Measured(err) => write!(f, "{err}"),
            GenerateError::Export(err) => write!(f, "Could not export resource: {err}"),
            GenerateError::CacheDirectory(err) => {
                write!(f, "Could not create cache directory: {err}")
            }
            GenerateError::UnbalancedClosure { name } => {
                write!(f, "Unbalanced shading closure '{name}'")
            }
        }
    }
}

impl std::error::Error for GenerateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GenerateError::Measured(err) => Some(err),
            GenerateError::Export(err) => Some(err),
            GenerateError::CacheDirectory(err) => Some(err),
            GenerateError::UnbalancedClosure { .. } => None,
        }
    }
}

impl From<MeasuredError> for GenerateError {
    fn from(err: MeasuredError) -> Self {
        GenerateError::Measured(err)
    }
}

impl From<SerializerError> for GenerateError {
    fn from(err: SerializerError) -> Self {
        GenerateError::Export(err)
    }
}
