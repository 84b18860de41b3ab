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

//! Errors raised by the measured-BSDF loaders.

use ember_core::SerializerError;
use std::fmt;

/// A fatal problem while loading or exporting measured BSDF data.
///
/// Numerical anomalies in the scattering data (negatives, non-finite
/// values) are not errors; they are clamped with a one-shot warning per
/// file.
#[derive(Debug)]
pub enum MeasuredError {
    /// The XML file could not be read.
    Io {
        /// The path that failed.
        path: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },
    /// The file is not well-formed XML.
    Xml {
        /// The path that failed.
        path: String,
        /// The parser's error.
        source: roxmltree::Error,
    },
    /// The XML is well-formed but not a usable BSDF description.
    Format {
        /// The path that failed.
        path: String,
        /// What exactly is wrong.
        message: String,
    },
    /// Writing the exported binary failed.
    Export(SerializerError),
}

impl MeasuredError {
    pub(crate) fn format(path: &std::path::Path, message: impl Into<String>) -> Self {
        MeasuredError::Format {
            path: path.display().to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for MeasuredError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeasuredError::Io { path, source } => {
                write!(f, "Could not load file '{path}': {source}")
            }
            MeasuredError::Xml { path, source } => {
                write!(f, "Could not load file '{path}': {source}")
            }
            MeasuredError::Format { path, message } => {
                write!(f, "Could not parse '{path}': {message}")
            }
            MeasuredError::Export(err) => write!(f, "Could not export measured data: {err}"),
        }
    }
}

impl std::error::Error for MeasuredError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MeasuredError::Io { source, .. } => Some(source),
            MeasuredError::Xml { source, .. } => Some(source),
            MeasuredError::Export(err) => Some(err),
            MeasuredError::Format { .. } => None,
        }
    }
}

impl From<SerializerError> for MeasuredError {
    fn from(err: SerializerError) -> Self {
        MeasuredError::Export(err)
    }
}
