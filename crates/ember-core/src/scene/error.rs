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

//! Scene parsing errors.

use std::fmt;

/// An error raised while loading or parsing a scene description.
#[derive(Debug)]
pub enum SceneError {
    /// The scene file could not be read.
    Io {
        /// The path that failed.
        path: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },
    /// The file is not valid JSON.
    Json(serde_json::Error),
    /// The JSON is well-formed but violates the scene schema.
    Format(String),
}

impl fmt::Display for SceneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SceneError::Io { path, source } => {
                write!(f, "Could not read scene file '{path}': {source}")
            }
            SceneError::Json(err) => write!(f, "Scene file is not valid JSON: {err}"),
            SceneError::Format(msg) => write!(f, "Invalid scene description: {msg}"),
        }
    }
}

impl std::error::Error for SceneError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SceneError::Io { source, .. } => Some(source),
            SceneError::Json(err) => Some(err),
            SceneError::Format(_) => None,
        }
    }
}

impl From<serde_json::Error> for SceneError {
    fn from(err: serde_json::Error) -> Self {
        SceneError::Json(err)
    }
}
