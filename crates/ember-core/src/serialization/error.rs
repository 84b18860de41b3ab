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

//! Error type shared by all serializer implementations.

use std::fmt;

/// An error raised by a [`super::Serializer`] operation.
#[derive(Debug)]
pub enum SerializerError {
    /// The underlying sink failed. The serializer is invalid afterwards.
    Io(std::io::Error),
    /// A write was attempted on a read stream, or the other way around.
    WrongMode {
        /// The mode the stream is actually in.
        read_mode: bool,
    },
    /// A typed read hit the end of the stream.
    ShortRead {
        /// How many bytes the read needed.
        requested: usize,
        /// How many bytes were actually available.
        available: usize,
    },
    /// The stream was used after its sink failed or was closed.
    Invalid,
    /// A length-prefixed string did not contain valid UTF-8.
    InvalidString(std::string::FromUtf8Error),
}

impl fmt::Display for SerializerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SerializerError::Io(err) => write!(f, "Serializer sink failure: {err}"),
            SerializerError::WrongMode { read_mode } => {
                if *read_mode {
                    write!(f, "Trying to write into a read serializer")
                } else {
                    write!(f, "Trying to read from a write serializer")
                }
            }
            SerializerError::ShortRead {
                requested,
                available,
            } => write!(
                f,
                "Unexpected end of stream: requested {requested} bytes, got {available}"
            ),
            SerializerError::Invalid => write!(f, "Serializer is no longer valid"),
            SerializerError::InvalidString(err) => {
                write!(f, "Serialized string is not valid UTF-8: {err}")
            }
        }
    }
}

impl std::error::Error for SerializerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SerializerError::Io(err) => Some(err),
            SerializerError::InvalidString(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SerializerError {
    fn from(err: std::io::Error) -> Self {
        SerializerError::Io(err)
    }
}
