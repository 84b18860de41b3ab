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

//! A serializer backed by a file on disk.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use super::{Serializer, SerializerError};

/// A [`Serializer`] that streams to or from a file.
///
/// The stream tracks its own footprint so alignment padding works without
/// seeking. A sink failure permanently invalidates the serializer.
pub struct FileSerializer {
    file: Option<File>,
    read_mode: bool,
    footprint: usize,
}

impl FileSerializer {
    /// Opens `path` for reading or (truncating) writing.
    pub fn open(path: &Path, read_mode: bool) -> Result<Self, SerializerError> {
        let file = if read_mode {
            File::open(path)?
        } else {
            File::create(path)?
        };
        Ok(Self {
            file: Some(file),
            read_mode,
            footprint: 0,
        })
    }
}

impl Serializer for FileSerializer {
    fn is_read_mode(&self) -> bool {
        self.read_mode
    }

    fn is_valid(&self) -> bool {
        self.file.is_some()
    }

    fn current_size(&self) -> usize {
        self.footprint
    }

    fn write_raw(&mut self, data: &[u8]) -> Result<usize, SerializerError> {
        let file = self.file.as_mut().ok_or(SerializerError::Invalid)?;
        match file.write_all(data) {
            Ok(()) => {
                self.footprint += data.len();
                Ok(data.len())
            }
            Err(err) => {
                self.file = None;
                Err(SerializerError::Io(err))
            }
        }
    }

    fn read_raw(&mut self, data: &mut [u8]) -> Result<usize, SerializerError> {
        let file = self.file.as_mut().ok_or(SerializerError::Invalid)?;
        let mut total = 0;
        while total < data.len() {
            match file.read(&mut data[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    self.file = None;
                    return Err(SerializerError::Io(err));
                }
            }
        }
        self.footprint += total;
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_through_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.bin");

        {
            let mut out = FileSerializer::open(&path, false).unwrap();
            out.write_u32(42).unwrap();
            out.write_string("ember").unwrap();
            out.write_alignment_pad(16).unwrap();
            out.write_f32(1.5).unwrap();
            assert_eq!(out.current_size() % 16, 4);
        }

        let mut input = FileSerializer::open(&path, true).unwrap();
        assert_eq!(input.read_u32().unwrap(), 42);
        assert_eq!(input.read_string().unwrap(), "ember");
        input.write_alignment_pad(16).unwrap();
        assert_eq!(input.read_f32().unwrap(), 1.5);
    }

    #[test]
    fn short_read_is_surfaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.bin");
        {
            let mut out = FileSerializer::open(&path, false).unwrap();
            out.write_u8(1).unwrap();
        }

        let mut input = FileSerializer::open(&path, true).unwrap();
        match input.read_u32() {
            Err(SerializerError::ShortRead {
                requested: 4,
                available: 1,
            }) => {}
            other => panic!("expected short read, got {other:?}"),
        }
    }
}
