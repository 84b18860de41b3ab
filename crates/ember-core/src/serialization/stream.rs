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

//! The [`Serializer`] trait: a raw byte channel plus typed helpers.

use byteorder::{ByteOrder, LittleEndian};
use bytemuck::Pod;
use std::collections::HashMap;

use crate::math::DenseMatrix;

use super::SerializerError;

/// A value that knows how to move itself through a serializer.
///
/// Flat records (light entries, basis rings) implement this when a plain
/// `Pod` block copy does not apply. Both directions keep the same field
/// order; the on-disk layout is whatever `write_to` emits.
pub trait Transferable {
    /// Writes all fields, in a fixed order.
    fn write_to<S: Serializer + ?Sized>(&self, serializer: &mut S) -> Result<(), SerializerError>;

    /// Reads all fields, in the same order `write_to` emitted them.
    fn read_from<S: Serializer + ?Sized>(
        &mut self,
        serializer: &mut S,
    ) -> Result<(), SerializerError>;
}

macro_rules! scalar_helpers {
    ($write:ident, $read:ident, $ty:ty, $size:expr, $put:path, $get:path) => {
        /// Writes one value, little-endian.
        fn $write(&mut self, v: $ty) -> Result<(), SerializerError> {
            let mut buf = [0u8; $size];
            $put(&mut buf, v);
            self.write_all(&buf)
        }

        /// Reads one value, little-endian.
        fn $read(&mut self) -> Result<$ty, SerializerError> {
            let mut buf = [0u8; $size];
            self.read_exact(&mut buf)?;
            Ok($get(&buf))
        }
    };
}

/// A sequential, mode-flagged binary stream.
///
/// Implementations provide the raw channel; all typed helpers are defined
/// on top of it. A stream is either in read mode or write mode for its
/// whole lifetime. Using the wrong direction is an error, not a panic.
pub trait Serializer {
    /// `true` if this stream reads, `false` if it writes.
    fn is_read_mode(&self) -> bool;

    /// `false` once the underlying sink has failed.
    fn is_valid(&self) -> bool;

    /// Bytes moved through the stream so far. Alignment padding is
    /// computed against this value.
    fn current_size(&self) -> usize;

    /// Writes raw bytes, returning how many were accepted.
    fn write_raw(&mut self, data: &[u8]) -> Result<usize, SerializerError>;

    /// Reads raw bytes, returning how many were available. A short count
    /// signals the end of the stream; typed readers turn that into
    /// [`SerializerError::ShortRead`].
    fn read_raw(&mut self, data: &mut [u8]) -> Result<usize, SerializerError>;

    /// Writes the full buffer or fails.
    fn write_all(&mut self, data: &[u8]) -> Result<(), SerializerError> {
        if self.is_read_mode() {
            return Err(SerializerError::WrongMode { read_mode: true });
        }
        let written = self.write_raw(data)?;
        if written != data.len() {
            return Err(SerializerError::Invalid);
        }
        Ok(())
    }

    /// Fills the full buffer or fails with a short-read error.
    fn read_exact(&mut self, data: &mut [u8]) -> Result<(), SerializerError> {
        if !self.is_read_mode() {
            return Err(SerializerError::WrongMode { read_mode: false });
        }
        let got = self.read_raw(data)?;
        if got != data.len() {
            return Err(SerializerError::ShortRead {
                requested: data.len(),
                available: got,
            });
        }
        Ok(())
    }

    /// Writes a boolean as a single byte.
    fn write_bool(&mut self, v: bool) -> Result<(), SerializerError> {
        self.write_u8(v as u8)
    }

    /// Reads a boolean stored as a single byte.
    fn read_bool(&mut self) -> Result<bool, SerializerError> {
        Ok(self.read_u8()? != 0)
    }

    /// Writes one byte.
    fn write_u8(&mut self, v: u8) -> Result<(), SerializerError> {
        self.write_all(&[v])
    }

    /// Reads one byte.
    fn read_u8(&mut self) -> Result<u8, SerializerError> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    /// Writes one signed byte.
    fn write_i8(&mut self, v: i8) -> Result<(), SerializerError> {
        self.write_u8(v as u8)
    }

    /// Reads one signed byte.
    fn read_i8(&mut self) -> Result<i8, SerializerError> {
        Ok(self.read_u8()? as i8)
    }

    scalar_helpers!(write_u16, read_u16, u16, 2, LittleEndian::write_u16, LittleEndian::read_u16);
    scalar_helpers!(write_i16, read_i16, i16, 2, LittleEndian::write_i16, LittleEndian::read_i16);
    scalar_helpers!(write_u32, read_u32, u32, 4, LittleEndian::write_u32, LittleEndian::read_u32);
    scalar_helpers!(write_i32, read_i32, i32, 4, LittleEndian::write_i32, LittleEndian::read_i32);
    scalar_helpers!(write_u64, read_u64, u64, 8, LittleEndian::write_u64, LittleEndian::read_u64);
    scalar_helpers!(write_i64, read_i64, i64, 8, LittleEndian::write_i64, LittleEndian::read_i64);
    scalar_helpers!(write_f32, read_f32, f32, 4, LittleEndian::write_f32, LittleEndian::read_f32);
    scalar_helpers!(write_f64, read_f64, f64, 8, LittleEndian::write_f64, LittleEndian::read_f64);

    /// Writes a string as a u32 length followed by UTF-8 bytes, with no
    /// terminator.
    fn write_string(&mut self, v: &str) -> Result<(), SerializerError> {
        self.write_u32(v.len() as u32)?;
        self.write_all(v.as_bytes())
    }

    /// Reads a length-prefixed UTF-8 string.
    fn read_string(&mut self) -> Result<String, SerializerError> {
        let len = self.read_u32()? as usize;
        let mut buf = vec![0u8; len];
        self.read_exact(&mut buf)?;
        String::from_utf8(buf).map_err(SerializerError::InvalidString)
    }

    /// Writes a slice of trivially copyable elements as one contiguous
    /// block. Non-naked mode prefixes a u32 element count.
    fn write_pod_slice<T: Pod>(&mut self, v: &[T], naked: bool) -> Result<(), SerializerError> {
        if !naked {
            self.write_u32(v.len() as u32)?;
        }
        self.write_all(bytemuck::cast_slice(v))
    }

    /// Reads a count-prefixed block of trivially copyable elements.
    fn read_pod_vec<T: Pod + Default + Clone>(&mut self) -> Result<Vec<T>, SerializerError> {
        let count = self.read_u32()? as usize;
        self.read_pod_vec_naked(count)
    }

    /// Reads `count` trivially copyable elements with no prefix.
    fn read_pod_vec_naked<T: Pod + Default + Clone>(
        &mut self,
        count: usize,
    ) -> Result<Vec<T>, SerializerError> {
        let mut out = vec![T::default(); count];
        self.read_exact(bytemuck::cast_slice_mut(&mut out))?;
        Ok(out)
    }

    /// Writes non-trivial elements one by one via [`Transferable`].
    /// Non-naked mode prefixes a u32 element count.
    fn write_records<T: Transferable>(
        &mut self,
        v: &[T],
        naked: bool,
    ) -> Result<(), SerializerError> {
        if !naked {
            self.write_u32(v.len() as u32)?;
        }
        for item in v {
            item.write_to(self)?;
        }
        Ok(())
    }

    /// Reads `count` non-trivial elements with no prefix.
    fn read_records_naked<T: Transferable + Default>(
        &mut self,
        count: usize,
    ) -> Result<Vec<T>, SerializerError> {
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            let mut item = T::default();
            item.read_from(self)?;
            out.push(item);
        }
        Ok(out)
    }

    /// Writes a string-keyed map as a u32 count plus key/value pairs.
    fn write_map<V: Pod>(&mut self, map: &HashMap<String, V>) -> Result<(), SerializerError> {
        self.write_u32(map.len() as u32)?;
        // Sorted for a deterministic byte stream.
        let mut keys: Vec<_> = map.keys().collect();
        keys.sort();
        for key in keys {
            self.write_string(key)?;
            self.write_all(bytemuck::bytes_of(&map[key]))?;
        }
        Ok(())
    }

    /// Reads a map written by [`Serializer::write_map`].
    fn read_map<V: Pod + Default>(&mut self) -> Result<HashMap<String, V>, SerializerError> {
        let count = self.read_u32()? as usize;
        let mut out = HashMap::with_capacity(count);
        for _ in 0..count {
            let key = self.read_string()?;
            let mut value = V::default();
            self.read_exact(bytemuck::bytes_of_mut(&mut value))?;
            out.insert(key, value);
        }
        Ok(out)
    }

    /// Writes a dense matrix element by element. The majority choice is
    /// part of the on-disk contract and must match on read.
    fn write_matrix(&mut self, m: &DenseMatrix, col_major: bool) -> Result<(), SerializerError> {
        if col_major {
            for col in 0..m.cols() {
                for row in 0..m.rows() {
                    self.write_f32(m.at(row, col))?;
                }
            }
            Ok(())
        } else {
            self.write_pod_slice(m.as_slice(), true)
        }
    }

    /// Reads a dense matrix of known shape.
    fn read_matrix(
        &mut self,
        rows: usize,
        cols: usize,
        col_major: bool,
    ) -> Result<DenseMatrix, SerializerError> {
        let mut m = DenseMatrix::zeros(rows, cols);
        if col_major {
            for col in 0..cols {
                for row in 0..rows {
                    let v = self.read_f32()?;
                    m.set(row, col, v);
                }
            }
        } else {
            self.read_exact(bytemuck::cast_slice_mut(m.as_mut_slice()))?;
        }
        Ok(m)
    }

    /// Emits (or, in read mode, skips) zero bytes until `current_size()`
    /// is a multiple of `alignment`.
    fn write_alignment_pad(&mut self, alignment: usize) -> Result<(), SerializerError> {
        if alignment == 0 {
            return Ok(());
        }
        let defect = self.current_size() % alignment;
        if defect == 0 {
            return Ok(());
        }
        let pad = alignment - defect;
        if self.is_read_mode() {
            let mut sink = [0u8; 16];
            let mut remaining = pad;
            while remaining > 0 {
                let chunk = remaining.min(sink.len());
                self.read_exact(&mut sink[..chunk])?;
                remaining -= chunk;
            }
        } else {
            let zeros = [0u8; 16];
            let mut remaining = pad;
            while remaining > 0 {
                let chunk = remaining.min(zeros.len());
                self.write_all(&zeros[..chunk])?;
                remaining -= chunk;
            }
        }
        Ok(())
    }
}
