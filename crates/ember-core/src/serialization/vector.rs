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

//! An in-memory serializer backed by a growable byte vector.

use super::{Serializer, SerializerError};

/// A [`Serializer`] over an owned byte buffer.
///
/// In write mode the buffer grows without bound; this is what light
/// embedding and the unit tests use. In read mode the buffer is fixed and
/// reads past the end come back short, exactly like a file at EOF.
pub struct VectorSerializer {
    data: Vec<u8>,
    cursor: usize,
    read_mode: bool,
}

impl VectorSerializer {
    /// Creates an empty stream in write mode.
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            cursor: 0,
            read_mode: false,
        }
    }

    /// Wraps an existing buffer in read mode.
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self {
            data,
            cursor: 0,
            read_mode: true,
        }
    }

    /// Consumes the stream, returning the written bytes.
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    /// The written bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }
}

impl Default for VectorSerializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Serializer for VectorSerializer {
    fn is_read_mode(&self) -> bool {
        self.read_mode
    }

    fn is_valid(&self) -> bool {
        true
    }

    fn current_size(&self) -> usize {
        if self.read_mode {
            self.cursor
        } else {
            self.data.len()
        }
    }

    fn write_raw(&mut self, data: &[u8]) -> Result<usize, SerializerError> {
        self.data.extend_from_slice(data);
        Ok(data.len())
    }

    fn read_raw(&mut self, data: &mut [u8]) -> Result<usize, SerializerError> {
        let remaining = self.data.len() - self.cursor;
        let n = remaining.min(data.len());
        data[..n].copy_from_slice(&self.data[self.cursor..self.cursor + n]);
        self.cursor += n;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::DenseMatrix;
    use std::collections::HashMap;

    #[test]
    fn primitives_round_trip() {
        let mut out = VectorSerializer::new();
        out.write_bool(true).unwrap();
        out.write_i8(-3).unwrap();
        out.write_u16(1234).unwrap();
        out.write_i32(-56789).unwrap();
        out.write_u64(1 << 40).unwrap();
        out.write_f32(0.25).unwrap();
        out.write_f64(-2.5).unwrap();
        out.write_string("klems").unwrap();

        let mut input = VectorSerializer::from_vec(out.into_inner());
        assert!(input.read_bool().unwrap());
        assert_eq!(input.read_i8().unwrap(), -3);
        assert_eq!(input.read_u16().unwrap(), 1234);
        assert_eq!(input.read_i32().unwrap(), -56789);
        assert_eq!(input.read_u64().unwrap(), 1 << 40);
        assert_eq!(input.read_f32().unwrap(), 0.25);
        assert_eq!(input.read_f64().unwrap(), -2.5);
        assert_eq!(input.read_string().unwrap(), "klems");
    }

    #[test]
    fn booleans_take_one_byte() {
        let mut out = VectorSerializer::new();
        out.write_bool(false).unwrap();
        assert_eq!(out.current_size(), 1);
    }

    #[test]
    fn pod_slices_naked_and_prefixed() {
        let values = [1.0f32, 2.0, 3.0];

        let mut naked = VectorSerializer::new();
        naked.write_pod_slice(&values, true).unwrap();
        assert_eq!(naked.current_size(), 12);

        let mut prefixed = VectorSerializer::new();
        prefixed.write_pod_slice(&values, false).unwrap();
        assert_eq!(prefixed.current_size(), 16);

        let mut input = VectorSerializer::from_vec(prefixed.into_inner());
        let back: Vec<f32> = input.read_pod_vec().unwrap();
        assert_eq!(back, values);
    }

    #[test]
    fn maps_round_trip() {
        let mut map = HashMap::new();
        map.insert("width".to_string(), 800u32);
        map.insert("height".to_string(), 600u32);

        let mut out = VectorSerializer::new();
        out.write_map(&map).unwrap();

        let mut input = VectorSerializer::from_vec(out.into_inner());
        let back: HashMap<String, u32> = input.read_map().unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn matrix_majority_is_part_of_the_contract() {
        let mut m = DenseMatrix::zeros(2, 2);
        m.set(0, 1, 1.0);
        m.set(1, 0, 2.0);

        let mut row_major = VectorSerializer::new();
        row_major.write_matrix(&m, false).unwrap();
        let mut input = VectorSerializer::from_vec(row_major.into_inner());
        assert_eq!(input.read_f32().unwrap(), 0.0);
        assert_eq!(input.read_f32().unwrap(), 1.0);

        let mut col_major = VectorSerializer::new();
        col_major.write_matrix(&m, true).unwrap();
        let mut input = VectorSerializer::from_vec(col_major.into_inner());
        assert_eq!(input.read_f32().unwrap(), 0.0);
        assert_eq!(input.read_f32().unwrap(), 2.0);

        let mut out = VectorSerializer::new();
        out.write_matrix(&m, true).unwrap();
        let mut input = VectorSerializer::from_vec(out.into_inner());
        let back = input.read_matrix(2, 2, true).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn alignment_pad_reaches_multiples() {
        for alignment in [2usize, 4, 8, 16] {
            let mut out = VectorSerializer::new();
            out.write_u8(7).unwrap();
            out.write_alignment_pad(alignment).unwrap();
            assert_eq!(out.current_size() % alignment, 0);

            // Padding twice must not add more bytes.
            let before = out.current_size();
            out.write_alignment_pad(alignment).unwrap();
            assert_eq!(out.current_size(), before);
        }
    }

    #[test]
    fn wrong_mode_is_an_error() {
        let mut reader = VectorSerializer::from_vec(vec![0; 4]);
        assert!(matches!(
            reader.write_u32(1),
            Err(SerializerError::WrongMode { read_mode: true })
        ));

        let mut writer = VectorSerializer::new();
        assert!(matches!(
            writer.read_u32(),
            Err(SerializerError::WrongMode { read_mode: false })
        ));
    }
}
