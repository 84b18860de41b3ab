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

//! Host-side framebuffers.
//!
//! The beauty output plus every declared AOV, each `width * height * 3`
//! f32 values. Slices handed out stay valid until the next `step`,
//! `reset`, or clear; readers copy if they need longer-lived views.

use std::collections::HashMap;

/// The set of all framebuffers of a runtime.
#[derive(Debug, Default)]
pub struct FramebufferSet {
    width: usize,
    height: usize,
    beauty: Vec<f32>,
    aovs: HashMap<String, Vec<f32>>,
}

impl FramebufferSet {
    /// Allocates the beauty buffer plus one buffer per AOV name.
    pub fn new(width: usize, height: usize, aov_names: &[String]) -> Self {
        let len = width * height * 3;
        let mut aovs = HashMap::new();
        for name in aov_names {
            aovs.insert(name.clone(), vec![0.0; len]);
        }
        Self {
            width,
            height,
            beauty: vec![0.0; len],
            aovs,
        }
    }

    /// Horizontal resolution.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Vertical resolution.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Resizes all buffers, clearing their contents.
    pub fn resize(&mut self, width: usize, height: usize) {
        let len = width * height * 3;
        self.width = width;
        self.height = height;
        self.beauty = vec![0.0; len];
        for buffer in self.aovs.values_mut() {
            *buffer = vec![0.0; len];
        }
    }

    /// A named buffer; the empty name is the beauty output.
    pub fn get(&self, aov: &str) -> Option<&[f32]> {
        if aov.is_empty() {
            Some(&self.beauty)
        } else {
            self.aovs.get(aov).map(Vec::as_slice)
        }
    }

    /// Mutable access to a named buffer.
    pub fn get_mut(&mut self, aov: &str) -> Option<&mut [f32]> {
        if aov.is_empty() {
            Some(&mut self.beauty)
        } else {
            self.aovs.get_mut(aov).map(Vec::as_mut_slice)
        }
    }

    /// All declared AOV names, beauty excluded.
    pub fn aov_names(&self) -> impl Iterator<Item = &str> {
        self.aovs.keys().map(String::as_str)
    }

    /// Zeroes one buffer.
    pub fn clear(&mut self, aov: &str) {
        if let Some(buffer) = self.get_mut(aov) {
            buffer.fill(0.0);
        }
    }

    /// Zeroes every buffer.
    pub fn clear_all(&mut self) {
        self.beauty.fill(0.0);
        for buffer in self.aovs.values_mut() {
            buffer.fill(0.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn beauty_is_the_empty_name() {
        let fb = FramebufferSet::new(4, 2, &["Normals".to_string()]);
        assert_eq!(fb.get("").unwrap().len(), 4 * 2 * 3);
        assert_eq!(fb.get("Normals").unwrap().len(), 4 * 2 * 3);
        assert!(fb.get("Depth").is_none());
    }

    #[test]
    fn clear_zeroes_selectively() {
        let mut fb = FramebufferSet::new(1, 1, &["A".to_string()]);
        fb.get_mut("").unwrap()[0] = 1.0;
        fb.get_mut("A").unwrap()[0] = 2.0;

        fb.clear("A");
        assert_eq!(fb.get("").unwrap()[0], 1.0);
        assert_eq!(fb.get("A").unwrap()[0], 0.0);

        fb.clear_all();
        assert_eq!(fb.get("").unwrap()[0], 0.0);
    }
}
