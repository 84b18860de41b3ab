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

//! The denoiser seam.
//!
//! The actual denoiser is an external collaborator; the runtime only
//! drives it: after an iteration it hands over the accumulated beauty
//! plus the normal and albedo AOVs and writes the result into a side
//! buffer. A failing denoiser is logged and skipped, never fatal.

/// An external denoiser implementation.
pub trait Denoiser {
    /// Denoises `color` into `output`. All buffers are
    /// `width * height * 3`. `iteration` lets implementations scale the
    /// accumulated input.
    fn denoise(
        &mut self,
        color: &[f32],
        normal: &[f32],
        albedo: &[f32],
        output: &mut [f32],
        width: usize,
        height: usize,
        iteration: usize,
    ) -> Result<(), String>;
}

/// AOV names the denoise pass reads and writes.
pub const NORMAL_AOV: &str = "Normals";
/// Albedo input AOV.
pub const ALBEDO_AOV: &str = "Albedo";
/// Output side buffer.
pub const DENOISED_AOV: &str = "Denoised";
