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

//! Runtime configuration.

use ember_codegen::Target;
use ember_core::math::{Vec2, Vec3};
use std::path::PathBuf;

/// When the denoiser acquires its auxiliary AOV information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DenoiserMode {
    /// Auxiliary AOVs only from the first iteration.
    #[default]
    OnlyFirstIteration,
    /// Refine the auxiliary AOVs every iteration.
    EveryIteration,
}

/// Denoiser configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenoiserSettings {
    /// Enables the denoise pass after each iteration.
    pub enabled: bool,
    /// Follow specular paths instead of only the first bounce for the
    /// auxiliary AOVs.
    pub follow_specular: bool,
    /// Acquisition cadence of the auxiliary AOVs.
    pub mode: DenoiserMode,
}

/// Options fixed at runtime construction.
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    /// JIT compilation target.
    pub target: Target,
    /// GPU device index for GPU targets.
    pub device: u32,
    /// Samples per iteration; zero picks the technique default.
    pub spi: u32,
    /// Loads the scene for the ray-stream tracer front-end.
    pub is_tracer: bool,
    /// Dump every generated shader next to the scene for inspection.
    pub dump_shader: bool,
    /// Dump shaders with all registry lookups baked.
    pub dump_shader_full: bool,
    /// Replaces the scene's film size.
    pub override_film_size: Option<(u32, u32)>,
    /// Extra AOVs requested by the front-end.
    pub enabled_aovs: Vec<String>,
    /// Bake every parameter as a literal, trading steering for speed.
    pub force_specialization: bool,
    /// Where exported resources are cached.
    pub cache_dir: PathBuf,
    /// Replacement directory for the standard-library scripts.
    pub script_dir: Option<PathBuf>,
    /// Denoiser configuration.
    pub denoiser: DenoiserSettings,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            target: Target::default(),
            device: 0,
            spi: 0,
            is_tracer: false,
            dump_shader: false,
            dump_shader_full: false,
            override_film_size: None,
            enabled_aovs: Vec::new(),
            force_specialization: false,
            cache_dir: PathBuf::from("data"),
            script_dir: None,
            denoiser: DenoiserSettings::default(),
        }
    }
}

/// A single ray for the tracer front-end.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    /// Ray origin.
    pub origin: Vec3,
    /// Ray direction, not necessarily normalized.
    pub direction: Vec3,
    /// `(tmin, tmax)` clipping range.
    pub range: Vec2,
}

impl Ray {
    /// A ray with the full positive range.
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction,
            range: Vec2::new(0.0, f32::MAX),
        }
    }
}

/// Settings of the CPU tonemap pass.
#[derive(Debug, Clone)]
pub struct TonemapSettings {
    /// Source AOV; empty selects the beauty output.
    pub aov: String,
    /// Scale applied before tonemapping, usually `1 / iterations`.
    pub scale: f32,
    /// Linear exposure multiplier.
    pub exposure_factor: f32,
    /// Linear exposure offset.
    pub exposure_offset: f32,
    /// Tonemap operator: 0 linear clamp, 1 Reinhard, 2 modified Reinhard.
    pub method: u32,
    /// Apply the sRGB gamma curve on output.
    pub use_gamma: bool,
}

impl Default for TonemapSettings {
    fn default() -> Self {
        Self {
            aov: String::new(),
            scale: 1.0,
            exposure_factor: 1.0,
            exposure_offset: 0.0,
            method: 0,
            use_gamma: true,
        }
    }
}
