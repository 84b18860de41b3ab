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

//! # Ember Runtime
//!
//! The driver that turns generated shaders into pictures: it compiles
//! each shader group through the device seam, executes technique variants
//! in selector order with their callbacks, owns the framebuffers and the
//! runtime parameter registry, and runs the optional denoise pass.
//!
//! Only one runtime may live per process; the JIT compiler behind the
//! device seam keeps process-wide state.

pub mod denoiser;
pub mod device;
pub mod error;
pub mod framebuffer;
pub mod options;
pub mod registry;
pub mod runtime;
pub mod tonemap;

pub use denoiser::Denoiser;
pub use device::{
    Device, DeviceError, DispatchRecord, DispatchSettings, KernelId, RecordingDevice, ShaderGroup,
    ShaderRole, SharedRecordingDevice,
};
pub use error::RuntimeError;
pub use framebuffer::FramebufferSet;
pub use options::{DenoiserMode, DenoiserSettings, Ray, RuntimeOptions, TonemapSettings};
pub use registry::ParameterRegistry;
pub use runtime::Runtime;

pub use ember_codegen::Target;
pub use ember_codegen::camera::CameraOrientation;
