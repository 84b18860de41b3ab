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

//! The seam to the external JIT compiler and its kernels.
//!
//! The runtime hands complete shader scripts to a [`Device`] and later
//! dispatches the compiled kernels. Production backends wrap the real
//! JIT; the [`RecordingDevice`] is the reference implementation used by
//! tests and by front-ends running without a JIT: it memoizes
//! compilation by group id, records every dispatch, and deposits a
//! deterministic pattern into the framebuffer.

use ember_codegen::{CallbackType, GlobalRegistry};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::options::Ray;

/// Handle to a compiled kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KernelId(pub usize);

/// What role a shader group plays in the dispatch loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderRole {
    /// Primary ray emission.
    RayGeneration,
    /// Rays leaving the scene.
    Miss,
    /// Surface interaction of one material.
    Hit {
        /// Material index the shader was specialized for.
        material: usize,
    },
    /// Advanced shadow rays that hit an occluder.
    AdvancedShadowHit,
    /// Advanced shadow rays that reached their light.
    AdvancedShadowMiss,
    /// A technique callback.
    Callback(CallbackType),
}

/// One shader group ready for compilation.
#[derive(Debug, Clone)]
pub struct ShaderGroup {
    /// The role the runtime dispatches this group as.
    pub role: ShaderRole,
    /// The exported entry function.
    pub entry: String,
    /// The complete script.
    pub script: String,
    /// Content hash of (script, entry); identical groups share kernels.
    pub group_id: u64,
}

/// Per-dispatch settings handed to the kernels.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Iteration number.
    pub iteration: usize,
    /// The variant being executed.
    pub variant: usize,
    /// Launch width.
    pub width: usize,
    /// Launch height.
    pub height: usize,
    /// Samples per iteration of this variant.
    pub spi: u32,
    /// GPU device index.
    pub device: u32,
}

/// A failure inside the device seam.
#[derive(Debug)]
pub enum DeviceError {
    /// The JIT rejected a script.
    Compile {
        /// Entry function of the rejected group.
        entry: String,
        /// Compiler diagnostics.
        message: String,
    },
    /// A kernel dispatch failed.
    Execution(String),
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::Compile { entry, message } => {
                write!(f, "Shader '{entry}' failed to compile: {message}")
            }
            DeviceError::Execution(msg) => write!(f, "Kernel execution failed: {msg}"),
        }
    }
}

impl std::error::Error for DeviceError {}

/// The JIT compiler and kernel dispatcher behind the runtime.
pub trait Device {
    /// Compiles one shader group. Implementations memoize on
    /// [`ShaderGroup::group_id`]; identical groups return the same
    /// kernel.
    fn compile(&mut self, group: &ShaderGroup) -> Result<KernelId, DeviceError>;

    /// Executes a compiled kernel. `framebuffer` is the variant's output
    /// buffer, absent when the variant locks the framebuffer or the role
    /// produces no pixels.
    fn execute(
        &mut self,
        kernel: KernelId,
        settings: &DispatchSettings,
        registry: &GlobalRegistry,
        framebuffer: Option<&mut [f32]>,
    ) -> Result<(), DeviceError>;

    /// Uploads the ray list for tracer-mode dispatches.
    fn upload_rays(&mut self, rays: &[Ray]) -> Result<(), DeviceError>;
}

/// One recorded dispatch of the [`RecordingDevice`].
#[derive(Debug, Clone)]
pub struct DispatchRecord {
    /// The role of the dispatched kernel.
    pub role: ShaderRole,
    /// The settings of the dispatch.
    pub settings: DispatchSettings,
    /// `true` when the dispatch had framebuffer access.
    pub wrote_framebuffer: bool,
}

/// The reference device: JIT-free, deterministic, fully observable.
#[derive(Debug, Default)]
pub struct RecordingDevice {
    kernels: Vec<ShaderRole>,
    groups: HashMap<u64, KernelId>,
    dispatches: Vec<DispatchRecord>,
    rays: Vec<Ray>,
}

impl RecordingDevice {
    /// Creates an empty device.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every dispatch so far, in order.
    pub fn dispatches(&self) -> &[DispatchRecord] {
        &self.dispatches
    }

    /// Number of distinct kernels compiled.
    pub fn compiled_kernels(&self) -> usize {
        self.kernels.len()
    }

    /// The uploaded ray list.
    pub fn rays(&self) -> &[Ray] {
        &self.rays
    }

    /// Forgets all recorded dispatches, keeping compiled kernels.
    pub fn clear_records(&mut self) {
        self.dispatches.clear();
    }
}

impl Device for RecordingDevice {
    fn compile(&mut self, group: &ShaderGroup) -> Result<KernelId, DeviceError> {
        if group.script.is_empty() {
            return Err(DeviceError::Compile {
                entry: group.entry.clone(),
                message: "empty script".to_string(),
            });
        }
        if let Some(&id) = self.groups.get(&group.group_id) {
            return Ok(id);
        }
        let id = KernelId(self.kernels.len());
        self.kernels.push(group.role);
        self.groups.insert(group.group_id, id);
        Ok(id)
    }

    fn execute(
        &mut self,
        kernel: KernelId,
        settings: &DispatchSettings,
        _registry: &GlobalRegistry,
        framebuffer: Option<&mut [f32]>,
    ) -> Result<(), DeviceError> {
        let role = *self
            .kernels
            .get(kernel.0)
            .ok_or_else(|| DeviceError::Execution(format!("unknown kernel {kernel:?}")))?;

        let wrote = if let Some(framebuffer) = framebuffer {
            if role == ShaderRole::RayGeneration {
                // One unit of radiance per sample keeps accumulation
                // observable without a real renderer.
                for value in framebuffer.iter_mut() {
                    *value += settings.spi as f32;
                }
            }
            true
        } else {
            false
        };

        self.dispatches.push(DispatchRecord {
            role,
            settings: settings.clone(),
            wrote_framebuffer: wrote,
        });
        Ok(())
    }

    fn upload_rays(&mut self, rays: &[Ray]) -> Result<(), DeviceError> {
        self.rays = rays.to_vec();
        Ok(())
    }
}

/// A cloneable handle over a [`RecordingDevice`], so callers can keep
/// inspecting dispatches after the runtime took ownership of its device.
#[derive(Debug, Clone, Default)]
pub struct SharedRecordingDevice {
    inner: Arc<Mutex<RecordingDevice>>,
}

impl SharedRecordingDevice {
    /// Creates a fresh shared device.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every dispatch so far, in order.
    pub fn dispatches(&self) -> Vec<DispatchRecord> {
        self.lock().dispatches.clone()
    }

    /// Number of distinct kernels compiled.
    pub fn compiled_kernels(&self) -> usize {
        self.lock().compiled_kernels()
    }

    /// Snapshot of the uploaded ray list.
    pub fn rays(&self) -> Vec<Ray> {
        self.lock().rays.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RecordingDevice> {
        self.inner.lock().expect("recording device lock poisoned")
    }
}

impl Device for SharedRecordingDevice {
    fn compile(&mut self, group: &ShaderGroup) -> Result<KernelId, DeviceError> {
        self.lock().compile(group)
    }

    fn execute(
        &mut self,
        kernel: KernelId,
        settings: &DispatchSettings,
        registry: &GlobalRegistry,
        framebuffer: Option<&mut [f32]>,
    ) -> Result<(), DeviceError> {
        self.lock().execute(kernel, settings, registry, framebuffer)
    }

    fn upload_rays(&mut self, rays: &[Ray]) -> Result<(), DeviceError> {
        self.lock().upload_rays(rays)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(role: ShaderRole, script: &str) -> ShaderGroup {
        ShaderGroup {
            role,
            entry: "ig_test".to_string(),
            script: script.to_string(),
            group_id: ember_codegen::shader::ShaderReducer::group_id(script, "ig_test"),
        }
    }

    #[test]
    fn compilation_memoizes_by_group_id() {
        let mut device = RecordingDevice::new();
        let a = device.compile(&group(ShaderRole::Miss, "fn a() {}")).unwrap();
        let b = device.compile(&group(ShaderRole::Miss, "fn a() {}")).unwrap();
        let c = device.compile(&group(ShaderRole::Miss, "fn c() {}")).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(device.compiled_kernels(), 2);
    }

    #[test]
    fn empty_scripts_are_rejected() {
        let mut device = RecordingDevice::new();
        assert!(matches!(
            device.compile(&group(ShaderRole::Miss, "")),
            Err(DeviceError::Compile { .. })
        ));
    }
}
