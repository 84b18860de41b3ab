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

//! End-to-end scenarios over the recording device.
//!
//! Only one runtime may live per process, so every test takes the shared
//! lock for the lifetime of its runtime.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, OnceLock};

use ember_codegen::CallbackType;
use ember_runtime::{
    RecordingDevice, Runtime, RuntimeError, RuntimeOptions, ShaderRole, SharedRecordingDevice,
};

fn runtime_lock() -> MutexGuard<'static, ()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    match LOCK.get_or_init(|| Mutex::new(())).lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn options(cache: &Path) -> RuntimeOptions {
    RuntimeOptions {
        cache_dir: cache.to_path_buf(),
        ..Default::default()
    }
}

/// A diffuse sphere under an area light, rendered with the path tracer.
const DIFFUSE_SPHERE: &str = r#"{
    "camera": { "type": "perspective", "fov": 40,
                "transform": { "position": [0, 0, -10] } },
    "technique": { "type": "path", "max_depth": 4, "min_depth": 0, "nee": true },
    "film": { "size": [32, 16] },
    "bsdfs": [
        { "name": "gray", "type": "diffuse", "reflectance": [0.8, 0.8, 0.8] },
        { "name": "emit", "type": "diffuse", "reflectance": [0, 0, 0] }
    ],
    "shapes": [
        { "name": "ball", "type": "sphere", "radius": 4 },
        { "name": "panel", "type": "rectangle", "width": 4, "height": 4 }
    ],
    "entities": [
        { "name": "sphere", "shape": "ball", "bsdf": "gray" },
        { "name": "lamp", "shape": "panel", "bsdf": "emit",
          "transform": { "position": [0, 8, 0] } }
    ],
    "lights": [
        { "name": "area", "type": "area", "entity": "lamp", "radiance": [10, 10, 10] }
    ]
}"#;

#[test]
fn diffuse_sphere_renders_without_artifacts() {
    let _guard = runtime_lock();
    let dir = tempfile::tempdir().unwrap();

    let mut runtime = Runtime::new(options(dir.path()), Box::new(RecordingDevice::new())).unwrap();
    runtime
        .load_from_string(DIFFUSE_SPHERE, dir.path())
        .unwrap();

    assert_eq!((runtime.width(), runtime.height()), (32, 16));
    assert_eq!(runtime.technique_type(), Some("path"));

    // 64 samples, one per iteration.
    for _ in 0..64 {
        runtime.step(false).unwrap();
    }
    assert_eq!(runtime.iteration_count(), 64);
    assert_eq!(runtime.sample_count(), 64);

    let beauty = runtime.framebuffer("").unwrap();
    assert_eq!(beauty.len(), 32 * 16 * 3);

    let mut sum = 0.0f64;
    for &v in beauty {
        assert!(v.is_finite(), "framebuffer must stay finite");
        assert!(v >= 0.0, "no negative radiance");
        sum += v as f64;
    }
    let average = sum / beauty.len() as f64;
    assert!(average > 0.0, "expected non-zero average luminance");
}

#[test]
fn missing_inner_bsdf_degrades_to_error_material() {
    let _guard = runtime_lock();
    let dir = tempfile::tempdir().unwrap();

    let scene = r#"{
        "technique": { "type": "path" },
        "film": { "size": [4, 4] },
        "bsdfs": [
            { "name": "broken", "type": "blend", "first": "ghost_a", "second": "ghost_b" }
        ],
        "shapes": [ { "name": "panel", "type": "rectangle" } ],
        "entities": [ { "name": "wall", "shape": "panel", "bsdf": "broken" } ]
    }"#;

    let mut runtime = Runtime::new(options(dir.path()), Box::new(RecordingDevice::new())).unwrap();
    // Loading (and thus compilation) succeeds; the material renders in
    // the error color instead of aborting.
    runtime.load_from_string(scene, dir.path()).unwrap();
    runtime.step(false).unwrap();
}

#[test]
fn photon_mapping_runs_both_passes_with_hooks() {
    let _guard = runtime_lock();
    let dir = tempfile::tempdir().unwrap();

    let scene = r#"{
        "technique": { "type": "ppm", "photons": 1000, "max_light_depth": 4 },
        "film": { "size": [8, 8] },
        "bsdfs": [ { "name": "gray", "type": "diffuse" } ],
        "shapes": [ { "name": "panel", "type": "rectangle" } ],
        "entities": [ { "name": "wall", "shape": "panel", "bsdf": "gray" } ],
        "lights": [ { "name": "spot", "type": "point", "position": [0, 4, 0] } ]
    }"#;

    let device = SharedRecordingDevice::new();
    let mut runtime = Runtime::new(options(dir.path()), Box::new(device.clone())).unwrap();
    runtime.load_from_string(scene, dir.path()).unwrap();
    runtime.step(false).unwrap();

    let records = device.dispatches();

    // Iteration 0 selects both passes, in order.
    let variants: Vec<usize> = records.iter().map(|r| r.settings.variant).collect();
    let first_gather = variants.iter().position(|&v| v == 1).unwrap();
    assert!(variants[..first_gather].iter().all(|&v| v == 0));
    assert!(variants[first_gather..].iter().all(|&v| v == 1));

    // The before-iteration hook runs once per pass (reset, then build).
    let before_hooks: Vec<usize> = records
        .iter()
        .filter(|r| matches!(r.role, ShaderRole::Callback(CallbackType::BeforeIteration)))
        .map(|r| r.settings.variant)
        .collect();
    assert_eq!(before_hooks, vec![0, 1]);

    // Within each pass: hook strictly before the kernels.
    for variant in [0usize, 1] {
        let roles: Vec<&ShaderRole> = records
            .iter()
            .filter(|r| r.settings.variant == variant)
            .map(|r| &r.role)
            .collect();
        assert!(matches!(
            roles[0],
            ShaderRole::Callback(CallbackType::BeforeIteration)
        ));
        assert!(matches!(roles[1], ShaderRole::RayGeneration));
    }

    // Pass 0 emits photons at photon-count width with a locked
    // framebuffer; pass 1 renders the real film.
    let emission = records
        .iter()
        .find(|r| r.settings.variant == 0 && r.role == ShaderRole::RayGeneration)
        .unwrap();
    assert_eq!(emission.settings.width, 1000);
    assert_eq!(emission.settings.height, 1);
    assert_eq!(emission.settings.spi, 1);
    assert!(!emission.wrote_framebuffer);

    let gather = records
        .iter()
        .find(|r| r.settings.variant == 1 && r.role == ShaderRole::RayGeneration)
        .unwrap();
    assert_eq!(gather.settings.width, 8);
    assert_eq!(gather.settings.height, 8);
    assert!(gather.wrote_framebuffer);
}

#[test]
fn parameter_overrides_follow_the_registry_contract() {
    let _guard = runtime_lock();
    let dir = tempfile::tempdir().unwrap();

    let scene = r#"{
        "technique": { "type": "path", "max_depth": 8, "clamp": 0 },
        "film": { "size": [4, 4] }
    }"#;

    let mut runtime = Runtime::new(options(dir.path()), Box::new(RecordingDevice::new())).unwrap();
    runtime.load_from_string(scene, dir.path()).unwrap();

    // clamp was zero with the Zero option: never registered, so an
    // override is rejected.
    assert!(matches!(
        runtime.set_parameter_number("__tech_clamp", 2.5),
        Err(RuntimeError::NoSuchParameter { .. })
    ));

    // max_depth is dynamic: present and overridable.
    runtime.set_parameter_integer("__tech_max_depth", 2).unwrap();
    assert!(matches!(
        runtime.set_parameter_number("__tech_max_depth", 2.0),
        Err(RuntimeError::WrongParameterType { .. })
    ));

    runtime.step(false).unwrap();
}

#[test]
fn dynamic_clamp_declares_a_registry_slot() {
    let _guard = runtime_lock();
    let dir = tempfile::tempdir().unwrap();

    let scene = r#"{
        "technique": { "type": "path", "clamp": 2.5 },
        "film": { "size": [4, 4] }
    }"#;

    let mut runtime = Runtime::new(options(dir.path()), Box::new(RecordingDevice::new())).unwrap();
    runtime.load_from_string(scene, dir.path()).unwrap();

    // A non-zero clamp registers globally and accepts overrides.
    runtime.set_parameter_number("__tech_clamp", 1.0).unwrap();
}

#[test]
fn camera_orientation_parameters_are_writable() {
    let _guard = runtime_lock();
    let dir = tempfile::tempdir().unwrap();

    let mut runtime = Runtime::new(options(dir.path()), Box::new(RecordingDevice::new())).unwrap();
    runtime
        .load_from_string(DIFFUSE_SPHERE, dir.path())
        .unwrap();

    let mut orientation = runtime.initial_camera_orientation().unwrap();
    assert_eq!(orientation.eye.z, -10.0);

    orientation.eye.z = -20.0;
    runtime.set_camera_orientation(&orientation).unwrap();
}

#[test]
fn tracer_mode_returns_per_ray_radiance() {
    let _guard = runtime_lock();
    let dir = tempfile::tempdir().unwrap();

    let mut opts = options(dir.path());
    opts.is_tracer = true;

    let device = SharedRecordingDevice::new();
    let mut runtime = Runtime::new(opts, Box::new(device.clone())).unwrap();
    runtime
        .load_from_string(DIFFUSE_SPHERE, dir.path())
        .unwrap();

    use ember_core::math::Vec3;
    let rays = vec![
        ember_runtime::Ray::new(Vec3::new(0.0, 0.0, -10.0), Vec3::Z),
        ember_runtime::Ray::new(Vec3::new(1.0, 0.0, -10.0), Vec3::Z),
        ember_runtime::Ray::new(Vec3::new(2.0, 0.0, -10.0), Vec3::Z),
    ];

    let data = runtime.trace(&rays).unwrap();
    assert_eq!(data.len(), rays.len() * 3);
    assert!(data.iter().all(|&v| v == 1.0));

    // A second call returns fresh per-iteration radiance, not an
    // accumulation.
    let data = runtime.trace(&rays).unwrap();
    assert!(data.iter().all(|&v| v == 1.0));

    assert_eq!(device.rays().len(), 3);

    // A non-tracer runtime rejects trace calls.
    drop(runtime);
    let mut plain = Runtime::new(options(dir.path()), Box::new(RecordingDevice::new())).unwrap();
    plain
        .load_from_string(DIFFUSE_SPHERE, dir.path())
        .unwrap();
    assert!(matches!(plain.trace(&rays), Err(RuntimeError::NotATracer)));
}

#[test]
fn second_runtime_construction_fails() {
    let _guard = runtime_lock();

    let first = Runtime::new(RuntimeOptions::default(), Box::new(RecordingDevice::new())).unwrap();
    match Runtime::new(RuntimeOptions::default(), Box::new(RecordingDevice::new())) {
        Err(RuntimeError::AlreadyRunning) => {}
        other => panic!("expected AlreadyRunning, got {:?}", other.is_ok()),
    }
    drop(first);

    // The slot frees once the first runtime is gone.
    let _second = Runtime::new(RuntimeOptions::default(), Box::new(RecordingDevice::new())).unwrap();
}

#[test]
fn tonemap_checks_the_output_size() {
    let _guard = runtime_lock();
    let dir = tempfile::tempdir().unwrap();

    let mut runtime = Runtime::new(options(dir.path()), Box::new(RecordingDevice::new())).unwrap();
    runtime
        .load_from_string(DIFFUSE_SPHERE, dir.path())
        .unwrap();
    runtime.step(false).unwrap();

    let mut wrong = vec![0u32; 7];
    assert!(matches!(
        runtime.tonemap(&mut wrong, &Default::default()),
        Err(RuntimeError::BufferSize { .. })
    ));

    let mut output = vec![0u32; 32 * 16];
    runtime.tonemap(&mut output, &Default::default()).unwrap();
    assert!(output.iter().all(|&px| px >> 24 == 0xFF));
    assert!(output.iter().any(|&px| px & 0x00FF_FFFF != 0));
}

#[test]
fn reset_clears_accumulation() {
    let _guard = runtime_lock();
    let dir = tempfile::tempdir().unwrap();

    let mut runtime = Runtime::new(options(dir.path()), Box::new(RecordingDevice::new())).unwrap();
    runtime
        .load_from_string(DIFFUSE_SPHERE, dir.path())
        .unwrap();

    runtime.step(false).unwrap();
    assert!(runtime.framebuffer("").unwrap().iter().any(|&v| v != 0.0));

    runtime.reset();
    assert_eq!(runtime.iteration_count(), 0);
    assert!(runtime.framebuffer("").unwrap().iter().all(|&v| v == 0.0));
}

// Keep the dispatch-order checks close to the scheduling logic they pin.
#[test]
fn variant_scheduling_is_observable_through_dispatch_settings() {
    let _guard = runtime_lock();
    let dir = tempfile::tempdir().unwrap();

    let scene = r#"{
        "technique": { "type": "ppm", "photons": 1000 },
        "film": { "size": [8, 8] },
        "bsdfs": [ { "name": "gray", "type": "diffuse" } ],
        "shapes": [ { "name": "panel", "type": "rectangle" } ],
        "entities": [ { "name": "wall", "shape": "panel", "bsdf": "gray" } ],
        "lights": [ { "name": "spot", "type": "point", "position": [0, 4, 0] } ]
    }"#;

    let mut runtime = Runtime::new(options(dir.path()), Box::new(RecordingDevice::new())).unwrap();
    runtime.load_from_string(scene, dir.path()).unwrap();
    runtime.step(false).unwrap();

    // The emission pass locks the framebuffer, so after one iteration
    // only the gather pass contributed to the beauty output: exactly one
    // sample of accumulation.
    let beauty = runtime.framebuffer("").unwrap();
    assert!(beauty.iter().all(|&v| v == 1.0));
}
