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

//! The runtime driver.
//!
//! Owns the loaded scene, the compiled shader groups, the framebuffers,
//! and the parameter registry, and executes the technique's variants in
//! selector order on every `step`. Exactly one runtime may be alive per
//! process; the JIT behind the device seam keeps process-wide state.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use ember_codegen::camera::{self, CameraOrientation};
use ember_codegen::shader::{self, ShaderReducer};
use ember_codegen::{technique, CallbackType, LoaderContext, TechniqueInfo};
use ember_core::math::{Vec3, Vec4};
use ember_core::scene::{parse_scene_file, parse_scene_string, Scene};

use crate::denoiser::{Denoiser, ALBEDO_AOV, DENOISED_AOV, NORMAL_AOV};
use crate::device::{Device, DispatchSettings, KernelId, ShaderGroup, ShaderRole};
use crate::framebuffer::FramebufferSet;
use crate::options::{DenoiserMode, Ray, RuntimeOptions, TonemapSettings};
use crate::registry::ParameterRegistry;
use crate::tonemap::tonemap_into;
use crate::RuntimeError;

static INSTANCE_ALIVE: AtomicBool = AtomicBool::new(false);

/// Kernels of one compiled technique variant.
struct CompiledVariant {
    ray_generation: KernelId,
    miss: KernelId,
    hits: Vec<KernelId>,
    advanced_shadow: Option<(KernelId, KernelId)>,
    callbacks: [Option<KernelId>; 2],
}

struct LoadedState {
    ctx: LoaderContext,
    info: TechniqueInfo,
    technique_type: String,
    denoiser_support: bool,
    variants: Vec<CompiledVariant>,
    registry: ParameterRegistry,
    framebuffers: FramebufferSet,
    iteration: usize,
    sample_count: usize,
    spi: u32,
    initial_camera: CameraOrientation,
}

/// The rendering runtime.
pub struct Runtime {
    options: RuntimeOptions,
    device: Box<dyn Device>,
    denoiser: Option<Box<dyn Denoiser>>,
    state: Option<LoadedState>,
}

impl Runtime {
    /// Creates the runtime. Fails when another runtime is alive in this
    /// process.
    pub fn new(options: RuntimeOptions, device: Box<dyn Device>) -> Result<Self, RuntimeError> {
        if INSTANCE_ALIVE
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            log::error!("Trying to create multiple runtime instances!");
            return Err(RuntimeError::AlreadyRunning);
        }

        Ok(Self {
            options,
            device,
            denoiser: None,
            state: None,
        })
    }

    /// Attaches an external denoiser implementation.
    pub fn set_denoiser(&mut self, denoiser: Box<dyn Denoiser>) {
        self.denoiser = Some(denoiser);
    }

    /// Loads a scene file from disk.
    pub fn load_from_file(&mut self, path: &Path) -> Result<(), RuntimeError> {
        let scene = parse_scene_file(path)?;
        self.load_from_scene(scene)
    }

    /// Loads a scene from a JSON string; relative resource paths resolve
    /// against `dir`.
    pub fn load_from_string(&mut self, source: &str, dir: &Path) -> Result<(), RuntimeError> {
        let scene = parse_scene_string(source, dir)?;
        self.load_from_scene(scene)
    }

    /// Loads an already parsed scene: generates all shader groups,
    /// compiles them through the device, and allocates framebuffers.
    pub fn load_from_scene(&mut self, scene: Scene) -> Result<(), RuntimeError> {
        let spi = if self.options.spi == 0 { 1 } else { self.options.spi };

        let (width, height) = self.film_size(&scene);

        let mut ctx = LoaderContext::new(scene, self.options.target, &self.options.cache_dir);
        ctx.device = self.options.device;
        ctx.samples_per_iteration = spi;
        ctx.is_tracer = self.options.is_tracer;
        ctx.force_specialization =
            self.options.force_specialization || self.options.dump_shader_full;
        if let Some(film) = &ctx.scene.film {
            ctx.pixel_sampler = film.string_property("sampler", "uniform").to_string();
        }

        let technique = technique::create(&ctx);
        let info = technique.info(&ctx);
        let technique_type = technique.type_name().to_string();
        let denoiser_support = technique.has_denoiser_support();

        let initial_camera = camera::initial_orientation(&ctx);
        camera::register_orientation(&mut ctx, &initial_camera);

        // Compile every variant's shader groups, shared by group id.
        let mut reducer = ShaderReducer::new();
        let mut kernel_cache: HashMap<u64, KernelId> = HashMap::new();
        let mut variants = Vec::with_capacity(info.variants.len());

        for v in 0..info.variants.len() {
            ctx.current_variant = v;
            let variant = &info.variants[v];

            let ray_generation_script = match &variant.override_camera_generator {
                Some(generator) => generator(&mut ctx),
                None => shader::setup_ray_generation_shader(&mut ctx, variant)?,
            };
            let ray_generation = self.compile(
                &mut reducer,
                &mut kernel_cache,
                ShaderRole::RayGeneration,
                "ig_ray_generation_shader",
                &format!("v{v}_ray_generation"),
                ray_generation_script,
            )?;

            let miss_script = shader::setup_miss_shader(&mut ctx, technique.as_ref(), variant)?;
            let miss = self.compile(
                &mut reducer,
                &mut kernel_cache,
                ShaderRole::Miss,
                "ig_miss_shader",
                &format!("v{v}_miss"),
                miss_script,
            )?;

            let mut hits = Vec::with_capacity(ctx.materials.len());
            for material_id in 0..ctx.materials.len() {
                let script =
                    shader::setup_hit_shader(&mut ctx, technique.as_ref(), variant, material_id)?;
                hits.push(self.compile(
                    &mut reducer,
                    &mut kernel_cache,
                    ShaderRole::Hit {
                        material: material_id,
                    },
                    "ig_hit_shader",
                    &format!("v{v}_hit_{material_id}"),
                    script,
                )?);
            }

            let advanced_shadow = if variant.shadow_handling_mode.is_advanced() {
                let hit_script = shader::setup_advanced_shadow_shader(
                    &mut ctx,
                    technique.as_ref(),
                    variant,
                    true,
                )?;
                let miss_script = shader::setup_advanced_shadow_shader(
                    &mut ctx,
                    technique.as_ref(),
                    variant,
                    false,
                )?;
                Some((
                    self.compile(
                        &mut reducer,
                        &mut kernel_cache,
                        ShaderRole::AdvancedShadowHit,
                        "ig_advanced_shadow_shader",
                        &format!("v{v}_shadow_hit"),
                        hit_script,
                    )?,
                    self.compile(
                        &mut reducer,
                        &mut kernel_cache,
                        ShaderRole::AdvancedShadowMiss,
                        "ig_advanced_shadow_shader",
                        &format!("v{v}_shadow_miss"),
                        miss_script,
                    )?,
                ))
            } else {
                None
            };

            let mut callbacks = [None, None];
            for which in [CallbackType::BeforeIteration, CallbackType::AfterIteration] {
                if let Some(script) = shader::generate_callback(&info, v, which, &mut ctx) {
                    callbacks[which as usize] = Some(self.compile(
                        &mut reducer,
                        &mut kernel_cache,
                        ShaderRole::Callback(which),
                        "ig_callback_shader",
                        &format!("v{v}_callback_{}", which as usize),
                        script,
                    )?);
                }
            }

            variants.push(CompiledVariant {
                ray_generation,
                miss,
                hits,
                advanced_shadow,
                callbacks,
            });
        }

        log::info!(
            "Compiled {} shader groups ({} unique) for technique '{technique_type}'",
            reducer.entry_count(),
            reducer.unique_count()
        );

        // Framebuffers: beauty plus technique, front-end, and denoiser
        // AOVs.
        let mut aov_names = info.enabled_aovs.clone();
        aov_names.extend(self.options.enabled_aovs.iter().cloned());
        if self.options.denoiser.enabled && denoiser_support {
            for name in [NORMAL_AOV, ALBEDO_AOV, DENOISED_AOV] {
                aov_names.push(name.to_string());
            }
        }
        aov_names.sort();
        aov_names.dedup();

        let registry = ParameterRegistry::new(ctx.registry.clone());
        self.state = Some(LoadedState {
            ctx,
            info,
            technique_type,
            denoiser_support,
            variants,
            registry,
            framebuffers: FramebufferSet::new(width as usize, height as usize, &aov_names),
            iteration: 0,
            sample_count: 0,
            spi,
            initial_camera,
        });
        Ok(())
    }

    /// Renders one iteration: runs the selected variants in order with
    /// their callbacks, then the denoise pass when configured.
    pub fn step(&mut self, ignore_denoiser: bool) -> Result<(), RuntimeError> {
        self.step_impl()?;
        if !ignore_denoiser {
            self.run_denoiser();
        }
        Ok(())
    }

    fn step_impl(&mut self) -> Result<(), RuntimeError> {
        let state = self.state.as_mut().ok_or(RuntimeError::NotLoaded)?;
        let device = self.device.as_mut();

        let snapshot = state.registry.snapshot();
        let iteration = state.iteration;
        let selection = state.info.variant_selection(iteration);

        for &v in &selection {
            if v >= state.variants.len() {
                log::warn!("Variant selector returned invalid variant {v}, skipping");
                continue;
            }
            let variant = &state.info.variants[v];
            let compiled = &state.variants[v];

            let settings = DispatchSettings {
                iteration,
                variant: v,
                width: variant
                    .override_width
                    .unwrap_or_else(|| state.framebuffers.width()),
                height: variant
                    .override_height
                    .unwrap_or_else(|| state.framebuffers.height()),
                spi: variant.override_spi.unwrap_or(state.spi),
                device: self.options.device,
            };

            if let Some(kernel) = compiled.callbacks[CallbackType::BeforeIteration as usize] {
                device.execute(kernel, &settings, &snapshot, None)?;
            }

            let framebuffer = if variant.lock_framebuffer {
                None
            } else {
                state.framebuffers.get_mut("")
            };
            device.execute(compiled.ray_generation, &settings, &snapshot, framebuffer)?;

            device.execute(compiled.miss, &settings, &snapshot, None)?;
            for &kernel in &compiled.hits {
                device.execute(kernel, &settings, &snapshot, None)?;
            }
            if let Some((shadow_hit, shadow_miss)) = compiled.advanced_shadow {
                device.execute(shadow_hit, &settings, &snapshot, None)?;
                device.execute(shadow_miss, &settings, &snapshot, None)?;
            }

            if let Some(kernel) = compiled.callbacks[CallbackType::AfterIteration as usize] {
                device.execute(kernel, &settings, &snapshot, None)?;
            }
        }

        state.iteration += 1;
        state.sample_count += state.spi as usize;
        Ok(())
    }

    fn run_denoiser(&mut self) {
        let Some(state) = self.state.as_mut() else {
            return;
        };
        let Some(denoiser) = self.denoiser.as_mut() else {
            return;
        };
        if !self.options.denoiser.enabled || !state.denoiser_support {
            return;
        }
        // Iteration already advanced; the first iteration is 1 here.
        let first_iteration = state.iteration == 1;
        if self.options.denoiser.mode == DenoiserMode::OnlyFirstIteration && !first_iteration {
            return;
        }

        let width = state.framebuffers.width();
        let height = state.framebuffers.height();
        let color = match state.framebuffers.get("") {
            Some(buffer) => buffer.to_vec(),
            None => return,
        };
        let normal = state
            .framebuffers
            .get(NORMAL_AOV)
            .map(<[f32]>::to_vec)
            .unwrap_or_else(|| vec![0.0; color.len()]);
        let albedo = state
            .framebuffers
            .get(ALBEDO_AOV)
            .map(<[f32]>::to_vec)
            .unwrap_or_else(|| vec![0.0; color.len()]);

        let Some(output) = state.framebuffers.get_mut(DENOISED_AOV) else {
            return;
        };
        if let Err(message) = denoiser.denoise(
            &color,
            &normal,
            &albedo,
            output,
            width,
            height,
            state.iteration,
        ) {
            // Denoising is best effort; the beauty output stays usable.
            log::warn!("Denoiser failed: {message}");
        }
    }

    /// Traces an explicit list of rays and returns the per-ray radiance
    /// buffer (`rays.len() * 3` floats). Tracer-mode runtimes only.
    pub fn trace(&mut self, rays: &[Ray]) -> Result<&[f32], RuntimeError> {
        if !self.options.is_tracer {
            return Err(RuntimeError::NotATracer);
        }
        {
            let state = self.state.as_mut().ok_or(RuntimeError::NotLoaded)?;
            if state.framebuffers.width() != rays.len() || state.framebuffers.height() != 1 {
                state.framebuffers.resize(rays.len(), 1);
            }
            // Each call returns one iteration's radiance only.
            state.framebuffers.clear("");
            self.device.upload_rays(rays)?;
        }

        self.step_impl()?;

        let state = self.state.as_ref().expect("checked above");
        Ok(state.framebuffers.get("").expect("beauty always exists"))
    }

    /// Clears all framebuffers and restarts the iteration counter.
    pub fn reset(&mut self) {
        if let Some(state) = self.state.as_mut() {
            state.iteration = 0;
            state.sample_count = 0;
            state.framebuffers.clear_all();
        }
    }

    /// A framebuffer slice; the empty name is the beauty output. The
    /// slice stays valid until the next `step`, `reset`, or clear.
    pub fn framebuffer(&self, aov: &str) -> Option<&[f32]> {
        self.state.as_ref()?.framebuffers.get(aov)
    }

    /// Zeroes one framebuffer, or all of them when `aov` is `None`.
    pub fn clear_framebuffer(&mut self, aov: Option<&str>) {
        if let Some(state) = self.state.as_mut() {
            match aov {
                Some(aov) => state.framebuffers.clear(aov),
                None => state.framebuffers.clear_all(),
            }
        }
    }

    /// Overrides an integer parameter in the global registry.
    pub fn set_parameter_integer(&self, name: &str, value: i32) -> Result<(), RuntimeError> {
        self.registry()?.set_integer(name, value)
    }

    /// Overrides a float parameter in the global registry.
    pub fn set_parameter_number(&self, name: &str, value: f32) -> Result<(), RuntimeError> {
        self.registry()?.set_number(name, value)
    }

    /// Overrides a vector parameter in the global registry.
    pub fn set_parameter_vec3(&self, name: &str, value: Vec3) -> Result<(), RuntimeError> {
        self.registry()?.set_vec3(name, value)
    }

    /// Overrides a four-component parameter in the global registry.
    pub fn set_parameter_vec4(&self, name: &str, value: Vec4) -> Result<(), RuntimeError> {
        self.registry()?.set_vec4(name, value)
    }

    /// Writes a camera orientation into the three global camera vectors.
    pub fn set_camera_orientation(
        &self,
        orientation: &CameraOrientation,
    ) -> Result<(), RuntimeError> {
        let registry = self.registry()?;
        registry.set_vec3(camera::CAMERA_EYE_KEY, orientation.eye)?;
        registry.set_vec3(camera::CAMERA_DIR_KEY, orientation.dir)?;
        registry.set_vec3(camera::CAMERA_UP_KEY, orientation.up)
    }

    /// Tonemaps an AOV into a caller-provided RGBA8 buffer of
    /// `width * height` pixels.
    pub fn tonemap(&self, output: &mut [u32], settings: &TonemapSettings) -> Result<(), RuntimeError> {
        let state = self.state.as_ref().ok_or(RuntimeError::NotLoaded)?;
        let expected = state.framebuffers.width() * state.framebuffers.height();
        if output.len() != expected {
            return Err(RuntimeError::BufferSize {
                expected,
                got: output.len(),
            });
        }
        let input = state
            .framebuffers
            .get(&settings.aov)
            .ok_or_else(|| RuntimeError::NoSuchParameter {
                name: settings.aov.clone(),
            })?;
        tonemap_into(input, output, settings);
        Ok(())
    }

    /// The camera orientation derived from the scene at load time.
    pub fn initial_camera_orientation(&self) -> Option<CameraOrientation> {
        self.state.as_ref().map(|s| s.initial_camera)
    }

    /// Iterations rendered since the last reset.
    pub fn iteration_count(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.iteration)
    }

    /// Samples per pixel accumulated since the last reset.
    pub fn sample_count(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.sample_count)
    }

    /// Framebuffer width.
    pub fn width(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.framebuffers.width())
    }

    /// Framebuffer height.
    pub fn height(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.framebuffers.height())
    }

    /// Samples per iteration.
    pub fn samples_per_iteration(&self) -> u32 {
        self.state.as_ref().map_or(0, |s| s.spi)
    }

    /// The loaded technique's type string.
    pub fn technique_type(&self) -> Option<&str> {
        self.state.as_ref().map(|s| s.technique_type.as_str())
    }

    /// The loader context of the loaded scene.
    pub fn context(&self) -> Option<&LoaderContext> {
        self.state.as_ref().map(|s| &s.ctx)
    }

    fn registry(&self) -> Result<&ParameterRegistry, RuntimeError> {
        self.state
            .as_ref()
            .map(|s| &s.registry)
            .ok_or(RuntimeError::NotLoaded)
    }

    fn film_size(&self, scene: &Scene) -> (u32, u32) {
        if self.options.is_tracer {
            return (1, 1);
        }
        if let Some((w, h)) = self.options.override_film_size {
            return (w, h);
        }
        if let Some(film) = &scene.film {
            if let Some(ember_core::Property::Vec2(size)) = film.property("size") {
                return (size.x as u32, size.y as u32);
            }
        }
        (800, 600)
    }

    fn compile(
        &mut self,
        reducer: &mut ShaderReducer,
        cache: &mut HashMap<u64, KernelId>,
        role: ShaderRole,
        entry: &str,
        label: &str,
        script: String,
    ) -> Result<KernelId, RuntimeError> {
        let group_id = reducer.register_group(label, &script, entry);

        if self.options.dump_shader || self.options.dump_shader_full {
            let path = self.options.cache_dir.join(format!("shader_{label}.art"));
            if let Err(err) = std::fs::create_dir_all(&self.options.cache_dir)
                .and_then(|_| std::fs::write(&path, &script))
            {
                log::warn!("Could not dump shader to {}: {err}", path.display());
            }
        }

        if let Some(&kernel) = cache.get(&group_id) {
            return Ok(kernel);
        }
        let kernel = self.device.compile(&ShaderGroup {
            role,
            entry: entry.to_string(),
            script,
            group_id,
        })?;
        cache.insert(group_id, kernel);
        Ok(kernel)
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        INSTANCE_ALIVE.store(false, Ordering::SeqCst);
    }
}
