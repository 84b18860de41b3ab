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

//! Camera plugins.
//!
//! The camera orientation always comes from three global registry
//! vectors, so interactive front-ends can steer without respecialization.

use std::sync::OnceLock;

use ember_core::math::Vec3;
use ember_core::{Mat4, SceneObject};

use crate::context::LoaderContext;
use crate::registry::PluginRegistry;
use crate::GenerateError;

/// The three registry keys carrying the camera orientation.
pub const CAMERA_EYE_KEY: &str = "__camera_eye";
/// Camera view direction registry key.
pub const CAMERA_DIR_KEY: &str = "__camera_dir";
/// Camera up vector registry key.
pub const CAMERA_UP_KEY: &str = "__camera_up";

/// Initial eye/dir/up triple of a camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraOrientation {
    /// Eye position.
    pub eye: Vec3,
    /// View direction.
    pub dir: Vec3,
    /// Up vector.
    pub up: Vec3,
}

impl Default for CameraOrientation {
    fn default() -> Self {
        Self {
            eye: Vec3::ZERO,
            dir: Vec3::Z,
            up: Vec3::Y,
        }
    }
}

/// Derives the initial orientation from the scene's camera transform.
pub fn initial_orientation(ctx: &LoaderContext) -> CameraOrientation {
    let Some(camera) = &ctx.scene.camera else {
        return CameraOrientation::default();
    };
    let transform = camera
        .property("transform")
        .map_or(Mat4::IDENTITY, |p| p.transform_or(Mat4::IDENTITY));

    CameraOrientation {
        eye: transform.transform_point(Vec3::ZERO),
        dir: transform.transform_direction(Vec3::Z).normalize(),
        up: transform.transform_direction(Vec3::Y).normalize(),
    }
}

/// Seeds the registry with the camera orientation.
pub fn register_orientation(ctx: &mut LoaderContext, orientation: &CameraOrientation) {
    ctx.registry
        .vec3_parameters
        .insert(CAMERA_EYE_KEY.to_string(), orientation.eye);
    ctx.registry
        .vec3_parameters
        .insert(CAMERA_DIR_KEY.to_string(), orientation.dir);
    ctx.registry
        .vec3_parameters
        .insert(CAMERA_UP_KEY.to_string(), orientation.up);
}

type CameraFactory = fn(&SceneObject, &LoaderContext, &mut String) -> Result<(), GenerateError>;

fn registry() -> &'static PluginRegistry<CameraFactory> {
    static REGISTRY: OnceLock<PluginRegistry<CameraFactory>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut registry = PluginRegistry::new();
        registry.register(&["perspective"], serialize_perspective as CameraFactory);
        registry.register(
            &["orthogonal", "orthographic"],
            serialize_orthogonal as CameraFactory,
        );
        registry.register(&["fisheye", "fishlens"], serialize_fisheye as CameraFactory);
        registry
    })
}

const ORIENTATION_HEADER: &str = "  let camera_eye = registry::get_global_parameter_vec3(\"__camera_eye\", make_vec3(0, 0, 0));\n  let camera_dir = registry::get_global_parameter_vec3(\"__camera_dir\", make_vec3(0, 0, 1));\n  let camera_up = registry::get_global_parameter_vec3(\"__camera_up\", make_vec3(0, 1, 0));\n";

/// Generates the `camera` binding for the scene camera. Unknown or
/// missing camera types fall back to a perspective camera.
pub fn generate(ctx: &LoaderContext, stream: &mut String) -> Result<(), GenerateError> {
    let default = SceneObject::new(
        ember_core::ObjectKind::Camera,
        "__camera",
        "perspective",
        std::path::Path::new("."),
    );
    let camera = ctx.scene.camera.as_ref().unwrap_or(&default);

    match registry().lookup(camera.plugin_type()) {
        Some(factory) => factory(camera, ctx, stream),
        None => {
            log::error!(
                "Camera has unknown type '{}', falling back to perspective",
                camera.plugin_type()
            );
            serialize_perspective(camera, ctx, stream)
        }
    }
}

fn serialize_perspective(
    camera: &SceneObject,
    _ctx: &LoaderContext,
    stream: &mut String,
) -> Result<(), GenerateError> {
    let fov = camera.number_property("fov", 60.0);
    let near = camera.number_property("near_clip", 0.01);
    let far = camera.number_property("far_clip", 10000.0);

    stream.push_str(ORIENTATION_HEADER);
    stream.push_str(&format!(
        "  let camera = make_perspective_camera(camera_eye, camera_dir, camera_up, rad({fov:?}), settings.width, settings.height, {near:?}, {far:?});\n"
    ));
    Ok(())
}

fn serialize_orthogonal(
    camera: &SceneObject,
    _ctx: &LoaderContext,
    stream: &mut String,
) -> Result<(), GenerateError> {
    let scale = camera.number_property("scale", 1.0);
    let near = camera.number_property("near_clip", 0.01);
    let far = camera.number_property("far_clip", 10000.0);

    stream.push_str(ORIENTATION_HEADER);
    stream.push_str(&format!(
        "  let camera = make_orthogonal_camera(camera_eye, camera_dir, camera_up, {scale:?}, settings.width, settings.height, {near:?}, {far:?});\n"
    ));
    Ok(())
}

fn serialize_fisheye(
    camera: &SceneObject,
    _ctx: &LoaderContext,
    stream: &mut String,
) -> Result<(), GenerateError> {
    let mode = match camera.string_property("mode", "circular") {
        "cropped" => "FisheyeAspectMode::Cropped",
        "full" => "FisheyeAspectMode::Full",
        _ => "FisheyeAspectMode::Circular",
    };

    stream.push_str(ORIENTATION_HEADER);
    stream.push_str(&format!(
        "  let camera = make_fishlens_camera(camera_eye, camera_dir, camera_up, settings.width, settings.height, {mode});\n"
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Target;
    use ember_core::scene::parse_scene_string;
    use std::path::Path;

    #[test]
    fn orientation_derives_from_the_transform() {
        let scene = parse_scene_string(
            r#"{ "camera": { "type": "perspective",
                 "transform": { "position": [1, 2, 3] } } }"#,
            Path::new("."),
        )
        .unwrap();
        let ctx = LoaderContext::new(scene, Target::Generic, Path::new("cache"));
        let orientation = initial_orientation(&ctx);
        assert_eq!(orientation.eye, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(orientation.dir, Vec3::Z);
    }

    #[test]
    fn camera_reads_orientation_from_the_registry() {
        let scene = parse_scene_string(
            r#"{ "camera": { "type": "perspective", "fov": 40 } }"#,
            Path::new("."),
        )
        .unwrap();
        let ctx = LoaderContext::new(scene, Target::Generic, Path::new("cache"));

        let mut stream = String::new();
        generate(&ctx, &mut stream).unwrap();
        assert!(stream.contains("get_global_parameter_vec3(\"__camera_eye\""));
        assert!(stream.contains("make_perspective_camera(camera_eye, camera_dir, camera_up, rad(40.0)"));
    }

    #[test]
    fn missing_camera_falls_back_to_perspective() {
        let scene = parse_scene_string("{}", Path::new(".")).unwrap();
        let ctx = LoaderContext::new(scene, Target::Generic, Path::new("cache"));
        let mut stream = String::new();
        generate(&ctx, &mut stream).unwrap();
        assert!(stream.contains("make_perspective_camera"));
    }
}
