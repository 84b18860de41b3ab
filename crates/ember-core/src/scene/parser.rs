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

//! The JSON scene-description parser.
//!
//! The description is a free-form property soup, so this walks
//! `serde_json::Value` by hand instead of deriving a schema. Every parse
//! failure aborts the load with a message naming the offending object.

use serde_json::Value;
use std::path::Path;

use crate::math::{Mat3, Mat4, Vec2, Vec3};

use super::{ObjectArena, ObjectKind, Property, Scene, SceneError, SceneObject};

/// Parses a scene file from disk.
pub fn parse_scene_file(path: &Path) -> Result<Scene, SceneError> {
    let source = std::fs::read_to_string(path).map_err(|source| SceneError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    parse_scene_string(&source, base_dir)
}

/// Parses a scene description from a string. Relative resource paths
/// resolve against `base_dir`.
pub fn parse_scene_string(source: &str, base_dir: &Path) -> Result<Scene, SceneError> {
    let root: Value = serde_json::from_str(source)?;
    let root = root
        .as_object()
        .ok_or_else(|| SceneError::Format("top level must be an object".into()))?;

    let mut scene = Scene::default();

    if let Some(v) = root.get("camera") {
        scene.camera = Some(parse_object(ObjectKind::Camera, "__camera", v, base_dir)?);
    }
    if let Some(v) = root.get("technique") {
        scene.technique = Some(parse_object(ObjectKind::Technique, "__technique", v, base_dir)?);
    }
    if let Some(v) = root.get("film") {
        scene.film = Some(parse_object(ObjectKind::Film, "__film", v, base_dir)?);
    }

    parse_array(root.get("textures"), ObjectKind::Texture, &mut scene.textures, base_dir)?;
    parse_array(root.get("bsdfs"), ObjectKind::Bsdf, &mut scene.bsdfs, base_dir)?;
    parse_array(root.get("shapes"), ObjectKind::Shape, &mut scene.shapes, base_dir)?;
    parse_array(root.get("entities"), ObjectKind::Entity, &mut scene.entities, base_dir)?;
    parse_array(root.get("lights"), ObjectKind::Light, &mut scene.lights, base_dir)?;
    parse_array(root.get("media"), ObjectKind::Medium, &mut scene.media, base_dir)?;

    Ok(scene)
}

fn parse_array(
    value: Option<&Value>,
    kind: ObjectKind,
    arena: &mut ObjectArena,
    base_dir: &Path,
) -> Result<(), SceneError> {
    let Some(value) = value else {
        return Ok(());
    };
    let list = value
        .as_array()
        .ok_or_else(|| SceneError::Format(format!("expected an array of {kind:?} objects")))?;

    for entry in list {
        let name = entry
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| SceneError::Format(format!("{kind:?} object without a name")))?;
        arena.insert(parse_object(kind, name, entry, base_dir)?);
    }
    Ok(())
}

fn parse_object(
    kind: ObjectKind,
    name: &str,
    value: &Value,
    base_dir: &Path,
) -> Result<SceneObject, SceneError> {
    let map = value
        .as_object()
        .ok_or_else(|| SceneError::Format(format!("{kind:?} '{name}' must be an object")))?;

    let plugin_type = map.get("type").and_then(Value::as_str).unwrap_or("");
    let mut object = SceneObject::new(kind, name, plugin_type, base_dir);

    for (key, entry) in map {
        if key == "name" || key == "type" {
            continue;
        }
        let property = parse_property(entry)
            .ok_or_else(|| SceneError::Format(format!("{kind:?} '{name}': bad value for '{key}'")))?;
        object.set_property(key, property);
    }

    Ok(object)
}

fn parse_property(value: &Value) -> Option<Property> {
    match value {
        Value::Bool(v) => Some(Property::Bool(*v)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                if i >= i32::MIN as i64 && i <= i32::MAX as i64 {
                    return Some(Property::Integer(i as i32));
                }
            }
            n.as_f64().map(|f| Property::Number(f as f32))
        }
        Value::String(s) => Some(Property::Str(s.clone())),
        Value::Array(list) => parse_numeric_array(list),
        Value::Object(_) => parse_transform(value).map(Property::Transform),
        Value::Null => None,
    }
}

fn parse_numeric_array(list: &[Value]) -> Option<Property> {
    let mut floats = Vec::with_capacity(list.len());
    for v in list {
        floats.push(v.as_f64()? as f32);
    }
    match floats.len() {
        2 => Some(Property::Vec2(Vec2::new(floats[0], floats[1]))),
        3 => Some(Property::Vec3(Vec3::new(floats[0], floats[1], floats[2]))),
        9 => {
            let mut m = [0.0f32; 9];
            m.copy_from_slice(&floats);
            Some(Property::Transform(Mat4::from_mat3(Mat3::from_rows(m))))
        }
        16 => {
            let mut m = [0.0f32; 16];
            m.copy_from_slice(&floats);
            Some(Property::Transform(Mat4::from_rows(m)))
        }
        _ => None,
    }
}

/// Parses a transform from a nested object with `position` / `scale` /
/// `rotation` / `matrix` keys. A bare `matrix` wins; otherwise the
/// composition is translate * rotate * scale. A scalar `scale` broadcasts.
fn parse_transform(value: &Value) -> Option<Mat4> {
    let map = value.as_object()?;

    if let Some(m) = map.get("matrix") {
        return match parse_numeric_array(m.as_array()?)? {
            Property::Transform(mat) => Some(mat),
            _ => None,
        };
    }

    let mut out = Mat4::IDENTITY;

    if let Some(s) = map.get("scale") {
        let scale = match parse_property(s)? {
            Property::Number(v) => Vec3::splat(v),
            Property::Integer(v) => Vec3::splat(v as f32),
            Property::Vec3(v) => v,
            _ => return None,
        };
        out = Mat4::from_scale(scale);
    }

    if let Some(r) = map.get("rotation") {
        let rot = match parse_numeric_array(r.as_array()?)? {
            Property::Transform(mat) => mat,
            _ => return None,
        };
        out = rot.mul(&out);
    }

    if let Some(p) = map.get("position") {
        let pos = match parse_property(p)? {
            Property::Vec3(v) => v,
            _ => return None,
        };
        out = Mat4::from_translation(pos).mul(&out);
    }

    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENE: &str = r#"{
        "camera": { "type": "perspective", "fov": 40, "transform": { "position": [0, 0, -5] } },
        "technique": { "type": "path", "max_depth": 4, "nee": true },
        "film": { "size": [800, 600] },
        "bsdfs": [
            { "name": "gray", "type": "diffuse", "reflectance": [0.8, 0.8, 0.8] }
        ],
        "shapes": [
            { "name": "ball", "type": "sphere", "radius": 4 }
        ],
        "entities": [
            { "name": "e0", "shape": "ball", "bsdf": "gray" }
        ],
        "lights": [
            { "name": "sun", "type": "directional", "irradiance": [1, 1, 1] }
        ]
    }"#;

    #[test]
    fn parses_all_sections() {
        let scene = parse_scene_string(SCENE, Path::new(".")).unwrap();
        assert_eq!(scene.camera.as_ref().unwrap().plugin_type(), "perspective");
        assert_eq!(scene.technique.as_ref().unwrap().plugin_type(), "path");
        assert_eq!(scene.bsdfs.len(), 1);
        assert_eq!(scene.lights.len(), 1);

        let film = scene.film.unwrap();
        match film.property("size") {
            Some(Property::Vec2(v)) => assert_eq!((v.x, v.y), (800.0, 600.0)),
            other => panic!("unexpected size property: {other:?}"),
        }
    }

    #[test]
    fn transform_object_composes_trs() {
        let scene = parse_scene_string(SCENE, Path::new(".")).unwrap();
        let camera = scene.camera.unwrap();
        let t = camera
            .property("transform")
            .unwrap()
            .transform_or(Mat4::IDENTITY);
        assert_eq!(t.translation(), Vec3::new(0.0, 0.0, -5.0));
    }

    #[test]
    fn integers_and_booleans_keep_their_types() {
        let scene = parse_scene_string(SCENE, Path::new(".")).unwrap();
        let tech = scene.technique.unwrap();
        assert_eq!(tech.integer_property("max_depth", 0), 4);
        assert!(tech.bool_property("nee", false));
    }

    #[test]
    fn missing_name_is_a_format_error() {
        let broken = r#"{ "bsdfs": [ { "type": "diffuse" } ] }"#;
        match parse_scene_string(broken, Path::new(".")) {
            Err(SceneError::Format(msg)) => assert!(msg.contains("without a name")),
            other => panic!("expected format error, got {other:?}"),
        }
    }
}
