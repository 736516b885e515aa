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

use std::fs;

use umbra_data::{Scene, SceneError};

#[test]
fn loads_scene_from_folder() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    fs::write(
        dir.path().join("courtyard.json"),
        r#"{
            "objects": [
                { "name": "statue", "model": "statue.model", "spin_degrees_per_second": 10,
                  "materials": { "gbuffer": { "shader": "pbr", "textures": ["marble.png"] } } }
            ],
            "terrain": { "tiles": 4 },
            "foliage_zones": [ { "center": [0, 0, 0], "radius": 10 } ],
            "skybox": "sky.png",
            "fog_enabled": false
        }"#,
    )?;

    let scene = Scene::load(dir.path(), "courtyard")?;
    assert_eq!(scene.name(), "courtyard");
    assert_eq!(scene.object_count(), 1);
    assert!(scene.has_terrain());
    assert!(scene.has_foliage());
    assert!(!scene.settings().fog_enabled);
    assert!(scene.texture_paths().contains("sky.png"));
    Ok(())
}

#[test]
fn missing_scene_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Scene::load(dir.path(), "nowhere").unwrap_err();
    assert!(matches!(err, SceneError::Io { .. }));
    assert!(err.to_string().contains("nowhere.json"));
}

#[test]
fn malformed_scene_is_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("broken.json"), "{ \"objects\": 3 }").unwrap();
    assert!(matches!(
        Scene::load(dir.path(), "broken"),
        Err(SceneError::Parse { .. })
    ));
}
