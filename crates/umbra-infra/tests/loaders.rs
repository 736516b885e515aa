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
use std::sync::Arc;

use anyhow::Result;
use umbra_core::renderer::{Rhi, TextureFormat};
use umbra_data::{LoadError, ResourceCache, ResourceLoader};
use umbra_infra::{HeadlessConfig, HeadlessRhi, ImageTextureLoader, ProceduralModelLoader};

fn headless() -> Result<Arc<HeadlessRhi>> {
    Ok(Arc::new(HeadlessRhi::new(HeadlessConfig::default())?))
}

#[test]
fn png_is_decoded_and_uploaded() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("checker.png");
    image::RgbaImage::from_fn(4, 2, |x, y| {
        if (x + y) % 2 == 0 {
            image::Rgba([255, 255, 255, 255])
        } else {
            image::Rgba([0, 0, 0, 255])
        }
    })
    .save(&path)?;

    let rhi = headless()?;
    let loader = ImageTextureLoader::new(rhi.clone());
    let texture = loader.load(&path)?;
    assert_eq!((texture.width, texture.height), (4, 2));
    assert_eq!(texture.format, TextureFormat::Rgba8UnormSrgb);
    assert_eq!(rhi.texture_uploads(texture.id), Some(1));
    Ok(())
}

#[test]
fn corrupt_image_is_a_decode_error() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("broken.png");
    fs::write(&path, b"definitely not a png")?;

    let loader = ImageTextureLoader::new(headless()?);
    assert!(matches!(loader.load(&path), Err(LoadError::Decode { .. })));
    assert!(matches!(
        loader.load(&dir.path().join("missing.png")),
        Err(LoadError::Io { .. })
    ));
    Ok(())
}

#[test]
fn cache_keeps_no_entry_for_failed_texture() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let loader = ImageTextureLoader::new(headless()?);
    let cache = ResourceCache::new("textures");

    let lookup = cache.get_or_load_with(dir.path(), "missing.png", &loader);
    assert!(lookup.resource.is_none());
    assert!(!cache.is_in_cache("missing.png"));
    Ok(())
}

#[test]
fn procedural_model_uploads_one_buffer_per_lod() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("pawn.json");
    fs::write(
        &path,
        r#"{ "meshes": [
            { "name": "head", "shape": "sphere", "size": 1.0, "lods": 3 },
            { "name": "base", "shape": "cube", "size": 2.0, "lods": 3 }
        ] }"#,
    )?;

    let rhi = headless()?;
    let before = rhi.live_resource_counts()[1];
    let model = ProceduralModelLoader::new(rhi.clone()).load(&path)?;

    assert_eq!(model.meshes.len(), 2);
    assert_eq!(model.meshes[0].lods.len(), 3);
    // Cubes have a single level of detail.
    assert_eq!(model.meshes[1].lods.len(), 1);
    assert_eq!(model.meshes[1].lods[0].vertex_count, 36);
    assert_eq!(rhi.live_resource_counts()[1], before + 4);
    assert!((model.bounding_radius - 3f32.sqrt()).abs() < 1e-5);

    let head = &model.meshes[0];
    assert_eq!(head.select_lod(1.0), 0);
    assert_eq!(head.select_lod(0.0), 2);
    Ok(())
}

#[test]
fn model_vertex_data_reaches_the_gpu() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("floor.json");
    fs::write(&path, r#"{ "meshes": [ { "name": "floor", "shape": "plane", "size": 4.0 } ] }"#)?;

    let rhi = headless()?;
    let model = ProceduralModelLoader::new(rhi.clone()).load(&path)?;
    let buffer = model.meshes[0].lods[0].vertex_buffer;
    let bytes = rhi.read_buffer(buffer)?;
    // 6 vertices of position + normal.
    assert_eq!(bytes.len(), 6 * 6 * 4);
    let first_x = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    assert_eq!(first_x, -2.0);
    Ok(())
}
