//! Shared fixtures and collaborator doubles for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use image::{ImageFormat, Rgba, RgbaImage};
use serde_json::{Value, json};

use crate::error::{FogError, StorageError};
use crate::memory::MemoryStorage;
use crate::store::{FileStorage, FogReset};

/// Encode a `width`x`height` image whose top-left pixel is red and the rest
/// blue, so orientation is observable after rotation.
pub fn marked_image(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let mut img = RgbaImage::from_pixel(width, height, Rgba([0, 0, 255, 255]));
    img.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
    let img = if format == ImageFormat::Jpeg {
        image::DynamicImage::ImageRgb8(image::DynamicImage::ImageRgba8(img).to_rgb8())
    } else {
        image::DynamicImage::ImageRgba8(img)
    };
    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

/// 1000x500 scene, grid 50, one of every embedded kind.
pub fn scene_document() -> Value {
    json!({
        "_id": "scene1",
        "name": "Temple",
        "width": 1000,
        "height": 500,
        "background": { "src": "maps/temple.jpg", "offsetX": 0, "offsetY": 0 },
        "foreground": "maps/roof.png",
        "grid": { "type": 1, "size": 50 },
        "fog": { "exploration": false },
        "tokens": [{ "_id": "tok1", "x": 100, "y": 100, "width": 2, "height": 1, "rotation": 0 }],
        "tiles": [{ "_id": "tile1", "x": 0, "y": 0, "width": 200, "height": 100, "rotation": 0 }],
        "walls": [{ "_id": "wall1", "c": [0, 0, 100, 0] }],
        "lights": [{ "_id": "light1", "x": 10, "y": 20, "config": { "rotation": 45 } }],
        "sounds": [{ "_id": "sound1", "x": 100, "y": 50 }],
        "notes": [{ "_id": "note1", "x": 1, "y": 2 }],
        "drawings": [{ "_id": "draw1", "x": 10, "y": 20, "shape": { "width": 40, "height": 10 }, "rotation": 0 }],
        "templates": [{ "_id": "tmpl1", "x": 0, "y": 0, "direction": 0 }]
    })
}

/// Storage holding the background and foreground of [`scene_document`].
pub async fn seeded_storage() -> MemoryStorage {
    let storage = MemoryStorage::new();
    storage.insert("maps/temple.jpg", marked_image(4, 2, ImageFormat::Jpeg)).await;
    storage.insert("maps/roof.png", marked_image(4, 2, ImageFormat::Png)).await;
    storage
}

/// Storage whose every operation fails.
pub struct BrokenStorage;

#[async_trait]
impl FileStorage for BrokenStorage {
    async fn list(&self, directory: &str) -> Result<Vec<String>, StorageError> {
        Err(StorageError::Rejected(format!("list {directory}")))
    }

    async fn create_directory(&self, directory: &str) -> Result<(), StorageError> {
        Err(StorageError::Rejected(format!("mkdir {directory}")))
    }

    async fn upload(&self, directory: &str, _: &str, _: Vec<u8>, _: &str) -> Result<String, StorageError> {
        Err(StorageError::Rejected(format!("upload {directory}")))
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        Err(StorageError::Rejected(format!("read {path}")))
    }
}

/// Fog collaborator that counts calls and optionally fails.
#[derive(Default)]
pub struct CountingFog {
    pub calls: AtomicUsize,
    pub fail: bool,
}

impl CountingFog {
    pub fn failing() -> Self {
        Self { calls: AtomicUsize::new(0), fail: true }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FogReset for CountingFog {
    async fn reset(&self) -> Result<(), FogError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(FogError::ResetFailed("canvas not ready".into()));
        }
        Ok(())
    }
}
