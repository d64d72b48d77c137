//! Image rotation cache — reuse or render rotated image variants.
//!
//! NAMING
//! ======
//! A rotated variant is named `<base>_rotation<angle>.<ext>` where `angle` is
//! the cumulative rotation from the original, normalized into `[0, 360)`.
//! Variants live in a cache subdirectory next to the original. Rotating a
//! variant parses its base and angle back out of the stem, so every path to
//! the same cumulative angle lands on the same filename:
//!
//! ```text
//! maps/temple.jpg                         +90  -> maps/rotated-images/temple_rotation90.jpg
//! maps/rotated-images/temple_rotation90.jpg -90 -> maps/rotated-images/temple_rotation0.jpg
//! ```
//!
//! ERROR HANDLING
//! ==============
//! A failed directory listing is a cache miss, not an error. Decode, encode
//! and upload failures surface as `ImageRotationFailed` for the caller to
//! downgrade.

use image::DynamicImage;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use tracing::{debug, info, warn};

use crate::config::RotationConfig;
use crate::error::{ImageError, RotationError, StorageError};
use crate::step::{RotationStep, Turn};
use crate::store::FileStorage;

const ROTATION_MARKER: &str = "_rotation";

// =============================================================================
// ENCODING
// =============================================================================

/// Output encoding for a rotated image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageEncoding {
    /// Opaque photographic content (backgrounds).
    Jpeg,
    /// Keeps transparency (foregrounds).
    Png,
    Webp,
}

impl ImageEncoding {
    #[must_use]
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
        }
    }

    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Webp => "webp",
        }
    }

    /// Unrecognized mime types fall back to JPEG.
    #[must_use]
    pub fn from_mime(mime: &str) -> Self {
        match mime {
            "image/png" => Self::Png,
            "image/webp" => Self::Webp,
            _ => Self::Jpeg,
        }
    }
}

// =============================================================================
// NAMING
// =============================================================================

/// Where a rotated variant lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheTarget {
    pub directory: String,
    pub filename: String,
    /// Stem of the original, unrotated image.
    pub base: String,
    /// Cumulative rotation baked into the variant.
    pub angle: i32,
}

impl CacheTarget {
    #[must_use]
    pub fn path(&self) -> String {
        join_path(&self.directory, &self.filename)
    }
}

/// Derive the cache location for rotating `source` by `step`.
#[must_use]
pub fn cache_target(source: &str, step: RotationStep, cache_dir: &str, encoding: ImageEncoding) -> CacheTarget {
    let (parent, raw_name) = source.rsplit_once('/').unwrap_or(("", source));
    let filename = decode(raw_name);
    let stem = match filename.rfind('.') {
        Some(dot) if dot > 0 => &filename[..dot],
        _ => filename.as_str(),
    };

    let (base, current, directory) = match split_rotation_suffix(stem) {
        Some((base, angle)) if last_segment(parent) == cache_dir => (base, angle, parent.to_string()),
        Some((base, angle)) => (base, angle, join_path(parent, cache_dir)),
        None => (stem, 0, join_path(parent, cache_dir)),
    };

    let angle = step.add_to_cumulative(current);
    CacheTarget {
        filename: format!("{base}{ROTATION_MARKER}{angle}.{}", encoding.extension()),
        directory,
        base: base.to_string(),
        angle,
    }
}

/// Split `<base>_rotation<angle>` into its parts. The angle may be negative.
#[must_use]
pub fn split_rotation_suffix(stem: &str) -> Option<(&str, i32)> {
    let at = stem.rfind(ROTATION_MARKER)?;
    let digits = &stem[at + ROTATION_MARKER.len()..];
    let unsigned = digits.strip_prefix('-').unwrap_or(digits);
    if unsigned.is_empty() || !unsigned.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    match digits.parse::<i32>() {
        Ok(angle) => Some((&stem[..at], angle)),
        Err(_) => None,
    }
}

fn decode(raw: &str) -> String {
    match urlencoding::decode(raw) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => raw.to_string(),
    }
}

fn last_segment(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn join_path(parent: &str, child: &str) -> String {
    if parent.is_empty() { child.to_string() } else { format!("{parent}/{child}") }
}

// =============================================================================
// CACHE
// =============================================================================

/// Outcome of probing the cache directory.
#[derive(Debug)]
pub enum Probe {
    Hit(String),
    Miss,
    /// The directory could not be listed (usually: not created yet).
    Unlisted(StorageError),
}

/// Rotates images through a [`FileStorage`], reusing earlier variants.
pub struct ImageRotationCache<'a> {
    storage: &'a dyn FileStorage,
    config: &'a RotationConfig,
}

impl<'a> ImageRotationCache<'a> {
    #[must_use]
    pub fn new(storage: &'a dyn FileStorage, config: &'a RotationConfig) -> Self {
        Self { storage, config }
    }

    /// Return the path of `source` rotated by `step`, rendering and uploading
    /// it only if no variant with the same cumulative angle exists.
    ///
    /// # Errors
    ///
    /// Returns `ImageRotationFailed` if the source cannot be read or decoded,
    /// or the rendered variant cannot be encoded or uploaded.
    pub async fn rotate_or_fetch(
        &self,
        source: &str,
        step: RotationStep,
        encoding: ImageEncoding,
    ) -> Result<String, RotationError> {
        self.rotate_inner(source, step, encoding)
            .await
            .map_err(|e| RotationError::ImageRotationFailed { path: source.to_string(), source: e })
    }

    async fn rotate_inner(&self, source: &str, step: RotationStep, encoding: ImageEncoding) -> Result<String, ImageError> {
        if source.is_empty() {
            return Err(ImageError::EmptyPath);
        }
        let target = cache_target(source, step, &self.config.cache_dir, encoding);

        match self.probe(&target).await {
            Probe::Hit(path) => {
                info!(%source, %path, "rotated image cache hit");
                return Ok(path);
            }
            Probe::Miss => debug!(%source, target = %target.path(), "rotated image cache miss"),
            Probe::Unlisted(e) => {
                debug!(%source, directory = %target.directory, error = %e, "cache directory unlisted; treating as miss");
            }
        }

        let bytes = self.storage.read(source).await.map_err(ImageError::Read)?;
        let quality = self.config.image_quality;
        let encoded = tokio::task::spawn_blocking(move || render(&bytes, step, encoding, quality))
            .await
            .map_err(ImageError::Worker)??;

        if let Err(e) = self.storage.create_directory(&target.directory).await {
            warn!(directory = %target.directory, error = %e, "could not create cache directory");
        }

        let path = self
            .storage
            .upload(&target.directory, &target.filename, encoded, encoding.mime_type())
            .await
            .map_err(ImageError::Upload)?;
        info!(%source, %path, angle = target.angle, "rotated image uploaded");
        Ok(path)
    }

    /// Look for an existing variant in the target's directory.
    ///
    /// A listed path is a hit only when its decoded last segment equals the
    /// target filename exactly; a suffix match would let
    /// `mytemple_rotation90.jpg` stand in for `temple_rotation90.jpg`.
    pub async fn probe(&self, target: &CacheTarget) -> Probe {
        match self.storage.list(&target.directory).await {
            Ok(files) => files
                .into_iter()
                .find(|f| decode(last_segment(f)) == target.filename)
                .map_or(Probe::Miss, Probe::Hit),
            Err(e) => Probe::Unlisted(e),
        }
    }
}

// =============================================================================
// RENDER
// =============================================================================

/// Decode, rotate about the center onto the (possibly swapped) canvas, encode.
///
/// # Errors
///
/// Returns `Decode` or `Encode` on codec failures.
pub fn render(bytes: &[u8], step: RotationStep, encoding: ImageEncoding, quality: u8) -> Result<Vec<u8>, ImageError> {
    let img = image::load_from_memory(bytes).map_err(ImageError::Decode)?;
    let rotated = rotate_image(&img, step);
    encode(&rotated, encoding, quality)
}

#[must_use]
pub fn rotate_image(img: &DynamicImage, step: RotationStep) -> DynamicImage {
    match step.turn() {
        Turn::Clockwise => img.rotate90(),
        Turn::CounterClockwise => img.rotate270(),
        Turn::Half => img.rotate180(),
    }
}

fn encode(img: &DynamicImage, encoding: ImageEncoding, quality: u8) -> Result<Vec<u8>, ImageError> {
    let mut buf = Vec::new();
    let result = match encoding {
        // JPEG has no alpha channel.
        ImageEncoding::Jpeg => DynamicImage::ImageRgb8(img.to_rgb8())
            .write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality)),
        ImageEncoding::Png => img.write_with_encoder(PngEncoder::new(&mut buf)),
        ImageEncoding::Webp => {
            DynamicImage::ImageRgba8(img.to_rgba8()).write_with_encoder(WebPEncoder::new_lossless(&mut buf))
        }
    };
    result.map_err(ImageError::Encode)?;
    Ok(buf)
}

#[cfg(test)]
#[path = "image_cache_test.rs"]
mod tests;
