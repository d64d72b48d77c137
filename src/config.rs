//! Rotation configuration parsed from environment variables.

use std::time::Duration;

pub const DEFAULT_CACHE_DIR: &str = "rotated-images";
pub const DEFAULT_IMAGE_QUALITY: u8 = 90;
pub const DEFAULT_FOG_SETTLE_MS: u64 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationConfig {
    /// Name of the sibling directory holding rotated image variants.
    pub cache_dir: String,
    /// Lossy encode quality, 1..=100.
    pub image_quality: u8,
    /// Pause after a fog reset so the collaborator's state catches up.
    pub fog_settle: Duration,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            cache_dir: DEFAULT_CACHE_DIR.to_string(),
            image_quality: DEFAULT_IMAGE_QUALITY,
            fog_settle: Duration::from_millis(DEFAULT_FOG_SETTLE_MS),
        }
    }
}

impl RotationConfig {
    /// Build config from environment variables.
    ///
    /// Optional:
    /// - `ROTATION_CACHE_DIR`: default `rotated-images`
    /// - `ROTATION_IMAGE_QUALITY`: default 90, clamped to 1..=100
    /// - `ROTATION_FOG_SETTLE_MS`: default 100
    #[must_use]
    pub fn from_env() -> Self {
        let cache_dir = std::env::var("ROTATION_CACHE_DIR")
            .map(|v| v.trim().trim_matches('/').to_string())
            .unwrap_or_default();
        let cache_dir = if cache_dir.is_empty() { DEFAULT_CACHE_DIR.to_string() } else { cache_dir };
        let image_quality = env_parse("ROTATION_IMAGE_QUALITY", DEFAULT_IMAGE_QUALITY).clamp(1, 100);
        let fog_settle = Duration::from_millis(env_parse("ROTATION_FOG_SETTLE_MS", DEFAULT_FOG_SETTLE_MS));

        Self { cache_dir, image_quality, fog_settle }
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    match std::env::var(key).map(|v| v.trim().parse::<T>()) {
        Ok(Ok(value)) => value,
        _ => default,
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
