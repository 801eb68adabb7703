//! JSON configuration for contexts and the gallery.
//!
//! Every field has a default so a partial (or empty) JSON object is a valid config.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::EngineError;

/// Read and deserialize a JSON file into `T`.
pub fn load_typed_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, EngineError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| EngineError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), bytes = text.len(), "config read");
    parse_typed_json(path, &text)
}

/// Deserialize JSON text into `T`; `label` names the origin in errors.
pub fn parse_typed_json<T: DeserializeOwned>(
    label: impl Into<PathBuf>,
    text: &str,
) -> Result<T, EngineError> {
    serde_json::from_str(text).map_err(|source| EngineError::Json {
        path: label.into(),
        source,
    })
}

/// Options handed to the surface when a rendering context is requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextOptions {
    #[serde(default = "default_true")]
    pub alpha: bool,

    #[serde(default = "default_true")]
    pub antialias: bool,

    #[serde(default = "default_true")]
    pub depth: bool,

    #[serde(default = "default_true")]
    pub premultiplied_alpha: bool,

    /// Only try the legacy API variants.
    #[serde(default)]
    pub prefer_legacy: bool,

    /// Probe the optional capability extensions at creation time.
    #[serde(default = "default_true")]
    pub common_extensions: bool,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            alpha: true,
            antialias: true,
            depth: true,
            premultiplied_alpha: true,
            prefer_legacy: false,
            common_extensions: true,
        }
    }
}

/// Gallery layout and transition timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GalleryConfig {
    /// Source image width (pixels).
    #[serde(default = "default_image_width")]
    pub image_width: u32,

    /// Source image height (pixels).
    #[serde(default = "default_image_height")]
    pub image_height: u32,

    /// Camera distance from the image plane.
    #[serde(default = "default_radius")]
    pub radius: f32,

    #[serde(default = "default_transition_secs")]
    pub transition_secs: f32,

    /// Mix-mask cutoff used by the transition shader.
    #[serde(default = "default_threshold")]
    pub threshold: f32,

    /// Abort image loading after this many milliseconds.
    #[serde(default)]
    pub load_timeout_ms: Option<u64>,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            image_width: default_image_width(),
            image_height: default_image_height(),
            radius: default_radius(),
            transition_secs: default_transition_secs(),
            threshold: default_threshold(),
            load_timeout_ms: None,
        }
    }
}

impl GalleryConfig {
    pub fn from_json_path(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let cfg: GalleryConfig = load_typed_json(path)?;
        cfg.validate(path)?;
        Ok(cfg)
    }

    pub fn validate(&self, origin: impl Into<PathBuf>) -> Result<(), EngineError> {
        if self.image_width == 0 || self.image_height == 0 {
            return Err(EngineError::invalid_config(
                origin,
                "image_width/image_height must be > 0",
            ));
        }
        if self.transition_secs.is_nan() || self.transition_secs <= 0.0 {
            return Err(EngineError::invalid_config(
                origin,
                "transition_secs must be > 0",
            ));
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}
fn default_image_width() -> u32 {
    705
}
fn default_image_height() -> u32 {
    850
}
fn default_radius() -> f32 {
    100.0
}
fn default_transition_secs() -> f32 {
    1.0
}
fn default_threshold() -> f32 {
    0.3
}
