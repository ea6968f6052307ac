//! Scan configuration.
//!
//! Defaults reproduce the tuned ladder: chunks of 3 files, 800 px resample
//! edge, 3000 px full-resolution cap, 200% contrast boost.

use crate::error::IntakeError;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

/// Files decoded concurrently per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 3;
/// Longer edge of the resampled raster used by the software strategies.
pub const DEFAULT_RESAMPLE_MAX_EDGE: u32 = 800;
/// Images whose longer edge reaches this are never decoded at native size.
pub const DEFAULT_FULL_RESOLUTION_CAP: u32 = 3000;
/// CSS-style contrast multiplier for the enhanced-contrast strategy.
pub const DEFAULT_CONTRAST_FACTOR: f32 = 2.0;
/// Longer edge of preview thumbnails.
pub const DEFAULT_PREVIEW_EDGE: u32 = 256;

/// Tunables for the batch scanner and QR decoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Files decoded concurrently per chunk.
    pub chunk_size: usize,
    /// Longer-edge cap for strategies 2 and 3.
    pub resample_max_edge: u32,
    /// Strategy 4 only runs when the longer edge is below this.
    pub full_resolution_cap: u32,
    /// Contrast multiplier applied before luminance in strategy 3.
    pub contrast_factor: f32,
    /// Longer edge of preview thumbnails.
    pub preview_edge: u32,
    /// Retry each software pass with inverted polarity.
    pub try_inverted: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            resample_max_edge: DEFAULT_RESAMPLE_MAX_EDGE,
            full_resolution_cap: DEFAULT_FULL_RESOLUTION_CAP,
            contrast_factor: DEFAULT_CONTRAST_FACTOR,
            preview_edge: DEFAULT_PREVIEW_EDGE,
            try_inverted: true,
        }
    }
}

fn positive_from_env<T: std::str::FromStr + PartialOrd + Default>(key: &str) -> Option<T> {
    let value = env::var(key).ok()?;
    match value.trim().parse::<T>() {
        Ok(v) if v > T::default() => Some(v),
        _ => None,
    }
}

impl ScanConfig {
    /// Defaults overlaid with `QR_INTAKE_*` environment variables.
    ///
    /// Unset, unparseable or zero values leave the default in place.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Overlay `QR_INTAKE_*` environment variables onto `self`.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = positive_from_env("QR_INTAKE_CHUNK_SIZE") {
            self.chunk_size = v;
        }
        if let Some(v) = positive_from_env("QR_INTAKE_MAX_EDGE") {
            self.resample_max_edge = v;
        }
        if let Some(v) = positive_from_env("QR_INTAKE_FULL_RES_CAP") {
            self.full_resolution_cap = v;
        }
        if let Some(v) = positive_from_env("QR_INTAKE_CONTRAST") {
            self.contrast_factor = v;
        }
        if let Some(v) = positive_from_env("QR_INTAKE_PREVIEW_EDGE") {
            self.preview_edge = v;
        }
        self
    }

    /// Load a JSON configuration file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, IntakeError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path).map_err(|err| IntakeError::Config {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
        let config: ScanConfig =
            serde_json::from_str(&contents).map_err(|err| IntakeError::Config {
                path: path.to_path_buf(),
                reason: err.to_string(),
            })?;
        Ok(config.validated())
    }

    /// Clamp values that would stall or break the pipeline.
    pub fn validated(mut self) -> Self {
        self.chunk_size = self.chunk_size.max(1);
        self.resample_max_edge = self.resample_max_edge.max(1);
        self.full_resolution_cap = self.full_resolution_cap.max(1);
        self.preview_edge = self.preview_edge.max(1);
        if !(self.contrast_factor.is_finite() && self.contrast_factor > 0.0) {
            self.contrast_factor = DEFAULT_CONTRAST_FACTOR;
        }
        self
    }
}

/// Upload coordinator options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Also upload the separator card that anchors each group.
    pub upload_separators: bool,
}
