use super::native::NativeDetector;
use super::software::{RqrrDecoder, SoftwareDecoder};
use crate::config::ScanConfig;
use crate::utils::grayscale::{invert, rgb_to_luma, rgb_to_luma_contrast};
use crate::utils::resample::downscale;
use image::{GrayImage, RgbImage};
use std::fmt;
use std::sync::Arc;

/// Rung of the ladder that produced a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Platform detector on the native raster.
    Native,
    /// Software reader on the raster resampled to the edge cap.
    Resampled,
    /// Software reader on the resampled raster after a contrast boost.
    EnhancedContrast,
    /// Software reader on the native raster.
    FullResolution,
}

impl Strategy {
    /// All rungs, cheapest first.
    pub const LADDER: [Strategy; 4] = [
        Strategy::Native,
        Strategy::Resampled,
        Strategy::EnhancedContrast,
        Strategy::FullResolution,
    ];
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::Native => "native",
            Strategy::Resampled => "resampled",
            Strategy::EnhancedContrast => "enhanced-contrast",
            Strategy::FullResolution => "full-resolution",
        };
        f.write_str(name)
    }
}

/// A payload and the rung that found it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    /// Decoded text, never empty.
    pub payload: String,
    /// Rung that succeeded.
    pub strategy: Strategy,
}

/// QR reader that escalates through progressively more expensive attempts.
///
/// 1. native detector, if one is registered
/// 2. resampled to `resample_max_edge`, normal then inverted polarity
/// 3. same size with a contrast boost
/// 4. native resolution, only when the longer edge is below
///    `full_resolution_cap` and the raster was actually resampled in step 2
#[derive(Clone)]
pub struct QrDecoder {
    native: Option<Arc<dyn NativeDetector>>,
    software: Arc<dyn SoftwareDecoder>,
    resample_max_edge: u32,
    full_resolution_cap: u32,
    contrast_factor: f32,
    try_inverted: bool,
}

impl fmt::Debug for QrDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QrDecoder")
            .field("native", &self.native.as_ref().map(|n| n.name().to_string()))
            .field("resample_max_edge", &self.resample_max_edge)
            .field("full_resolution_cap", &self.full_resolution_cap)
            .field("contrast_factor", &self.contrast_factor)
            .field("try_inverted", &self.try_inverted)
            .finish()
    }
}

impl Default for QrDecoder {
    fn default() -> Self {
        Self::new(&ScanConfig::default())
    }
}

impl QrDecoder {
    /// Ladder with the `rqrr` software reader and no native detector.
    pub fn new(config: &ScanConfig) -> Self {
        Self {
            native: None,
            software: Arc::new(RqrrDecoder),
            resample_max_edge: config.resample_max_edge,
            full_resolution_cap: config.full_resolution_cap,
            contrast_factor: config.contrast_factor,
            try_inverted: config.try_inverted,
        }
    }

    /// Register a platform detector for the first rung.
    pub fn with_native(mut self, native: Arc<dyn NativeDetector>) -> Self {
        self.native = Some(native);
        self
    }

    /// Replace the software reader used by rungs 2 to 4.
    pub fn with_software(mut self, software: Arc<dyn SoftwareDecoder>) -> Self {
        self.software = software;
        self
    }

    /// Whether a native detector is registered.
    pub fn has_native(&self) -> bool {
        self.native.is_some()
    }

    /// Run the ladder on a decoded raster, stopping at the first payload.
    pub fn decode(&self, raster: &RgbImage) -> Option<Detection> {
        let (width, height) = raster.dimensions();
        if width == 0 || height == 0 {
            return None;
        }

        if let Some(payload) = self.try_native(raster) {
            return Some(Detection {
                payload,
                strategy: Strategy::Native,
            });
        }

        let resampled = downscale(raster, self.resample_max_edge);
        let working = resampled.as_ref().unwrap_or(raster);

        if let Some(payload) = self.try_software(&rgb_to_luma(working)) {
            return Some(Detection {
                payload,
                strategy: Strategy::Resampled,
            });
        }

        let boosted = rgb_to_luma_contrast(working, self.contrast_factor);
        if let Some(payload) = self.try_software(&boosted) {
            return Some(Detection {
                payload,
                strategy: Strategy::EnhancedContrast,
            });
        }

        // Without resampling, rung 4 would repeat rung 2 on identical pixels.
        if resampled.is_none() {
            return None;
        }
        if width.max(height) >= self.full_resolution_cap {
            log::trace!(
                "{}x{} exceeds full-resolution cap {}, giving up",
                width,
                height,
                self.full_resolution_cap
            );
            return None;
        }

        self.try_software(&rgb_to_luma(raster))
            .map(|payload| Detection {
                payload,
                strategy: Strategy::FullResolution,
            })
    }

    fn try_native(&self, raster: &RgbImage) -> Option<String> {
        let native = self.native.as_ref()?;
        match native.detect(raster) {
            Ok(Some(payload)) if !payload.is_empty() => Some(payload),
            Ok(_) => None,
            Err(err) => {
                log::debug!("{} detector failed, falling back: {err}", native.name());
                None
            }
        }
    }

    fn try_software(&self, luma: &GrayImage) -> Option<String> {
        if let Some(payload) = self.read(luma) {
            return Some(payload);
        }
        if self.try_inverted {
            return self.read(&invert(luma));
        }
        None
    }

    fn read(&self, luma: &GrayImage) -> Option<String> {
        self.software.decode(luma).filter(|p| !p.is_empty())
    }
}
