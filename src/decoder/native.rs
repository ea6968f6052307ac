use crate::error::DetectorError;
use image::RgbImage;

/// Platform-provided barcode detector, tried first at full resolution.
///
/// Hosts that have one (a mobile OS vision API, a hardware scanner SDK)
/// register it on the [`QrDecoder`](super::QrDecoder). Errors are never
/// surfaced; the ladder just moves on.
pub trait NativeDetector: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Return the first QR payload found on `raster`, if any.
    fn detect(&self, raster: &RgbImage) -> Result<Option<String>, DetectorError>;
}
