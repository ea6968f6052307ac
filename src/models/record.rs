use super::SeparatorToken;
use image::RgbImage;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Renderable thumbnail for UI preview.
///
/// Reference counted so records can be cloned cheaply; the pixels are freed
/// when the last handle is dropped or released.
#[derive(Clone)]
pub struct PreviewHandle {
    pixels: Arc<RgbImage>,
}

impl PreviewHandle {
    /// Wrap an already downscaled thumbnail.
    pub fn new(pixels: RgbImage) -> Self {
        Self {
            pixels: Arc::new(pixels),
        }
    }

    /// Thumbnail pixels.
    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }

    /// Thumbnail dimensions.
    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    /// Number of live handles sharing these pixels.
    pub fn holders(&self) -> usize {
        Arc::strong_count(&self.pixels)
    }
}

impl fmt::Debug for PreviewHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (w, h) = self.dimensions();
        write!(f, "PreviewHandle({w}x{h})")
    }
}

impl PartialEq for PreviewHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.pixels, &other.pixels)
    }
}

/// One input file after scanning. Immutable once the scanner returns it.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    source: PathBuf,
    position: usize,
    preview: Option<PreviewHandle>,
    capture_timestamp: i64,
    separator: Option<SeparatorToken>,
}

impl ImageRecord {
    /// Build a record. `position` is the file's index in the submitted selection.
    pub fn new(
        source: PathBuf,
        position: usize,
        capture_timestamp: i64,
        separator: Option<SeparatorToken>,
        preview: Option<PreviewHandle>,
    ) -> Self {
        Self {
            source,
            position,
            preview,
            capture_timestamp,
            separator,
        }
    }

    /// Path to the original bytes. The pipeline never copies them.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// File name for display and storage naming.
    pub fn file_name(&self) -> String {
        self.source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.source.display().to_string())
    }

    /// Index of this file in the original selection.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Capture time in epoch milliseconds.
    pub fn capture_timestamp(&self) -> i64 {
        self.capture_timestamp
    }

    /// Separator token, if a QR code was found on this image.
    pub fn separator(&self) -> Option<&SeparatorToken> {
        self.separator.as_ref()
    }

    /// Whether this image starts a new group.
    pub fn is_separator(&self) -> bool {
        self.separator.is_some()
    }

    /// Preview thumbnail, if the raster could be decoded and it was not released.
    pub fn preview(&self) -> Option<&PreviewHandle> {
        self.preview.as_ref()
    }

    /// Give up this record's preview. Returns whether one was held.
    pub fn release_preview(&mut self) -> bool {
        self.preview.take().is_some()
    }
}
