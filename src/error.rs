//! Error types for the intake pipeline.
//!
//! Only [`IntakeError`] ever aborts a batch. The remaining types describe
//! per-file or per-strategy failures that the scanner contains and degrades
//! into default values, or that the upload coordinator reports per file.

use std::path::PathBuf;
use thiserror::Error;

/// Batch-fatal failures.
#[derive(Debug, Error)]
pub enum IntakeError {
    /// A root of the file selection does not exist or cannot be listed.
    #[error("cannot enumerate selection root {path}: {source}")]
    Selection {
        /// Root that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The bounded worker pool could not be created.
    #[error("failed to build scan worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    /// The caller cancelled the batch at a chunk boundary.
    #[error("scan cancelled after {completed} of {total} files")]
    Cancelled {
        /// Files fully scanned before cancellation.
        completed: usize,
        /// Files in the selection.
        total: usize,
    },

    /// A configuration file exists but could not be read or parsed.
    #[error("invalid configuration {path}: {reason}")]
    Config {
        /// Configuration file path.
        path: PathBuf,
        /// Human readable cause.
        reason: String,
    },
}

/// Failure reading embedded capture metadata. Always contained.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// The file could not be opened.
    #[error("metadata io error: {0}")]
    Io(#[from] std::io::Error),
    /// The container has no readable EXIF block.
    #[error("exif error: {0}")]
    Exif(#[from] exif::Error),
    /// The date field exists but is not a valid calendar date.
    #[error("unparseable capture date: {0}")]
    InvalidDate(String),
}

/// Failure turning a file into a pixel raster. Always contained.
#[derive(Debug, Error)]
pub enum RasterError {
    /// The file could not be decoded as an image.
    #[error("image decode failed: {0}")]
    Decode(#[from] image::ImageError),
}

/// Failure inside a platform barcode detector. Always silent.
#[derive(Debug, Error)]
#[error("native detector failed: {0}")]
pub struct DetectorError(pub String);

/// Failure pushing one image to storage. Surfaced to the caller, never retried.
#[derive(Debug, Error)]
pub enum UploadError {
    /// The source bytes could not be read.
    #[error("cannot read {path}: {source}")]
    Source {
        /// Source file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The storage backend failed while writing.
    #[error("storage io error: {0}")]
    Storage(#[from] std::io::Error),
    /// The storage backend refused the upload.
    #[error("upload rejected: {0}")]
    Rejected(String),
}
