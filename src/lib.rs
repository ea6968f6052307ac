//! qr_intake - batch photo intake regrouped by QR separator cards
//!
//! Photographers interleave "separator" shots of an attendee's QR token with
//! ordinary photos. Given an unordered bundle of images, this crate finds the
//! separators (through a ladder of increasingly expensive decode attempts),
//! orders everything by capture time, and partitions the sequence into one
//! group per attendee, ready to upload.
//!
//! ```no_run
//! use qr_intake::{ScanConfig, process_selection};
//! use std::path::PathBuf;
//!
//! let groups = process_selection(&[PathBuf::from("shoot/")], ScanConfig::default())?;
//! for group in &groups {
//!     println!("{}: {} photos", group.subject(), group.members().len());
//! }
//! # Ok::<(), qr_intake::IntakeError>(())
//! ```

#![warn(missing_docs)]
#![allow(clippy::missing_docs_in_private_items)]

/// Scanner and upload configuration
pub mod config;
/// QR decode strategy ladder and decoder backends
pub mod decoder;
/// Error types
pub mod error;
/// Separator-driven partitioning of scanned records
pub mod grouping;
/// Core data structures (ImageRecord, SeparatorToken, Group)
pub mod models;
/// Chunked batch scanner
pub mod pipeline;
/// Progress events and cancellation
pub mod progress;
/// Capture-time resolution
pub mod timestamp;
/// File selection and raster loading
pub mod tools;
/// Upload coordination and storage sinks
pub mod upload;
/// Utility functions (grayscale, contrast, resampling)
pub mod utils;
/// Hot-folder debounce
pub mod watch;

pub use config::{ScanConfig, UploadConfig};
pub use decoder::{Detection, QrDecoder, Strategy};
pub use error::IntakeError;
pub use grouping::group_records;
pub use models::{Group, ImageRecord, PreviewHandle, SeparatorToken, Subject};
pub use pipeline::{BatchScanner, ScanReport, ScanTelemetry};
pub use progress::{CancelToken, ScanEvent};
pub use upload::{DirectoryStore, UploadCoordinator, UploadSink};

use std::path::PathBuf;

/// Scan a selection of files and folders and group the result.
///
/// Convenience wrapper over [`BatchScanner::scan_paths`] and
/// [`group_records`] with the default decoder and EXIF resolver.
pub fn process_selection(roots: &[PathBuf], config: ScanConfig) -> Result<Vec<Group>, IntakeError> {
    let report = BatchScanner::new(config)?.scan_paths(roots)?;
    log::info!(
        "{} files, {} separators in {:.2?}",
        report.telemetry.files,
        report.telemetry.separators,
        report.elapsed
    );
    Ok(report.into_groups())
}
