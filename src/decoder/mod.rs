//! QR Decoder
//!
//! Turns a decoded raster into an optional separator payload by climbing a
//! ladder of detection attempts, cheapest and most likely first.

pub mod native;
pub mod software;
pub mod strategy;

pub use native::NativeDetector;
pub use software::{RqrrDecoder, SoftwareDecoder};
pub use strategy::{Detection, QrDecoder, Strategy};
