//! Raster helpers for the decode ladder
//!
//! - Luminance conversion, contrast boost and polarity inversion
//! - Aspect-preserving resampling and thumbnails

pub mod grayscale;
pub mod resample;
