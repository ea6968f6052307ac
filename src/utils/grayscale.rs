//! Luminance conversion and the pixel transforms used by the decode ladder.
//!
//! Y = 0.299*R + 0.587*G + 0.114*B, computed in fixed point as
//! Y = (76*R + 150*G + 29*B) >> 8.

use image::{GrayImage, RgbImage};
use rayon::prelude::*;

const COEF_R: u32 = 76;
const COEF_G: u32 = 150;
const COEF_B: u32 = 29;

#[inline]
fn luma(r: u8, g: u8, b: u8) -> u8 {
    let lum = (COEF_R * r as u32 + COEF_G * g as u32 + COEF_B * b as u32) >> 8;
    lum.min(255) as u8
}

/// Convert an RGB raster to 8-bit luminance.
///
/// Rows are converted in parallel; inside a scan chunk this shares the
/// chunk's worker pool.
pub fn rgb_to_luma(rgb: &RgbImage) -> GrayImage {
    rgb_to_luma_with_lut(rgb, None)
}

/// Convert to luminance after applying a CSS `contrast()` boost per channel.
pub fn rgb_to_luma_contrast(rgb: &RgbImage, factor: f32) -> GrayImage {
    let lut = contrast_lut(factor);
    rgb_to_luma_with_lut(rgb, Some(&lut))
}

fn rgb_to_luma_with_lut(rgb: &RgbImage, lut: Option<&[u8; 256]>) -> GrayImage {
    let (width, height) = rgb.dimensions();
    let w = width as usize;
    let mut gray = vec![0u8; w * height as usize];
    if w == 0 {
        return GrayImage::new(width, height);
    }
    let src = rgb.as_raw();

    gray.par_chunks_mut(w).enumerate().for_each(|(y, row)| {
        let row_start = y * w * 3;
        for (x, out) in row.iter_mut().enumerate() {
            let idx = row_start + x * 3;
            let (r, g, b) = match lut {
                Some(lut) => (
                    lut[src[idx] as usize],
                    lut[src[idx + 1] as usize],
                    lut[src[idx + 2] as usize],
                ),
                None => (src[idx], src[idx + 1], src[idx + 2]),
            };
            *out = luma(r, g, b);
        }
    });

    // Buffer length matches width * height by construction.
    GrayImage::from_raw(width, height, gray).unwrap_or_else(|| GrayImage::new(width, height))
}

/// Lookup table for `(c - 128) * factor + 128`, clamped to 0..=255.
pub fn contrast_lut(factor: f32) -> [u8; 256] {
    let mut lut = [0u8; 256];
    for (value, slot) in lut.iter_mut().enumerate() {
        let boosted = (value as f32 - 128.0) * factor + 128.0;
        *slot = boosted.round().clamp(0.0, 255.0) as u8;
    }
    lut
}

/// Swap dark and light so light-on-dark codes read as dark-on-light.
pub fn invert(gray: &GrayImage) -> GrayImage {
    let mut out = gray.clone();
    for px in out.iter_mut() {
        *px = 255 - *px;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_rgb_to_luma() {
        let mut img = RgbImage::new(2, 2);
        img.put_pixel(0, 0, Rgb([255, 255, 255]));
        img.put_pixel(1, 0, Rgb([0, 0, 0]));
        img.put_pixel(0, 1, Rgb([255, 0, 0]));
        img.put_pixel(1, 1, Rgb([0, 255, 0]));

        let gray = rgb_to_luma(&img);
        assert_eq!(gray.get_pixel(0, 0)[0], 254);
        assert_eq!(gray.get_pixel(1, 0)[0], 0);
        let red = gray.get_pixel(0, 1)[0];
        assert!(red > 0 && red < 255);
        assert!(gray.get_pixel(1, 1)[0] > 100);
    }

    #[test]
    fn test_contrast_lut_stretches_midtones() {
        let lut = contrast_lut(2.0);
        assert_eq!(lut[128], 128);
        assert_eq!(lut[0], 0);
        assert_eq!(lut[255], 255);
        assert_eq!(lut[100], 72);
        assert_eq!(lut[160], 192);
        assert_eq!(lut[60], 0);
    }

    #[test]
    fn test_identity_contrast() {
        let lut = contrast_lut(1.0);
        for (i, v) in lut.iter().enumerate() {
            assert_eq!(*v as usize, i);
        }
    }

    #[test]
    fn test_contrast_separates_washed_out_pixels() {
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(0, 0, Rgb([110, 110, 110]));
        img.put_pixel(1, 0, Rgb([150, 150, 150]));
        let plain = rgb_to_luma(&img);
        let boosted = rgb_to_luma_contrast(&img, 2.0);
        let plain_gap = plain.get_pixel(1, 0)[0] - plain.get_pixel(0, 0)[0];
        let boosted_gap = boosted.get_pixel(1, 0)[0] - boosted.get_pixel(0, 0)[0];
        assert!(boosted_gap > plain_gap);
    }

    #[test]
    fn test_invert() {
        let gray = GrayImage::from_raw(3, 1, vec![0, 100, 255]).unwrap();
        let inv = invert(&gray);
        assert_eq!(inv.as_raw(), &vec![255, 155, 0]);
    }

    #[test]
    fn test_empty_raster() {
        let img = RgbImage::new(0, 0);
        let gray = rgb_to_luma(&img);
        assert_eq!(gray.dimensions(), (0, 0));
    }
}
