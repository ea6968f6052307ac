use image::imageops::{self, FilterType};
use image::RgbImage;

/// Dimensions scaled so the longer edge is at most `max_edge`, aspect preserved.
///
/// Images already within bounds keep their size.
pub fn fit_within(width: u32, height: u32, max_edge: u32) -> (u32, u32) {
    let max_side = width.max(height);
    if max_side <= max_edge || max_side == 0 {
        return (width, height);
    }
    let scale = max_edge as f64 / max_side as f64;
    let new_w = (width as f64 * scale).round().max(1.0) as u32;
    let new_h = (height as f64 * scale).round().max(1.0) as u32;
    (new_w.min(max_edge), new_h.min(max_edge))
}

/// Resample `rgb` to fit within `max_edge`, or return `None` when it already fits.
pub fn downscale(rgb: &RgbImage, max_edge: u32) -> Option<RgbImage> {
    let (width, height) = rgb.dimensions();
    let (new_w, new_h) = fit_within(width, height, max_edge);
    if (new_w, new_h) == (width, height) {
        return None;
    }
    Some(imageops::resize(rgb, new_w, new_h, FilterType::Triangle))
}

/// Thumbnail whose longer edge is `edge`.
pub fn thumbnail(rgb: &RgbImage, edge: u32) -> RgbImage {
    let (width, height) = rgb.dimensions();
    let (new_w, new_h) = fit_within(width, height, edge);
    if (new_w, new_h) == (width, height) {
        return rgb.clone();
    }
    imageops::thumbnail(rgb, new_w, new_h)
}
