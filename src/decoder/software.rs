use image::GrayImage;

/// Software QR reader over an 8-bit luminance raster (dark modules on light).
pub trait SoftwareDecoder: Send + Sync {
    /// Return the first decodable payload on `luma`, if any.
    fn decode(&self, luma: &GrayImage) -> Option<String>;
}

/// Default software reader backed by `rqrr`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RqrrDecoder;

impl SoftwareDecoder for RqrrDecoder {
    fn decode(&self, luma: &GrayImage) -> Option<String> {
        let (width, height) = luma.dimensions();
        if width == 0 || height == 0 {
            return None;
        }
        let w = width as usize;
        let pixels = luma.as_raw();
        let mut prepared =
            rqrr::PreparedImage::prepare_from_greyscale(w, height as usize, |x, y| {
                pixels[y * w + x]
            });
        let grids = prepared.detect_grids();
        log::trace!("rqrr: {} candidate grids on {}x{}", grids.len(), width, height);

        for grid in grids {
            match grid.decode() {
                Ok((_meta, content)) => return Some(content),
                Err(err) => log::trace!("rqrr: grid rejected: {err:?}"),
            }
        }
        None
    }
}
