//! Texture image loading and the procedural fallback.

use image::{ImageError, Rgba, RgbaImage};
use std::path::Path;

/// Decode a PNG file into RGBA8 pixels.
pub fn load_rgba<P: AsRef<Path>>(path: P) -> Result<RgbaImage, ImageError> {
    Ok(image::open(path)?.to_rgba8())
}

/// Procedural checkerboard used when no texture is configured.
pub fn checkerboard(size: u32, cells: u32) -> RgbaImage {
    let cell = (size / cells).max(1);
    RgbaImage::from_fn(size, size, |x, y| {
        if ((x / cell) + (y / cell)) % 2 == 0 {
            Rgba([220, 220, 220, 255])
        } else {
            Rgba([90, 90, 90, 255])
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkerboard_alternates() {
        let img = checkerboard(8, 4);
        assert_eq!(img.dimensions(), (8, 8));
        assert_ne!(img.get_pixel(0, 0), img.get_pixel(2, 0));
        assert_eq!(img.get_pixel(0, 0), img.get_pixel(4, 0));
    }
}
