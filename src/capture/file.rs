//! Image file standing in for the screen.
//!
//! The file is re-read on every capture so an external tool can keep
//! overwriting it.

use image::DynamicImage;
use std::path::PathBuf;

use super::ScreenCapture;
use crate::config::ScreenRect;

#[derive(Clone, Debug)]
pub struct ImageFileCapture {
    path: PathBuf,
}

impl ImageFileCapture {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn load(&self) -> Option<DynamicImage> {
        match image::open(&self.path) {
            Ok(img) => Some(img),
            Err(e) => {
                crate::log(&format!(
                    "Failed to read capture source {}: {}",
                    self.path.display(),
                    e
                ));
                None
            }
        }
    }
}

impl ScreenCapture for ImageFileCapture {
    fn capture_region(&self, rect: ScreenRect) -> Option<DynamicImage> {
        crop_rect(&self.load()?, rect)
    }

    fn capture_full_screen(&self) -> Option<DynamicImage> {
        self.load().map(|img| DynamicImage::ImageRgba8(img.to_rgba8()))
    }
}

/// Crops `rect` out of `img`, clamped to the image bounds.
///
/// Returns `None` when nothing of the rect lies inside the image.
pub fn crop_rect(img: &DynamicImage, rect: ScreenRect) -> Option<DynamicImage> {
    let (w, h) = (img.width(), img.height());

    let x0 = (rect.x.max(0) as u32).min(w);
    let y0 = (rect.y.max(0) as u32).min(h);
    // A negative origin eats into the requested size
    let skipped_x = rect.x.min(0).unsigned_abs();
    let skipped_y = rect.y.min(0).unsigned_abs();
    let rw = rect.width.saturating_sub(skipped_x).min(w - x0);
    let rh = rect.height.saturating_sub(skipped_y).min(h - y0);

    if rw == 0 || rh == 0 {
        return None;
    }
    let rgba = img.to_rgba8();
    Some(DynamicImage::ImageRgba8(
        image::imageops::crop_imm(&rgba, x0, y0, rw, rh).to_image(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba};
    use tempfile::tempdir;

    fn gradient(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(ImageBuffer::from_fn(w, h, |x, y| {
            Rgba([x as u8, y as u8, 0, 255])
        }))
    }

    #[test]
    fn test_crop_rect() {
        let cropped = crop_rect(&gradient(100, 200), ScreenRect::new(10, 50, 50, 20)).unwrap();
        assert_eq!((cropped.width(), cropped.height()), (50, 20));
        let px = cropped.to_rgba8().get_pixel(0, 0).0;
        assert_eq!((px[0], px[1]), (10, 50));
    }

    #[test]
    fn test_crop_rect_clamps() {
        let img = gradient(100, 100);
        let cropped = crop_rect(&img, ScreenRect::new(80, 90, 50, 50)).unwrap();
        assert_eq!((cropped.width(), cropped.height()), (20, 10));

        let cropped = crop_rect(&img, ScreenRect::new(-10, -5, 30, 30)).unwrap();
        assert_eq!((cropped.width(), cropped.height()), (20, 25));
        assert_eq!(cropped.to_rgba8().get_pixel(0, 0).0[0], 0);
    }

    #[test]
    fn test_crop_rect_outside_is_none() {
        let img = gradient(10, 10);
        assert!(crop_rect(&img, ScreenRect::new(10, 0, 5, 5)).is_none());
        assert!(crop_rect(&img, ScreenRect::new(-20, 0, 5, 5)).is_none());
    }

    #[test]
    fn test_file_capture() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("screen.png");
        gradient(40, 30).save(&path).unwrap();

        let source = ImageFileCapture::new(path);
        let full = source.capture_full_screen().unwrap();
        assert_eq!((full.width(), full.height()), (40, 30));
        let region = source.capture_region(ScreenRect::new(5, 5, 10, 10)).unwrap();
        assert_eq!((region.width(), region.height()), (10, 10));
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = tempdir().unwrap();
        let source = ImageFileCapture::new(dir.path().join("nope.png"));
        assert!(source.capture_full_screen().is_none());
    }
}
