use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, Luma};

/// Linear upscale factor applied before recognition.
pub const UPSCALE_FACTOR: u32 = 3;

/// Contrast multiplier, applied before sharpening.
pub const CONTRAST_FACTOR: f32 = 2.0;

/// Sharpness multiplier.
pub const SHARPNESS_FACTOR: f32 = 2.0;

/// Upscaling is skipped when the result would exceed this many pixels per side.
const MAX_UPSCALED_SIDE: u32 = 16_384;

/// Threshold used by the binarized strategy, on the enhanced image.
pub const BINARIZE_THRESHOLD: u8 = 160;

/// Normalizes a captured image for text recognition.
///
/// Grayscale → contrast ×2 → sharpness ×2 → 3× Lanczos upscale. An empty image
/// is returned unchanged; the pipeline continues with whatever it has.
pub fn enhance_for_ocr(img: &DynamicImage) -> DynamicImage {
    if img.width() == 0 || img.height() == 0 {
        return img.clone();
    }

    let gray = img.to_luma8();
    let gray = adjust_contrast(&gray, CONTRAST_FACTOR);
    let gray = adjust_sharpness(&gray, SHARPNESS_FACTOR);
    DynamicImage::ImageLuma8(upscale(&gray, UPSCALE_FACTOR))
}

/// Scales contrast around the mean gray level.
///
/// Each pixel becomes `mean + factor * (pixel - mean)`, clamped to 0..=255.
pub fn adjust_contrast(img: &GrayImage, factor: f32) -> GrayImage {
    let count = (img.width() as u64) * (img.height() as u64);
    if count == 0 {
        return img.clone();
    }

    let sum: u64 = img.pixels().map(|p| p[0] as u64).sum();
    let mean = ((sum as f64 / count as f64) + 0.5).floor() as f32;

    let mut output = img.clone();
    for pixel in output.pixels_mut() {
        pixel[0] = blend(mean, pixel[0] as f32, factor);
    }
    output
}

/// Sharpens by extrapolating away from a smoothed copy.
///
/// The smoothed copy uses a 3x3 kernel weighted 5 at the center and 1 around
/// it. Border pixels have no full neighborhood and are left as they are.
pub fn adjust_sharpness(img: &GrayImage, factor: f32) -> GrayImage {
    let (width, height) = img.dimensions();
    let mut output = img.clone();
    if width < 3 || height < 3 {
        return output;
    }

    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let mut sum = 0u32;
            for dy in 0..3 {
                for dx in 0..3 {
                    let weight = if dx == 1 && dy == 1 { 5 } else { 1 };
                    sum += weight * img.get_pixel(x + dx - 1, y + dy - 1)[0] as u32;
                }
            }
            let smoothed = (sum as f32 / 13.0).round();
            let original = img.get_pixel(x, y)[0] as f32;
            output.put_pixel(x, y, Luma([blend(smoothed, original, factor)]));
        }
    }
    output
}

/// `degenerate + factor * (value - degenerate)`, rounded and clamped.
fn blend(degenerate: f32, value: f32, factor: f32) -> u8 {
    (degenerate + factor * (value - degenerate))
        .round()
        .clamp(0.0, 255.0) as u8
}

/// Enlarges by an integer factor with Lanczos resampling.
pub fn upscale(img: &GrayImage, factor: u32) -> GrayImage {
    let (width, height) = img.dimensions();
    let target = width
        .checked_mul(factor)
        .zip(height.checked_mul(factor))
        .filter(|&(w, h)| w <= MAX_UPSCALED_SIDE && h <= MAX_UPSCALED_SIDE);

    match target {
        Some((w, h)) if w > 0 && h > 0 => image::imageops::resize(img, w, h, FilterType::Lanczos3),
        _ => img.clone(),
    }
}

/// Converts to binary by keeping only bright pixels.
///
/// Pixels brighter than `threshold` become black (text), everything else
/// becomes white (background). The game draws light text on a dark panel;
/// Tesseract prefers dark text on white.
pub fn threshold_bright_pixels(img: &GrayImage, threshold: u8) -> GrayImage {
    let (width, height) = img.dimensions();
    let mut output = GrayImage::new(width, height);

    for (x, y, pixel) in img.enumerate_pixels() {
        let value = if pixel[0] > threshold { 0u8 } else { 255u8 };
        output.put_pixel(x, y, Luma([value]));
    }

    output
}

/// Inverts gray levels.
pub fn invert(img: &GrayImage) -> GrayImage {
    let mut output = img.clone();
    for pixel in output.pixels_mut() {
        pixel[0] = 255 - pixel[0];
    }
    output
}
