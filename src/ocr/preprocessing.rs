//! Image preprocessing applied once per image before any OCR pass.
//!
//! Fixed order: luminance conversion, contrast enhancement, sharpening.

use image::{DynamicImage, GrayImage, Luma};
use tracing::debug;

pub const DEFAULT_CONTRAST_FACTOR: f32 = 2.0;

/// 3x3 sharpening kernel (centre 32, neighbours -2) normalised by 16
const SHARPEN_KERNEL: [[f32; 3]; 3] = [
    [-2.0, -2.0, -2.0],
    [-2.0, 32.0, -2.0],
    [-2.0, -2.0, -2.0],
];
const SHARPEN_SCALE: f32 = 16.0;

pub fn preprocess(image: &DynamicImage, contrast_factor: f32) -> GrayImage {
    let gray = image.to_luma8();
    let enhanced = enhance_contrast(&gray, contrast_factor);
    let sharpened = sharpen(&enhanced);

    debug!(
        "Preprocessed {}x{} image (contrast x{:.1}, sharpened)",
        sharpened.width(),
        sharpened.height(),
        contrast_factor
    );

    sharpened
}

/// Mean luminance rounded to the nearest level
pub fn mean_luminance(img: &GrayImage) -> f32 {
    let pixel_count = img.width() as u64 * img.height() as u64;
    if pixel_count == 0 {
        return 0.0;
    }
    let sum: u64 = img.pixels().map(|p| p[0] as u64).sum();
    (sum as f64 / pixel_count as f64).round() as f32
}

/// Scale every pixel's distance from the mean luminance by `factor`
pub fn enhance_contrast(img: &GrayImage, factor: f32) -> GrayImage {
    let mean = mean_luminance(img);
    let mut enhanced = img.clone();

    for pixel in enhanced.pixels_mut() {
        let value = mean + factor * (pixel[0] as f32 - mean);
        pixel[0] = value.round().clamp(0.0, 255.0) as u8;
    }

    enhanced
}

/// Convolve with the sharpening kernel; border pixels are copied unchanged
pub fn sharpen(img: &GrayImage) -> GrayImage {
    let (width, height) = img.dimensions();
    if width < 3 || height < 3 {
        return img.clone();
    }

    let mut sharpened = img.clone();

    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let mut sum = 0.0;

            for (ky, row) in SHARPEN_KERNEL.iter().enumerate() {
                for (kx, weight) in row.iter().enumerate() {
                    let px = img.get_pixel(x + kx as u32 - 1, y + ky as u32 - 1)[0] as f32;
                    sum += px * weight;
                }
            }

            let value = (sum / SHARPEN_SCALE).round().clamp(0.0, 255.0) as u8;
            sharpened.put_pixel(x, y, Luma([value]));
        }
    }

    sharpened
}
