//! Image normalization ahead of recognition.
//!
//! Grayscale, smart rescale, contrast stretch, light denoise, binarization.
//! Pure transformations; the only side effect is the optional debug dump of
//! the preprocessed image.

use std::path::Path;

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage};
use imageproc::contrast::{stretch_contrast, threshold};
use imageproc::filter::median_filter;
use tracing::{debug, warn};

use crate::error::ApiError;

/// Binarization cutoff on the 0-255 luma scale.
const BINARIZE_THRESHOLD: u8 = 160;

/// Decode an image file, rejecting anything the codec layer cannot read.
pub fn load(path: &Path) -> Result<DynamicImage, ApiError> {
    image::open(path).map_err(|e| ApiError::InvalidImage(e.to_string()))
}

/// Normalize a decoded image for OCR.
///
/// Small scans are upscaled (recognition quality), very large ones downscaled
/// (speed); mid-size images get a modest 1.5x bump.
pub fn normalize(img: &DynamicImage) -> GrayImage {
    let mut gray = img.to_luma8();

    let (w, h) = gray.dimensions();
    let max_dim = w.max(h);
    let scale = if max_dim < 1000 {
        Some(2.0)
    } else if max_dim < 1400 {
        Some(1.5)
    } else if max_dim > 3000 {
        Some(2000.0 / max_dim as f32)
    } else {
        None
    };
    if let Some(s) = scale {
        let nw = ((w as f32 * s) as u32).max(1);
        let nh = ((h as f32 * s) as u32).max(1);
        debug!("rescaling {}x{} -> {}x{}", w, h, nw, nh);
        gray = imageops::resize(&gray, nw, nh, FilterType::Lanczos3);
    }

    gray = autocontrast(&gray);
    gray = median_filter(&gray, 1, 1);
    threshold(&gray, BINARIZE_THRESHOLD)
}

/// Stretch the observed luma range to the full 0-255 scale.
fn autocontrast(img: &GrayImage) -> GrayImage {
    let mut lo = u8::MAX;
    let mut hi = u8::MIN;
    for p in img.pixels() {
        lo = lo.min(p.0[0]);
        hi = hi.max(p.0[0]);
    }
    if lo >= hi {
        // flat image, nothing to stretch
        return img.clone();
    }
    stretch_contrast(img, lo, hi)
}

/// Apply an engine-reported clockwise rotation (90/180/270 degrees).
/// Any other value leaves the image untouched.
pub fn apply_rotation(img: GrayImage, degrees: u32) -> GrayImage {
    match degrees {
        90 => imageops::rotate90(&img),
        180 => imageops::rotate180(&img),
        270 => imageops::rotate270(&img),
        _ => img,
    }
}

/// Dump the preprocessed image for inspection. Failures are logged, never fatal.
pub fn save_debug(img: &GrayImage, debug_dir: &Path, stem: &str) {
    if let Err(e) = std::fs::create_dir_all(debug_dir) {
        warn!("cannot create debug dir {:?}: {}", debug_dir, e);
        return;
    }
    let path = debug_dir.join(format!("pre_{stem}.png"));
    if let Err(e) = img.save(&path) {
        warn!("failed to save debug image {:?}: {}", path, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn flat(w: u32, h: u32, v: u8) -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_pixel(w, h, Luma([v])))
    }

    #[test]
    fn test_small_image_upscaled_2x() {
        let out = normalize(&flat(400, 300, 200));
        assert_eq!(out.dimensions(), (800, 600));
    }

    #[test]
    fn test_mid_image_upscaled_1_5x() {
        let out = normalize(&flat(1200, 900, 200));
        assert_eq!(out.dimensions(), (1800, 1350));
    }

    #[test]
    fn test_large_image_downscaled_to_2000() {
        let out = normalize(&flat(4000, 2000, 200));
        assert_eq!(out.dimensions().0, 2000);
    }

    #[test]
    fn test_normal_image_keeps_size() {
        let out = normalize(&flat(2000, 1500, 200));
        assert_eq!(out.dimensions(), (2000, 1500));
    }

    #[test]
    fn test_binarization_is_two_level() {
        let mut img = GrayImage::from_pixel(1600, 40, Luma([220]));
        for x in 0..800 {
            img.put_pixel(x, 10, Luma([40]));
        }
        let out = normalize(&DynamicImage::ImageLuma8(img));
        assert!(out.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
    }

    #[test]
    fn test_rotation_swaps_dimensions() {
        let img = GrayImage::from_pixel(30, 20, Luma([0]));
        assert_eq!(apply_rotation(img.clone(), 90).dimensions(), (20, 30));
        assert_eq!(apply_rotation(img.clone(), 180).dimensions(), (30, 20));
        assert_eq!(apply_rotation(img.clone(), 270).dimensions(), (20, 30));
        assert_eq!(apply_rotation(img, 45).dimensions(), (30, 20));
    }

    #[test]
    fn test_load_rejects_non_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not_an_image.png");
        std::fs::write(&path, b"plain text").unwrap();
        assert!(matches!(load(&path), Err(ApiError::InvalidImage(_))));
    }
}
