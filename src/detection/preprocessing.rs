use image::{DynamicImage, GrayImage, Luma, RgbImage};
use imageproc::distance_transform::Norm;
use imageproc::morphology::open;

use crate::error::{DetectionError, Result};

/// Check that the forest mask covers the RGB tile exactly
pub fn check_shape(rgb: &RgbImage, forest_mask: &GrayImage) -> Result<()> {
    if rgb.dimensions() != forest_mask.dimensions() {
        return Err(DetectionError::shape_mismatch(
            rgb.dimensions(),
            forest_mask.dimensions(),
        ));
    }
    Ok(())
}

/// True if at least one pixel of the mask is forest
pub fn has_forest(forest_mask: &GrayImage) -> bool {
    forest_mask.pixels().any(|p| p[0] != 0)
}

/// Zero out every pixel outside the forest mask
pub fn apply_forest_mask(rgb: &RgbImage, forest_mask: &GrayImage) -> RgbImage {
    let mut masked = rgb.clone();
    for (pixel, mask) in masked.pixels_mut().zip(forest_mask.pixels()) {
        if mask[0] == 0 {
            pixel.0 = [0, 0, 0];
        }
    }
    masked
}

/// Complement every channel against 255
pub fn invert(img: &DynamicImage) -> DynamicImage {
    let mut inverted = img.clone();
    inverted.invert();
    inverted
}

// BT.601 luma in 14-bit fixed point, weights for channels 0, 1, 2.
// Channel 0 takes the blue weight: the calibration constants were tuned on
// RGB data run through a BGR conversion.
const GRAY_WEIGHTS: [u32; 3] = [1868, 9617, 4899];
const GRAY_SHIFT: u32 = 14;

/// Convert image to grayscale with the weighting the calibration expects
pub fn to_grayscale(img: &DynamicImage) -> GrayImage {
    let rgb = img.to_rgb8();
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [c0, c1, c2] = rgb.get_pixel(x, y).0;
        let sum = c0 as u32 * GRAY_WEIGHTS[0]
            + c1 as u32 * GRAY_WEIGHTS[1]
            + c2 as u32 * GRAY_WEIGHTS[2]
            + (1 << (GRAY_SHIFT - 1));
        Luma([(sum >> GRAY_SHIFT) as u8])
    })
}

/// `alpha * v + gamma`, rounded and saturated to a byte
fn linear_remap(img: &GrayImage, alpha: f64, gamma: f64) -> GrayImage {
    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        let v = img.get_pixel(x, y)[0] as f64;
        Luma([(alpha * v + gamma).round().clamp(0.0, 255.0) as u8])
    })
}

/// Two-stage brightness then contrast remap.
///
/// A zero brightness or contrast leaves that stage out.
pub fn adjust_brightness_contrast(img: &GrayImage, brightness: i32, contrast: i32) -> GrayImage {
    let mut buf = if brightness != 0 {
        let (shadow, highlight) = if brightness > 0 {
            (brightness as f64, 255.0)
        } else {
            (0.0, 255.0 + brightness as f64)
        };
        linear_remap(img, (highlight - shadow) / 255.0, shadow)
    } else {
        img.clone()
    };

    if contrast != 0 {
        let c = contrast as f64;
        let f = 131.0 * (c + 127.0) / (127.0 * (131.0 - c));
        buf = linear_remap(&buf, f, 127.0 * (1.0 - f));
    }

    buf
}

/// Fixed global threshold: `v >= threshold` becomes 255, the rest 0
pub fn binarize(img: &GrayImage, threshold: u8) -> GrayImage {
    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        if img.get_pixel(x, y)[0] >= threshold {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Erosion followed by dilation with a `(2r+1)x(2r+1)` square element
pub fn open_mask(mask: &GrayImage, radius: u8) -> GrayImage {
    if radius == 0 {
        return mask.clone();
    }
    open(mask, Norm::LInf, radius)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_mask_zeroes_non_forest() {
        let rgb = RgbImage::from_pixel(2, 1, Rgb([10, 20, 30]));
        let mut mask = GrayImage::new(2, 1);
        mask.put_pixel(1, 0, Luma([1]));
        let masked = apply_forest_mask(&rgb, &mask);
        assert_eq!(masked.get_pixel(0, 0).0, [0, 0, 0]);
        assert_eq!(masked.get_pixel(1, 0).0, [10, 20, 30]);
    }

    #[test]
    fn test_invert_complements_channels() {
        let rgb = DynamicImage::ImageRgb8(RgbImage::from_pixel(1, 1, Rgb([0, 100, 255])));
        assert_eq!(invert(&rgb).to_rgb8().get_pixel(0, 0).0, [255, 155, 0]);
    }

    #[test]
    fn test_grayscale_weights() {
        let gray = |rgb: [u8; 3]| {
            let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(1, 1, Rgb(rgb)));
            to_grayscale(&img).get_pixel(0, 0)[0]
        };
        assert_eq!(gray([255, 0, 0]), 29);
        assert_eq!(gray([0, 255, 0]), 150);
        assert_eq!(gray([0, 0, 255]), 76);
        assert_eq!(gray([255, 255, 255]), 255);
        assert_eq!(gray([105, 85, 135]), 102);
    }

    #[test]
    fn test_default_calibration_values() {
        let mut img = GrayImage::new(3, 1);
        img.put_pixel(0, 0, Luma([0]));
        img.put_pixel(1, 0, Luma([128]));
        img.put_pixel(2, 0, Luma([255]));
        let out = adjust_brightness_contrast(&img, 64, 90);
        // 0 -> 64 after brightness, then far below the contrast pivot.
        assert_eq!(out.get_pixel(0, 0)[0], 0);
        assert_eq!(out.get_pixel(2, 0)[0], 255);
        // 128 -> 160 -> 5.459 * 160 - 566.3 = 307 -> saturates
        assert_eq!(out.get_pixel(1, 0)[0], 255);
    }

    #[test]
    fn test_zero_adjustment_is_identity() {
        let img = GrayImage::from_fn(4, 4, |x, y| Luma([(x * 40 + y) as u8]));
        assert_eq!(adjust_brightness_contrast(&img, 0, 0), img);
    }

    #[test]
    fn test_negative_brightness_compresses_highlights() {
        let img = GrayImage::from_pixel(1, 1, Luma([255]));
        let out = adjust_brightness_contrast(&img, -55, 0);
        assert_eq!(out.get_pixel(0, 0)[0], 200);
    }

    #[test]
    fn test_binarize_is_inclusive() {
        let img = GrayImage::from_fn(3, 1, |x, _| Luma([169 + x as u8]));
        let out = binarize(&img, 170);
        assert_eq!(out.get_pixel(0, 0)[0], 0);
        assert_eq!(out.get_pixel(1, 0)[0], 255);
        assert_eq!(out.get_pixel(2, 0)[0], 255);
    }

    #[test]
    fn test_opening_removes_isolated_pixel() {
        let mut mask = GrayImage::new(12, 12);
        mask.put_pixel(1, 1, Luma([255]));
        for y in 5..9 {
            for x in 5..9 {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
        let opened = open_mask(&mask, 1);
        assert_eq!(opened.get_pixel(1, 1)[0], 0);
        assert_eq!(opened.get_pixel(6, 6)[0], 255);
        assert_eq!(opened.get_pixel(5, 5)[0], 255);
        assert_eq!(opened.pixels().filter(|p| p[0] == 255).count(), 16);
    }

    #[test]
    fn test_shape_check() {
        let rgb = RgbImage::new(4, 3);
        assert!(check_shape(&rgb, &GrayImage::new(4, 3)).is_ok());
        assert!(matches!(
            check_shape(&rgb, &GrayImage::new(3, 4)),
            Err(DetectionError::ShapeMismatch { .. })
        ));
    }
}
