//! HDR brightness correction for captured frames.
//!
//! Captures taken with HDR enabled come out washed out. A Reinhard-style global
//! operator compresses highlights while keeping each pixel's colour ratios, and
//! `dark_factor` then darkens the whole frame.

use anyhow::{bail, Result};
use image::Rgb;

use crate::capture::BgrImage;

/// Tone-maps `frame`, returning the input unchanged (and logging) on failure.
pub fn correct(frame: &BgrImage, dark_factor: f32) -> BgrImage {
    match try_correct(frame, dark_factor) {
        Ok(mapped) => mapped,
        Err(e) => {
            crate::log(&format!("HDR correction failed, using raw frame: {}", e));
            frame.clone()
        }
    }
}

/// Rejects a negative or non-finite `dark_factor`.
pub fn check_dark_factor(dark_factor: f32) -> Result<()> {
    if !dark_factor.is_finite() || dark_factor < 0.0 {
        bail!("Invalid dark factor: {}", dark_factor);
    }
    Ok(())
}

/// Tone-maps `frame`.
///
/// Fails on a negative or non-finite `dark_factor`.
pub fn try_correct(frame: &BgrImage, dark_factor: f32) -> Result<BgrImage> {
    check_dark_factor(dark_factor)?;

    let mut out = BgrImage::new(frame.width(), frame.height());
    for (src, dst) in frame.pixels().zip(out.pixels_mut()) {
        let [b, g, r] = src.0.map(|c| f32::from(c) / 255.0);
        let luminance = 0.2126 * r + 0.7152 * g + 0.0722 * b;
        let mapped = luminance / (1.0 + luminance);
        let scale = (mapped / (luminance + 1e-6)).clamp(0.0, 1.5) * dark_factor;

        // Truncating cast, matching a plain float -> u8 conversion
        *dst = Rgb([b, g, r].map(|c| ((c * scale).clamp(0.0, 1.0) * 255.0) as u8));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_black_stays_black() {
        let frame = BgrImage::new(3, 3);
        let out = correct(&frame, 1.0);
        assert!(out.pixels().all(|p| p.0 == [0, 0, 0]));
    }

    #[test]
    fn test_mid_gray_factor() {
        let frame = BgrImage::from_pixel(2, 2, Rgb([128, 128, 128]));
        // Y = 0.502, Y' = Y / (1 + Y) = 0.334
        assert_eq!(correct(&frame, 1.0).get_pixel(0, 0).0, [85, 85, 85]);
        assert_eq!(correct(&frame, 0.3).get_pixel(1, 1).0, [25, 25, 25]);
    }

    #[test]
    fn test_white_is_halved() {
        let frame = BgrImage::from_pixel(1, 1, Rgb([255, 255, 255]));
        assert_eq!(correct(&frame, 1.0).get_pixel(0, 0).0, [127, 127, 127]);
    }

    #[test]
    fn test_colour_ratios_are_kept() {
        // Pure red in BGR order
        let frame = BgrImage::from_pixel(1, 1, Rgb([0, 0, 200]));
        let out = correct(&frame, 1.0).get_pixel(0, 0).0;
        assert_eq!(out[0], 0);
        assert_eq!(out[1], 0);
        assert!(out[2] > 0 && out[2] <= 200);
    }

    #[test]
    fn test_large_dark_factor_saturates() {
        let frame = BgrImage::from_pixel(1, 1, Rgb([255, 255, 255]));
        assert_eq!(correct(&frame, 5.0).get_pixel(0, 0).0, [255, 255, 255]);
    }

    #[test]
    fn test_invalid_dark_factor_returns_input() {
        let frame = BgrImage::from_pixel(2, 1, Rgb([10, 200, 30]));
        assert!(try_correct(&frame, f32::NAN).is_err());
        assert!(try_correct(&frame, -1.0).is_err());
        assert_eq!(correct(&frame, f32::INFINITY), frame);
    }
}
