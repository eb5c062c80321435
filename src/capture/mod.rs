//! Screen capture of the fixed rotation region.
//!
//! This module provides:
//! - The capture rectangle (`Region`) and the BGR frame type (`BgrImage`)
//! - Platform seams for the foreground check and the raw screen grab
//! - `FrameSource`, which combines both and never fails the caller

#[cfg(windows)]
pub mod screenshot;
#[cfg(not(windows))]
pub mod stub;
#[cfg(windows)]
pub mod window;

use anyhow::{bail, Result};
use image::{DynamicImage, ImageBuffer, Rgb};
use std::sync::Arc;

/// A 3-channel, 8-bit image whose channels are stored in B, G, R order.
///
/// `Rgb<u8>` is used only as a 3-byte pixel container; index 0 is blue
/// and index 2 is red everywhere in this crate.
pub type BgrImage = ImageBuffer<Rgb<u8>, Vec<u8>>;

/// A screen rectangle in absolute pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    /// Creates a region, rejecting empty extents.
    pub fn new(left: i32, top: i32, width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            bail!("Capture region must be non-empty, got {}x{}", width, height);
        }
        Ok(Self {
            left,
            top,
            width,
            height,
        })
    }

    /// Creates a region from two corners. The second corner is exclusive.
    pub fn from_corners(x1: i32, y1: i32, x2: i32, y2: i32) -> Result<Self> {
        let left = x1.min(x2);
        let top = y1.min(y2);
        let width = x1.abs_diff(x2);
        let height = y1.abs_diff(y2);
        Self::new(left, top, width, height)
    }
}

/// Reports whether the target application currently owns the foreground window.
pub trait ForegroundOracle: Send + Sync {
    fn is_target_foreground(&self) -> bool;
}

/// Reads raw pixels for a screen region.
pub trait ScreenGrabber: Send {
    fn grab(&mut self, region: &Region) -> Result<BgrImage>;
}

/// Converts any decoded image into a BGR buffer.
///
/// Grayscale and alpha sources are flattened to three channels; alpha is dropped.
pub fn bgr_from_dynamic(img: &DynamicImage) -> BgrImage {
    let mut bgr = img.to_rgb8();
    for pixel in bgr.pixels_mut() {
        pixel.0.swap(0, 2);
    }
    bgr
}

/// Builds a BGR image from top-down BGRA rows (the layout GDI returns).
pub fn bgr_from_bgra(width: u32, height: u32, data: &[u8], row_pitch: usize) -> Result<BgrImage> {
    let needed = row_pitch * height as usize;
    if row_pitch < width as usize * 4 || data.len() < needed {
        bail!(
            "BGRA buffer too small: {} bytes for {}x{} (pitch {})",
            data.len(),
            width,
            height,
            row_pitch
        );
    }

    let mut img = BgrImage::new(width, height);
    for y in 0..height {
        let row = &data[y as usize * row_pitch..];
        for x in 0..width {
            let offset = x as usize * 4;
            img.put_pixel(x, y, Rgb([row[offset], row[offset + 1], row[offset + 2]]));
        }
    }
    Ok(img)
}

/// Produces one frame per call, or `None` when no frame should be processed.
///
/// A background target and a failed grab both yield `None`; neither is an error
/// for the caller, which is expected to back off before retrying.
pub struct FrameSource {
    grabber: Box<dyn ScreenGrabber>,
    oracle: Arc<dyn ForegroundOracle>,
    /// Last observed foreground state, used to log only on change.
    was_foreground: Option<bool>,
}

impl FrameSource {
    pub fn new(grabber: Box<dyn ScreenGrabber>, oracle: Arc<dyn ForegroundOracle>) -> Self {
        Self {
            grabber,
            oracle,
            was_foreground: None,
        }
    }

    /// Captures `region`, gated on the foreground check.
    pub fn capture(&mut self, region: &Region) -> Option<BgrImage> {
        let foreground = self.oracle.is_target_foreground();
        if self.was_foreground != Some(foreground) {
            if foreground {
                crate::log("Target window is in the foreground, capturing");
            } else {
                crate::log("Target window is not in the foreground, skipping capture");
            }
            self.was_foreground = Some(foreground);
        }
        if !foreground {
            return None;
        }

        match self.grabber.grab(region) {
            Ok(frame) if frame.width() == region.width && frame.height() == region.height => {
                Some(frame)
            }
            Ok(frame) => {
                crate::log(&format!(
                    "Captured frame is {}x{}, expected {}x{}; skipping",
                    frame.width(),
                    frame.height(),
                    region.width,
                    region.height
                ));
                None
            }
            Err(e) => {
                crate::log(&format!("Failed to capture region: {}", e));
                None
            }
        }
    }
}

/// Creates the foreground oracle for the current OS.
pub fn create_foreground_oracle(target_process: &str) -> Arc<dyn ForegroundOracle> {
    #[cfg(windows)]
    {
        Arc::new(window::ForegroundProcess::new(target_process))
    }
    #[cfg(not(windows))]
    {
        Arc::new(stub::StubForeground::new(target_process))
    }
}

/// Creates the screen grabber for the current OS.
pub fn create_screen_grabber() -> Box<dyn ScreenGrabber> {
    #[cfg(windows)]
    {
        Box::new(screenshot::GdiScreenGrabber)
    }
    #[cfg(not(windows))]
    {
        Box::new(stub::StubGrabber)
    }
}
