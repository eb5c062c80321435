//! Colour template matching.
//!
//! Scores are zero-mean normalized cross-correlation over all three channels,
//! the same quantity OpenCV calls `TM_CCOEFF_NORMED`:
//!
//! ```text
//! score = Σ_c Σ (T_c - mean(T_c)) (I_c - mean(I_c))
//!         / sqrt( Σ_c var(T_c) * Σ_c var(I_c) )
//! ```
//!
//! Template means are subtracted once when a template is prepared, so the
//! numerator is a plain dot product against the raw window. Window variances
//! come from per-channel integral images built once per frame. Templates, and
//! rows within a template, are scanned in parallel; results are merged in
//! order so ties resolve the same way as a sequential scan.

use anyhow::{bail, Result};
use image::imageops::{self, FilterType};
use rayon::prelude::*;
use std::collections::HashMap;

use crate::capture::BgrImage;
use crate::rotation::library::Template;

pub const MIN_SCALE: f32 = 0.1;
pub const MAX_SCALE: f32 = 5.0;

/// Scales this close to 1.0 use the template as-is.
const IDENTITY_SCALE_TOLERANCE: f32 = 1e-3;

/// Variance at or below this is treated as a flat window.
const MIN_VARIANCE: f64 = 1e-6;

/// Best match across a template pool.
#[derive(Clone, Debug, PartialEq)]
pub struct MatchResult {
    pub name: Option<String>,
    pub score: f32,
    /// Top-left corner of the best window in frame pixels
    pub location: Option<(u32, u32)>,
    /// Size of the (scaled) template that produced the score
    pub size: Option<(u32, u32)>,
}

impl MatchResult {
    /// Result when no template could be evaluated.
    pub fn none() -> Self {
        Self {
            name: None,
            score: -1.0,
            location: None,
            size: None,
        }
    }
}

/// A template resized to the active scale with its means removed.
#[derive(Clone, Debug)]
struct PreparedTemplate {
    width: u32,
    height: u32,
    /// Mean-subtracted values, interleaved B, G, R
    zero_mean: Vec<f32>,
    /// Σ_c Σ (T_c - mean(T_c))²
    variance: f64,
}

impl PreparedTemplate {
    fn new(image: &BgrImage, scale: f32) -> Result<Self> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            bail!("Template image is empty");
        }

        let scaled;
        let image = if (scale - 1.0).abs() > IDENTITY_SCALE_TOLERANCE {
            let new_width = ((width as f32 * scale).round() as u32).max(1);
            let new_height = ((height as f32 * scale).round() as u32).max(1);
            scaled = imageops::resize(image, new_width, new_height, FilterType::Triangle);
            &scaled
        } else {
            image
        };

        let (width, height) = image.dimensions();
        let count = f64::from(width * height);
        let mut means = [0.0f64; 3];
        for pixel in image.pixels() {
            for (mean, value) in means.iter_mut().zip(pixel.0) {
                *mean += f64::from(value);
            }
        }
        for mean in &mut means {
            *mean /= count;
        }

        let mut zero_mean = Vec::with_capacity(image.as_raw().len());
        let mut variance = 0.0;
        for pixel in image.pixels() {
            for (channel, value) in pixel.0.into_iter().enumerate() {
                let centered = f64::from(value) - means[channel];
                variance += centered * centered;
                zero_mean.push(centered as f32);
            }
        }

        Ok(Self {
            width,
            height,
            zero_mean,
            variance,
        })
    }
}

/// Summed-area tables of a frame, per channel, for values and squares.
struct IntegralImage {
    stride: usize,
    sums: [Vec<f64>; 3],
    squares: [Vec<f64>; 3],
}

impl IntegralImage {
    fn new(frame: &BgrImage) -> Self {
        let (width, height) = frame.dimensions();
        let stride = width as usize + 1;
        let len = stride * (height as usize + 1);
        let mut sums = [vec![0.0; len], vec![0.0; len], vec![0.0; len]];
        let mut squares = [vec![0.0; len], vec![0.0; len], vec![0.0; len]];

        for y in 0..height as usize {
            let mut row_sum = [0.0f64; 3];
            let mut row_sq = [0.0f64; 3];
            for x in 0..width as usize {
                let pixel = frame.get_pixel(x as u32, y as u32).0;
                let idx = (y + 1) * stride + x + 1;
                for c in 0..3 {
                    let v = f64::from(pixel[c]);
                    row_sum[c] += v;
                    row_sq[c] += v * v;
                    sums[c][idx] = sums[c][idx - stride] + row_sum[c];
                    squares[c][idx] = squares[c][idx - stride] + row_sq[c];
                }
            }
        }

        Self {
            stride,
            sums,
            squares,
        }
    }

    fn rect(table: &[f64], stride: usize, x: usize, y: usize, w: usize, h: usize) -> f64 {
        let top = y * stride;
        let bottom = (y + h) * stride;
        table[bottom + x + w] - table[bottom + x] - table[top + x + w] + table[top + x]
    }

    /// Σ_c variance (times pixel count) of the window at (x, y).
    fn window_variance(&self, x: usize, y: usize, w: usize, h: usize) -> f64 {
        let count = (w * h) as f64;
        (0..3)
            .map(|c| {
                let sum = Self::rect(&self.sums[c], self.stride, x, y, w, h);
                let sq = Self::rect(&self.squares[c], self.stride, x, y, w, h);
                sq - sum * sum / count
            })
            .sum()
    }
}

/// Finds the best-scoring template in a frame.
///
/// Owns the scaled-template cache; only one scale is kept at a time.
#[derive(Default)]
pub struct TemplateMatcher {
    cache: HashMap<String, PreparedTemplate>,
    cache_scale: Option<f32>,
}

impl TemplateMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scale the cache currently holds templates for.
    #[cfg(test)]
    pub fn cached_scale(&self) -> Option<f32> {
        self.cache_scale
    }

    #[cfg(test)]
    pub fn cached_templates(&self) -> usize {
        self.cache.len()
    }

    /// Matches every template against `frame` and returns the best one.
    ///
    /// Templates larger than the frame at this scale are skipped. Exact score
    /// ties go to the template that comes first in `templates`.
    pub fn match_best(&mut self, frame: &BgrImage, templates: &[Template], scale: f32) -> MatchResult {
        let scale = if scale.is_finite() {
            scale.clamp(MIN_SCALE, MAX_SCALE)
        } else {
            1.0
        };
        if self.cache_scale != Some(scale) {
            self.cache.clear();
            self.cache_scale = Some(scale);
        }

        let (frame_width, frame_height) = frame.dimensions();
        if frame_width == 0 || frame_height == 0 || templates.is_empty() {
            return MatchResult::none();
        }

        for template in templates {
            if self.cache.contains_key(&template.name) {
                continue;
            }
            match PreparedTemplate::new(&template.image, scale) {
                Ok(prepared) => {
                    self.cache.insert(template.name.clone(), prepared);
                }
                Err(e) => crate::log(&format!("Skipping template '{}': {}", template.name, e)),
            }
        }

        let candidates: Vec<(&Template, &PreparedTemplate)> = templates
            .iter()
            .filter_map(|template| {
                let prepared = self.cache.get(&template.name)?;
                let fits = prepared.width <= frame_width && prepared.height <= frame_height;
                fits.then_some((template, prepared))
            })
            .collect();

        let integral = IntegralImage::new(frame);
        let scored: Vec<(f32, (u32, u32))> = candidates
            .par_iter()
            .map(|(_, prepared)| best_location(frame, &integral, prepared))
            .collect();

        let mut best = MatchResult::none();
        for ((template, prepared), (score, location)) in candidates.iter().zip(scored) {
            if best.name.is_none() || score > best.score {
                best = MatchResult {
                    name: Some(template.name.clone()),
                    score,
                    location: Some(location),
                    size: Some((prepared.width, prepared.height)),
                };
            }
        }
        best
    }
}

/// Best score and its top-left corner; the first maximum in raster order wins.
fn best_location(frame: &BgrImage, integral: &IntegralImage, tpl: &PreparedTemplate) -> (f32, (u32, u32)) {
    if tpl.variance <= MIN_VARIANCE {
        return (0.0, (0, 0));
    }

    let frame_width = frame.width() as usize;
    let tw = tpl.width as usize;
    let th = tpl.height as usize;
    let raw = frame.as_raw();
    let row_bytes = frame_width * 3;
    let tpl_row_len = tw * 3;

    let rows: Vec<(f32, usize)> = (0..=(frame.height() as usize - th))
        .into_par_iter()
        .map(|y| {
            let mut row_best = (f32::NEG_INFINITY, 0);
            for x in 0..=(frame_width - tw) {
                let var_i = integral.window_variance(x, y, tw, th);
                let score = if var_i <= MIN_VARIANCE {
                    0.0
                } else {
                    let mut dot = 0.0f64;
                    for ty in 0..th {
                        let start = (y + ty) * row_bytes + x * 3;
                        let window_row = &raw[start..start + tpl_row_len];
                        let tpl_row = &tpl.zero_mean[ty * tpl_row_len..(ty + 1) * tpl_row_len];
                        dot += f64::from(dot_row(tpl_row, window_row));
                    }
                    (dot / (tpl.variance * var_i).sqrt()).clamp(-1.0, 1.0) as f32
                };
                if score > row_best.0 {
                    row_best = (score, x);
                }
            }
            row_best
        })
        .collect();

    let mut best_score = f32::NEG_INFINITY;
    let mut best_location = (0, 0);
    for (y, (score, x)) in rows.into_iter().enumerate() {
        if score > best_score {
            best_score = score;
            best_location = (x as u32, y as u32);
        }
    }
    (best_score, best_location)
}

const LANES: usize = 8;

/// Dot product of one template row with one window row, in independent lanes
/// so the loop vectorizes.
fn dot_row(tpl: &[f32], window: &[u8]) -> f32 {
    let mut lanes = [0.0f32; LANES];
    let tpl_chunks = tpl.chunks_exact(LANES);
    let window_chunks = window.chunks_exact(LANES);
    let tail: f32 = tpl_chunks
        .remainder()
        .iter()
        .zip(window_chunks.remainder())
        .map(|(t, &w)| t * f32::from(w))
        .sum();
    for (t, w) in tpl_chunks.zip(window_chunks) {
        for lane in 0..LANES {
            lanes[lane] += t[lane] * f32::from(w[lane]);
        }
    }
    lanes.iter().sum::<f32>() + tail
}
