//! Gradient orientation histogram descriptor in the style of SIFT.
//!
//! A `4 x 4` grid of 8 bin orientation histograms is laid over the
//! keypoint, rotated by its angle and scaled by its size. Every gradient
//! sample votes into its neighbouring spatial and orientation bins.

use crate::derivatives::{central_difference_horizontal, central_difference_vertical};
use crate::image::GrayFloatImage;
use crate::{Descriptors, KeyPoint};
use image::GrayImage;
use log::*;
use std::f32::consts::PI;

/// Spatial cells per side.
pub const GRID_WIDTH: usize = 4;

/// Orientation bins per cell.
pub const ORIENTATION_BINS: usize = 8;

/// Length of every descriptor.
pub const DESCRIPTOR_LEN: usize = GRID_WIDTH * GRID_WIDTH * ORIENTATION_BINS;

/// Contains the configuration parameters of the descriptor.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Sift {
    /// Side of one spatial cell in units of the keypoint scale.
    pub magnification: f32,

    /// Scale used for keypoints smaller than this, such as single pixel
    /// corners.
    pub min_scale: f32,

    /// Components are clipped to this fraction of the norm.
    pub clip: f32,
}

impl Default for Sift {
    fn default() -> Self {
        Self {
            magnification: 3.0,
            min_scale: 1.6,
            clip: 0.2,
        }
    }
}

/// Image gradients shared by every keypoint of one image.
pub struct Gradients {
    dx: GrayFloatImage,
    dy: GrayFloatImage,
}

impl Gradients {
    pub fn new(image: &GrayImage) -> Self {
        let float_image = GrayFloatImage::from_luma8(image);
        Self {
            dx: central_difference_horizontal(&float_image),
            dy: central_difference_vertical(&float_image),
        }
    }

    fn width(&self) -> usize {
        self.dx.width()
    }

    fn height(&self) -> usize {
        self.dx.height()
    }
}

impl Sift {
    /// Describe every keypoint, keeping the output aligned with the input.
    pub fn describe_all(&self, image: &GrayImage, keypoints: &[KeyPoint]) -> Descriptors {
        let gradients = Gradients::new(image);
        let descriptors: Descriptors = keypoints
            .iter()
            .map(|keypoint| self.describe(&gradients, keypoint))
            .collect();
        debug!(
            "Described {} of {} keypoints with gradient histograms",
            descriptors.iter().filter(|d| d.is_some()).count(),
            keypoints.len()
        );
        descriptors
    }

    /// The descriptor of one keypoint, `None` when it lies outside the image.
    pub fn describe(&self, gradients: &Gradients, keypoint: &KeyPoint) -> Option<Vec<f32>> {
        let (px, py) = keypoint.pixel(gradients.width() as u32, gradients.height() as u32)?;
        let (px, py) = (px as i64, py as i64);
        let d = GRID_WIDTH as f32;
        let n = ORIENTATION_BINS as f32;
        let scale = (keypoint.size * 0.5).max(self.min_scale);
        let cell = self.magnification * scale;
        let angle = keypoint.angle.unwrap_or(0.0);
        let (cos_t, sin_t) = (angle.cos() / cell, angle.sin() / cell);
        let diagonal = ((gradients.width().pow(2) + gradients.height().pow(2)) as f32).sqrt();
        let radius = (cell * std::f32::consts::SQRT_2 * (d + 1.0) * 0.5)
            .round()
            .min(diagonal) as i64;
        let exp_scale = -1.0 / (d * d * 0.5);

        // Padded by one cell on every side so interpolation never checks bounds.
        let side = GRID_WIDTH + 2;
        let bins = ORIENTATION_BINS + 2;
        let mut hist = vec![0f32; side * side * bins];

        for i in -radius..=radius {
            for j in -radius..=radius {
                let (fi, fj) = (i as f32, j as f32);
                let c_rot = fj * cos_t - fi * sin_t;
                let r_rot = fj * sin_t + fi * cos_t;
                let rbin = r_rot + d / 2.0 - 0.5;
                let cbin = c_rot + d / 2.0 - 0.5;
                let (x, y) = (px + j, py + i);
                if rbin <= -1.0 || rbin >= d || cbin <= -1.0 || cbin >= d {
                    continue;
                }
                let inside = x > 0
                    && y > 0
                    && x < gradients.width() as i64 - 1
                    && y < gradients.height() as i64 - 1;
                if !inside {
                    continue;
                }
                let dx = gradients.dx.get(x as usize, y as usize);
                let dy = gradients.dy.get(x as usize, y as usize);
                let magnitude = (dx * dx + dy * dy).sqrt();
                if magnitude == 0.0 {
                    continue;
                }
                let mut orientation = dy.atan2(dx) - angle;
                orientation = orientation.rem_euclid(2.0 * PI);
                let obin = orientation * n / (2.0 * PI);
                let weight = ((c_rot * c_rot + r_rot * r_rot) * exp_scale).exp();
                accumulate(&mut hist, rbin, cbin, obin, magnitude * weight);
            }
        }

        let mut descriptor = Vec::with_capacity(DESCRIPTOR_LEN);
        for r in 0..GRID_WIDTH {
            for c in 0..GRID_WIDTH {
                let at = ((r + 1) * side + c + 1) * bins;
                let cell_hist = &mut hist[at..at + bins];
                // Fold the wrapped orientation bins back in.
                cell_hist[0] += cell_hist[ORIENTATION_BINS];
                cell_hist[1] += cell_hist[ORIENTATION_BINS + 1];
                descriptor.extend_from_slice(&cell_hist[..ORIENTATION_BINS]);
            }
        }
        normalize_and_clip(&mut descriptor, self.clip);
        Some(descriptor)
    }
}

/// Trilinear vote into the padded histogram.
fn accumulate(hist: &mut [f32], rbin: f32, cbin: f32, obin: f32, value: f32) {
    let side = GRID_WIDTH + 2;
    let bins = ORIENTATION_BINS + 2;
    let (r0, c0, o0) = (rbin.floor(), cbin.floor(), obin.floor());
    let (dr, dc, d_o) = (rbin - r0, cbin - c0, obin - o0);
    let r0 = r0 as i64 + 1;
    let c0 = c0 as i64 + 1;
    let o0 = (o0 as i64).rem_euclid(ORIENTATION_BINS as i64);
    for (ri, rw) in [(0, 1.0 - dr), (1, dr)] {
        for (ci, cw) in [(0, 1.0 - dc), (1, dc)] {
            for (oi, ow) in [(0, 1.0 - d_o), (1, d_o)] {
                let r = (r0 + ri) as usize;
                let c = (c0 + ci) as usize;
                let o = (o0 + oi) as usize;
                hist[(r * side + c) * bins + o] += value * rw * cw * ow;
            }
        }
    }
}

/// Unit normalize, clip large components and normalize again.
///
/// A descriptor without any gradient stays all zeros.
fn normalize_and_clip(descriptor: &mut [f32], clip: f32) {
    let norm = |v: &[f32]| v.iter().map(|x| x * x).sum::<f32>().sqrt();
    let first = norm(&*descriptor);
    if first <= f32::EPSILON {
        return;
    }
    for value in descriptor.iter_mut() {
        *value = (*value / first).min(clip);
    }
    let second = norm(&*descriptor);
    if second > f32::EPSILON {
        for value in descriptor.iter_mut() {
            *value /= second;
        }
    }
}
