//! Local binary pattern histograms around keypoints.

use crate::{Descriptors, KeyPoint};
use image::GrayImage;
use log::*;

/// Number of distinct 8 bit codes, and so the descriptor length.
pub const LBP_BINS: usize = 256;

/// Added to every bin before normalizing so no bin is exactly zero.
pub const BIN_EPSILON: f64 = 1e-7;

/// Offsets of the eight neighbours, clockwise from the top-left one.
/// The first offset sets the most significant bit.
const NEIGHBOURS: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
];

/// Contains the configuration parameters of the LBP descriptor.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Lbp {
    /// Side of the square patch centred on each keypoint.
    pub patch_size: u32,

    /// Distance from a pixel to the neighbours it is compared with.
    pub radius: u32,
}

impl Default for Lbp {
    fn default() -> Self {
        Self {
            patch_size: 40,
            radius: 1,
        }
    }
}

impl Lbp {
    /// Default patch with a different neighbour distance.
    pub fn new(radius: u32) -> Self {
        Self {
            radius,
            ..Default::default()
        }
    }

    pub fn effective_radius(&self) -> u32 {
        self.radius.max(1)
    }

    /// The square patch around `point` as `(left, top, side)`.
    ///
    /// The patch is shrunk symmetrically so it stays inside the image.
    /// Returns `None` when the point is outside the image or the patch
    /// would be too small to describe anything.
    pub fn patch(&self, width: u32, height: u32, point: (f32, f32)) -> Option<(u32, u32, u32)> {
        let (x, y) = KeyPoint::corner(point.0, point.1, 0.0).pixel(width, height)?;
        let half = (self.patch_size / 2)
            .min(x)
            .min(y)
            .min(width - 1 - x)
            .min(height - 1 - y);
        let side = 2 * half;
        if side <= 5 {
            return None;
        }
        Some((x - half, y - half, side))
    }

    /// Normalized LBP histogram of the patch around `point`.
    pub fn describe(&self, image: &GrayImage, point: (f32, f32)) -> Option<Vec<f32>> {
        let (left, top, side) = self.patch(image.width(), image.height(), point)?;
        let radius = self.effective_radius();
        let mut histogram = [0u32; LBP_BINS];
        if side > 2 * radius {
            for py in radius..side - radius {
                for px in radius..side - radius {
                    let code = lbp_code(image, left + px, top + py, radius);
                    histogram[code as usize] += 1;
                }
            }
        }
        Some(normalize_histogram(&histogram))
    }

    /// Describe every keypoint, keeping the output aligned with the input.
    pub fn describe_all(&self, image: &GrayImage, keypoints: &[KeyPoint]) -> Descriptors {
        let descriptors: Descriptors = keypoints
            .iter()
            .map(|keypoint| self.describe(image, keypoint.point))
            .collect();
        let absent = descriptors.iter().filter(|d| d.is_none()).count();
        debug!(
            "Described {} keypoints with LBP, {} too close to the border",
            keypoints.len() - absent,
            absent
        );
        descriptors
    }
}

/// The 8 bit pattern at `(x, y)`.
///
/// A bit is set when the neighbour is at least as bright as the centre.
/// The caller keeps all neighbours inside the image.
pub fn lbp_code(image: &GrayImage, x: u32, y: u32, radius: u32) -> u8 {
    let centre = image.get_pixel(x, y)[0];
    let radius = radius as i32;
    NEIGHBOURS
        .iter()
        .fold(0u8, |code, &(dx, dy)| {
            let nx = (x as i32 + dx * radius) as u32;
            let ny = (y as i32 + dy * radius) as u32;
            (code << 1) | u8::from(image.get_pixel(nx, ny)[0] >= centre)
        })
}

fn normalize_histogram(histogram: &[u32; LBP_BINS]) -> Vec<f32> {
    let padded: Vec<f64> = histogram
        .iter()
        .map(|&count| f64::from(count) + BIN_EPSILON)
        .collect();
    let sum: f64 = padded.iter().sum();
    padded.iter().map(|&value| (value / sum) as f32).collect()
}
