//! Harris corner response computed by hand from image gradients.
//!
//! The stages are exposed individually so a caller can inspect the
//! gradient field, the structure tensor or the raw response map:
//!
//! 1. Sobel gradients `Ix`, `Iy`.
//! 2. Products `Ix²`, `Iy²`, `Ix·Iy`, each Gaussian smoothed with a
//!    `2 * block_size + 1` kernel. This is the structure tensor.
//! 3. `det - k * trace²` per pixel.
//! 4. Min-max normalization to 0-255, threshold, strongest-first ordering.

use crate::derivatives::{sobel_horizontal, sobel_vertical, ApertureSize};
use crate::image::{gaussian_blur, GrayFloatImage};
use crate::KeyPoint;
use float_ord::FloatOrd;
use image::GrayImage;
use log::*;
use ndarray::{azip, Array2};
use std::cmp::Reverse;

/// Upper end of the normalized response scale.
pub const NORMALIZED_RESPONSE_MAX: f32 = 255.0;

/// Smallest accepted Harris `k`.
pub const MIN_K: f32 = 0.01;

/// Largest accepted Harris `k`.
pub const MAX_K: f32 = 0.10;

/// The smoothed gradient products at every pixel.
#[derive(Debug, Clone)]
pub struct StructureTensor {
    pub sxx: GrayFloatImage,
    pub syy: GrayFloatImage,
    pub sxy: GrayFloatImage,
}

/// Contains the configuration parameters of the Harris detector.
///
/// Out of range values are corrected when the detector runs rather than
/// rejected: `block_size` is raised to 2, `k` is kept in
/// `[MIN_K, MAX_K]` and `threshold` in `[0, 255]`.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Harris {
    /// Neighborhood size; the smoothing kernel is `2 * block_size + 1` wide.
    pub block_size: u32,

    /// Sobel aperture used for the gradients.
    pub aperture: ApertureSize,

    /// Harris free parameter in `det - k * trace²`.
    pub k: f32,

    /// Cut on the 0-255 normalized response. Pixels strictly above it survive.
    pub threshold: f32,

    /// Keep at most this many of the strongest corners.
    pub max_keypoints: Option<usize>,
}

impl Harris {
    /// Default detector with a different response threshold.
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            ..Default::default()
        }
    }

    /// Same detector without a keypoint cap.
    pub fn uncapped(self) -> Self {
        Self {
            max_keypoints: None,
            ..self
        }
    }

    pub fn effective_block_size(&self) -> u32 {
        self.block_size.max(2)
    }

    pub fn effective_k(&self) -> f32 {
        if self.k.is_nan() || self.k <= 0.0 {
            MIN_K
        } else {
            self.k.min(MAX_K)
        }
    }

    pub fn effective_threshold(&self) -> f32 {
        if self.threshold.is_nan() {
            0.0
        } else {
            self.threshold.clamp(0.0, NORMALIZED_RESPONSE_MAX)
        }
    }

    /// Side of the square smoothing kernel, always odd.
    pub fn smoothing_kernel_size(&self) -> usize {
        2 * self.effective_block_size() as usize + 1
    }
}

impl Default for Harris {
    fn default() -> Harris {
        Harris {
            block_size: 2,
            aperture: ApertureSize::Three,
            k: 0.04,
            threshold: 200.0,
            max_keypoints: Some(500),
        }
    }
}

impl Harris {
    /// Sobel gradients `(Ix, Iy)` of the image.
    pub fn gradients(&self, image: &GrayFloatImage) -> (GrayFloatImage, GrayFloatImage) {
        let ix = sobel_horizontal(image, self.aperture);
        let iy = sobel_vertical(image, self.aperture);
        (ix, iy)
    }

    /// Gaussian smoothed gradient products.
    pub fn structure_tensor(&self, image: &GrayFloatImage) -> StructureTensor {
        let (ix, iy) = self.gradients(image);
        trace!("Computing gradients done.");
        let ixx = ix.zip_map(&ix, |a, b| a * b);
        let iyy = iy.zip_map(&iy, |a, b| a * b);
        let ixy = ix.zip_map(&iy, |a, b| a * b);
        let kernel_size = self.smoothing_kernel_size();
        debug!("Smoothing gradient products with a {0}x{0} kernel", kernel_size);
        StructureTensor {
            sxx: gaussian_blur(&ixx, kernel_size),
            syy: gaussian_blur(&iyy, kernel_size),
            sxy: gaussian_blur(&ixy, kernel_size),
        }
    }

    /// The raw corner response `det - k * trace²` at every pixel.
    pub fn response_map(&self, image: &GrayFloatImage) -> GrayFloatImage {
        let tensor = self.structure_tensor(image);
        let k = f64::from(self.effective_k());
        let mut response = Array2::zeros((image.height(), image.width()));
        azip!((
            r in &mut response,
            &sxx in tensor.sxx.ref_array2(),
            &syy in tensor.syy.ref_array2(),
            &sxy in tensor.sxy.ref_array2(),
        ) {
            let (sxx, syy, sxy) = (f64::from(sxx), f64::from(syy), f64::from(sxy));
            let det = sxx * syy - sxy * sxy;
            let trace = sxx + syy;
            *r = (det - k * trace * trace) as f32;
        });
        trace!("Computing Harris response done.");
        GrayFloatImage::from_array2(response)
    }

    /// Find Harris corners in an 8-bit grayscale image.
    ///
    /// Corners come back strongest first. When `max_keypoints` is set only
    /// that many of the strongest survive. An empty image has no corners.
    pub fn extract(&self, image: &GrayImage) -> Vec<KeyPoint> {
        if image.width() == 0 || image.height() == 0 {
            debug!("Empty image, no Harris corners.");
            return vec![];
        }
        let float_image = GrayFloatImage::from_luma8(image);
        let response = self.response_map(&float_image);
        let normalized = normalize_min_max(&response, NORMALIZED_RESPONSE_MAX);
        let keypoints = self.threshold_response(&normalized);
        info!("Extracted {} Harris corners", keypoints.len());
        keypoints
    }

    /// Threshold a normalized response map into ordered keypoints.
    pub fn threshold_response(&self, normalized: &GrayFloatImage) -> Vec<KeyPoint> {
        let threshold = self.effective_threshold();
        let mut keypoints = normalized
            .enumerate_pixels()
            .filter(|(_, _, pixel)| pixel[0] > threshold)
            .map(|(x, y, pixel)| KeyPoint::corner(x as f32, y as f32, pixel[0]))
            .collect::<Vec<_>>();
        debug!(
            "{} pixels above the normalized threshold {}",
            keypoints.len(),
            threshold
        );
        // Stable, so equal responses keep scan order.
        keypoints.sort_by_key(|keypoint| Reverse(FloatOrd(keypoint.response)));
        if let Some(max_keypoints) = self.max_keypoints {
            keypoints.truncate(max_keypoints);
        }
        keypoints
    }
}

/// Linearly map an image onto `[0, upper]`.
///
/// A constant image has no range to stretch and maps to all zeros.
pub fn normalize_min_max(image: &GrayFloatImage, upper: f32) -> GrayFloatImage {
    let (min, max) = match image.min_max() {
        Some(range) => range,
        None => return image.clone(),
    };
    let range = f64::from(max) - f64::from(min);
    let scale = if range > f64::EPSILON {
        f64::from(upper) / range
    } else {
        0.0
    };
    let mut normalized = image.clone();
    for value in normalized.iter_mut() {
        *value = ((f64::from(*value) - f64::from(min)) * scale) as f32;
    }
    normalized
}
