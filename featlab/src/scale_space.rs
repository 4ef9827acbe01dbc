//! Scale-space keypoints.
//!
//! Detection itself is delegated to the AKAZE nonlinear scale space. On top
//! of it sit an optional Hessian edge test, strongest-first ordering and a
//! feature cap.

use crate::image::{gaussian_kernel, separable_filter, GrayFloatImage};
use crate::KeyPoint;
use akaze::Akaze;
use float_ord::FloatOrd;
use image::DynamicImage;
use log::*;
use std::cmp::Reverse;

/// Images narrower or shorter than this have no usable scale space.
pub const MIN_IMAGE_SIDE: u32 = 16;

/// Contains the configuration parameters of the scale-space detector.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScaleSpace {
    /// Keep at most this many of the strongest keypoints.
    pub max_features: Option<usize>,

    /// Sublevels per octave.
    pub octave_layers: u32,

    /// Detector response threshold to accept a point.
    pub contrast_threshold: f64,

    /// Maximum ratio of principal curvatures. `0` disables the edge test.
    pub edge_threshold: f32,

    /// Sigma of the base scale.
    pub sigma: f64,
}

impl Default for ScaleSpace {
    fn default() -> Self {
        Self {
            max_features: Some(500),
            octave_layers: 4,
            contrast_threshold: 0.0001,
            edge_threshold: 10.0,
            sigma: 1.6,
        }
    }
}

impl ScaleSpace {
    /// Default detector keeping at most `max_features` keypoints.
    pub fn new(max_features: usize) -> Self {
        Self {
            max_features: Some(max_features),
            ..Default::default()
        }
    }

    fn akaze(&self) -> Akaze {
        Akaze {
            num_sublevels: self.octave_layers.max(1),
            detector_threshold: self.contrast_threshold.max(f64::EPSILON),
            base_scale_offset: self.sigma.max(0.1),
            ..Default::default()
        }
    }

    /// Detect scale-space keypoints, strongest first.
    pub fn detect(&self, image: &DynamicImage) -> Vec<KeyPoint> {
        if image.width() < MIN_IMAGE_SIDE || image.height() < MIN_IMAGE_SIDE {
            debug!(
                "Image {}x{} too small for a scale space",
                image.width(),
                image.height()
            );
            return vec![];
        }
        let gray = GrayFloatImage::from_dynamic(image);
        if matches!(gray.min_max(), Some((min, max)) if min == max) {
            debug!("Flat image, no scale-space keypoints.");
            return vec![];
        }
        let (akaze_keypoints, _) = self.akaze().extract(image);
        trace!("Scale space produced {} candidates", akaze_keypoints.len());
        let mut keypoints: Vec<KeyPoint> = akaze_keypoints
            .into_iter()
            .map(|kp| KeyPoint {
                point: kp.point,
                response: kp.response,
                size: kp.size,
                angle: Some(kp.angle),
                octave: kp.octave,
            })
            .collect();
        if self.edge_threshold > 0.0 {
            let base = blur(&gray, self.sigma as f32);
            let before = keypoints.len();
            keypoints.retain(|kp| passes_edge_test(&base, kp, self.edge_threshold));
            debug!("Edge test removed {} keypoints", before - keypoints.len());
        }
        keypoints.sort_by_key(|kp| Reverse(FloatOrd(kp.response)));
        if let Some(max_features) = self.max_features {
            keypoints.truncate(max_features);
        }
        info!("Detected {} scale-space keypoints", keypoints.len());
        keypoints
    }
}

fn blur(image: &GrayFloatImage, sigma: f32) -> GrayFloatImage {
    let sigma = sigma.max(0.1);
    let kernel_size = 2 * (3.0 * sigma).ceil() as usize + 1;
    let kernel = gaussian_kernel(sigma, kernel_size);
    separable_filter(image, &kernel, &kernel)
}

fn sample(image: &GrayFloatImage, x: i64, y: i64) -> f32 {
    let x = x.clamp(0, image.width() as i64 - 1) as usize;
    let y = y.clamp(0, image.height() as i64 - 1) as usize;
    image.get(x, y)
}

/// The 2x2 Hessian `(dxx, dyy, dxy)` at `(x, y)` with finite differences
/// `step` pixels apart.
pub fn hessian_at(image: &GrayFloatImage, x: i64, y: i64, step: i64) -> (f32, f32, f32) {
    let s = step.max(1);
    let centre = sample(image, x, y);
    let scale = (s * s) as f32;
    let dxx = (sample(image, x + s, y) - 2.0 * centre + sample(image, x - s, y)) / scale;
    let dyy = (sample(image, x, y + s) - 2.0 * centre + sample(image, x, y - s)) / scale;
    let dxy = (sample(image, x + s, y + s) - sample(image, x + s, y - s)
        - sample(image, x - s, y + s)
        + sample(image, x - s, y - s))
        / (4.0 * scale);
    (dxx, dyy, dxy)
}

/// True when the curvature ratio at the keypoint is below `edge_threshold`.
///
/// Points on edges curve strongly across the edge and barely along it,
/// which shows as `trace² / det >= (r + 1)² / r`.
pub fn passes_edge_test(image: &GrayFloatImage, keypoint: &KeyPoint, edge_threshold: f32) -> bool {
    let step = 1i64 << keypoint.octave.min(6);
    let (dxx, dyy, dxy) = hessian_at(
        image,
        keypoint.point.0.round() as i64,
        keypoint.point.1.round() as i64,
        step,
    );
    let trace = dxx + dyy;
    let det = dxx * dyy - dxy * dxy;
    let r = edge_threshold;
    det > 0.0 && trace * trace / det < (r + 1.0) * (r + 1.0) / r
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};
    use rand::{Rng, SeedableRng};
    use rand_pcg::Pcg64;

    fn noise(size: u32, seed: u64) -> DynamicImage {
        let mut rng = Pcg64::seed_from_u64(seed);
        DynamicImage::ImageLuma8(GrayImage::from_fn(size, size, |_, _| {
            Luma([rng.gen::<u8>()])
        }))
    }

    #[test]
    fn tiny_and_flat_images_have_no_keypoints() {
        let tiny = DynamicImage::ImageLuma8(GrayImage::from_pixel(15, 40, Luma([30])));
        assert!(ScaleSpace::default().detect(&tiny).is_empty());
        let flat = DynamicImage::ImageLuma8(GrayImage::new(100, 100));
        assert!(ScaleSpace::default().detect(&flat).is_empty());
    }

    #[test]
    fn textured_keypoints_are_edge_filtered_sorted_and_capped() {
        let image = noise(128, 11);
        let unfiltered = ScaleSpace {
            max_features: None,
            edge_threshold: 0.0,
            ..Default::default()
        }
        .detect(&image);
        let detector = ScaleSpace {
            max_features: None,
            ..Default::default()
        };
        let filtered = detector.detect(&image);
        assert!(!filtered.is_empty());
        assert!(filtered.len() < unfiltered.len());
        let base = blur(&GrayFloatImage::from_dynamic(&image), detector.sigma as f32);
        for keypoint in &filtered {
            assert!(keypoint.angle.is_some());
            assert!(passes_edge_test(&base, keypoint, detector.edge_threshold));
        }
        for pair in filtered.windows(2) {
            assert!(pair[0].response >= pair[1].response);
        }

        let capped = ScaleSpace::new(10).detect(&image);
        assert_eq!(capped.len(), filtered.len().min(10));
        assert_eq!(capped[..], filtered[..capped.len()]);
    }

    #[test]
    fn blob_passes_and_edge_fails_the_edge_test() {
        let spot = GrayFloatImage::from_luma8(&GrayImage::from_fn(21, 21, |x, y| {
            let d2 = (x as f32 - 10.0).powi(2) + (y as f32 - 10.0).powi(2);
            Luma([(250.0 * (-d2 / 18.0).exp()) as u8])
        }));
        let at_centre = KeyPoint::corner(10.0, 10.0, 1.0);
        assert!(passes_edge_test(&spot, &at_centre, 10.0));

        let ridge = GrayFloatImage::from_luma8(&GrayImage::from_fn(21, 21, |x, _| {
            let d2 = (x as f32 - 10.0).powi(2);
            Luma([(250.0 * (-d2 / 18.0).exp()) as u8])
        }));
        assert!(!passes_edge_test(&ridge, &at_centre, 10.0));
    }

    #[test]
    fn hessian_of_a_parabola() {
        let image = GrayFloatImage::from_luma8(&GrayImage::from_fn(9, 9, |x, y| {
            Luma([(x * x + 2 * y) as u8])
        }));
        let (dxx, dyy, dxy) = hessian_at(&image, 4, 4, 1);
        assert!((dxx - 2.0).abs() < 1e-4);
        assert!(dyy.abs() < 1e-4);
        assert!(dxy.abs() < 1e-4);
    }
}
