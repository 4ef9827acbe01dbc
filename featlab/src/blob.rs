//! Multi-threshold blob detection.
//!
//! The image is binarized at a ladder of thresholds. Connected components
//! of each binarization are filtered by shape, and components whose
//! centres line up across enough thresholds become keypoints.

use crate::KeyPoint;
use float_ord::FloatOrd;
use image::{GrayImage, Luma};
use imageproc::geometry::convex_hull;
use imageproc::point::Point;
use imageproc::region_labelling::{connected_components, Connectivity};
use log::*;
use std::cmp::Reverse;
use std::f64::consts::PI;

/// Which side of the threshold a blob lies on.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BlobColor {
    /// Regions at or below the threshold.
    Dark,
    /// Regions above the threshold.
    Bright,
    /// Both.
    Any,
}

impl Default for BlobColor {
    fn default() -> Self {
        BlobColor::Any
    }
}

/// Contains the configuration parameters of the blob detector.
///
/// Shape filters set to `None` accept every component.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BlobDetector {
    /// First binarization threshold.
    pub min_threshold: u8,

    /// Binarization stops before reaching this threshold.
    pub max_threshold: u8,

    /// Distance between consecutive thresholds.
    pub threshold_step: u8,

    /// Number of thresholds a blob must appear at.
    pub min_repeatability: usize,

    /// Centres closer than this are the same blob.
    pub min_dist_between_blobs: f32,

    pub blob_color: BlobColor,

    /// Accepted pixel count, `min_area <= area < max_area`.
    pub min_area: f32,
    pub max_area: f32,

    /// Minimum `4π·area / perimeter²`.
    pub min_circularity: Option<f32>,

    /// Minimum ratio of the area to the area of the convex hull.
    pub min_convexity: Option<f32>,

    /// Minimum ratio of the smallest to the largest second moment.
    pub min_inertia_ratio: Option<f32>,
}

impl Default for BlobDetector {
    fn default() -> Self {
        Self {
            min_threshold: 10,
            max_threshold: 220,
            threshold_step: 10,
            min_repeatability: 2,
            min_dist_between_blobs: 10.0,
            blob_color: BlobColor::Any,
            min_area: 100.0,
            max_area: 5000.0,
            min_circularity: Some(0.04),
            min_convexity: Some(0.58),
            min_inertia_ratio: Some(0.1),
        }
    }
}

/// A component that passed the filters at one threshold.
#[derive(Debug, Copy, Clone)]
struct Center {
    location: (f64, f64),
    radius: f64,
    confidence: f64,
}

impl Center {
    fn distance(&self, other: &Center) -> f64 {
        let dx = self.location.0 - other.location.0;
        let dy = self.location.1 - other.location.1;
        (dx * dx + dy * dy).sqrt()
    }
}

impl BlobDetector {
    /// The thresholds the image is binarized at.
    pub fn thresholds(&self) -> impl Iterator<Item = u8> {
        let step = self.threshold_step.max(1) as usize;
        (self.min_threshold..self.max_threshold).step_by(step)
    }

    /// Detect blobs in an 8-bit grayscale image.
    ///
    /// Keypoints are placed at the confidence weighted mean of the grouped
    /// centres. Their size is the diameter of the median radius and their
    /// response the number of thresholds the blob was seen at.
    pub fn detect(&self, image: &GrayImage) -> Vec<KeyPoint> {
        if image.width() < 3 || image.height() < 3 {
            return vec![];
        }
        // Each group is kept sorted by radius.
        let mut groups: Vec<Vec<Center>> = vec![];
        for threshold in self.thresholds() {
            let centers = self.find_centers(image, threshold);
            trace!("Threshold {}: {} candidate blobs", threshold, centers.len());
            let mut new_groups = vec![];
            for center in centers {
                let group = groups.iter_mut().find(|group| {
                    let reference = &group[group.len() / 2];
                    let distance = reference.distance(&center);
                    distance < f64::from(self.min_dist_between_blobs)
                        || distance < reference.radius
                        || distance < center.radius
                });
                match group {
                    Some(group) => {
                        let at = group.partition_point(|c| c.radius <= center.radius);
                        group.insert(at, center);
                    }
                    None => new_groups.push(vec![center]),
                }
            }
            groups.extend(new_groups);
        }

        let mut keypoints: Vec<KeyPoint> = groups
            .iter()
            .filter(|group| group.len() >= self.min_repeatability.max(1))
            .map(|group| {
                let weight: f64 = group.iter().map(|c| c.confidence).sum();
                let (sx, sy) = group.iter().fold((0.0, 0.0), |(sx, sy), c| {
                    (sx + c.confidence * c.location.0, sy + c.confidence * c.location.1)
                });
                KeyPoint {
                    point: ((sx / weight) as f32, (sy / weight) as f32),
                    response: group.len() as f32,
                    size: (2.0 * group[group.len() / 2].radius) as f32,
                    angle: None,
                    octave: 0,
                }
            })
            .collect();
        keypoints.sort_by_key(|keypoint| Reverse(FloatOrd(keypoint.response)));
        info!("Detected {} blobs", keypoints.len());
        keypoints
    }

    fn find_centers(&self, image: &GrayImage, threshold: u8) -> Vec<Center> {
        let mut centers = vec![];
        if self.blob_color != BlobColor::Dark {
            centers.extend(self.components(image, |value| value > threshold));
        }
        if self.blob_color != BlobColor::Bright {
            centers.extend(self.components(image, |value| value <= threshold));
        }
        centers
    }

    /// Filtered centres of the components of one binarization.
    fn components(&self, image: &GrayImage, inside: impl Fn(u8) -> bool) -> Vec<Center> {
        let mask = GrayImage::from_fn(image.width(), image.height(), |x, y| {
            Luma([if inside(image.get_pixel(x, y)[0]) { 255 } else { 0 }])
        });
        let labels = connected_components(&mask, Connectivity::Eight, Luma([0u8]));
        let count = labels.pixels().map(|p| p[0]).max().unwrap_or(0) as usize;
        let mut members: Vec<Vec<(u32, u32)>> = vec![vec![]; count];
        for (x, y, label) in labels.enumerate_pixels() {
            if label[0] > 0 {
                members[label[0] as usize - 1].push((x, y));
            }
        }
        members
            .iter()
            .enumerate()
            .filter_map(|(ix, pixels)| {
                let region = Region::new(&labels, ix as u32 + 1, pixels)?;
                self.filter_region(&region)
            })
            .collect()
    }

    fn filter_region(&self, region: &Region) -> Option<Center> {
        let area = region.area();
        if area < f64::from(self.min_area) || area >= f64::from(self.max_area) {
            return None;
        }
        if let Some(min_circularity) = self.min_circularity {
            if region.circularity() < f64::from(min_circularity) {
                return None;
            }
        }
        let mut confidence = 1.0;
        if let Some(min_inertia_ratio) = self.min_inertia_ratio {
            let ratio = region.inertia_ratio();
            if ratio < f64::from(min_inertia_ratio) {
                return None;
            }
            confidence = ratio * ratio;
        }
        if let Some(min_convexity) = self.min_convexity {
            if region.convexity() < f64::from(min_convexity) {
                return None;
            }
        }
        Some(Center {
            location: region.centroid,
            radius: region.median_radius(),
            confidence,
        })
    }
}

/// Shape statistics of one connected component.
struct Region<'a> {
    pixels: &'a [(u32, u32)],
    boundary: Vec<(u32, u32)>,
    centroid: (f64, f64),
}

impl<'a> Region<'a> {
    /// `None` for empty components and those touching the image border.
    fn new(
        labels: &image::ImageBuffer<Luma<u32>, Vec<u32>>,
        label: u32,
        pixels: &'a [(u32, u32)],
    ) -> Option<Self> {
        let (width, height) = labels.dimensions();
        if pixels.is_empty()
            || pixels
                .iter()
                .any(|&(x, y)| x == 0 || y == 0 || x + 1 == width || y + 1 == height)
        {
            return None;
        }
        let boundary = pixels
            .iter()
            .copied()
            .filter(|&(x, y)| {
                labels.get_pixel(x - 1, y)[0] != label
                    || labels.get_pixel(x + 1, y)[0] != label
                    || labels.get_pixel(x, y - 1)[0] != label
                    || labels.get_pixel(x, y + 1)[0] != label
            })
            .collect();
        let n = pixels.len() as f64;
        let (sx, sy) = pixels.iter().fold((0.0, 0.0), |(sx, sy), &(x, y)| {
            (sx + f64::from(x), sy + f64::from(y))
        });
        Some(Self {
            pixels,
            boundary,
            centroid: (sx / n, sy / n),
        })
    }

    fn area(&self) -> f64 {
        self.pixels.len() as f64
    }

    fn circularity(&self) -> f64 {
        let perimeter = self.boundary.len() as f64;
        4.0 * PI * self.area() / (perimeter * perimeter)
    }

    fn inertia_ratio(&self) -> f64 {
        let (cx, cy) = self.centroid;
        let (mut mu20, mut mu02, mut mu11) = (0.0, 0.0, 0.0);
        for &(x, y) in self.pixels {
            let dx = f64::from(x) - cx;
            let dy = f64::from(y) - cy;
            mu20 += dx * dx;
            mu02 += dy * dy;
            mu11 += dx * dy;
        }
        let denominator = ((2.0 * mu11).powi(2) + (mu20 - mu02).powi(2)).sqrt();
        if denominator <= 1e-2 {
            return 1.0;
        }
        let cos = (mu20 - mu02) / denominator;
        let sin = 2.0 * mu11 / denominator;
        let mean = 0.5 * (mu20 + mu02);
        let imin = mean - 0.5 * (mu20 - mu02) * cos - mu11 * sin;
        let imax = mean + 0.5 * (mu20 - mu02) * cos + mu11 * sin;
        if imax <= 0.0 {
            1.0
        } else {
            imin / imax
        }
    }

    /// Pixel count over the number of pixels inside the convex hull.
    fn convexity(&self) -> f64 {
        let points: Vec<Point<i64>> = self
            .boundary
            .iter()
            .map(|&(x, y)| Point::new(i64::from(x), i64::from(y)))
            .collect();
        let hull = convex_hull(&points);
        if hull.len() < 3 {
            return 1.0;
        }
        // Pick's theorem: lattice points = area + boundary / 2 + 1.
        let mut twice_area = 0i64;
        let mut on_edges = 0i64;
        for (ix, a) in hull.iter().enumerate() {
            let b = &hull[(ix + 1) % hull.len()];
            twice_area += a.x * b.y - b.x * a.y;
            on_edges += gcd((b.x - a.x).abs(), (b.y - a.y).abs());
        }
        let lattice = (twice_area.abs() + on_edges) / 2 + 1;
        (self.area() / lattice as f64).min(1.0)
    }

    fn median_radius(&self) -> f64 {
        let (cx, cy) = self.centroid;
        let mut distances: Vec<f64> = self
            .boundary
            .iter()
            .map(|&(x, y)| ((f64::from(x) - cx).powi(2) + (f64::from(y) - cy).powi(2)).sqrt())
            .collect();
        distances.sort_by_key(|&d| FloatOrd(d));
        let n = distances.len();
        (distances[(n - 1) / 2] + distances[n / 2]) / 2.0
    }
}

fn gcd(a: i64, b: i64) -> i64 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(size: u32, left: u32, side: u32, fg: u8, bg: u8) -> GrayImage {
        GrayImage::from_fn(size, size, |x, y| {
            let inside = (left..left + side).contains(&x) && (left..left + side).contains(&y);
            Luma([if inside { fg } else { bg }])
        })
    }

    #[test]
    fn white_square_is_one_blob_at_its_centre() {
        let blobs = BlobDetector::default().detect(&square(64, 22, 20, 255, 0));
        assert_eq!(blobs.len(), 1);
        let (x, y) = blobs[0].point;
        assert!((x - 31.5).abs() <= 2.0 && (y - 31.5).abs() <= 2.0);
        assert!(blobs[0].size > 15.0 && blobs[0].size < 30.0);
        assert_eq!(blobs[0].response, 21.0);
    }

    #[test]
    fn polarity_selects_bright_or_dark() {
        let dark = square(64, 22, 20, 0, 255);
        assert_eq!(BlobDetector::default().detect(&dark).len(), 1);
        let bright_only = BlobDetector {
            blob_color: BlobColor::Bright,
            ..Default::default()
        };
        assert!(bright_only.detect(&dark).is_empty());
        let dark_only = BlobDetector {
            blob_color: BlobColor::Dark,
            ..Default::default()
        };
        assert_eq!(dark_only.detect(&dark).len(), 1);
    }

    #[test]
    fn flat_and_tiny_images_have_no_blobs() {
        assert!(BlobDetector::default()
            .detect(&GrayImage::new(100, 100))
            .is_empty());
        assert!(BlobDetector::default().detect(&GrayImage::new(2, 2)).is_empty());
    }

    #[test]
    fn small_blobs_fail_the_area_filter() {
        assert!(BlobDetector::default()
            .detect(&square(64, 28, 8, 255, 0))
            .is_empty());
    }

    #[test]
    fn repeatability_is_required() {
        // Visible only at the 10 threshold.
        let faint = square(64, 22, 20, 15, 0);
        let detector = BlobDetector {
            blob_color: BlobColor::Bright,
            ..Default::default()
        };
        assert!(detector.detect(&faint).is_empty());
        let once = BlobDetector {
            min_repeatability: 1,
            ..detector
        };
        assert_eq!(once.detect(&faint).len(), 1);
    }

    #[test]
    fn shape_measures_of_a_square() {
        let mask = square(32, 6, 20, 255, 0);
        let labels = connected_components(&mask, Connectivity::Eight, Luma([0u8]));
        let pixels: Vec<(u32, u32)> = labels
            .enumerate_pixels()
            .filter(|(_, _, l)| l[0] == 1)
            .map(|(x, y, _)| (x, y))
            .collect();
        let region = Region::new(&labels, 1, &pixels).unwrap();
        assert_eq!(region.area(), 400.0);
        assert_eq!(region.boundary.len(), 76);
        assert!((region.convexity() - 1.0).abs() < 1e-9);
        assert!((region.inertia_ratio() - 1.0).abs() < 1e-9);
        assert!((region.circularity() - 4.0 * PI * 400.0 / (76.0 * 76.0)).abs() < 1e-9);
    }

    #[test]
    fn thresholds_step_from_min_to_below_max() {
        let thresholds: Vec<u8> = BlobDetector::default().thresholds().collect();
        assert_eq!(thresholds.first(), Some(&10));
        assert_eq!(thresholds.last(), Some(&210));
        assert_eq!(thresholds.len(), 21);
    }
}
