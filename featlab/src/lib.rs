//! Classical feature detection, description and matching.
//!
//! The crate bundles three hand written algorithms:
//!
//! * [`Harris`], a Harris corner detector built from raw Sobel gradients.
//! * [`Lbp`], a 256 bin local binary pattern histogram descriptor.
//! * [`Matcher`], a brute force matcher with Lowe's ratio test.
//!
//! around which sit thinner detectors and descriptors ([`BlobDetector`],
//! [`ScaleSpace`], [`Sift`]), image enhancement helpers and a [`Pipeline`]
//! that wires a detector, a descriptor and the matcher together.
//!
//! ```no_run
//! use featlab::{DescriptorKind, DetectorKind, Pipeline};
//!
//! let a = featlab::open_image("left.png").unwrap();
//! let b = featlab::open_image("right.png").unwrap();
//! let report = Pipeline::default().match_images(DetectorKind::Harris, DescriptorKind::Lbp, &a, &b);
//! println!("Matches: {}", report.matches.len());
//! ```

pub mod blob;
pub mod config;
pub mod derivatives;
pub mod enhance;
mod error;
pub mod harris;
pub mod image;
pub mod lbp;
pub mod matching;
pub mod pipeline;
pub mod scale_space;
pub mod sift;

pub use crate::blob::BlobDetector;
pub use crate::error::Error;
pub use crate::harris::Harris;
pub use crate::lbp::Lbp;
pub use crate::matching::{ChiSquare, Euclidean, Match, Matcher, Metric};
pub use crate::pipeline::{DescriptorKind, DetectorKind, MatchReport, Pipeline};
pub use crate::scale_space::ScaleSpace;
pub use crate::sift::Sift;

use ::image::DynamicImage;
use log::*;
use std::path::Path;

/// A point of interest in an image.
/// This pretty much follows from OpenCV conventions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyPoint {
    /// The horizontal coordinate in a coordinate system is
    /// defined s.t. +x faces right and starts from the top
    /// of the image.
    /// the vertical coordinate in a coordinate system is defined
    /// s.t. +y faces toward the bottom of an image and starts
    /// from the left side of the image.
    pub point: (f32, f32),
    /// The magnitude of response from the detector.
    pub response: f32,

    /// The diameter of the meaningful neighborhood, in pixel units.
    pub size: f32,

    /// The orientation angle in radians, if the detector assigns one.
    pub angle: Option<f32>,

    /// The level of scale space in which the keypoint was detected.
    pub octave: usize,
}

impl KeyPoint {
    /// A single pixel corner without scale or orientation.
    pub fn corner(x: f32, y: f32, response: f32) -> Self {
        Self {
            point: (x, y),
            response,
            size: 1.0,
            angle: None,
            octave: 0,
        }
    }

    /// The pixel the keypoint falls on, `None` when it lies outside a
    /// `width` x `height` image.
    pub fn pixel(&self, width: u32, height: u32) -> Option<(u32, u32)> {
        let (x, y) = (self.point.0.round(), self.point.1.round());
        if x < 0.0 || y < 0.0 || x >= width as f32 || y >= height as f32 {
            None
        } else {
            Some((x as u32, y as u32))
        }
    }
}

/// One descriptor per keypoint. `None` marks a keypoint that could not be
/// described, for example because it sits too close to the image border.
pub type Descriptors = Vec<Option<Vec<f32>>>;

/// Load an image from disk, keeping the path in the error.
pub fn open_image(path: impl AsRef<Path>) -> Result<DynamicImage, Error> {
    let path = path.as_ref();
    debug!("Loading {}", path.display());
    ::image::open(path).map_err(|source| Error::Load {
        path: path.to_path_buf(),
        source,
    })
}

/// Save an image to disk, choosing the format from the extension.
pub fn save_image(image: &DynamicImage, path: impl AsRef<Path>) -> Result<(), Error> {
    let path = path.as_ref();
    debug!("Saving {}", path.display());
    image.save(path).map_err(|source| Error::Save {
        path: path.to_path_buf(),
        source,
    })
}
