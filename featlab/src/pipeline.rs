//! Detector, descriptor and matcher wired together.

use crate::blob::BlobDetector;
use crate::harris::Harris;
use crate::lbp::Lbp;
use crate::matching::{ChiSquare, Euclidean, Match, Matcher};
use crate::scale_space::ScaleSpace;
use crate::sift::Sift;
use crate::{Descriptors, Error, KeyPoint};
use image::DynamicImage;
use log::*;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DetectorKind {
    Harris,
    Blob,
    Dog,
}

impl FromStr for DetectorKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "harris" => Ok(DetectorKind::Harris),
            "blob" => Ok(DetectorKind::Blob),
            "dog" => Ok(DetectorKind::Dog),
            _ => Err(Error::UnknownDetector(s.to_owned())),
        }
    }
}

impl fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DetectorKind::Harris => "Harris",
            DetectorKind::Blob => "Blobs",
            DetectorKind::Dog => "DoG",
        })
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DescriptorKind {
    Sift,
    Lbp,
}

impl FromStr for DescriptorKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sift" => Ok(DescriptorKind::Sift),
            "lbp" => Ok(DescriptorKind::Lbp),
            _ => Err(Error::UnknownDescriptor(s.to_owned())),
        }
    }
}

/// Keypoints of both images and the accepted matches between them.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchReport {
    pub keypoints_a: Vec<KeyPoint>,
    pub keypoints_b: Vec<KeyPoint>,
    pub matches: Vec<Match>,
}

/// Every stage configuration in one place.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Pipeline {
    pub harris: Harris,
    pub blob: BlobDetector,
    pub scale_space: ScaleSpace,
    pub sift: Sift,
    pub lbp: Lbp,
    pub matcher: Matcher,
}

impl Pipeline {
    pub fn detect(&self, kind: DetectorKind, image: &DynamicImage) -> Vec<KeyPoint> {
        match kind {
            DetectorKind::Harris => self.harris.extract(&image.to_luma8()),
            DetectorKind::Blob => self.blob.detect(&image.to_luma8()),
            DetectorKind::Dog => self.scale_space.detect(image),
        }
    }

    pub fn describe(
        &self,
        kind: DescriptorKind,
        image: &DynamicImage,
        keypoints: &[KeyPoint],
    ) -> Descriptors {
        let gray = image.to_luma8();
        match kind {
            DescriptorKind::Sift => self.sift.describe_all(&gray, keypoints),
            DescriptorKind::Lbp => self.lbp.describe_all(&gray, keypoints),
        }
    }

    /// Detect, describe and match two images.
    ///
    /// Gradient histograms are compared with the Euclidean distance, LBP
    /// histograms with chi-square.
    pub fn match_images(
        &self,
        detector: DetectorKind,
        descriptor: DescriptorKind,
        a: &DynamicImage,
        b: &DynamicImage,
    ) -> MatchReport {
        let keypoints_a = self.detect(detector, a);
        let keypoints_b = self.detect(detector, b);
        trace!("Detection done.");
        let descriptors_a = self.describe(descriptor, a, &keypoints_a);
        let descriptors_b = self.describe(descriptor, b, &keypoints_b);
        trace!("Description done.");
        let matches = match descriptor {
            DescriptorKind::Sift => {
                self.matcher
                    .match_descriptors(&descriptors_a, &descriptors_b, &Euclidean)
            }
            DescriptorKind::Lbp => {
                self.matcher
                    .match_descriptors(&descriptors_a, &descriptors_b, &ChiSquare)
            }
        };
        info!(
            "{} keypoints / {} keypoints, {} matches",
            keypoints_a.len(),
            keypoints_b.len(),
            matches.len()
        );
        MatchReport {
            keypoints_a,
            keypoints_b,
            matches,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_parse() {
        assert_eq!("harris".parse::<DetectorKind>().unwrap(), DetectorKind::Harris);
        assert_eq!("dog".parse::<DetectorKind>().unwrap(), DetectorKind::Dog);
        assert_eq!("lbp".parse::<DescriptorKind>().unwrap(), DescriptorKind::Lbp);
        assert!(matches!(
            "surf".parse::<DescriptorKind>(),
            Err(Error::UnknownDescriptor(_))
        ));
        assert!(matches!(
            "fast".parse::<DetectorKind>(),
            Err(Error::UnknownDetector(_))
        ));
    }

    #[test]
    fn summary_labels() {
        assert_eq!(DetectorKind::Harris.to_string(), "Harris");
        assert_eq!(DetectorKind::Blob.to_string(), "Blobs");
        assert_eq!(DetectorKind::Dog.to_string(), "DoG");
    }
}
