//! Integer knobs as a command line or slider panel exposes them.
//!
//! Every knob is clamped into its range and converted to the detector
//! parameter by a fixed factor. Nothing here can fail.

use crate::blob::BlobDetector;
use crate::derivatives::ApertureSize;
use crate::harris::Harris;
use crate::lbp::Lbp;
use crate::matching::Matcher;
use crate::scale_space::ScaleSpace;

/// Smallest gap enforced between the blob threshold bounds.
pub const MIN_THRESHOLD_GAP: u32 = 10;

fn limit(value: Option<usize>) -> Option<usize> {
    value.filter(|&n| n > 0)
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HarrisKnobs {
    /// 0 to 10, raised to at least 2.
    pub block_size: u32,
    /// 0 to 3, selecting apertures 3, 5, 7 and 7.
    pub aperture_level: u32,
    /// Harris k in hundredths, 0 to 10. 0 means 0.01.
    pub k_x100: u32,
    /// 0 to 255.
    pub threshold: u32,
    /// 0 to 2000, 0 keeps everything.
    pub max_keypoints: u32,
}

impl Default for HarrisKnobs {
    fn default() -> Self {
        Self {
            block_size: 2,
            aperture_level: 0,
            k_x100: 4,
            threshold: 200,
            max_keypoints: 500,
        }
    }
}

impl HarrisKnobs {
    pub fn harris(&self) -> Harris {
        let k_x100 = self.k_x100.min(10);
        Harris {
            block_size: self.block_size.clamp(2, 10),
            aperture: ApertureSize::from_level(self.aperture_level.min(3)),
            k: if k_x100 == 0 { 0.01 } else { k_x100 as f32 / 100.0 },
            threshold: self.threshold.min(255) as f32,
            max_keypoints: limit(Some(self.max_keypoints.min(2000) as usize)),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BlobKnobs {
    /// 0 to 255.
    pub min_threshold: u32,
    /// 0 to 255, kept at least 10 above the minimum.
    pub max_threshold: u32,
    /// 0 to 5000 pixels.
    pub min_area: u32,
    /// Percent, 0 to 100.
    pub circularity: u32,
    /// Percent, 0 to 100.
    pub convexity: u32,
    /// Percent, 0 to 100.
    pub inertia: u32,
}

impl Default for BlobKnobs {
    fn default() -> Self {
        Self {
            min_threshold: 10,
            max_threshold: 220,
            min_area: 100,
            circularity: 4,
            convexity: 58,
            inertia: 10,
        }
    }
}

impl BlobKnobs {
    pub fn blob_detector(&self) -> BlobDetector {
        let max_threshold = self.max_threshold.min(255);
        let min_threshold = self
            .min_threshold
            .min(255)
            .min(max_threshold.saturating_sub(MIN_THRESHOLD_GAP));
        let max_threshold = max_threshold.max(min_threshold + MIN_THRESHOLD_GAP);
        let percent = |value: u32| Some(value.min(100) as f32 / 100.0);
        BlobDetector {
            min_threshold: min_threshold as u8,
            max_threshold: max_threshold as u8,
            min_area: self.min_area.min(5000) as f32,
            min_circularity: percent(self.circularity),
            min_convexity: percent(self.convexity),
            min_inertia_ratio: percent(self.inertia),
            ..Default::default()
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScaleSpaceKnobs {
    /// 0 to 2000, 0 keeps everything.
    pub max_features: u32,
    /// 1 to 8.
    pub octave_layers: u32,
    /// 1 to 20, the threshold is this over 40000.
    pub contrast_x100: u32,
    /// 0 to 20, 0 disables the edge test.
    pub edge_threshold: u32,
    /// Base sigma in tenths, 1 to 50.
    pub sigma_x10: u32,
}

impl Default for ScaleSpaceKnobs {
    fn default() -> Self {
        Self {
            max_features: 500,
            octave_layers: 4,
            contrast_x100: 4,
            edge_threshold: 10,
            sigma_x10: 16,
        }
    }
}

impl ScaleSpaceKnobs {
    pub fn scale_space(&self) -> ScaleSpace {
        ScaleSpace {
            max_features: limit(Some(self.max_features.min(2000) as usize)),
            octave_layers: self.octave_layers.clamp(1, 8),
            contrast_threshold: f64::from(self.contrast_x100.clamp(1, 20)) / 40000.0,
            edge_threshold: self.edge_threshold.min(20) as f32,
            sigma: f64::from(self.sigma_x10.clamp(1, 50)) / 10.0,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MatchKnobs {
    /// Lowe ratio in hundredths, 1 to 100.
    pub ratio_x100: u32,
    /// 1 to 3.
    pub lbp_radius: u32,
}

impl Default for MatchKnobs {
    fn default() -> Self {
        Self {
            ratio_x100: 75,
            lbp_radius: 1,
        }
    }
}

impl MatchKnobs {
    pub fn matcher(&self) -> Matcher {
        Matcher::new(self.ratio_x100.clamp(1, 100) as f32 / 100.0)
    }

    pub fn lbp(&self) -> Lbp {
        Lbp::new(self.lbp_radius.clamp(1, 3))
    }
}
