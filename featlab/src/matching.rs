//! Brute force descriptor matching with Lowe's ratio test.

use log::*;

/// Bins of the reference histogram at or below this value are ignored by
/// [`ChiSquare`]. Padded histogram bins sit well above it.
pub const CHI_SQUARE_EPSILON: f64 = f64::EPSILON;

/// A dissimilarity between two descriptors. Smaller is more similar.
pub trait Metric {
    fn distance(&self, a: &[f32], b: &[f32]) -> f32;
}

/// Straight line distance, for gradient histogram descriptors.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct Euclidean;

impl Metric for Euclidean {
    fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        a.iter()
            .zip(b)
            .map(|(&a, &b)| (a - b) * (a - b))
            .sum::<f32>()
            .sqrt()
    }
}

/// Chi-square histogram distance `Σ (a - b)² / a`.
///
/// The first histogram is the reference. It is not symmetric. Terms are
/// summed in `f64` so near-empty reference bins still count.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct ChiSquare;

impl Metric for ChiSquare {
    fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        a.iter()
            .zip(b)
            .map(|(&a, &b)| (f64::from(a), f64::from(b)))
            .filter(|&(a, _)| a.abs() > CHI_SQUARE_EPSILON)
            .map(|(a, b)| (a - b) * (a - b) / a)
            .sum::<f64>() as f32
    }
}

/// An accepted correspondence between a query and a train descriptor.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Match {
    /// Index into the query descriptor set.
    pub query: usize,
    /// Index into the train descriptor set.
    pub train: usize,
    /// Distance to the nearest train descriptor.
    pub distance: f32,
}

/// Contains the configuration parameters of the matcher.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Matcher {
    /// A match is kept only when the nearest distance is below `ratio`
    /// times the second nearest.
    pub ratio: f32,
}

impl Default for Matcher {
    fn default() -> Self {
        Self { ratio: 0.75 }
    }
}

impl Matcher {
    pub fn new(ratio: f32) -> Self {
        Self { ratio }
    }

    /// Match every present query descriptor against the train set.
    ///
    /// Absent descriptors on either side are skipped but keep their index.
    /// A query needs at least two train candidates to pass the ratio test,
    /// and a zero second distance rejects it.
    pub fn match_descriptors<M: Metric>(
        &self,
        query: &[Option<Vec<f32>>],
        train: &[Option<Vec<f32>>],
        metric: &M,
    ) -> Vec<Match> {
        let matches: Vec<Match> = query
            .iter()
            .enumerate()
            .filter_map(|(query_ix, descriptor)| {
                let descriptor = descriptor.as_deref()?;
                self.match_one(descriptor, train, metric)
                    .map(|(train_ix, distance)| Match {
                        query: query_ix,
                        train: train_ix,
                        distance,
                    })
            })
            .collect();
        info!(
            "Ratio test kept {} of {} query descriptors",
            matches.len(),
            query.iter().filter(|d| d.is_some()).count()
        );
        matches
    }

    fn match_one<M: Metric>(
        &self,
        descriptor: &[f32],
        train: &[Option<Vec<f32>>],
        metric: &M,
    ) -> Option<(usize, f32)> {
        let mut best: Option<(usize, f32)> = None;
        let mut second = f32::INFINITY;
        for (train_ix, candidate) in train.iter().enumerate() {
            let candidate = match candidate {
                Some(candidate) => candidate,
                None => continue,
            };
            let distance = metric.distance(descriptor, candidate);
            match best {
                Some((_, best_distance)) if distance >= best_distance => {
                    if distance < second {
                        second = distance;
                    }
                }
                _ => {
                    if let Some((_, best_distance)) = best {
                        second = best_distance;
                    }
                    best = Some((train_ix, distance));
                }
            }
        }
        let (train_ix, best_distance) = best?;
        if second.is_finite() && second > 0.0 && best_distance < self.ratio * second {
            Some((train_ix, best_distance))
        } else {
            None
        }
    }
}
