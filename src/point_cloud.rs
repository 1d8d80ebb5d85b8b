use crate::volume::Volume;

use rand::{Rng, seq::index};
use tracing::debug;

/// Point limit that keeps a scatter plot interactive.
pub const DEFAULT_POINT_BUDGET: usize = 120_000;

const INTENSITY_EPSILON: f32 = 1e-5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SparsePoint {
    pub x: usize,
    pub y: usize,
    pub z: usize,
    /// Intensity mapped to `[0, 1]` over the thresholded voxels.
    pub intensity: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparsePointSet {
    pub points: Vec<SparsePoint>,
    /// Voxels above the threshold before down-sampling.
    pub candidates: usize,
}

impl SparsePointSet {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn is_downsampled(&self) -> bool {
        self.points.len() < self.candidates
    }
}

/// Thresholds a volume and down-samples the survivors to a point budget.
#[derive(Debug, Clone, Copy)]
pub struct SparsePointSampler {
    threshold: i32,
    budget: usize,
}

impl Default for SparsePointSampler {
    fn default() -> Self {
        Self {
            threshold: 0,
            budget: DEFAULT_POINT_BUDGET,
        }
    }
}

impl SparsePointSampler {
    /// Keep voxels strictly brighter than `threshold`, at most `budget` of
    /// them.
    pub fn new(threshold: i32, budget: usize) -> Self {
        Self { threshold, budget }
    }

    pub fn with_threshold(mut self, threshold: i32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_budget(mut self, budget: usize) -> Self {
        self.budget = budget;
        self
    }

    pub fn threshold(&self) -> i32 {
        self.threshold
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Sample with the thread-local generator. Two calls on the same volume
    /// may return different subsets.
    pub fn sample(&self, volume: &Volume) -> SparsePointSet {
        self.sample_with_rng(volume, &mut rand::thread_rng())
    }

    pub fn sample_with_rng<R: Rng + ?Sized>(&self, volume: &Volume, rng: &mut R) -> SparsePointSet {
        let threshold = self.threshold;
        let voxels: Vec<((usize, usize, usize), u8)> = volume
            .data()
            .indexed_iter()
            .filter(|&(_, &value)| i32::from(value) > threshold)
            .map(|(index, &value)| (index, value))
            .collect();

        let candidates = voxels.len();
        let Some((min, max)) = voxels.iter().fold(None, |acc: Option<(u8, u8)>, &(_, v)| {
            Some(acc.map_or((v, v), |(min, max)| (min.min(v), max.max(v))))
        }) else {
            return SparsePointSet::default();
        };
        let range = f32::from(max - min) + INTENSITY_EPSILON;
        let to_point = |((z, y, x), value): ((usize, usize, usize), u8)| SparsePoint {
            x,
            y,
            z,
            intensity: (f32::from(value - min) / range).clamp(0.0, 1.0),
        };

        let points: Vec<SparsePoint> = if candidates > self.budget {
            index::sample(rng, candidates, self.budget)
                .into_iter()
                .map(|i| to_point(voxels[i]))
                .collect()
        } else {
            voxels.into_iter().map(to_point).collect()
        };

        debug!(
            candidates,
            points = points.len(),
            threshold,
            "sampled point cloud"
        );
        SparsePointSet { points, candidates }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;
    use rand::{SeedableRng, rngs::StdRng};
    use std::collections::HashSet;

    fn gradient() -> Volume {
        let data =
            Array3::from_shape_fn((8, 16, 16), |(z, y, x)| ((z * 256 + y * 16 + x) % 256) as u8);
        Volume::new(data, None)
    }

    #[test]
    fn never_exceeds_budget() {
        let volume = gradient();
        let mut rng = StdRng::seed_from_u64(7);
        let set = SparsePointSampler::new(0, 100).sample_with_rng(&volume, &mut rng);
        assert_eq!(set.len(), 100);
        assert!(set.is_downsampled());
        assert_eq!(set.candidates, 8 * 255);

        let unique: HashSet<_> = set.points.iter().map(|p| (p.x, p.y, p.z)).collect();
        assert_eq!(unique.len(), 100, "sampling is without replacement");
    }

    #[test]
    fn intensities_are_unit_range_over_threshold_subset() {
        let volume = gradient();
        let set = SparsePointSampler::new(200, usize::MAX).sample(&volume);
        assert_eq!(set.len(), set.candidates);
        assert!(set.points.iter().all(|p| (0.0..=1.0).contains(&p.intensity)));

        let darkest = set.points.iter().map(|p| p.intensity).fold(f32::MAX, f32::min);
        let brightest = set.points.iter().map(|p| p.intensity).fold(0.0, f32::max);
        assert_eq!(darkest, 0.0);
        assert!(brightest > 0.99);
        assert!(
            set.points
                .iter()
                .all(|p| volume.data()[[p.z, p.y, p.x]] > 200)
        );
    }

    #[test]
    fn threshold_above_maximum_is_empty() {
        let volume = gradient();
        let max = *volume.data().iter().max().unwrap();
        let set = SparsePointSampler::default()
            .with_threshold(i32::from(max) + 1)
            .sample(&volume);
        assert!(set.is_empty());
        assert_eq!(set.candidates, 0);
    }

    #[test]
    fn zero_budget_yields_no_points() {
        let volume = gradient();
        let set = SparsePointSampler::default().with_budget(0).sample(&volume);
        assert!(set.is_empty());
        assert!(set.candidates > 0);
    }

    #[test]
    fn default_keeps_all_nonzero_voxels_under_budget() {
        let volume = gradient();
        let set = SparsePointSampler::default().sample(&volume);
        assert_eq!(set.len(), 8 * 255);
        assert!(!set.is_downsampled());
    }
}
