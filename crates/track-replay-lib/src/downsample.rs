//! Adaptive downsampling to a point budget
//!
//! Searches the epsilon grid `step, 2·step, …, ceiling` for the smallest tolerance whose
//! simplification fits in `max_points`. The set of points Douglas-Peucker keeps can only
//! shrink as epsilon grows (split points do not depend on the tolerance, only where the
//! descent stops does), so feasibility is monotonic along the grid and a bisecting search
//! lands on the same grid point as a linear scan.
//!
//! When even the ceiling does not meet the budget the ceiling's result is returned, which
//! may still be longer than `max_points`.

use crate::{TrackPoint, simplify::simplify_indices};

/// Default point budget for a public track
pub const DEFAULT_MAX_POINTS: usize = 500;
/// Spacing of the epsilon grid, in degrees
pub const DEFAULT_EPSILON_STEP: f64 = 0.0001;
/// Largest tolerance tried before giving up on the budget, in degrees
pub const DEFAULT_EPSILON_CEILING: f64 = 1.0;

/// How the epsilon grid is searched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SearchStrategy {
    /// Try every grid point in increasing order
    Linear,
    /// Bisect the grid, O(log n) simplification passes
    #[default]
    Bisect,
}

/// Configuration for [`downsample`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DownsampleConfig {
    /// Target number of points. Inputs at or below it are returned untouched.
    pub max_points: usize,
    /// Grid spacing for the tolerance search
    pub epsilon_step: f64,
    /// Hard ceiling for the tolerance search
    pub epsilon_ceiling: f64,
    pub strategy: SearchStrategy,
}

impl Default for DownsampleConfig {
    fn default() -> Self {
        Self {
            max_points: DEFAULT_MAX_POINTS,
            epsilon_step: DEFAULT_EPSILON_STEP,
            epsilon_ceiling: DEFAULT_EPSILON_CEILING,
            strategy: SearchStrategy::default(),
        }
    }
}

impl DownsampleConfig {
    /// Default search parameters with a different budget
    pub fn with_max_points(max_points: usize) -> Self {
        Self {
            max_points,
            ..Self::default()
        }
    }

    /// Number of grid points between `step` and `ceiling`, at least one
    fn grid_len(&self) -> usize {
        if !(self.epsilon_step > 0.0) || !(self.epsilon_ceiling > 0.0) {
            return 1;
        }
        ((self.epsilon_ceiling / self.epsilon_step).round() as usize).max(1)
    }

    #[inline]
    fn epsilon_at(&self, k: usize) -> f64 {
        if self.epsilon_step > 0.0 {
            k as f64 * self.epsilon_step
        } else {
            self.epsilon_ceiling
        }
    }
}

/// Downsample a track to roughly `config.max_points`, returning kept indices (ascending)
///
/// If the track already fits, every index is returned. Otherwise the first and last
/// indices are always part of the result.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn downsample_indices(points: &[TrackPoint], config: &DownsampleConfig) -> Vec<usize> {
    if points.len() <= config.max_points {
        return (0..points.len()).collect();
    }

    let grid_len = config.grid_len();
    let fits = |indices: &Vec<usize>| indices.len() <= config.max_points;

    let (k, indices) = match config.strategy {
        SearchStrategy::Linear => {
            let mut k = 1;
            let mut indices = simplify_indices(points, config.epsilon_at(k));
            while !fits(&indices) && k < grid_len {
                k += 1;
                indices = simplify_indices(points, config.epsilon_at(k));
            }
            (k, indices)
        }
        SearchStrategy::Bisect => {
            let at_ceiling = simplify_indices(points, config.epsilon_at(grid_len));
            if !fits(&at_ceiling) {
                (grid_len, at_ceiling)
            } else {
                // Invariant: `hi` is feasible, everything below `lo` is not
                let (mut lo, mut hi) = (1, grid_len);
                let mut best = at_ceiling;
                while lo < hi {
                    let mid = lo + (hi - lo) / 2;
                    let candidate = simplify_indices(points, config.epsilon_at(mid));
                    if fits(&candidate) {
                        hi = mid;
                        best = candidate;
                    } else {
                        lo = mid + 1;
                    }
                }
                (hi, best)
            }
        }
    };

    if fits(&indices) {
        tracing::debug!(
            "Downsampled {} points to {} (epsilon = {})",
            points.len(),
            indices.len(),
            config.epsilon_at(k)
        );
    } else {
        tracing::warn!(
            "Epsilon ceiling {} reached: {} points kept out of {}, budget was {}",
            config.epsilon_at(k),
            indices.len(),
            points.len(),
            config.max_points
        );
    }

    indices
}

/// Downsample a track to roughly `config.max_points` points
pub fn downsample(points: &[TrackPoint], config: &DownsampleConfig) -> Vec<TrackPoint> {
    if points.len() <= config.max_points {
        return points.to_vec();
    }
    downsample_indices(points, config)
        .into_iter()
        .map(|i| points[i])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simplify::simplify;

    fn wiggly_track(n: usize) -> Vec<TrackPoint> {
        (0..n)
            .map(|i| {
                let t = i as f64 / n as f64;
                TrackPoint::new(
                    51.5 + t * 0.1 + (t * 50.0).sin() * 0.001,
                    -0.1 + t * 0.1 + (t * 30.0).cos() * 0.001,
                    i as i64,
                )
            })
            .collect()
    }

    #[test]
    fn test_fitting_input_is_identity() {
        let points = vec![TrackPoint::new(0.0, 0.0, 1), TrackPoint::new(1.0, 1.0, 2)];
        assert_eq!(downsample(&points, &DownsampleConfig::default()), points);
        assert_eq!(
            downsample_indices(&points, &DownsampleConfig::with_max_points(2)),
            vec![0, 1]
        );

        let points = wiggly_track(500);
        assert_eq!(downsample(&points, &DownsampleConfig::default()), points);
    }

    #[test]
    fn test_collinear_track_collapses_under_budget() {
        let points: Vec<_> = (0..1000)
            .map(|i| TrackPoint::new(i as f64 * 0.001, i as f64 * 0.001, i))
            .collect();
        let out = downsample(&points, &DownsampleConfig::with_max_points(100));
        assert!(out.len() <= 100);
        assert_eq!(out.first(), points.first());
        assert_eq!(out.last(), points.last());
    }

    #[test]
    fn test_wiggly_track_meets_budget() {
        let points = wiggly_track(5_000);
        for max_points in [50, 200, 1_000] {
            let out = downsample(&points, &DownsampleConfig::with_max_points(max_points));
            assert!(out.len() <= max_points);
            assert!(out.len() >= 2);
            assert_eq!(out.first(), points.first());
            assert_eq!(out.last(), points.last());
        }
    }

    #[test]
    fn test_strategies_agree() {
        let points = wiggly_track(3_000);
        for max_points in [20, 120, 700] {
            let linear = DownsampleConfig {
                max_points,
                strategy: SearchStrategy::Linear,
                ..DownsampleConfig::default()
            };
            let bisect = DownsampleConfig {
                max_points,
                strategy: SearchStrategy::Bisect,
                ..DownsampleConfig::default()
            };
            assert_eq!(
                downsample_indices(&points, &linear),
                downsample_indices(&points, &bisect)
            );
        }
    }

    #[test]
    fn test_result_is_smallest_feasible_grid_point() {
        let points = wiggly_track(2_000);
        let config = DownsampleConfig::with_max_points(80);
        let out = downsample(&points, &config);

        // Find the grid point the search landed on and check the one below it overflows
        let k = (1..=config.grid_len())
            .find(|&k| simplify(&points, config.epsilon_at(k)).len() <= 80)
            .unwrap();
        assert_eq!(out, simplify(&points, config.epsilon_at(k)));
        if k > 1 {
            assert!(simplify(&points, config.epsilon_at(k - 1)).len() > 80);
        }
    }

    #[test]
    fn test_ceiling_returns_last_attempt() {
        // Zigzag with amplitude far above the ceiling: nothing collapses
        let points: Vec<_> = (0..50)
            .map(|i| TrackPoint::new(if i % 2 == 0 { 0.0 } else { 5.0 }, i as f64, i))
            .collect();
        for strategy in [SearchStrategy::Linear, SearchStrategy::Bisect] {
            let config = DownsampleConfig {
                max_points: 10,
                epsilon_step: 0.1,
                strategy,
                ..DownsampleConfig::default()
            };
            let out = downsample(&points, &config);
            assert_eq!(out, simplify(&points, 1.0));
            assert!(out.len() > 10);
            assert!(out.len() <= points.len());
        }
    }

    #[test]
    fn test_grid_len() {
        assert_eq!(DownsampleConfig::default().grid_len(), 10_000);
        let degenerate = DownsampleConfig {
            epsilon_step: 0.0,
            ..DownsampleConfig::default()
        };
        assert_eq!(degenerate.grid_len(), 1);
        assert_eq!(degenerate.epsilon_at(1), 1.0);
    }
}
