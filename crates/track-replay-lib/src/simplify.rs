//! Douglas-Peucker polyline simplification
//!
//! The classic formulation recurses on `[first..split]` and `[split..last]`. Pathological
//! near-collinear tracks make that recursion O(N) deep, so the spans are processed from an
//! explicit stack of `(start, end)` index ranges instead. Each span either collapses to its
//! endpoints or marks its split point as kept and pushes both halves; the kept set, read
//! back in index order, is exactly what the recursive concatenation would produce.

use crate::{TrackPoint, geometry::perpendicular_distance};

/// Simplify an ordered track, returning the indices of the kept points (ascending)
///
/// - Inputs of length ≤ 2 keep every index, whatever the tolerance.
/// - The first and last indices are always kept.
/// - Among equally distant interior points the leftmost one is chosen as split point.
/// - A negative `epsilon` behaves like 0.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn simplify_indices(points: &[TrackPoint], epsilon: f64) -> Vec<usize> {
    if points.len() <= 2 {
        return (0..points.len()).collect();
    }

    // With a negative tolerance a span whose interior lies exactly on its baseline would
    // have no split point and still fail the collapse test.
    let epsilon = epsilon.max(0.0);

    let last = points.len() - 1;
    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[last] = true;

    let mut stack = vec![(0usize, last)];
    while let Some((start, end)) = stack.pop() {
        if end <= start + 1 {
            continue;
        }

        let (split, max_distance) = farthest_point(points, start, end);
        if max_distance <= epsilon {
            continue;
        }

        keep[split] = true;
        stack.push((split, end));
        stack.push((start, split));
    }

    keep.iter()
        .enumerate()
        .filter_map(|(i, &k)| k.then_some(i))
        .collect()
}

/// Simplify an ordered track, returning the kept points themselves
pub fn simplify(points: &[TrackPoint], epsilon: f64) -> Vec<TrackPoint> {
    simplify_indices(points, epsilon)
        .into_iter()
        .map(|i| points[i])
        .collect()
}

/// Interior point of `start..=end` farthest from the `start`-`end` segment
///
/// Strict `>` keeps the first occurrence of the maximum. Returns `(start, 0.0)` when no
/// interior point lies off the baseline.
#[inline]
fn farthest_point(points: &[TrackPoint], start: usize, end: usize) -> (usize, f64) {
    let first = &points[start];
    let last = &points[end];

    let mut max_distance = 0.0;
    let mut split = start;
    for (i, point) in points.iter().enumerate().take(end).skip(start + 1) {
        let distance = perpendicular_distance(point, first, last);
        if distance > max_distance {
            max_distance = distance;
            split = i;
        }
    }
    (split, max_distance)
}
