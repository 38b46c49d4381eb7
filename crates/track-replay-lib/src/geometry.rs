//! Planar distance helpers in raw degree space
//!
//! Latitude and longitude differences are used directly as Euclidean coordinates. There is
//! no geodesic correction; at the zoom levels a replay map is viewed at, the distortion is
//! well below what a simplification tolerance can resolve.

use crate::TrackPoint;

/// Floor for the squared segment length, so a zero-length segment never divides by zero
const MIN_SEGMENT_LENGTH_SQ: f64 = 1e-10;

/// Distance from `p` to the segment `line_start`-`line_end` (not the infinite line)
///
/// The projection parameter is clamped to `[0, 1]`. For a zero-length segment the result
/// degenerates to the distance between `p` and `line_start`. Only `lat`/`lng` are read.
#[inline]
pub fn perpendicular_distance(p: &TrackPoint, line_start: &TrackPoint, line_end: &TrackPoint) -> f64 {
    let start = line_start.coord();
    let delta = line_end.coord() - start;
    let offset = p.coord() - start;

    let length_sq = match delta.x * delta.x + delta.y * delta.y {
        l if l > 0.0 => l,
        _ => MIN_SEGMENT_LENGTH_SQ,
    };

    let u = ((offset.x * delta.x + offset.y * delta.y) / length_sq).clamp(0.0, 1.0);
    let closest = start + delta * u;
    let diff = p.coord() - closest;

    diff.x.hypot(diff.y)
}
