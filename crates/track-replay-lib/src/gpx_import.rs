//! Conversion of recorded GPX tracks into device fixes
//!
//! Lets a track recorded by another tool be back-filled into the store. Every segment of
//! every track contributes its waypoints; waypoints without a timestamp cannot be placed
//! on the replay timeline and are skipped.

use crate::{Result, SegmentType, TrackPoint};
use std::io::Read;
use time::OffsetDateTime;

/// Convert parsed GPX data into points sorted ascending by `device_ts`
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn points_from_gpx(gpx: &gpx::Gpx, segment_type: SegmentType) -> Vec<TrackPoint> {
    let mut skipped = 0usize;
    let mut points = Vec::new();

    for track in &gpx.tracks {
        for segment in &track.segments {
            for waypoint in &segment.points {
                let Some(time) = waypoint.time.clone() else {
                    skipped += 1;
                    continue;
                };
                let device_ts =
                    (OffsetDateTime::from(time).unix_timestamp_nanos() / 1_000_000) as i64;
                points.push(
                    TrackPoint::new(waypoint.point().y(), waypoint.point().x(), device_ts)
                        .with_segment_type(segment_type),
                );
            }
        }
    }

    if skipped > 0 {
        tracing::debug!("Skipped {} GPX waypoints without a timestamp", skipped);
    }

    // Stable: waypoints sharing a timestamp keep their document order
    points.sort_by_key(|p| p.device_ts);
    points
}

/// Parse a GPX document and convert it with [`points_from_gpx`]
pub fn read_points<R: Read>(reader: R, segment_type: SegmentType) -> Result<Vec<TrackPoint>> {
    let gpx = gpx::read(reader)?;
    Ok(points_from_gpx(&gpx, segment_type))
}
