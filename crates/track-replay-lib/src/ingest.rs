//! Validation and storage of device-reported points
//!
//! The pipeline assumes finite, in-range coordinates and positive timestamps; this module
//! is where raw JSON from the device is held to that contract.

use crate::store::{InsertOutcome, TrackStore};
use crate::{SegmentType, TrackPoint};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Outcome counts of one ingestion batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub accepted: usize,
    pub rejected: usize,
    pub duplicate: usize,
}

impl IngestReport {
    pub fn total(&self) -> usize {
        self.accepted + self.rejected + self.duplicate
    }
}

/// Interpret a device timestamp as epoch milliseconds, 0 when it cannot be read
///
/// Numbers are taken as milliseconds (fractions truncated). Strings are tried as an
/// integer first, then as an RFC 3339 date-time.
pub fn parse_device_ts(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
            .unwrap_or(0),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(ms) = s.parse::<i64>() {
                return ms;
            }
            OffsetDateTime::parse(s, &Rfc3339)
                .map(|dt| (dt.unix_timestamp_nanos() / 1_000_000) as i64)
                .unwrap_or(0)
        }
        _ => 0,
    }
}

/// Number or numeric string
fn coordinate(value: Option<&Value>) -> Option<f64> {
    let n = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Validate one raw point
///
/// Requires `lat` in [-90, 90], `lng` in [-180, 180] and a positive `device_ts`. A missing
/// or unknown `segment_type` becomes `ground`.
pub fn validate_point(raw: &Value) -> Option<TrackPoint> {
    let object = raw.as_object()?;
    let lat = coordinate(object.get("lat"))?;
    let lng = coordinate(object.get("lng"))?;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return None;
    }

    let device_ts = object.get("device_ts").map(parse_device_ts).unwrap_or(0);
    if device_ts <= 0 {
        return None;
    }

    let segment_type = object
        .get("segment_type")
        .and_then(Value::as_str)
        .map(SegmentType::parse_lenient)
        .unwrap_or_default();

    Some(TrackPoint {
        lat,
        lng,
        device_ts,
        segment_type,
    })
}

/// Raw points of an upload body: `{"points": [...]}` or a bare array, else nothing
pub fn extract_batch(body: &Value) -> &[Value] {
    match body {
        Value::Array(points) => points.as_slice(),
        Value::Object(object) => match object.get("points") {
            Some(Value::Array(points)) => points.as_slice(),
            _ => &[],
        },
        _ => &[],
    }
}

/// Validate and store every point of an upload body
///
/// Validation runs in parallel; the valid points are then stored as one batch in input
/// order. A storage failure counts the whole batch as rejected and nothing of it is kept.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn ingest_batch<S: TrackStore + ?Sized>(store: &S, body: &Value, server_ts: i64) -> IngestReport {
    let validated: Vec<Option<TrackPoint>> = extract_batch(body)
        .par_iter()
        .map(validate_point)
        .collect();

    let report = store_candidates(store, validated, server_ts);
    tracing::info!(
        "Ingested batch: {} accepted, {} duplicate, {} rejected",
        report.accepted,
        report.duplicate,
        report.rejected
    );
    report
}

/// Store points that were already parsed, such as GPX waypoints
///
/// Points failing [`TrackPoint::is_valid`] are rejected; the rest follow the same batch
/// rules as [`ingest_batch`].
pub fn ingest_points<S: TrackStore + ?Sized>(
    store: &S,
    points: &[TrackPoint],
    server_ts: i64,
) -> IngestReport {
    let candidates = points
        .iter()
        .map(|point| point.is_valid().then_some(*point))
        .collect();

    let report = store_candidates(store, candidates, server_ts);
    tracing::info!(
        "Imported points: {} accepted, {} duplicate, {} rejected",
        report.accepted,
        report.duplicate,
        report.rejected
    );
    report
}

/// `None` candidates are rejected without touching the store
fn store_candidates<S: TrackStore + ?Sized>(
    store: &S,
    candidates: Vec<Option<TrackPoint>>,
    server_ts: i64,
) -> IngestReport {
    let total = candidates.len();
    let valid: Vec<TrackPoint> = candidates.into_iter().flatten().collect();
    let mut report = IngestReport {
        rejected: total - valid.len(),
        ..IngestReport::default()
    };
    if valid.is_empty() {
        return report;
    }

    match store.insert_points(&valid, server_ts) {
        Ok(outcomes) => {
            for outcome in outcomes {
                match outcome {
                    InsertOutcome::Inserted(_) => report.accepted += 1,
                    InsertOutcome::Duplicate => report.duplicate += 1,
                }
            }
        }
        Err(e) => {
            tracing::warn!("Failed to store batch of {} points: {}", valid.len(), e);
            report.rejected += valid.len();
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use serde_json::json;

    #[test]
    fn test_parse_device_ts() {
        assert_eq!(parse_device_ts(&json!(1_700_000_000_000i64)), 1_700_000_000_000);
        assert_eq!(parse_device_ts(&json!(12.9)), 12);
        assert_eq!(parse_device_ts(&json!("1700000000000")), 1_700_000_000_000);
        assert_eq!(
            parse_device_ts(&json!("2023-11-14T22:13:20Z")),
            1_700_000_000_000
        );
        assert_eq!(parse_device_ts(&json!("2023-11-14T23:13:20.5+01:00")), 1_700_000_000_500);
        assert_eq!(parse_device_ts(&json!("yesterday")), 0);
        assert_eq!(parse_device_ts(&json!(null)), 0);
        assert_eq!(parse_device_ts(&json!(true)), 0);
    }

    #[test]
    fn test_validate_point() {
        let point = validate_point(&json!({
            "lat": 45.5, "lng": "9.25", "device_ts": 10, "segment_type": "plane"
        }))
        .unwrap();
        assert_eq!(point, TrackPoint::new(45.5, 9.25, 10).with_segment_type(SegmentType::Plane));

        let point = validate_point(&json!({"lat": 1, "lng": 2, "device_ts": 3, "segment_type": "car"}));
        assert_eq!(point.map(|p| p.segment_type), Some(SegmentType::Ground));

        assert!(validate_point(&json!({"lat": 91, "lng": 0, "device_ts": 1})).is_none());
        assert!(validate_point(&json!({"lat": 0, "lng": 180.5, "device_ts": 1})).is_none());
        assert!(validate_point(&json!({"lat": 0, "lng": 0, "device_ts": 0})).is_none());
        assert!(validate_point(&json!({"lat": 0, "lng": 0})).is_none());
        assert!(validate_point(&json!({"lat": "north", "lng": 0, "device_ts": 1})).is_none());
        assert!(validate_point(&json!([1, 2, 3])).is_none());
    }

    #[test]
    fn test_extract_batch_shapes() {
        assert_eq!(extract_batch(&json!([{"a": 1}, {"b": 2}])).len(), 2);
        assert_eq!(extract_batch(&json!({"points": [{"a": 1}]})).len(), 1);
        assert!(extract_batch(&json!({"points": "nope"})).is_empty());
        assert!(extract_batch(&json!(42)).is_empty());
    }

    #[test]
    fn test_ingest_batch_counts() {
        let store = MemoryStore::new();
        let body = json!({
            "points": [
                {"lat": 45.0, "lng": 9.0, "device_ts": 1000},
                {"lat": 45.0, "lng": 9.0, "device_ts": 1000},
                {"lat": 45.1, "lng": 9.1, "device_ts": "2000"},
                {"lat": 100.0, "lng": 9.0, "device_ts": 3000},
                "garbage"
            ]
        });
        let report = ingest_batch(&store, &body, 5_000);
        assert_eq!(
            report,
            IngestReport {
                accepted: 2,
                rejected: 2,
                duplicate: 1
            }
        );
        assert_eq!(report.total(), 5);
        assert_eq!(store.last_sync_server_ts().unwrap(), Some(5_000));

        // Re-sending the same batch only produces duplicates and rejections
        let report = ingest_batch(&store, &body, 6_000);
        assert_eq!(report.accepted, 0);
        assert_eq!(report.duplicate, 3);
    }

    #[test]
    fn test_ingest_points_rejects_invalid() {
        let store = MemoryStore::new();
        let points = [
            TrackPoint::new(45.0, 9.0, 1_000),
            TrackPoint::new(45.0, 9.0, 1_000),
            TrackPoint::new(95.0, 9.0, 2_000),
            TrackPoint::new(45.1, 9.1, 0),
        ];
        let report = ingest_points(&store, &points, 7);
        assert_eq!(
            report,
            IngestReport {
                accepted: 1,
                rejected: 2,
                duplicate: 1
            }
        );
        assert_eq!(store.last_sync_server_ts().unwrap(), Some(7));
    }

    #[test]
    fn test_storage_failure_rejects_whole_batch() {
        let dir = std::env::temp_dir().join(format!("track-replay-ingest-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let blocker = dir.join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let store = crate::JsonFileStore::open(blocker.join("store.json")).unwrap();

        let body = json!([
            {"lat": 45.0, "lng": 9.0, "device_ts": 1000},
            {"lat": 45.1, "lng": 9.1, "device_ts": 2000},
            {"lat": 100.0, "lng": 9.0, "device_ts": 3000}
        ]);
        let report = ingest_batch(&store, &body, 5_000);
        assert_eq!(
            report,
            IngestReport {
                accepted: 0,
                rejected: 3,
                duplicate: 0
            }
        );

        // Both paths behave the same and a retry is not mistaken for a duplicate
        let points = [TrackPoint::new(45.0, 9.0, 1000)];
        assert_eq!(ingest_points(&store, &points, 6_000).rejected, 1);
        assert!(store.points_before(i64::MAX).unwrap().is_empty());
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
