//! Core value types: device fixes and the media anchored to them

use geo::Coord;
use serde::{Deserialize, Serialize};

/// Extensions treated as video when inferring a media kind from its URL
const VIDEO_EXTENSIONS: [&str; 6] = [".mp4", ".webm", ".mov", ".m4v", ".avi", ".mkv"];

/// Transportation mode attached to a point, used only for styling
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentType {
    #[default]
    Ground,
    Plane,
    Boat,
}

impl SegmentType {
    /// Parse a segment tag, falling back to [`SegmentType::Ground`] for anything unknown
    pub fn parse_lenient(value: &str) -> Self {
        match value {
            "plane" => SegmentType::Plane,
            "boat" => SegmentType::Boat,
            _ => SegmentType::Ground,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentType::Ground => "ground",
            SegmentType::Plane => "plane",
            SegmentType::Boat => "boat",
        }
    }
}

impl std::str::FromStr for SegmentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ground" => Ok(SegmentType::Ground),
            "plane" => Ok(SegmentType::Plane),
            "boat" => Ok(SegmentType::Boat),
            other => Err(format!("unknown segment type: {other}")),
        }
    }
}

/// One reported device fix
///
/// Within one ordered track, points are sorted ascending by `device_ts` and no two
/// points share the full `(device_ts, lat, lng)` triple.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    pub lat: f64,
    pub lng: f64,
    /// Device-reported epoch milliseconds
    pub device_ts: i64,
    #[serde(default)]
    pub segment_type: SegmentType,
}

impl TrackPoint {
    /// Create a ground point
    pub fn new(lat: f64, lng: f64, device_ts: i64) -> Self {
        Self {
            lat,
            lng,
            device_ts,
            segment_type: SegmentType::Ground,
        }
    }

    pub fn with_segment_type(mut self, segment_type: SegmentType) -> Self {
        self.segment_type = segment_type;
        self
    }

    /// Planar coordinate in degree space (x = longitude, y = latitude)
    #[inline(always)]
    pub fn coord(&self) -> Coord<f64> {
        Coord {
            x: self.lng,
            y: self.lat,
        }
    }

    /// Exact match on the `(lat, lng, device_ts)` identity triple
    #[inline]
    pub fn same_fix(&self, other: &TrackPoint) -> bool {
        self.lat == other.lat && self.lng == other.lng && self.device_ts == other.device_ts
    }

    /// Check if the point has finite, in-range coordinates and a positive timestamp
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
            && self.device_ts > 0
    }
}

/// Kind of media attached to a point
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    #[default]
    Image,
    Video,
}

impl MediaKind {
    /// Guess the media kind from the URL's file extension
    pub fn infer(url: &str) -> Self {
        let lower = url.trim().to_lowercase();
        let is_video = lower
            .rfind('.')
            .is_some_and(|dot| VIDEO_EXTENSIONS.contains(&&lower[dot..]));
        if is_video {
            MediaKind::Video
        } else {
            MediaKind::Image
        }
    }
}

/// A photo or video bound to a position inside one specific ordered track
///
/// `point_index` is only meaningful for the sequence it was computed against and must be
/// recomputed whenever that sequence changes shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaAnchor {
    pub point_index: usize,
    #[serde(rename = "type")]
    pub kind: MediaKind,
    pub url: String,
    pub title: String,
    pub description: String,
}
