//! Storage abstraction for points, media and key-value configuration.
//!
//! The pipeline only ever reads through these traits; real deployments put a database
//! behind them. Two implementations ship with the library:
//!
//! - `MemoryStore`: everything in memory behind an `RwLock` (tests, embedding).
//! - `JsonFileStore`: a single JSON snapshot file `{points, media, config}`, read on
//!   open and rewritten synchronously after every mutation. Memory only changes once
//!   the write succeeded.
//!
//! Both share the same bookkeeping in [`Snapshot`], so deduplication and id assignment
//! behave identically.

mod file;
mod memory;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

use crate::{MediaKind, TrackPoint};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::str::FromStr;
use thiserror::Error;

pub type PointId = u64;
pub type MediaId = u64;

/// Page size of a media listing when none is given
pub const DEFAULT_MEDIA_LIMIT: usize = 25;
/// Largest page of a media listing
pub const MAX_MEDIA_LIMIT: usize = 100;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Lock poisoned: {0}")]
    Poisoned(String),

    #[error("Point {0} not found")]
    UnknownPoint(PointId),

    #[error("Invalid media: {0}")]
    InvalidMedia(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A persisted fix with its storage identity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StoredPoint {
    pub id: PointId,
    #[serde(flatten)]
    pub point: TrackPoint,
    /// Server receive time, epoch milliseconds
    pub server_ts: i64,
}

/// A persisted photo or video, bound to a point by id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRecord {
    pub id: MediaId,
    pub point_id: PointId,
    #[serde(rename = "type")]
    pub kind: MediaKind,
    pub url: String,
    pub title: String,
    pub description: String,
    /// Epoch seconds
    pub created_at: i64,
    #[serde(default)]
    pub taken_at: Option<i64>,
    #[serde(default)]
    pub taken_lat: Option<f64>,
    #[serde(default)]
    pub taken_lng: Option<f64>,
}

/// Input for [`TrackStore::insert_media`]; the kind is inferred from the URL
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewMedia {
    pub point_id: PointId,
    pub url: String,
    pub title: String,
    pub description: String,
    pub created_at: i64,
    pub taken_at: Option<i64>,
    pub taken_lat: Option<f64>,
    pub taken_lng: Option<f64>,
}

/// Partial update for [`TrackStore::update_media`]
///
/// `None` leaves a field untouched. The `taken_*` fields are doubly optional so they can
/// be cleared with `Some(None)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaPatch {
    pub point_id: Option<PointId>,
    pub url: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub taken_at: Option<Option<i64>>,
    pub taken_lat: Option<Option<f64>>,
    pub taken_lng: Option<Option<f64>>,
}

/// Column a media listing is ordered by
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MediaSort {
    Id,
    #[default]
    CreatedAt,
    TakenAt,
    Title,
}

impl MediaSort {
    fn compare(&self, a: &MediaRecord, b: &MediaRecord) -> Ordering {
        match self {
            MediaSort::Id => a.id.cmp(&b.id),
            MediaSort::CreatedAt => a.created_at.cmp(&b.created_at),
            // Missing capture times sort before any time, as SQL NULLs do
            MediaSort::TakenAt => a.taken_at.cmp(&b.taken_at),
            MediaSort::Title => a.title.cmp(&b.title),
        }
    }
}

impl FromStr for MediaSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "id" => Ok(MediaSort::Id),
            "created_at" | "created-at" => Ok(MediaSort::CreatedAt),
            "taken_at" | "taken-at" => Ok(MediaSort::TakenAt),
            "title" => Ok(MediaSort::Title),
            other => Err(format!("unknown media sort column: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(format!("unknown sort order: {other}")),
        }
    }
}

/// Selection and paging of [`TrackStore::list_media`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaFilter {
    pub point_id: Option<PointId>,
    pub sort: MediaSort,
    pub order: SortOrder,
    /// Clamped to `1..=MAX_MEDIA_LIMIT`
    pub limit: usize,
    pub offset: usize,
}

impl Default for MediaFilter {
    fn default() -> Self {
        Self {
            point_id: None,
            sort: MediaSort::default(),
            order: SortOrder::default(),
            limit: DEFAULT_MEDIA_LIMIT,
            offset: 0,
        }
    }
}

/// Result of inserting a point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(PointId),
    /// A point with the same `(device_ts, lat, lng)` already exists
    Duplicate,
}

/// String key-value configuration storage.
pub trait ConfigStore: Send + Sync {
    /// Read a value. Returns Ok(None) when the key is missing.
    fn get_string(&self, key: &str) -> StoreResult<Option<String>>;

    /// Store a value, replacing any previous one.
    fn set_string(&self, key: &str, value: &str) -> StoreResult<()>;

    /// All stored pairs, sorted by key.
    fn entries(&self) -> StoreResult<Vec<(String, String)>>;
}

/// Point and media storage.
pub trait TrackStore: ConfigStore {
    /// Points with `device_ts < cutoff_ms`, ascending by `device_ts`.
    fn points_before(&self, cutoff_ms: i64) -> StoreResult<Vec<StoredPoint>>;

    /// Media bound to any of the given points, ascending by media id.
    fn media_for_points(&self, point_ids: &[PointId]) -> StoreResult<Vec<MediaRecord>>;

    /// Insert a fix, deduplicating on `(device_ts, lat, lng)`.
    fn insert_point(&self, point: TrackPoint, server_ts: i64) -> StoreResult<InsertOutcome>;

    /// Insert fixes in order, one outcome per input point.
    ///
    /// Backends should override this to commit the batch at once; on error none of the
    /// batch may be stored.
    fn insert_points(&self, points: &[TrackPoint], server_ts: i64) -> StoreResult<Vec<InsertOutcome>> {
        points
            .iter()
            .map(|point| self.insert_point(*point, server_ts))
            .collect()
    }

    fn point(&self, id: PointId) -> StoreResult<Option<StoredPoint>>;

    /// Most recent points first (by `device_ts`), at most `limit`.
    fn recent_points(&self, limit: usize) -> StoreResult<Vec<StoredPoint>>;

    /// Latest server receive time over all points.
    fn last_sync_server_ts(&self) -> StoreResult<Option<i64>>;

    /// Attach media to an existing point.
    fn insert_media(&self, media: NewMedia) -> StoreResult<MediaRecord>;

    fn media(&self, id: MediaId) -> StoreResult<Option<MediaRecord>>;

    /// One page of media, see [`MediaFilter`].
    fn list_media(&self, filter: &MediaFilter) -> StoreResult<Vec<MediaRecord>>;

    /// Number of media, optionally only those bound to `point_id`.
    fn count_media(&self, point_id: Option<PointId>) -> StoreResult<usize>;

    /// Apply a patch. Returns Ok(None) when no media had that id.
    fn update_media(&self, id: MediaId, patch: MediaPatch) -> StoreResult<Option<MediaRecord>>;

    /// Returns false when no media had that id.
    fn delete_media(&self, id: MediaId) -> StoreResult<bool>;
}

/// Dedup key of a fix; `-0.0` and `0.0` are the same coordinate
type FixKey = (i64, u64, u64);

fn fix_key(point: &TrackPoint) -> FixKey {
    (
        point.device_ts,
        (point.lat + 0.0).to_bits(),
        (point.lng + 0.0).to_bits(),
    )
}

fn trimmed_url(url: &str) -> StoreResult<String> {
    let url = url.trim();
    if url.is_empty() {
        return Err(StoreError::InvalidMedia("url must not be empty".to_string()));
    }
    Ok(url.to_string())
}

/// Backing data shared by the store implementations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct Snapshot {
    #[serde(default)]
    pub points: Vec<StoredPoint>,
    #[serde(default)]
    pub media: Vec<MediaRecord>,
    #[serde(default)]
    pub config: BTreeMap<String, String>,
    #[serde(skip)]
    fixes: HashSet<FixKey>,
    #[serde(skip)]
    last_point_id: PointId,
}

impl Snapshot {
    /// Parse a stored document and rebuild the lookup indexes
    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        let mut snapshot: Snapshot = serde_json::from_str(s)?;
        snapshot.rebuild_index();
        Ok(snapshot)
    }

    fn rebuild_index(&mut self) {
        self.fixes = self.points.iter().map(|p| fix_key(&p.point)).collect();
        self.last_point_id = self.points.iter().map(|p| p.id).max().unwrap_or(0);
    }

    pub fn points_before(&self, cutoff_ms: i64) -> Vec<StoredPoint> {
        let mut points: Vec<StoredPoint> = self
            .points
            .iter()
            .filter(|p| p.point.device_ts < cutoff_ms)
            .copied()
            .collect();
        points.sort_by_key(|p| (p.point.device_ts, p.id));
        points
    }

    pub fn media_for_points(&self, point_ids: &[PointId]) -> Vec<MediaRecord> {
        if point_ids.is_empty() {
            return Vec::new();
        }
        let wanted: HashSet<PointId> = point_ids.iter().copied().collect();
        let mut media: Vec<MediaRecord> = self
            .media
            .iter()
            .filter(|m| wanted.contains(&m.point_id))
            .cloned()
            .collect();
        media.sort_by_key(|m| m.id);
        media
    }

    pub fn insert_point(&mut self, point: TrackPoint, server_ts: i64) -> InsertOutcome {
        if !self.fixes.insert(fix_key(&point)) {
            return InsertOutcome::Duplicate;
        }
        self.last_point_id += 1;
        let id = self.last_point_id;
        self.points.push(StoredPoint {
            id,
            point,
            server_ts,
        });
        InsertOutcome::Inserted(id)
    }

    pub fn insert_points(&mut self, points: &[TrackPoint], server_ts: i64) -> Vec<InsertOutcome> {
        points
            .iter()
            .map(|point| self.insert_point(*point, server_ts))
            .collect()
    }

    pub fn point(&self, id: PointId) -> Option<StoredPoint> {
        self.points.iter().find(|p| p.id == id).copied()
    }

    pub fn recent_points(&self, limit: usize) -> Vec<StoredPoint> {
        let mut points = self.points.clone();
        points.sort_by_key(|p| std::cmp::Reverse((p.point.device_ts, p.id)));
        points.truncate(limit);
        points
    }

    pub fn last_sync_server_ts(&self) -> Option<i64> {
        self.points.iter().map(|p| p.server_ts).max()
    }

    fn require_point(&self, id: PointId) -> StoreResult<()> {
        match self.point(id) {
            Some(_) => Ok(()),
            None => Err(StoreError::UnknownPoint(id)),
        }
    }

    pub fn insert_media(&mut self, media: NewMedia) -> StoreResult<MediaRecord> {
        self.require_point(media.point_id)?;
        let url = trimmed_url(&media.url)?;
        let record = MediaRecord {
            id: self.media.iter().map(|m| m.id).max().unwrap_or(0) + 1,
            point_id: media.point_id,
            kind: MediaKind::infer(&url),
            url,
            title: media.title.trim().to_string(),
            description: media.description.trim().to_string(),
            created_at: media.created_at,
            taken_at: media.taken_at,
            taken_lat: media.taken_lat,
            taken_lng: media.taken_lng,
        };
        self.media.push(record.clone());
        Ok(record)
    }

    pub fn media(&self, id: MediaId) -> Option<MediaRecord> {
        self.media.iter().find(|m| m.id == id).cloned()
    }

    pub fn list_media(&self, filter: &MediaFilter) -> Vec<MediaRecord> {
        let mut media: Vec<&MediaRecord> = self
            .media
            .iter()
            .filter(|m| filter.point_id.is_none_or(|id| m.point_id == id))
            .collect();
        media.sort_by_key(|m| m.id);
        // Stable: equal keys stay in id order for both directions
        media.sort_by(|a, b| match filter.order {
            SortOrder::Asc => filter.sort.compare(a, b),
            SortOrder::Desc => filter.sort.compare(b, a),
        });
        media
            .into_iter()
            .skip(filter.offset)
            .take(filter.limit.clamp(1, MAX_MEDIA_LIMIT))
            .cloned()
            .collect()
    }

    pub fn count_media(&self, point_id: Option<PointId>) -> usize {
        self.media
            .iter()
            .filter(|m| point_id.is_none_or(|id| m.point_id == id))
            .count()
    }

    /// Validates the whole patch before touching the record
    pub fn update_media(&mut self, id: MediaId, patch: MediaPatch) -> StoreResult<Option<MediaRecord>> {
        if let Some(point_id) = patch.point_id {
            self.require_point(point_id)?;
        }
        let url = patch.url.as_deref().map(trimmed_url).transpose()?;

        let Some(record) = self.media.iter_mut().find(|m| m.id == id) else {
            return Ok(None);
        };
        if let Some(point_id) = patch.point_id {
            record.point_id = point_id;
        }
        if let Some(url) = url {
            record.kind = MediaKind::infer(&url);
            record.url = url;
        }
        if let Some(title) = patch.title {
            record.title = title.trim().to_string();
        }
        if let Some(description) = patch.description {
            record.description = description.trim().to_string();
        }
        if let Some(taken_at) = patch.taken_at {
            record.taken_at = taken_at;
        }
        if let Some(taken_lat) = patch.taken_lat {
            record.taken_lat = taken_lat;
        }
        if let Some(taken_lng) = patch.taken_lng {
            record.taken_lng = taken_lng;
        }
        Ok(Some(record.clone()))
    }

    pub fn delete_media(&mut self, id: MediaId) -> bool {
        let before = self.media.len();
        self.media.retain(|m| m.id != id);
        self.media.len() != before
    }

    pub fn entries(&self) -> Vec<(String, String)> {
        self.config
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}
