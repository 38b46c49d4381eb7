//! Public track payload assembly
//!
//! Loads the points old enough to publish, downsamples them, and moves the media attached
//! to surviving points onto their new positions. The original index of every point is
//! carried through downsampling, so media never has to be matched back by value.

use crate::config::{ServiceConfig, SharingSettings};
use crate::reindex::{IndexMap, reindex_media};
use crate::store::{MediaRecord, PointId, TrackStore};
use crate::{DownsampleConfig, MediaAnchor, MediaKind, Result, TrackPoint, downsample_indices};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const MS_PER_HOUR: i64 = 60 * 60 * 1000;

/// Which audience a track is assembled for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackView {
    /// Anonymous map, delayed by the stored `public_delay_hours`
    Public,
    /// Trusted viewers, delayed by a fixed process-level amount
    Family { delay_hours: i64 },
}

/// A media item of the response, positioned on the response's own `points`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaEntry {
    #[serde(rename = "pointIndex")]
    pub point_index: usize,
    #[serde(rename = "type")]
    pub kind: MediaKind,
    pub url: String,
    pub title: String,
    pub description: String,
}

impl From<MediaAnchor> for MediaEntry {
    fn from(anchor: MediaAnchor) -> Self {
        Self {
            point_index: anchor.point_index,
            kind: anchor.kind,
            url: anchor.url,
            title: anchor.title,
            description: anchor.description,
        }
    }
}

/// Payload served to the replay map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackResponse {
    /// Simplified track, ascending by `device_ts`
    pub points: Vec<TrackPoint>,
    pub media: Vec<MediaEntry>,
    pub delay_hours: i64,
}

impl TrackResponse {
    /// Successful response with nothing to show
    pub fn empty(delay_hours: i64) -> Self {
        Self {
            points: Vec::new(),
            media: Vec::new(),
            delay_hours,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty() && self.media.is_empty()
    }
}

/// Builds [`TrackResponse`]s from a store
#[derive(Debug, Clone, Default)]
pub struct TrackAssembler {
    downsample: DownsampleConfig,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl TrackAssembler {
    pub fn new(downsample: DownsampleConfig) -> Self {
        Self { downsample }
    }

    pub fn from_service_config(config: &ServiceConfig) -> Self {
        Self::new(DownsampleConfig::with_max_points(config.max_points))
    }

    pub fn downsample_config(&self) -> &DownsampleConfig {
        &self.downsample
    }

    /// Downsample `points` and move `anchors` (indexed into `points`) onto the result
    ///
    /// Anchors whose point was dropped are omitted. Surviving anchors are ordered by their
    /// new index, keeping input order among anchors of the same point.
    pub fn simplify_with_media(
        &self,
        points: &[TrackPoint],
        anchors: &[MediaAnchor],
    ) -> (Vec<TrackPoint>, Vec<MediaAnchor>) {
        let kept = downsample_indices(points, &self.downsample);
        let map = IndexMap::from_kept(&kept, points.len());
        let mut media = reindex_media(anchors, &map);
        media.sort_by_key(|anchor| anchor.point_index);

        let simplified = kept.into_iter().map(|i| points[i]).collect();
        (simplified, media)
    }

    /// Assemble the payload for `view` as of `now_ms`
    ///
    /// Sharing disabled or nothing old enough to publish are both successful, empty
    /// responses; only storage failures are errors.
    pub fn assemble<S: TrackStore + ?Sized>(
        &self,
        store: &S,
        view: TrackView,
        now_ms: i64,
    ) -> Result<TrackResponse> {
        let settings = SharingSettings::load(store)?;
        let delay_hours = match view {
            TrackView::Public => settings.delay_hours,
            TrackView::Family { delay_hours } => delay_hours,
        };

        if !settings.sharing_enabled {
            tracing::debug!("Sharing disabled, serving empty {:?} track", view);
            return Ok(TrackResponse::empty(delay_hours));
        }

        let cutoff = now_ms.saturating_sub(delay_hours.saturating_mul(MS_PER_HOUR));
        let stored = store.points_before(cutoff)?;
        if stored.is_empty() {
            return Ok(TrackResponse::empty(delay_hours));
        }

        let points: Vec<TrackPoint> = stored.iter().map(|s| s.point).collect();
        let kept = downsample_indices(&points, &self.downsample);
        let kept_ids: Vec<PointId> = kept.iter().map(|&i| stored[i].id).collect();

        let original_index: HashMap<PointId, usize> = stored
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id, i))
            .collect();
        let anchors: Vec<MediaAnchor> = store
            .media_for_points(&kept_ids)?
            .into_iter()
            .filter_map(|record| {
                let index = original_index.get(&record.point_id).copied();
                index.map(|i| anchor_from_record(record, i))
            })
            .collect();

        let map = IndexMap::from_kept(&kept, points.len());
        let mut media = reindex_media(&anchors, &map);
        media.sort_by_key(|anchor| anchor.point_index);

        tracing::info!(
            "Assembled {:?} track: {} of {} points, {} media, cutoff {}",
            view,
            kept.len(),
            points.len(),
            media.len(),
            cutoff
        );

        Ok(TrackResponse {
            points: kept.into_iter().map(|i| points[i]).collect(),
            media: media.into_iter().map(MediaEntry::from).collect(),
            delay_hours,
        })
    }
}

fn anchor_from_record(record: MediaRecord, point_index: usize) -> MediaAnchor {
    MediaAnchor {
        point_index,
        kind: record.kind,
        url: record.url,
        title: record.title,
        description: record.description,
    }
}
