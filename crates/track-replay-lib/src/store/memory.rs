//! In-memory store

use super::{
    ConfigStore, InsertOutcome, MediaFilter, MediaId, MediaPatch, MediaRecord, NewMedia, PointId,
    Snapshot, StoreError, StoreResult, StoredPoint, TrackStore,
};
use crate::TrackPoint;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Store keeping all points, media and configuration in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Snapshot>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Snapshot>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Poisoned(format!("{:?}", e)))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Snapshot>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Poisoned(format!("{:?}", e)))
    }
}

impl ConfigStore for MemoryStore {
    fn get_string(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.read()?.config.get(key).cloned())
    }

    fn set_string(&self, key: &str, value: &str) -> StoreResult<()> {
        self.write()?
            .config
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn entries(&self) -> StoreResult<Vec<(String, String)>> {
        Ok(self.read()?.entries())
    }
}

impl TrackStore for MemoryStore {
    fn points_before(&self, cutoff_ms: i64) -> StoreResult<Vec<StoredPoint>> {
        Ok(self.read()?.points_before(cutoff_ms))
    }

    fn media_for_points(&self, point_ids: &[PointId]) -> StoreResult<Vec<MediaRecord>> {
        Ok(self.read()?.media_for_points(point_ids))
    }

    fn insert_point(&self, point: TrackPoint, server_ts: i64) -> StoreResult<InsertOutcome> {
        Ok(self.write()?.insert_point(point, server_ts))
    }

    fn insert_points(&self, points: &[TrackPoint], server_ts: i64) -> StoreResult<Vec<InsertOutcome>> {
        Ok(self.write()?.insert_points(points, server_ts))
    }

    fn point(&self, id: PointId) -> StoreResult<Option<StoredPoint>> {
        Ok(self.read()?.point(id))
    }

    fn recent_points(&self, limit: usize) -> StoreResult<Vec<StoredPoint>> {
        Ok(self.read()?.recent_points(limit))
    }

    fn last_sync_server_ts(&self) -> StoreResult<Option<i64>> {
        Ok(self.read()?.last_sync_server_ts())
    }

    fn insert_media(&self, media: NewMedia) -> StoreResult<MediaRecord> {
        self.write()?.insert_media(media)
    }

    fn media(&self, id: MediaId) -> StoreResult<Option<MediaRecord>> {
        Ok(self.read()?.media(id))
    }

    fn list_media(&self, filter: &MediaFilter) -> StoreResult<Vec<MediaRecord>> {
        Ok(self.read()?.list_media(filter))
    }

    fn count_media(&self, point_id: Option<PointId>) -> StoreResult<usize> {
        Ok(self.read()?.count_media(point_id))
    }

    fn update_media(&self, id: MediaId, patch: MediaPatch) -> StoreResult<Option<MediaRecord>> {
        self.write()?.update_media(id, patch)
    }

    fn delete_media(&self, id: MediaId) -> StoreResult<bool> {
        Ok(self.write()?.delete_media(id))
    }
}
