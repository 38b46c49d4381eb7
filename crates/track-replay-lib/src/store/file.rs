//! JSON snapshot file store

use super::{
    ConfigStore, InsertOutcome, MediaFilter, MediaId, MediaPatch, MediaRecord, NewMedia, PointId,
    Snapshot, StoreError, StoreResult, StoredPoint, TrackStore,
};
use crate::TrackPoint;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// File-based store: a single JSON document holding points, media and configuration.
///
/// Implementation notes:
/// - On open, the file is read into memory. A missing or blank file starts empty.
/// - Mutations run against a copy of the document, flush it to disk synchronously, and
///   replace the in-memory copy only when the write succeeded.
#[derive(Debug)]
pub struct JsonFileStore {
    /// Path to the backing JSON file.
    path: PathBuf,
    /// In-memory copy of the document
    inner: Mutex<Snapshot>,
}

impl JsonFileStore {
    /// Open (or lazily create) the store at `path`.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();

        let snapshot = if path.exists() {
            let s = fs::read_to_string(&path)?;
            if s.trim().is_empty() {
                Snapshot::default()
            } else {
                Snapshot::from_json(&s)?
            }
        } else {
            Snapshot::default()
        };

        tracing::debug!(
            "Opened store {} ({} points, {} media)",
            path.display(),
            snapshot.points.len(),
            snapshot.media.len()
        );

        Ok(Self {
            path,
            inner: Mutex::new(snapshot),
        })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Snapshot>> {
        self.inner
            .lock()
            .map_err(|e| StoreError::Poisoned(format!("{:?}", e)))
    }

    /// Run `mutate` on a copy of the document and commit it when it reports a change
    ///
    /// Nothing changes in memory if `mutate` or the flush fails.
    fn transact<T>(
        &self,
        mutate: impl FnOnce(&mut Snapshot) -> StoreResult<(T, bool)>,
    ) -> StoreResult<T> {
        let mut guard = self.lock()?;
        let mut next = guard.clone();
        let (value, changed) = mutate(&mut next)?;
        if changed {
            self.flush_locked(&next)?;
            *guard = next;
        }
        Ok(value)
    }

    fn flush_locked(&self, locked: &Snapshot) -> StoreResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let s = serde_json::to_string_pretty(locked)?;
        fs::write(&self.path, s)?;
        Ok(())
    }
}

impl ConfigStore for JsonFileStore {
    fn get_string(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.lock()?.config.get(key).cloned())
    }

    fn set_string(&self, key: &str, value: &str) -> StoreResult<()> {
        self.transact(|snapshot| {
            snapshot.config.insert(key.to_string(), value.to_string());
            Ok(((), true))
        })
    }

    fn entries(&self) -> StoreResult<Vec<(String, String)>> {
        Ok(self.lock()?.entries())
    }
}

impl TrackStore for JsonFileStore {
    fn points_before(&self, cutoff_ms: i64) -> StoreResult<Vec<StoredPoint>> {
        Ok(self.lock()?.points_before(cutoff_ms))
    }

    fn media_for_points(&self, point_ids: &[PointId]) -> StoreResult<Vec<MediaRecord>> {
        Ok(self.lock()?.media_for_points(point_ids))
    }

    fn insert_point(&self, point: TrackPoint, server_ts: i64) -> StoreResult<InsertOutcome> {
        self.transact(|snapshot| {
            let outcome = snapshot.insert_point(point, server_ts);
            Ok((outcome, matches!(outcome, InsertOutcome::Inserted(_))))
        })
    }

    /// One flush for the whole batch
    fn insert_points(&self, points: &[TrackPoint], server_ts: i64) -> StoreResult<Vec<InsertOutcome>> {
        self.transact(|snapshot| {
            let outcomes = snapshot.insert_points(points, server_ts);
            let changed = outcomes
                .iter()
                .any(|o| matches!(o, InsertOutcome::Inserted(_)));
            Ok((outcomes, changed))
        })
    }

    fn point(&self, id: PointId) -> StoreResult<Option<StoredPoint>> {
        Ok(self.lock()?.point(id))
    }

    fn recent_points(&self, limit: usize) -> StoreResult<Vec<StoredPoint>> {
        Ok(self.lock()?.recent_points(limit))
    }

    fn last_sync_server_ts(&self) -> StoreResult<Option<i64>> {
        Ok(self.lock()?.last_sync_server_ts())
    }

    fn insert_media(&self, media: NewMedia) -> StoreResult<MediaRecord> {
        self.transact(|snapshot| Ok((snapshot.insert_media(media)?, true)))
    }

    fn media(&self, id: MediaId) -> StoreResult<Option<MediaRecord>> {
        Ok(self.lock()?.media(id))
    }

    fn list_media(&self, filter: &MediaFilter) -> StoreResult<Vec<MediaRecord>> {
        Ok(self.lock()?.list_media(filter))
    }

    fn count_media(&self, point_id: Option<PointId>) -> StoreResult<usize> {
        Ok(self.lock()?.count_media(point_id))
    }

    fn update_media(&self, id: MediaId, patch: MediaPatch) -> StoreResult<Option<MediaRecord>> {
        self.transact(|snapshot| {
            let record = snapshot.update_media(id, patch)?;
            let changed = record.is_some();
            Ok((record, changed))
        })
    }

    fn delete_media(&self, id: MediaId) -> StoreResult<bool> {
        self.transact(|snapshot| {
            let removed = snapshot.delete_media(id);
            Ok((removed, removed))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("track-replay-test-{}", std::process::id()))
            .join(name)
    }

    #[test]
    fn test_missing_file_starts_empty() {
        let path = temp_path("missing.json");
        let _ = fs::remove_file(&path);
        let store = JsonFileStore::open(&path).unwrap();
        assert!(store.points_before(i64::MAX).unwrap().is_empty());
        assert_eq!(store.last_sync_server_ts().unwrap(), None);
    }

    #[test]
    fn test_mutations_persist_across_reopen() {
        let path = temp_path("persist.json");
        let _ = fs::remove_file(&path);
        {
            let store = JsonFileStore::open(&path).unwrap();
            store.set_string("sharing_enabled", "1").unwrap();
            store
                .insert_point(TrackPoint::new(45.0, 9.0, 10), 20)
                .unwrap();
            store
                .insert_media(NewMedia {
                    point_id: 1,
                    url: "a.jpg".into(),
                    ..NewMedia::default()
                })
                .unwrap();
        }

        let store = JsonFileStore::open(&path).unwrap();
        assert_eq!(store.get_string("sharing_enabled").unwrap().as_deref(), Some("1"));
        assert_eq!(store.points_before(11).unwrap().len(), 1);
        assert_eq!(store.media_for_points(&[1]).unwrap().len(), 1);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_failed_write_leaves_memory_untouched() {
        // A regular file where the parent directory should be makes every flush fail
        let blocker = temp_path("blocker");
        fs::create_dir_all(blocker.parent().unwrap()).unwrap();
        fs::write(&blocker, "").unwrap();
        let store = JsonFileStore::open(blocker.join("store.json")).unwrap();
        let point = TrackPoint::new(45.0, 9.0, 10);

        assert!(matches!(store.insert_point(point, 1), Err(StoreError::Io(_))));
        assert!(matches!(store.insert_point(point, 2), Err(StoreError::Io(_))));
        assert!(store.insert_points(&[point], 3).is_err());
        assert!(store.points_before(i64::MAX).unwrap().is_empty());
        assert_eq!(store.last_sync_server_ts().unwrap(), None);

        assert!(store.set_string("sharing_enabled", "1").is_err());
        assert_eq!(store.get_string("sharing_enabled").unwrap(), None);
        let _ = fs::remove_file(&blocker);
    }

    #[test]
    fn test_batch_insert_persists_and_dedups_after_reopen() {
        let path = temp_path("batch.json");
        let _ = fs::remove_file(&path);
        let points: Vec<TrackPoint> = (1..=50)
            .map(|i| TrackPoint::new(45.0, 9.0 + i as f64 * 0.001, i))
            .collect();
        {
            let store = JsonFileStore::open(&path).unwrap();
            let outcomes = store.insert_points(&points, 7).unwrap();
            assert!(outcomes.iter().all(|o| matches!(o, InsertOutcome::Inserted(_))));
        }

        let store = JsonFileStore::open(&path).unwrap();
        assert_eq!(store.points_before(i64::MAX).unwrap().len(), 50);
        let outcomes = store.insert_points(&points[..2], 8).unwrap();
        assert_eq!(outcomes, vec![InsertOutcome::Duplicate, InsertOutcome::Duplicate]);
        assert_eq!(store.last_sync_server_ts().unwrap(), Some(7));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_media_update_persists() {
        let path = temp_path("media-update.json");
        let _ = fs::remove_file(&path);
        {
            let store = JsonFileStore::open(&path).unwrap();
            store.insert_points(&[TrackPoint::new(1.0, 1.0, 1), TrackPoint::new(2.0, 2.0, 2)], 0)
                .unwrap();
            let record = store
                .insert_media(NewMedia {
                    point_id: 1,
                    url: "a.jpg".into(),
                    ..NewMedia::default()
                })
                .unwrap();
            let patch = MediaPatch {
                point_id: Some(2),
                ..MediaPatch::default()
            };
            assert!(store.update_media(record.id, patch).unwrap().is_some());
            assert!(store.update_media(99, MediaPatch::default()).unwrap().is_none());
        }

        let store = JsonFileStore::open(&path).unwrap();
        assert_eq!(store.media(1).unwrap().map(|m| m.point_id), Some(2));
        assert_eq!(store.count_media(Some(2)).unwrap(), 1);
        assert_eq!(store.list_media(&MediaFilter::default()).unwrap().len(), 1);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let path = temp_path("corrupt.json");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(JsonFileStore::open(&path), Err(StoreError::Json(_))));
        let _ = fs::remove_file(&path);
    }
}
