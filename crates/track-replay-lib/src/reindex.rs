//! Translation of media anchors from original-track indices to simplified-track indices
//!
//! The preferred path carries the original index through simplification
//! ([`crate::downsample_indices`] returns it), so the mapping is exact even when two fixes
//! share coordinates and timestamp. [`IndexMap::from_values`] rebuilds the mapping from
//! point values alone for callers that only hold the simplified points; it matches each
//! simplified point to its first exact `(lat, lng, device_ts)` occurrence in the original
//! track and is therefore ambiguous on duplicate fixes.

use crate::{MediaAnchor, TrackPoint};

/// Reverse lookup from original-track index to simplified-track index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexMap {
    /// `slots[original] = Some(simplified)` for every surviving original point
    slots: Vec<Option<usize>>,
}

impl IndexMap {
    /// Build the map from the kept original indices, in simplified order
    ///
    /// Indices at or beyond `original_len` are ignored.
    pub fn from_kept(kept: &[usize], original_len: usize) -> Self {
        let mut slots = vec![None; original_len];
        for (simplified, &original) in kept.iter().enumerate() {
            if let Some(slot) = slots.get_mut(original) {
                *slot = Some(simplified);
            }
        }
        Self { slots }
    }

    /// Build the map by matching simplified points back to the original track by value
    ///
    /// Simplified points with no exact match in `original` are skipped.
    pub fn from_values(original: &[TrackPoint], simplified: &[TrackPoint]) -> Self {
        let mut slots = vec![None; original.len()];
        let mut unmatched = 0usize;
        for (simplified_index, point) in simplified.iter().enumerate() {
            match original.iter().position(|candidate| candidate.same_fix(point)) {
                Some(original_index) => slots[original_index] = Some(simplified_index),
                None => unmatched += 1,
            }
        }
        if unmatched > 0 {
            tracing::warn!("{unmatched} simplified points have no exact match in the original track");
        }
        Self { slots }
    }

    /// Simplified index of an original index, if that point survived
    #[inline]
    pub fn get(&self, original: usize) -> Option<usize> {
        self.slots.get(original).copied().flatten()
    }

    /// Number of original points that survived
    pub fn surviving(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}

/// Rewrite anchors onto the simplified track, dropping those whose point did not survive
///
/// Anchor order is preserved. Several anchors on one point all map to the same index.
pub fn reindex_media(anchors: &[MediaAnchor], map: &IndexMap) -> Vec<MediaAnchor> {
    anchors
        .iter()
        .filter_map(|anchor| {
            map.get(anchor.point_index).map(|point_index| MediaAnchor {
                point_index,
                ..anchor.clone()
            })
        })
        .collect()
}
