//! Track Replay Library - Simplification and Replay Pipeline for Shared Locations
//!
//! A device reports timestamped GPS fixes, a store keeps them, and a public map replays
//! the route after a configurable publication delay. This library owns the part of that
//! system with real algorithmic content: turning a large raw track into a bounded polyline
//! and keeping photo/video markers attached to the right positions of that polyline.
//!
//! # Architecture
//!
//! - **[`geometry`]**: Point-to-segment distance in raw degree space
//! - **[`simplify`]**: Douglas-Peucker over an explicit work-stack
//! - **[`downsample`]**: Epsilon search that fits a track into a point budget
//! - **[`reindex`]**: Original-index to simplified-index translation for media anchors
//! - **[`TrackAssembler`]**: Delay filtering, downsampling and payload shaping over a [`TrackStore`]
//!
//! Surrounding plumbing (storage, ingestion validation, configuration rules, GPX import)
//! lives in [`store`], [`ingest`], [`config`] and [`gpx_import`].
//!
//! # Performance Characteristics
//!
//! - **Simplify**: O(N log N) typical, O(N²) worst case, O(N) memory
//! - **Downsample**: O(log(C/S)) simplification passes with the default bisecting search
//! - **Re-index**: O(N + M) for N points and M media anchors

mod assembly;
pub mod config;
pub mod downsample;
pub mod geometry;
pub mod gpx_import;
pub mod ingest;
mod point;
pub mod reindex;
pub mod simplify;
pub mod store;

// Public API exports
pub use assembly::{MediaEntry, TrackAssembler, TrackResponse, TrackView};
pub use config::{ServiceConfig, SharingSettings, SharingUpdate};
pub use downsample::{DownsampleConfig, SearchStrategy, downsample, downsample_indices};
pub use geometry::perpendicular_distance;
pub use ingest::IngestReport;
pub use point::{MediaAnchor, MediaKind, SegmentType, TrackPoint};
pub use reindex::{IndexMap, reindex_media};
pub use simplify::{simplify, simplify_indices};
pub use store::{
    ConfigStore, InsertOutcome, JsonFileStore, MediaFilter, MediaId, MediaPatch, MediaRecord,
    MediaSort, MemoryStore, NewMedia, PointId, SortOrder, StoreError, StoredPoint, TrackStore,
};

/// Error types for the track pipeline
#[derive(Debug, thiserror::Error)]
pub enum TrackError {
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("GPX parsing error: {0}")]
    GpxParse(#[from] gpx::errors::GpxError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, TrackError>;
