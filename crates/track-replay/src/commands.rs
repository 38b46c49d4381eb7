//! Execution of the parsed command line against a [`JsonFileStore`].

use crate::settings::{Command, ConfigCommand, MediaCommand, Settings, TrackArgs};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use track_replay_lib::config::render_device_config;
use track_replay_lib::gpx_import::read_points;
use track_replay_lib::ingest::{ingest_batch, ingest_points};
use track_replay_lib::{
    JsonFileStore, MediaFilter, MediaRecord, NewMedia, ServiceConfig, SharingSettings,
    StoreError, TrackAssembler, TrackError, TrackStore, TrackView,
};

/// Largest page of the `points` listing
pub const MAX_POINTS_LIMIT: usize = 500;

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Track(#[from] TrackError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Media {0} not found")]
    UnknownMedia(u64),
}

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Serialize)]
struct Status {
    last_sync_server_ts: Option<i64>,
}

/// A media item joined with the point it is attached to
#[derive(Debug, Serialize)]
struct MediaListing {
    #[serde(flatten)]
    record: MediaRecord,
    point_device_ts: Option<i64>,
    point_lat: Option<f64>,
    point_lng: Option<f64>,
}

#[derive(Debug, Serialize)]
struct MediaPage {
    total: usize,
    media: Vec<MediaListing>,
}

/// Current time in epoch milliseconds
fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

async fn read_file(path: &Path) -> CliResult<Vec<u8>> {
    tokio::fs::read(path).await.map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Run store work off the async threads
async fn blocking<T, F>(store: &Arc<JsonFileStore>, f: F) -> CliResult<T>
where
    T: Send + 'static,
    F: FnOnce(&JsonFileStore) -> CliResult<T> + Send + 'static,
{
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || f(&store)).await?
}

fn print_json<T: Serialize>(value: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Execute one command and print its output to stdout
pub async fn run(settings: Settings) -> CliResult<()> {
    let path = settings.store.clone();
    let store = tokio::task::spawn_blocking(move || JsonFileStore::open(path)).await??;
    let store = Arc::new(store);
    tracing::debug!("Opened store {}", store.path().display());

    match settings.command {
        Command::Track(args) => {
            let (assembler, view, now) = track_request(&args, ServiceConfig::from_env())?;
            let response =
                blocking(&store, move |s| Ok(assembler.assemble(s, view, now)?)).await?;
            print_json(&response)
        }
        Command::Ingest { file } => {
            let bytes = read_file(&file).await?;
            let body: serde_json::Value = serde_json::from_slice(&bytes)?;
            let server_ts = now_ms();
            let report = blocking(&store, move |s| Ok(ingest_batch(s, &body, server_ts))).await?;
            print_json(&report)
        }
        Command::ImportGpx { file, segment_type } => {
            let bytes = read_file(&file).await?;
            let server_ts = now_ms();
            let report = blocking(&store, move |s| {
                let points = read_points(bytes.as_slice(), segment_type)?;
                tracing::info!(
                    "Importing {} GPX points as {}",
                    points.len(),
                    segment_type.as_str()
                );
                Ok(ingest_points(s, &points, server_ts))
            })
            .await?;
            print_json(&report)
        }
        Command::Config(command) => {
            let settings = blocking(&store, move |s| match command.update() {
                Some(update) => Ok(update.apply(s)?),
                None => Ok(SharingSettings::load(s)?),
            })
            .await?;
            print_json(&settings)
        }
        Command::DeviceConfig => {
            let text = blocking(&store, |s| Ok(render_device_config(s)?)).await?;
            println!("{text}");
            Ok(())
        }
        Command::Status => {
            let last_sync_server_ts = blocking(&store, |s| Ok(s.last_sync_server_ts()?)).await?;
            print_json(&Status {
                last_sync_server_ts,
            })
        }
        Command::Points { limit } => {
            let limit = limit.clamp(1, MAX_POINTS_LIMIT);
            let points = blocking(&store, move |s| Ok(s.recent_points(limit)?)).await?;
            print_json(&points)
        }
        Command::Media(MediaCommand::Add {
            point_id,
            url,
            title,
            description,
            taken_at,
            taken_lat,
            taken_lng,
        }) => {
            let media = NewMedia {
                point_id,
                url,
                title,
                description,
                created_at: now_ms() / 1000,
                taken_at,
                taken_lat,
                taken_lng,
            };
            let record = blocking(&store, move |s| Ok(s.insert_media(media)?)).await?;
            print_json(&record)
        }
        Command::Media(MediaCommand::Ls(args)) => {
            let filter = args.filter();
            let page = blocking(&store, move |s| list_media(s, &filter)).await?;
            print_json(&page)
        }
        Command::Media(MediaCommand::Show { id }) => {
            match blocking(&store, move |s| Ok(s.media(id)?)).await? {
                Some(record) => print_json(&record),
                None => Err(CliError::UnknownMedia(id)),
            }
        }
        Command::Media(MediaCommand::Set(args)) => {
            let (id, patch) = (args.id, args.patch());
            match blocking(&store, move |s| Ok(s.update_media(id, patch)?)).await? {
                Some(record) => print_json(&record),
                None => Err(CliError::UnknownMedia(id)),
            }
        }
        Command::Media(MediaCommand::Rm { id }) => {
            if blocking(&store, move |s| Ok(s.delete_media(id)?)).await? {
                tracing::info!("Deleted media {}", id);
                Ok(())
            } else {
                Err(CliError::UnknownMedia(id))
            }
        }
    }
}

/// One page of media with the position of each item's point, plus the unpaged total
fn list_media<S: TrackStore + ?Sized>(store: &S, filter: &MediaFilter) -> CliResult<MediaPage> {
    let total = store.count_media(filter.point_id)?;
    let media = store
        .list_media(filter)?
        .into_iter()
        .map(|record| -> CliResult<MediaListing> {
            let point = store.point(record.point_id)?;
            Ok(MediaListing {
                point_device_ts: point.map(|p| p.point.device_ts),
                point_lat: point.map(|p| p.point.lat),
                point_lng: point.map(|p| p.point.lng),
                record,
            })
        })
        .collect::<CliResult<Vec<_>>>()?;
    Ok(MediaPage { total, media })
}

/// Resolve the assembler, view and evaluation time of a `track` request
fn track_request(
    args: &TrackArgs,
    mut service: ServiceConfig,
) -> CliResult<(TrackAssembler, TrackView, i64)> {
    if let Some(max_points) = args.max_points {
        if max_points < 2 {
            return Err(CliError::InvalidArgument(format!(
                "--max-points must be at least 2, got {max_points}"
            )));
        }
        service.max_points = max_points;
    }

    let view = if args.family {
        TrackView::Family {
            delay_hours: service.family_delay_hours,
        }
    } else {
        TrackView::Public
    };
    let now = args.now.unwrap_or_else(now_ms);
    Ok((TrackAssembler::from_service_config(&service), view, now))
}
