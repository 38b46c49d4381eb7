use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use track_replay_lib::{MediaFilter, MediaPatch, MediaSort, SegmentType, SharingUpdate, SortOrder};

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
/// Track Replay - Delayed location sharing with simplified route replay
pub struct Settings {
    /// JSON snapshot file holding points, media and configuration
    #[clap(short, long, value_name = "FILE", default_value = "track-replay.json")]
    pub store: PathBuf,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print the track payload served to the replay map
    Track(TrackArgs),

    /// Ingest a JSON batch of device points (`{"points": [...]}` or a bare array)
    Ingest {
        #[clap(value_name = "FILE")]
        file: PathBuf,
    },

    /// Ingest every timestamped waypoint of a GPX file
    ImportGpx {
        #[clap(value_name = "FILE")]
        file: PathBuf,

        /// Transportation mode assigned to the imported points (ground, plane or boat)
        #[clap(long, default_value = "ground")]
        segment_type: SegmentType,
    },

    /// Show or change the sharing configuration
    #[clap(subcommand)]
    Config(ConfigCommand),

    /// Print the plain-text configuration pulled by the device
    DeviceConfig,

    /// Print the time of the last point upload
    Status,

    /// List the most recent points
    Points {
        /// Number of points (1-500)
        #[clap(long, default_value = "200")]
        limit: usize,
    },

    /// Manage media attached to points
    #[clap(subcommand)]
    Media(MediaCommand),
}

#[derive(Args, Debug, Clone)]
pub struct TrackArgs {
    /// Use the family view (fixed delay from FAMILY_DELAY_HOURS) instead of the public one
    #[clap(long, default_value = "false")]
    pub family: bool,

    /// Evaluate the publication delay as of this epoch-millisecond time instead of now
    #[clap(long, value_name = "MS")]
    pub now: Option<i64>,

    /// Point budget of the simplified track (overrides TRACK_MAX_POINTS)
    #[clap(long)]
    pub max_points: Option<usize>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommand {
    /// Print the current settings as JSON
    Show,
    /// Update the publication delay and/or the sharing switch
    Set {
        /// Publication delay in hours (rounded, capped at 168)
        #[clap(long)]
        delay_hours: Option<f64>,

        /// Turn public sharing on or off
        #[clap(long, value_enum)]
        sharing: Option<Switch>,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum MediaCommand {
    /// Attach a photo or video URL to a point
    Add {
        #[clap(long)]
        point_id: u64,
        #[clap(long)]
        url: String,
        #[clap(long, default_value = "")]
        title: String,
        #[clap(long, default_value = "")]
        description: String,
        /// Capture time, epoch seconds
        #[clap(long)]
        taken_at: Option<i64>,
        #[clap(long, allow_hyphen_values = true)]
        taken_lat: Option<f64>,
        #[clap(long, allow_hyphen_values = true)]
        taken_lng: Option<f64>,
    },
    /// List media with their points, newest first by default
    Ls(MediaListArgs),
    /// Print one media item
    Show { id: u64 },
    /// Change fields of a media item or move it to another point
    Set(MediaSetArgs),
    /// Remove a media item
    Rm { id: u64 },
}

#[derive(Args, Debug, Clone)]
pub struct MediaListArgs {
    /// Only media attached to this point
    #[clap(long)]
    pub point_id: Option<u64>,

    /// Sort column: id, created_at, taken_at or title
    #[clap(long, default_value = "created_at")]
    pub sort: MediaSort,

    /// asc or desc
    #[clap(long, default_value = "desc")]
    pub order: SortOrder,

    /// Page size (1-100)
    #[clap(long, default_value = "25")]
    pub limit: usize,

    #[clap(long, default_value = "0")]
    pub offset: usize,
}

impl MediaListArgs {
    pub fn filter(&self) -> MediaFilter {
        MediaFilter {
            point_id: self.point_id,
            sort: self.sort,
            order: self.order,
            limit: self.limit,
            offset: self.offset,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct MediaSetArgs {
    pub id: u64,

    /// Move the media to another existing point
    #[clap(long)]
    pub point_id: Option<u64>,
    #[clap(long)]
    pub url: Option<String>,
    #[clap(long)]
    pub title: Option<String>,
    #[clap(long)]
    pub description: Option<String>,

    /// Capture time, epoch seconds
    #[clap(long)]
    pub taken_at: Option<i64>,
    #[clap(long, allow_hyphen_values = true)]
    pub taken_lat: Option<f64>,
    #[clap(long, allow_hyphen_values = true)]
    pub taken_lng: Option<f64>,

    /// Forget the capture time and position
    #[clap(long, default_value = "false", conflicts_with_all = ["taken_at", "taken_lat", "taken_lng"])]
    pub clear_taken: bool,
}

impl MediaSetArgs {
    pub fn patch(&self) -> MediaPatch {
        MediaPatch {
            point_id: self.point_id,
            url: self.url.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            taken_at: taken_update(self.clear_taken, self.taken_at),
            taken_lat: taken_update(self.clear_taken, self.taken_lat),
            taken_lng: taken_update(self.clear_taken, self.taken_lng),
        }
    }
}

fn taken_update<T>(clear: bool, value: Option<T>) -> Option<Option<T>> {
    if clear { Some(None) } else { value.map(Some) }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Switch {
    On,
    Off,
}

impl ConfigCommand {
    /// The stored-configuration update described by `config set`
    pub fn update(&self) -> Option<SharingUpdate> {
        match self {
            ConfigCommand::Show => None,
            ConfigCommand::Set {
                delay_hours,
                sharing,
            } => Some(SharingUpdate {
                delay_hours: *delay_hours,
                sharing_enabled: sharing.map(|s| s == Switch::On),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_track_command() {
        let settings =
            Settings::try_parse_from(["track-replay", "--store", "x.json", "track", "--family"])
                .unwrap();
        assert_eq!(settings.store, PathBuf::from("x.json"));
        let Command::Track(args) = settings.command else {
            panic!("expected track command");
        };
        assert!(args.family);
        assert_eq!(args.now, None);
    }

    #[test]
    fn test_config_set_builds_update() {
        let settings = Settings::try_parse_from([
            "track-replay",
            "config",
            "set",
            "--delay-hours",
            "12",
            "--sharing",
            "on",
        ])
        .unwrap();
        let Command::Config(config) = settings.command else {
            panic!("expected config command");
        };
        assert_eq!(
            config.update(),
            Some(SharingUpdate {
                delay_hours: Some(12.0),
                sharing_enabled: Some(true),
            })
        );
        assert_eq!(ConfigCommand::Show.update(), None);
    }

    #[test]
    fn test_import_gpx_segment_type() {
        let settings = Settings::try_parse_from([
            "track-replay",
            "import-gpx",
            "ride.gpx",
            "--segment-type",
            "boat",
        ])
        .unwrap();
        let Command::ImportGpx { segment_type, .. } = settings.command else {
            panic!("expected import-gpx command");
        };
        assert_eq!(segment_type, SegmentType::Boat);

        let result =
            Settings::try_parse_from(["track-replay", "import-gpx", "x.gpx", "--segment-type", "car"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_media_ls_filter() {
        let settings = Settings::try_parse_from([
            "track-replay", "media", "ls", "--point-id", "3", "--sort", "taken_at", "--order", "asc",
        ])
        .unwrap();
        let Command::Media(MediaCommand::Ls(args)) = settings.command else {
            panic!("expected media ls command");
        };
        assert_eq!(
            args.filter(),
            MediaFilter {
                point_id: Some(3),
                sort: MediaSort::TakenAt,
                order: SortOrder::Asc,
                limit: 25,
                offset: 0,
            }
        );
    }

    #[test]
    fn test_media_set_patch() {
        let settings = Settings::try_parse_from([
            "track-replay", "media", "set", "4", "--title", "Summit", "--taken-lat", "-12.5",
        ])
        .unwrap();
        let Command::Media(MediaCommand::Set(args)) = settings.command else {
            panic!("expected media set command");
        };
        assert_eq!(args.id, 4);
        assert_eq!(
            args.patch(),
            MediaPatch {
                title: Some("Summit".to_string()),
                taken_lat: Some(Some(-12.5)),
                ..MediaPatch::default()
            }
        );

        let settings =
            Settings::try_parse_from(["track-replay", "media", "set", "4", "--clear-taken"]).unwrap();
        let Command::Media(MediaCommand::Set(args)) = settings.command else {
            panic!("expected media set command");
        };
        let patch = args.patch();
        assert_eq!(patch.taken_at, Some(None));
        assert_eq!(patch.taken_lat, Some(None));
        assert_eq!(patch.taken_lng, Some(None));

        assert!(
            Settings::try_parse_from([
                "track-replay", "media", "set", "4", "--clear-taken", "--taken-at", "5",
            ])
            .is_err()
        );
    }

    #[test]
    fn test_media_add_taken_fields() {
        let settings = Settings::try_parse_from([
            "track-replay", "media", "add", "--point-id", "1", "--url", "a.jpg",
            "--taken-at", "1700000000", "--taken-lng", "-0.5",
        ])
        .unwrap();
        let Command::Media(MediaCommand::Add { taken_at, taken_lat, taken_lng, .. }) =
            settings.command
        else {
            panic!("expected media add command");
        };
        assert_eq!(taken_at, Some(1_700_000_000));
        assert_eq!(taken_lat, None);
        assert_eq!(taken_lng, Some(-0.5));
    }
}
