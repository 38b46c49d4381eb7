//! Sharing configuration stored in the key-value store, plus process-level settings
//!
//! Stored keys:
//! - `sharing_enabled`: `"1"` turns public sharing on, any other value (or none) turns it off
//! - `public_delay_hours`: integer publication delay, 48 when missing or unparseable

use crate::downsample::DEFAULT_MAX_POINTS;
use crate::store::{ConfigStore, StoreResult};
use serde::{Deserialize, Serialize};

pub const SHARING_ENABLED_KEY: &str = "sharing_enabled";
pub const PUBLIC_DELAY_HOURS_KEY: &str = "public_delay_hours";

/// Delay used when nothing (or garbage) is stored
pub const DEFAULT_PUBLIC_DELAY_HOURS: i64 = 48;
/// Upper bound accepted by [`SharingUpdate`]
pub const MAX_PUBLIC_DELAY_HOURS: i64 = 168;
/// Delay of the family view when `FAMILY_DELAY_HOURS` is unset
pub const DEFAULT_FAMILY_DELAY_HOURS: i64 = 6;

/// Current sharing configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharingSettings {
    pub delay_hours: i64,
    pub sharing_enabled: bool,
}

impl SharingSettings {
    /// Read the settings, applying defaults for missing values
    pub fn load<S: ConfigStore + ?Sized>(store: &S) -> StoreResult<Self> {
        Ok(Self {
            delay_hours: Self::load_delay_hours(store)?,
            sharing_enabled: Self::load_sharing_enabled(store)?,
        })
    }

    pub fn load_delay_hours<S: ConfigStore + ?Sized>(store: &S) -> StoreResult<i64> {
        Ok(store
            .get_string(PUBLIC_DELAY_HOURS_KEY)?
            .and_then(|v| v.trim().parse::<i64>().ok())
            .unwrap_or(DEFAULT_PUBLIC_DELAY_HOURS))
    }

    pub fn load_sharing_enabled<S: ConfigStore + ?Sized>(store: &S) -> StoreResult<bool> {
        Ok(store.get_string(SHARING_ENABLED_KEY)?.as_deref() == Some("1"))
    }
}

/// Partial update of the sharing configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SharingUpdate {
    #[serde(default)]
    pub delay_hours: Option<f64>,
    #[serde(default)]
    pub sharing_enabled: Option<bool>,
}

impl SharingUpdate {
    /// Apply the update and return the resulting settings
    ///
    /// Negative or non-finite delays are ignored; others are rounded and capped at
    /// [`MAX_PUBLIC_DELAY_HOURS`].
    pub fn apply<S: ConfigStore + ?Sized>(&self, store: &S) -> StoreResult<SharingSettings> {
        if let Some(hours) = self.delay_hours
            && hours.is_finite()
            && hours >= 0.0
        {
            let hours = (hours.round() as i64).min(MAX_PUBLIC_DELAY_HOURS);
            store.set_string(PUBLIC_DELAY_HOURS_KEY, &hours.to_string())?;
        } else if let Some(hours) = self.delay_hours {
            tracing::warn!("Ignoring invalid delay_hours update: {hours}");
        }

        if let Some(enabled) = self.sharing_enabled {
            store.set_string(SHARING_ENABLED_KEY, if enabled { "1" } else { "0" })?;
        }

        SharingSettings::load(store)
    }
}

/// Plain-text configuration pulled by the reporting device
///
/// One `key=value` per line: `sharing_enabled`, then `public_delay_hours`, then every other
/// stored key in key order.
pub fn render_device_config<S: ConfigStore + ?Sized>(store: &S) -> StoreResult<String> {
    let settings = SharingSettings::load(store)?;
    let mut lines = vec![
        format!(
            "{SHARING_ENABLED_KEY}={}",
            if settings.sharing_enabled { "1" } else { "0" }
        ),
        format!("{PUBLIC_DELAY_HOURS_KEY}={}", settings.delay_hours),
    ];
    lines.extend(
        store
            .entries()?
            .into_iter()
            .filter(|(k, _)| k != SHARING_ENABLED_KEY && k != PUBLIC_DELAY_HOURS_KEY)
            .map(|(k, v)| format!("{k}={v}")),
    );
    Ok(lines.join("\n"))
}

/// Read an environment variable and parse it to the desired type.
pub fn get_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

/// Process-level settings, independent of the stored configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Fixed delay of the family view
    pub family_delay_hours: i64,
    /// Point budget of every served track
    pub max_points: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            family_delay_hours: DEFAULT_FAMILY_DELAY_HOURS,
            max_points: DEFAULT_MAX_POINTS,
        }
    }
}

impl ServiceConfig {
    /// Read `FAMILY_DELAY_HOURS` and `TRACK_MAX_POINTS`, keeping defaults for invalid values
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            family_delay_hours: get_env::<i64>("FAMILY_DELAY_HOURS")
                .filter(|h| *h >= 0)
                .unwrap_or(defaults.family_delay_hours),
            max_points: get_env::<usize>("TRACK_MAX_POINTS")
                .filter(|n| *n >= 2)
                .unwrap_or(defaults.max_points),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;

    #[test]
    fn test_defaults_when_empty() {
        let store = MemoryStore::new();
        let settings = SharingSettings::load(&store).unwrap();
        assert_eq!(settings.delay_hours, DEFAULT_PUBLIC_DELAY_HOURS);
        assert!(!settings.sharing_enabled);
    }

    #[test]
    fn test_only_exact_one_enables_sharing() {
        let store = MemoryStore::new();
        for (value, expected) in [("1", true), ("true", false), ("0", false), (" 1", false)] {
            store.set_string(SHARING_ENABLED_KEY, value).unwrap();
            assert_eq!(SharingSettings::load_sharing_enabled(&store).unwrap(), expected);
        }
    }

    #[test]
    fn test_unparseable_delay_falls_back() {
        let store = MemoryStore::new();
        store.set_string(PUBLIC_DELAY_HOURS_KEY, "soon").unwrap();
        assert_eq!(SharingSettings::load_delay_hours(&store).unwrap(), 48);
        store.set_string(PUBLIC_DELAY_HOURS_KEY, "12").unwrap();
        assert_eq!(SharingSettings::load_delay_hours(&store).unwrap(), 12);
    }

    #[test]
    fn test_update_rounds_and_clamps() {
        let store = MemoryStore::new();
        let update = SharingUpdate {
            delay_hours: Some(2.6),
            sharing_enabled: Some(true),
        };
        let settings = update.apply(&store).unwrap();
        assert_eq!(settings.delay_hours, 3);
        assert!(settings.sharing_enabled);

        let settings = SharingUpdate {
            delay_hours: Some(500.0),
            ..SharingUpdate::default()
        }
        .apply(&store)
        .unwrap();
        assert_eq!(settings.delay_hours, MAX_PUBLIC_DELAY_HOURS);
        assert!(settings.sharing_enabled);

        let settings = SharingUpdate {
            delay_hours: Some(-1.0),
            sharing_enabled: Some(false),
        }
        .apply(&store)
        .unwrap();
        assert_eq!(settings.delay_hours, MAX_PUBLIC_DELAY_HOURS);
        assert!(!settings.sharing_enabled);
        assert_eq!(store.get_string(SHARING_ENABLED_KEY).unwrap().as_deref(), Some("0"));
    }

    #[test]
    fn test_update_deserializes_partial_json() {
        let update: SharingUpdate = serde_json::from_str(r#"{"sharing_enabled":true}"#).unwrap();
        assert_eq!(update.delay_hours, None);
        assert_eq!(update.sharing_enabled, Some(true));
    }

    #[test]
    fn test_device_config_lines() {
        let store = MemoryStore::new();
        store.set_string("upload_interval_s", "30").unwrap();
        store.set_string(SHARING_ENABLED_KEY, "1").unwrap();
        store.set_string("accuracy", "high").unwrap();

        let text = render_device_config(&store).unwrap();
        assert_eq!(
            text,
            "sharing_enabled=1\npublic_delay_hours=48\naccuracy=high\nupload_interval_s=30"
        );
    }

    #[test]
    fn test_service_config_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.family_delay_hours, 6);
        assert_eq!(config.max_points, 500);
    }
}
