use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::RwLock,
    time::Duration,
};

use crate::report::ReportOptions;

pub const DATA_DIR_ENV: &str = "TASKCLOCK_DATA_DIR";
pub const DEBUG_ENV: &str = "TASKCLOCK_DEBUG";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrackingSettings {
    pub tick_interval_ms: u64,
    pub sample_every_ticks: u32,
    pub sample_timeout_ms: u64,
    pub activity_label_max_chars: usize,
    pub top_activity_count: usize,
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            sample_every_ticks: 10,
            sample_timeout_ms: 2000,
            activity_label_max_chars: 60,
            top_activity_count: 5,
        }
    }
}

impl TrackingSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn sample_timeout(&self) -> Duration {
        Duration::from_millis(self.sample_timeout_ms.max(1))
    }

    pub fn report_options(&self) -> ReportOptions {
        ReportOptions {
            label_max_chars: self.activity_label_max_chars,
            top_activity_count: self.top_activity_count,
        }
    }

    /// Debug mode samples on every tick.
    pub fn with_env_overrides(mut self) -> Self {
        let debug_mode = std::env::var(DEBUG_ENV)
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        if debug_mode {
            self.sample_every_ticks = 1;
        }
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct UserSettings {
    tracking: TrackingSettings,
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log::warn!("Ignoring unreadable settings at {}: {err}", path.display());
                UserSettings::default()
            })
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn tracking(&self) -> TrackingSettings {
        match self.data.read() {
            Ok(guard) => guard.tracking.clone(),
            Err(poisoned) => poisoned.into_inner().tracking.clone(),
        }
    }

    pub fn update_tracking(&self, settings: TrackingSettings) -> Result<()> {
        let mut guard = match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.tracking = settings;
        self.persist(&guard)
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

/// `$TASKCLOCK_DATA_DIR`, else the platform data directory.
pub fn default_data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        if !dir.trim().is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }

    dirs::data_dir()
        .map(|dir| dir.join("taskclock"))
        .context("could not determine a data directory; set TASKCLOCK_DATA_DIR")
}

pub fn settings_path(data_dir: &Path) -> PathBuf {
    data_dir.join("settings.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let store = SettingsStore::new(settings_path(dir.path())).unwrap();
        assert_eq!(store.tracking(), TrackingSettings::default());
    }

    #[test]
    fn test_update_persists_and_reloads() {
        let dir = TempDir::new().unwrap();
        let path = settings_path(dir.path());
        let store = SettingsStore::new(path.clone()).unwrap();

        let custom = TrackingSettings {
            sample_every_ticks: 30,
            top_activity_count: 3,
            ..TrackingSettings::default()
        };
        store.update_tracking(custom.clone()).unwrap();

        let reloaded = SettingsStore::new(path).unwrap();
        assert_eq!(reloaded.tracking(), custom);
    }

    #[test]
    fn test_partial_and_corrupt_files() {
        let dir = TempDir::new().unwrap();
        let path = settings_path(dir.path());

        fs::write(&path, r#"{"tracking": {"sample_every_ticks": 5}}"#).unwrap();
        let store = SettingsStore::new(path.clone()).unwrap();
        assert_eq!(store.tracking().sample_every_ticks, 5);
        assert_eq!(store.tracking().tick_interval_ms, 1000);

        fs::write(&path, "not json").unwrap();
        let store = SettingsStore::new(path).unwrap();
        assert_eq!(store.tracking(), TrackingSettings::default());
    }

    #[test]
    fn test_report_options_follow_settings() {
        let settings = TrackingSettings {
            activity_label_max_chars: 20,
            ..TrackingSettings::default()
        };
        let options = settings.report_options();
        assert_eq!(options.label_max_chars, 20);
        assert_eq!(options.top_activity_count, 5);
    }
}
