//! Persisted user preferences with expiry, cookie style.

use crate::config::ModePreference;
use crate::error::Result;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

pub const VISUALIZER_KEY: &str = "visualizer";
/// Lifetime of the default visualizer preference.
pub const VISUALIZER_TTL_DAYS: i64 = 365;

pub trait PreferenceStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str, ttl_days: i64) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Entry {
    value: String,
    /// Unix seconds.
    expires: i64,
}

impl Entry {
    fn new(value: &str, ttl_days: i64, now: DateTime<Utc>) -> Self {
        Self {
            value: value.to_string(),
            expires: (now + Duration::days(ttl_days)).timestamp(),
        }
    }

    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires > now.timestamp()
    }
}

/// TOML-backed store under the config directory.
#[derive(Debug)]
pub struct FilePreferenceStore {
    path: PathBuf,
    entries: BTreeMap<String, Entry>,
}

impl FilePreferenceStore {
    pub fn open(path: PathBuf) -> Self {
        let entries = match fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content).unwrap_or_else(|e| {
                warn!(path = %path.display(), "discarding unreadable preferences: {}", e);
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        };
        Self { path, entries }
    }

    pub fn default_path() -> PathBuf {
        crate::settings::Settings::config_dir().join("preferences.toml")
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let now = Utc::now();
        let live: BTreeMap<&String, &Entry> =
            self.entries.iter().filter(|(_, e)| e.is_live(now)).collect();
        fs::write(&self.path, toml::to_string(&live)?)?;
        Ok(())
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .get(key)
            .filter(|e| e.is_live(Utc::now()))
            .map(|e| e.value.clone())
    }

    fn set(&mut self, key: &str, value: &str, ttl_days: i64) -> Result<()> {
        self.entries.insert(key.to_string(), Entry::new(value, ttl_days, Utc::now()));
        self.save()
    }
}

/// In-process store for tests and the demo.
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    entries: HashMap<String, Entry>,
}

impl PreferenceStore for MemoryPreferenceStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .get(key)
            .filter(|e| e.is_live(Utc::now()))
            .map(|e| e.value.clone())
    }

    fn set(&mut self, key: &str, value: &str, ttl_days: i64) -> Result<()> {
        self.entries.insert(key.to_string(), Entry::new(value, ttl_days, Utc::now()));
        Ok(())
    }
}

/// Read the visualizer preference, writing the `random` default when unset.
///
/// Unknown stored values read as `random` and are left in place.
pub fn init_visualizer_preference(store: &mut dyn PreferenceStore) -> Result<ModePreference> {
    match store.get(VISUALIZER_KEY) {
        Some(value) => Ok(value.parse().unwrap_or_else(|_| {
            debug!(%value, "unknown visualizer preference");
            ModePreference::Random
        })),
        None => {
            store.set(VISUALIZER_KEY, ModePreference::Random.as_str(), VISUALIZER_TTL_DAYS)?;
            Ok(ModePreference::Random)
        }
    }
}
