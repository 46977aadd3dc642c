use crate::config::{ModePreference, VisualizerConfig, DEFAULT_VOLUME, SHAKE_THRESHOLD_DAMPER};
use crate::error::{Error, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub visualizer: VisualizerSettings,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct VisualizerSettings {
    /// Overrides the stored preference when set.
    pub mode: Option<ModePreference>,
    pub volume: f64,
    pub shake_threshold: f64,
    pub emblem: Option<PathBuf>,
    pub emblem_blink: Option<PathBuf>,
    /// Seconds per frame.
    pub frame_time: f32,
}

impl Default for VisualizerSettings {
    fn default() -> Self {
        Self {
            mode: None,
            volume: DEFAULT_VOLUME,
            shake_threshold: SHAKE_THRESHOLD_DAMPER,
            emblem: None,
            emblem_blink: None,
            frame_time: 1.0 / 60.0,
        }
    }
}

impl VisualizerSettings {
    pub fn to_config(&self, stored: ModePreference) -> VisualizerConfig {
        let mut cfg = VisualizerConfig::default();
        cfg.set_volume(self.volume)
            .set_shake_threshold(self.shake_threshold)
            .set_mode(self.mode.unwrap_or(stored));
        cfg
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ServerSettings {
    /// Game room websocket, e.g. `ws://host:port/room/<id>`.
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub enabled: bool,
    pub level: String,
    pub path: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            level: "debug".to_string(),
            path: None,
        }
    }
}

impl Settings {
    /// Load the user config, falling back to defaults when it is missing or broken.
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("ignoring config: {}", e);
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|source| Error::Settings {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("guessviz")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }
}
