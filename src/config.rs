use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default shake threshold of the circle visualizer.
pub const SHAKE_THRESHOLD_DAMPER: f64 = 0.15;

/// Playback volume when nothing else is configured.
pub const DEFAULT_VOLUME: f64 = 0.5;

/// Persisted visualizer choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModePreference {
    #[default]
    Random,
    Circle,
    Bar,
}

impl ModePreference {
    pub const ALL: [ModePreference; 3] = [ModePreference::Random, ModePreference::Circle, ModePreference::Bar];

    pub fn as_str(self) -> &'static str {
        match self {
            ModePreference::Random => "random",
            ModePreference::Circle => "circle",
            ModePreference::Bar => "bar",
        }
    }
}

impl fmt::Display for ModePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModePreference {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "random" => Ok(ModePreference::Random),
            "circle" | "circular" => Ok(ModePreference::Circle),
            "bar" | "bars" => Ok(ModePreference::Bar),
            _ => Err(Error::InvalidMode(s.to_string())),
        }
    }
}

/// Runtime settings of a visualizer session.
#[derive(Debug, Clone, PartialEq)]
pub struct VisualizerConfig {
    volume: f64,
    mode: ModePreference,
    shake_threshold: f64,
}

impl Default for VisualizerConfig {
    fn default() -> Self {
        Self {
            volume: DEFAULT_VOLUME,
            mode: ModePreference::Random,
            shake_threshold: SHAKE_THRESHOLD_DAMPER,
        }
    }
}

impl VisualizerConfig {
    pub fn volume(&self) -> f64 {
        self.volume
    }

    /// Playback volume, clamped to `[0, 1]`.
    pub fn set_volume(&mut self, volume: f64) -> &mut Self {
        self.volume = if volume.is_finite() { volume.clamp(0.0, 1.0) } else { DEFAULT_VOLUME };
        self
    }

    pub fn mode(&self) -> ModePreference {
        self.mode
    }

    pub fn set_mode(&mut self, mode: ModePreference) -> &mut Self {
        self.mode = mode;
        self
    }

    pub fn shake_threshold(&self) -> f64 {
        self.shake_threshold
    }

    pub fn set_shake_threshold(&mut self, threshold: f64) -> &mut Self {
        self.shake_threshold = threshold.max(0.0);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parses_and_prints() {
        for mode in ModePreference::ALL {
            assert_eq!(mode.to_string().parse::<ModePreference>().unwrap(), mode);
        }
        assert_eq!("Circle".parse::<ModePreference>().unwrap(), ModePreference::Circle);
        assert!(matches!("wave".parse::<ModePreference>(), Err(Error::InvalidMode(_))));
    }

    #[test]
    fn setters_clamp() {
        let mut cfg = VisualizerConfig::default();
        assert_eq!(cfg.volume(), DEFAULT_VOLUME);
        cfg.set_volume(3.0).set_shake_threshold(-1.0).set_mode(ModePreference::Bar);
        assert_eq!(cfg.volume(), 1.0);
        assert_eq!(cfg.shake_threshold(), 0.0);
        assert_eq!(cfg.mode(), ModePreference::Bar);
        cfg.set_volume(f64::NAN);
        assert_eq!(cfg.volume(), DEFAULT_VOLUME);
    }
}
