//! Configuration for a view.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, ViewError};
use crate::palette::PaletteRangeMode;

/// Initial settings applied when a dataset is bound to a view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// Slicing axis for 3D data (0, 1 or 2). Ignored for 2D data.
    pub direction: usize,

    /// Resolution level, or `None` for six levels below the dataset maximum.
    pub resolution: Option<u32>,

    /// Refinement steps per query. 0 selects the engine default.
    pub num_refinements: usize,

    /// Derive query detail from the on-screen pixel budget.
    pub view_dependent: bool,

    /// How the palette range follows the data.
    pub palette_range_mode: PaletteRangeMode,

    /// Timestep increment during playback.
    pub timestep_delta: i64,

    /// Minimum delay between two playback frames, in seconds.
    pub play_sec: f64,

    /// Propagate offset and box to sibling views.
    pub linked: bool,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            direction: 2,
            resolution: None,
            num_refinements: 2,
            view_dependent: true,
            palette_range_mode: PaletteRangeMode::DynamicAcc,
            timestep_delta: 1,
            play_sec: 0.01,
            linked: false,
        }
    }
}

/// Levels subtracted from the dataset maximum when no resolution is set.
pub const DEFAULT_RESOLUTION_DROP: u32 = 6;

impl ViewConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("SLICE_DIRECTION") {
            if let Ok(direction) = val.parse() {
                config.direction = direction;
            }
        }

        if let Ok(val) = std::env::var("SLICE_RESOLUTION") {
            if let Ok(resolution) = val.parse() {
                config.resolution = Some(resolution);
            }
        }

        if let Ok(val) = std::env::var("SLICE_NUM_REFINEMENTS") {
            if let Ok(n) = val.parse() {
                config.num_refinements = n;
            }
        }

        if let Ok(val) = std::env::var("SLICE_VIEW_DEPENDENT") {
            config.view_dependent = val.to_lowercase() == "true" || val == "1";
        }

        if let Ok(val) = std::env::var("SLICE_PALETTE_RANGE_MODE") {
            if let Ok(mode) = val.parse() {
                config.palette_range_mode = mode;
            }
        }

        if let Ok(val) = std::env::var("SLICE_TIMESTEP_DELTA") {
            if let Ok(delta) = val.parse() {
                config.timestep_delta = delta;
            }
        }

        if let Ok(val) = std::env::var("SLICE_PLAY_SEC") {
            if let Ok(sec) = val.parse() {
                config.play_sec = sec;
            }
        }

        if let Ok(val) = std::env::var("SLICE_LINKED") {
            config.linked = val.to_lowercase() == "true" || val == "1";
        }

        config
    }

    /// Load and validate configuration from a JSON file. Missing keys keep
    /// their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate().map_err(ViewError::config)?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.direction > 2 {
            return Err(format!("direction must be 0, 1 or 2, got {}", self.direction));
        }

        if self.timestep_delta == 0 {
            return Err("timestep_delta must be != 0".to_string());
        }

        if !(self.play_sec >= 0.0) || !self.play_sec.is_finite() {
            return Err("play_sec must be a finite value >= 0".to_string());
        }

        Ok(())
    }

    /// Playback frame delay.
    pub fn play_delay(&self) -> Duration {
        Duration::from_secs_f64(self.play_sec.max(0.0))
    }

    /// Resolution to start with on a dataset whose finest level is `max_level`.
    pub fn initial_resolution(&self, max_level: u32) -> u32 {
        self.resolution
            .unwrap_or_else(|| max_level.saturating_sub(DEFAULT_RESOLUTION_DROP))
            .min(max_level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = ViewConfig::default();
        assert_eq!(config.direction, 2);
        assert_eq!(config.num_refinements, 2);
        assert!(config.view_dependent);
        assert_eq!(config.palette_range_mode, PaletteRangeMode::DynamicAcc);
        assert_eq!(config.play_sec, 0.01);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_initial_resolution() {
        let config = ViewConfig::default();
        assert_eq!(config.initial_resolution(20), 14);
        assert_eq!(config.initial_resolution(4), 0);

        let fixed = ViewConfig {
            resolution: Some(30),
            ..ViewConfig::default()
        };
        assert_eq!(fixed.initial_resolution(20), 20);
    }

    #[test]
    fn test_validation() {
        let mut config = ViewConfig::default();
        config.direction = 3;
        assert!(config.validate().is_err());

        let mut config = ViewConfig::default();
        config.play_sec = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = ViewConfig::default();
        config.timestep_delta = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_json_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"direction": 0, "palette_range_mode": "user", "linked": true}}"#
        )
        .unwrap();

        let config = ViewConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.direction, 0);
        assert_eq!(config.palette_range_mode, PaletteRangeMode::User);
        assert!(config.linked);
        assert_eq!(config.num_refinements, 2);
    }

    #[test]
    fn test_from_json_file_reports_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(ViewConfig::from_json_file(file.path()).is_err());
        assert!(ViewConfig::from_json_file("/nonexistent/view.json").is_err());

        let mut invalid = tempfile::NamedTempFile::new().unwrap();
        write!(invalid, r#"{{"direction": 7}}"#).unwrap();
        assert!(matches!(
            ViewConfig::from_json_file(invalid.path()),
            Err(ViewError::Config(_))
        ));
    }
}
