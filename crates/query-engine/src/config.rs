//! Configuration for the query engine.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration shared by every scheduler of an application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Period of the display tick that drains results, in milliseconds.
    pub tick_interval_ms: u64,

    /// Number of undelivered results kept per view. Older ones are dropped.
    pub mailbox_capacity: usize,

    /// Per-level factor applied to the on-screen pixel budget when the
    /// requested resolution differs from the dataset's native one.
    pub quality_base: f64,

    /// Refinement steps used for 2D data when a view asks for 0.
    pub default_refinements_2d: usize,

    /// Refinement steps used for 3D data when a view asks for 0.
    pub default_refinements_3d: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000 / 30,
            mailbox_capacity: 1,
            quality_base: 1.3,
            default_refinements_2d: 3,
            default_refinements_3d: 4,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("SLICE_TICK_INTERVAL_MS") {
            if let Ok(ms) = val.parse() {
                config.tick_interval_ms = ms;
            }
        }

        if let Ok(val) = std::env::var("SLICE_MAILBOX_CAPACITY") {
            if let Ok(capacity) = val.parse() {
                config.mailbox_capacity = capacity;
            }
        }

        if let Ok(val) = std::env::var("SLICE_QUALITY_BASE") {
            if let Ok(base) = val.parse() {
                config.quality_base = base;
            }
        }

        if let Ok(val) = std::env::var("SLICE_DEFAULT_REFINEMENTS_2D") {
            if let Ok(n) = val.parse() {
                config.default_refinements_2d = n;
            }
        }

        if let Ok(val) = std::env::var("SLICE_DEFAULT_REFINEMENTS_3D") {
            if let Ok(n) = val.parse() {
                config.default_refinements_3d = n;
            }
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.tick_interval_ms == 0 {
            return Err("tick_interval_ms must be > 0".to_string());
        }

        if self.mailbox_capacity == 0 {
            return Err("mailbox_capacity must be > 0".to_string());
        }

        if !(self.quality_base > 1.0) {
            return Err("quality_base must be > 1.0".to_string());
        }

        if self.default_refinements_2d == 0 || self.default_refinements_3d == 0 {
            return Err("default refinement counts must be > 0".to_string());
        }

        Ok(())
    }

    /// Display tick period.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Refinement count to use when a view asks for `requested` steps on
    /// data with `pdim` dimensions. Zero selects the per-dimension default.
    pub fn effective_refinements(&self, requested: usize, pdim: usize) -> usize {
        match requested {
            0 if pdim == 2 => self.default_refinements_2d,
            0 => self.default_refinements_3d,
            n => n,
        }
    }
}
