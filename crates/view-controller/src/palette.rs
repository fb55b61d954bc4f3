//! Palette value-range modes.
//!
//! | Mode          | Range used for the color mapper                         |
//! |---------------|---------------------------------------------------------|
//! | `metadata`    | value-type range of the field from dataset metadata     |
//! | `user`        | range set explicitly through [`PaletteRange::set_user_range`] |
//! | `dynamic`     | min/max of the latest applied result                    |
//! | `dynamic-acc` | running min/max over every result since the last reset  |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How the palette range follows the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaletteRangeMode {
    Metadata,
    User,
    Dynamic,
    DynamicAcc,
}

impl PaletteRangeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaletteRangeMode::Metadata => "metadata",
            PaletteRangeMode::User => "user",
            PaletteRangeMode::Dynamic => "dynamic",
            PaletteRangeMode::DynamicAcc => "dynamic-acc",
        }
    }
}

impl Default for PaletteRangeMode {
    fn default() -> Self {
        PaletteRangeMode::DynamicAcc
    }
}

impl fmt::Display for PaletteRangeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaletteRangeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "metadata" => Ok(PaletteRangeMode::Metadata),
            "user" => Ok(PaletteRangeMode::User),
            "dynamic" => Ok(PaletteRangeMode::Dynamic),
            "dynamic-acc" | "dynamic_acc" => Ok(PaletteRangeMode::DynamicAcc),
            other => Err(format!("unknown palette range mode: {other}")),
        }
    }
}

fn ordered((a, b): (f64, f64)) -> (f64, f64) {
    (a.min(b), a.max(b))
}

/// Palette range state of one view.
#[derive(Debug, Clone, PartialEq)]
pub struct PaletteRange {
    mode: PaletteRangeMode,
    metadata: (f64, f64),
    user: (f64, f64),
    accumulated: Option<(f64, f64)>,
    current: (f64, f64),
}

impl PaletteRange {
    /// Start in `mode`, seeding the metadata and user ranges with `metadata`.
    pub fn new(mode: PaletteRangeMode, metadata: (f64, f64)) -> Self {
        let metadata = ordered(metadata);
        Self {
            mode,
            metadata,
            user: metadata,
            accumulated: None,
            current: metadata,
        }
    }

    pub fn mode(&self) -> PaletteRangeMode {
        self.mode
    }

    /// Range the color mapper should use now.
    pub fn current(&self) -> (f64, f64) {
        self.current
    }

    pub fn metadata_range(&self) -> (f64, f64) {
        self.metadata
    }

    pub fn user_range(&self) -> (f64, f64) {
        self.user
    }

    /// Switch mode. Entering `dynamic-acc` starts a new accumulation.
    pub fn set_mode(&mut self, mode: PaletteRangeMode) {
        self.mode = mode;
        match mode {
            PaletteRangeMode::Metadata => self.current = self.metadata,
            PaletteRangeMode::User => self.current = self.user,
            PaletteRangeMode::DynamicAcc => self.accumulated = None,
            PaletteRangeMode::Dynamic => {}
        }
    }

    pub fn set_metadata_range(&mut self, range: (f64, f64)) {
        self.metadata = ordered(range);
        if self.mode == PaletteRangeMode::Metadata {
            self.current = self.metadata;
        }
    }

    pub fn set_user_range(&mut self, range: (f64, f64)) {
        self.user = ordered(range);
        if self.mode == PaletteRangeMode::User {
            self.current = self.user;
        }
    }

    /// Forget everything accumulated so far.
    pub fn reset_accumulator(&mut self) {
        self.accumulated = None;
    }

    /// Fold the value range of a newly applied result into the palette and
    /// return the range to display. `None` means the result had no finite
    /// samples and leaves the range unchanged.
    pub fn update(&mut self, data_range: Option<(f64, f64)>) -> (f64, f64) {
        let Some(data_range) = data_range.map(ordered) else {
            return self.current;
        };

        match self.mode {
            PaletteRangeMode::Metadata | PaletteRangeMode::User => {}
            PaletteRangeMode::Dynamic => self.current = data_range,
            PaletteRangeMode::DynamicAcc => {
                let acc = match self.accumulated {
                    None => data_range,
                    Some((lo, hi)) => (lo.min(data_range.0), hi.max(data_range.1)),
                };
                self.accumulated = Some(acc);
                self.current = acc;
            }
        }
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parse_and_display() {
        for mode in [
            PaletteRangeMode::Metadata,
            PaletteRangeMode::User,
            PaletteRangeMode::Dynamic,
            PaletteRangeMode::DynamicAcc,
        ] {
            assert_eq!(mode.as_str().parse::<PaletteRangeMode>(), Ok(mode));
        }
        assert!("rainbow".parse::<PaletteRangeMode>().is_err());
        assert_eq!(
            serde_json::to_string(&PaletteRangeMode::DynamicAcc).unwrap(),
            "\"dynamic-acc\""
        );
    }

    #[test]
    fn test_accumulation_is_order_independent() {
        let mut a = PaletteRange::new(PaletteRangeMode::DynamicAcc, (0.0, 255.0));
        a.update(Some((1.0, 5.0)));
        let forward = a.update(Some((-2.0, 3.0)));

        let mut b = PaletteRange::new(PaletteRangeMode::DynamicAcc, (0.0, 255.0));
        b.update(Some((-2.0, 3.0)));
        let backward = b.update(Some((1.0, 5.0)));

        assert_eq!(forward, (-2.0, 5.0));
        assert_eq!(backward, (-2.0, 5.0));
    }

    #[test]
    fn test_first_result_replaces_seed() {
        let mut p = PaletteRange::new(PaletteRangeMode::DynamicAcc, (0.0, 255.0));
        assert_eq!(p.update(Some((10.0, 20.0))), (10.0, 20.0));
        p.set_mode(PaletteRangeMode::DynamicAcc);
        assert_eq!(p.update(Some((30.0, 40.0))), (30.0, 40.0));
    }

    #[test]
    fn test_dynamic_replaces() {
        let mut p = PaletteRange::new(PaletteRangeMode::Dynamic, (0.0, 1.0));
        p.update(Some((1.0, 5.0)));
        assert_eq!(p.update(Some((-2.0, 3.0))), (-2.0, 3.0));
        assert_eq!(p.update(None), (-2.0, 3.0));
    }

    #[test]
    fn test_fixed_modes_ignore_data() {
        let mut p = PaletteRange::new(PaletteRangeMode::Metadata, (0.0, 255.0));
        assert_eq!(p.update(Some((-7.0, 7.0))), (0.0, 255.0));

        p.set_user_range((9.0, -1.0));
        p.set_mode(PaletteRangeMode::User);
        assert_eq!(p.update(Some((-7.0, 7.0))), (-1.0, 9.0));
    }
}
