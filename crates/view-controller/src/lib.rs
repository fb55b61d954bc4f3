//! View-side logic of the slice viewer.
//!
//! A [`ViewController`] owns one [`query_engine::QueryScheduler`] and turns
//! viewport, offset and parameter changes into progressive jobs. The host
//! calls [`ViewController::tick`] (or [`ViewGroup::tick`]) on a fixed
//! period; each tick pushes at most one job and applies at most one result.
//!
//! ```text
//!  host timer ──► ViewGroup::tick
//!                   ├─► view[0].tick ─► LinkUpdate ─► view[1..].apply_link
//!                   ├─► view[1].tick
//!                   └─► Playback::poll ─► set_timestep on every view
//! ```

pub mod config;
pub mod controller;
pub mod error;
pub mod group;
pub mod palette;
pub mod playback;
pub mod status;

pub use config::ViewConfig;
pub use controller::{LinkUpdate, RenderCallback, RenderUpdate, TickReport, ViewController};
pub use error::{Result, ViewError};
pub use group::ViewGroup;
pub use palette::{PaletteRange, PaletteRangeMode};
pub use playback::{next_timestep, Playback};
