//! Timestep playback pacing.
//!
//! Playback advances only when both the frame delay has elapsed and every
//! view has rendered at least one result since the previous advance. The
//! second condition uses a render-id watermark: at each advance the current
//! render ids plus one are recorded, and the next advance waits until every
//! view has reached its mark.

use std::time::{Duration, Instant};

/// Playback state shared by a group of views.
#[derive(Debug, Clone)]
pub struct Playback {
    playing: bool,
    last_advance: Instant,
    wait_render_ids: Option<Vec<u64>>,
    saved_refinements: Option<usize>,
}

impl Default for Playback {
    fn default() -> Self {
        Self {
            playing: false,
            last_advance: Instant::now(),
            wait_render_ids: None,
            saved_refinements: None,
        }
    }
}

impl Playback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Start playing, remembering the refinement count to restore on stop.
    pub fn start(&mut self, now: Instant, refinements: usize) {
        self.playing = true;
        self.last_advance = now;
        self.wait_render_ids = None;
        self.saved_refinements = Some(refinements);
    }

    /// Stop playing. Returns the refinement count saved by [`start`](Self::start).
    pub fn stop(&mut self) -> Option<usize> {
        self.playing = false;
        self.wait_render_ids = None;
        self.saved_refinements.take()
    }

    /// Timestep to show next, if it is time to advance.
    ///
    /// `render_ids` holds the render counter of every view in the group, in a
    /// stable order. Past the last timestep playback wraps to the first one.
    pub fn poll(
        &mut self,
        now: Instant,
        delay: Duration,
        render_ids: &[u64],
        current: i64,
        delta: i64,
        timesteps: &[i64],
    ) -> Option<i64> {
        if !self.playing {
            return None;
        }
        if now.saturating_duration_since(self.last_advance) < delay {
            return None;
        }
        if let Some(wait) = &self.wait_render_ids {
            if render_ids.iter().zip(wait).any(|(id, mark)| id < mark) {
                return None;
            }
        }

        let next = next_timestep(current, delta, timesteps);
        self.wait_render_ids = Some(render_ids.iter().map(|id| id + 1).collect());
        self.last_advance = now;
        Some(next)
    }
}

/// Advance `current` by `delta` within `timesteps`, wrapping at both ends.
pub fn next_timestep(current: i64, delta: i64, timesteps: &[i64]) -> i64 {
    let (Some(&first), Some(&last)) = (timesteps.first(), timesteps.last()) else {
        return current;
    };
    let next = current.saturating_add(delta);
    if next > last {
        first
    } else if next < first {
        last
    } else {
        next
    }
}
