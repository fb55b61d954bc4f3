//! Several views over the same data, ticked together.
//!
//! The group forwards link updates between views (offset first, then box)
//! and paces timestep playback across all of them.

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use query_engine::{Dataset, EngineConfig};

use crate::config::ViewConfig;
use crate::controller::{TickReport, ViewController};
use crate::error::Result;
use crate::playback::Playback;

/// Views sharing linking and playback.
#[derive(Debug, Default)]
pub struct ViewGroup {
    views: Vec<ViewController>,
    playback: Playback,
}

impl ViewGroup {
    pub fn new(views: Vec<ViewController>) -> Self {
        Self {
            views,
            playback: Playback::new(),
        }
    }

    /// Create `count` views named `view-0`, `view-1`, ... bound to `dataset`.
    pub fn with_dataset(
        count: usize,
        dataset: Arc<dyn Dataset>,
        engine: &EngineConfig,
        config: &ViewConfig,
    ) -> Result<Self> {
        let mut views = Vec::with_capacity(count);
        for i in 0..count {
            let mut view = ViewController::new(format!("view-{i}"), engine, config.clone());
            view.set_dataset(dataset.clone())?;
            views.push(view);
        }
        Ok(Self::new(views))
    }

    pub fn views(&self) -> &[ViewController] {
        &self.views
    }

    pub fn view(&self, index: usize) -> Option<&ViewController> {
        self.views.get(index)
    }

    pub fn view_mut(&mut self, index: usize) -> Option<&mut ViewController> {
        self.views.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    pub fn start(&self) {
        for view in &self.views {
            view.start();
        }
        info!(views = self.views.len(), "View group started");
    }

    /// Stop playback and every view.
    pub async fn stop(&mut self) {
        self.stop_play();
        for view in &mut self.views {
            view.stop().await;
        }
        info!(views = self.views.len(), "View group stopped");
    }

    /// Tick every view in order, forward links, then advance playback.
    pub async fn tick(&mut self) -> Result<Vec<TickReport>> {
        let mut reports = Vec::with_capacity(self.views.len());
        for i in 0..self.views.len() {
            let report = self.views[i].tick().await?;
            if let Some(link) = &report.link {
                for (j, other) in self.views.iter_mut().enumerate() {
                    if j != i {
                        other.apply_link(link)?;
                    }
                }
            }
            reports.push(report);
        }
        self.advance_playback();
        Ok(reports)
    }

    fn advance_playback(&mut self) {
        let Some(first) = self.views.first() else {
            return;
        };
        let render_ids: Vec<u64> = self.views.iter().map(ViewController::render_id).collect();
        let next = self.playback.poll(
            Instant::now(),
            first.play_delay(),
            &render_ids,
            first.timestep(),
            first.timestep_delta(),
            first.timesteps(),
        );
        if let Some(timestep) = next {
            debug!(timestep, "Playback advancing");
            self.set_timestep(timestep);
        }
    }

    /// Show `timestep` in every view.
    pub fn set_timestep(&mut self, timestep: i64) {
        for view in &mut self.views {
            view.set_timestep(timestep);
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playback.is_playing()
    }

    /// Start playback. Views drop to a single refinement step until
    /// [`stop_play`](Self::stop_play).
    pub fn play(&mut self) {
        if self.playback.is_playing() {
            return;
        }
        let Some(first) = self.views.first() else {
            return;
        };
        self.playback.start(Instant::now(), first.num_refinements());
        for view in &mut self.views {
            view.set_num_refinements(1);
        }
        info!("Playback started");
    }

    /// Stop playback and restore the refinement count.
    pub fn stop_play(&mut self) {
        let Some(refinements) = self.playback.stop() else {
            return;
        };
        for view in &mut self.views {
            view.set_num_refinements(refinements);
        }
        info!(refinements, "Playback stopped");
    }

    pub fn toggle_play(&mut self) {
        if self.playback.is_playing() {
            self.stop_play();
        } else {
            self.play();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use query_engine::SyntheticDataset;

    fn group(count: usize, config: ViewConfig) -> ViewGroup {
        let dataset: Arc<dyn Dataset> =
            Arc::new(SyntheticDataset::new(vec![32, 32, 8]).with_timesteps(3));
        ViewGroup::with_dataset(count, dataset, &EngineConfig::default(), &config).unwrap()
    }

    #[test]
    fn test_with_dataset_names_views() {
        let g = group(3, ViewConfig::default());
        assert_eq!(g.len(), 3);
        assert_eq!(g.view(2).unwrap().name(), "view-2");
        assert!(g.view(3).is_none());
    }

    #[test]
    fn test_play_forces_single_refinement() {
        let mut g = group(2, ViewConfig::default());
        g.play();
        assert!(g.is_playing());
        assert!(g.views().iter().all(|v| v.num_refinements() == 1));

        g.toggle_play();
        assert!(!g.is_playing());
        assert!(g.views().iter().all(|v| v.num_refinements() == 2));
    }

    #[test]
    fn test_set_timestep_reaches_every_view() {
        let mut g = group(2, ViewConfig::default());
        g.set_timestep(2);
        assert!(g.views().iter().all(|v| v.timestep() == 2));
    }

    #[test]
    fn test_empty_group() {
        let mut g = ViewGroup::default();
        assert!(g.is_empty());
        g.play();
        assert!(!g.is_playing());
    }
}
