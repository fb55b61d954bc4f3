//! Per-view query scheduler.
//!
//! The scheduler owns a single job slot and one worker task. Pushing a job
//! aborts whatever was queued or running, so at most one job per view is
//! ever live. The worker checks the job's token between refinement steps
//! and publishes each step into the [`ResultMailbox`].

mod mailbox;

pub use mailbox::ResultMailbox;

use futures::StreamExt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{QueryError, Result};
use crate::job::ProgressiveQueryJob;
use crate::types::{PartialResult, QueryOutcome};

/// Lifecycle state of a scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPhase {
    Stopped,
    Idle,
    Running { job_id: u64 },
}

impl SchedulerPhase {
    pub fn is_running(&self) -> bool {
        matches!(self, SchedulerPhase::Running { .. })
    }
}

/// State shared between the scheduler handle and its worker.
#[derive(Debug)]
struct Control {
    /// Job waiting to be picked up.
    pending: Option<Arc<ProgressiveQueryJob>>,
    /// Job the worker is executing.
    current: Option<Arc<ProgressiveQueryJob>>,
    phase: SchedulerPhase,
    shutdown: bool,
}

impl Control {
    fn abort_all(&mut self) {
        if let Some(job) = self.pending.take() {
            job.token.set_true();
        }
        if let Some(job) = &self.current {
            job.token.set_true();
        }
    }
}

/// Runs progressive queries for a single view.
pub struct QueryScheduler {
    name: String,
    control: Arc<watch::Sender<Control>>,
    mailbox: Arc<ResultMailbox>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl QueryScheduler {
    /// Create a stopped scheduler. Call [`start`](Self::start) to spawn the worker.
    pub fn new(name: impl Into<String>, config: &EngineConfig) -> Self {
        let (control, _) = watch::channel(Control {
            pending: None,
            current: None,
            phase: SchedulerPhase::Stopped,
            shutdown: false,
        });
        Self {
            name: name.into(),
            control: Arc::new(control),
            mailbox: Arc::new(ResultMailbox::new(config.mailbox_capacity)),
            worker: Mutex::new(None),
        }
    }

    fn worker(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.worker.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn phase(&self) -> SchedulerPhase {
        self.control.borrow().phase
    }

    /// Id of the job being executed, if any.
    pub fn current_job_id(&self) -> Option<u64> {
        self.control.borrow().current.as_ref().map(|job| job.id)
    }

    pub fn mailbox(&self) -> &ResultMailbox {
        &self.mailbox
    }

    /// Spawn the worker if it is not already active. Idempotent.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        let mut worker = self.worker();
        if worker.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        self.control.send_modify(|c| {
            c.shutdown = false;
            c.current = None;
            c.phase = SchedulerPhase::Idle;
        });

        let handle = tokio::spawn(worker_loop(
            self.name.clone(),
            self.control.clone(),
            self.mailbox.clone(),
        ));
        *worker = Some(handle);

        info!(scheduler = %self.name, "Query scheduler started");
    }

    /// Abort every job, stop the worker and wait for it to exit. Idempotent.
    pub async fn stop(&self) {
        self.control.send_modify(|c| {
            c.shutdown = true;
            c.abort_all();
        });

        let handle = self.worker().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(scheduler = %self.name, error = %e, "Query worker terminated abnormally");
            }
            info!(scheduler = %self.name, "Query scheduler stopped");
        }

        self.control.send_modify(|c| {
            c.current = None;
            c.phase = SchedulerPhase::Stopped;
        });
    }

    /// Make `job` the current job, aborting any queued or running one.
    ///
    /// Returns the id of the pushed job.
    pub fn push_job(&self, job: ProgressiveQueryJob) -> Result<u64> {
        let job = Arc::new(job);
        let job_id = job.id;
        let mut accepted = true;
        let mut replaced = 0u64;

        self.control.send_modify(|c| {
            if c.shutdown || c.phase == SchedulerPhase::Stopped {
                accepted = false;
                return;
            }
            if let Some(old) = c.pending.replace(job.clone()) {
                old.token.set_true();
                replaced += 1;
            }
            if let Some(running) = &c.current {
                if !running.token.is_true() {
                    running.token.set_true();
                    replaced += 1;
                }
            }
        });

        if !accepted {
            job.token.set_true();
            return Err(QueryError::SchedulerStopped(self.name.clone()));
        }

        metrics::counter!("query_jobs_pushed").increment(1);
        if replaced > 0 {
            metrics::counter!("query_jobs_aborted").increment(replaced);
        }
        debug!(
            scheduler = %self.name,
            job_id,
            logic_box = %job.request.logic_box,
            "Pushed query job"
        );

        Ok(job_id)
    }

    /// Wait until the worker is no longer executing a job.
    ///
    /// Callers abort the current token first; the worker notices it at the
    /// next step boundary and returns to idle.
    pub async fn wait_idle(&self) {
        let mut rx = self.control.subscribe();
        if rx.wait_for(|c| !c.phase.is_running()).await.is_err() {
            debug!(scheduler = %self.name, "Control channel closed while waiting for idle");
        }
    }

    /// Take an undelivered outcome without blocking.
    pub fn pop_result(&self, last_only: bool) -> Option<QueryOutcome> {
        self.mailbox.pop(last_only)
    }
}

impl Drop for QueryScheduler {
    fn drop(&mut self) {
        self.control.send_modify(|c| {
            c.shutdown = true;
            c.abort_all();
        });
    }
}

async fn worker_loop(name: String, control: Arc<watch::Sender<Control>>, mailbox: Arc<ResultMailbox>) {
    let mut rx = control.subscribe();

    loop {
        if rx
            .wait_for(|c| c.shutdown || c.pending.is_some())
            .await
            .is_err()
        {
            break;
        }

        let mut next = None;
        let mut exit = false;
        control.send_modify(|c| {
            if c.shutdown {
                exit = true;
                return;
            }
            if let Some(job) = c.pending.take() {
                c.phase = SchedulerPhase::Running { job_id: job.id };
                c.current = Some(job.clone());
                next = Some(job);
            }
        });

        if exit {
            break;
        }
        let Some(job) = next else {
            continue;
        };

        run_job(&name, &job, &mailbox).await;

        control.send_modify(|c| {
            c.current = None;
            if c.phase == (SchedulerPhase::Running { job_id: job.id }) {
                c.phase = SchedulerPhase::Idle;
            }
        });
    }

    control.send_modify(|c| {
        c.current = None;
        c.phase = SchedulerPhase::Stopped;
    });
    debug!(scheduler = %name, "Query worker exited");
}

/// Execute every refinement step of one job.
async fn run_job(name: &str, job: &ProgressiveQueryJob, mailbox: &ResultMailbox) {
    if job.token.is_true() {
        debug!(scheduler = %name, job_id = job.id, "Job aborted before start");
        return;
    }

    let started = Instant::now();
    let mut stream =
        job.dataset
            .execute_box_query(job.access.clone(), job.request.clone(), job.token.clone());
    let mut sequence = 0usize;

    while let Some(step) = stream.next().await {
        if job.token.is_true() {
            debug!(
                scheduler = %name,
                job_id = job.id,
                published = sequence,
                "Job aborted, discarding remaining refinements"
            );
            return;
        }

        match step {
            Ok(step) => {
                let elapsed = started.elapsed();
                debug!(
                    scheduler = %name,
                    job_id = job.id,
                    level = step.level,
                    running = step.running,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Publishing partial result"
                );
                mailbox.publish(QueryOutcome::Partial(PartialResult {
                    job_id: job.id,
                    image: step.image,
                    logic_box: step.logic_box,
                    level: step.level,
                    running: step.running,
                    sequence,
                    elapsed,
                }));
                metrics::counter!("query_steps_published").increment(1);
                metrics::gauge!("query_step_elapsed_ms").set(elapsed.as_secs_f64() * 1000.0);
                sequence += 1;
                tokio::task::yield_now().await;
            }
            Err(e) => {
                warn!(scheduler = %name, job_id = job.id, error = %e, "Query step failed");
                metrics::counter!("query_failures").increment(1);
                mailbox.publish(QueryOutcome::Failed {
                    job_id: job.id,
                    message: e.to_string(),
                });
                return;
            }
        }
    }

    info!(
        scheduler = %name,
        job_id = job.id,
        steps = sequence,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Query finished"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Dataset;
    use crate::job::QueryBudget;
    use crate::testdata::SyntheticDataset;
    use slice_common::LogicalBox;
    use std::time::Duration;

    fn job_for(dataset: &Arc<SyntheticDataset>, refinements: usize) -> ProgressiveQueryJob {
        let dims = dataset.logic_size();
        let ds: Arc<dyn Dataset> = dataset.clone();
        ProgressiveQueryJob::new(ds, dataset.create_access(), LogicalBox::full(&dims))
            .with_field("data")
            .with_refinements(refinements)
    }

    async fn drain_until_terminal(scheduler: &QueryScheduler) -> Vec<QueryOutcome> {
        let mut seen = Vec::new();
        for _ in 0..500 {
            if let Some(outcome) = scheduler.pop_result(false) {
                let terminal = outcome.is_terminal();
                seen.push(outcome);
                if terminal {
                    return seen;
                }
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        seen
    }

    #[tokio::test]
    async fn test_push_to_stopped_scheduler_fails() {
        let dataset = Arc::new(SyntheticDataset::new(vec![32, 32]));
        let scheduler = QueryScheduler::new("stopped", &EngineConfig::default());
        let job = job_for(&dataset, 1);
        let token = job.token.clone();

        assert!(matches!(
            scheduler.push_job(job),
            Err(QueryError::SchedulerStopped(_))
        ));
        assert!(token.is_true());
    }

    #[tokio::test]
    async fn test_start_stop_idempotent() {
        let scheduler = QueryScheduler::new("lifecycle", &EngineConfig::default());
        assert_eq!(scheduler.phase(), SchedulerPhase::Stopped);
        scheduler.start();
        scheduler.start();
        assert_eq!(scheduler.phase(), SchedulerPhase::Idle);
        scheduler.stop().await;
        scheduler.stop().await;
        assert_eq!(scheduler.phase(), SchedulerPhase::Stopped);
        scheduler.start();
        assert_eq!(scheduler.phase(), SchedulerPhase::Idle);
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_wait_idle_pending_while_running() {
        let dataset = Arc::new(SyntheticDataset::new(vec![64, 64]).with_step_delay(Duration::from_millis(50)));
        let scheduler = QueryScheduler::new("idle-poll", &EngineConfig::default());
        scheduler.start();

        let mut idle = tokio_test::task::spawn(scheduler.wait_idle());
        tokio_test::assert_ready!(idle.poll());
        drop(idle);

        let job = job_for(&dataset, 4);
        let token = job.token.clone();
        scheduler.push_job(job).unwrap();
        for _ in 0..500 {
            if scheduler.phase().is_running() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert!(scheduler.phase().is_running());

        let mut busy = tokio_test::task::spawn(scheduler.wait_idle());
        tokio_test::assert_pending!(busy.poll());
        drop(busy);

        token.set_true();
        scheduler.wait_idle().await;
        assert!(!scheduler.phase().is_running());
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_runs_all_refinements() {
        let dataset = Arc::new(SyntheticDataset::new(vec![1024, 1024]));
        let mut config = EngineConfig::default();
        config.mailbox_capacity = 8;
        let scheduler = QueryScheduler::new("full", &config);
        scheduler.start();

        let job = job_for(&dataset, 3).with_budget(QueryBudget::Resolution(20));
        let job_id = scheduler.push_job(job).unwrap();
        let outcomes = drain_until_terminal(&scheduler).await;

        let levels: Vec<u32> = outcomes
            .iter()
            .map(|o| match o {
                QueryOutcome::Partial(r) => {
                    assert_eq!(r.job_id, job_id);
                    r.level
                }
                QueryOutcome::Failed { message, .. } => panic!("unexpected failure {message}"),
            })
            .collect();
        assert_eq!(levels, vec![16, 18, 20]);

        scheduler.wait_idle().await;
        assert!(!scheduler.phase().is_running());
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_push_aborts_previous_job() {
        let dataset = Arc::new(SyntheticDataset::new(vec![256, 256]).with_step_delay(Duration::from_millis(20)));
        let scheduler = QueryScheduler::new("replace", &EngineConfig::default());
        scheduler.start();

        let first = job_for(&dataset, 4);
        let first_token = first.token.clone();
        scheduler.push_job(first).unwrap();
        let second = job_for(&dataset, 1);
        let second_token = second.token.clone();
        let second_id = scheduler.push_job(second).unwrap();

        assert!(first_token.is_true());
        assert!(!second_token.is_true());

        let outcomes = drain_until_terminal(&scheduler).await;
        assert_eq!(outcomes.last().map(|o| o.job_id()), Some(second_id));
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_stop_aborts_running_job() {
        let dataset = Arc::new(SyntheticDataset::new(vec![64, 64]).with_step_delay(Duration::from_millis(50)));
        let scheduler = QueryScheduler::new("abort", &EngineConfig::default());
        scheduler.start();

        let job = job_for(&dataset, 4);
        let token = job.token.clone();
        scheduler.push_job(job).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        scheduler.stop().await;

        assert!(token.is_true());
        assert_eq!(scheduler.phase(), SchedulerPhase::Stopped);
    }
}
