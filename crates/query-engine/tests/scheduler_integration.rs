//! Integration tests for the query scheduler against scripted datasets.
//!
//! These tests drive a real worker task and observe it only through the
//! public surface: `push_job`, `pop_result`, `wait_idle` and phases.

use std::sync::Arc;
use std::time::Duration;

use query_engine::{
    Dataset, EngineConfig, ProgressiveQueryJob, QueryBudget, QueryOutcome, QueryScheduler,
    SchedulerPhase,
};
use slice_common::LogicalBox;
use test_utils::{drain_until_terminal, wait_until, ScriptedDataset, DEFAULT_TIMEOUT};

fn roomy_config() -> EngineConfig {
    EngineConfig {
        mailbox_capacity: 16,
        ..EngineConfig::default()
    }
}

fn job(dataset: &Arc<ScriptedDataset>, steps: usize) -> ProgressiveQueryJob {
    let ds: Arc<dyn Dataset> = dataset.clone();
    let dims = ds.logic_size();
    ProgressiveQueryJob::new(ds.clone(), ds.create_access(), LogicalBox::full(&dims))
        .with_budget(QueryBudget::Resolution(dataset.max_resolution()))
        .with_refinements(steps)
}

fn levels(outcomes: &[QueryOutcome]) -> Vec<u32> {
    outcomes
        .iter()
        .filter_map(|o| match o {
            QueryOutcome::Partial(r) => Some(r.level),
            QueryOutcome::Failed { .. } => None,
        })
        .collect()
}

// =============================================================================
// Progressive refinement
// =============================================================================

#[tokio::test]
async fn test_three_refinements_in_order() {
    let dataset = Arc::new(ScriptedDataset::new(&[1024, 1024], 20));
    let scheduler = QueryScheduler::new("three-steps", &roomy_config());
    scheduler.start();

    let job_id = scheduler.push_job(job(&dataset, 3)).unwrap();
    let outcomes = drain_until_terminal(&scheduler, DEFAULT_TIMEOUT).await;

    assert_eq!(outcomes.len(), 3);
    assert_eq!(levels(&outcomes), vec![16, 18, 20]);
    for (i, outcome) in outcomes.iter().enumerate() {
        let QueryOutcome::Partial(result) = outcome else {
            panic!("expected partial result, got {outcome:?}");
        };
        assert_eq!(result.job_id, job_id);
        assert_eq!(result.sequence, i);
        assert_eq!(result.running, i < 2);
    }

    scheduler.stop().await;
}

#[tokio::test]
async fn test_single_slot_mailbox_keeps_freshest() {
    let dataset = Arc::new(ScriptedDataset::new(&[1024, 1024], 20));
    let scheduler = QueryScheduler::new("fresh", &EngineConfig::default());
    scheduler.start();

    scheduler.push_job(job(&dataset, 3)).unwrap();
    assert!(wait_until(DEFAULT_TIMEOUT, || scheduler.mailbox().published_count() == 3).await);

    let last = scheduler.pop_result(true).unwrap();
    match last {
        QueryOutcome::Partial(result) => {
            assert_eq!(result.level, 20);
            assert!(!result.running);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert!(scheduler.pop_result(true).is_none());

    scheduler.stop().await;
}

// =============================================================================
// Single flight
// =============================================================================

#[tokio::test]
async fn test_at_most_one_query_in_flight() {
    let dataset = Arc::new(
        ScriptedDataset::new(&[1024, 1024], 20).with_step_delay(Duration::from_millis(10)),
    );
    let scheduler = QueryScheduler::new("single-flight", &roomy_config());
    scheduler.start();

    let mut last_id = 0;
    for _ in 0..10 {
        last_id = scheduler.push_job(job(&dataset, 4)).unwrap();
        tokio::time::sleep(Duration::from_millis(3)).await;
    }

    let outcomes = drain_until_terminal(&scheduler, DEFAULT_TIMEOUT).await;
    let terminal = outcomes.last().unwrap();
    assert_eq!(terminal.job_id(), last_id);
    assert!(terminal.is_terminal());
    assert_eq!(dataset.max_concurrent(), 1);

    scheduler.stop().await;
}

#[tokio::test]
async fn test_aborted_job_publishes_nothing_after_abort() {
    let dataset = Arc::new(
        ScriptedDataset::new(&[1024, 1024], 20).with_step_delay(Duration::from_millis(20)),
    );
    let scheduler = QueryScheduler::new("abort", &roomy_config());
    scheduler.start();

    let first = job(&dataset, 4);
    let token = first.token.clone();
    let first_id = scheduler.push_job(first).unwrap();

    assert!(wait_until(DEFAULT_TIMEOUT, || scheduler.phase() == SchedulerPhase::Running { job_id: first_id }).await);
    token.set_true();
    scheduler.wait_idle().await;
    let published = scheduler.mailbox().published_count();

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(scheduler.mailbox().published_count(), published);
    assert!(published < 4);

    scheduler.stop().await;
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn test_failure_then_recovery() {
    let dataset = Arc::new(ScriptedDataset::new(&[1024, 1024], 20));
    let scheduler = QueryScheduler::new("recover", &roomy_config());
    scheduler.start();

    dataset.fail_next_at(1);
    let failing_id = scheduler.push_job(job(&dataset, 3)).unwrap();
    let outcomes = drain_until_terminal(&scheduler, DEFAULT_TIMEOUT).await;

    assert_eq!(outcomes.len(), 2);
    assert!(matches!(outcomes[0], QueryOutcome::Partial(_)));
    match &outcomes[1] {
        QueryOutcome::Failed { job_id, message } => {
            assert_eq!(*job_id, failing_id);
            assert!(message.contains("scripted failure"));
        }
        other => panic!("expected failure, got {other:?}"),
    }

    scheduler.wait_idle().await;
    assert!(wait_until(DEFAULT_TIMEOUT, || scheduler.phase() == SchedulerPhase::Idle).await);

    let next_id = scheduler.push_job(job(&dataset, 3)).unwrap();
    let outcomes = drain_until_terminal(&scheduler, DEFAULT_TIMEOUT).await;
    assert_eq!(levels(&outcomes), vec![16, 18, 20]);
    assert!(outcomes.iter().all(|o| o.job_id() == next_id));

    scheduler.stop().await;
}

#[tokio::test]
async fn test_stop_then_push_is_rejected() {
    let dataset = Arc::new(ScriptedDataset::new(&[64, 64], 12));
    let scheduler = QueryScheduler::new("stopped", &EngineConfig::default());
    scheduler.start();
    scheduler.stop().await;

    assert!(scheduler.push_job(job(&dataset, 1)).is_err());
    assert_eq!(dataset.query_count(), 0);
}
