//! The tick loop: "keep time; fire schedule-based triggers exactly once per
//! scheduled instant; hand off to the executor."
//!
//! One call to [`run_tick`] scans every active schedule, enumerates fire
//! times due within the lookahead window, applies catchup/overlap/jitter
//! policy, and activates the executor for each surviving fire time. State is
//! committed to the schedule store before any side effect that can't be
//! undone, so a crash mid-tick leaves nothing double-fired: the exactly-once
//! guard is the `idem_key` uniqueness constraint, not careful ordering here.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{info, instrument, warn};

use engine::store::WorkflowStore;
use engine::{ActivationMeta, Executor};

use crate::cron_iter::enumerate_due_times;
use crate::error::SchedulerError;
use crate::model::{OverlapPolicy, Schedule, ScheduleRunStatus};
use crate::store::ScheduleStore;
use crate::Config;

/// Deterministic idempotency key for one `(schedule_id, run_at)` pair —
/// the sole exactly-once guard against duplicate emission on restart or
/// concurrent scan.
pub fn schedule_idem_key(schedule_id: &str, run_at: DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(schedule_id.as_bytes());
    hasher.update(b":");
    hasher.update(run_at.timestamp().to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// What one tick actually did, for logging/tests.
#[derive(Debug, Default, Clone)]
pub struct TickReport {
    pub fired: Vec<(String, DateTime<Utc>)>,
    pub skipped: Vec<(String, DateTime<Utc>)>,
    pub failed: Vec<(String, DateTime<Utc>, String)>,
}

/// Run a single tick against every active schedule.
#[instrument(skip(schedule_store, workflow_store, executor, config))]
pub async fn run_tick(
    schedule_store: &dyn ScheduleStore,
    workflow_store: &dyn WorkflowStore,
    executor: &Executor,
    config: &Config,
) -> Result<TickReport, SchedulerError> {
    let now = Utc::now();
    let mut report = TickReport::default();

    for schedule in schedule_store.list_active_schedules().await? {
        if let Err(e) = run_schedule_tick(schedule_store, workflow_store, executor, config, &schedule, now, &mut report).await {
            warn!(schedule_id = %schedule.schedule_id, error = %e, "schedule tick failed");
        }
    }

    Ok(report)
}

async fn run_schedule_tick(
    schedule_store: &dyn ScheduleStore,
    workflow_store: &dyn WorkflowStore,
    executor: &Executor,
    config: &Config,
    schedule: &Schedule,
    now: DateTime<Utc>,
    report: &mut TickReport,
) -> Result<(), SchedulerError> {
    if let Some(start_at) = schedule.start_at {
        if start_at > now {
            return Ok(());
        }
    }

    let due_times = enumerate_due_times(&schedule.cron_expr, &schedule.timezone, now, schedule.last_scheduled_for, config.lookahead)?;
    if due_times.is_empty() {
        return Ok(());
    }

    let due_times = apply_catchup(&schedule.catchup_policy, due_times, now, config.max_catchup_per_tick, &schedule.schedule_id);

    for run_at in due_times {
        if matches!(schedule.overlap_policy, OverlapPolicy::Skip) && schedule_store.has_in_flight_run(&schedule.schedule_id).await? {
            let idem = schedule_idem_key(&schedule.schedule_id, run_at);
            schedule_store
                .record_schedule_run(&schedule.schedule_id, run_at, None, ScheduleRunStatus::Skipped, &idem)
                .await?;
            report.skipped.push((schedule.schedule_id.clone(), run_at));
            schedule_store.advance_last_scheduled_for(&schedule.schedule_id, run_at).await?;
            continue;
        }
        if matches!(schedule.overlap_policy, OverlapPolicy::Queue) && schedule_store.has_in_flight_run(&schedule.schedule_id).await? {
            // Defer the remaining fire times in this tick to the next tick.
            break;
        }

        fire_one(schedule_store, workflow_store, executor, schedule, run_at, schedule.jitter_ms, report).await?;
        schedule_store.advance_last_scheduled_for(&schedule.schedule_id, run_at).await?;
    }

    Ok(())
}

/// `catchup_policy=none` drops every due time already in the past, keeping
/// only the ones still `>= now` (so a schedule that missed several fires
/// while down emits none of them, just whatever is next); `fire_immediately`
/// emits all of them; `spread` caps emission at `max_per_tick`, carrying the
/// remainder to the next tick.
fn apply_catchup(
    policy: &crate::model::CatchupPolicy,
    mut due_times: Vec<DateTime<Utc>>,
    now: DateTime<Utc>,
    max_per_tick: u32,
    schedule_id: &str,
) -> Vec<DateTime<Utc>> {
    use crate::model::CatchupPolicy::*;
    due_times.sort_unstable();

    match policy {
        None => {
            let future_or_latest = due_times.into_iter().filter(|t| *t >= now).collect::<Vec<_>>();
            if future_or_latest.is_empty() {
                Vec::new()
            } else {
                future_or_latest
            }
        }
        FireImmediately => due_times,
        Spread => {
            if due_times.len() as u32 > max_per_tick {
                warn!(schedule_id, overflow = due_times.len() as u32 - max_per_tick, "catchup spread overflow, carrying to next tick");
                due_times.truncate(max_per_tick as usize);
            }
            due_times
        }
    }
}

async fn fire_one(
    schedule_store: &dyn ScheduleStore,
    workflow_store: &dyn WorkflowStore,
    executor: &Executor,
    schedule: &Schedule,
    run_at: DateTime<Utc>,
    jitter_ms: u32,
    report: &mut TickReport,
) -> Result<(), SchedulerError> {
    let idem = schedule_idem_key(&schedule.schedule_id, run_at);

    if jitter_ms > 0 {
        let delta = rand::thread_rng().gen_range(0..=jitter_ms);
        tokio::time::sleep(std::time::Duration::from_millis(delta as u64)).await;
    }

    let run_id = format!("run-{}", uuid::Uuid::new_v4());
    let dag = workflow_store
        .load_dag(&schedule.workflow_id, schedule.version)
        .await
        .map_err(|e| SchedulerError::Store(e.to_string()))?;
    let Some(dag) = dag else {
        let err = format!("no dag stored for workflow '{}' version {}", schedule.workflow_id, schedule.version);
        schedule_store
            .record_schedule_run(&schedule.schedule_id, run_at, None, ScheduleRunStatus::Failed, &idem)
            .await?;
        report.failed.push((schedule.schedule_id.clone(), run_at, err.clone()));
        return Err(SchedulerError::EnqueueFailure { schedule_id: schedule.schedule_id.clone(), run_at, message: err });
    };

    let recorded = schedule_store
        .record_schedule_run(&schedule.schedule_id, run_at, Some(&run_id), ScheduleRunStatus::Enqueued, &idem)
        .await?;
    if !recorded {
        // Already recorded by a previous tick/instance for this exact instant.
        return Ok(());
    }

    let payload = json!({ "fired_at": run_at });
    let meta = ActivationMeta { run_id: run_id.clone(), user_id: schedule.user_id.clone(), source: engine::models::RunSource::Schedule };

    match executor.activate(&dag, &schedule.trigger_node_id, payload, meta).await {
        Ok(outcome) => {
            let status = match outcome.status {
                engine::models::RunStatus::Success => ScheduleRunStatus::Success,
                _ => ScheduleRunStatus::Failed,
            };
            schedule_store.set_schedule_run_status(&idem, status).await?;
            report.fired.push((schedule.schedule_id.clone(), run_at));
            info!(schedule_id = %schedule.schedule_id, run_id = %run_id, %run_at, "schedule fired");
            Ok(())
        }
        Err(e) => {
            schedule_store.set_schedule_run_status(&idem, ScheduleRunStatus::Failed).await?;
            report.failed.push((schedule.schedule_id.clone(), run_at, e.to_string()));
            Err(SchedulerError::EnqueueFailure { schedule_id: schedule.schedule_id.clone(), run_at, message: e.to_string() })
        }
    }
}

/// Wraps [`run_tick`] in a `tokio::time::interval` loop, contesting the
/// supplied [`crate::lease::LeaderLease`] before every tick.
pub async fn run_forever(
    schedule_store: Arc<dyn ScheduleStore>,
    workflow_store: Arc<dyn WorkflowStore>,
    executor: Arc<Executor>,
    lease: Arc<dyn crate::lease::LeaderLease>,
    config: Config,
) {
    let mut ticker = tokio::time::interval(config.tick_interval);
    loop {
        ticker.tick().await;
        if !lease.acquire().await {
            continue;
        }
        match run_tick(schedule_store.as_ref(), workflow_store.as_ref(), &executor, &config).await {
            Ok(report) if !report.fired.is_empty() || !report.skipped.is_empty() || !report.failed.is_empty() => {
                info!(fired = report.fired.len(), skipped = report.skipped.len(), failed = report.failed.len(), "tick complete");
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "tick failed"),
        }
    }
}
