//! The worker poll loop: "claim a job, activate the executor, ack or retry."
//!
//! Mirrors `scheduler::tick`'s shape (a pure per-item step wrapped in an
//! interval loop) but pulls from a `JobQueue` instead of enumerating cron
//! fire times.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use engine::models::RunSource;
use engine::store::WorkflowStore;
use engine::{ActivationMeta, Executor};

use crate::config::Config;
use crate::error::QueueError;
use crate::model::Job;
use crate::store::JobQueue;

/// Claim and run a single job, if one is due. Returns `false` when the
/// queue was empty so the caller can back off.
#[instrument(skip(queue, workflow_store, executor))]
pub async fn process_one(
    queue: &dyn JobQueue,
    workflow_store: &dyn WorkflowStore,
    executor: &Executor,
) -> Result<bool, QueueError> {
    let Some(job) = queue.claim_next().await? else { return Ok(false) };
    run_job(queue, workflow_store, executor, job).await?;
    Ok(true)
}

async fn run_job(
    queue: &dyn JobQueue,
    workflow_store: &dyn WorkflowStore,
    executor: &Executor,
    job: Job,
) -> Result<(), QueueError> {
    let dag = workflow_store
        .load_dag(&job.workflow_id, job.version)
        .await
        .map_err(|e| QueueError::Store(e.to_string()))?;

    let Some(dag) = dag else {
        warn!(job_id = %job.id, workflow_id = %job.workflow_id, version = job.version, "no dag stored for job, failing");
        return queue.fail(job.id).await;
    };

    let meta = ActivationMeta { run_id: job.run_id.clone(), user_id: job.user_id.clone(), source: RunSource::Manual };

    match executor.activate(&dag, &job.trigger_node_id, job.payload.clone(), meta).await {
        Ok(outcome) => {
            info!(job_id = %job.id, run_id = %job.run_id, status = ?outcome.status, "job completed");
            queue.complete(job.id).await
        }
        Err(e) => {
            warn!(job_id = %job.id, run_id = %job.run_id, error = %e, "job failed");
            queue.fail(job.id).await
        }
    }
}

/// Poll `queue` forever, sleeping `config.poll_interval` whenever nothing is
/// due. Never returns; the CLI's `worker` subcommand runs this on its own
/// task.
pub async fn run_forever(
    queue: Arc<dyn JobQueue>,
    workflow_store: Arc<dyn WorkflowStore>,
    executor: Arc<Executor>,
    config: Config,
) {
    loop {
        match process_one(queue.as_ref(), workflow_store.as_ref(), &executor).await {
            Ok(true) => continue,
            Ok(false) => tokio::time::sleep(config.poll_interval).await,
            Err(e) => {
                warn!(error = %e, "worker poll failed");
                tokio::time::sleep(config.poll_interval).await;
            }
        }
    }
}
