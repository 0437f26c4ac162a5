//! Postgres-backed implementations of `engine::{WorkflowStore, RunStore}`.
//!
//! Every `DbError` surfaced by the repository layer is flattened into
//! `EngineError::Store` here — the executor has no compile-time dependency
//! on `sqlx` and shouldn't need one to report a storage failure.

use async_trait::async_trait;
use engine::error::EngineError;
use engine::models::{Dag, NodeStatus, RunSource, RunStatus};
use engine::store::{NodeExecutionRecord, NodeExecutionUpdate, RunRecord, RunStore, WorkflowStore};
use queue::{EnqueueJob, Job, JobQueue, JobStatus, QueueError};
use scheduler::{CatchupPolicy, OverlapPolicy, Schedule, ScheduleRunStatus, ScheduleStore, SchedulerError, UpsertSchedule};

use crate::{repository, DbPool};

/// Shared Postgres-backed store. Implements both `WorkflowStore` and
/// `RunStore`; the CLI hands one `Arc<PgStore>` to the executor for both.
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn store_err(e: crate::DbError) -> EngineError {
    EngineError::Store(e.to_string())
}

fn status_str(status: NodeStatus) -> &'static str {
    match status {
        NodeStatus::Pending => "pending",
        NodeStatus::Running => "running",
        NodeStatus::Done => "done",
        NodeStatus::Error => "error",
        NodeStatus::Skipped => "skipped",
    }
}

fn parse_node_status(s: &str) -> NodeStatus {
    match s {
        "pending" => NodeStatus::Pending,
        "running" => NodeStatus::Running,
        "done" => NodeStatus::Done,
        "error" => NodeStatus::Error,
        _ => NodeStatus::Skipped,
    }
}

fn run_status_str(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Running => "running",
        RunStatus::Success => "success",
        RunStatus::Failed => "failed",
    }
}

fn run_source_str(source: RunSource) -> &'static str {
    match source {
        RunSource::Event => "event",
        RunSource::Schedule => "schedule",
        RunSource::Manual => "manual",
    }
}

#[async_trait]
impl WorkflowStore for PgStore {
    async fn load_dag(&self, workflow_id: &str, version: u32) -> Result<Option<Dag>, EngineError> {
        let row = repository::workflows::get_workflow_version(&self.pool, workflow_id, version as i32)
            .await
            .map_err(store_err)?;
        match row {
            Some(row) => {
                let dag: Dag = serde_json::from_value(row.definition)
                    .map_err(|e| EngineError::Store(format!("corrupt dag row: {e}")))?;
                Ok(Some(dag))
            }
            None => Ok(None),
        }
    }

    async fn save_dag(&self, dag: &Dag) -> Result<(), EngineError> {
        let definition = serde_json::to_value(dag)
            .map_err(|e| EngineError::Store(format!("cannot serialize dag: {e}")))?;
        repository::workflows::insert_workflow_version(
            &self.pool,
            &dag.workflow_id,
            dag.version as i32,
            definition,
        )
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn list_versions(&self, workflow_id: &str) -> Result<Vec<u32>, EngineError> {
        let versions = repository::workflows::list_workflow_versions(&self.pool, workflow_id)
            .await
            .map_err(store_err)?;
        Ok(versions.into_iter().map(|v| v as u32).collect())
    }
}

#[async_trait]
impl RunStore for PgStore {
    async fn create_run(&self, run: &RunRecord) -> Result<(), EngineError> {
        repository::runs::create_run(
            &self.pool,
            &run.run_id,
            &run.workflow_id,
            run.version as i32,
            &run.user_id,
            run_source_str(run.source),
            &run.trigger_digest,
            run.started_at,
        )
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn set_run_status(&self, run_id: &str, status: RunStatus) -> Result<(), EngineError> {
        repository::runs::set_run_status(&self.pool, run_id, run_status_str(status))
            .await
            .map_err(store_err)
    }

    async fn update_node_execution(&self, update: NodeExecutionUpdate) -> Result<(), EngineError> {
        let output = update.output.clone();
        repository::runs::upsert_node_execution(
            &self.pool,
            &update.run_id,
            &update.node_id,
            update.attempt as i32,
            status_str(update.status),
            output,
            update.error.as_deref(),
            &update.idem_key,
            update.started_at,
            update.finished_at,
        )
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn record_join_arrival(
        &self,
        run_id: &str,
        join_node_id: &str,
        from_node_id: &str,
    ) -> Result<(), EngineError> {
        repository::join_arrivals::record_arrival(&self.pool, run_id, join_node_id, from_node_id)
            .await
            .map_err(store_err)
    }

    async fn join_arrivals(&self, run_id: &str, join_node_id: &str) -> Result<Vec<String>, EngineError> {
        repository::join_arrivals::arrivals(&self.pool, run_id, join_node_id)
            .await
            .map_err(store_err)
    }

    async fn load_node_executions(&self, run_id: &str) -> Result<Vec<NodeExecutionRecord>, EngineError> {
        let rows = repository::runs::list_node_executions(&self.pool, run_id)
            .await
            .map_err(store_err)?;
        Ok(rows
            .into_iter()
            .map(|r| NodeExecutionRecord {
                node_id: r.node_id,
                attempt: r.attempt as u32,
                status: parse_node_status(&r.status),
                output: r.output,
                idem_key: r.idem_key,
            })
            .collect())
    }
}

fn schedule_store_err(e: crate::DbError) -> SchedulerError {
    SchedulerError::Store(e.to_string())
}

fn schedule_row_to_model(row: crate::models::ScheduleRow) -> Schedule {
    Schedule {
        schedule_id: row.schedule_id,
        workflow_id: row.workflow_id,
        version: row.version as u32,
        user_id: row.user_id,
        trigger_node_id: row.trigger_node_id,
        cron_expr: row.cron_expr,
        timezone: row.timezone,
        catchup_policy: CatchupPolicy::parse(&row.catchup_policy).unwrap_or(CatchupPolicy::None),
        overlap_policy: OverlapPolicy::parse(&row.overlap_policy).unwrap_or(OverlapPolicy::Allow),
        jitter_ms: row.jitter_ms as u32,
        paused: row.paused,
        start_at: row.start_at,
        end_at: row.end_at,
        last_scheduled_for: row.last_scheduled_for,
    }
}

fn schedule_run_status_str(status: ScheduleRunStatus) -> &'static str {
    status.as_str()
}

#[async_trait]
impl ScheduleStore for PgStore {
    async fn upsert_schedule(&self, input: UpsertSchedule) -> Result<Schedule, SchedulerError> {
        let row = repository::schedules::upsert_schedule(
            &self.pool,
            &input.schedule_id,
            &input.workflow_id,
            input.version as i32,
            &input.user_id,
            &input.trigger_node_id,
            &input.cron_expr,
            &input.timezone,
            input.catchup_policy.as_str(),
            input.overlap_policy.as_str(),
            input.jitter_ms as i32,
            input.start_at,
            input.end_at,
        )
        .await
        .map_err(schedule_store_err)?;
        Ok(schedule_row_to_model(row))
    }

    async fn get_schedule(&self, schedule_id: &str) -> Result<Option<Schedule>, SchedulerError> {
        let row = repository::schedules::get_schedule(&self.pool, schedule_id)
            .await
            .map_err(schedule_store_err)?;
        Ok(row.map(schedule_row_to_model))
    }

    async fn list_active_schedules(&self) -> Result<Vec<Schedule>, SchedulerError> {
        let rows = repository::schedules::list_active_schedules(&self.pool)
            .await
            .map_err(schedule_store_err)?;
        Ok(rows.into_iter().map(schedule_row_to_model).collect())
    }

    async fn set_paused(&self, schedule_id: &str, paused: bool) -> Result<(), SchedulerError> {
        repository::schedules::set_paused(&self.pool, schedule_id, paused)
            .await
            .map_err(schedule_store_err)
    }

    async fn delete_schedule(&self, schedule_id: &str) -> Result<(), SchedulerError> {
        repository::schedules::delete_schedule(&self.pool, schedule_id)
            .await
            .map_err(schedule_store_err)
    }

    async fn advance_last_scheduled_for(
        &self,
        schedule_id: &str,
        scheduled_for: chrono::DateTime<chrono::Utc>,
    ) -> Result<(), SchedulerError> {
        repository::schedules::advance_last_scheduled_for(&self.pool, schedule_id, scheduled_for)
            .await
            .map_err(schedule_store_err)
    }

    async fn record_schedule_run(
        &self,
        schedule_id: &str,
        scheduled_for: chrono::DateTime<chrono::Utc>,
        run_id: Option<&str>,
        status: ScheduleRunStatus,
        idem_key: &str,
    ) -> Result<bool, SchedulerError> {
        let row = repository::schedules::record_schedule_run(
            &self.pool,
            schedule_id,
            scheduled_for,
            run_id,
            schedule_run_status_str(status),
            idem_key,
        )
        .await
        .map_err(schedule_store_err)?;
        Ok(row.is_some())
    }

    async fn set_schedule_run_status(&self, idem_key: &str, status: ScheduleRunStatus) -> Result<(), SchedulerError> {
        repository::schedules::set_schedule_run_status(&self.pool, idem_key, schedule_run_status_str(status))
            .await
            .map_err(schedule_store_err)
    }

    async fn has_in_flight_run(&self, schedule_id: &str) -> Result<bool, SchedulerError> {
        repository::schedules::has_in_flight_run(&self.pool, schedule_id)
            .await
            .map_err(schedule_store_err)
    }
}

fn queue_store_err(e: crate::DbError) -> QueueError {
    QueueError::Store(e.to_string())
}

fn job_row_to_model(row: crate::models::JobRow) -> Result<Job, QueueError> {
    Ok(Job {
        id: row.id,
        run_id: row.run_id,
        workflow_id: row.workflow_id,
        version: row.version as u32,
        user_id: row.user_id,
        trigger_node_id: row.trigger_node_id,
        status: JobStatus::parse(&row.status)?,
        attempts: row.attempts as u32,
        max_attempts: row.max_attempts as u32,
        payload: row.payload,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

#[async_trait]
impl JobQueue for PgStore {
    async fn enqueue(&self, job: EnqueueJob) -> Result<Job, QueueError> {
        let row = repository::jobs::enqueue_job(
            &self.pool,
            &job.run_id,
            &job.workflow_id,
            job.version as i32,
            &job.user_id,
            &job.trigger_node_id,
            job.max_attempts as i32,
            job.payload,
        )
        .await
        .map_err(queue_store_err)?;
        job_row_to_model(row)
    }

    async fn claim_next(&self) -> Result<Option<Job>, QueueError> {
        let row = repository::jobs::fetch_next_job(&self.pool).await.map_err(queue_store_err)?;
        let Some(mut row) = row else { return Ok(None) };
        // `fetch_next_job` returns the pre-update row; the UPDATE that runs
        // inside it bumps these two columns, so mirror that here too.
        row.status = "processing".to_string();
        row.attempts += 1;
        Ok(Some(job_row_to_model(row)?))
    }

    async fn complete(&self, job_id: uuid::Uuid) -> Result<(), QueueError> {
        repository::jobs::complete_job(&self.pool, job_id).await.map_err(queue_store_err)
    }

    async fn fail(&self, job_id: uuid::Uuid) -> Result<(), QueueError> {
        let row = repository::jobs::get_job(&self.pool, job_id)
            .await
            .map_err(queue_store_err)?
            .ok_or_else(|| QueueError::NotFound(job_id.to_string()))?;
        repository::jobs::fail_job(&self.pool, job_id, row.max_attempts).await.map_err(queue_store_err)
    }
}
