//! The `JobQueue` trait: owned here, implemented against Postgres by `db`.
//!
//! Kept as a trait for the same reason `engine::store` and
//! `scheduler::store` are: the worker poll loop has to be exercised in unit
//! tests without a running Postgres instance.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::QueueError;
use crate::model::{EnqueueJob, Job};

#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, job: EnqueueJob) -> Result<Job, QueueError>;

    /// Atomically claim the oldest pending job and mark it `processing`,
    /// incrementing its attempt counter. Returns `None` if nothing is due.
    async fn claim_next(&self) -> Result<Option<Job>, QueueError>;

    async fn complete(&self, job_id: Uuid) -> Result<(), QueueError>;

    /// Mark a claimed job failed. Requeues to `pending` unless `attempts`
    /// has reached `max_attempts`, in which case it's dead-lettered.
    async fn fail(&self, job_id: Uuid) -> Result<(), QueueError>;
}

pub mod memory {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use chrono::Utc;

    use super::*;
    use crate::model::JobStatus;

    /// In-memory `JobQueue`, FIFO by enqueue order. Used by this crate's
    /// own worker-loop tests and by other crates that need a queue double.
    #[derive(Default)]
    pub struct InMemoryJobQueue {
        jobs: Mutex<VecDeque<Job>>,
    }

    impl InMemoryJobQueue {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl JobQueue for InMemoryJobQueue {
        async fn enqueue(&self, job: EnqueueJob) -> Result<Job, QueueError> {
            let now = Utc::now();
            let row = Job {
                id: Uuid::new_v4(),
                run_id: job.run_id,
                workflow_id: job.workflow_id,
                version: job.version,
                user_id: job.user_id,
                trigger_node_id: job.trigger_node_id,
                status: JobStatus::Pending,
                attempts: 0,
                max_attempts: job.max_attempts,
                payload: job.payload,
                created_at: now,
                updated_at: now,
            };
            self.jobs.lock().unwrap().push_back(row.clone());
            Ok(row)
        }

        async fn claim_next(&self) -> Result<Option<Job>, QueueError> {
            let mut jobs = self.jobs.lock().unwrap();
            let pos = jobs.iter().position(|j| j.status == JobStatus::Pending);
            let Some(pos) = pos else { return Ok(None) };
            let job = &mut jobs[pos];
            job.status = JobStatus::Processing;
            job.attempts += 1;
            job.updated_at = Utc::now();
            Ok(Some(job.clone()))
        }

        async fn complete(&self, job_id: Uuid) -> Result<(), QueueError> {
            let mut jobs = self.jobs.lock().unwrap();
            let job = jobs.iter_mut().find(|j| j.id == job_id).ok_or_else(|| QueueError::NotFound(job_id.to_string()))?;
            job.status = JobStatus::Completed;
            job.updated_at = Utc::now();
            Ok(())
        }

        async fn fail(&self, job_id: Uuid) -> Result<(), QueueError> {
            let mut jobs = self.jobs.lock().unwrap();
            let job = jobs.iter_mut().find(|j| j.id == job_id).ok_or_else(|| QueueError::NotFound(job_id.to_string()))?;
            job.status = if job.attempts >= job.max_attempts { JobStatus::DeadLettered } else { JobStatus::Pending };
            job.updated_at = Utc::now();
            Ok(())
        }
    }
}
