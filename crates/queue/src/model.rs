use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::QueueError;

/// Terminal and in-flight states of one queued activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    DeadLettered,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::DeadLettered => "dead_lettered",
        }
    }

    pub fn parse(s: &str) -> Result<Self, QueueError> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "dead_lettered" => Ok(Self::DeadLettered),
            other => Err(QueueError::Store(format!("unknown job status '{other}'"))),
        }
    }
}

/// Input to [`crate::JobQueue::enqueue`]: one trigger activation waiting for
/// a worker to run it through `engine::Executor`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnqueueJob {
    pub run_id: String,
    pub workflow_id: String,
    pub version: u32,
    pub user_id: String,
    pub trigger_node_id: String,
    pub max_attempts: u32,
    pub payload: Value,
}

/// A job as claimed by a worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub run_id: String,
    pub workflow_id: String,
    pub version: u32,
    pub user_id: String,
    pub trigger_node_id: String,
    pub status: JobStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
