//! Row structs that map 1-to-1 onto database tables.
//!
//! These are *persistence* models — they carry no domain behaviour.
//! Domain types (the DAG, node kinds, run context) live in the `engine`
//! crate; this crate's job is converting between its rows and `engine`'s
//! `WorkflowStore` / `RunStore` trait types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// workflows (versioned DAG definitions)
// ---------------------------------------------------------------------------

/// One immutable version of a workflow's compiled DAG.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkflowRow {
    pub id: Uuid,
    pub workflow_id: String,
    pub version: i32,
    /// The `engine::Dag` serialized as JSON.
    pub definition: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// runs
// ---------------------------------------------------------------------------

/// A persisted run row, one per workflow activation.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RunRow {
    pub id: Uuid,
    pub run_id: String,
    pub workflow_id: String,
    pub version: i32,
    pub user_id: String,
    pub source: String,
    pub trigger_digest: String,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// node_executions
// ---------------------------------------------------------------------------

/// One (run, node, attempt) execution record.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NodeExecutionRow {
    pub id: Uuid,
    pub run_id: String,
    pub node_id: String,
    pub attempt: i32,
    pub status: String,
    pub output: Option<serde_json::Value>,
    pub error: Option<String>,
    pub idem_key: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// join_arrivals
// ---------------------------------------------------------------------------

/// One predecessor's arrival at a `join` node within a run.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JoinArrivalRow {
    pub id: Uuid,
    pub run_id: String,
    pub join_node_id: String,
    pub from_node_id: String,
    pub arrived_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// secrets
// ---------------------------------------------------------------------------

/// A persisted secret row, referenced by validator-rewritten `secret_ref`
/// placeholders rather than ever appearing in a workflow definition.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SecretRow {
    pub id: Uuid,
    pub workflow_id: String,
    pub key: String,
    /// AES-256 encrypted value (base64-encoded ciphertext).
    pub encrypted_value: String,
}

// ---------------------------------------------------------------------------
// job_queue
// ---------------------------------------------------------------------------

/// Possible statuses for a queued job.
/// A job row fetched from the queue table: one trigger activation waiting
/// for a worker to run it through `engine::Executor`. Status is kept as a
/// plain string here; `queue::model::JobStatus` owns the enum and its
/// `FromStr`/`as_str` mapping, the same split as `ScheduleRow`/`Schedule`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobRow {
    pub id: Uuid,
    pub run_id: String,
    pub workflow_id: String,
    pub version: i32,
    pub user_id: String,
    pub trigger_node_id: String,
    pub status: String,
    pub attempts: i32,
    pub max_attempts: i32,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// schedules
// ---------------------------------------------------------------------------

/// A cron schedule attached to a workflow's schedule-based trigger node.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ScheduleRow {
    pub id: Uuid,
    pub schedule_id: String,
    pub workflow_id: String,
    pub version: i32,
    pub user_id: String,
    pub trigger_node_id: String,
    pub cron_expr: String,
    pub timezone: String,
    pub catchup_policy: String,
    pub overlap_policy: String,
    pub jitter_ms: i32,
    pub paused: bool,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub last_scheduled_for: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// One firing of a [`ScheduleRow`], recorded for catchup/dedup bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ScheduleRunRow {
    pub id: Uuid,
    pub schedule_id: String,
    pub scheduled_for: DateTime<Utc>,
    pub run_id: Option<String>,
    pub status: String,
    pub idem_key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
