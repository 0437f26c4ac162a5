//! Schedule and schedule-run data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What to do with fire times missed while the scheduler was down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatchupPolicy {
    /// Drop everything before the most recent fire time.
    None,
    /// Emit every missed fire time immediately, oldest first.
    FireImmediately,
    /// Emit missed fire times one per tick, bounded by `MAX_CATCHUP_PER_TICK`.
    Spread,
}

impl CatchupPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CatchupPolicy::None => "none",
            CatchupPolicy::FireImmediately => "fire_immediately",
            CatchupPolicy::Spread => "spread",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "none" => Some(CatchupPolicy::None),
            "fire_immediately" => Some(CatchupPolicy::FireImmediately),
            "spread" => Some(CatchupPolicy::Spread),
            _ => None,
        }
    }
}

/// What to do when a schedule's previous run is still in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// Start anyway, no ordering imposed.
    Allow,
    /// Skip this firing, recording `SKIPPED`.
    Skip,
    /// Defer the remaining fire times in this tick to the next tick.
    Queue,
}

impl OverlapPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverlapPolicy::Allow => "allow",
            OverlapPolicy::Skip => "skip",
            OverlapPolicy::Queue => "queue",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "allow" => Some(OverlapPolicy::Allow),
            "skip" => Some(OverlapPolicy::Skip),
            "queue" => Some(OverlapPolicy::Queue),
            _ => None,
        }
    }
}

/// Terminal and in-flight states of one `schedule_runs` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScheduleRunStatus {
    Enqueued,
    Started,
    Success,
    Failed,
    Skipped,
}

impl ScheduleRunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleRunStatus::Enqueued => "ENQUEUED",
            ScheduleRunStatus::Started => "STARTED",
            ScheduleRunStatus::Success => "SUCCESS",
            ScheduleRunStatus::Failed => "FAILED",
            ScheduleRunStatus::Skipped => "SKIPPED",
        }
    }
}

/// One schedule as loaded from the store, independent of the column
/// encoding the store chooses for `catchup_policy`/`overlap_policy`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub schedule_id: String,
    pub workflow_id: String,
    pub version: u32,
    pub user_id: String,
    pub trigger_node_id: String,
    pub cron_expr: String,
    pub timezone: String,
    pub catchup_policy: CatchupPolicy,
    pub overlap_policy: OverlapPolicy,
    pub jitter_ms: u32,
    pub paused: bool,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub last_scheduled_for: Option<DateTime<Utc>>,
}

/// Input to `upsert_schedule`.
#[derive(Debug, Clone)]
pub struct UpsertSchedule {
    pub schedule_id: String,
    pub workflow_id: String,
    pub version: u32,
    pub user_id: String,
    pub trigger_node_id: String,
    pub cron_expr: String,
    pub timezone: String,
    pub catchup_policy: CatchupPolicy,
    pub overlap_policy: OverlapPolicy,
    pub jitter_ms: u32,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
}
