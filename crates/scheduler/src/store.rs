//! The `ScheduleStore` trait the tick loop depends on.
//!
//! Kept as a trait for the same reason `engine::store` is: the tick loop
//! (catchup math, jitter, overlap policy) is the part worth unit testing,
//! and it should run against an in-memory store without a Postgres fixture.
//! `db` implements this against the `schedules`/`schedule_runs` tables.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::SchedulerError;
use crate::model::{Schedule, ScheduleRunStatus, UpsertSchedule};

#[async_trait]
pub trait ScheduleStore: Send + Sync {
    async fn upsert_schedule(&self, input: UpsertSchedule) -> Result<Schedule, SchedulerError>;
    async fn get_schedule(&self, schedule_id: &str) -> Result<Option<Schedule>, SchedulerError>;
    async fn list_active_schedules(&self) -> Result<Vec<Schedule>, SchedulerError>;
    async fn set_paused(&self, schedule_id: &str, paused: bool) -> Result<(), SchedulerError>;
    async fn delete_schedule(&self, schedule_id: &str) -> Result<(), SchedulerError>;
    async fn advance_last_scheduled_for(
        &self,
        schedule_id: &str,
        scheduled_for: DateTime<Utc>,
    ) -> Result<(), SchedulerError>;

    /// Record a firing keyed by `idem_key`. Returns `false` when a row for
    /// that key already existed (the exactly-once guard tripped).
    async fn record_schedule_run(
        &self,
        schedule_id: &str,
        scheduled_for: DateTime<Utc>,
        run_id: Option<&str>,
        status: ScheduleRunStatus,
        idem_key: &str,
    ) -> Result<bool, SchedulerError>;

    async fn set_schedule_run_status(&self, idem_key: &str, status: ScheduleRunStatus) -> Result<(), SchedulerError>;

    async fn has_in_flight_run(&self, schedule_id: &str) -> Result<bool, SchedulerError>;
}

/// In-memory `ScheduleStore`, used by the tick-loop unit tests.
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct InMemoryScheduleStore {
        schedules: Mutex<HashMap<String, Schedule>>,
        runs: Mutex<HashMap<String, (String, ScheduleRunStatus)>>, // idem_key -> (schedule_id, status)
    }

    impl InMemoryScheduleStore {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl ScheduleStore for InMemoryScheduleStore {
        async fn upsert_schedule(&self, input: UpsertSchedule) -> Result<Schedule, SchedulerError> {
            let schedule = Schedule {
                schedule_id: input.schedule_id.clone(),
                workflow_id: input.workflow_id,
                version: input.version,
                user_id: input.user_id,
                trigger_node_id: input.trigger_node_id,
                cron_expr: input.cron_expr,
                timezone: input.timezone,
                catchup_policy: input.catchup_policy,
                overlap_policy: input.overlap_policy,
                jitter_ms: input.jitter_ms,
                paused: false,
                start_at: input.start_at,
                end_at: input.end_at,
                last_scheduled_for: None,
            };
            self.schedules.lock().unwrap().insert(input.schedule_id, schedule.clone());
            Ok(schedule)
        }

        async fn get_schedule(&self, schedule_id: &str) -> Result<Option<Schedule>, SchedulerError> {
            Ok(self.schedules.lock().unwrap().get(schedule_id).cloned())
        }

        async fn list_active_schedules(&self) -> Result<Vec<Schedule>, SchedulerError> {
            Ok(self.schedules.lock().unwrap().values().filter(|s| !s.paused).cloned().collect())
        }

        async fn set_paused(&self, schedule_id: &str, paused: bool) -> Result<(), SchedulerError> {
            let mut schedules = self.schedules.lock().unwrap();
            let schedule = schedules.get_mut(schedule_id).ok_or_else(|| SchedulerError::NotFound(schedule_id.to_string()))?;
            schedule.paused = paused;
            Ok(())
        }

        async fn delete_schedule(&self, schedule_id: &str) -> Result<(), SchedulerError> {
            self.schedules
                .lock()
                .unwrap()
                .remove(schedule_id)
                .map(|_| ())
                .ok_or_else(|| SchedulerError::NotFound(schedule_id.to_string()))
        }

        async fn advance_last_scheduled_for(
            &self,
            schedule_id: &str,
            scheduled_for: DateTime<Utc>,
        ) -> Result<(), SchedulerError> {
            let mut schedules = self.schedules.lock().unwrap();
            let schedule = schedules.get_mut(schedule_id).ok_or_else(|| SchedulerError::NotFound(schedule_id.to_string()))?;
            schedule.last_scheduled_for = Some(scheduled_for);
            Ok(())
        }

        async fn record_schedule_run(
            &self,
            schedule_id: &str,
            _scheduled_for: DateTime<Utc>,
            _run_id: Option<&str>,
            status: ScheduleRunStatus,
            idem_key: &str,
        ) -> Result<bool, SchedulerError> {
            let mut runs = self.runs.lock().unwrap();
            if runs.contains_key(idem_key) {
                return Ok(false);
            }
            runs.insert(idem_key.to_string(), (schedule_id.to_string(), status));
            Ok(true)
        }

        async fn set_schedule_run_status(&self, idem_key: &str, status: ScheduleRunStatus) -> Result<(), SchedulerError> {
            let mut runs = self.runs.lock().unwrap();
            if let Some(entry) = runs.get_mut(idem_key) {
                entry.1 = status;
            }
            Ok(())
        }

        async fn has_in_flight_run(&self, schedule_id: &str) -> Result<bool, SchedulerError> {
            Ok(self
                .runs
                .lock()
                .unwrap()
                .values()
                .any(|(id, status)| id == schedule_id && matches!(status, ScheduleRunStatus::Enqueued | ScheduleRunStatus::Started)))
        }
    }
}
