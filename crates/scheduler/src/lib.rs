//! `scheduler` crate — the cron/timezone-aware tick loop that fires
//! schedule-based triggers exactly once per scheduled instant and hands the
//! activation off to [`engine::Executor`].
//!
//! Owns the `schedules`/`schedule_runs` persistence concern through the
//! [`store::ScheduleStore`] trait, the same shape as `engine::store` — kept
//! separate from `db` so the tick loop's catchup/overlap/jitter math is
//! unit-testable without Postgres.

pub mod config;
pub mod cron_iter;
pub mod error;
pub mod lease;
pub mod model;
pub mod store;
pub mod tick;

pub use config::Config;
pub use cron_iter::{enumerate_due_times, parse_cron, parse_timezone};
pub use error::SchedulerError;
pub use lease::{AlwaysLeader, LeaderLease};
pub use model::{CatchupPolicy, OverlapPolicy, Schedule, ScheduleRunStatus, UpsertSchedule};
pub use store::ScheduleStore;
pub use tick::{run_forever, run_tick, schedule_idem_key, TickReport};

#[cfg(test)]
mod tests;
