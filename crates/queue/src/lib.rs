//! `queue` — hands an activation from the API or scheduler to a worker
//! process via a durable job table.
//!
//! The `JobQueue` trait is owned here and implemented against Postgres by
//! `db`, the same split `scheduler::store` uses for schedules.

pub mod config;
pub mod error;
pub mod model;
pub mod store;
pub mod worker;

pub use config::Config;
pub use error::QueueError;
pub use model::{EnqueueJob, Job, JobStatus};
pub use store::JobQueue;
pub use worker::{process_one, run_forever};

#[cfg(test)]
mod tests;
