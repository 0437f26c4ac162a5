pub mod executions;
pub mod runs;
pub mod schedules;
pub mod validate;
pub mod webhooks;
pub mod workflows;

pub(crate) use crate::AppState;
