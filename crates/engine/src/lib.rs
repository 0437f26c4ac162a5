//! `engine` crate — the DAG data model, graph validation, and the dispatch
//! loop that runs one activation of a workflow to completion.

pub mod dag;
pub mod error;
pub mod executor;
pub mod idempotency;
pub mod models;
pub mod render;
pub mod retry;
pub mod store;

pub use dag::{validate_graph, DagIndex};
pub use error::EngineError;
pub use executor::{ActivationMeta, Executor, ExecutorConfig, RunOutcome};
pub use models::{Dag, Edge, Node, NodeKind};
