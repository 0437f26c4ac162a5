//! The `WorkflowStore` and `RunStore` traits the executor depends on.
//!
//! Kept as traits (rather than a direct dependency on the `db` crate, as the
//! teacher's executor originally had) so the dispatch loop can be exercised
//! in unit tests without Postgres — the teacher's own test comments flagged
//! exactly this as the thing standing between them and a real in-process
//! test of `WorkflowExecutor::run`. `db` implements both traits against
//! Postgres; the CLI wires the concrete store into the executor at startup.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::EngineError;
use crate::models::{Dag, NodeStatus, RunSource, RunStatus};

/// Persists and retrieves versioned workflow DAGs.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    async fn load_dag(&self, workflow_id: &str, version: u32) -> Result<Option<Dag>, EngineError>;
    async fn save_dag(&self, dag: &Dag) -> Result<(), EngineError>;
    async fn list_versions(&self, workflow_id: &str) -> Result<Vec<u32>, EngineError>;
}

/// A run row as the executor wants to persist it.
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub run_id: String,
    pub workflow_id: String,
    pub version: u32,
    pub user_id: String,
    pub source: RunSource,
    pub trigger_digest: String,
    pub started_at: DateTime<Utc>,
}

/// One node-execution attempt update. `attempt` is 1-indexed; the logical
/// "current attempt" for `(run_id, node_id)` is the max recorded.
#[derive(Debug, Clone)]
pub struct NodeExecutionUpdate {
    pub run_id: String,
    pub node_id: String,
    pub attempt: u32,
    pub status: NodeStatus,
    pub output: Option<Value>,
    pub error: Option<String>,
    pub idem_key: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// A previously recorded node execution, used to resume a run after a
/// worker takes over an abandoned lease.
#[derive(Debug, Clone)]
pub struct NodeExecutionRecord {
    pub node_id: String,
    pub attempt: u32,
    pub status: NodeStatus,
    pub output: Option<Value>,
    pub idem_key: String,
}

/// Persists runs, node executions, and join arrivals.
#[async_trait]
pub trait RunStore: Send + Sync {
    async fn create_run(&self, run: &RunRecord) -> Result<(), EngineError>;
    async fn set_run_status(&self, run_id: &str, status: RunStatus) -> Result<(), EngineError>;
    async fn update_node_execution(&self, update: NodeExecutionUpdate) -> Result<(), EngineError>;
    async fn record_join_arrival(
        &self,
        run_id: &str,
        join_node_id: &str,
        from_node_id: &str,
    ) -> Result<(), EngineError>;
    async fn join_arrivals(&self, run_id: &str, join_node_id: &str) -> Result<Vec<String>, EngineError>;
    async fn load_node_executions(&self, run_id: &str) -> Result<Vec<NodeExecutionRecord>, EngineError>;
}

/// An in-memory `RunStore` + `WorkflowStore`, used by unit tests and the
/// single-process CLI mode. Not durable across restarts.
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct InMemoryStore {
        dags: Mutex<HashMap<(String, u32), Dag>>,
        runs: Mutex<HashMap<String, RunStatus>>,
        node_executions: Mutex<HashMap<String, Vec<NodeExecutionRecord>>>,
        join_arrivals: Mutex<HashMap<(String, String), Vec<String>>>,
    }

    impl InMemoryStore {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl WorkflowStore for InMemoryStore {
        async fn load_dag(&self, workflow_id: &str, version: u32) -> Result<Option<Dag>, EngineError> {
            Ok(self.dags.lock().unwrap().get(&(workflow_id.to_string(), version)).cloned())
        }

        async fn save_dag(&self, dag: &Dag) -> Result<(), EngineError> {
            self.dags
                .lock()
                .unwrap()
                .insert((dag.workflow_id.clone(), dag.version), dag.clone());
            Ok(())
        }

        async fn list_versions(&self, workflow_id: &str) -> Result<Vec<u32>, EngineError> {
            let mut versions: Vec<u32> = self
                .dags
                .lock()
                .unwrap()
                .keys()
                .filter(|(id, _)| id == workflow_id)
                .map(|(_, v)| *v)
                .collect();
            versions.sort_unstable();
            Ok(versions)
        }
    }

    #[async_trait]
    impl RunStore for InMemoryStore {
        async fn create_run(&self, run: &RunRecord) -> Result<(), EngineError> {
            self.runs.lock().unwrap().insert(run.run_id.clone(), RunStatus::Running);
            self.node_executions.lock().unwrap().entry(run.run_id.clone()).or_default();
            Ok(())
        }

        async fn set_run_status(&self, run_id: &str, status: RunStatus) -> Result<(), EngineError> {
            self.runs.lock().unwrap().insert(run_id.to_string(), status);
            Ok(())
        }

        async fn update_node_execution(&self, update: NodeExecutionUpdate) -> Result<(), EngineError> {
            let mut executions = self.node_executions.lock().unwrap();
            let list = executions.entry(update.run_id.clone()).or_default();
            let record = NodeExecutionRecord {
                node_id: update.node_id.clone(),
                attempt: update.attempt,
                status: update.status,
                output: update.output.clone(),
                idem_key: update.idem_key.clone(),
            };
            if let Some(existing) = list
                .iter_mut()
                .find(|r| r.node_id == update.node_id && r.attempt == update.attempt)
            {
                *existing = record;
            } else {
                list.push(record);
            }
            Ok(())
        }

        async fn record_join_arrival(
            &self,
            run_id: &str,
            join_node_id: &str,
            from_node_id: &str,
        ) -> Result<(), EngineError> {
            let mut arrivals = self.join_arrivals.lock().unwrap();
            let list = arrivals
                .entry((run_id.to_string(), join_node_id.to_string()))
                .or_default();
            if !list.contains(&from_node_id.to_string()) {
                list.push(from_node_id.to_string());
            }
            Ok(())
        }

        async fn join_arrivals(&self, run_id: &str, join_node_id: &str) -> Result<Vec<String>, EngineError> {
            Ok(self
                .join_arrivals
                .lock()
                .unwrap()
                .get(&(run_id.to_string(), join_node_id.to_string()))
                .cloned()
                .unwrap_or_default())
        }

        async fn load_node_executions(&self, run_id: &str) -> Result<Vec<NodeExecutionRecord>, EngineError> {
            Ok(self.node_executions.lock().unwrap().get(run_id).cloned().unwrap_or_default())
        }
    }
}
