use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;

use db::repository::workflows as wf_repo;
use queue::{EnqueueJob, JobQueue};

use super::AppState;

#[derive(serde::Deserialize)]
pub struct ExecuteWorkflowDto {
    pub user_id: String,
    pub trigger_node_id: String,
    #[serde(default)]
    pub input: Value,
}

/// Manually activate the newest version of a workflow, bypassing its own
/// trigger. Enqueues a job for a worker rather than activating the executor
/// inline, so the HTTP request returns as soon as the activation is durably
/// queued.
pub async fn execute(
    Path(workflow_id): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<ExecuteWorkflowDto>,
) -> Result<(StatusCode, Json<queue::Job>), StatusCode> {
    let latest = wf_repo::get_latest_workflow(&state.pool, &workflow_id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;

    let job = state
        .store
        .enqueue(EnqueueJob {
            run_id: format!("run-{}", uuid::Uuid::new_v4()),
            workflow_id: workflow_id.clone(),
            version: latest.version as u32,
            user_id: payload.user_id,
            trigger_node_id: payload.trigger_node_id,
            max_attempts: 3,
            payload: payload.input,
        })
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok((StatusCode::ACCEPTED, Json(job)))
}
