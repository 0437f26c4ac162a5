use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;

use db::repository::workflows as wf_repo;
use engine::models::NodeKind;
use queue::{EnqueueJob, JobQueue};

use super::AppState;

/// Resolve an opaque webhook delivery to a `trigger_instance_id` and enqueue
/// an activation. `path` is matched against a trigger node's
/// `composio_trigger_slug` across the latest version of every workflow —
/// the core never parses provider-specific payload shape beyond that match.
pub async fn handle_webhook(
    Path(path): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Result<(StatusCode, Json<Value>), StatusCode> {
    let workflows = wf_repo::list_latest_workflows(&state.pool).await.map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let matched = workflows.into_iter().find_map(|row| {
        let dag: engine::models::Dag = serde_json::from_value(row.definition).ok()?;
        let trigger = dag.nodes.iter().find(|n| match &n.kind {
            NodeKind::Trigger(t) => t.composio_trigger_slug.as_deref() == Some(path.as_str()),
            _ => false,
        })?;
        Some((dag.workflow_id.clone(), dag.version, trigger.id.clone()))
    });

    let Some((workflow_id, version, trigger_node_id)) = matched else {
        return Err(StatusCode::NOT_FOUND);
    };

    state
        .store
        .enqueue(EnqueueJob {
            run_id: format!("run-{}", uuid::Uuid::new_v4()),
            workflow_id,
            version,
            user_id: "webhook".into(),
            trigger_node_id,
            max_attempts: 3,
            payload,
        })
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok((StatusCode::ACCEPTED, Json(serde_json::json!({ "status": "accepted" }))))
}
