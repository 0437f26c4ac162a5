use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use db::repository::workflows as wf_repo;
use engine::store::WorkflowStore;
use validator::{validate_and_compile, CompileReport, ExecutableWorkflow, ValidationContext};

use super::AppState;

/// Validate, compile, and persist a new workflow version. The
/// `ExecutableWorkflow` body carries its own `workflow_id`/`version`; the
/// caller is responsible for bumping `version` between edits.
pub async fn create(
    State(state): State<AppState>,
    Json(payload): Json<ExecutableWorkflow>,
) -> Result<(StatusCode, Json<CompileReport>), (StatusCode, Json<CompileReport>)> {
    let ctx = ValidationContext::default();
    let report = validate_and_compile(&payload, state.catalog.as_ref(), &ctx);

    if !report.ok {
        return Err((StatusCode::UNPROCESSABLE_ENTITY, Json(report)));
    }

    let dag = report.dag.as_ref().expect("ok compile report always carries a dag");
    if let Err(e) = state.store.save_dag(dag).await {
        tracing::error!(error = %e, "failed to persist compiled dag");
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(CompileReport { ok: false, dag: None, errors: Vec::new(), lint: report.lint.clone() }),
        ));
    }

    Ok((StatusCode::CREATED, Json(report)))
}

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<db::models::WorkflowRow>>, StatusCode> {
    wf_repo::list_latest_workflows(&state.pool).await.map(Json).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

pub async fn get_latest(
    Path(workflow_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<db::models::WorkflowRow>, StatusCode> {
    match wf_repo::get_latest_workflow(&state.pool, &workflow_id).await {
        Ok(Some(row)) => Ok(Json(row)),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

pub async fn get_version(
    Path((workflow_id, version)): Path<(String, u32)>,
    State(state): State<AppState>,
) -> Result<Json<db::models::WorkflowRow>, StatusCode> {
    match wf_repo::get_workflow_version(&state.pool, &workflow_id, version as i32).await {
        Ok(Some(row)) => Ok(Json(row)),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}
