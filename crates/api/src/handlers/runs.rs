use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use db::repository::runs as run_repo;

use super::AppState;

#[derive(serde::Serialize)]
pub struct RunDetail {
    pub run: db::models::RunRow,
    pub node_executions: Vec<db::models::NodeExecutionRow>,
}

pub async fn get(Path(run_id): Path<String>, State(state): State<AppState>) -> Result<Json<RunDetail>, StatusCode> {
    let run = run_repo::get_run(&state.pool, &run_id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;
    let node_executions =
        run_repo::list_node_executions(&state.pool, &run_id).await.map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(RunDetail { run, node_executions }))
}
