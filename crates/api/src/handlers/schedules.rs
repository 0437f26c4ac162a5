use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use scheduler::{CatchupPolicy, OverlapPolicy, Schedule, ScheduleStore, UpsertSchedule};

use super::AppState;

#[derive(serde::Deserialize)]
pub struct UpsertScheduleDto {
    pub workflow_id: String,
    pub version: u32,
    pub user_id: String,
    pub trigger_node_id: String,
    pub cron_expr: String,
    pub timezone: String,
    #[serde(default = "default_catchup")]
    pub catchup_policy: String,
    #[serde(default = "default_overlap")]
    pub overlap_policy: String,
    #[serde(default)]
    pub jitter_ms: u32,
    #[serde(default)]
    pub start_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub end_at: Option<chrono::DateTime<chrono::Utc>>,
}

fn default_catchup() -> String {
    "none".into()
}

fn default_overlap() -> String {
    "allow".into()
}

pub async fn upsert(
    Path(schedule_id): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<UpsertScheduleDto>,
) -> Result<Json<Schedule>, StatusCode> {
    let catchup_policy = CatchupPolicy::parse(&payload.catchup_policy).ok_or(StatusCode::BAD_REQUEST)?;
    let overlap_policy = OverlapPolicy::parse(&payload.overlap_policy).ok_or(StatusCode::BAD_REQUEST)?;

    let schedule = state
        .store
        .upsert_schedule(UpsertSchedule {
            schedule_id,
            workflow_id: payload.workflow_id,
            version: payload.version,
            user_id: payload.user_id,
            trigger_node_id: payload.trigger_node_id,
            cron_expr: payload.cron_expr,
            timezone: payload.timezone,
            catchup_policy,
            overlap_policy,
            jitter_ms: payload.jitter_ms,
            start_at: payload.start_at,
            end_at: payload.end_at,
        })
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(schedule))
}

pub async fn get(Path(schedule_id): Path<String>, State(state): State<AppState>) -> Result<Json<Schedule>, StatusCode> {
    match state.store.get_schedule(&schedule_id).await {
        Ok(Some(schedule)) => Ok(Json(schedule)),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

#[derive(serde::Deserialize)]
pub struct PauseDto {
    pub paused: bool,
}

pub async fn pause(
    Path(schedule_id): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<PauseDto>,
) -> Result<StatusCode, StatusCode> {
    state.store.set_paused(&schedule_id, payload.paused).await.map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete(Path(schedule_id): Path<String>, State(state): State<AppState>) -> Result<StatusCode, StatusCode> {
    state.store.delete_schedule(&schedule_id).await.map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(StatusCode::NO_CONTENT)
}
