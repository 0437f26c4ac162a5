//! Schedule and schedule-run repository functions.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    models::{ScheduleRow, ScheduleRunRow},
    DbError,
};

/// Create or replace a schedule (keyed by `schedule_id`).
#[allow(clippy::too_many_arguments)]
pub async fn upsert_schedule(
    pool: &PgPool,
    schedule_id: &str,
    workflow_id: &str,
    version: i32,
    user_id: &str,
    trigger_node_id: &str,
    cron_expr: &str,
    timezone: &str,
    catchup_policy: &str,
    overlap_policy: &str,
    jitter_ms: i32,
    start_at: Option<DateTime<Utc>>,
    end_at: Option<DateTime<Utc>>,
) -> Result<ScheduleRow, DbError> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    let row = sqlx::query_as!(
        ScheduleRow,
        r#"
        INSERT INTO schedules
            (id, schedule_id, workflow_id, version, user_id, trigger_node_id, cron_expr, timezone,
             catchup_policy, overlap_policy, jitter_ms, paused, start_at, end_at, last_scheduled_for, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, false, $12, $13, NULL, $14)
        ON CONFLICT (schedule_id) DO UPDATE
        SET workflow_id = EXCLUDED.workflow_id,
            version = EXCLUDED.version,
            user_id = EXCLUDED.user_id,
            trigger_node_id = EXCLUDED.trigger_node_id,
            cron_expr = EXCLUDED.cron_expr,
            timezone = EXCLUDED.timezone,
            catchup_policy = EXCLUDED.catchup_policy,
            overlap_policy = EXCLUDED.overlap_policy,
            jitter_ms = EXCLUDED.jitter_ms,
            start_at = EXCLUDED.start_at,
            end_at = EXCLUDED.end_at
        RETURNING id, schedule_id, workflow_id, version, user_id, trigger_node_id, cron_expr, timezone,
                  catchup_policy, overlap_policy, jitter_ms, paused, start_at, end_at, last_scheduled_for, created_at
        "#,
        id,
        schedule_id,
        workflow_id,
        version,
        user_id,
        trigger_node_id,
        cron_expr,
        timezone,
        catchup_policy,
        overlap_policy,
        jitter_ms,
        start_at,
        end_at,
        now,
    )
    .fetch_one(pool)
    .await?;

    Ok(row)
}

pub async fn get_schedule(pool: &PgPool, schedule_id: &str) -> Result<Option<ScheduleRow>, DbError> {
    let row = sqlx::query_as!(
        ScheduleRow,
        r#"SELECT id, schedule_id, workflow_id, version, user_id, trigger_node_id, cron_expr, timezone,
                  catchup_policy, overlap_policy, jitter_ms, paused, start_at, end_at, last_scheduled_for, created_at
           FROM schedules WHERE schedule_id = $1"#,
        schedule_id,
    )
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Every non-paused schedule whose window covers `now`, used by the
/// scheduler's tick loop.
pub async fn list_active_schedules(pool: &PgPool) -> Result<Vec<ScheduleRow>, DbError> {
    let rows = sqlx::query_as!(
        ScheduleRow,
        r#"SELECT id, schedule_id, workflow_id, version, user_id, trigger_node_id, cron_expr, timezone,
                  catchup_policy, overlap_policy, jitter_ms, paused, start_at, end_at, last_scheduled_for, created_at
           FROM schedules
           WHERE paused = false AND (end_at IS NULL OR end_at >= now())"#,
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn set_paused(pool: &PgPool, schedule_id: &str, paused: bool) -> Result<(), DbError> {
    let result = sqlx::query!(
        "UPDATE schedules SET paused = $1 WHERE schedule_id = $2",
        paused,
        schedule_id,
    )
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

pub async fn delete_schedule(pool: &PgPool, schedule_id: &str) -> Result<(), DbError> {
    let result = sqlx::query!("DELETE FROM schedules WHERE schedule_id = $1", schedule_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

pub async fn advance_last_scheduled_for(
    pool: &PgPool,
    schedule_id: &str,
    scheduled_for: DateTime<Utc>,
) -> Result<(), DbError> {
    sqlx::query!(
        "UPDATE schedules SET last_scheduled_for = $1 WHERE schedule_id = $2",
        scheduled_for,
        schedule_id,
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// Record a schedule firing. Idempotent on `idem_key`: returns `Ok(None)`
/// when the firing was already recorded (catchup re-run, overlapping tick).
pub async fn record_schedule_run(
    pool: &PgPool,
    schedule_id: &str,
    scheduled_for: DateTime<Utc>,
    run_id: Option<&str>,
    status: &str,
    idem_key: &str,
) -> Result<Option<ScheduleRunRow>, DbError> {
    let now = Utc::now();
    let row = sqlx::query_as!(
        ScheduleRunRow,
        r#"
        INSERT INTO schedule_runs (id, schedule_id, scheduled_for, run_id, status, idem_key, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
        ON CONFLICT (idem_key) DO NOTHING
        RETURNING id, schedule_id, scheduled_for, run_id, status, idem_key, created_at, updated_at
        "#,
        Uuid::new_v4(),
        schedule_id,
        scheduled_for,
        run_id,
        status,
        idem_key,
        now,
    )
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Transition a previously recorded firing, e.g. `ENQUEUED` → `SUCCESS`/`FAILED`.
pub async fn set_schedule_run_status(pool: &PgPool, idem_key: &str, status: &str) -> Result<(), DbError> {
    let result = sqlx::query!(
        "UPDATE schedule_runs SET status = $1, updated_at = $2 WHERE idem_key = $3",
        status,
        Utc::now(),
        idem_key,
    )
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Whether any run for `schedule_id` is currently `ENQUEUED` or `STARTED` —
/// used by the `overlap_policy=skip` check.
pub async fn has_in_flight_run(pool: &PgPool, schedule_id: &str) -> Result<bool, DbError> {
    let row = sqlx::query_scalar!(
        r#"SELECT EXISTS(
             SELECT 1 FROM schedule_runs
             WHERE schedule_id = $1 AND status IN ('ENQUEUED', 'STARTED')
           ) AS "exists!""#,
        schedule_id,
    )
    .fetch_one(pool)
    .await?;
    Ok(row)
}
