//! Run and node-execution repository functions.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    models::{NodeExecutionRow, RunRow},
    DbError,
};

// ---------------------------------------------------------------------------
// runs
// ---------------------------------------------------------------------------

/// Create a new run row in `running` status.
pub async fn create_run(
    pool: &PgPool,
    run_id: &str,
    workflow_id: &str,
    version: i32,
    user_id: &str,
    source: &str,
    trigger_digest: &str,
    started_at: DateTime<Utc>,
) -> Result<RunRow, DbError> {
    let id = Uuid::new_v4();

    let row = sqlx::query_as!(
        RunRow,
        r#"
        INSERT INTO runs
            (id, run_id, workflow_id, version, user_id, source, trigger_digest, status, started_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, 'running', $8)
        RETURNING id, run_id, workflow_id, version, user_id, source, trigger_digest, status, started_at, finished_at
        "#,
        id,
        run_id,
        workflow_id,
        version,
        user_id,
        source,
        trigger_digest,
        started_at,
    )
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Update a run's status. Sets `finished_at` unless the new status is `running`.
pub async fn set_run_status(pool: &PgPool, run_id: &str, status: &str) -> Result<(), DbError> {
    if status == "running" {
        sqlx::query!("UPDATE runs SET status = $1 WHERE run_id = $2", status, run_id)
            .execute(pool)
            .await?;
    } else {
        sqlx::query!(
            "UPDATE runs SET status = $1, finished_at = $2 WHERE run_id = $3",
            status,
            Utc::now(),
            run_id,
        )
        .execute(pool)
        .await?;
    }
    Ok(())
}

pub async fn get_run(pool: &PgPool, run_id: &str) -> Result<Option<RunRow>, DbError> {
    let row = sqlx::query_as!(
        RunRow,
        r#"SELECT id, run_id, workflow_id, version, user_id, source, trigger_digest, status, started_at, finished_at
           FROM runs WHERE run_id = $1"#,
        run_id,
    )
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

// ---------------------------------------------------------------------------
// node_executions
// ---------------------------------------------------------------------------

/// Upsert a `(run_id, node_id, attempt)` execution record.
pub async fn upsert_node_execution(
    pool: &PgPool,
    run_id: &str,
    node_id: &str,
    attempt: i32,
    status: &str,
    output: Option<serde_json::Value>,
    error: Option<&str>,
    idem_key: &str,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
) -> Result<NodeExecutionRow, DbError> {
    let id = Uuid::new_v4();

    let row = sqlx::query_as!(
        NodeExecutionRow,
        r#"
        INSERT INTO node_executions
            (id, run_id, node_id, attempt, status, output, error, idem_key, started_at, finished_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (run_id, node_id, attempt) DO UPDATE
        SET status = EXCLUDED.status,
            output = EXCLUDED.output,
            error = EXCLUDED.error,
            finished_at = EXCLUDED.finished_at
        RETURNING id, run_id, node_id, attempt, status, output, error, idem_key, started_at, finished_at
        "#,
        id,
        run_id,
        node_id,
        attempt,
        status,
        output,
        error,
        idem_key,
        started_at,
        finished_at,
    )
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Every recorded execution attempt for a run, in insertion order.
pub async fn list_node_executions(pool: &PgPool, run_id: &str) -> Result<Vec<NodeExecutionRow>, DbError> {
    let rows = sqlx::query_as!(
        NodeExecutionRow,
        r#"SELECT id, run_id, node_id, attempt, status, output, error, idem_key, started_at, finished_at
           FROM node_executions WHERE run_id = $1 ORDER BY started_at ASC"#,
        run_id,
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
