//! Workflow version CRUD.
//!
//! Workflows are immutable once written: a new `(workflow_id, version)` row
//! is inserted for every compile, never updated in place.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{models::WorkflowRow, DbError};

/// Insert a new, immutable workflow version.
///
/// `definition` must be an `engine::Dag` serialized as JSON.
pub async fn insert_workflow_version(
    pool: &PgPool,
    workflow_id: &str,
    version: i32,
    definition: serde_json::Value,
) -> Result<WorkflowRow, DbError> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    let row = sqlx::query_as!(
        WorkflowRow,
        r#"
        INSERT INTO workflows (id, workflow_id, version, definition, created_at)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, workflow_id, version, definition, created_at
        "#,
        id,
        workflow_id,
        version,
        definition,
        now,
    )
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Fetch one specific version of a workflow.
pub async fn get_workflow_version(
    pool: &PgPool,
    workflow_id: &str,
    version: i32,
) -> Result<Option<WorkflowRow>, DbError> {
    let row = sqlx::query_as!(
        WorkflowRow,
        r#"SELECT id, workflow_id, version, definition, created_at
           FROM workflows WHERE workflow_id = $1 AND version = $2"#,
        workflow_id,
        version,
    )
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Return every version number on record for a workflow, ascending.
pub async fn list_workflow_versions(pool: &PgPool, workflow_id: &str) -> Result<Vec<i32>, DbError> {
    let versions = sqlx::query_scalar!(
        r#"SELECT version FROM workflows WHERE workflow_id = $1 ORDER BY version ASC"#,
        workflow_id,
    )
    .fetch_all(pool)
    .await?;

    Ok(versions)
}

/// Fetch the newest version row of one workflow.
pub async fn get_latest_workflow(pool: &PgPool, workflow_id: &str) -> Result<Option<WorkflowRow>, DbError> {
    let row = sqlx::query_as!(
        WorkflowRow,
        r#"
        SELECT id, workflow_id, version, definition, created_at
        FROM workflows
        WHERE workflow_id = $1
        ORDER BY version DESC
        LIMIT 1
        "#,
        workflow_id,
    )
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Return the newest version row of every known workflow.
pub async fn list_latest_workflows(pool: &PgPool) -> Result<Vec<WorkflowRow>, DbError> {
    let rows = sqlx::query_as!(
        WorkflowRow,
        r#"
        SELECT DISTINCT ON (workflow_id) id, workflow_id, version, definition, created_at
        FROM workflows
        ORDER BY workflow_id, version DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
