//! Join-node arrival bookkeeping.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// Record a predecessor's arrival at a join node. Idempotent: arriving
/// twice from the same `from_node_id` is a no-op.
pub async fn record_arrival(
    pool: &PgPool,
    run_id: &str,
    join_node_id: &str,
    from_node_id: &str,
) -> Result<(), DbError> {
    sqlx::query!(
        r#"
        INSERT INTO join_arrivals (id, run_id, join_node_id, from_node_id, arrived_at)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (run_id, join_node_id, from_node_id) DO NOTHING
        "#,
        Uuid::new_v4(),
        run_id,
        join_node_id,
        from_node_id,
        Utc::now(),
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// The set of predecessors that have arrived at a join node so far.
pub async fn arrivals(pool: &PgPool, run_id: &str, join_node_id: &str) -> Result<Vec<String>, DbError> {
    let rows = sqlx::query_scalar!(
        r#"SELECT from_node_id FROM join_arrivals WHERE run_id = $1 AND join_node_id = $2"#,
        run_id,
        join_node_id,
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
