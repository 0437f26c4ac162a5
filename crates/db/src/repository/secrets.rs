//! Encrypted secret storage, used by validator secret-reference rewrites.

use sqlx::PgPool;
use uuid::Uuid;

use crate::{models::SecretRow, DbError};

pub async fn put_secret(
    pool: &PgPool,
    workflow_id: &str,
    key: &str,
    encrypted_value: &str,
) -> Result<SecretRow, DbError> {
    let id = Uuid::new_v4();

    let row = sqlx::query_as!(
        SecretRow,
        r#"
        INSERT INTO secrets (id, workflow_id, key, encrypted_value)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (workflow_id, key) DO UPDATE SET encrypted_value = EXCLUDED.encrypted_value
        RETURNING id, workflow_id, key, encrypted_value
        "#,
        id,
        workflow_id,
        key,
        encrypted_value,
    )
    .fetch_one(pool)
    .await?;

    Ok(row)
}

pub async fn get_secret(pool: &PgPool, workflow_id: &str, key: &str) -> Result<Option<SecretRow>, DbError> {
    let row = sqlx::query_as!(
        SecretRow,
        r#"SELECT id, workflow_id, key, encrypted_value FROM secrets WHERE workflow_id = $1 AND key = $2"#,
        workflow_id,
        key,
    )
    .fetch_optional(pool)
    .await?;
    Ok(row)
}
