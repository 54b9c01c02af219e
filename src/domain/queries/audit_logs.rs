//! Audit log domain - append and read `system_logs`

use chrono::{DateTime, Utc};
use sqlx::{Executor, Postgres};

use crate::domain::models::{AuditLevel, AuditLogEntry, NewAuditEntry};
use crate::error::StoreError;

#[derive(sqlx::FromRow)]
struct AuditRow {
    id: i64,
    level: String,
    message: String,
    details: Option<serde_json::Value>,
    user_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<AuditRow> for AuditLogEntry {
    type Error = StoreError;

    fn try_from(row: AuditRow) -> Result<Self, Self::Error> {
        Ok(AuditLogEntry {
            level: row.level.parse::<AuditLevel>().map_err(StoreError::Codec)?,
            id: row.id,
            message: row.message,
            details: row.details,
            user_id: row.user_id,
            created_at: row.created_at,
        })
    }
}

pub async fn insert_entry<'e, E>(executor: E, entry: &NewAuditEntry) -> Result<(), StoreError>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(
        r#"
        INSERT INTO system_logs (level, message, details, user_id)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(entry.level.as_str())
    .bind(&entry.message)
    .bind(entry.details.as_ref())
    .bind(entry.user_id.as_deref())
    .execute(executor)
    .await?;

    Ok(())
}

/// Newest entries first
pub async fn list_recent<'e, E>(executor: E, limit: i64) -> Result<Vec<AuditLogEntry>, StoreError>
where
    E: Executor<'e, Database = Postgres>,
{
    let rows: Vec<AuditRow> = sqlx::query_as(
        r#"
        SELECT id, level, message, details, user_id, created_at
        FROM system_logs
        ORDER BY created_at DESC, id DESC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(executor)
    .await?;

    rows.into_iter().map(AuditLogEntry::try_from).collect()
}
