//! Thread domain - DB queries for threads
//!
//! All functions use the generic Executor pattern, allowing them to work with
//! both `&PgPool` (for standalone queries) and `&mut PgConnection` (for transactions).
//!
//! `content`, `targets` and `outcomes` are JSONB; they are decoded through
//! [`crate::domain::content`] and nowhere else.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{Executor, Postgres};

use crate::domain::content::{decode_content, decode_outcomes, decode_targets, encode_content};
use crate::domain::models::{DueThread, MalformedThread, NewThread, Thread, ThreadStatus};
use crate::domain::outcome::Outcomes;
use crate::domain::PostItem;
use crate::error::StoreError;

const THREAD_COLUMNS: &str =
    "id, user_id, content, image_url, status, scheduled_at, targets, outcomes, created_at";

/// Raw row as stored
#[derive(Debug, sqlx::FromRow)]
struct ThreadRow {
    id: String,
    user_id: String,
    content: serde_json::Value,
    image_url: Option<String>,
    status: ThreadStatus,
    scheduled_at: Option<DateTime<Utc>>,
    targets: Option<serde_json::Value>,
    outcomes: Option<serde_json::Value>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ThreadRow> for Thread {
    type Error = StoreError;

    fn try_from(row: ThreadRow) -> Result<Self, Self::Error> {
        Ok(Thread {
            content: decode_content(&row.content)
                .map_err(|e| StoreError::Codec(format!("thread {}: {}", row.id, e)))?,
            targets: decode_targets(row.targets.as_ref())?,
            outcomes: decode_outcomes(row.outcomes.as_ref())?,
            id: row.id,
            owner_id: row.user_id,
            image_url: row.image_url.filter(|u| !u.trim().is_empty()),
            status: row.status,
            scheduled_at: row.scheduled_at,
            created_at: row.created_at,
        })
    }
}

/// Decode one row, keeping its identity when the JSON columns are unreadable
fn decode_row(row: ThreadRow) -> DueThread {
    let id = row.id.clone();
    let owner_id = row.user_id.clone();
    Thread::try_from(row).map_err(|e| MalformedThread {
        id,
        owner_id,
        reason: e.to_string(),
    })
}

/// Scheduled threads whose time has come, oldest schedule first.
/// A row that fails to decode is returned as [`MalformedThread`].
pub async fn find_due_threads<'e, E>(
    executor: E,
    now: DateTime<Utc>,
) -> Result<Vec<DueThread>, StoreError>
where
    E: Executor<'e, Database = Postgres>,
{
    let query = format!(
        r#"SELECT {THREAD_COLUMNS}
           FROM threads
           WHERE status = 'SCHEDULED' AND scheduled_at <= $1
           ORDER BY scheduled_at ASC"#
    );

    let rows: Vec<ThreadRow> = sqlx::query_as(&query).bind(now).fetch_all(executor).await?;
    Ok(rows.into_iter().map(decode_row).collect())
}

/// Atomically move a thread from SCHEDULED to PUBLISHING.
/// Returns false when another run already claimed it.
pub async fn claim_thread<'e, E>(
    executor: E,
    thread_id: &str,
    now: DateTime<Utc>,
) -> Result<bool, StoreError>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        r#"
        UPDATE threads
        SET status = 'PUBLISHING', claimed_at = $2, updated_at = NOW()
        WHERE id = $1 AND status = 'SCHEDULED'
        "#,
    )
    .bind(thread_id)
    .bind(now)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Hand a claimed thread back: PUBLISHING -> SCHEDULED.
/// Returns false when the thread was no longer PUBLISHING.
pub async fn release_claim<'e, E>(executor: E, thread_id: &str) -> Result<bool, StoreError>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        r#"
        UPDATE threads
        SET status = 'SCHEDULED', claimed_at = NULL, updated_at = NOW()
        WHERE id = $1 AND status = 'PUBLISHING'
        "#,
    )
    .bind(thread_id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Record the terminal status and the full outcome map in one update
pub async fn complete_thread<'e, E>(
    executor: E,
    thread_id: &str,
    status: ThreadStatus,
    outcomes: &Outcomes,
) -> Result<(), StoreError>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(
        r#"
        UPDATE threads
        SET status = $2, outcomes = $3, claimed_at = NULL, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(thread_id)
    .bind(status)
    .bind(Json(outcomes))
    .execute(executor)
    .await?;

    Ok(())
}

/// Fail threads whose PUBLISHING claim is older than `cutoff`.
/// Returns (thread id, owner id) of each thread touched.
pub async fn fail_stale_claims<'e, E>(
    executor: E,
    cutoff: DateTime<Utc>,
) -> Result<Vec<(String, String)>, StoreError>
where
    E: Executor<'e, Database = Postgres>,
{
    let rows: Vec<(String, String)> = sqlx::query_as(
        r#"
        UPDATE threads
        SET status = 'FAILED', claimed_at = NULL, updated_at = NOW()
        WHERE status = 'PUBLISHING' AND claimed_at < $1
        RETURNING id, user_id
        "#,
    )
    .bind(cutoff)
    .fetch_all(executor)
    .await?;

    Ok(rows)
}

/// Insert a new thread and return it
pub async fn insert_thread<'e, E>(executor: E, thread: &NewThread) -> Result<Thread, StoreError>
where
    E: Executor<'e, Database = Postgres>,
{
    let query = format!(
        r#"INSERT INTO threads (user_id, content, image_url, status, scheduled_at, targets)
           VALUES ($1, $2, $3, $4, $5, $6)
           RETURNING {THREAD_COLUMNS}"#
    );

    let row: ThreadRow = sqlx::query_as(&query)
        .bind(&thread.owner_id)
        .bind(encode_content(&thread.content))
        .bind(thread.image_url.as_deref())
        .bind(thread.status)
        .bind(thread.scheduled_at)
        .bind(Json(&thread.targets))
        .fetch_one(executor)
        .await?;

    row.try_into()
}

/// All threads of a user, newest first
pub async fn list_threads_for_user<'e, E>(
    executor: E,
    user_id: &str,
) -> Result<Vec<Thread>, StoreError>
where
    E: Executor<'e, Database = Postgres>,
{
    let query = format!(
        r#"SELECT {THREAD_COLUMNS}
           FROM threads
           WHERE user_id = $1
           ORDER BY created_at DESC"#
    );

    let rows: Vec<ThreadRow> = sqlx::query_as(&query).bind(user_id).fetch_all(executor).await?;
    Ok(rows
        .into_iter()
        .map(decode_row)
        .filter_map(|row| match row {
            Ok(thread) => Some(thread),
            Err(bad) => {
                tracing::warn!(thread_id = %bad.id, reason = %bad.reason, "Skipping unreadable thread");
                None
            }
        })
        .collect())
}

/// Current status of a thread owned by the user
pub async fn get_thread_status<'e, E>(
    executor: E,
    thread_id: &str,
    user_id: &str,
) -> Result<Option<ThreadStatus>, StoreError>
where
    E: Executor<'e, Database = Postgres>,
{
    let row: Option<(ThreadStatus,)> =
        sqlx::query_as("SELECT status FROM threads WHERE id = $1 AND user_id = $2")
            .bind(thread_id)
            .bind(user_id)
            .fetch_optional(executor)
            .await?;

    Ok(row.map(|r| r.0))
}

/// Replace content and/or the fallback image. `None` leaves a field untouched.
/// Returns the updated thread, or `None` if no editable thread matched.
pub async fn update_thread<'e, E>(
    executor: E,
    thread_id: &str,
    user_id: &str,
    content: Option<&[PostItem]>,
    image_url: Option<&str>,
) -> Result<Option<Thread>, StoreError>
where
    E: Executor<'e, Database = Postgres>,
{
    let query = format!(
        r#"UPDATE threads
           SET content = COALESCE($3, content),
               image_url = COALESCE($4, image_url),
               updated_at = NOW()
           WHERE id = $1 AND user_id = $2 AND status NOT IN ('PUBLISHING', 'POSTED')
           RETURNING {THREAD_COLUMNS}"#
    );

    let row: Option<ThreadRow> = sqlx::query_as(&query)
        .bind(thread_id)
        .bind(user_id)
        .bind(content.map(encode_content))
        .bind(image_url)
        .fetch_optional(executor)
        .await?;

    row.map(Thread::try_from).transpose()
}

/// Delete a thread owned by the user. Returns false if none matched.
pub async fn delete_thread<'e, E>(
    executor: E,
    thread_id: &str,
    user_id: &str,
) -> Result<bool, StoreError>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query("DELETE FROM threads WHERE id = $1 AND user_id = $2")
        .bind(thread_id)
        .bind(user_id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected() > 0)
}
