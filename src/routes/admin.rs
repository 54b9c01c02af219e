//! Admin endpoints

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    routing::get,
};
use serde::Deserialize;
use std::sync::Arc;

use super::auth::AdminUser;
use super::dto::LogsResponse;
use crate::AppState;
use crate::constants::ADMIN_LOG_LIMIT;
use crate::domain::queries::audit_logs;
use crate::services::error::LogErr;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/admin/logs", get(list_logs))
}

#[derive(Debug, Deserialize)]
struct LogsQuery {
    limit: Option<i64>,
}

fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(ADMIN_LOG_LIMIT).clamp(1, ADMIN_LOG_LIMIT)
}

/// GET /api/admin/logs?limit= - Newest audit entries
async fn list_logs(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
    Query(query): Query<LogsQuery>,
) -> Result<Json<LogsResponse>, StatusCode> {
    let logs = audit_logs::list_recent(&state.db, clamp_limit(query.limit))
        .await
        .log_500("Fetch audit logs error")?;

    Ok(Json(LogsResponse { logs }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_defaults_and_caps_at_one_hundred() {
        assert_eq!(clamp_limit(None), 100);
        assert_eq!(clamp_limit(Some(20)), 20);
        assert_eq!(clamp_limit(Some(5000)), 100);
        assert_eq!(clamp_limit(Some(0)), 1);
    }
}
