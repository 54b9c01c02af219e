//! Publication trigger (/api/cron)
//!
//! Called by an external cron service. When `CRON_SECRET` is configured the
//! caller must pass it as `?key=`.

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/cron", get(trigger))
}

#[derive(Debug, Deserialize)]
struct TriggerQuery {
    key: Option<String>,
}

/// An unset secret leaves the trigger open
pub fn authorize_trigger(secret: Option<&str>, key: Option<&str>) -> bool {
    match secret {
        None => true,
        Some(secret) => key == Some(secret),
    }
}

/// GET /api/cron?key= - Publish all due scheduled threads
async fn trigger(State(state): State<Arc<AppState>>, Query(query): Query<TriggerQuery>) -> Response {
    if !authorize_trigger(state.config.cron_secret.as_deref(), query.key.as_deref()) {
        tracing::warn!("Publication trigger called with wrong key");
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Unauthorized" })),
        )
            .into_response();
    }

    match state.publication.run_due(Utc::now()).await {
        Ok(summary) => Json(summary).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Publication run aborted");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}
