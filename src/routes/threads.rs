//! Scheduling and thread management (/api/schedule, /api/threads/*)

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
};
use serde_json::json;
use std::sync::Arc;
use tower_governor::{
    GovernorLayer, governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor,
};

use super::auth::AuthUser;
use super::dto::{
    ScheduleRequest, SuccessResponse, ThreadEnvelope, ThreadList, UpdateThreadRequest,
    normalize_image_url,
};
use crate::AppState;
use crate::domain::queries::threads;
use crate::domain::{NewThread, ThreadStatus};
use crate::services::error::LogErr;

pub fn routes() -> Router<Arc<AppState>> {
    let rate_limit_config = GovernorConfigBuilder::default()
        .per_second(2)
        .burst_size(10)
        .key_extractor(SmartIpKeyExtractor)
        .finish()
        .expect("Failed to build rate limit config");

    let rate_limit_layer = GovernorLayer {
        config: rate_limit_config.into(),
    };

    let scheduling = Router::new()
        .route("/api/schedule", post(schedule_thread))
        .layer(rate_limit_layer);

    Router::new()
        .route("/api/threads", get(list_threads))
        .route("/api/threads/{id}", put(update_thread).delete(delete_thread))
        .merge(scheduling)
}

/// POST /api/schedule - Store a thread for publication at `scheduledAt`
async fn schedule_thread(
    State(state): State<Arc<AppState>>,
    AuthUser(identity): AuthUser,
    Json(payload): Json<ScheduleRequest>,
) -> Result<(StatusCode, Json<ThreadEnvelope>), StatusCode> {
    if payload.thread.is_empty() || payload.account_ids.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    let scheduled_at = payload.scheduled_at.ok_or(StatusCode::BAD_REQUEST)?;

    let new_thread = NewThread {
        owner_id: identity.user_id.clone(),
        content: payload.thread,
        image_url: normalize_image_url(payload.image_url),
        status: ThreadStatus::Scheduled,
        scheduled_at: Some(scheduled_at),
        targets: payload.account_ids,
    };

    let thread = threads::insert_thread(&state.db, &new_thread)
        .await
        .log_500("Create scheduled thread error")?;

    state
        .audit
        .info(
            "Thread scheduled",
            json!({
                "threadId": thread.id,
                "scheduledAt": scheduled_at,
                "accounts": thread.targets.len(),
            }),
            Some(&identity.user_id),
        )
        .await;

    Ok((
        StatusCode::CREATED,
        Json(ThreadEnvelope {
            success: true,
            thread,
        }),
    ))
}

/// GET /api/threads - The caller's threads, newest first
async fn list_threads(
    State(state): State<Arc<AppState>>,
    AuthUser(identity): AuthUser,
) -> Result<Json<ThreadList>, StatusCode> {
    let threads = threads::list_threads_for_user(&state.db, &identity.user_id)
        .await
        .log_500("List threads error")?;

    Ok(Json(ThreadList {
        success: true,
        threads,
    }))
}

/// PUT /api/threads/{id} - Edit content or fallback image.
/// Threads being published or already posted are frozen.
async fn update_thread(
    State(state): State<Arc<AppState>>,
    AuthUser(identity): AuthUser,
    Path(thread_id): Path<String>,
    Json(payload): Json<UpdateThreadRequest>,
) -> Result<Json<ThreadEnvelope>, StatusCode> {
    if payload.content.as_ref().is_some_and(|c| c.is_empty()) {
        return Err(StatusCode::BAD_REQUEST);
    }

    let status = threads::get_thread_status(&state.db, &thread_id, &identity.user_id)
        .await
        .log_500("Get thread status error")?
        .ok_or(StatusCode::NOT_FOUND)?;

    if !status.is_editable() {
        return Err(StatusCode::CONFLICT);
    }

    let image_url = normalize_image_url(payload.image_url);
    let thread = threads::update_thread(
        &state.db,
        &thread_id,
        &identity.user_id,
        payload.content.as_deref(),
        image_url.as_deref(),
    )
    .await
    .log_500("Update thread error")?
    // Claimed by a run between the status check and the update
    .ok_or(StatusCode::CONFLICT)?;

    Ok(Json(ThreadEnvelope {
        success: true,
        thread,
    }))
}

/// DELETE /api/threads/{id}
async fn delete_thread(
    State(state): State<Arc<AppState>>,
    AuthUser(identity): AuthUser,
    Path(thread_id): Path<String>,
) -> Result<Json<SuccessResponse>, StatusCode> {
    let deleted = threads::delete_thread(&state.db, &thread_id, &identity.user_id)
        .await
        .log_500("Delete thread error")?;

    if !deleted {
        return Err(StatusCode::NOT_FOUND);
    }

    Ok(Json(SuccessResponse { success: true }))
}
