//! Immediate publication (/api/post)

use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use chrono::Utc;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tower_governor::{
    GovernorLayer, governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor,
};

use super::auth::AuthUser;
use super::dto::{AccountError, AccountResult, PostRequest, PostResponse, normalize_image_url};
use crate::AppState;
use crate::domain::Account;
use crate::error::PublishError;
use crate::services::credentials::CredentialResolver;
use crate::services::error::LogErr;
use crate::services::publisher::{PublishOutcome, Publisher};
use crate::store::Store;

pub fn routes() -> Router<Arc<AppState>> {
    // Every request fans out to the provider APIs: 30 per minute per client
    let rate_limit_config = GovernorConfigBuilder::default()
        .per_second(2)
        .burst_size(10)
        .key_extractor(SmartIpKeyExtractor)
        .finish()
        .expect("Failed to build rate limit config");

    let rate_limit_layer = GovernorLayer {
        config: rate_limit_config.into(),
    };

    Router::new()
        .route("/api/post", post(post_now))
        .layer(rate_limit_layer)
}

/// POST /api/post - Publish a thread to the caller's accounts right away
async fn post_now(
    State(state): State<Arc<AppState>>,
    AuthUser(identity): AuthUser,
    Json(payload): Json<PostRequest>,
) -> Result<Json<PostResponse>, StatusCode> {
    if payload.thread.is_empty() || payload.account_ids.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let mut seen = HashSet::new();
    let account_ids: Vec<String> = payload
        .account_ids
        .into_iter()
        .filter(|id| seen.insert(id.clone()))
        .collect();

    let accounts: HashMap<String, Account> = state
        .store
        .find_accounts(&account_ids, &identity.user_id)
        .await
        .log_500("Fetch accounts for immediate post error")?
        .into_iter()
        .map(|a| (a.id.clone(), a))
        .collect();

    let image_url = normalize_image_url(payload.image_url);
    let resolver =
        CredentialResolver::new(state.store.as_ref(), state.twitter.as_ref(), &state.audit);
    let publisher = Publisher::new(resolver, &state.audit);
    let now = Utc::now();

    let mut results = Vec::new();
    let mut errors = Vec::new();

    for account_id in account_ids {
        let Some(account) = accounts.get(&account_id) else {
            errors.push(AccountError {
                account_id,
                error: "Account not found".to_string(),
            });
            continue;
        };

        match publisher
            .publish(account, &payload.thread, image_url.as_deref(), now)
            .await
        {
            PublishOutcome::Posted(posts) => {
                tracing::info!(account_id = %account.id, items = posts.len(), "Posted thread immediately");
                results.push(AccountResult {
                    account_id,
                    platform: account.provider.to_string(),
                    success: true,
                    posts,
                    error: None,
                });
            }
            PublishOutcome::NotImplemented(message) => {
                results.push(AccountResult {
                    account_id,
                    platform: account.provider.to_string(),
                    success: false,
                    posts: Vec::new(),
                    error: Some(message),
                });
            }
            PublishOutcome::Failed(e) => {
                state
                    .audit
                    .error(
                        "Immediate post failed for account",
                        failure_details(account, &e),
                        Some(&identity.user_id),
                    )
                    .await;
                errors.push(AccountError {
                    account_id,
                    error: e.to_string(),
                });
            }
        }
    }

    Ok(Json(PostResponse::new(results, errors)))
}

/// Audit details for a failed account, with the provider's raw error body when there is one
fn failure_details(account: &Account, error: &PublishError) -> serde_json::Value {
    let payload = match error {
        PublishError::ProviderPublishFailed { payload, .. } => payload.as_deref(),
        _ => None,
    };
    json!({
        "accountId": account.id,
        "provider": account.provider.as_str(),
        "error": error.to_string(),
        "payload": payload,
    })
}
