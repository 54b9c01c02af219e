pub mod admin;
pub mod auth;
pub mod cron;
mod dto;
pub mod post;
pub mod threads;

use axum::{Router, routing::get};
use std::sync::Arc;

use crate::AppState;

/// Build all routes for the API
pub fn build_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .merge(admin::routes())
        .merge(cron::routes())
        .merge(post::routes())
        .merge(threads::routes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use serde_json::{Value, json};
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    use crate::config::AppConfig;
    use crate::domain::StatusPolicy;
    use crate::publication::Publication;
    use crate::services::audit::AuditLogger;
    use crate::services::session::{Role, issue_test_token};
    use crate::services::testing::FakeTwitter;
    use crate::store::memory::MemoryStore;

    const SECRET: &str = "router-test-secret";

    /// State whose pool never connects; only paths that answer before
    /// touching PostgreSQL are exercised here.
    fn test_state(cron_secret: Option<&str>) -> Arc<AppState> {
        let config = AppConfig::from_lookup(|key| match key {
            "SESSION_SECRET" => Some(SECRET.to_string()),
            "TWITTER_CLIENT_ID" => Some("client".to_string()),
            "TWITTER_CLIENT_SECRET" => Some("secret".to_string()),
            "CRON_SECRET" => cron_secret.map(str::to_string),
            _ => None,
        })
        .unwrap();

        let db = PgPoolOptions::new()
            .connect_lazy("postgres://nobody@localhost:1/unused")
            .unwrap();
        let store = Arc::new(MemoryStore::new());
        let twitter = Arc::new(FakeTwitter::new());
        let audit = AuditLogger::new(store.clone());
        let publication = Publication::new(
            store.clone(),
            twitter.clone(),
            audit.clone(),
            StatusPolicy::Strict,
            config.claim_lease_secs,
        );

        Arc::new(AppState {
            db,
            config,
            store,
            twitter,
            audit,
            publication,
        })
    }

    fn app(cron_secret: Option<&str>) -> Router {
        build_routes().with_state(test_state(cron_secret))
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-forwarded-for", "203.0.113.7");
        if let Some(token) = token {
            builder = builder.header(header::COOKIE, format!("session_token={}", token));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn health_is_public() {
        let response = app(None)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn trigger_rejects_wrong_key() {
        let response = app(Some("s3cret"))
            .oneshot(Request::get("/api/cron?key=nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await, json!({ "error": "Unauthorized" }));
    }

    #[tokio::test]
    async fn trigger_runs_with_correct_key() {
        let response = app(Some("s3cret"))
            .oneshot(Request::get("/api/cron?key=s3cret").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({ "processed": 0, "results": [] })
        );
    }

    #[tokio::test]
    async fn trigger_is_open_without_secret() {
        let response = app(None)
            .oneshot(Request::get("/api/cron").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn user_endpoints_require_session() {
        let response = app(None)
            .oneshot(Request::get("/api/threads").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app(None)
            .oneshot(
                Request::get("/api/threads")
                    .header(header::AUTHORIZATION, "Bearer not-a-jwt")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn admin_logs_forbidden_for_regular_users() {
        let token = issue_test_token("user1", Role::User, SECRET.as_bytes());
        let response = app(None)
            .oneshot(
                Request::get("/api/admin/logs")
                    .header(header::COOKIE, format!("session_token={}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn schedule_requires_content_accounts_and_date() {
        let token = issue_test_token("user1", Role::User, SECRET.as_bytes());

        let cases = [
            json!({ "thread": [], "scheduledAt": "2026-11-01T09:00:00Z", "accountIds": ["acc1"] }),
            json!({ "thread": ["Hello"], "scheduledAt": "2026-11-01T09:00:00Z", "accountIds": [] }),
            json!({ "thread": ["Hello"], "accountIds": ["acc1"] }),
        ];
        for body in cases {
            let response = app(None)
                .oneshot(json_request("POST", "/api/schedule", Some(&token), body))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn immediate_post_requires_content_and_accounts() {
        let token = issue_test_token("user1", Role::User, SECRET.as_bytes());
        let response = app(None)
            .oneshot(json_request(
                "POST",
                "/api/post",
                Some(&token),
                json!({ "thread": [], "accountIds": ["acc1"] }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn immediate_post_reports_unknown_accounts() {
        let token = issue_test_token("user1", Role::User, SECRET.as_bytes());
        let response = app(None)
            .oneshot(json_request(
                "POST",
                "/api/post",
                Some(&token),
                json!({ "thread": ["Hello"], "accountIds": ["accX"] }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({
                "success": false,
                "results": [],
                "errors": [{ "accountId": "accX", "error": "Account not found" }],
                "partial": false
            })
        );
    }
}
