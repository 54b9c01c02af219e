//! Session extractors
//!
//! Sessions are issued by the external identity service; handlers only
//! verify them. The token comes from the session cookie or, for API
//! clients, an `Authorization: Bearer` header.

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION, request::Parts},
};
use axum_extra::extract::CookieJar;
use std::sync::Arc;

use crate::AppState;
use crate::constants::SESSION_COOKIE_NAME;
use crate::services::error::LogErr;
use crate::services::session::{self, Identity};

/// Extractor that validates the session token and returns the caller
pub struct AuthUser(pub Identity);

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = session_token(&parts.headers).ok_or(StatusCode::UNAUTHORIZED)?;

        let identity = session::validate_session_token(&token, &state.config.session_secret)
            .log_status("Session validation failed", StatusCode::UNAUTHORIZED)?;

        Ok(AuthUser(identity))
    }
}

/// Like [`AuthUser`], but the caller must hold the ADMIN role
pub struct AdminUser(pub Identity);

impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(identity) = AuthUser::from_request_parts(parts, state).await?;
        if !identity.is_admin() {
            tracing::warn!(user_id = %identity.user_id, "Non-admin caller rejected");
            return Err(StatusCode::FORBIDDEN);
        }
        Ok(AdminUser(identity))
    }
}

/// Cookie first, then bearer header
fn session_token(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(SESSION_COOKIE_NAME) {
        return Some(cookie.value().to_string());
    }

    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}
