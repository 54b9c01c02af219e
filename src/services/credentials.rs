//! Credential resolution for linked accounts
//!
//! Hands out a Twitter session bound to a usable access token, refreshing
//! expired OAuth tokens and persisting the new pair first.

use chrono::{DateTime, Utc};
use serde_json::json;

use super::audit::AuditLogger;
use super::twitter::{TweetResponse, TwitterApi, TwitterError};
use crate::constants::TOKEN_EXPIRY_MARGIN_MS;
use crate::domain::{Account, Provider};
use crate::error::PublishError;
use crate::store::Store;

/// A Twitter client bound to one account's access token
pub struct TwitterSession<'a> {
    api: &'a dyn TwitterApi,
    access_token: String,
}

impl<'a> TwitterSession<'a> {
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub async fn post_tweet(
        &self,
        text: &str,
        in_reply_to: Option<&str>,
        media_ids: &[String],
    ) -> Result<TweetResponse, TwitterError> {
        self.api
            .post_tweet(&self.access_token, text, in_reply_to, media_ids)
            .await
    }

    pub async fn upload_image(&self, image_url: &str) -> Result<String, TwitterError> {
        self.api.upload_image(&self.access_token, image_url).await
    }
}

/// True when the token is missing an expiry or expires within the margin.
/// `expires_at` is in epoch seconds.
pub fn is_expired(expires_at: Option<i64>, now: DateTime<Utc>) -> bool {
    match expires_at {
        Some(expires_at) => {
            expires_at.saturating_mul(1000) <= now.timestamp_millis() + TOKEN_EXPIRY_MARGIN_MS
        }
        None => true,
    }
}

pub struct CredentialResolver<'a> {
    store: &'a dyn Store,
    twitter: &'a dyn TwitterApi,
    audit: &'a AuditLogger,
}

impl<'a> CredentialResolver<'a> {
    pub fn new(store: &'a dyn Store, twitter: &'a dyn TwitterApi, audit: &'a AuditLogger) -> Self {
        Self {
            store,
            twitter,
            audit,
        }
    }

    /// Resolve `account_id` into a Twitter session with a valid token.
    pub async fn resolve(
        &self,
        account_id: &str,
        now: DateTime<Utc>,
    ) -> Result<TwitterSession<'a>, PublishError> {
        let account = self
            .store
            .find_account(account_id)
            .await?
            .ok_or_else(|| PublishError::AccountNotFound(account_id.to_string()))?;

        if account.provider != Provider::Twitter {
            return Err(PublishError::UnsupportedProvider(account.provider.to_string()));
        }

        let access_token = account.access_token.clone().unwrap_or_default();

        if !is_expired(account.expires_at, now) {
            return Ok(self.session(access_token));
        }

        match account.refresh_token.as_deref() {
            Some(refresh_token) => self.refresh(&account, refresh_token, now).await,
            None => {
                self.audit
                    .warn(
                        "Twitter token expired and no refresh token available",
                        json!({ "accountId": account.id }),
                        Some(&account.owner_id),
                    )
                    .await;
                Ok(self.session(access_token))
            }
        }
    }

    async fn refresh(
        &self,
        account: &Account,
        refresh_token: &str,
        now: DateTime<Utc>,
    ) -> Result<TwitterSession<'a>, PublishError> {
        tracing::info!(account_id = %account.id, "Refreshing Twitter token");

        let tokens = match self.twitter.refresh_token(refresh_token).await {
            Ok(tokens) => tokens,
            Err(e) => {
                let reason = e.summary();
                self.audit
                    .error(
                        "Failed to refresh Twitter token",
                        json!({
                            "accountId": account.id,
                            "error": reason,
                            "payload": e.raw_payload(),
                        }),
                        Some(&account.owner_id),
                    )
                    .await;
                return Err(PublishError::TokenRefreshFailed {
                    account_id: account.id.clone(),
                    reason,
                });
            }
        };

        let expires_at = now.timestamp() + tokens.expires_in;
        self.store
            .update_account_tokens(
                &account.id,
                &tokens.access_token,
                tokens.refresh_token.as_deref(),
                expires_at,
            )
            .await?;

        self.audit
            .info(
                "Twitter token refreshed automatically",
                json!({ "accountId": account.id }),
                Some(&account.owner_id),
            )
            .await;

        Ok(self.session(tokens.access_token))
    }

    fn session(&self, access_token: String) -> TwitterSession<'a> {
        TwitterSession {
            api: self.twitter,
            access_token,
        }
    }
}
