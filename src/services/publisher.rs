//! Provider publishing
//!
//! Posts a thread's items to one linked account. Whatever happens, the
//! result is a [`PublishOutcome`]; errors never cross the per-account
//! boundary.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

use super::audit::AuditLogger;
use super::credentials::{CredentialResolver, TwitterSession};
use crate::domain::{Account, OutcomeCode, PostItem, Provider};
use crate::error::PublishError;

const META_NOT_IMPLEMENTED_MESSAGE: &str =
    "Facebook posting is not implemented yet; connect the Graph API to publish with this account.";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostedItem {
    pub index: usize,
    pub post_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PublishOutcome {
    Posted(Vec<PostedItem>),
    NotImplemented(String),
    Failed(PublishError),
}

impl PublishOutcome {
    pub fn outcome_code(&self) -> OutcomeCode {
        match self {
            PublishOutcome::Posted(_) => OutcomeCode::Posted,
            PublishOutcome::NotImplemented(_) => OutcomeCode::MetaNotImplemented,
            PublishOutcome::Failed(PublishError::AccountNotFound(_)) => OutcomeCode::AccountNotFound,
            PublishOutcome::Failed(PublishError::UnsupportedProvider(_)) => {
                OutcomeCode::UnsupportedProvider
            }
            PublishOutcome::Failed(e) => OutcomeCode::error(e.to_string()),
        }
    }
}

pub struct Publisher<'a> {
    resolver: CredentialResolver<'a>,
    audit: &'a AuditLogger,
}

impl<'a> Publisher<'a> {
    pub fn new(resolver: CredentialResolver<'a>, audit: &'a AuditLogger) -> Self {
        Self { resolver, audit }
    }

    /// Publish `items` to `account`. `fallback_image` applies to items
    /// without their own image.
    pub async fn publish(
        &self,
        account: &Account,
        items: &[PostItem],
        fallback_image: Option<&str>,
        now: DateTime<Utc>,
    ) -> PublishOutcome {
        match &account.provider {
            Provider::Twitter => {
                let session = match self.resolver.resolve(&account.id, now).await {
                    Ok(session) => session,
                    Err(e) => return PublishOutcome::Failed(e),
                };
                match self
                    .publish_twitter(&session, account, items, fallback_image)
                    .await
                {
                    Ok(posted) => PublishOutcome::Posted(posted),
                    Err(e) => PublishOutcome::Failed(e),
                }
            }
            Provider::Facebook => {
                PublishOutcome::NotImplemented(META_NOT_IMPLEMENTED_MESSAGE.to_string())
            }
            Provider::Other(name) => {
                PublishOutcome::Failed(PublishError::UnsupportedProvider(name.clone()))
            }
        }
    }

    /// Post items in order, each replying to the previous one.
    async fn publish_twitter(
        &self,
        session: &TwitterSession<'_>,
        account: &Account,
        items: &[PostItem],
        fallback_image: Option<&str>,
    ) -> Result<Vec<PostedItem>, PublishError> {
        if items.is_empty() {
            return Err(PublishError::ProviderPublishFailed {
                item_index: 0,
                message: "Thread has no content".to_string(),
                payload: None,
            });
        }

        let mut posted: Vec<PostedItem> = Vec::with_capacity(items.len());

        for (index, item) in items.iter().enumerate() {
            let image_url = item.image_url.as_deref().or(fallback_image);
            let media_id = match image_url {
                Some(url) => self.upload_media(session, account, index, url).await,
                None => None,
            };
            let media_ids: Vec<String> = media_id.iter().cloned().collect();

            let in_reply_to = posted.last().map(|p| p.post_id.as_str());
            let tweet = session
                .post_tweet(&item.text, in_reply_to, &media_ids)
                .await
                .map_err(|e| {
                    tracing::warn!(
                        account_id = %account.id,
                        item_index = index,
                        error = %e,
                        "Tweet failed, stopping thread"
                    );
                    PublishError::ProviderPublishFailed {
                        item_index: index,
                        message: e.summary(),
                        payload: e.raw_payload().map(str::to_string),
                    }
                })?;

            tracing::debug!(account_id = %account.id, item_index = index, tweet_id = %tweet.id, "Posted tweet");
            posted.push(PostedItem {
                index,
                post_id: tweet.id,
                media_id,
            });
        }

        Ok(posted)
    }

    /// Upload an item's image. Failure is recorded and the item goes out as text only.
    async fn upload_media(
        &self,
        session: &TwitterSession<'_>,
        account: &Account,
        index: usize,
        image_url: &str,
    ) -> Option<String> {
        match session.upload_image(image_url).await {
            Ok(media_id) => Some(media_id),
            Err(e) => {
                tracing::warn!(
                    account_id = %account.id,
                    item_index = index,
                    error = %e,
                    "Media upload failed, posting text only"
                );
                self.audit
                    .warn(
                        "Media upload failed, posted without image",
                        json!({
                            "accountId": account.id,
                            "itemIndex": index,
                            "imageUrl": image_url,
                            "error": e.to_string(),
                            "payload": e.raw_payload(),
                        }),
                        Some(&account.owner_id),
                    )
                    .await;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::AuditLevel;
    use crate::services::testing::FakeTwitter;
    use crate::store::memory::MemoryStore;
    use std::sync::Arc;

    fn twitter_account(id: &str) -> Account {
        Account {
            id: id.to_string(),
            owner_id: "user1".to_string(),
            provider: Provider::Twitter,
            provider_account_id: format!("tw-{}", id),
            access_token: Some(format!("{}-token", id)),
            refresh_token: None,
            expires_at: Some(Utc::now().timestamp() + 3600),
        }
    }

    struct Harness {
        store: Arc<MemoryStore>,
        twitter: FakeTwitter,
        audit: AuditLogger,
    }

    impl Harness {
        fn new() -> Self {
            let store = Arc::new(MemoryStore::new());
            let audit = AuditLogger::new(store.clone());
            Self {
                store,
                twitter: FakeTwitter::new(),
                audit,
            }
        }

        async fn publish(
            &self,
            account: &Account,
            items: &[PostItem],
            fallback_image: Option<&str>,
        ) -> PublishOutcome {
            let resolver = CredentialResolver::new(self.store.as_ref(), &self.twitter, &self.audit);
            Publisher::new(resolver, &self.audit)
                .publish(account, items, fallback_image, Utc::now())
                .await
        }
    }

    #[tokio::test]
    async fn posts_items_in_order_as_reply_chain() {
        let h = Harness::new();
        let account = twitter_account("acc1");
        h.store.add_account(account.clone());

        let outcome = h
            .publish(&account, &[PostItem::text("Hello"), PostItem::text("World")], None)
            .await;

        assert_eq!(outcome.outcome_code(), OutcomeCode::Posted);
        let posts = h.twitter.posts();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].text, "Hello");
        assert_eq!(posts[0].in_reply_to, None);
        assert_eq!(posts[0].access_token, "acc1-token");
        assert_eq!(posts[1].text, "World");
        assert_eq!(posts[1].in_reply_to.as_deref(), Some("tweet-1"));
    }

    #[tokio::test]
    async fn item_image_beats_thread_image() {
        let h = Harness::new();
        let account = twitter_account("acc1");
        h.store.add_account(account.clone());

        let items = [
            PostItem::with_image("first", "https://img.example/item.png"),
            PostItem::text("second"),
        ];
        let outcome = h
            .publish(&account, &items, Some("https://img.example/thread.png"))
            .await;

        assert!(matches!(outcome, PublishOutcome::Posted(_)));
        assert_eq!(
            h.twitter.uploads(),
            vec![
                "https://img.example/item.png".to_string(),
                "https://img.example/thread.png".to_string(),
            ]
        );
        let posts = h.twitter.posts();
        assert_eq!(posts[0].media_ids, vec!["media-1".to_string()]);
        assert_eq!(posts[1].media_ids, vec!["media-2".to_string()]);
    }

    #[tokio::test]
    async fn media_failure_still_posts_text() {
        let h = Harness::new();
        let account = twitter_account("acc1");
        h.store.add_account(account.clone());
        h.twitter.fail_media();

        let items = [PostItem::with_image("with picture", "https://img.example/gone.png")];
        let outcome = h.publish(&account, &items, None).await;

        assert_eq!(outcome.outcome_code(), OutcomeCode::Posted);
        let posts = h.twitter.posts();
        assert_eq!(posts.len(), 1);
        assert!(posts[0].media_ids.is_empty());
        let entries = h.store.audit_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].level, AuditLevel::Warn);
    }

    #[tokio::test]
    async fn failed_post_stops_remaining_items_and_keeps_payload() {
        let h = Harness::new();
        let account = twitter_account("acc1");
        h.store.add_account(account.clone());
        let payload = r#"{"detail":"You are not allowed to create a Tweet with duplicate content.","status":403}"#;
        h.twitter.fail_post("two", 403, payload);

        let items = [
            PostItem::text("one"),
            PostItem::text("two"),
            PostItem::text("three"),
        ];
        let outcome = h.publish(&account, &items, None).await;

        assert_eq!(
            outcome,
            PublishOutcome::Failed(PublishError::ProviderPublishFailed {
                item_index: 1,
                message: "Request failed with code 403: You are not allowed to create a Tweet with duplicate content."
                    .to_string(),
                payload: Some(payload.to_string()),
            })
        );
        assert_eq!(h.twitter.posts().len(), 2);
        assert_eq!(
            outcome.outcome_code().to_string(),
            "ERROR: Request failed with code 403: You are not allowed to create a Tweet with duplicate content."
        );
    }

    #[tokio::test]
    async fn facebook_is_not_implemented_and_never_calls_network() {
        let h = Harness::new();
        let mut account = twitter_account("fb1");
        account.provider = Provider::Facebook;

        let outcome = h.publish(&account, &[PostItem::text("hi")], None).await;

        assert!(matches!(outcome, PublishOutcome::NotImplemented(_)));
        assert_eq!(outcome.outcome_code(), OutcomeCode::MetaNotImplemented);
        assert!(h.twitter.posts().is_empty());
    }

    #[tokio::test]
    async fn unknown_provider_is_unsupported() {
        let h = Harness::new();
        let mut account = twitter_account("m1");
        account.provider = Provider::Other("mastodon".to_string());

        let outcome = h.publish(&account, &[PostItem::text("hi")], None).await;

        assert_eq!(outcome.outcome_code(), OutcomeCode::UnsupportedProvider);
    }

    #[tokio::test]
    async fn empty_content_fails_without_posting() {
        let h = Harness::new();
        let account = twitter_account("acc1");
        h.store.add_account(account.clone());

        let outcome = h.publish(&account, &[], None).await;

        assert_eq!(
            outcome.outcome_code(),
            OutcomeCode::error("Thread has no content")
        );
        assert!(h.twitter.posts().is_empty());
    }
}
