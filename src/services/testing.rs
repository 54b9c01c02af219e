//! Scripted Twitter API used by pipeline tests

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::twitter::{TokenResponse, TweetResponse, TwitterApi, TwitterError};

#[derive(Debug, Clone, PartialEq)]
pub struct PostCall {
    pub access_token: String,
    pub text: String,
    pub in_reply_to: Option<String>,
    pub media_ids: Vec<String>,
}

#[derive(Default)]
struct Script {
    refresh: Option<Result<TokenResponse, (u16, String)>>,
    refresh_calls: Vec<String>,
    /// Tweet text -> (status, body) to fail with
    post_failures: HashMap<String, (u16, String)>,
    /// Access tokens whose posts always fail
    token_failures: HashMap<String, (u16, String)>,
    posts: Vec<PostCall>,
    media_fails: bool,
    uploads: Vec<String>,
}

#[derive(Default)]
pub struct FakeTwitter {
    script: Mutex<Script>,
}

impl FakeTwitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant_refresh(&self, access_token: &str, refresh_token: Option<&str>, expires_in: i64) {
        self.script.lock().unwrap().refresh = Some(Ok(TokenResponse {
            access_token: access_token.to_string(),
            token_type: Some("bearer".to_string()),
            expires_in,
            refresh_token: refresh_token.map(str::to_string),
            scope: None,
        }));
    }

    pub fn reject_refresh(&self, status: u16, body: &str) {
        self.script.lock().unwrap().refresh = Some(Err((status, body.to_string())));
    }

    pub fn fail_post(&self, text: &str, status: u16, body: &str) {
        self.script
            .lock()
            .unwrap()
            .post_failures
            .insert(text.to_string(), (status, body.to_string()));
    }

    pub fn fail_posts_for_token(&self, access_token: &str, status: u16, body: &str) {
        self.script
            .lock()
            .unwrap()
            .token_failures
            .insert(access_token.to_string(), (status, body.to_string()));
    }

    pub fn fail_media(&self) {
        self.script.lock().unwrap().media_fails = true;
    }

    pub fn posts(&self) -> Vec<PostCall> {
        self.script.lock().unwrap().posts.clone()
    }

    pub fn uploads(&self) -> Vec<String> {
        self.script.lock().unwrap().uploads.clone()
    }

    pub fn refresh_calls(&self) -> Vec<String> {
        self.script.lock().unwrap().refresh_calls.clone()
    }
}

#[async_trait]
impl TwitterApi for FakeTwitter {
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, TwitterError> {
        let mut script = self.script.lock().unwrap();
        script.refresh_calls.push(refresh_token.to_string());
        match script.refresh.clone() {
            Some(Ok(tokens)) => Ok(tokens),
            Some(Err((status, body))) => Err(TwitterError::Api { status, body }),
            None => Err(TwitterError::Decode("no refresh scripted".to_string())),
        }
    }

    async fn post_tweet(
        &self,
        access_token: &str,
        text: &str,
        in_reply_to: Option<&str>,
        media_ids: &[String],
    ) -> Result<TweetResponse, TwitterError> {
        let mut script = self.script.lock().unwrap();
        script.posts.push(PostCall {
            access_token: access_token.to_string(),
            text: text.to_string(),
            in_reply_to: in_reply_to.map(str::to_string),
            media_ids: media_ids.to_vec(),
        });

        let failure = script
            .token_failures
            .get(access_token)
            .or_else(|| script.post_failures.get(text))
            .cloned();
        if let Some((status, body)) = failure {
            return Err(TwitterError::Api { status, body });
        }

        Ok(TweetResponse {
            id: format!("tweet-{}", script.posts.len()),
            text: text.to_string(),
        })
    }

    async fn upload_image(
        &self,
        _access_token: &str,
        image_url: &str,
    ) -> Result<String, TwitterError> {
        let mut script = self.script.lock().unwrap();
        script.uploads.push(image_url.to_string());
        if script.media_fails {
            return Err(TwitterError::Media(format!(
                "image download returned 404 Not Found for {}",
                image_url
            )));
        }
        Ok(format!("media-{}", script.uploads.len()))
    }
}
