use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::TwitterConfig;
use crate::constants::MAX_IMAGE_BYTES;

/// Operations the pipeline needs from the Twitter API.
///
/// Implemented by [`TwitterClient`]; tests substitute a scripted fake.
#[async_trait]
pub trait TwitterApi: Send + Sync {
    /// Exchange a refresh token for a new token pair
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, TwitterError>;

    /// Post a tweet, optionally as a reply and with attached media
    async fn post_tweet(
        &self,
        access_token: &str,
        text: &str,
        in_reply_to: Option<&str>,
        media_ids: &[String],
    ) -> Result<TweetResponse, TwitterError>;

    /// Download the image at `image_url` and upload it, returning the media id
    async fn upload_image(&self, access_token: &str, image_url: &str)
    -> Result<String, TwitterError>;
}

#[derive(Clone)]
pub struct TwitterClient {
    client_id: String,
    client_secret: String,
    api_base: String,
    http: Client,
}

impl TwitterClient {
    pub fn new(config: &TwitterConfig, http: Client) -> Self {
        Self {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            api_base: config.api_base.clone(),
            http,
        }
    }

    /// Build Basic auth header for OAuth token requests
    fn basic_auth_header(&self) -> String {
        let credentials = format!("{}:{}", self.client_id, self.client_secret);
        format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(credentials)
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    /// Fetch image bytes and their content type from an arbitrary URL.
    /// `data:` URIs (as produced by inline image generators) are decoded locally.
    async fn fetch_image(&self, image_url: &str) -> Result<(Vec<u8>, String), TwitterError> {
        if let Some(rest) = image_url.strip_prefix("data:") {
            return decode_data_uri(rest);
        }

        let resp = self.http.get(image_url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(TwitterError::Media(format!(
                "image download returned {} for {}",
                status, image_url
            )));
        }

        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .unwrap_or_else(|| "image/jpeg".to_string());

        if !content_type.starts_with("image/") {
            return Err(TwitterError::Media(format!(
                "unsupported media type {} for {}",
                content_type, image_url
            )));
        }

        let bytes = resp.bytes().await?;
        check_size(bytes.len())?;
        Ok((bytes.to_vec(), content_type))
    }

    /// Simple (non-chunked) media upload, sufficient for images
    async fn upload_media(
        &self,
        access_token: &str,
        data: Vec<u8>,
        media_type: &str,
    ) -> Result<String, TwitterError> {
        let media_category = if media_type == "image/gif" {
            "tweet_gif"
        } else {
            "tweet_image"
        };

        let part = reqwest::multipart::Part::bytes(data)
            .mime_str(media_type)
            .map_err(|e| TwitterError::Media(format!("Invalid mime type: {}", e)))?;

        let form = reqwest::multipart::Form::new()
            .text("media_category", media_category.to_string())
            .text("media_type", media_type.to_string())
            .part("media", part);

        let resp = self
            .http
            .post(self.url("/2/media/upload"))
            .header("Authorization", format!("Bearer {}", access_token))
            .multipart(form)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(TwitterError::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        let wrapper: MediaUploadResponse = serde_json::from_str(&text).map_err(|e| {
            TwitterError::Decode(format!("Failed to parse response: {} - body: {}", e, text))
        })?;
        Ok(wrapper.data.id)
    }
}

#[async_trait]
impl TwitterApi for TwitterClient {
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, TwitterError> {
        let params = [
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
            ("client_id", self.client_id.as_str()),
        ];

        let resp = self
            .http
            .post(self.url("/2/oauth2/token"))
            .header("Authorization", self.basic_auth_header())
            .form(&params)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await?;
            return Err(TwitterError::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        let token: TokenResponse = resp.json().await?;
        Ok(token)
    }

    async fn post_tweet(
        &self,
        access_token: &str,
        text: &str,
        in_reply_to: Option<&str>,
        media_ids: &[String],
    ) -> Result<TweetResponse, TwitterError> {
        let body = tweet_body(text, in_reply_to, media_ids);

        let resp = self
            .http
            .post(self.url("/2/tweets"))
            .header("Authorization", format!("Bearer {}", access_token))
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await?;
            return Err(TwitterError::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        let wrapper: TweetResponseWrapper = resp.json().await?;
        Ok(wrapper.data)
    }

    async fn upload_image(
        &self,
        access_token: &str,
        image_url: &str,
    ) -> Result<String, TwitterError> {
        let (data, media_type) = self.fetch_image(image_url).await?;
        self.upload_media(access_token, data, &media_type).await
    }
}

/// JSON body for `POST /2/tweets`
fn tweet_body(text: &str, in_reply_to: Option<&str>, media_ids: &[String]) -> serde_json::Value {
    let mut body = serde_json::json!({ "text": text });

    if let Some(parent_id) = in_reply_to {
        body["reply"] = serde_json::json!({
            "in_reply_to_tweet_id": parent_id
        });
    }

    if !media_ids.is_empty() {
        body["media"] = serde_json::json!({
            "media_ids": media_ids
        });
    }

    body
}

fn decode_data_uri(rest: &str) -> Result<(Vec<u8>, String), TwitterError> {
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| TwitterError::Media("malformed data URI".to_string()))?;
    let media_type = meta
        .strip_suffix(";base64")
        .ok_or_else(|| TwitterError::Media("data URI is not base64 encoded".to_string()))?;
    if !media_type.starts_with("image/") {
        return Err(TwitterError::Media(format!(
            "unsupported media type {} in data URI",
            media_type
        )));
    }
    let data = base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| TwitterError::Media(format!("invalid base64 image: {}", e)))?;
    check_size(data.len())?;
    Ok((data, media_type.to_string()))
}

fn check_size(len: usize) -> Result<(), TwitterError> {
    if len > MAX_IMAGE_BYTES {
        return Err(TwitterError::Media(format!(
            "image is {} bytes, limit is {}",
            len, MAX_IMAGE_BYTES
        )));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct MediaUploadResponse {
    data: MediaUploadData,
}

#[derive(Debug, Deserialize)]
struct MediaUploadData {
    id: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    pub expires_in: i64,
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TweetResponseWrapper {
    data: TweetResponse,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TweetResponse {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Error)]
pub enum TwitterError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Twitter API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Twitter response error: {0}")]
    Decode(String),

    #[error("Media error: {0}")]
    Media(String),
}

impl TwitterError {
    /// Raw error body returned by the API, kept for diagnostics
    pub fn raw_payload(&self) -> Option<&str> {
        match self {
            TwitterError::Api { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Short human-readable message, preferring the API's own `detail`
    pub fn summary(&self) -> String {
        if let TwitterError::Api { status, body } = self {
            let detail = serde_json::from_str::<serde_json::Value>(body)
                .ok()
                .and_then(|v| {
                    v.get("detail")
                        .or_else(|| v.get("error_description"))
                        .or_else(|| v.get("title"))
                        .and_then(|d| d.as_str())
                        .map(str::to_string)
                });
            if let Some(detail) = detail {
                return format!("Request failed with code {}: {}", status, detail);
            }
            return format!("Request failed with code {}", status);
        }
        self.to_string()
    }
}
