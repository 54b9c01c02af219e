//! Request and response bodies for the user-facing endpoints

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{AuditLogEntry, PostItem, Thread};
use crate::services::publisher::PostedItem;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRequest {
    #[serde(default)]
    pub thread: Vec<PostItem>,
    #[serde(default)]
    pub account_ids: Vec<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRequest {
    #[serde(default)]
    pub thread: Vec<PostItem>,
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub account_ids: Vec<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateThreadRequest {
    pub content: Option<Vec<PostItem>>,
    pub image_url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountResult {
    pub account_id: String,
    pub platform: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub posts: Vec<PostedItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountError {
    pub account_id: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct PostResponse {
    pub success: bool,
    pub results: Vec<AccountResult>,
    pub errors: Vec<AccountError>,
    pub partial: bool,
}

impl PostResponse {
    pub fn new(results: Vec<AccountResult>, errors: Vec<AccountError>) -> Self {
        Self {
            success: results.iter().any(|r| r.success),
            partial: !errors.is_empty() && !results.is_empty(),
            results,
            errors,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ThreadEnvelope {
    pub success: bool,
    pub thread: Thread,
}

#[derive(Debug, Serialize)]
pub struct ThreadList {
    pub success: bool,
    pub threads: Vec<Thread>,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct LogsResponse {
    pub logs: Vec<AuditLogEntry>,
}

/// Blank image fields from the editor mean "no image"
pub fn normalize_image_url(image_url: Option<String>) -> Option<String> {
    image_url
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn post_request_accepts_both_item_shapes() {
        let req: PostRequest = serde_json::from_value(json!({
            "thread": ["plain", { "text": "rich", "imageUrl": "https://img.example/a.png" }],
            "accountIds": ["acc1"]
        }))
        .unwrap();
        assert_eq!(
            req.thread,
            vec![
                PostItem::text("plain"),
                PostItem::with_image("rich", "https://img.example/a.png")
            ]
        );
        assert_eq!(req.account_ids, vec!["acc1".to_string()]);
        assert_eq!(req.image_url, None);
    }

    #[test]
    fn post_response_flags() {
        let ok = AccountResult {
            account_id: "acc1".to_string(),
            platform: "twitter".to_string(),
            success: true,
            posts: Vec::new(),
            error: None,
        };
        let failed = AccountError {
            account_id: "acc2".to_string(),
            error: "Request failed with code 401".to_string(),
        };

        let response = PostResponse::new(vec![ok], vec![failed]);
        assert!(response.success);
        assert!(response.partial);

        let none = PostResponse::new(Vec::new(), Vec::new());
        assert!(!none.success);
        assert!(!none.partial);
    }

    #[test]
    fn blank_image_url_is_dropped() {
        assert_eq!(normalize_image_url(Some("  ".to_string())), None);
        assert_eq!(
            normalize_image_url(Some(" https://img.example/a.png ".to_string())).as_deref(),
            Some("https://img.example/a.png")
        );
    }
}
