//! Thread content codec
//!
//! Stored content has two historical shapes per item: a bare string, or an
//! object with `text` and optional `imageUrl`. Older rows also hold the whole
//! array as stringified JSON in a text column. Everything is normalized here,
//! at the store boundary, into [`PostItem`]; nothing deeper in the pipeline
//! branches on the stored shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::outcome::Outcomes;
use crate::error::StoreError;

/// One post of a thread, in canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostItem {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl PostItem {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            image_url: None,
        }
    }

    pub fn with_image(text: impl Into<String>, image_url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            image_url: Some(image_url.into()),
        }
    }
}

/// Wire/storage representation: either shape is accepted on read.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoredItem {
    Text(String),
    Rich {
        text: String,
        #[serde(default, rename = "imageUrl", alias = "image_url")]
        image_url: Option<String>,
    },
}

impl From<StoredItem> for PostItem {
    fn from(item: StoredItem) -> Self {
        match item {
            StoredItem::Text(text) => PostItem::text(text),
            StoredItem::Rich { text, image_url } => PostItem {
                text,
                // Blank image URLs come from cleared editor fields
                image_url: image_url.filter(|u| !u.trim().is_empty()),
            },
        }
    }
}

impl<'de> Deserialize<'de> for PostItem {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        StoredItem::deserialize(deserializer).map(Into::into)
    }
}

/// Decode a stored content value into canonical items.
pub fn decode_content(value: &Value) -> Result<Vec<PostItem>, StoreError> {
    match unwrap_stringified(value)? {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items
            .into_iter()
            .map(|item| {
                serde_json::from_value::<PostItem>(item)
                    .map_err(|e| StoreError::Codec(format!("content item: {}", e)))
            })
            .collect(),
        other => Err(StoreError::Codec(format!(
            "content must be an array, got {}",
            kind(&other)
        ))),
    }
}

/// Encode canonical items for storage. Always writes the object shape.
pub fn encode_content(items: &[PostItem]) -> Value {
    Value::Array(
        items
            .iter()
            .map(|item| match &item.image_url {
                Some(url) => serde_json::json!({ "text": item.text, "imageUrl": url }),
                None => serde_json::json!({ "text": item.text }),
            })
            .collect(),
    )
}

/// Decode the target account list. Accepts an array of ids or stringified JSON.
pub fn decode_targets(value: Option<&Value>) -> Result<Vec<String>, StoreError> {
    let Some(value) = value else {
        return Ok(Vec::new());
    };
    match unwrap_stringified(value)? {
        Value::Null => Ok(Vec::new()),
        Value::Array(ids) => ids
            .into_iter()
            .map(|id| match id {
                Value::String(s) => Ok(s),
                other => Err(StoreError::Codec(format!(
                    "target account id must be a string, got {}",
                    kind(&other)
                ))),
            })
            .collect(),
        other => Err(StoreError::Codec(format!(
            "targets must be an array, got {}",
            kind(&other)
        ))),
    }
}

/// Decode the per-account outcome map. Arrays are pre-run target lists
/// written by older code into the same column and carry no outcomes.
pub fn decode_outcomes(value: Option<&Value>) -> Result<Outcomes, StoreError> {
    let Some(value) = value else {
        return Ok(Outcomes::new());
    };
    match unwrap_stringified(value)? {
        Value::Null | Value::Array(_) => Ok(Outcomes::new()),
        map @ Value::Object(_) => serde_json::from_value(map)
            .map_err(|e| StoreError::Codec(format!("outcomes: {}", e))),
        other => Err(StoreError::Codec(format!(
            "outcomes must be an object, got {}",
            kind(&other)
        ))),
    }
}

/// Parse values that were written as a JSON document inside a string.
fn unwrap_stringified(value: &Value) -> Result<Value, StoreError> {
    match value {
        Value::String(raw) => {
            let trimmed = raw.trim_start();
            if trimmed.starts_with('[') || trimmed.starts_with('{') {
                serde_json::from_str(raw)
                    .map_err(|e| StoreError::Codec(format!("stringified JSON: {}", e)))
            } else {
                // A lone string is a single-item thread
                Ok(Value::Array(vec![value.clone()]))
            }
        }
        other => Ok(other.clone()),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
