//! Append-only audit trail
//!
//! Every entry is mirrored to `tracing`. A failed write is logged and
//! swallowed: auditing must never change the outcome of the operation it
//! describes.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::models::{AuditLevel, NewAuditEntry};
use crate::error::StoreError;

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, entry: &NewAuditEntry) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct AuditLogger {
    sink: Arc<dyn AuditSink>,
}

impl AuditLogger {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    pub async fn log(
        &self,
        level: AuditLevel,
        message: &str,
        details: Option<Value>,
        user_id: Option<&str>,
    ) {
        let details_text = details.as_ref().map(Value::to_string).unwrap_or_default();
        match level {
            AuditLevel::Error => {
                tracing::error!(user_id, details = %details_text, "{}", message)
            }
            AuditLevel::Warn => tracing::warn!(user_id, details = %details_text, "{}", message),
            AuditLevel::Info | AuditLevel::Success => {
                tracing::info!(user_id, level = level.as_str(), details = %details_text, "{}", message)
            }
        }

        let entry = NewAuditEntry {
            level,
            message: message.to_string(),
            details,
            user_id: user_id.map(str::to_string),
        };

        if let Err(e) = self.sink.append(&entry).await {
            tracing::error!(error = %e, entry = message, "Failed to write audit log entry");
        }
    }

    pub async fn info(&self, message: &str, details: Value, user_id: Option<&str>) {
        self.log(AuditLevel::Info, message, Some(details), user_id).await
    }

    pub async fn warn(&self, message: &str, details: Value, user_id: Option<&str>) {
        self.log(AuditLevel::Warn, message, Some(details), user_id).await
    }

    pub async fn error(&self, message: &str, details: Value, user_id: Option<&str>) {
        self.log(AuditLevel::Error, message, Some(details), user_id).await
    }

    pub async fn success(&self, message: &str, details: Value, user_id: Option<&str>) {
        self.log(AuditLevel::Success, message, Some(details), user_id).await
    }
}
