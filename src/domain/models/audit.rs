//! Audit log entry model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditLevel {
    Info,
    Warn,
    Error,
    Success,
}

impl AuditLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditLevel::Info => "INFO",
            AuditLevel::Warn => "WARN",
            AuditLevel::Error => "ERROR",
            AuditLevel::Success => "SUCCESS",
        }
    }
}

impl std::str::FromStr for AuditLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INFO" => Ok(AuditLevel::Info),
            "WARN" => Ok(AuditLevel::Warn),
            "ERROR" => Ok(AuditLevel::Error),
            "SUCCESS" => Ok(AuditLevel::Success),
            other => Err(format!("unknown audit level '{}'", other)),
        }
    }
}

/// Entry to append
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditEntry {
    pub level: AuditLevel,
    pub message: String,
    pub details: Option<serde_json::Value>,
    pub user_id: Option<String>,
}

/// Stored entry
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub id: i64,
    pub level: AuditLevel,
    pub message: String,
    pub details: Option<serde_json::Value>,
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
}
