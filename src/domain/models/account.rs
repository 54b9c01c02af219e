//! Linked social account model

use std::fmt;

/// Social platform an account is linked to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provider {
    Twitter,
    Facebook,
    Other(String),
}

impl Provider {
    pub fn as_str(&self) -> &str {
        match self {
            Provider::Twitter => "twitter",
            Provider::Facebook => "facebook",
            Provider::Other(name) => name,
        }
    }
}

impl From<&str> for Provider {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "twitter" | "x" => Provider::Twitter,
            "facebook" | "meta" => Provider::Facebook,
            _ => Provider::Other(s.to_string()),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// OAuth credentials binding one external identity to one user
#[derive(Clone, PartialEq)]
pub struct Account {
    pub id: String,
    pub owner_id: String,
    pub provider: Provider,
    pub provider_account_id: String,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    /// Access token expiry as Unix seconds
    pub expires_at: Option<i64>,
}

// Tokens stay out of logs
impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("owner_id", &self.owner_id)
            .field("provider", &self.provider)
            .field("provider_account_id", &self.provider_account_id)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
