//! Application constants

/// Tokens expiring within this window are refreshed before use (5 minutes)
pub const TOKEN_EXPIRY_MARGIN_MS: i64 = 5 * 60 * 1000;

/// Default lease for a PUBLISHING claim before it is considered abandoned (15 minutes)
pub const DEFAULT_CLAIM_LEASE_SECS: i64 = 900;

/// Default outbound HTTP timeout in seconds
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Default and maximum number of audit entries returned by the admin log view
pub const ADMIN_LOG_LIMIT: i64 = 100;

/// Largest image accepted for a tweet attachment (5 MB, Twitter's image limit)
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Cookie carrying the session token issued by the identity service
pub const SESSION_COOKIE_NAME: &str = "session_token";
