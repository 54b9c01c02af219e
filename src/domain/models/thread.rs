//! Thread model definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::postgres::{PgArgumentBuffer, PgTypeInfo, PgValueRef};
use sqlx::{Decode, Encode, Postgres, Type};

use crate::domain::content::PostItem;
use crate::domain::outcome::Outcomes;

/// Thread lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThreadStatus {
    Draft,
    Scheduled,
    /// Claimed by a publication run that has not finished yet
    Publishing,
    Posted,
    Partial,
    Failed,
}

impl ThreadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreadStatus::Draft => "DRAFT",
            ThreadStatus::Scheduled => "SCHEDULED",
            ThreadStatus::Publishing => "PUBLISHING",
            ThreadStatus::Posted => "POSTED",
            ThreadStatus::Partial => "PARTIAL",
            ThreadStatus::Failed => "FAILED",
        }
    }

    /// Whether the user may still edit the thread
    pub fn is_editable(&self) -> bool {
        !matches!(self, ThreadStatus::Publishing | ThreadStatus::Posted)
    }
}

impl std::str::FromStr for ThreadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DRAFT" => Ok(ThreadStatus::Draft),
            "SCHEDULED" => Ok(ThreadStatus::Scheduled),
            "PUBLISHING" => Ok(ThreadStatus::Publishing),
            "POSTED" => Ok(ThreadStatus::Posted),
            "PARTIAL" => Ok(ThreadStatus::Partial),
            "FAILED" => Ok(ThreadStatus::Failed),
            other => Err(format!("unknown thread status '{}'", other)),
        }
    }
}

// Stored as TEXT
impl Type<Postgres> for ThreadStatus {
    fn type_info() -> PgTypeInfo {
        <String as Type<Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        <String as Type<Postgres>>::compatible(ty)
    }
}

impl<'r> Decode<'r, Postgres> for ThreadStatus {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let s = <&str as Decode<Postgres>>::decode(value)?;
        Ok(s.parse()?)
    }
}

impl Encode<'_, Postgres> for ThreadStatus {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        <&str as Encode<Postgres>>::encode_by_ref(&self.as_str(), buf)
    }
}

/// A thread with its content normalized and its targets/outcomes split apart
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
    pub id: String,
    pub owner_id: String,
    pub content: Vec<PostItem>,
    /// Fallback image for items without their own
    pub image_url: Option<String>,
    pub status: ThreadStatus,
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Account ids selected for publication; never rewritten by a run
    pub targets: Vec<String>,
    /// Per-account result of the last run
    pub outcomes: Outcomes,
    pub created_at: DateTime<Utc>,
}

/// A stored row whose JSON columns no longer decode
#[derive(Debug, Clone, PartialEq)]
pub struct MalformedThread {
    pub id: String,
    pub owner_id: String,
    pub reason: String,
}

/// A due row as handed to the pipeline. Each row decodes on its own.
pub type DueThread = Result<Thread, MalformedThread>;

/// Insert payload for a new thread
#[derive(Debug, Clone)]
pub struct NewThread {
    pub owner_id: String,
    pub content: Vec<PostItem>,
    pub image_url: Option<String>,
    pub status: ThreadStatus,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub targets: Vec<String>,
}
