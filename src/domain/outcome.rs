//! Per-account outcome codes and thread status aggregation

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::models::ThreadStatus;

const ERROR_PREFIX: &str = "ERROR: ";

/// Short status recorded per target account after a publish attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeCode {
    Posted,
    AccountNotFound,
    MetaNotImplemented,
    UnsupportedProvider,
    Error(String),
}

impl OutcomeCode {
    pub fn is_success(&self) -> bool {
        matches!(self, OutcomeCode::Posted)
    }

    pub fn error(message: impl Into<String>) -> Self {
        OutcomeCode::Error(message.into())
    }
}

impl fmt::Display for OutcomeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeCode::Posted => write!(f, "POSTED"),
            OutcomeCode::AccountNotFound => write!(f, "ACCOUNT_NOT_FOUND"),
            OutcomeCode::MetaNotImplemented => write!(f, "META_NOT_IMPLEMENTED"),
            OutcomeCode::UnsupportedProvider => write!(f, "UNSUPPORTED_PROVIDER"),
            OutcomeCode::Error(message) => write!(f, "{}{}", ERROR_PREFIX, message),
        }
    }
}

impl FromStr for OutcomeCode {
    type Err = std::convert::Infallible;

    /// Unrecognized codes are kept as errors so nothing stored is lost.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "POSTED" => OutcomeCode::Posted,
            "ACCOUNT_NOT_FOUND" => OutcomeCode::AccountNotFound,
            "META_NOT_IMPLEMENTED" => OutcomeCode::MetaNotImplemented,
            "UNSUPPORTED_PROVIDER" => OutcomeCode::UnsupportedProvider,
            other => OutcomeCode::Error(
                other
                    .strip_prefix(ERROR_PREFIX)
                    .or_else(|| other.strip_prefix("ERROR:"))
                    .unwrap_or(other)
                    .trim_start()
                    .to_string(),
            ),
        })
    }
}

impl Serialize for OutcomeCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for OutcomeCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let Ok(code) = raw.parse::<OutcomeCode>();
        Ok(code)
    }
}

pub type Outcomes = BTreeMap<String, OutcomeCode>;

/// How a thread in which no account succeeded is reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusPolicy {
    /// FAILED when nothing was posted, PARTIAL only when something was
    #[default]
    Strict,
    /// PARTIAL whenever any account errored, matching rows written before
    /// the strict policy existed
    Legacy,
}

impl FromStr for StatusPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(StatusPolicy::Strict),
            "legacy" => Ok(StatusPolicy::Legacy),
            other => Err(format!("unknown status policy '{}'", other)),
        }
    }
}

/// Terminal thread status for a completed set of per-account outcomes.
pub fn final_status(outcomes: &Outcomes, policy: StatusPolicy) -> ThreadStatus {
    if outcomes.is_empty() {
        return ThreadStatus::Failed;
    }

    let succeeded = outcomes.values().filter(|o| o.is_success()).count();

    if succeeded == outcomes.len() {
        ThreadStatus::Posted
    } else if succeeded > 0 {
        ThreadStatus::Partial
    } else {
        match policy {
            StatusPolicy::Strict => ThreadStatus::Failed,
            StatusPolicy::Legacy => ThreadStatus::Partial,
        }
    }
}
