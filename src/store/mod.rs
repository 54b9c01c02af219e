//! Persistence port used by the publication pipeline
//!
//! Route handlers query PostgreSQL directly through `domain::queries`; the
//! pipeline goes through [`Store`] so it can run against the in-memory
//! adapter in tests.

mod postgres;

#[cfg(test)]
pub mod memory;

pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{Account, DueThread, Outcomes, ThreadStatus};
use crate::error::StoreError;

#[async_trait]
pub trait Store: Send + Sync {
    /// SCHEDULED threads with `scheduled_at <= now`; unreadable rows come back as `Err` entries
    async fn find_due_threads(&self, now: DateTime<Utc>) -> Result<Vec<DueThread>, StoreError>;

    /// SCHEDULED -> PUBLISHING; false if the thread was no longer SCHEDULED
    async fn claim_thread(&self, thread_id: &str, now: DateTime<Utc>) -> Result<bool, StoreError>;

    /// PUBLISHING -> SCHEDULED for a claim abandoned before any provider call
    async fn release_claim(&self, thread_id: &str) -> Result<bool, StoreError>;

    /// Accounts among `ids` owned by `owner_id`
    async fn find_accounts(&self, ids: &[String], owner_id: &str)
    -> Result<Vec<Account>, StoreError>;

    async fn find_account(&self, account_id: &str) -> Result<Option<Account>, StoreError>;

    async fn update_account_tokens(
        &self,
        account_id: &str,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: i64,
    ) -> Result<(), StoreError>;

    /// Persist terminal status and outcomes in a single write
    async fn complete_thread(
        &self,
        thread_id: &str,
        status: ThreadStatus,
        outcomes: &Outcomes,
    ) -> Result<(), StoreError>;

    /// Fail PUBLISHING threads claimed before `cutoff`; returns (thread id, owner id)
    async fn fail_stale_claims(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<(String, String)>, StoreError>;
}
