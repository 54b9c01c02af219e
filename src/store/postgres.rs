//! PostgreSQL adapter

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::Store;
use crate::domain::models::NewAuditEntry;
use crate::domain::queries::{accounts, audit_logs, threads};
use crate::domain::{Account, DueThread, Outcomes, ThreadStatus};
use crate::error::StoreError;
use crate::services::audit::AuditSink;

#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn find_due_threads(&self, now: DateTime<Utc>) -> Result<Vec<DueThread>, StoreError> {
        threads::find_due_threads(&self.db, now).await
    }

    async fn claim_thread(&self, thread_id: &str, now: DateTime<Utc>) -> Result<bool, StoreError> {
        threads::claim_thread(&self.db, thread_id, now).await
    }

    async fn release_claim(&self, thread_id: &str) -> Result<bool, StoreError> {
        threads::release_claim(&self.db, thread_id).await
    }

    async fn find_accounts(
        &self,
        ids: &[String],
        owner_id: &str,
    ) -> Result<Vec<Account>, StoreError> {
        accounts::find_accounts_for_owner(&self.db, ids, owner_id).await
    }

    async fn find_account(&self, account_id: &str) -> Result<Option<Account>, StoreError> {
        accounts::find_account(&self.db, account_id).await
    }

    async fn update_account_tokens(
        &self,
        account_id: &str,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: i64,
    ) -> Result<(), StoreError> {
        accounts::update_account_tokens(&self.db, account_id, access_token, refresh_token, expires_at)
            .await
    }

    async fn complete_thread(
        &self,
        thread_id: &str,
        status: ThreadStatus,
        outcomes: &Outcomes,
    ) -> Result<(), StoreError> {
        threads::complete_thread(&self.db, thread_id, status, outcomes).await
    }

    async fn fail_stale_claims(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<(String, String)>, StoreError> {
        threads::fail_stale_claims(&self.db, cutoff).await
    }
}

#[async_trait]
impl AuditSink for PgStore {
    async fn append(&self, entry: &NewAuditEntry) -> Result<(), StoreError> {
        audit_logs::insert_entry(&self.db, entry).await
    }
}
