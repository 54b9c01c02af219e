//! In-memory adapter for pipeline tests

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::Store;
use crate::domain::models::NewAuditEntry;
use crate::domain::{Account, DueThread, MalformedThread, Outcomes, Thread, ThreadStatus};
use crate::error::StoreError;
use crate::services::audit::AuditSink;

#[derive(Default)]
struct State {
    threads: Vec<Thread>,
    accounts: Vec<Account>,
    claimed_at: HashMap<String, DateTime<Utc>>,
    audit: Vec<NewAuditEntry>,
    /// Threads another run grabs between selection and claim
    contested: HashSet<String>,
    /// Threads whose completion write fails
    broken_writes: HashSet<String>,
    complete_calls: Vec<String>,
    /// Thread id -> decode error reported by the selector
    unreadable: HashMap<String, String>,
    fail_account_lookups: bool,
    fail_audit: bool,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_thread(&self, thread: Thread) {
        self.state.lock().unwrap().threads.push(thread);
    }

    pub fn add_account(&self, account: Account) {
        self.state.lock().unwrap().accounts.push(account);
    }

    pub fn thread(&self, id: &str) -> Thread {
        self.state
            .lock()
            .unwrap()
            .threads
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .expect("thread exists")
    }

    pub fn account(&self, id: &str) -> Account {
        self.state
            .lock()
            .unwrap()
            .accounts
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .expect("account exists")
    }

    pub fn audit_entries(&self) -> Vec<NewAuditEntry> {
        self.state.lock().unwrap().audit.clone()
    }

    pub fn complete_calls(&self) -> Vec<String> {
        self.state.lock().unwrap().complete_calls.clone()
    }

    pub fn contest_claim(&self, thread_id: &str) {
        self.state.lock().unwrap().contested.insert(thread_id.to_string());
    }

    pub fn break_writes_for(&self, thread_id: &str) {
        self.state.lock().unwrap().broken_writes.insert(thread_id.to_string());
    }

    /// Make a stored thread come back from the selector as undecodable
    pub fn corrupt_thread(&self, thread_id: &str, reason: &str) {
        self.state
            .lock()
            .unwrap()
            .unreadable
            .insert(thread_id.to_string(), reason.to_string());
    }

    pub fn fail_account_lookups(&self) {
        self.state.lock().unwrap().fail_account_lookups = true;
    }

    pub fn is_claimed(&self, thread_id: &str) -> bool {
        self.state.lock().unwrap().claimed_at.contains_key(thread_id)
    }

    pub fn fail_audit_writes(&self) {
        self.state.lock().unwrap().fail_audit = true;
    }

    pub fn set_claimed(&self, thread_id: &str, at: DateTime<Utc>) {
        let mut state = self.state.lock().unwrap();
        if let Some(thread) = state.threads.iter_mut().find(|t| t.id == thread_id) {
            thread.status = ThreadStatus::Publishing;
        }
        state.claimed_at.insert(thread_id.to_string(), at);
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_due_threads(&self, now: DateTime<Utc>) -> Result<Vec<DueThread>, StoreError> {
        let state = self.state.lock().unwrap();
        let mut due: Vec<&Thread> = state
            .threads
            .iter()
            .filter(|t| t.status == ThreadStatus::Scheduled)
            .filter(|t| t.scheduled_at.is_some_and(|at| at <= now))
            .collect();
        due.sort_by_key(|t| t.scheduled_at);
        Ok(due
            .into_iter()
            .map(|t| match state.unreadable.get(&t.id) {
                Some(reason) => Err(MalformedThread {
                    id: t.id.clone(),
                    owner_id: t.owner_id.clone(),
                    reason: reason.clone(),
                }),
                None => Ok(t.clone()),
            })
            .collect())
    }

    async fn claim_thread(&self, thread_id: &str, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut state = self.state.lock().unwrap();
        if state.contested.contains(thread_id) {
            return Ok(false);
        }
        let Some(thread) = state.threads.iter_mut().find(|t| t.id == thread_id) else {
            return Ok(false);
        };
        if thread.status != ThreadStatus::Scheduled {
            return Ok(false);
        }
        thread.status = ThreadStatus::Publishing;
        state.claimed_at.insert(thread_id.to_string(), now);
        Ok(true)
    }

    async fn release_claim(&self, thread_id: &str) -> Result<bool, StoreError> {
        let mut state = self.state.lock().unwrap();
        let Some(thread) = state.threads.iter_mut().find(|t| t.id == thread_id) else {
            return Ok(false);
        };
        if thread.status != ThreadStatus::Publishing {
            return Ok(false);
        }
        thread.status = ThreadStatus::Scheduled;
        state.claimed_at.remove(thread_id);
        Ok(true)
    }

    async fn find_accounts(
        &self,
        ids: &[String],
        owner_id: &str,
    ) -> Result<Vec<Account>, StoreError> {
        let state = self.state.lock().unwrap();
        if state.fail_account_lookups {
            return Err(StoreError::Codec("simulated account lookup failure".to_string()));
        }
        Ok(state
            .accounts
            .iter()
            .filter(|a| ids.contains(&a.id) && a.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn find_account(&self, account_id: &str) -> Result<Option<Account>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state.accounts.iter().find(|a| a.id == account_id).cloned())
    }

    async fn update_account_tokens(
        &self,
        account_id: &str,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: i64,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        if let Some(account) = state.accounts.iter_mut().find(|a| a.id == account_id) {
            account.access_token = Some(access_token.to_string());
            if let Some(refresh_token) = refresh_token {
                account.refresh_token = Some(refresh_token.to_string());
            }
            account.expires_at = Some(expires_at);
        }
        Ok(())
    }

    async fn complete_thread(
        &self,
        thread_id: &str,
        status: ThreadStatus,
        outcomes: &Outcomes,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        state.complete_calls.push(thread_id.to_string());
        if state.broken_writes.contains(thread_id) {
            return Err(StoreError::Codec("simulated write failure".to_string()));
        }
        state.claimed_at.remove(thread_id);
        if let Some(thread) = state.threads.iter_mut().find(|t| t.id == thread_id) {
            thread.status = status;
            thread.outcomes = outcomes.clone();
        }
        Ok(())
    }

    async fn fail_stale_claims(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<(String, String)>, StoreError> {
        let mut state = self.state.lock().unwrap();
        let stale: HashSet<String> = state
            .claimed_at
            .iter()
            .filter(|(_, at)| **at < cutoff)
            .map(|(id, _)| id.clone())
            .collect();

        let mut failed = Vec::new();
        for thread in state.threads.iter_mut() {
            if thread.status == ThreadStatus::Publishing && stale.contains(&thread.id) {
                thread.status = ThreadStatus::Failed;
                failed.push((thread.id.clone(), thread.owner_id.clone()));
            }
        }
        for (id, _) in &failed {
            state.claimed_at.remove(id);
        }
        Ok(failed)
    }
}

#[async_trait]
impl AuditSink for MemoryStore {
    async fn append(&self, entry: &NewAuditEntry) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_audit {
            return Err(StoreError::Codec("simulated audit failure".to_string()));
        }
        state.audit.push(entry.clone());
        Ok(())
    }
}
