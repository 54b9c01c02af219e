//! Scheduled thread publication
//!
//! One run selects every due SCHEDULED thread, claims it, publishes it to
//! each target account and writes the per-account outcomes back in a single
//! update. Threads are processed sequentially; a failure on one thread never
//! stops the others.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::json;

use crate::domain::outcome::final_status;
use crate::domain::{
    Account, MalformedThread, OutcomeCode, Outcomes, StatusPolicy, Thread, ThreadStatus,
};
use crate::error::{PublishError, StoreError};
use crate::services::audit::AuditLogger;
use crate::services::credentials::CredentialResolver;
use crate::services::publisher::{PublishOutcome, Publisher};
use crate::services::twitter::TwitterApi;
use crate::store::Store;

/// Result of one run, as returned by the trigger endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    /// Number of due threads selected
    pub processed: usize,
    pub results: Vec<ThreadRunResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "lowercase")]
pub enum ThreadRunResult {
    Completed {
        id: String,
        status: ThreadStatus,
        outcomes: Outcomes,
    },
    /// Claimed by an overlapping run
    Skipped { id: String },
    Errored { id: String, error: String },
}

#[derive(Clone)]
pub struct Publication {
    store: Arc<dyn Store>,
    twitter: Arc<dyn TwitterApi>,
    audit: AuditLogger,
    policy: StatusPolicy,
    claim_lease: Duration,
}

impl Publication {
    pub fn new(
        store: Arc<dyn Store>,
        twitter: Arc<dyn TwitterApi>,
        audit: AuditLogger,
        policy: StatusPolicy,
        claim_lease_secs: i64,
    ) -> Self {
        Self {
            store,
            twitter,
            audit,
            policy,
            claim_lease: Duration::seconds(claim_lease_secs),
        }
    }

    /// Publish every thread due at `now`.
    ///
    /// Only a failure to select due threads aborts the run.
    pub async fn run_due(&self, now: DateTime<Utc>) -> Result<RunSummary, StoreError> {
        self.reap_stale_claims(now).await;

        let due = self.store.find_due_threads(now).await?;
        if !due.is_empty() {
            tracing::info!(count = due.len(), "Publishing due threads");
        }

        let mut results = Vec::with_capacity(due.len());
        for entry in &due {
            let result = match entry {
                Ok(thread) => self.run_thread(thread, now).await,
                Err(bad) => self.fail_unreadable(bad, now).await,
            };
            results.push(result);
        }

        Ok(RunSummary {
            processed: due.len(),
            results,
        })
    }

    async fn run_thread(&self, thread: &Thread, now: DateTime<Utc>) -> ThreadRunResult {
        match self.process_thread(thread, now).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(thread_id = %thread.id, error = %e, "Failed to process scheduled thread");
                self.audit
                    .error(
                        "Failed to process scheduled thread",
                        json!({ "threadId": thread.id, "error": e.to_string() }),
                        Some(&thread.owner_id),
                    )
                    .await;
                ThreadRunResult::Errored {
                    id: thread.id.clone(),
                    error: e.to_string(),
                }
            }
        }
    }

    /// Mark a due thread whose stored content cannot be read as FAILED,
    /// so it is not selected again.
    async fn fail_unreadable(&self, bad: &MalformedThread, now: DateTime<Utc>) -> ThreadRunResult {
        tracing::error!(thread_id = %bad.id, reason = %bad.reason, "Scheduled thread is unreadable");

        match self.store.claim_thread(&bad.id, now).await {
            Ok(false) => {
                return ThreadRunResult::Skipped { id: bad.id.clone() };
            }
            Ok(true) => {
                if let Err(e) = self
                    .store
                    .complete_thread(&bad.id, ThreadStatus::Failed, &Outcomes::new())
                    .await
                {
                    tracing::error!(thread_id = %bad.id, error = %e, "Failed to mark unreadable thread as failed");
                }
            }
            Err(e) => {
                tracing::error!(thread_id = %bad.id, error = %e, "Failed to claim unreadable thread");
            }
        }

        self.audit
            .error(
                "Scheduled thread content is unreadable",
                json!({ "threadId": bad.id, "error": bad.reason }),
                Some(&bad.owner_id),
            )
            .await;

        ThreadRunResult::Errored {
            id: bad.id.clone(),
            error: bad.reason.clone(),
        }
    }

    /// Fail threads left in PUBLISHING by a run that never finished.
    /// They may have been partially published, so they are not retried.
    async fn reap_stale_claims(&self, now: DateTime<Utc>) {
        let stale = match self.store.fail_stale_claims(now - self.claim_lease).await {
            Ok(stale) => stale,
            Err(e) => {
                tracing::error!(error = %e, "Failed to release stale publication claims");
                return;
            }
        };

        for (thread_id, owner_id) in stale {
            self.audit
                .warn(
                    "Publication claim expired, thread marked as failed",
                    json!({
                        "threadId": thread_id,
                        "leaseSecs": self.claim_lease.num_seconds(),
                    }),
                    Some(&owner_id),
                )
                .await;
        }
    }

    async fn process_thread(
        &self,
        thread: &Thread,
        now: DateTime<Utc>,
    ) -> Result<ThreadRunResult, StoreError> {
        if !self.store.claim_thread(&thread.id, now).await? {
            tracing::info!(thread_id = %thread.id, "Thread already claimed by another run, skipping");
            return Ok(ThreadRunResult::Skipped {
                id: thread.id.clone(),
            });
        }

        let mut outcomes = Outcomes::new();
        let result = self.publish_claimed(thread, now, &mut outcomes).await;
        if result.is_err() {
            self.hand_back_claim(thread, &outcomes).await;
        }
        result
    }

    /// Hand back a claim after a store error. Untouched threads go back to
    /// SCHEDULED; attempted ones get their outcomes written.
    async fn hand_back_claim(&self, thread: &Thread, outcomes: &Outcomes) {
        let released = if outcomes.is_empty() {
            self.store.release_claim(&thread.id).await.map(|_| ())
        } else {
            let status = final_status(outcomes, self.policy);
            self.store.complete_thread(&thread.id, status, outcomes).await
        };

        if let Err(e) = released {
            tracing::error!(thread_id = %thread.id, error = %e, "Failed to release publication claim");
        }
    }

    async fn publish_claimed(
        &self,
        thread: &Thread,
        now: DateTime<Utc>,
        outcomes: &mut Outcomes,
    ) -> Result<ThreadRunResult, StoreError> {
        if thread.targets.is_empty() {
            self.store
                .complete_thread(&thread.id, ThreadStatus::Failed, outcomes)
                .await?;
            self.audit
                .warn(
                    "No accounts selected for scheduled thread",
                    json!({
                        "threadId": thread.id,
                        "error": PublishError::NoTargetAccounts.to_string(),
                    }),
                    Some(&thread.owner_id),
                )
                .await;
            return Ok(ThreadRunResult::Completed {
                id: thread.id.clone(),
                status: ThreadStatus::Failed,
                outcomes: outcomes.clone(),
            });
        }

        let targets = dedup_targets(&thread.targets);
        let accounts: HashMap<String, Account> = self
            .store
            .find_accounts(&targets, &thread.owner_id)
            .await?
            .into_iter()
            .map(|a| (a.id.clone(), a))
            .collect();

        let resolver =
            CredentialResolver::new(self.store.as_ref(), self.twitter.as_ref(), &self.audit);
        let publisher = Publisher::new(resolver, &self.audit);

        for account_id in &targets {
            let code = match accounts.get(account_id) {
                None => OutcomeCode::AccountNotFound,
                Some(account) => {
                    let outcome = publisher
                        .publish(account, &thread.content, thread.image_url.as_deref(), now)
                        .await;
                    self.record_outcome(thread, account, &outcome).await;
                    outcome.outcome_code()
                }
            };
            outcomes.insert(account_id.clone(), code);
        }

        let status = final_status(outcomes, self.policy);
        self.store
            .complete_thread(&thread.id, status, outcomes)
            .await?;

        let details = json!({ "threadId": thread.id, "outcomes": outcomes });
        match status {
            ThreadStatus::Posted => {
                self.audit
                    .success("Scheduled thread posted", details, Some(&thread.owner_id))
                    .await
            }
            ThreadStatus::Partial => {
                self.audit
                    .warn(
                        "Scheduled thread partially posted",
                        details,
                        Some(&thread.owner_id),
                    )
                    .await
            }
            _ => {
                self.audit
                    .error("Scheduled thread failed", details, Some(&thread.owner_id))
                    .await
            }
        }

        Ok(ThreadRunResult::Completed {
            id: thread.id.clone(),
            status,
            outcomes: outcomes.clone(),
        })
    }

    async fn record_outcome(&self, thread: &Thread, account: &Account, outcome: &PublishOutcome) {
        match outcome {
            PublishOutcome::Posted(items) => {
                tracing::info!(
                    thread_id = %thread.id,
                    account_id = %account.id,
                    items = items.len(),
                    "Posted thread to account"
                );
            }
            PublishOutcome::NotImplemented(message) => {
                tracing::warn!(
                    thread_id = %thread.id,
                    account_id = %account.id,
                    provider = %account.provider,
                    "{}",
                    message
                );
            }
            PublishOutcome::Failed(e) => {
                let payload = match e {
                    PublishError::ProviderPublishFailed { payload, .. } => payload.clone(),
                    _ => None,
                };
                self.audit
                    .error(
                        "Scheduled post failed for account",
                        json!({
                            "threadId": thread.id,
                            "accountId": account.id,
                            "provider": account.provider.as_str(),
                            "error": e.to_string(),
                            "payload": payload,
                        }),
                        Some(&thread.owner_id),
                    )
                    .await;
            }
        }
    }
}

/// Drop repeated account ids, keeping first occurrence order
fn dedup_targets(targets: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    targets
        .iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}
