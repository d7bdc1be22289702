//! Sweep run orchestration.
//!
//! One run resolves the forward target, enumerates every eligible thread and
//! then processes the candidates one at a time, newest page last. Only
//! identity and enumeration failures (and the run timeout) abort a run;
//! per-thread failures are collected in the [`RunReport`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::SweepSettings;
use crate::domain::{start_of_day, RunTally, ThreadFailure, ThreadOutcome};
use crate::providers::email::{MailStore, ProviderError};

use super::enumeration_service::enumerate_candidates;
use super::identity_service::resolve_forward_target;
use super::retention_service::RetentionService;

/// Errors that abort a whole run.
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("account has no send-as addresses to forward to")]
    NoForwardTarget,

    #[error("failed to look up account addresses: {0}")]
    Identity(#[source] ProviderError),

    #[error("failed to list threads on page {page}: {source}")]
    Enumeration {
        page: usize,
        #[source]
        source: ProviderError,
    },

    #[error("run did not finish within {0:?}")]
    TimedOut(Duration),
}

/// Result type for sweep runs.
pub type Result<T> = std::result::Result<T, SweepError>;

/// Summary of a completed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// Every send-as address found, in store order.
    pub addresses: Vec<String>,
    /// Address refreshed threads were forwarded to.
    pub forward_target: String,
    /// Threads matched by the eligibility query.
    pub candidates_found: usize,
    /// Threads forwarded and filed.
    pub refreshed: RunTally,
    /// Threads not at the refresh age.
    pub skipped: usize,
    /// Thread-local failures (non-fatal).
    pub failures: Vec<ThreadFailure>,
    /// Duration of the run.
    pub duration_ms: u64,
}

impl RunReport {
    /// Returns true if no thread failed.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn refreshed_count(&self) -> usize {
        self.refreshed.count()
    }

    /// One-line human-readable result.
    pub fn summary(&self) -> String {
        if self.refreshed_count() == 0 {
            "Zero email threads are about to expire. No threads were forwarded.".to_string()
        } else {
            format!(
                "Sweep complete. Total email threads forwarded: {}",
                self.refreshed_count()
            )
        }
    }
}

/// Runs the retention sweep against one mail store.
pub struct SweepService {
    store: Arc<dyn MailStore>,
    page_size: u32,
    utc_offset: FixedOffset,
    run_timeout: Duration,
}

impl SweepService {
    /// Creates a sweep service from validated settings.
    pub fn new(store: Arc<dyn MailStore>, settings: &SweepSettings) -> Self {
        Self {
            store,
            page_size: settings.page_size,
            utc_offset: settings.utc_offset(),
            run_timeout: settings.run_timeout(),
        }
    }

    /// Overrides the run timeout.
    pub fn with_run_timeout(mut self, run_timeout: Duration) -> Self {
        self.run_timeout = run_timeout;
        self
    }

    /// Runs one sweep as of now, bounded by the run timeout.
    pub async fn run(&self) -> Result<RunReport> {
        tokio::time::timeout(self.run_timeout, self.run_at(Utc::now()))
            .await
            .map_err(|_| SweepError::TimedOut(self.run_timeout))?
    }

    /// Runs one sweep as of `now`.
    ///
    /// Ages are measured from the start of `now`'s calendar day in the
    /// configured offset. Candidates are fully enumerated before any is
    /// processed, then processed in reverse of retrieval order.
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<RunReport> {
        let start = Instant::now();
        let store = self.store.as_ref();
        let today = start_of_day(now, self.utc_offset);
        tracing::debug!(now = %now, today = %today, "Measuring ages from start of day");

        let identity = resolve_forward_target(store).await?;
        let target = identity.forward_target();

        let candidates = enumerate_candidates(store, self.page_size).await?;

        let retention = RetentionService::new(store, self.utc_offset);
        let mut refreshed = RunTally::new();
        let mut skipped = 0;
        let mut failures = Vec::new();

        for thread_id in candidates.iter().rev() {
            match retention.process_thread(thread_id, today, target).await {
                ThreadOutcome::Refreshed { filing } => {
                    tracing::debug!(thread_id = %thread_id, filing = ?filing, "Thread refreshed");
                    refreshed.increment();
                }
                ThreadOutcome::Skipped { .. } => skipped += 1,
                ThreadOutcome::Failed { stage, reason } => {
                    tracing::warn!(
                        thread_id = %thread_id,
                        stage = %stage,
                        reason = %reason,
                        "Failed to refresh thread"
                    );
                    failures.push(ThreadFailure {
                        thread_id: thread_id.clone(),
                        stage,
                        reason,
                    });
                }
            }
        }

        let report = RunReport {
            started_at: now,
            addresses: identity
                .addresses()
                .iter()
                .map(|a| a.email.clone())
                .collect(),
            forward_target: target.email.clone(),
            candidates_found: candidates.len(),
            refreshed,
            skipped,
            failures,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        tracing::info!(
            refreshed = report.refreshed_count(),
            skipped = report.skipped,
            failed = report.failures.len(),
            "{}",
            report.summary()
        );

        Ok(report)
    }
}
