//! Per-thread sweep outcomes and the run tally.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::ThreadId;

/// Which filing branch was taken for a refreshed thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilingAction {
    /// The thread already had labels; they were left untouched.
    KeptExistingLabels { labels: Vec<String> },
    /// The thread was filed under its reference message's year.
    YearBucket {
        label: String,
        /// Whether this run created the label.
        created: bool,
    },
}

/// The step at which a thread-local failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Fetch,
    Forward,
    Label,
    Archive,
    MarkRead,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Fetch => "fetch",
            Self::Forward => "forward",
            Self::Label => "label",
            Self::Archive => "archive",
            Self::MarkRead => "mark_read",
        };
        f.write_str(s)
    }
}

/// Result of processing one candidate thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ThreadOutcome {
    /// Forwarded to the account's own address and filed.
    Refreshed { filing: FilingAction },
    /// Not at the refresh age today; nothing was touched.
    Skipped { days_elapsed: i64 },
    /// A store call failed; the thread is excluded from the tally.
    Failed { stage: FailureStage, reason: String },
}

impl ThreadOutcome {
    pub fn failed(stage: FailureStage, reason: impl Into<String>) -> Self {
        Self::Failed {
            stage,
            reason: reason.into(),
        }
    }

    /// True for the only outcome that counts toward the tally.
    pub fn is_refreshed(&self) -> bool {
        matches!(self, Self::Refreshed { .. })
    }
}

/// A thread-local failure, kept for the run report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadFailure {
    pub thread_id: ThreadId,
    pub stage: FailureStage,
    pub reason: String,
}

/// Count of threads refreshed in one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTally(usize);

impl RunTally {
    pub fn new() -> Self {
        Self(0)
    }

    pub fn increment(&mut self) {
        self.0 += 1;
    }

    pub fn count(&self) -> usize {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tally_starts_at_zero_and_counts_up() {
        let mut tally = RunTally::new();
        assert_eq!(tally.count(), 0);
        tally.increment();
        tally.increment();
        assert_eq!(tally.count(), 2);
    }

    #[test]
    fn only_refreshed_is_counted() {
        let refreshed = ThreadOutcome::Refreshed {
            filing: FilingAction::KeptExistingLabels {
                labels: vec!["Work".to_string()],
            },
        };
        assert!(refreshed.is_refreshed());
        assert!(!ThreadOutcome::Skipped { days_elapsed: 12 }.is_refreshed());
        assert!(!ThreadOutcome::failed(FailureStage::Forward, "boom").is_refreshed());
    }

    #[test]
    fn outcome_is_tagged_for_log_sinks() {
        let outcome = ThreadOutcome::failed(FailureStage::MarkRead, "timeout");
        let v = serde_json::to_value(&outcome).unwrap();
        assert_eq!(v["outcome"], "failed");
        assert_eq!(v["stage"], "mark_read");
        assert_eq!(v["reason"], "timeout");
    }

    #[test]
    fn failure_stage_display_matches_serialized_name() {
        for stage in [
            FailureStage::Fetch,
            FailureStage::Forward,
            FailureStage::Label,
            FailureStage::Archive,
            FailureStage::MarkRead,
        ] {
            let serialized = serde_json::to_value(stage).unwrap();
            assert_eq!(serialized, stage.to_string());
        }
    }
}
