//! Per-thread refresh decision and effects.
//!
//! For one candidate thread: load it, measure the age of its last message,
//! and if it is exactly at the refresh age forward that message to the
//! account's own address, file the thread, archive it and mark it read.
//!
//! Every store failure here is local to the thread and becomes a
//! [`ThreadOutcome::Failed`]; nothing in this module aborts the run.

use chrono::{DateTime, FixedOffset, Utc};

use crate::domain::{
    days_elapsed, is_refresh_due, year_bucket, Address, FailureStage, FilingAction,
    ThreadCandidate, ThreadId, ThreadOutcome,
};
use crate::providers::email::{MailStore, ProviderError};

use super::label_service::LabelService;

/// Applies the refresh rule to single threads.
pub struct RetentionService<'a> {
    store: &'a dyn MailStore,
    labels: LabelService<'a>,
    utc_offset: FixedOffset,
}

impl<'a> RetentionService<'a> {
    /// Creates a service that computes year buckets in `utc_offset`.
    pub fn new(store: &'a dyn MailStore, utc_offset: FixedOffset) -> Self {
        Self {
            store,
            labels: LabelService::new(store),
            utc_offset,
        }
    }

    /// Loads a thread's messages and user labels.
    pub async fn load_candidate(
        &self,
        thread_id: &ThreadId,
    ) -> Result<ThreadCandidate, ProviderError> {
        let messages = self.store.get_thread_messages(thread_id).await?;
        let labels = self.store.get_thread_labels(thread_id).await?;
        Ok(ThreadCandidate::new(thread_id.clone(), messages, labels))
    }

    /// Loads and processes one thread.
    pub async fn process_thread(
        &self,
        thread_id: &ThreadId,
        today: DateTime<Utc>,
        target: &Address,
    ) -> ThreadOutcome {
        match self.load_candidate(thread_id).await {
            Ok(candidate) => self.process_candidate(&candidate, today, target).await,
            Err(e) => ThreadOutcome::failed(FailureStage::Fetch, e.to_string()),
        }
    }

    /// Processes an already loaded thread.
    ///
    /// A thread that is not exactly at the refresh age is skipped without any
    /// store call.
    pub async fn process_candidate(
        &self,
        candidate: &ThreadCandidate,
        today: DateTime<Utc>,
        target: &Address,
    ) -> ThreadOutcome {
        let Some(reference) = candidate.reference_message() else {
            return ThreadOutcome::failed(FailureStage::Fetch, "thread has no messages");
        };

        let days = days_elapsed(reference.sent_at, today);
        if !is_refresh_due(days) {
            tracing::debug!(thread_id = %candidate.id, days_elapsed = days, "Thread not due");
            return ThreadOutcome::Skipped { days_elapsed: days };
        }

        tracing::info!(
            thread_id = %candidate.id,
            subject = reference.subject_or_empty(),
            from = %reference.from.display(),
            sent_at = %reference.sent_at,
            "Refreshing thread"
        );

        if let Err(e) = self.store.forward_message(reference, target).await {
            return ThreadOutcome::failed(FailureStage::Forward, e.to_string());
        }

        match self.file(candidate, reference.sent_at).await {
            Ok(filing) => ThreadOutcome::Refreshed { filing },
            Err((stage, reason)) => ThreadOutcome::failed(stage, reason),
        }
    }

    /// Labels (if needed), archives and marks the thread read.
    async fn file(
        &self,
        candidate: &ThreadCandidate,
        sent_at: DateTime<Utc>,
    ) -> Result<FilingAction, (FailureStage, String)> {
        let filing = if candidate.is_labeled() {
            tracing::debug!(thread_id = %candidate.id, labels = ?candidate.labels, "Keeping existing labels");
            FilingAction::KeptExistingLabels {
                labels: candidate.labels.clone(),
            }
        } else {
            let year = year_bucket(sent_at, self.utc_offset);
            let ensured = self
                .labels
                .ensure_year_label(&year)
                .await
                .map_err(|e| (FailureStage::Label, e.to_string()))?;
            self.store
                .attach_label(&ensured.label, &candidate.id)
                .await
                .map_err(|e| (FailureStage::Label, e.to_string()))?;
            if ensured.created {
                tracing::info!(label = %year, "Created year label");
            }
            FilingAction::YearBucket {
                label: year,
                created: ensured.created,
            }
        };

        self.store
            .archive_thread(&candidate.id)
            .await
            .map_err(|e| (FailureStage::Archive, e.to_string()))?;
        self.store
            .mark_thread_read(&candidate.id)
            .await
            .map_err(|e| (FailureStage::MarkRead, e.to_string()))?;

        Ok(filing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EmailId, Label, Message};
    use crate::providers::email::{InMemoryMailStore, MockMailStore, StoreCall};
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    fn today() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn message(thread: &str, id: &str, age_days: i64) -> Message {
        Message {
            id: EmailId::from(id),
            thread_id: ThreadId::from(thread),
            from: Address::with_name("alice@example.com", "Alice"),
            subject: Some(format!("subject {}", id)),
            plain_body: "body".to_string(),
            sent_at: today() - Duration::days(age_days),
        }
    }

    fn target() -> Address {
        Address::new("me@example.com")
    }

    fn store_with(thread: &str, ages: &[i64], labels: &[&str]) -> InMemoryMailStore {
        let store = InMemoryMailStore::new();
        let messages = ages
            .iter()
            .enumerate()
            .map(|(i, age)| message(thread, &format!("{}-m{}", thread, i), *age))
            .collect();
        store.add_thread(thread, messages, labels);
        store
    }

    #[tokio::test]
    async fn unlabeled_due_thread_gets_year_label() {
        let store = store_with("t1", &[363], &[]);
        let service = RetentionService::new(&store, FixedOffset::east_opt(0).unwrap());

        let outcome = service
            .process_thread(&ThreadId::from("t1"), today(), &target())
            .await;

        assert_eq!(
            outcome,
            ThreadOutcome::Refreshed {
                filing: FilingAction::YearBucket {
                    label: "2024".to_string(),
                    created: true,
                }
            }
        );
        assert_eq!(
            store.forwards(),
            vec![(EmailId::from("t1-m0"), "me@example.com".to_string())]
        );
        assert_eq!(store.thread_labels("t1"), vec!["2024".to_string()]);
        assert!(store.is_archived("t1"));
        assert!(store.is_read("t1"));
    }

    #[tokio::test]
    async fn labeled_due_thread_keeps_its_labels() {
        let store = store_with("t1", &[363], &["Work"]);
        let service = RetentionService::new(&store, FixedOffset::east_opt(0).unwrap());

        let outcome = service
            .process_thread(&ThreadId::from("t1"), today(), &target())
            .await;

        assert_eq!(
            outcome,
            ThreadOutcome::Refreshed {
                filing: FilingAction::KeptExistingLabels {
                    labels: vec!["Work".to_string()],
                }
            }
        );
        assert!(store.labels().is_empty());
        assert!(!store
            .calls()
            .iter()
            .any(|c| matches!(c, StoreCall::GetLabelByName(_) | StoreCall::AttachLabel { .. })));
        assert!(store.is_archived("t1"));
        assert!(store.is_read("t1"));
    }

    #[tokio::test]
    async fn age_is_taken_from_last_message_only() {
        // Oldest message is due, newest is not.
        let store = store_with("t1", &[363, 10], &[]);
        let service = RetentionService::new(&store, FixedOffset::east_opt(0).unwrap());

        let outcome = service
            .process_thread(&ThreadId::from("t1"), today(), &target())
            .await;

        assert_eq!(outcome, ThreadOutcome::Skipped { days_elapsed: 10 });
        assert!(store.forwards().is_empty());
    }

    #[tokio::test]
    async fn forwards_the_last_message() {
        let store = store_with("t1", &[400, 363], &["Work"]);
        let service = RetentionService::new(&store, FixedOffset::east_opt(0).unwrap());

        service
            .process_thread(&ThreadId::from("t1"), today(), &target())
            .await;

        assert_eq!(
            store.forwards(),
            vec![(EmailId::from("t1-m1"), "me@example.com".to_string())]
        );
    }

    #[tokio::test]
    async fn neighbouring_ages_are_skipped_untouched() {
        for age in [362, 364, 365] {
            let store = store_with("t1", &[age], &[]);
            let service = RetentionService::new(&store, FixedOffset::east_opt(0).unwrap());

            let outcome = service
                .process_thread(&ThreadId::from("t1"), today(), &target())
                .await;

            assert_eq!(outcome, ThreadOutcome::Skipped { days_elapsed: age });
            assert_eq!(
                store.calls(),
                vec![
                    StoreCall::GetThreadMessages(ThreadId::from("t1")),
                    StoreCall::GetThreadLabels(ThreadId::from("t1")),
                ]
            );
        }
    }

    #[tokio::test]
    async fn existing_year_label_is_reused() {
        let store = store_with("t1", &[363], &[]);
        store.add_label("2024");
        let service = RetentionService::new(&store, FixedOffset::east_opt(0).unwrap());

        let outcome = service
            .process_thread(&ThreadId::from("t1"), today(), &target())
            .await;

        assert_eq!(
            outcome,
            ThreadOutcome::Refreshed {
                filing: FilingAction::YearBucket {
                    label: "2024".to_string(),
                    created: false,
                }
            }
        );
        assert_eq!(store.create_label_calls("2024"), 0);
    }

    #[tokio::test]
    async fn year_bucket_uses_configured_offset() {
        // Reference message lands just after midnight UTC on Jan 1.
        let today = Utc.with_ymd_and_hms(2024, 12, 29, 0, 30, 0).unwrap();
        let sent_at = today - Duration::days(363);
        assert_eq!(sent_at.to_rfc3339(), "2024-01-01T00:30:00+00:00");

        let store = InMemoryMailStore::new();
        let mut msg = message("t1", "t1-m0", 0);
        msg.sent_at = sent_at;
        store.add_thread("t1", vec![msg], &[]);

        let west = FixedOffset::west_opt(3600).unwrap();
        let service = RetentionService::new(&store, west);
        let outcome = service
            .process_thread(&ThreadId::from("t1"), today, &target())
            .await;

        assert_eq!(
            outcome,
            ThreadOutcome::Refreshed {
                filing: FilingAction::YearBucket {
                    label: "2023".to_string(),
                    created: true,
                }
            }
        );
    }

    #[tokio::test]
    async fn fetch_failure_is_thread_local() {
        let store = store_with("t1", &[363], &[]);
        store.fail_on("t1", FailureStage::Fetch);
        let service = RetentionService::new(&store, FixedOffset::east_opt(0).unwrap());

        let outcome = service
            .process_thread(&ThreadId::from("t1"), today(), &target())
            .await;

        assert!(matches!(
            outcome,
            ThreadOutcome::Failed { stage: FailureStage::Fetch, .. }
        ));
    }

    #[tokio::test]
    async fn empty_thread_fails_at_fetch() {
        let store = InMemoryMailStore::new();
        store.add_thread("t1", vec![], &[]);
        let service = RetentionService::new(&store, FixedOffset::east_opt(0).unwrap());

        let outcome = service
            .process_thread(&ThreadId::from("t1"), today(), &target())
            .await;

        assert_eq!(
            outcome,
            ThreadOutcome::failed(FailureStage::Fetch, "thread has no messages")
        );
    }

    #[tokio::test]
    async fn forward_failure_stops_before_filing() {
        let store = store_with("t1", &[363], &[]);
        store.fail_on("t1", FailureStage::Forward);
        let service = RetentionService::new(&store, FixedOffset::east_opt(0).unwrap());

        let outcome = service
            .process_thread(&ThreadId::from("t1"), today(), &target())
            .await;

        assert!(matches!(
            outcome,
            ThreadOutcome::Failed { stage: FailureStage::Forward, .. }
        ));
        assert!(store.labels().is_empty());
        assert!(!store.is_archived("t1"));
        assert!(!store.is_read("t1"));
    }

    #[tokio::test]
    async fn each_filing_step_reports_its_stage() {
        for stage in [FailureStage::Label, FailureStage::Archive, FailureStage::MarkRead] {
            let store = store_with("t1", &[363], &[]);
            store.fail_on("t1", stage);
            let service = RetentionService::new(&store, FixedOffset::east_opt(0).unwrap());

            let outcome = service
                .process_thread(&ThreadId::from("t1"), today(), &target())
                .await;

            match outcome {
                ThreadOutcome::Failed { stage: got, .. } => assert_eq!(got, stage),
                other => panic!("expected failure at {}, got {:?}", stage, other),
            }
        }
    }

    #[tokio::test]
    async fn label_lookup_error_is_a_label_failure() {
        let mut store = MockMailStore::new();
        store
            .expect_get_thread_messages()
            .returning(|_| Ok(vec![message("t1", "t1-m0", 363)]));
        store.expect_get_thread_labels().returning(|_| Ok(vec![]));
        store.expect_forward_message().times(1).returning(|_, _| Ok(()));
        store
            .expect_get_label_by_name()
            .returning(|_| Err(ProviderError::Connection("reset".to_string())));
        store.expect_attach_label().never();
        store.expect_archive_thread().never();
        store.expect_mark_thread_read().never();
        let service = RetentionService::new(&store, FixedOffset::east_opt(0).unwrap());

        let outcome = service
            .process_thread(&ThreadId::from("t1"), today(), &target())
            .await;

        assert!(matches!(
            outcome,
            ThreadOutcome::Failed { stage: FailureStage::Label, .. }
        ));
    }

    #[tokio::test]
    async fn attaches_the_resolved_label_handle() {
        let mut store = MockMailStore::new();
        store
            .expect_get_thread_messages()
            .returning(|_| Ok(vec![message("t1", "t1-m0", 363)]));
        store.expect_get_thread_labels().returning(|_| Ok(vec![]));
        store.expect_forward_message().returning(|_, _| Ok(()));
        store
            .expect_get_label_by_name()
            .returning(|name| Ok(Some(Label::new("Label_7", name))));
        store
            .expect_attach_label()
            .withf(|label, thread| label.id.0 == "Label_7" && thread.0 == "t1")
            .times(1)
            .returning(|_, _| Ok(()));
        store.expect_archive_thread().times(1).returning(|_| Ok(()));
        store.expect_mark_thread_read().times(1).returning(|_| Ok(()));
        let service = RetentionService::new(&store, FixedOffset::east_opt(0).unwrap());

        let outcome = service
            .process_thread(&ThreadId::from("t1"), today(), &target())
            .await;

        assert!(outcome.is_refreshed());
    }
}
