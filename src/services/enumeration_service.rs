//! Eligible thread enumeration.
//!
//! Walks the store's cursor pagination for [`ELIGIBLE_THREADS_QUERY`] and
//! materializes every matching thread id before any thread is processed.

use crate::domain::ThreadId;
use crate::providers::email::{MailStore, Pagination, ELIGIBLE_THREADS_QUERY};

use super::SweepError;

/// Returns the ids of all eligible threads, in store order.
///
/// Keeps requesting pages until one comes back without a continuation
/// cursor. A page may be empty and still carry a cursor. Any page failure
/// fails the whole enumeration; partial results are discarded.
pub async fn enumerate_candidates(
    store: &dyn MailStore,
    page_size: u32,
) -> Result<Vec<ThreadId>, SweepError> {
    let mut threads = Vec::new();
    let mut page_token: Option<String> = None;
    let mut page = 0usize;

    loop {
        page += 1;
        let pagination = Pagination::with_limit(page_size).with_page_token(page_token.take());

        let result = store
            .list_threads(ELIGIBLE_THREADS_QUERY, pagination)
            .await
            .map_err(|source| SweepError::Enumeration { page, source })?;

        tracing::debug!(
            page,
            returned = result.threads.len(),
            has_more = result.next_page_token.is_some(),
            "Fetched thread page"
        );

        threads.extend(result.threads);

        // Gmail may send an empty token on the last page.
        page_token = result.next_page_token.filter(|t| !t.is_empty());
        if page_token.is_none() {
            break;
        }
    }

    tracing::info!(count = threads.len(), pages = page, "Total email threads found");
    Ok(threads)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::email::{MockMailStore, ProviderError, ThreadPage};
    use pretty_assertions::assert_eq;

    /// A store holding `n` threads that pages them by offset.
    fn paged_store(n: usize) -> MockMailStore {
        let ids: Vec<ThreadId> = (0..n).map(|i| ThreadId::from(format!("t{}", i))).collect();
        let mut store = MockMailStore::new();
        store
            .expect_list_threads()
            .withf(|query, _| query == ELIGIBLE_THREADS_QUERY)
            .returning(move |_, pagination| {
                let start: usize = pagination
                    .page_token
                    .as_deref()
                    .map(|t| t.parse().unwrap())
                    .unwrap_or(0);
                let limit = pagination.limit.unwrap() as usize;
                let end = (start + limit).min(ids.len());
                Ok(ThreadPage {
                    threads: ids[start..end].to_vec(),
                    next_page_token: (end < ids.len()).then(|| end.to_string()),
                })
            });
        store
    }

    fn expected(n: usize) -> Vec<ThreadId> {
        (0..n).map(|i| ThreadId::from(format!("t{}", i))).collect()
    }

    #[tokio::test]
    async fn empty_account() {
        let store = paged_store(0);
        assert!(enumerate_candidates(&store, 100).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn exactly_one_full_page() {
        let store = paged_store(100);
        assert_eq!(enumerate_candidates(&store, 100).await.unwrap(), expected(100));
    }

    #[tokio::test]
    async fn one_past_a_full_page() {
        let store = paged_store(101);
        assert_eq!(enumerate_candidates(&store, 100).await.unwrap(), expected(101));
    }

    #[tokio::test]
    async fn many_pages_keep_store_order() {
        let store = paged_store(23);
        assert_eq!(enumerate_candidates(&store, 5).await.unwrap(), expected(23));
    }

    #[tokio::test]
    async fn empty_page_with_cursor_keeps_going() {
        let mut store = MockMailStore::new();
        let mut seq = mockall::Sequence::new();
        store
            .expect_list_threads()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|_, p| p.page_token.is_none())
            .returning(|_, _| {
                Ok(ThreadPage {
                    threads: vec![],
                    next_page_token: Some("p2".to_string()),
                })
            });
        store
            .expect_list_threads()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|_, p| p.page_token.as_deref() == Some("p2"))
            .returning(|_, _| {
                Ok(ThreadPage {
                    threads: vec![ThreadId::from("late")],
                    next_page_token: None,
                })
            });

        let threads = enumerate_candidates(&store, 100).await.unwrap();
        assert_eq!(threads, vec![ThreadId::from("late")]);
    }

    #[tokio::test]
    async fn empty_string_cursor_ends_enumeration() {
        let mut store = MockMailStore::new();
        store.expect_list_threads().times(1).returning(|_, _| {
            Ok(ThreadPage {
                threads: vec![ThreadId::from("only")],
                next_page_token: Some(String::new()),
            })
        });

        let threads = enumerate_candidates(&store, 100).await.unwrap();
        assert_eq!(threads.len(), 1);
    }

    #[tokio::test]
    async fn page_failure_discards_partial_results() {
        let mut store = MockMailStore::new();
        let mut seq = mockall::Sequence::new();
        store
            .expect_list_threads()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| {
                Ok(ThreadPage {
                    threads: vec![ThreadId::from("t0")],
                    next_page_token: Some("p2".to_string()),
                })
            });
        store
            .expect_list_threads()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(ProviderError::Connection("reset".to_string())));

        let result = enumerate_candidates(&store, 100).await;
        assert!(matches!(result, Err(SweepError::Enumeration { page: 2, .. })));
    }

    #[tokio::test]
    async fn requests_configured_page_size() {
        let mut store = MockMailStore::new();
        store
            .expect_list_threads()
            .withf(|_, p| p.limit == Some(250))
            .times(1)
            .returning(|_, _| Ok(ThreadPage::default()));

        enumerate_candidates(&store, 250).await.unwrap();
    }
}
