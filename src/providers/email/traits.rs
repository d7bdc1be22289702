//! Mail store trait definition.
//!
//! This module defines the [`MailStore`] trait, the narrow set of mail-store
//! capabilities the retention sweep consumes. Backends (the Gmail REST API,
//! the in-memory store) implement it; the sweep services only ever see
//! `&dyn MailStore`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{Address, Label, Message, ThreadId};

/// Result type alias for mail store operations.
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Search query selecting the threads eligible for a sweep.
///
/// Excludes sent, trashed, spam, draft, scheduled, and the auto-categorized
/// social and promotions threads.
pub const ELIGIBLE_THREADS_QUERY: &str =
    "-in:sent -in:trash -label:spam -label:draft -is:scheduled -category:social -category:promotions";

/// Default number of thread references requested per page.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Largest page size the Gmail API accepts.
pub const MAX_PAGE_SIZE: u32 = 500;

/// Errors that can occur during mail store operations.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Authentication failed or credentials expired.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Network or connection error.
    #[error("connection error: {0}")]
    Connection(String),

    /// Rate limit exceeded.
    #[error("rate limit exceeded, retry after {retry_after_secs:?} seconds")]
    RateLimited {
        /// Seconds to wait before retrying, if known.
        retry_after_secs: Option<u64>,
    },

    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A resource with the same name already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Invalid request or parameters.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Pagination parameters for list operations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Maximum number of items to return.
    pub limit: Option<u32>,
    /// Opaque cursor for the next page of results.
    pub page_token: Option<String>,
}

impl Pagination {
    /// Creates a first-page request with the specified limit.
    pub fn with_limit(limit: u32) -> Self {
        Self {
            limit: Some(limit),
            page_token: None,
        }
    }

    /// Continues from `token`, keeping the current limit.
    pub fn with_page_token(mut self, token: Option<String>) -> Self {
        self.page_token = token;
        self
    }
}

/// One page of thread references.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadPage {
    /// Thread ids in store order. May be empty even when more pages follow.
    pub threads: Vec<ThreadId>,
    /// Cursor for the next page; `None` on the last page.
    pub next_page_token: Option<String>,
}

/// Trait for mail store implementations.
///
/// Every method is a single request/response against the store.
/// Implementations must not retry; the sweep decides what a failure means.
///
/// # Example
///
/// ```ignore
/// use evergreen::providers::email::{MailStore, Pagination, ELIGIBLE_THREADS_QUERY};
///
/// async fn first_page(store: &dyn MailStore) -> Result<()> {
///     let page = store
///         .list_threads(ELIGIBLE_THREADS_QUERY, Pagination::with_limit(100))
///         .await?;
///     for id in page.threads {
///         println!("{}", id);
///     }
///     Ok(())
/// }
/// ```
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MailStore: Send + Sync {
    /// Lists the account's outgoing (send-as) addresses in store order.
    async fn list_owned_addresses(&self) -> Result<Vec<Address>>;

    /// Lists one page of threads matching `query`.
    async fn list_threads(&self, query: &str, pagination: Pagination) -> Result<ThreadPage>;

    /// Returns the names of the user labels on a thread.
    ///
    /// System labels (inbox, unread, categories) are not included.
    async fn get_thread_labels(&self, thread_id: &ThreadId) -> Result<Vec<String>>;

    /// Returns a thread's messages in arrival order.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::NotFound`] if the thread does not exist.
    async fn get_thread_messages(&self, thread_id: &ThreadId) -> Result<Vec<Message>>;

    /// Forwards `message` to `to`.
    ///
    /// Not idempotent: each call delivers another copy.
    async fn forward_message(&self, message: &Message, to: &Address) -> Result<()>;

    /// Looks up a user label by its exact name.
    async fn get_label_by_name(&self, name: &str) -> Result<Option<Label>>;

    /// Creates a user label.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::AlreadyExists`] if a label with this name
    /// exists, including one created concurrently by another client.
    async fn create_label(&self, name: &str) -> Result<Label>;

    /// Adds `label` to a thread. Attaching an attached label is a no-op.
    async fn attach_label(&self, label: &Label, thread_id: &ThreadId) -> Result<()>;

    /// Removes a thread from the inbox without deleting it.
    async fn archive_thread(&self, thread_id: &ThreadId) -> Result<()>;

    /// Marks every message of a thread as read.
    async fn mark_thread_read(&self, thread_id: &ThreadId) -> Result<()>;
}
