//! Mail store implementations.
//!
//! This module contains the [`MailStore`] trait and its implementations:
//!
//! - [`GmailMailStore`] - Gmail REST API with OAuth 2.0
//! - `InMemoryMailStore` - process-local store backing the test suites
//!   (`test-util` feature)
//!
//! # Architecture
//!
//! The sweep services depend only on [`MailStore`]. Each backend handles its
//! own authentication, wire format and error mapping, and reports failures
//! as [`ProviderError`] without retrying.

mod gmail;
#[cfg(any(test, feature = "test-util"))]
mod memory;
mod traits;

pub use gmail::{GmailCredentials, GmailMailStore};
#[cfg(any(test, feature = "test-util"))]
pub use memory::{InMemoryMailStore, StoreCall};
#[cfg(test)]
pub use traits::MockMailStore;
pub use traits::{
    MailStore, Pagination, ProviderError, Result, ThreadPage, DEFAULT_PAGE_SIZE,
    ELIGIBLE_THREADS_QUERY, MAX_PAGE_SIZE,
};
