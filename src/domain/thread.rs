//! Thread domain types.
//!
//! A [`ThreadCandidate`] is the per-iteration view of one thread: loaded once,
//! decided on, then dropped. The sweep never persists it.

use serde::{Deserialize, Serialize};

use super::{Message, ThreadId};

/// A thread under consideration during one sweep iteration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadCandidate {
    /// Opaque thread identifier.
    pub id: ThreadId,
    /// Messages in arrival order.
    pub messages: Vec<Message>,
    /// Names of the user labels currently on the thread.
    pub labels: Vec<String>,
}

impl ThreadCandidate {
    pub fn new(id: ThreadId, messages: Vec<Message>, labels: Vec<String>) -> Self {
        Self {
            id,
            messages,
            labels,
        }
    }

    /// The most recent message, the sole basis for the thread's age.
    ///
    /// `None` only for an empty thread, which the eligibility query should
    /// never return.
    pub fn reference_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Returns true if the thread already carries at least one user label.
    pub fn is_labeled(&self) -> bool {
        !self.labels.is_empty()
    }
}
