//! Message domain types.
//!
//! Only the fields the sweep needs to age a thread and re-deliver it are
//! modelled here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{EmailId, ThreadId};

/// An individual message within a thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Store-assigned identifier.
    pub id: EmailId,
    /// Thread this message belongs to.
    pub thread_id: ThreadId,
    /// Sender address.
    pub from: Address,
    /// Subject line, if any.
    pub subject: Option<String>,
    /// Plain text body.
    pub plain_body: String,
    /// When the message was sent.
    pub sent_at: DateTime<Utc>,
}

impl Message {
    /// Returns the subject, or an empty string when the message has none.
    pub fn subject_or_empty(&self) -> &str {
        self.subject.as_deref().unwrap_or("")
    }
}

/// An email address with optional display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    /// Email address.
    pub email: String,
    /// Display name (e.g., "John Doe").
    pub name: Option<String>,
}

impl Address {
    /// Creates a new address with just an email.
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: None,
        }
    }

    /// Creates a new address with email and display name.
    pub fn with_name(email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: Some(name.into()),
        }
    }

    /// Parses a header value like `"Name" <email@example.com>`.
    ///
    /// Values without angle brackets are taken as a bare address.
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if let (Some(start), Some(end)) = (value.find('<'), value.rfind('>')) {
            if start < end {
                let email = value[start + 1..end].trim().to_string();
                let name = value[..start].trim().trim_matches('"').trim().to_string();
                return Self {
                    email,
                    name: if name.is_empty() { None } else { Some(name) },
                };
            }
        }
        Self::new(value)
    }

    /// Returns the display representation of this address.
    ///
    /// If a name is present, returns "Name <email>", otherwise just the email.
    pub fn display(&self) -> String {
        match &self.name {
            Some(name) => format!("{} <{}>", name, self.email),
            None => self.email.clone(),
        }
    }
}
