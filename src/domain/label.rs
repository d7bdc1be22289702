//! Label domain types.
//!
//! Represents a user label in the mail store and the year-bucket naming rule
//! used when filing refreshed threads that carry no label of their own.

use chrono::{DateTime, Datelike, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use super::LabelId;

/// A label handle returned by the mail store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    /// Store-assigned identifier, used when attaching the label.
    pub id: LabelId,
    /// Display name, used for lookups.
    pub name: String,
}

impl Label {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: LabelId(id.into()),
            name: name.into(),
        }
    }
}

/// Returns the year-bucket label name for a message sent at `sent_at`.
///
/// The year is taken from the timestamp itself as seen from `offset`, never
/// from the run date.
pub fn year_bucket(sent_at: DateTime<Utc>, offset: FixedOffset) -> String {
    format!("{:04}", sent_at.with_timezone(&offset).year())
}

/// Returns true when `name` is a well-formed year-bucket label name.
pub fn is_year_bucket(name: &str) -> bool {
    name.len() == 4 && name.bytes().all(|b| b.is_ascii_digit())
}
