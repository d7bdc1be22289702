//! Label service for year-bucket labels.
//!
//! Provides the single idempotent get-or-create used when filing refreshed
//! threads. Another client may create the same label between our lookup and
//! our create; a conflicting create is resolved by looking the label up again.

use thiserror::Error;

use crate::domain::{is_year_bucket, Label};
use crate::providers::email::{MailStore, ProviderError};

/// Number of lookup/create rounds before giving up on a label.
pub const MAX_ENSURE_ATTEMPTS: usize = 3;

/// Errors that can occur during label operations.
#[derive(Debug, Error)]
pub enum LabelError {
    #[error("Invalid label name: {0}")]
    InvalidName(String),

    #[error("Label {name} still missing after {attempts} attempts")]
    Unresolved { name: String, attempts: usize },

    #[error("Store error: {0}")]
    Store(#[from] ProviderError),
}

/// Result type for label operations.
pub type Result<T> = std::result::Result<T, LabelError>;

/// A label handle and whether this call created it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnsuredLabel {
    pub label: Label,
    pub created: bool,
}

/// Service for resolving labels by name.
pub struct LabelService<'a> {
    store: &'a dyn MailStore,
}

impl<'a> LabelService<'a> {
    /// Creates a new label service.
    pub fn new(store: &'a dyn MailStore) -> Self {
        Self { store }
    }

    /// Returns the label named `name`, creating it if absent.
    ///
    /// Never creates a second label with the same name: a create that fails
    /// because the label now exists is followed by another lookup.
    pub async fn ensure_label(&self, name: &str) -> Result<EnsuredLabel> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LabelError::InvalidName("Name cannot be empty".to_string()));
        }

        for attempt in 1..=MAX_ENSURE_ATTEMPTS {
            if let Some(label) = self.store.get_label_by_name(name).await? {
                return Ok(EnsuredLabel {
                    label,
                    created: false,
                });
            }

            match self.store.create_label(name).await {
                Ok(label) => {
                    return Ok(EnsuredLabel {
                        label,
                        created: true,
                    })
                }
                Err(ProviderError::AlreadyExists(_)) => {
                    tracing::debug!(label = name, attempt, "Label created concurrently, looking it up again");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(LabelError::Unresolved {
            name: name.to_string(),
            attempts: MAX_ENSURE_ATTEMPTS,
        })
    }

    /// Returns the year-bucket label for `year`, creating it if absent.
    pub async fn ensure_year_label(&self, year: &str) -> Result<EnsuredLabel> {
        if !is_year_bucket(year) {
            return Err(LabelError::InvalidName(format!(
                "{:?} is not a four-digit year",
                year
            )));
        }
        self.ensure_label(year).await
    }
}
