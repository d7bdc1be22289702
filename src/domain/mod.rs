//! Domain layer types for the retention sweep.
//!
//! This module contains the value objects passed through the sweep pipeline:
//! identifiers, messages, thread candidates, labels, the account identity,
//! per-thread outcomes and the retention age arithmetic.

mod identity;
mod label;
mod message;
mod outcome;
pub mod retention;
mod thread;
mod types;

pub use identity::AccountIdentity;
pub use label::{is_year_bucket, year_bucket, Label};
pub use message::{Address, Message};
pub use outcome::{FailureStage, FilingAction, RunTally, ThreadFailure, ThreadOutcome};
pub use retention::{days_elapsed, is_refresh_due, start_of_day, REFRESH_AGE_DAYS};
pub use thread::ThreadCandidate;
pub use types::{AccountId, EmailId, LabelId, ThreadId};
