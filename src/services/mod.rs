//! Sweep services layer.
//!
//! This module contains the services that carry out one retention sweep,
//! coordinating between the mail store and the domain rules.
//!
//! # Architecture
//!
//! Services sit between the entry point and the mail store:
//!
//! ```text
//! Entry point (main, SweepService::run)
//!          |
//!          v
//!    Services Layer  <-- You are here
//!          |
//!          v
//! Infrastructure (MailStore backends)
//! ```
//!
//! # Services Overview
//!
//! - [`SweepService`]: Runs one sweep end to end and builds the [`RunReport`]
//! - [`resolve_forward_target`]: Picks the address refreshed threads go to
//! - [`enumerate_candidates`]: Collects every eligible thread id across pages
//! - [`RetentionService`]: Decides on one thread and applies forward, filing, archive and read
//! - [`LabelService`]: Idempotent get-or-create for year labels

mod enumeration_service;
mod identity_service;
mod label_service;
mod retention_service;
mod sweep_service;

pub use enumeration_service::enumerate_candidates;
pub use identity_service::resolve_forward_target;
pub use label_service::{EnsuredLabel, LabelError, LabelService, MAX_ENSURE_ATTEMPTS};
pub use retention_service::RetentionService;
pub use sweep_service::{RunReport, SweepError, SweepService};
