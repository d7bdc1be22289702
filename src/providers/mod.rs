//! Mail store provider implementations.
//!
//! - [`email`] - the [`email::MailStore`] port and its backends (Gmail API, in-memory)

pub mod email;
