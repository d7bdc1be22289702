//! evergreen - Keeps old mail from aging out of a retention window
//!
//! This crate provides the retention sweep: it finds inbox threads whose
//! latest message is about to cross the 365-day mark, forwards that message
//! back to the account so the thread starts a new year, and files the thread
//! away under its own labels or a year label.

pub mod config;
pub mod domain;
pub mod providers;
pub mod services;

pub use config::Settings;
pub use services::{RunReport, SweepError, SweepService};
