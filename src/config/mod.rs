//! Configuration and settings management.
//!
//! This module provides the sweep's settings types and loading. Settings are
//! read from the user's config directory as JSON.

mod settings;

pub use settings::{
    AccountSettings, ConfigError, LoggingSettings, Settings, SweepSettings,
};
