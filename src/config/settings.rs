//! Sweep settings and configuration types.
//!
//! Settings are read from `~/.config/evergreen/settings.json` (or the
//! platform equivalent) at startup. The file is optional; every field has a
//! default, and a partial file only overrides the fields it names.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::providers::email::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

/// Largest UTC offset accepted for year buckets, in minutes.
const MAX_UTC_OFFSET_MINUTES: i32 = 18 * 60;

/// Errors that can occur while loading settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Top-level settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Which mail account to sweep.
    pub account: AccountSettings,
    /// Sweep pipeline tuning.
    pub sweep: SweepSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

/// Account selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountSettings {
    /// Keychain key for the stored OAuth credentials.
    pub account_id: String,
}

impl Default for AccountSettings {
    fn default() -> Self {
        Self {
            account_id: "me".to_string(),
        }
    }
}

/// Sweep pipeline configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepSettings {
    /// Threads requested per listing page.
    pub page_size: u32,
    /// Wall-clock budget for a whole run, in seconds.
    pub run_timeout_secs: u64,
    /// Offset from UTC, in minutes, used to pick a message's year label.
    pub utc_offset_minutes: i32,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            run_timeout_secs: 900,
            utc_offset_minutes: 0,
        }
    }
}

impl SweepSettings {
    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }

    /// The year-bucket offset. Falls back to UTC if out of range; call
    /// [`Settings::validate`] first to reject such values.
    pub fn utc_offset(&self) -> FixedOffset {
        self.utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| Utc.fix())
    }
}

/// Log output configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `tracing` filter used when `RUST_LOG` is unset or empty.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl LoggingSettings {
    /// Builds the log filter: a valid `RUST_LOG` replaces [`level`](Self::level)
    /// entirely, otherwise `level` applies, falling back to `info`.
    pub fn env_filter(&self) -> EnvFilter {
        let from_env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
        Self::filter_from(from_env.as_deref(), &self.level)
    }

    fn filter_from(env: Option<&str>, level: &str) -> EnvFilter {
        env.filter(|directives| !directives.trim().is_empty())
            .and_then(|directives| EnvFilter::try_new(directives).ok())
            .or_else(|| EnvFilter::try_new(level).ok())
            .unwrap_or_else(|| EnvFilter::new("info"))
    }
}

impl Settings {
    /// Location of the settings file, if a home directory can be found.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "evergreen").map(|dirs| dirs.config_dir().join("settings.json"))
    }

    /// Loads settings from [`Settings::default_path`], or defaults if there
    /// is no file.
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Loads and validates settings from `path`. A missing file yields
    /// defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let settings: Self = serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Checks every field against its allowed range.
    pub fn validate(&self) -> Result<()> {
        if self.account.account_id.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "account.account_id",
                reason: "must not be empty".to_string(),
            });
        }
        if !(1..=MAX_PAGE_SIZE).contains(&self.sweep.page_size) {
            return Err(ConfigError::Invalid {
                field: "sweep.page_size",
                reason: format!("must be between 1 and {}", MAX_PAGE_SIZE),
            });
        }
        if self.sweep.run_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "sweep.run_timeout_secs",
                reason: "must be positive".to_string(),
            });
        }
        if self.sweep.utc_offset_minutes.abs() > MAX_UTC_OFFSET_MINUTES {
            return Err(ConfigError::Invalid {
                field: "sweep.utc_offset_minutes",
                reason: format!("must be within ±{}", MAX_UTC_OFFSET_MINUTES),
            });
        }
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "logging.level",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}
