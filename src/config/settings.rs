//! Ledger settings loading from timebank.toml
//!
//! This module provides the tunables of the credit ledger: the starting grant
//! every new user receives, and how store calls are bounded and retried. Every
//! field has a default, so a missing file or a partial file is valid.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Default file name looked up in the working directory
pub const DEFAULT_SETTINGS_PATH: &str = "timebank.toml";

/// Tunables for the ledger core
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LedgerSettings {
    /// Credits granted to a user the first time their balance is read
    pub starting_grant: i64,
    /// Upper bound for a single store call, in milliseconds
    pub store_timeout_ms: u64,
    /// Total attempts for a retriable failure (1 disables retries)
    pub retry_attempts: u32,
    /// Backoff before the second attempt, doubled after each failure
    pub retry_backoff_ms: u64,
    /// Seconds between background reconciliation sweeps (0 disables)
    pub sweep_interval_secs: u64,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            starting_grant: 30,
            store_timeout_ms: 5_000,
            retry_attempts: 3,
            retry_backoff_ms: 100,
            sweep_interval_secs: 900,
        }
    }
}

impl LedgerSettings {
    /// Store call timeout as a [`Duration`]
    #[must_use]
    pub const fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    /// Initial retry backoff as a [`Duration`]
    #[must_use]
    pub const fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    fn validate(self) -> Result<Self> {
        if self.starting_grant < 0 {
            return Err(Error::Config {
                message: format!("starting_grant must not be negative, got {}", self.starting_grant),
            });
        }
        if self.retry_attempts == 0 {
            return Err(Error::Config {
                message: "retry_attempts must be at least 1".to_string(),
            });
        }
        if self.store_timeout_ms == 0 {
            return Err(Error::Config {
                message: "store_timeout_ms must be positive".to_string(),
            });
        }
        Ok(self)
    }
}

/// Parses ledger settings from TOML text.
pub fn parse_settings(contents: &str) -> Result<LedgerSettings> {
    let settings: LedgerSettings = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse ledger settings: {e}"),
    })?;
    settings.validate()
}

/// Loads ledger settings from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - A value is out of range
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<LedgerSettings> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read settings file: {e}"),
    })?;
    parse_settings(&contents)
}

/// Loads ledger settings from the default location, falling back to defaults
/// when the file does not exist.
pub fn load_default_settings() -> Result<LedgerSettings> {
    if Path::new(DEFAULT_SETTINGS_PATH).exists() {
        load_settings(DEFAULT_SETTINGS_PATH)
    } else {
        tracing::info!("{DEFAULT_SETTINGS_PATH} not found, using default ledger settings");
        Ok(LedgerSettings::default())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_parse_partial_settings_keeps_defaults() {
        let settings = parse_settings(
            r"
            starting_grant = 10
            retry_attempts = 5
        ",
        )
        .unwrap();

        assert_eq!(settings.starting_grant, 10);
        assert_eq!(settings.retry_attempts, 5);
        assert_eq!(settings.store_timeout_ms, 5_000);
        assert_eq!(settings.retry_backoff(), Duration::from_millis(100));
    }

    #[test]
    fn test_empty_settings_are_defaults() {
        assert_eq!(parse_settings("").unwrap(), LedgerSettings::default());
    }

    #[test]
    fn test_rejects_negative_grant_and_zero_attempts() {
        assert!(matches!(
            parse_settings("starting_grant = -1"),
            Err(Error::Config { .. })
        ));
        assert!(matches!(
            parse_settings("retry_attempts = 0"),
            Err(Error::Config { .. })
        ));
    }

    #[test]
    fn test_rejects_malformed_toml() {
        assert!(matches!(
            parse_settings("starting_grant = \"lots\""),
            Err(Error::Config { .. })
        ));
    }
}
