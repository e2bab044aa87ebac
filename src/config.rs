//! Configuration for lead-sync.
//!
//! # Example
//!
//! ```
//! use lead_sync::SyncConfig;
//!
//! // Minimal config (uses defaults)
//! let config = SyncConfig::default();
//! assert_eq!(config.batch_size, 50);
//! assert_eq!(config.max_batch_attempts, 10);
//!
//! // Partial JSON, everything else defaulted
//! let config = SyncConfig::from_json_str(r#"{"csv_path": "leads.csv", "batch_size": 25}"#).unwrap();
//! assert_eq!(config.batch_size, 25);
//! assert_eq!(config.rename_prefix, "Uploaded_");
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::resilience::retry::{BatchRetryPolicy, RetryConfig};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Status texts shown to the operator.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StatusMessages {
    pub idle: String,
    pub checking: String,
    pub syncing: String,
    pub success: String,
    pub no_network: String,
    pub no_data: String,
    pub already_running: String,
}

impl Default for StatusMessages {
    fn default() -> Self {
        Self {
            idle: "Ready to sync".into(),
            checking: "Checking connection...".into(),
            syncing: "Syncing data...".into(),
            success: "Sync completed".into(),
            no_network: "No internet connection".into(),
            no_data: "No data to sync".into(),
            already_running: "Sync already in progress...".into(),
        }
    }
}

/// Configuration for a sync orchestrator.
///
/// All fields have defaults matching the kiosk deployment; usually only
/// `csv_path` and `api_url` need setting.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Endpoint receiving JSON objects and arrays
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Lead file to upload
    #[serde(default = "default_csv_path")]
    pub csv_path: PathBuf,
    #[serde(default = "default_true")]
    pub has_header: bool,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,

    /// Records per JSON array
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Batch retry unit, also the pause between batches
    #[serde(default = "default_base_batch_delay_secs")]
    pub base_batch_delay_secs: u64,
    /// Cap on the batch retry delay
    #[serde(default = "default_max_response_delay_secs")]
    pub max_response_delay_secs: u64,
    /// Floor for the batch retry delay after a throttling answer
    #[serde(default = "default_rate_limit_floor_secs")]
    pub rate_limit_floor_secs: u64,
    #[serde(default = "default_max_batch_attempts")]
    pub max_batch_attempts: usize,

    /// POST attempts per body
    #[serde(default = "default_request_attempts")]
    pub request_attempts: usize,
    #[serde(default = "default_request_retry_base_secs")]
    pub request_retry_base_secs: u64,
    #[serde(default = "default_batch_timeout_secs")]
    pub batch_timeout_secs: u64,
    #[serde(default = "default_single_timeout_secs")]
    pub single_timeout_secs: u64,

    #[serde(default = "default_probe_url")]
    pub probe_url: String,
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,

    /// Rename the file after every record was delivered
    #[serde(default = "default_true")]
    pub auto_rename: bool,
    #[serde(default = "default_rename_prefix")]
    pub rename_prefix: String,
    /// Pause between completion and rename
    #[serde(default = "default_rename_grace_secs")]
    pub rename_grace_secs: u64,

    #[serde(default)]
    pub messages: StatusMessages,
}

fn default_api_url() -> String { "https://tempweb90.com/knauf/api.php".into() }
fn default_csv_path() -> PathBuf { PathBuf::from("data.csv") }
fn default_true() -> bool { true }
fn default_delimiter() -> char { ',' }
fn default_batch_size() -> usize { 50 }
fn default_base_batch_delay_secs() -> u64 { 10 }
fn default_max_response_delay_secs() -> u64 { 60 }
fn default_rate_limit_floor_secs() -> u64 { 15 }
fn default_max_batch_attempts() -> usize { 10 }
fn default_request_attempts() -> usize { 5 }
fn default_request_retry_base_secs() -> u64 { 2 }
fn default_batch_timeout_secs() -> u64 { 30 }
fn default_single_timeout_secs() -> u64 { 20 }
fn default_probe_url() -> String { "https://www.google.com".into() }
fn default_probe_timeout_secs() -> u64 { 5 }
fn default_rename_prefix() -> String { "Uploaded_".into() }
fn default_rename_grace_secs() -> u64 { 2 }

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            csv_path: default_csv_path(),
            has_header: true,
            delimiter: default_delimiter(),
            batch_size: default_batch_size(),
            base_batch_delay_secs: default_base_batch_delay_secs(),
            max_response_delay_secs: default_max_response_delay_secs(),
            rate_limit_floor_secs: default_rate_limit_floor_secs(),
            max_batch_attempts: default_max_batch_attempts(),
            request_attempts: default_request_attempts(),
            request_retry_base_secs: default_request_retry_base_secs(),
            batch_timeout_secs: default_batch_timeout_secs(),
            single_timeout_secs: default_single_timeout_secs(),
            probe_url: default_probe_url(),
            probe_timeout_secs: default_probe_timeout_secs(),
            auto_rename: true,
            rename_prefix: default_rename_prefix(),
            rename_grace_secs: default_rename_grace_secs(),
            messages: StatusMessages::default(),
        }
    }
}

impl SyncConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_url.trim().is_empty() {
            return Err(ConfigError::Invalid("api_url must not be empty".into()));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid("batch_size must be at least 1".into()));
        }
        if self.max_batch_attempts == 0 || self.request_attempts == 0 {
            return Err(ConfigError::Invalid("attempt counts must be at least 1".into()));
        }
        if matches!(self.delimiter, '"' | '\'' | '\r' | '\n') {
            return Err(ConfigError::Invalid(format!("'{}' cannot be used as a delimiter", self.delimiter.escape_default())));
        }
        if self.rename_prefix.is_empty() || self.rename_prefix.contains(['/', '\\']) {
            return Err(ConfigError::Invalid("rename_prefix must be a plain file name prefix".into()));
        }
        Ok(())
    }

    /// Request layer settings for array uploads.
    #[must_use]
    pub fn request_retry(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.request_attempts,
            base_delay: Duration::from_secs(self.request_retry_base_secs),
            timeout: Duration::from_secs(self.batch_timeout_secs),
            ..RetryConfig::batch()
        }
    }

    /// Request layer settings for single-record uploads.
    #[must_use]
    pub fn single_retry(&self) -> RetryConfig {
        RetryConfig {
            timeout: Duration::from_secs(self.single_timeout_secs),
            ..self.request_retry()
        }
    }

    #[must_use]
    pub fn batch_retry_policy(&self) -> BatchRetryPolicy {
        BatchRetryPolicy {
            max_attempts: self.max_batch_attempts,
            base_delay: Duration::from_secs(self.base_batch_delay_secs),
            max_delay: Duration::from_secs(self.max_response_delay_secs),
            rate_limit_floor: Duration::from_secs(self.rate_limit_floor_secs),
        }
    }

    #[must_use]
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    #[must_use]
    pub fn rename_grace(&self) -> Duration {
        Duration::from_secs(self.rename_grace_secs)
    }
}
