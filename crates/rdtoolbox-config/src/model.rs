//! Raw `config.json` document and the validated settings derived from it.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use rdtoolbox_core::{RetryPolicy, SelectionPolicy};
use serde::{Deserialize, Serialize};

/// Keys accepted in `config.json`; every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawConfig {
    /// Private API token.
    #[serde(rename = "REAL_DEBRID_API_TOKEN", alias = "api_token", default)]
    pub token: Option<String>,
    /// API root.
    #[serde(default)]
    pub api_base: Option<String>,
    /// Per-request timeout in seconds.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    /// Torrents requested per listing page.
    #[serde(default)]
    pub page_limit: Option<usize>,
    /// Destination for downloaded files.
    #[serde(default)]
    pub download_dir: Option<PathBuf>,
    /// Destination for submitted torrent files.
    #[serde(default)]
    pub processed_dir: Option<PathBuf>,
    /// Move torrent files once submitted.
    #[serde(default)]
    pub move_processed: Option<bool>,
    /// Skip torrent files already on the account.
    #[serde(default)]
    pub skip_existing: Option<bool>,
    /// Check the account before uploading.
    #[serde(default)]
    pub check_account: Option<bool>,
    /// File-selection policy.
    #[serde(default)]
    pub file_selection: Option<FileSelectionConfig>,
    /// Delay between status polls in seconds.
    #[serde(default)]
    pub poll_interval_secs: Option<u64>,
    /// Poll deadline in seconds.
    #[serde(default)]
    pub max_wait_secs: Option<u64>,
    /// Wait for a torrent's file list in seconds.
    #[serde(default)]
    pub metadata_wait_secs: Option<u64>,
    /// Delay between file-list checks in seconds.
    #[serde(default)]
    pub metadata_interval_secs: Option<u64>,
    /// Retry for ordinary API calls.
    #[serde(default)]
    pub api_retry: Option<RetryConfig>,
    /// Retry for unrestrict calls.
    #[serde(default)]
    pub unrestrict_retry: Option<RetryConfig>,
    /// Retry for byte transfers.
    #[serde(default)]
    pub download_retry: Option<RetryConfig>,
    /// Torrents considered by listings.
    #[serde(default)]
    pub download_limit: Option<usize>,
    /// Referral link opened by the renewal command.
    #[serde(default)]
    pub renewal_url: Option<String>,
}

/// File-selection policy as written in the configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum FileSelectionConfig {
    /// Every file.
    #[default]
    All,
    /// Only the largest file.
    Largest,
    /// Files matching any pattern.
    Glob {
        /// Glob patterns matched against paths and file names.
        patterns: Vec<String>,
    },
}

/// Attempts and fixed delay for one class of operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts including the first.
    pub attempts: u32,
    /// Delay between attempts in seconds.
    #[serde(default)]
    pub delay_secs: u64,
}

impl RetryConfig {
    pub(crate) const fn from_pair((attempts, delay_secs): (u32, u64)) -> Self {
        Self {
            attempts,
            delay_secs,
        }
    }

    /// Runtime policy.
    #[must_use]
    pub const fn policy(self) -> RetryPolicy {
        RetryPolicy::new(self.attempts, Duration::from_secs(self.delay_secs))
    }
}

/// Validated settings used by every command.
#[derive(Clone)]
pub struct Settings {
    /// Private API token.
    pub token: String,
    /// API root.
    pub api_base: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Torrents requested per listing page.
    pub page_limit: usize,
    /// Destination for downloaded files.
    pub download_dir: PathBuf,
    /// Destination for submitted torrent files.
    pub processed_dir: PathBuf,
    /// Move torrent files once submitted.
    pub move_processed: bool,
    /// Skip torrent files already on the account.
    pub skip_existing: bool,
    /// Check the account before uploading.
    pub check_account: bool,
    /// Compiled file-selection policy.
    pub selection: SelectionPolicy,
    /// Delay between status polls.
    pub poll_interval: Duration,
    /// Poll deadline.
    pub max_wait: Duration,
    /// Wait for a torrent's file list.
    pub metadata_wait: Duration,
    /// Delay between file-list checks.
    pub metadata_interval: Duration,
    /// Retry for ordinary API calls.
    pub api_retry: RetryPolicy,
    /// Retry for unrestrict calls.
    pub unrestrict_retry: RetryPolicy,
    /// Retry for byte transfers.
    pub download_retry: RetryPolicy,
    /// Torrents considered by listings.
    pub download_limit: usize,
    /// Referral link opened by the renewal command.
    pub renewal_url: String,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("token", &"<redacted>")
            .field("api_base", &self.api_base)
            .field("request_timeout", &self.request_timeout)
            .field("page_limit", &self.page_limit)
            .field("download_dir", &self.download_dir)
            .field("processed_dir", &self.processed_dir)
            .field("move_processed", &self.move_processed)
            .field("skip_existing", &self.skip_existing)
            .field("check_account", &self.check_account)
            .field("selection", &self.selection.describe())
            .field("poll_interval", &self.poll_interval)
            .field("max_wait", &self.max_wait)
            .field("download_limit", &self.download_limit)
            .finish_non_exhaustive()
    }
}
