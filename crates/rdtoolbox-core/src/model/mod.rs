//! Torrent, link, account, and hoster views shared across the workspace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Remote status of a torrent whose file list is ready for selection.
pub const AWAITING_SELECTION: &str = "waiting_files_selection";

/// Coarse lifecycle state of a torrent on the remote account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TorrentStatus {
    /// Waiting for metadata, file selection, or a slot.
    Queued,
    /// Fetching or post-processing content.
    Downloading,
    /// Content is available for unrestricting.
    Complete,
    /// The remote gave up on the torrent.
    Error,
}

impl TorrentStatus {
    /// Map a raw remote status string onto the lifecycle state.
    ///
    /// Unknown strings map to [`TorrentStatus::Queued`] so they keep being polled.
    #[must_use]
    pub fn from_remote(status: &str) -> Self {
        match status.trim().to_ascii_lowercase().as_str() {
            "downloading" | "compressing" | "uploading" => Self::Downloading,
            "downloaded" => Self::Complete,
            "magnet_error" | "error" | "virus" | "dead" => Self::Error,
            _ => Self::Queued,
        }
    }

    /// Stable lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Downloading => "downloading",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }
}

/// One file inside a torrent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TorrentFile {
    /// Remote file identifier used for selection.
    pub id: u64,
    /// Path inside the torrent as reported by the service.
    pub path: String,
    /// File size in bytes.
    pub byte_size: u64,
    /// Whether the file is selected for download.
    pub selected: bool,
}

/// Local view of a torrent on the remote account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TorrentRecord {
    /// Identifier assigned by the remote service.
    pub remote_id: String,
    /// Name of the local `.torrent` file this record was uploaded from.
    pub local_filename: Option<String>,
    /// Remote display name.
    pub filename: String,
    /// Lowercase hex info-hash.
    pub info_hash: Option<String>,
    /// Lifecycle state derived from `remote_status`.
    pub status: TorrentStatus,
    /// Raw status string reported by the service.
    pub remote_status: String,
    /// Total selected size in bytes.
    pub byte_size: u64,
    /// Remote progress in percent.
    pub progress: f64,
    /// Current transfer speed in bytes per second.
    pub speed: Option<u64>,
    /// When the torrent was added to the account.
    pub added: Option<DateTime<Utc>>,
    /// Files inside the torrent (only populated by the info call).
    pub files: Vec<TorrentFile>,
    /// Hoster links, one per selected file once complete.
    pub links: Vec<String>,
}

impl TorrentRecord {
    /// Build a record from the minimal remote fields.
    #[must_use]
    pub fn new(
        remote_id: impl Into<String>,
        filename: impl Into<String>,
        remote_status: impl Into<String>,
    ) -> Self {
        let remote_status = remote_status.into();
        Self {
            remote_id: remote_id.into(),
            local_filename: None,
            filename: filename.into(),
            info_hash: None,
            status: TorrentStatus::from_remote(&remote_status),
            remote_status,
            byte_size: 0,
            progress: 0.0,
            speed: None,
            added: None,
            files: Vec::new(),
            links: Vec::new(),
        }
    }

    /// Placeholder for an id whose details have not been fetched yet.
    #[must_use]
    pub fn pending(remote_id: impl Into<String>) -> Self {
        Self::new(remote_id, String::new(), "queued")
    }

    /// Whether the remote file list is waiting for a selection.
    #[must_use]
    pub fn awaiting_selection(&self) -> bool {
        self.remote_status.eq_ignore_ascii_case(AWAITING_SELECTION)
    }

    /// Human-friendly name: remote name, then local file name, then the id.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if !self.filename.is_empty() {
            &self.filename
        } else if let Some(local) = self.local_filename.as_deref() {
            local
        } else {
            &self.remote_id
        }
    }

    /// Merge a fresh snapshot from the service, keeping locally known fields.
    pub fn refresh(&mut self, fresh: Self) {
        let Self {
            remote_id: _,
            local_filename,
            filename,
            info_hash,
            status,
            remote_status,
            byte_size,
            progress,
            speed,
            added,
            files,
            links,
        } = fresh;
        if local_filename.is_some() {
            self.local_filename = local_filename;
        }
        if !filename.is_empty() {
            self.filename = filename;
        }
        if info_hash.is_some() {
            self.info_hash = info_hash;
        }
        if added.is_some() {
            self.added = added;
        }
        self.status = status;
        self.remote_status = remote_status;
        self.byte_size = byte_size;
        self.progress = progress;
        self.speed = speed;
        self.files = files;
        self.links = links;
    }
}

/// Direct download derived from a hoster link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnrestrictedLink {
    /// Hoster link that was unrestricted.
    pub source_link: String,
    /// Direct downloadable URL.
    pub direct_url: String,
    /// Remote-reported file name.
    pub filename: String,
    /// Remote-reported size in bytes.
    pub byte_size: Option<u64>,
}

/// Account summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    /// Account user name.
    pub username: String,
    /// Whether the account currently has premium access.
    pub premium: bool,
    /// Premium expiration timestamp.
    pub expiration: Option<DateTime<Utc>>,
}

impl AccountInfo {
    /// Whole days of premium left at `now` (negative once expired).
    #[must_use]
    pub fn days_left(&self, now: DateTime<Utc>) -> Option<i64> {
        self.expiration.map(|at| (at - now).num_days())
    }
}

/// Availability of one hoster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostStatus {
    /// Hoster domain.
    pub host: String,
    /// Display name.
    pub name: String,
    /// Whether the service supports the hoster.
    pub supported: bool,
    /// Whether the hoster is currently up.
    pub up: bool,
}

impl HostStatus {
    /// Supported and up.
    #[must_use]
    pub const fn is_online(&self) -> bool {
        self.supported && self.up
    }
}

/// Files to select on a torrent awaiting selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSelection {
    /// Every file.
    All,
    /// Specific remote file identifiers.
    Ids(Vec<u64>),
}

impl FileSelection {
    /// Value of the `files` form field.
    #[must_use]
    pub fn form_value(&self) -> String {
        match self {
            Self::All => "all".to_string(),
            Self::Ids(ids) => ids
                .iter()
                .map(u64::to_string)
                .collect::<Vec<_>>()
                .join(","),
        }
    }

    /// Whether nothing would be selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Ids(ids) if ids.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn remote_statuses_map_to_lifecycle_states() {
        assert_eq!(
            TorrentStatus::from_remote("magnet_conversion"),
            TorrentStatus::Queued
        );
        assert_eq!(
            TorrentStatus::from_remote(AWAITING_SELECTION),
            TorrentStatus::Queued
        );
        assert_eq!(
            TorrentStatus::from_remote("compressing"),
            TorrentStatus::Downloading
        );
        assert_eq!(
            TorrentStatus::from_remote("Downloaded"),
            TorrentStatus::Complete
        );
        assert_eq!(TorrentStatus::from_remote("virus"), TorrentStatus::Error);
        assert_eq!(
            TorrentStatus::from_remote("something_new"),
            TorrentStatus::Queued
        );
    }

    #[test]
    fn refresh_keeps_local_fields() {
        let mut record = TorrentRecord::new("ABC", "", "waiting_files_selection");
        record.local_filename = Some("show.torrent".into());
        record.info_hash = Some("aa".into());

        let mut fresh = TorrentRecord::new("ABC", "Show S01", "downloaded");
        fresh.progress = 100.0;
        fresh.links = vec!["https://hoster.example/f/1".into()];
        record.refresh(fresh);

        assert_eq!(record.status, TorrentStatus::Complete);
        assert_eq!(record.local_filename.as_deref(), Some("show.torrent"));
        assert_eq!(record.info_hash.as_deref(), Some("aa"));
        assert_eq!(record.display_name(), "Show S01");
        assert_eq!(record.links.len(), 1);
    }

    #[test]
    fn display_name_falls_back_to_local_then_id() {
        let mut record = TorrentRecord::pending("XYZ");
        assert_eq!(record.display_name(), "XYZ");
        record.local_filename = Some("a.torrent".into());
        assert_eq!(record.display_name(), "a.torrent");
    }

    #[test]
    fn file_selection_form_values() {
        assert_eq!(FileSelection::All.form_value(), "all");
        assert_eq!(FileSelection::Ids(vec![1, 3, 4]).form_value(), "1,3,4");
        assert!(FileSelection::Ids(Vec::new()).is_empty());
        assert!(!FileSelection::All.is_empty());
    }

    #[test]
    fn days_left_counts_whole_days() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let account = AccountInfo {
            username: "user".into(),
            premium: true,
            expiration: Some(Utc.with_ymd_and_hms(2026, 1, 11, 12, 0, 0).unwrap()),
        };
        assert_eq!(account.days_left(now), Some(10));
    }
}
