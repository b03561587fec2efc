//! Torrent-file uploader: hash, submit, select files, record.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::fs;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{ApiError, PipelineError, PipelineResult};
use crate::fsutil;
use crate::metainfo;
use crate::model::{TorrentRecord, TorrentStatus};
use crate::retry::RetryPolicy;
use crate::selection::SelectionPolicy;
use crate::service::DebridApi;

const TORRENT_EXTENSION: &str = "torrent";
const METADATA_CONVERSION: &str = "magnet_conversion";

/// Knobs for one upload batch.
#[derive(Debug, Clone)]
pub struct UploadSettings {
    /// Which files of each torrent to select.
    pub selection: SelectionPolicy,
    /// Upper bound on waiting for the remote file list.
    pub metadata_wait: Duration,
    /// Delay between file-list checks.
    pub metadata_interval: Duration,
    /// Retry policy for remote calls.
    pub api_retry: RetryPolicy,
    /// Skip files whose hash is already on the account.
    pub skip_existing: bool,
    /// Move successfully submitted files here.
    pub processed_dir: Option<PathBuf>,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            selection: SelectionPolicy::All,
            metadata_wait: Duration::from_secs(15),
            metadata_interval: Duration::from_secs(5),
            api_retry: RetryPolicy::new(3, Duration::from_secs(2)),
            skip_existing: false,
            processed_dir: None,
        }
    }
}

/// Result for one local torrent file.
#[derive(Debug)]
pub enum UploadOutcome {
    /// Submitted and files selected.
    Submitted(TorrentRecord),
    /// Same info-hash as an earlier file in this batch.
    Duplicate {
        /// Shared info-hash.
        info_hash: String,
        /// File that was submitted for this hash.
        first: PathBuf,
    },
    /// The account already holds a torrent with this info-hash.
    AlreadyOnAccount {
        /// Shared info-hash.
        info_hash: String,
        /// Remote torrent holding the hash.
        remote_id: String,
    },
    /// The file could not be submitted.
    Failed(PipelineError),
}

/// One processed file.
#[derive(Debug)]
pub struct UploadEntry {
    /// Local torrent file.
    pub path: PathBuf,
    /// What happened to it.
    pub outcome: UploadOutcome,
}

/// Outcome of an upload batch, in input order.
#[derive(Debug, Default)]
pub struct UploadReport {
    /// One entry per input file.
    pub entries: Vec<UploadEntry>,
}

impl UploadReport {
    /// Records for every submitted torrent.
    pub fn submitted(&self) -> impl Iterator<Item = &TorrentRecord> {
        self.entries.iter().filter_map(|entry| match &entry.outcome {
            UploadOutcome::Submitted(record) => Some(record),
            _ => None,
        })
    }

    /// Consume the report, keeping only submitted records.
    #[must_use]
    pub fn into_submitted(self) -> Vec<TorrentRecord> {
        self.entries
            .into_iter()
            .filter_map(|entry| match entry.outcome {
                UploadOutcome::Submitted(record) => Some(record),
                _ => None,
            })
            .collect()
    }

    /// Files skipped because of a duplicate hash, locally or on the account.
    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| {
                matches!(
                    entry.outcome,
                    UploadOutcome::Duplicate { .. } | UploadOutcome::AlreadyOnAccount { .. }
                )
            })
            .count()
    }

    /// Files that failed.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| matches!(entry.outcome, UploadOutcome::Failed(_)))
            .count()
    }
}

/// `.torrent` files directly inside `dir`, sorted by name.
///
/// # Errors
///
/// Returns [`PipelineError::LocalIo`] when the directory cannot be read.
pub fn scan_torrent_files(dir: &Path) -> PipelineResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|err| {
            PipelineError::local_io("scan torrent directory", dir, io::Error::from(err))
        })?;
        let is_torrent = entry.file_type().is_file()
            && entry
                .path()
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(TORRENT_EXTENSION));
        if is_torrent {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

/// Submit every file once, tolerating per-file failures.
///
/// # Errors
///
/// Returns the [`ApiError`] that made the whole batch pointless (a rejected
/// credential). Every other failure is recorded in the report.
pub async fn upload_torrents(
    api: &dyn DebridApi,
    files: &[PathBuf],
    settings: &UploadSettings,
) -> Result<UploadReport, ApiError> {
    let existing = if settings.skip_existing {
        existing_hashes(api, settings).await?
    } else {
        HashMap::new()
    };
    let mut seen: HashMap<String, PathBuf> = HashMap::new();
    let mut report = UploadReport::default();

    for path in files {
        let outcome = match upload_one(api, path, settings, &mut seen, &existing).await {
            Err(PipelineError::Api(err)) if err.is_fatal() => return Err(err),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "torrent upload failed");
                UploadOutcome::Failed(err)
            }
            Ok(outcome) => outcome,
        };
        report.entries.push(UploadEntry {
            path: path.clone(),
            outcome,
        });
    }
    Ok(report)
}

async fn upload_one(
    api: &dyn DebridApi,
    path: &Path,
    settings: &UploadSettings,
    seen: &mut HashMap<String, PathBuf>,
    existing: &HashMap<String, String>,
) -> PipelineResult<UploadOutcome> {
    let bytes = fs::read(path)
        .await
        .map_err(|source| PipelineError::local_io("read torrent file", path, source))?;
    let info_hash =
        metainfo::info_hash(&bytes).map_err(|source| PipelineError::InvalidTorrent {
            path: path.to_path_buf(),
            source,
        })?;

    if let Some(first) = seen.get(&info_hash) {
        info!(path = %path.display(), info_hash, "skipping duplicate torrent file");
        return Ok(UploadOutcome::Duplicate {
            info_hash,
            first: first.clone(),
        });
    }
    if let Some(remote_id) = existing.get(&info_hash) {
        info!(path = %path.display(), info_hash, remote_id, "torrent already on account");
        return Ok(UploadOutcome::AlreadyOnAccount {
            remote_id: remote_id.clone(),
            info_hash,
        });
    }

    let mut record = submit(api, bytes, settings).await?;
    seen.insert(info_hash.clone(), path.to_path_buf());
    record.info_hash = Some(info_hash);
    record.local_filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned());
    info!(
        path = %path.display(),
        remote_id = %record.remote_id,
        "torrent submitted"
    );

    if let Some(dir) = settings.processed_dir.as_deref() {
        match fsutil::move_into(path, dir).await {
            Ok(target) => debug!(target = %target.display(), "moved processed torrent"),
            Err(err) => warn!(
                path = %path.display(),
                error = %err,
                "failed to move processed torrent"
            ),
        }
    }
    Ok(UploadOutcome::Submitted(record))
}

async fn submit(
    api: &dyn DebridApi,
    bytes: Vec<u8>,
    settings: &UploadSettings,
) -> PipelineResult<TorrentRecord> {
    let remote_id = settings
        .api_retry
        .run("torrents.addTorrent", || api.add_torrent(bytes.clone()))
        .await?;

    match prepare(api, &remote_id, settings).await {
        Ok(record) => Ok(record),
        Err(err) => {
            if !err.is_fatal() {
                discard(api, &remote_id).await;
            }
            Err(err)
        }
    }
}

async fn prepare(
    api: &dyn DebridApi,
    remote_id: &str,
    settings: &UploadSettings,
) -> PipelineResult<TorrentRecord> {
    let mut record = wait_for_files(api, remote_id, settings).await?;
    if !record.awaiting_selection() {
        debug!(remote_id, status = %record.remote_status, "file selection not required");
        return Ok(record);
    }

    let selection = settings.selection.resolve(&record.files);
    if selection.is_empty() {
        return Err(PipelineError::NoFilesSelected {
            remote_id: remote_id.to_string(),
        });
    }
    settings
        .api_retry
        .run("torrents.selectFiles", || {
            api.select_files(remote_id, &selection)
        })
        .await?;
    debug!(
        remote_id,
        policy = %settings.selection.describe(),
        files = %selection.form_value(),
        "files selected"
    );
    record.remote_status = "queued".to_string();
    record.status = TorrentStatus::Queued;
    Ok(record)
}

async fn wait_for_files(
    api: &dyn DebridApi,
    remote_id: &str,
    settings: &UploadSettings,
) -> PipelineResult<TorrentRecord> {
    let started = Instant::now();
    loop {
        let record = settings
            .api_retry
            .run("torrents.info", || api.get_torrent_info(remote_id))
            .await?;
        if record.awaiting_selection() {
            return Ok(record);
        }
        match record.status {
            TorrentStatus::Error => {
                return Err(PipelineError::RemoteFailed {
                    remote_id: remote_id.to_string(),
                    status: record.remote_status,
                });
            }
            TorrentStatus::Downloading | TorrentStatus::Complete => return Ok(record),
            TorrentStatus::Queued
                if !record
                    .remote_status
                    .eq_ignore_ascii_case(METADATA_CONVERSION) =>
            {
                return Ok(record);
            }
            TorrentStatus::Queued => {}
        }

        let waited = started.elapsed();
        if waited >= settings.metadata_wait {
            return Err(PipelineError::Timeout {
                remote_id: remote_id.to_string(),
                waited,
            });
        }
        debug!(remote_id, status = %record.remote_status, "waiting for torrent metadata");
        sleep(settings.metadata_interval).await;
    }
}

async fn discard(api: &dyn DebridApi, remote_id: &str) {
    match api.delete_torrent(remote_id).await {
        Ok(()) => info!(remote_id, "removed unusable torrent from account"),
        Err(err) => warn!(remote_id, error = %err, "failed to remove torrent"),
    }
}

async fn existing_hashes(
    api: &dyn DebridApi,
    settings: &UploadSettings,
) -> Result<HashMap<String, String>, ApiError> {
    match settings
        .api_retry
        .run("torrents.list", || api.list_torrents(None))
        .await
    {
        Ok(records) => Ok(records
            .into_iter()
            .filter_map(|record| {
                record
                    .info_hash
                    .map(|hash| (hash.to_ascii_lowercase(), record.remote_id))
            })
            .collect()),
        Err(err) if err.is_fatal() => Err(err),
        Err(err) => {
            warn!(error = %err, "could not list account torrents; existing check disabled");
            Ok(HashMap::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn scan_finds_torrent_files_case_insensitively() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        std::fs::write(dir.path().join("b.torrent"), b"d4:infodee")?;
        std::fs::write(dir.path().join("A.TORRENT"), b"d4:infodee")?;
        std::fs::write(dir.path().join("notes.txt"), b"hello")?;
        std::fs::create_dir(dir.path().join("nested.torrent"))?;
        std::fs::create_dir(dir.path().join("sub"))?;
        std::fs::write(dir.path().join("sub").join("c.torrent"), b"d4:infodee")?;

        let files = scan_torrent_files(dir.path())?;
        assert_eq!(
            files,
            vec![dir.path().join("A.TORRENT"), dir.path().join("b.torrent")]
        );
        Ok(())
    }

    #[test]
    fn scan_reports_missing_directories() {
        let err = scan_torrent_files(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, PipelineError::LocalIo { .. }));
    }

    #[test]
    fn report_counts_outcomes() {
        let report = UploadReport {
            entries: vec![
                UploadEntry {
                    path: PathBuf::from("a.torrent"),
                    outcome: UploadOutcome::Submitted(TorrentRecord::pending("A")),
                },
                UploadEntry {
                    path: PathBuf::from("b.torrent"),
                    outcome: UploadOutcome::Duplicate {
                        info_hash: "aa".into(),
                        first: PathBuf::from("a.torrent"),
                    },
                },
                UploadEntry {
                    path: PathBuf::from("c.torrent"),
                    outcome: UploadOutcome::Failed(PipelineError::NoFilesSelected {
                        remote_id: "C".into(),
                    }),
                },
            ],
        };
        assert_eq!(report.submitted().count(), 1);
        assert_eq!(report.skipped_count(), 1);
        assert_eq!(report.failed_count(), 1);
        assert_eq!(report.into_submitted()[0].remote_id, "A");
    }
}
