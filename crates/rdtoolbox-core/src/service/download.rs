//! Downloader: unrestrict hoster links and stream the direct URLs to disk.

use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::{PipelineError, PipelineResult};
use crate::fsutil::{partial_path, sanitize_filename, unique_path};
use crate::model::{TorrentRecord, TorrentStatus, UnrestrictedLink};
use crate::retry::RetryPolicy;
use crate::service::{ByteStream, DebridApi, LinkFetcher, ProgressReporter, TransferProgress};

const FOLDER_MARKER: &str = "folder";

/// Destination and retry knobs for a download pass.
#[derive(Debug, Clone)]
pub struct DownloadSettings {
    /// Directory receiving finished files.
    pub dest_dir: PathBuf,
    /// Retry policy for torrent info refreshes.
    pub api_retry: RetryPolicy,
    /// Retry policy for unrestrict calls.
    pub unrestrict_retry: RetryPolicy,
    /// Retry policy for byte transfers.
    pub download_retry: RetryPolicy,
}

/// A file written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedFile {
    /// Final location.
    pub path: PathBuf,
    /// Bytes written.
    pub bytes: u64,
}

/// Result for one hoster link.
#[derive(Debug)]
pub struct FileEntry {
    /// Torrent the link belongs to, if any.
    pub torrent: Option<String>,
    /// Hoster link that was processed.
    pub source_link: String,
    /// Remote file name once unrestricted.
    pub filename: Option<String>,
    /// Where the bytes went, or why they did not.
    pub outcome: PipelineResult<SavedFile>,
}

/// Outcome of a download pass.
#[derive(Debug, Default)]
pub struct DownloadReport {
    /// One entry per attempted link.
    pub files: Vec<FileEntry>,
    /// Torrents not downloaded because they are not complete.
    pub skipped: Vec<(String, TorrentStatus)>,
    /// Torrents whose link list could not be obtained.
    pub torrent_failures: Vec<(String, PipelineError)>,
}

impl DownloadReport {
    /// Successfully written files.
    pub fn saved(&self) -> impl Iterator<Item = &SavedFile> {
        self.files.iter().filter_map(|entry| entry.outcome.as_ref().ok())
    }

    /// Failed links plus failed torrents.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.files
            .iter()
            .filter(|entry| entry.outcome.is_err())
            .count()
            + self.torrent_failures.len()
    }

    /// Whether anything failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failed_count() > 0
    }

    fn push(&mut self, entry: FileEntry) -> PipelineResult<()> {
        match entry.outcome {
            Err(err) if err.is_fatal() => Err(err),
            _ => {
                self.files.push(entry);
                Ok(())
            }
        }
    }
}

/// Download every file of every complete torrent.
///
/// Each link is attempted once (including its bounded retries); a failure is
/// recorded and the pass moves on.
///
/// # Errors
///
/// Returns an error when the destination directory cannot be created or the
/// service rejects the credential.
pub async fn download_torrents(
    api: &dyn DebridApi,
    fetcher: &dyn LinkFetcher,
    progress: &dyn ProgressReporter,
    torrents: &[TorrentRecord],
    settings: &DownloadSettings,
) -> PipelineResult<DownloadReport> {
    prepare_destination(&settings.dest_dir).await?;
    let mut report = DownloadReport::default();

    for record in torrents {
        let remote_id = record.remote_id.as_str();
        if record.status != TorrentStatus::Complete {
            debug!(remote_id, status = record.status.as_str(), "skipping incomplete torrent");
            report.skipped.push((remote_id.to_string(), record.status));
            continue;
        }

        let fresh = match settings
            .api_retry
            .run("torrents.info", || api.get_torrent_info(remote_id))
            .await
        {
            Ok(fresh) => fresh,
            Err(err) if err.is_fatal() => return Err(err.into()),
            Err(err) => {
                warn!(
                    remote_id,
                    http_status = ?err.status(),
                    error = %err,
                    "could not refresh torrent links"
                );
                report.torrent_failures.push((remote_id.to_string(), err.into()));
                continue;
            }
        };
        if fresh.status != TorrentStatus::Complete {
            debug!(remote_id, status = %fresh.remote_status, "torrent no longer complete");
            report.skipped.push((remote_id.to_string(), fresh.status));
            continue;
        }
        if fresh.links.is_empty() {
            warn!(remote_id, "complete torrent has no links");
            report.torrent_failures.push((
                remote_id.to_string(),
                PipelineError::NoLinks {
                    remote_id: remote_id.to_string(),
                },
            ));
            continue;
        }

        info!(
            remote_id,
            name = %fresh.display_name(),
            files = fresh.links.len(),
            "downloading torrent"
        );
        for link in &fresh.links {
            let entry =
                process_link(api, fetcher, progress, Some(remote_id), link, settings).await;
            report.push(entry)?;
        }
    }
    Ok(report)
}

/// Download plain hoster links, expanding folder links into their files.
///
/// # Errors
///
/// Returns an error when the destination directory cannot be created or the
/// service rejects the credential.
pub async fn download_links(
    api: &dyn DebridApi,
    fetcher: &dyn LinkFetcher,
    progress: &dyn ProgressReporter,
    links: &[String],
    settings: &DownloadSettings,
) -> PipelineResult<DownloadReport> {
    prepare_destination(&settings.dest_dir).await?;
    let mut report = DownloadReport::default();

    for link in links.iter().map(|link| link.trim()).filter(|link| !link.is_empty()) {
        if is_folder_link(link) {
            if let Some(children) = expand_folder(api, link, settings).await? {
                for child in &children {
                    let entry = process_link(api, fetcher, progress, None, child, settings).await;
                    report.push(entry)?;
                }
                continue;
            }
            let entry = process_link(api, fetcher, progress, None, link, settings).await;
            report.push(entry)?;
            continue;
        }

        match unrestrict(api, link, settings).await {
            Ok(unrestricted) => {
                let entry =
                    fetch_unrestricted(fetcher, progress, None, unrestricted, settings).await;
                report.push(entry)?;
            }
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => match expand_folder(api, link, settings).await? {
                Some(children) => {
                    for child in &children {
                        let entry =
                            process_link(api, fetcher, progress, None, child, settings).await;
                        report.push(entry)?;
                    }
                }
                None => {
                    warn!(link, error = %err, "hoster link could not be unrestricted");
                    report.push(FileEntry {
                        torrent: None,
                        source_link: link.to_string(),
                        filename: None,
                        outcome: Err(err),
                    })?;
                }
            },
        }
    }
    Ok(report)
}

fn is_folder_link(link: &str) -> bool {
    link.to_ascii_lowercase().contains(FOLDER_MARKER)
}

async fn prepare_destination(dir: &Path) -> PipelineResult<()> {
    fs::create_dir_all(dir)
        .await
        .map_err(|source| PipelineError::local_io("create download directory", dir, source))
}

/// Folder expansion; `None` when the link is not a usable folder.
async fn expand_folder(
    api: &dyn DebridApi,
    link: &str,
    settings: &DownloadSettings,
) -> PipelineResult<Option<Vec<String>>> {
    match settings
        .unrestrict_retry
        .run("unrestrict.folder", || api.unrestrict_folder(link))
        .await
    {
        Ok(children) if children.is_empty() => {
            debug!(link, "folder expansion returned no links");
            Ok(None)
        }
        Ok(children) => {
            info!(link, files = children.len(), "expanded folder link");
            Ok(Some(children))
        }
        Err(err) if err.is_fatal() => Err(err.into()),
        Err(err) => {
            debug!(link, error = %err, "folder expansion failed");
            Ok(None)
        }
    }
}

async fn unrestrict(
    api: &dyn DebridApi,
    link: &str,
    settings: &DownloadSettings,
) -> PipelineResult<UnrestrictedLink> {
    Ok(settings
        .unrestrict_retry
        .run("unrestrict.link", || api.unrestrict_link(link))
        .await?)
}

async fn process_link(
    api: &dyn DebridApi,
    fetcher: &dyn LinkFetcher,
    progress: &dyn ProgressReporter,
    torrent: Option<&str>,
    link: &str,
    settings: &DownloadSettings,
) -> FileEntry {
    match unrestrict(api, link, settings).await {
        Ok(unrestricted) => {
            fetch_unrestricted(fetcher, progress, torrent, unrestricted, settings).await
        }
        Err(err) => {
            warn!(link, error = %err, "hoster link could not be unrestricted");
            FileEntry {
                torrent: torrent.map(str::to_string),
                source_link: link.to_string(),
                filename: None,
                outcome: Err(err),
            }
        }
    }
}

async fn fetch_unrestricted(
    fetcher: &dyn LinkFetcher,
    progress: &dyn ProgressReporter,
    torrent: Option<&str>,
    unrestricted: UnrestrictedLink,
    settings: &DownloadSettings,
) -> FileEntry {
    let outcome = save(fetcher, progress, &unrestricted, settings).await;
    match &outcome {
        Ok(saved) => info!(
            path = %saved.path.display(),
            bytes = saved.bytes,
            "file downloaded"
        ),
        Err(err) => warn!(
            link = %unrestricted.source_link,
            filename = %unrestricted.filename,
            error = %err,
            "file download failed"
        ),
    }
    FileEntry {
        torrent: torrent.map(str::to_string),
        source_link: unrestricted.source_link,
        filename: Some(unrestricted.filename),
        outcome,
    }
}

async fn save(
    fetcher: &dyn LinkFetcher,
    progress: &dyn ProgressReporter,
    unrestricted: &UnrestrictedLink,
    settings: &DownloadSettings,
) -> PipelineResult<SavedFile> {
    let name = sanitize_filename(&unrestricted.filename);
    let target = unique_path(&settings.dest_dir, &name)
        .await
        .map_err(|source| {
            PipelineError::local_io("choose download destination", &settings.dest_dir, source)
        })?;
    settings
        .download_retry
        .run("download", || {
            transfer(fetcher, progress, &unrestricted.direct_url, &name, &target)
        })
        .await
}

async fn transfer(
    fetcher: &dyn LinkFetcher,
    progress: &dyn ProgressReporter,
    url: &str,
    label: &str,
    target: &Path,
) -> PipelineResult<SavedFile> {
    let content = fetcher.fetch(url).await?;
    let partial = partial_path(target);
    let mut handle = progress.begin(label, content.total);

    let written = match write_stream(content.stream, &partial, handle.as_mut()).await {
        Ok(written) => written,
        Err(err) => {
            handle.finish(false);
            remove_partial(&partial).await;
            return Err(err);
        }
    };
    if let Err(source) = fs::rename(&partial, target).await {
        handle.finish(false);
        remove_partial(&partial).await;
        return Err(PipelineError::local_io("finalise download", target, source));
    }
    handle.finish(true);
    Ok(SavedFile {
        path: target.to_path_buf(),
        bytes: written,
    })
}

async fn write_stream(
    mut stream: ByteStream,
    partial: &Path,
    progress: &mut dyn TransferProgress,
) -> PipelineResult<u64> {
    let mut file = fs::File::create(partial)
        .await
        .map_err(|source| PipelineError::local_io("create partial download", partial, source))?;
    let mut written = 0_u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk)
            .await
            .map_err(|source| PipelineError::local_io("write download", partial, source))?;
        let len = u64::try_from(chunk.len()).unwrap_or(u64::MAX);
        written = written.saturating_add(len);
        progress.advance(len);
    }
    file.flush()
        .await
        .map_err(|source| PipelineError::local_io("flush download", partial, source))?;
    Ok(written)
}

async fn remove_partial(partial: &Path) {
    match fs::remove_file(partial).await {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => warn!(
            path = %partial.display(),
            error = %err,
            "failed to remove partial download"
        ),
    }
}
