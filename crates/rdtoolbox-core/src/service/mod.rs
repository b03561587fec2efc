//! Remote-service seams and the pipeline services built on top of them.

pub mod dedupe;
pub mod download;
pub mod poller;
pub mod upload;

use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::Stream;

use crate::error::ApiResult;
use crate::model::{AccountInfo, FileSelection, HostStatus, TorrentRecord, UnrestrictedLink};

/// Body of a direct download, yielded chunk by chunk.
pub type ByteStream = Pin<Box<dyn Stream<Item = ApiResult<Bytes>> + Send>>;

/// Authenticated operations against the debrid account.
#[async_trait]
pub trait DebridApi: Send + Sync {
    /// Account summary; doubles as the credential check.
    async fn account(&self) -> ApiResult<AccountInfo>;

    /// Submit raw `.torrent` bytes and return the remote identifier.
    async fn add_torrent(&self, torrent: Vec<u8>) -> ApiResult<String>;

    /// Full details for one torrent, including files and links.
    async fn get_torrent_info(&self, remote_id: &str) -> ApiResult<TorrentRecord>;

    /// Torrents on the account, newest first; `limit` caps the count.
    async fn list_torrents(&self, limit: Option<usize>) -> ApiResult<Vec<TorrentRecord>>;

    /// Select files on a torrent awaiting selection.
    async fn select_files(&self, remote_id: &str, selection: &FileSelection) -> ApiResult<()>;

    /// Turn a hoster link into a direct download.
    async fn unrestrict_link(&self, link: &str) -> ApiResult<UnrestrictedLink>;

    /// Expand a hoster folder link into its file links.
    async fn unrestrict_folder(&self, link: &str) -> ApiResult<Vec<String>>;

    /// Remove a torrent from the account.
    async fn delete_torrent(&self, remote_id: &str) -> ApiResult<()>;

    /// Availability of every hoster known to the service.
    async fn host_status(&self) -> ApiResult<Vec<HostStatus>>;
}

/// Opened direct download.
pub struct FetchedContent {
    /// Advertised content length, when known.
    pub total: Option<u64>,
    /// Body chunks.
    pub stream: ByteStream,
}

impl fmt::Debug for FetchedContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchedContent")
            .field("total", &self.total)
            .finish_non_exhaustive()
    }
}

/// Unauthenticated byte source for direct download URLs.
#[async_trait]
pub trait LinkFetcher: Send + Sync {
    /// Open a streaming GET for `url`.
    async fn fetch(&self, url: &str) -> ApiResult<FetchedContent>;
}

/// Sink for per-file transfer progress.
pub trait ProgressReporter: Send + Sync {
    /// Start tracking one transfer.
    fn begin(&self, label: &str, total: Option<u64>) -> Box<dyn TransferProgress>;
}

/// Progress handle for a single transfer.
pub trait TransferProgress: Send {
    /// Record `bytes` more bytes written.
    fn advance(&mut self, bytes: u64);
    /// Close the transfer.
    fn finish(&mut self, success: bool);
}

/// Reporter that discards progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn begin(&self, _label: &str, _total: Option<u64>) -> Box<dyn TransferProgress> {
        Box::new(Self)
    }
}

impl TransferProgress for SilentProgress {
    fn advance(&mut self, _bytes: u64) {}

    fn finish(&mut self, _success: bool) {}
}
