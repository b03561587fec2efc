#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! Service-agnostic Real-Debrid domain types, API seams, and pipeline services.
//!
//! Layout:
//! - `model/`: torrent records, statuses, links, account and hoster views
//! - `error.rs`: API and pipeline error taxonomy
//! - `retry.rs`: bounded fixed-delay retry policy
//! - `metainfo.rs`: info-hash derivation from `.torrent` bytes
//! - `selection.rs`: file-selection policies resolved against a file list
//! - `fsutil.rs`: filename sanitising and collision-free destinations
//! - `service/`: the `DebridApi`/`LinkFetcher` traits plus the uploader,
//!   status poller, downloader, and deduplicator

pub mod error;
pub mod fsutil;
pub mod metainfo;
pub mod model;
pub mod retry;
pub mod selection;
pub mod service;

pub use error::{ApiError, ApiResult, BoxError, MetainfoError, PipelineError, PipelineResult};
pub use model::{
    AWAITING_SELECTION, AccountInfo, FileSelection, HostStatus, TorrentFile, TorrentRecord,
    TorrentStatus, UnrestrictedLink,
};
pub use retry::{RetryPolicy, Retryable};
pub use selection::SelectionPolicy;
pub use service::dedupe::{DedupePlan, DedupeReport, DuplicateGroup, apply_dedupe, plan_dedupe};
pub use service::download::{
    DownloadReport, DownloadSettings, FileEntry, SavedFile, download_links, download_torrents,
};
pub use service::poller::{PollOutcome, PollReport, PollSettings, poll_until_terminal};
pub use service::upload::{
    UploadEntry, UploadOutcome, UploadReport, UploadSettings, scan_torrent_files, upload_torrents,
};
pub use service::{
    ByteStream, DebridApi, FetchedContent, LinkFetcher, ProgressReporter, SilentProgress,
    TransferProgress,
};
