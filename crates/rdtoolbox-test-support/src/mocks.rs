//! In-memory stand-ins for the debrid service and direct-download fetcher.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream;
use rdtoolbox_core::{
    AWAITING_SELECTION, AccountInfo, ApiError, ApiResult, DebridApi, FetchedContent,
    FileSelection, HostStatus, LinkFetcher, ProgressReporter, TorrentFile, TorrentRecord,
    TorrentStatus, TransferProgress, UnrestrictedLink, metainfo,
};

/// Operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FakeOp {
    /// `add_torrent`.
    Add,
    /// `get_torrent_info`.
    Info,
    /// `list_torrents`.
    List,
    /// `select_files`.
    Select,
    /// `unrestrict_link`.
    Unrestrict,
    /// `unrestrict_folder`.
    Folder,
    /// `delete_torrent`.
    Delete,
    /// `account`.
    Account,
}

/// Injected failure kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// Transport failure (retryable).
    Network,
    /// Credential rejected (fatal).
    Unauthorized,
    /// Non-success HTTP status.
    Status(u16),
}

impl Failure {
    fn into_error(self, operation: &'static str) -> ApiError {
        match self {
            Self::Network => {
                ApiError::network(operation, io::Error::other("connection reset by fake"))
            }
            Self::Unauthorized => ApiError::Unauthorized {
                status: 401,
                message: "bad_token".to_string(),
            },
            Self::Status(status) => ApiError::Rejected {
                operation,
                status,
                code: None,
                message: format!("fake status {status}"),
            },
        }
    }
}

#[derive(Debug)]
struct Injected {
    failure: Failure,
    remaining: Option<usize>,
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    torrents: Vec<TorrentRecord>,
    scripts: HashMap<String, VecDeque<String>>,
    added_files: Vec<TorrentFile>,
    added_status: Option<String>,
    after_selection: Option<String>,
    folders: HashMap<String, Vec<String>>,
    failures: HashMap<(FakeOp, String), Injected>,
    add_calls: usize,
    info_calls: HashMap<String, usize>,
    selections: Vec<(String, FileSelection)>,
    unrestricted: Vec<String>,
    folder_calls: Vec<String>,
    deleted: Vec<String>,
    account: Option<AccountInfo>,
    hosts: Vec<HostStatus>,
}

impl State {
    fn take_failure(&mut self, op: FakeOp, key: &str, operation: &'static str) -> ApiResult<()> {
        for lookup in [key, "*"] {
            let slot = (op, lookup.to_string());
            let Some(injected) = self.failures.get_mut(&slot) else {
                continue;
            };
            if injected.remaining == Some(0) {
                self.failures.remove(&slot);
                continue;
            }
            if let Some(remaining) = injected.remaining.as_mut() {
                *remaining -= 1;
            }
            return Err(injected.failure.clone().into_error(operation));
        }
        Ok(())
    }

    fn position(&self, remote_id: &str) -> Option<usize> {
        self.torrents
            .iter()
            .position(|record| record.remote_id == remote_id)
    }

    fn unknown(remote_id: &str, operation: &'static str) -> ApiError {
        ApiError::Rejected {
            operation,
            status: 404,
            code: Some(7),
            message: format!("unknown_ressource {remote_id}"),
        }
    }
}

/// Scriptable in-memory account.
///
/// Torrents added through [`DebridApi::add_torrent`] get ids `T1`, `T2`, ...
/// and start in the awaiting-selection state with the configured file list.
#[derive(Debug, Default)]
pub struct FakeDebrid {
    state: Mutex<State>,
}

impl FakeDebrid {
    /// Empty account.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Place a torrent on the account.
    pub fn insert_torrent(&self, record: TorrentRecord) {
        self.state().torrents.push(record);
    }

    /// File list given to newly added torrents.
    pub fn set_added_files(&self, files: Vec<TorrentFile>) {
        self.state().added_files = files;
    }

    /// Remote status given to newly added torrents.
    pub fn set_added_status(&self, status: &str) {
        self.state().added_status = Some(status.to_string());
    }

    /// Remote status applied once files are selected.
    pub fn set_status_after_selection(&self, status: &str) {
        self.state().after_selection = Some(status.to_string());
    }

    /// Statuses returned by successive info calls for `remote_id`; the last one sticks.
    pub fn script_statuses(&self, remote_id: &str, statuses: &[&str]) {
        self.state().scripts.insert(
            remote_id.to_string(),
            statuses.iter().map(|status| (*status).to_string()).collect(),
        );
    }

    /// Expansion returned for a folder link.
    pub fn set_folder(&self, link: &str, children: &[&str]) {
        self.state().folders.insert(
            link.to_string(),
            children.iter().map(|child| (*child).to_string()).collect(),
        );
    }

    /// Account returned by [`DebridApi::account`].
    pub fn set_account(&self, account: AccountInfo) {
        self.state().account = Some(account);
    }

    /// Hosts returned by [`DebridApi::host_status`].
    pub fn set_hosts(&self, hosts: Vec<HostStatus>) {
        self.state().hosts = hosts;
    }

    /// Fail `op` for `key` (remote id, link, or `"*"` for any) `times` times, or forever.
    pub fn fail(&self, op: FakeOp, key: &str, failure: Failure, times: Option<usize>) {
        self.state().failures.insert(
            (op, key.to_string()),
            Injected {
                failure,
                remaining: times,
            },
        );
    }

    /// Number of `add_torrent` calls.
    #[must_use]
    pub fn add_calls(&self) -> usize {
        self.state().add_calls
    }

    /// Number of info calls for `remote_id`.
    #[must_use]
    pub fn info_calls(&self, remote_id: &str) -> usize {
        self.state()
            .info_calls
            .get(remote_id)
            .copied()
            .unwrap_or_default()
    }

    /// Selections made, in call order.
    #[must_use]
    pub fn selections(&self) -> Vec<(String, FileSelection)> {
        self.state().selections.clone()
    }

    /// Links passed to `unrestrict_link`, in call order.
    #[must_use]
    pub fn unrestricted(&self) -> Vec<String> {
        self.state().unrestricted.clone()
    }

    /// Links passed to `unrestrict_folder`, in call order.
    #[must_use]
    pub fn folder_calls(&self) -> Vec<String> {
        self.state().folder_calls.clone()
    }

    /// Deleted remote ids, in call order.
    #[must_use]
    pub fn deleted(&self) -> Vec<String> {
        self.state().deleted.clone()
    }

    /// Ids still on the account.
    #[must_use]
    pub fn remote_ids(&self) -> Vec<String> {
        self.state()
            .torrents
            .iter()
            .map(|record| record.remote_id.clone())
            .collect()
    }
}

/// Direct URL the fake derives for a hoster link.
#[must_use]
pub fn direct_url_for(link: &str) -> String {
    format!("https://download.example/{}", file_name_for(link))
}

/// File name the fake derives for a hoster link.
#[must_use]
pub fn file_name_for(link: &str) -> String {
    let last = link.rsplit('/').find(|part| !part.is_empty()).unwrap_or(link);
    format!("{last}.bin")
}

#[async_trait]
impl DebridApi for FakeDebrid {
    async fn account(&self) -> ApiResult<AccountInfo> {
        let mut state = self.state();
        state.take_failure(FakeOp::Account, "*", "user")?;
        Ok(state.account.clone().unwrap_or_else(|| AccountInfo {
            username: "tester".to_string(),
            premium: true,
            expiration: None,
        }))
    }

    async fn add_torrent(&self, torrent: Vec<u8>) -> ApiResult<String> {
        let mut state = self.state();
        state.add_calls += 1;
        state.take_failure(FakeOp::Add, "*", "torrents.addTorrent")?;
        state.next_id += 1;
        let remote_id = format!("T{}", state.next_id);
        let status = state
            .added_status
            .clone()
            .unwrap_or_else(|| AWAITING_SELECTION.to_string());
        let mut record = TorrentRecord::new(&remote_id, format!("{remote_id}-name"), status);
        record.info_hash = metainfo::info_hash(&torrent).ok();
        record.files = state.added_files.clone();
        state.torrents.push(record);
        Ok(remote_id)
    }

    async fn get_torrent_info(&self, remote_id: &str) -> ApiResult<TorrentRecord> {
        let mut state = self.state();
        *state.info_calls.entry(remote_id.to_string()).or_default() += 1;
        state.take_failure(FakeOp::Info, remote_id, "torrents.info")?;
        let scripted = state.scripts.get_mut(remote_id).and_then(|script| {
            if script.len() > 1 {
                script.pop_front()
            } else {
                script.front().cloned()
            }
        });
        let index = state
            .position(remote_id)
            .ok_or_else(|| State::unknown(remote_id, "torrents.info"))?;
        let record = &mut state.torrents[index];
        if let Some(status) = scripted {
            record.status = TorrentStatus::from_remote(&status);
            record.remote_status = status;
        }
        Ok(record.clone())
    }

    async fn list_torrents(&self, limit: Option<usize>) -> ApiResult<Vec<TorrentRecord>> {
        let mut state = self.state();
        state.take_failure(FakeOp::List, "*", "torrents.list")?;
        let records = state.torrents.iter().cloned();
        Ok(match limit {
            Some(limit) => records.take(limit).collect(),
            None => records.collect(),
        })
    }

    async fn select_files(&self, remote_id: &str, selection: &FileSelection) -> ApiResult<()> {
        let mut state = self.state();
        state.take_failure(FakeOp::Select, remote_id, "torrents.selectFiles")?;
        let index = state
            .position(remote_id)
            .ok_or_else(|| State::unknown(remote_id, "torrents.selectFiles"))?;
        let status = state
            .after_selection
            .clone()
            .unwrap_or_else(|| "downloading".to_string());
        let record = &mut state.torrents[index];
        for file in &mut record.files {
            file.selected = match selection {
                FileSelection::All => true,
                FileSelection::Ids(ids) => ids.contains(&file.id),
            };
        }
        record.status = TorrentStatus::from_remote(&status);
        record.remote_status = status;
        state
            .selections
            .push((remote_id.to_string(), selection.clone()));
        Ok(())
    }

    async fn unrestrict_link(&self, link: &str) -> ApiResult<UnrestrictedLink> {
        let mut state = self.state();
        state.unrestricted.push(link.to_string());
        state.take_failure(FakeOp::Unrestrict, link, "unrestrict.link")?;
        Ok(UnrestrictedLink {
            source_link: link.to_string(),
            direct_url: direct_url_for(link),
            filename: file_name_for(link),
            byte_size: None,
        })
    }

    async fn unrestrict_folder(&self, link: &str) -> ApiResult<Vec<String>> {
        let mut state = self.state();
        state.folder_calls.push(link.to_string());
        state.take_failure(FakeOp::Folder, link, "unrestrict.folder")?;
        state.folders.get(link).cloned().ok_or_else(|| ApiError::Rejected {
            operation: "unrestrict.folder",
            status: 503,
            code: Some(19),
            message: "hoster_unavailable".to_string(),
        })
    }

    async fn delete_torrent(&self, remote_id: &str) -> ApiResult<()> {
        let mut state = self.state();
        state.take_failure(FakeOp::Delete, remote_id, "torrents.delete")?;
        let index = state
            .position(remote_id)
            .ok_or_else(|| State::unknown(remote_id, "torrents.delete"))?;
        state.torrents.remove(index);
        state.deleted.push(remote_id.to_string());
        Ok(())
    }

    async fn host_status(&self) -> ApiResult<Vec<HostStatus>> {
        Ok(self.state().hosts.clone())
    }
}

#[derive(Debug, Default)]
struct FetchState {
    bodies: HashMap<String, Vec<Bytes>>,
    broken: HashMap<String, usize>,
    midstream: HashMap<String, usize>,
    calls: Vec<String>,
}

/// Serves canned bodies for direct URLs.
///
/// Unregistered URLs serve the URL itself as the body.
#[derive(Debug, Default)]
pub struct FakeFetcher {
    state: Mutex<FetchState>,
}

impl FakeFetcher {
    /// Fetcher with no canned bodies.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, FetchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Serve `chunks` for `url`.
    pub fn set_body<I, B>(&self, url: &str, chunks: I)
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        self.state().bodies.insert(
            url.to_string(),
            chunks
                .into_iter()
                .map(|chunk| Bytes::copy_from_slice(chunk.as_ref()))
                .collect(),
        );
    }

    /// Refuse to open `url` the next `times` times with a network error.
    pub fn fail_open(&self, url: &str, times: usize) {
        self.state().broken.insert(url.to_string(), times);
    }

    /// Break the body of `url` after its first chunk, the next `times` times.
    pub fn fail_midstream(&self, url: &str, times: usize) {
        self.state().midstream.insert(url.to_string(), times);
    }

    /// URLs fetched, in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }
}

fn consume(counter: &mut HashMap<String, usize>, url: &str) -> bool {
    match counter.get_mut(url) {
        Some(remaining) if *remaining > 0 => {
            *remaining -= 1;
            true
        }
        _ => false,
    }
}

#[async_trait]
impl LinkFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> ApiResult<FetchedContent> {
        let mut state = self.state();
        state.calls.push(url.to_string());
        if consume(&mut state.broken, url) {
            return Err(ApiError::network(
                "download",
                io::Error::other("connection refused by fake"),
            ));
        }
        let chunks = state
            .bodies
            .get(url)
            .cloned()
            .unwrap_or_else(|| vec![Bytes::from(url.to_string())]);
        let total = chunks
            .iter()
            .map(|chunk| u64::try_from(chunk.len()).unwrap_or(u64::MAX))
            .sum();

        let mut items: Vec<ApiResult<Bytes>> = Vec::with_capacity(chunks.len());
        if consume(&mut state.midstream, url) {
            items.extend(chunks.into_iter().take(1).map(Ok));
            items.push(Err(ApiError::network(
                "download",
                io::Error::other("stream interrupted by fake"),
            )));
        } else {
            items.extend(chunks.into_iter().map(Ok));
        }
        Ok(FetchedContent {
            total: Some(total),
            stream: Box::pin(stream::iter(items)),
        })
    }
}

/// Progress reporter that records every call.
#[derive(Debug, Default)]
pub struct RecordingProgress {
    events: std::sync::Arc<Mutex<Vec<ProgressEvent>>>,
}

/// One recorded progress call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// A transfer started.
    Begin {
        /// Transfer label.
        label: String,
        /// Advertised size.
        total: Option<u64>,
    },
    /// Bytes advanced.
    Advance(u64),
    /// A transfer ended.
    Finish(bool),
}

impl RecordingProgress {
    /// Empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded events, in call order.
    #[must_use]
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

struct RecordingTransfer {
    events: std::sync::Arc<Mutex<Vec<ProgressEvent>>>,
}

impl RecordingTransfer {
    fn push(&self, event: ProgressEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl ProgressReporter for RecordingProgress {
    fn begin(&self, label: &str, total: Option<u64>) -> Box<dyn TransferProgress> {
        let transfer = RecordingTransfer {
            events: std::sync::Arc::clone(&self.events),
        };
        transfer.push(ProgressEvent::Begin {
            label: label.to_string(),
            total,
        });
        Box::new(transfer)
    }
}

impl TransferProgress for RecordingTransfer {
    fn advance(&mut self, bytes: u64) {
        self.push(ProgressEvent::Advance(bytes));
    }

    fn finish(&mut self, success: bool) {
        self.push(ProgressEvent::Finish(success));
    }
}
