//! Torrent payloads, record builders, and temp-file helpers.

use std::path::{Path, PathBuf};

use chrono::{TimeZone, Utc};
use rdtoolbox_core::{TorrentFile, TorrentRecord, metainfo};

/// Minimal single-file `.torrent` payload; distinct names give distinct hashes.
#[must_use]
pub fn torrent_bytes(name: &str) -> Vec<u8> {
    format!(
        "d8:announce22:http://tracker.example4:infod6:lengthi{len}e4:name{name_len}:{name}12:piece lengthi16384e6:pieces20:AAAAAAAAAAAAAAAAAAAAee",
        len = name.len() + 1,
        name_len = name.len(),
    )
    .into_bytes()
}

/// Info-hash of [`torrent_bytes`] for `name`.
///
/// # Panics
///
/// Panics if the generated payload stops parsing as metainfo.
#[must_use]
pub fn torrent_hash(name: &str) -> String {
    metainfo::info_hash(&torrent_bytes(name)).expect("fixture metainfo is valid")
}

/// Write a torrent named `name` into `dir` as `file_name`.
///
/// # Errors
///
/// Returns the IO error from writing the file.
pub fn write_torrent(dir: &Path, file_name: &str, name: &str) -> anyhow::Result<PathBuf> {
    let path = dir.join(file_name);
    std::fs::write(&path, torrent_bytes(name))?;
    Ok(path)
}

/// Record in the given remote status.
#[must_use]
pub fn record(remote_id: &str, remote_status: &str) -> TorrentRecord {
    TorrentRecord::new(remote_id, format!("{remote_id}-name"), remote_status)
}

/// Complete record exposing `links`.
#[must_use]
pub fn complete_record(remote_id: &str, links: &[&str]) -> TorrentRecord {
    let mut record = record(remote_id, "downloaded");
    record.progress = 100.0;
    record.links = links.iter().map(|link| (*link).to_string()).collect();
    record
}

/// Record carrying an info-hash and an added day in March 2026.
#[must_use]
pub fn hashed_record(remote_id: &str, info_hash: &str, added_day: Option<u32>) -> TorrentRecord {
    let mut record = record(remote_id, "downloaded");
    record.info_hash = Some(info_hash.to_string());
    record.added =
        added_day.and_then(|day| Utc.with_ymd_and_hms(2026, 3, day, 12, 0, 0).single());
    record
}

/// File entry for a torrent's file list.
#[must_use]
pub fn torrent_file(id: u64, path: &str, byte_size: u64) -> TorrentFile {
    TorrentFile {
        id,
        path: path.to_string(),
        byte_size,
        selected: false,
    }
}
