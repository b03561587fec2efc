//! JSON payloads exchanged with the REST API.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rdtoolbox_core::{AccountInfo, HostStatus, TorrentFile, TorrentRecord, UnrestrictedLink};
use serde::{Deserialize, Deserializer};

/// Error body returned with non-success statuses.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub(crate) error: Option<String>,
    pub(crate) error_code: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AddTorrentResponse {
    pub(crate) id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TorrentPayload {
    id: String,
    #[serde(default)]
    filename: String,
    #[serde(default)]
    hash: Option<String>,
    #[serde(default)]
    bytes: u64,
    #[serde(default)]
    progress: f64,
    #[serde(default)]
    status: String,
    #[serde(default)]
    added: Option<String>,
    #[serde(default)]
    speed: Option<u64>,
    #[serde(default)]
    files: Vec<FilePayload>,
    #[serde(default)]
    links: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct FilePayload {
    id: u64,
    #[serde(default)]
    path: String,
    #[serde(default)]
    bytes: u64,
    #[serde(default, deserialize_with = "flag")]
    selected: bool,
}

impl From<TorrentPayload> for TorrentRecord {
    fn from(payload: TorrentPayload) -> Self {
        let mut record = Self::new(payload.id, payload.filename, payload.status);
        record.info_hash = payload
            .hash
            .filter(|hash| !hash.is_empty())
            .map(|hash| hash.to_ascii_lowercase());
        record.byte_size = payload.bytes;
        record.progress = payload.progress;
        record.speed = payload.speed;
        record.added = payload.added.as_deref().and_then(parse_timestamp);
        record.files = payload
            .files
            .into_iter()
            .map(|file| TorrentFile {
                id: file.id,
                path: file.path,
                byte_size: file.bytes,
                selected: file.selected,
            })
            .collect();
        record.links = payload.links;
        record
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct UnrestrictPayload {
    #[serde(default)]
    filename: String,
    #[serde(default)]
    filesize: Option<u64>,
    #[serde(default)]
    link: Option<String>,
    download: String,
}

impl UnrestrictPayload {
    pub(crate) fn into_link(self, requested: &str) -> UnrestrictedLink {
        UnrestrictedLink {
            source_link: self.link.unwrap_or_else(|| requested.to_string()),
            direct_url: self.download,
            filename: self.filename,
            byte_size: self.filesize,
        }
    }
}

/// Folder expansion entries arrive either as bare links or as objects.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum FolderEntry {
    Link(String),
    Object { link: String },
}

impl FolderEntry {
    pub(crate) fn into_link(self) -> String {
        match self {
            Self::Link(link) | Self::Object { link } => link,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserPayload {
    username: String,
    #[serde(default)]
    premium: i64,
    #[serde(default)]
    expiration: Option<String>,
    #[serde(default, rename = "type")]
    kind: String,
}

impl From<UserPayload> for AccountInfo {
    fn from(payload: UserPayload) -> Self {
        Self {
            username: payload.username,
            premium: payload.kind.eq_ignore_ascii_case("premium") || payload.premium > 0,
            expiration: payload.expiration.as_deref().and_then(parse_timestamp),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct HostPayload {
    #[serde(default)]
    name: Option<String>,
    #[serde(default, deserialize_with = "flag")]
    supported: bool,
    #[serde(default)]
    status: String,
}

pub(crate) fn hosts_from_map(map: BTreeMap<String, HostPayload>) -> Vec<HostStatus> {
    map.into_iter()
        .map(|(host, payload)| HostStatus {
            name: payload.name.unwrap_or_else(|| host.clone()),
            host,
            supported: payload.supported,
            up: payload.status.eq_ignore_ascii_case("up"),
        })
        .collect()
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|stamp| stamp.with_timezone(&Utc))
}

/// Accept `true`/`false` as well as `1`/`0`.
fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }
    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(value) => value,
        Flag::Int(value) => value != 0,
    })
}
