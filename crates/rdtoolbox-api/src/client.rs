//! Authenticated client for the REST API plus the direct-download fetcher.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use rdtoolbox_core::{
    AccountInfo, ApiError, ApiResult, DebridApi, FetchedContent, FileSelection, HostStatus,
    LinkFetcher, TorrentRecord, UnrestrictedLink,
};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use crate::wire::{
    AddTorrentResponse, ErrorBody, FolderEntry, HostPayload, TorrentPayload, UnrestrictPayload,
    UserPayload, hosts_from_map,
};

const TOTAL_COUNT_HEADER: &str = "x-total-count";

/// Connection settings for [`RealDebridClient`].
#[derive(Clone)]
pub struct ClientConfig {
    /// API root, without a trailing slash.
    pub base_url: String,
    /// Private API token.
    pub token: String,
    /// Per-request timeout for API calls.
    pub timeout: Duration,
    /// Page size used when listing torrents.
    pub page_limit: usize,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("page_limit", &self.page_limit)
            .finish()
    }
}

/// Failures while constructing the client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The token cannot be sent as a header value.
    #[error("API token contains characters that cannot be sent in a header")]
    InvalidToken,
    /// The HTTP stack could not be initialised.
    #[error("failed to build HTTP client")]
    Build {
        /// Underlying builder error.
        #[source]
        source: reqwest::Error,
    },
}

/// reqwest-backed implementation of [`DebridApi`] and [`LinkFetcher`].
#[derive(Debug, Clone)]
pub struct RealDebridClient {
    api: Client,
    downloads: Client,
    base_url: String,
    page_limit: usize,
}

impl RealDebridClient {
    /// Build API and download clients from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the token is not a valid header value or the
    /// TLS stack cannot be initialised.
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", config.token.trim()))
            .map_err(|_| ClientError::InvalidToken)?;
        bearer.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, bearer);

        let api = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|source| ClientError::Build { source })?;
        let downloads = Client::builder()
            .connect_timeout(config.timeout)
            .build()
            .map_err(|source| ClientError::Build { source })?;

        Ok(Self {
            api,
            downloads,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            page_limit: config.page_limit.max(1),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send(&self, operation: &'static str, request: RequestBuilder) -> ApiResult<Response> {
        let response = request
            .send()
            .await
            .map_err(|err| ApiError::network(operation, err))?;
        let status = response.status();
        debug!(operation, status = status.as_u16(), "api response");
        if status.is_success() {
            Ok(response)
        } else {
            Err(classify(operation, response).await)
        }
    }

    async fn list_page(&self, page: usize) -> ApiResult<(Vec<TorrentRecord>, Option<usize>)> {
        let request = self.api.get(self.endpoint("torrents")).query(&[
            ("page", page.to_string()),
            ("limit", self.page_limit.to_string()),
        ]);
        let response = self.send("torrents.list", request).await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok((Vec::new(), Some(0)));
        }
        let total = response
            .headers()
            .get(TOTAL_COUNT_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<usize>().ok());
        let payloads: Vec<TorrentPayload> = decode("torrents.list", response).await?;
        Ok((payloads.into_iter().map(TorrentRecord::from).collect(), total))
    }
}

/// Turn a non-success response into an [`ApiError`].
async fn classify(operation: &'static str, response: Response) -> ApiError {
    let status = response.status();
    let bytes = response.bytes().await.unwrap_or_default();
    let body = serde_json::from_slice::<ErrorBody>(&bytes).ok();
    let code = body.as_ref().and_then(|body| body.error_code);
    let message = body
        .and_then(|body| body.error)
        .unwrap_or_else(|| {
            let text = String::from_utf8_lossy(&bytes).trim().to_string();
            if text.is_empty() {
                status.canonical_reason().unwrap_or("request failed").to_string()
            } else {
                text
            }
        });

    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        ApiError::Unauthorized {
            status: status.as_u16(),
            message,
        }
    } else {
        ApiError::Rejected {
            operation,
            status: status.as_u16(),
            code,
            message,
        }
    }
}

async fn decode<T: DeserializeOwned>(operation: &'static str, response: Response) -> ApiResult<T> {
    let bytes = response
        .bytes()
        .await
        .map_err(|err| ApiError::network(operation, err))?;
    serde_json::from_slice(&bytes).map_err(|err| ApiError::decode(operation, err))
}

#[async_trait]
impl DebridApi for RealDebridClient {
    async fn account(&self) -> ApiResult<AccountInfo> {
        let response = self.send("user", self.api.get(self.endpoint("user"))).await?;
        let payload: UserPayload = decode("user", response).await?;
        Ok(payload.into())
    }

    async fn add_torrent(&self, torrent: Vec<u8>) -> ApiResult<String> {
        let request = self
            .api
            .put(self.endpoint("torrents/addTorrent"))
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(torrent);
        let response = self.send("torrents.addTorrent", request).await?;
        let payload: AddTorrentResponse = decode("torrents.addTorrent", response).await?;
        Ok(payload.id)
    }

    async fn get_torrent_info(&self, remote_id: &str) -> ApiResult<TorrentRecord> {
        let url = self.endpoint(&format!("torrents/info/{remote_id}"));
        let response = self.send("torrents.info", self.api.get(url)).await?;
        let payload: TorrentPayload = decode("torrents.info", response).await?;
        Ok(payload.into())
    }

    async fn list_torrents(&self, limit: Option<usize>) -> ApiResult<Vec<TorrentRecord>> {
        let mut records = Vec::new();
        let mut page = 1;
        loop {
            let (batch, total) = self.list_page(page).await?;
            let fetched = batch.len();
            records.extend(batch);

            if let Some(limit) = limit
                && records.len() >= limit
            {
                records.truncate(limit);
                break;
            }
            let exhausted = total.is_some_and(|total| records.len() >= total);
            if fetched == 0 || fetched < self.page_limit || exhausted {
                break;
            }
            page += 1;
        }
        Ok(records)
    }

    async fn select_files(&self, remote_id: &str, selection: &FileSelection) -> ApiResult<()> {
        let url = self.endpoint(&format!("torrents/selectFiles/{remote_id}"));
        let request = self
            .api
            .post(url)
            .form(&[("files", selection.form_value())]);
        self.send("torrents.selectFiles", request).await?;
        Ok(())
    }

    async fn unrestrict_link(&self, link: &str) -> ApiResult<UnrestrictedLink> {
        let request = self
            .api
            .post(self.endpoint("unrestrict/link"))
            .form(&[("link", link)]);
        let response = self.send("unrestrict.link", request).await?;
        let payload: UnrestrictPayload = decode("unrestrict.link", response).await?;
        Ok(payload.into_link(link))
    }

    async fn unrestrict_folder(&self, link: &str) -> ApiResult<Vec<String>> {
        let request = self
            .api
            .post(self.endpoint("unrestrict/folder"))
            .form(&[("link", link)]);
        let response = self.send("unrestrict.folder", request).await?;
        let entries: Vec<FolderEntry> = decode("unrestrict.folder", response).await?;
        Ok(entries.into_iter().map(FolderEntry::into_link).collect())
    }

    async fn delete_torrent(&self, remote_id: &str) -> ApiResult<()> {
        let url = self.endpoint(&format!("torrents/delete/{remote_id}"));
        self.send("torrents.delete", self.api.delete(url)).await?;
        Ok(())
    }

    async fn host_status(&self) -> ApiResult<Vec<HostStatus>> {
        let response = self
            .send("hosts.status", self.api.get(self.endpoint("hosts/status")))
            .await?;
        let map: BTreeMap<String, HostPayload> = decode("hosts.status", response).await?;
        Ok(hosts_from_map(map))
    }
}

#[async_trait]
impl LinkFetcher for RealDebridClient {
    async fn fetch(&self, url: &str) -> ApiResult<FetchedContent> {
        let response = self
            .downloads
            .get(url)
            .send()
            .await
            .map_err(|err| ApiError::network("download", err))?;
        let status = response.status();
        if !status.is_success() {
            // hoster-side refusals never invalidate the API credential
            return Err(ApiError::Rejected {
                operation: "download",
                status: status.as_u16(),
                code: None,
                message: status
                    .canonical_reason()
                    .unwrap_or("download failed")
                    .to_string(),
            });
        }
        let total = response.content_length();
        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|err| ApiError::network("download", err)));
        Ok(FetchedContent {
            total,
            stream: Box::pin(stream),
        })
    }
}
