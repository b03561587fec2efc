//! Fallback values for keys absent from `config.json`.

/// API root used when none is configured.
pub const API_BASE: &str = "https://api.real-debrid.com/rest/1.0";
/// Per-request timeout in seconds.
pub const REQUEST_TIMEOUT_SECS: u64 = 10;
/// Torrents requested per listing page.
pub const PAGE_LIMIT: usize = 250;
/// Largest page size the service accepts.
pub const MAX_PAGE_LIMIT: usize = 5000;
/// Destination for downloaded files.
pub const DOWNLOAD_DIR: &str = "Downloaded Files";
/// Destination for submitted torrent files.
pub const PROCESSED_DIR: &str = "Processed Files";
/// Delay between status polls in seconds.
pub const POLL_INTERVAL_SECS: u64 = 10;
/// Poll deadline in seconds.
pub const MAX_WAIT_SECS: u64 = 600;
/// Wait for a torrent's file list in seconds.
pub const METADATA_WAIT_SECS: u64 = 15;
/// Delay between file-list checks in seconds.
pub const METADATA_INTERVAL_SECS: u64 = 5;
/// Attempts and delay for ordinary API calls.
pub const API_RETRY: (u32, u64) = (3, 2);
/// Attempts and delay for unrestrict calls.
pub const UNRESTRICT_RETRY: (u32, u64) = (2, 5);
/// Attempts and delay for byte transfers.
pub const DOWNLOAD_RETRY: (u32, u64) = (3, 2);
/// Torrents considered by the download and dedupe listings.
pub const DOWNLOAD_LIMIT: usize = 100;
/// Referral link opened by the renewal command.
pub const RENEWAL_URL: &str = "http://real-debrid.com/?id=3488563";
