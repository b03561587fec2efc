//! Error types for API calls and pipeline items.

use std::error::Error;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Boxed error used to carry transport and decoding failures across the API seam.
pub type BoxError = Box<dyn Error + Send + Sync>;

/// Convenience alias for API call results.
pub type ApiResult<T> = Result<T, ApiError>;

/// Convenience alias for per-item pipeline results.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Failure of a single call against the remote service.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport-level failure (DNS, TLS, connection reset, timeout).
    #[error("request to {operation} failed")]
    Network {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying transport error.
        #[source]
        source: BoxError,
    },
    /// The remote service rejected the credential.
    #[error("credential rejected by the remote service (status {status})")]
    Unauthorized {
        /// HTTP status returned by the service.
        status: u16,
        /// Message reported by the service.
        message: String,
    },
    /// The remote service answered with a non-success status.
    #[error("{operation} rejected with status {status}: {message}")]
    Rejected {
        /// Operation identifier.
        operation: &'static str,
        /// HTTP status returned by the service.
        status: u16,
        /// Service-specific error code when present.
        code: Option<i64>,
        /// Message reported by the service.
        message: String,
    },
    /// The response body could not be decoded.
    #[error("failed to decode {operation} response")]
    Decode {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying decoding error.
        #[source]
        source: BoxError,
    },
}

impl ApiError {
    /// Wrap a transport error.
    #[must_use]
    pub fn network(operation: &'static str, source: impl Into<BoxError>) -> Self {
        Self::Network {
            operation,
            source: source.into(),
        }
    }

    /// Wrap a decoding error.
    #[must_use]
    pub fn decode(operation: &'static str, source: impl Into<BoxError>) -> Self {
        Self::Decode {
            operation,
            source: source.into(),
        }
    }

    /// Whether repeating the same call may succeed (transport failures, 429, 5xx).
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. } => true,
            Self::Rejected { status, .. } => *status == 429 || *status >= 500,
            Self::Unauthorized { .. } | Self::Decode { .. } => false,
        }
    }

    /// Whether the whole run must stop.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    /// HTTP status attached to the failure, when one was received.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized { status, .. } | Self::Rejected { status, .. } => Some(*status),
            Self::Network { .. } | Self::Decode { .. } => None,
        }
    }
}

/// Reasons a `.torrent` payload could not be read as bencoded metainfo.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MetainfoError {
    /// Input ended inside a value.
    #[error("metainfo truncated")]
    Truncated,
    /// A byte that cannot start or continue a bencoded value.
    #[error("unexpected byte at offset {offset}")]
    UnexpectedByte {
        /// Offset of the offending byte.
        offset: usize,
    },
    /// A string length or integer could not be parsed.
    #[error("malformed number at offset {offset}")]
    MalformedNumber {
        /// Offset where the number starts.
        offset: usize,
    },
    /// Nesting deeper than the parser accepts.
    #[error("metainfo nested too deeply")]
    TooDeep,
    /// The top-level value is not a dictionary.
    #[error("metainfo is not a dictionary")]
    NotADictionary,
    /// The top-level dictionary has no `info` entry.
    #[error("metainfo has no info dictionary")]
    MissingInfo,
}

/// Failure of one pipeline item (one torrent file, one torrent, one link).
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A remote call failed.
    #[error(transparent)]
    Api(#[from] ApiError),
    /// Local disk read or write failed.
    #[error("local {operation} failed for {}", .path.display())]
    LocalIo {
        /// Operation identifier.
        operation: &'static str,
        /// Path involved in the failure.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// A torrent never reached the awaited state.
    #[error("torrent {remote_id} did not become ready within {waited:?}")]
    Timeout {
        /// Remote torrent identifier.
        remote_id: String,
        /// Time spent waiting.
        waited: Duration,
    },
    /// A local file is not valid torrent metainfo.
    #[error("invalid torrent file {}", .path.display())]
    InvalidTorrent {
        /// Offending file.
        path: PathBuf,
        /// Parsing failure.
        #[source]
        source: MetainfoError,
    },
    /// The selection policy matched no file of the torrent.
    #[error("no files selected for torrent {remote_id}")]
    NoFilesSelected {
        /// Remote torrent identifier.
        remote_id: String,
    },
    /// The remote service reported the torrent as failed.
    #[error("torrent {remote_id} failed remotely ({status})")]
    RemoteFailed {
        /// Remote torrent identifier.
        remote_id: String,
        /// Raw remote status.
        status: String,
    },
    /// A complete torrent exposed no hoster links.
    #[error("torrent {remote_id} has no downloadable links")]
    NoLinks {
        /// Remote torrent identifier.
        remote_id: String,
    },
}

impl PipelineError {
    /// Build a `LocalIo` error for the given operation and path.
    #[must_use]
    pub fn local_io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::LocalIo {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Whether the underlying failure must stop the whole run.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        match self {
            Self::Api(err) => err.is_fatal(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejected(status: u16) -> ApiError {
        ApiError::Rejected {
            operation: "torrents.info",
            status,
            code: None,
            message: "nope".into(),
        }
    }

    #[test]
    fn retryable_statuses_cover_throttling_and_server_errors() {
        assert!(rejected(429).is_retryable());
        assert!(rejected(503).is_retryable());
        assert!(!rejected(404).is_retryable());
        assert!(ApiError::network("torrents.info", io::Error::other("reset")).is_retryable());
    }

    #[test]
    fn unauthorized_is_fatal_and_not_retryable() {
        let err = ApiError::Unauthorized {
            status: 401,
            message: "bad_token".into(),
        };
        assert!(err.is_fatal());
        assert!(!err.is_retryable());
        assert_eq!(err.status(), Some(401));
        assert!(PipelineError::from(err).is_fatal());
    }

    #[test]
    fn local_io_message_names_the_path() {
        let err = PipelineError::local_io(
            "read torrent file",
            "/tmp/a.torrent",
            io::Error::other("denied"),
        );
        assert_eq!(
            err.to_string(),
            "local read torrent file failed for /tmp/a.torrent"
        );
    }
}
