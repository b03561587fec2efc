//! Locate and read `config.json`, then layer command-line overrides on top.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::model::{RawConfig, Settings};
use crate::validate::build_settings;

/// File read from the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Values supplied through the environment or flags; they win over the file.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    /// API token.
    pub token: Option<String>,
    /// API root.
    pub api_base: Option<String>,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: Option<u64>,
}

impl std::fmt::Debug for Overrides {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Overrides")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("api_base", &self.api_base)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

/// Read the configuration document at `path`, or [`DEFAULT_CONFIG_FILE`] when
/// `path` is `None`, and produce validated [`Settings`].
///
/// A missing default file is treated as an empty document so that a token
/// passed through the environment is enough. An explicit path must exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] when the file cannot be read,
/// [`ConfigError::Parse`] for malformed JSON, and the validation errors of
/// [`build_settings`].
pub fn load_settings(path: Option<&Path>, overrides: &Overrides) -> ConfigResult<Settings> {
    build_settings(load_raw(path)?, overrides)
}

/// Resolve and parse the configuration document without validating it.
///
/// # Errors
///
/// Same file errors as [`load_settings`].
pub fn load_raw(path: Option<&Path>) -> ConfigResult<RawConfig> {
    if let Some(path) = path {
        return read_raw(path);
    }
    let default = PathBuf::from(DEFAULT_CONFIG_FILE);
    match read_raw(&default) {
        Err(ConfigError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
            debug!(path = %default.display(), "no configuration file; using defaults");
            Ok(RawConfig::default())
        }
        other => other,
    }
}

/// Parse the document at `path` without applying defaults.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] or [`ConfigError::Parse`].
pub fn read_raw(path: &Path) -> ConfigResult<RawConfig> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        operation: "read",
        path: path.to_path_buf(),
        source,
    })?;
    let raw = serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "configuration file loaded");
    Ok(raw)
}
