//! Range and format checks turning a raw document into [`Settings`].

use std::time::Duration;

use rdtoolbox_core::SelectionPolicy;
use url::Url;

use crate::defaults;
use crate::error::{ConfigError, ConfigResult};
use crate::loader::Overrides;
use crate::model::{FileSelectionConfig, RawConfig, RetryConfig, Settings};

/// Apply overrides and defaults to `raw`, then validate every field.
///
/// # Errors
///
/// Returns [`ConfigError::MissingToken`] when no token is available and
/// [`ConfigError::InvalidField`] for the first out-of-range or malformed value.
pub fn build_settings(raw: RawConfig, overrides: &Overrides) -> ConfigResult<Settings> {
    let token = overrides
        .token
        .clone()
        .or(raw.token)
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
        .ok_or(ConfigError::MissingToken)?;

    let api_base = overrides
        .api_base
        .clone()
        .or(raw.api_base)
        .unwrap_or_else(|| defaults::API_BASE.to_string());
    http_url("api_base", &api_base)?;

    let request_timeout_secs = overrides
        .request_timeout_secs
        .or(raw.request_timeout_secs)
        .unwrap_or(defaults::REQUEST_TIMEOUT_SECS);
    let request_timeout = positive_secs("request_timeout_secs", request_timeout_secs)?;

    let page_limit = raw.page_limit.unwrap_or(defaults::PAGE_LIMIT);
    if !(1..=defaults::MAX_PAGE_LIMIT).contains(&page_limit) {
        return Err(ConfigError::invalid(
            "page_limit",
            page_limit,
            "must be between 1 and 5000",
        ));
    }

    let poll_interval = positive_secs(
        "poll_interval_secs",
        raw.poll_interval_secs.unwrap_or(defaults::POLL_INTERVAL_SECS),
    )?;
    let max_wait = Duration::from_secs(raw.max_wait_secs.unwrap_or(defaults::MAX_WAIT_SECS));
    if max_wait < poll_interval {
        return Err(ConfigError::invalid(
            "max_wait_secs",
            max_wait.as_secs(),
            "must not be shorter than poll_interval_secs",
        ));
    }
    let metadata_interval = positive_secs(
        "metadata_interval_secs",
        raw.metadata_interval_secs
            .unwrap_or(defaults::METADATA_INTERVAL_SECS),
    )?;
    let metadata_wait =
        Duration::from_secs(raw.metadata_wait_secs.unwrap_or(defaults::METADATA_WAIT_SECS));

    let api_retry = retry("api_retry", raw.api_retry, defaults::API_RETRY)?;
    let unrestrict_retry = retry(
        "unrestrict_retry",
        raw.unrestrict_retry,
        defaults::UNRESTRICT_RETRY,
    )?;
    let download_retry = retry("download_retry", raw.download_retry, defaults::DOWNLOAD_RETRY)?;

    let download_limit = raw.download_limit.unwrap_or(defaults::DOWNLOAD_LIMIT);
    if download_limit == 0 {
        return Err(ConfigError::invalid(
            "download_limit",
            download_limit,
            "must be at least 1",
        ));
    }

    let renewal_url = checked_renewal_url(raw.renewal_url)?;

    let selection = selection_policy(raw.file_selection.unwrap_or_default())?;

    Ok(Settings {
        token,
        api_base: api_base.trim_end_matches('/').to_string(),
        request_timeout,
        page_limit,
        download_dir: raw
            .download_dir
            .unwrap_or_else(|| defaults::DOWNLOAD_DIR.into()),
        processed_dir: raw
            .processed_dir
            .unwrap_or_else(|| defaults::PROCESSED_DIR.into()),
        move_processed: raw.move_processed.unwrap_or(false),
        skip_existing: raw.skip_existing.unwrap_or(false),
        check_account: raw.check_account.unwrap_or(true),
        selection,
        poll_interval,
        max_wait,
        metadata_wait,
        metadata_interval,
        api_retry,
        unrestrict_retry,
        download_retry,
        download_limit,
        renewal_url,
    })
}

/// Renewal link from `raw`, falling back to the default referral URL.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when the configured value is not an
/// http(s) URL.
pub fn renewal_url(raw: &RawConfig) -> ConfigResult<String> {
    checked_renewal_url(raw.renewal_url.clone())
}

fn checked_renewal_url(configured: Option<String>) -> ConfigResult<String> {
    let url = configured.unwrap_or_else(|| defaults::RENEWAL_URL.to_string());
    http_url("renewal_url", &url)?;
    Ok(url)
}

fn positive_secs(field: &'static str, secs: u64) -> ConfigResult<Duration> {
    if secs == 0 {
        return Err(ConfigError::invalid(field, secs, "must be greater than zero"));
    }
    Ok(Duration::from_secs(secs))
}

fn http_url(field: &'static str, raw: &str) -> ConfigResult<()> {
    let url =
        Url::parse(raw).map_err(|_| ConfigError::invalid(field, raw, "must be a valid URL"))?;
    if matches!(url.scheme(), "http" | "https") {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, raw, "must use http or https"))
    }
}

fn retry(
    field: &'static str,
    configured: Option<RetryConfig>,
    fallback: (u32, u64),
) -> ConfigResult<rdtoolbox_core::RetryPolicy> {
    let config = configured.unwrap_or_else(|| RetryConfig::from_pair(fallback));
    if config.attempts == 0 {
        return Err(ConfigError::invalid(
            field,
            config.attempts,
            "attempts must be at least 1",
        ));
    }
    Ok(config.policy())
}

fn selection_policy(config: FileSelectionConfig) -> ConfigResult<SelectionPolicy> {
    match config {
        FileSelectionConfig::All => Ok(SelectionPolicy::All),
        FileSelectionConfig::Largest => Ok(SelectionPolicy::Largest),
        FileSelectionConfig::Glob { patterns } => {
            if patterns.is_empty() {
                return Err(ConfigError::InvalidField {
                    field: "file_selection",
                    value: None,
                    reason: "glob mode needs at least one pattern",
                });
            }
            let joined = patterns.join(", ");
            SelectionPolicy::glob(patterns)
                .map_err(|_| ConfigError::invalid("file_selection", joined, "invalid glob pattern"))
        }
    }
}
