//! Shared context, error types, and settings wiring for the CLI.

use std::fmt::{self, Display, Formatter};

use anyhow::anyhow;
use rdtoolbox_api::{ClientConfig, ClientError, RealDebridClient};
use rdtoolbox_config::{ConfigError, Overrides, Settings, load_settings};
use rdtoolbox_core::{
    ApiError, DebridApi, DownloadSettings, PipelineError, PollSettings, UploadSettings,
};
use tracing::{info, warn};

use crate::cli::{Cli, OutputFormat};

/// CLI-level error type to distinguish validation from operational failures.
#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    Failure(anyhow::Error),
    /// The command ran to the end but some items failed or timed out.
    Partial(String),
}

/// Convenience alias for functions returning a `CliError`.
pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) fn partial(message: impl Into<String>) -> Self {
        Self::Partial(message.into())
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
            Self::Partial(_) => 4,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) | Self::Partial(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("cli error")
    }
}

impl std::error::Error for CliError {}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        Self::Validation(format!("{:#}", anyhow::Error::from(err)))
    }
}

impl From<ApiError> for CliError {
    fn from(err: ApiError) -> Self {
        if let ApiError::Unauthorized { message, .. } = &err {
            return Self::Failure(anyhow!(
                "the API token was rejected ({message}); check REAL_DEBRID_API_TOKEN"
            ));
        }
        Self::Failure(err.into())
    }
}

impl From<PipelineError> for CliError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Api(api) => api.into(),
            other => Self::Failure(other.into()),
        }
    }
}

/// Application context passed to command handlers.
pub(crate) struct AppContext {
    pub(crate) api: RealDebridClient,
    pub(crate) settings: Settings,
    pub(crate) output: OutputFormat,
}

impl AppContext {
    /// Load settings with flag and environment overrides, then build the client.
    pub(crate) fn load(cli: &Cli) -> CliResult<Self> {
        let overrides = Overrides {
            token: cli.token.clone(),
            api_base: cli.api_url.clone(),
            request_timeout_secs: cli.timeout,
        };
        let settings = load_settings(cli.config.as_deref(), &overrides)?;
        Self::new(settings, cli.output)
    }

    pub(crate) fn new(settings: Settings, output: OutputFormat) -> CliResult<Self> {
        let api = RealDebridClient::new(&ClientConfig {
            base_url: settings.api_base.clone(),
            token: settings.token.clone(),
            timeout: settings.request_timeout,
            page_limit: settings.page_limit,
        })
        .map_err(|err| match err {
            ClientError::InvalidToken => CliError::validation(err.to_string()),
            ClientError::Build { .. } => CliError::failure(err),
        })?;
        Ok(Self {
            api,
            settings,
            output,
        })
    }

    /// Fail fast on a rejected token and report the premium state.
    pub(crate) async fn check_account(&self) -> CliResult<()> {
        if !self.settings.check_account {
            return Ok(());
        }
        let account = self.api.account().await?;
        info!(username = %account.username, premium = account.premium, "account checked");
        if !account.premium {
            warn!(username = %account.username, "account has no premium access");
        }
        Ok(())
    }

    pub(crate) fn upload_settings(
        &self,
        skip_existing: bool,
        move_processed: bool,
    ) -> UploadSettings {
        let settings = &self.settings;
        UploadSettings {
            selection: settings.selection.clone(),
            metadata_wait: settings.metadata_wait,
            metadata_interval: settings.metadata_interval,
            api_retry: settings.api_retry,
            skip_existing: skip_existing || settings.skip_existing,
            processed_dir: (move_processed || settings.move_processed)
                .then(|| settings.processed_dir.clone()),
        }
    }

    pub(crate) const fn poll_settings(&self) -> PollSettings {
        PollSettings {
            interval: self.settings.poll_interval,
            max_wait: self.settings.max_wait,
        }
    }

    pub(crate) fn download_settings(&self) -> DownloadSettings {
        DownloadSettings {
            dest_dir: self.settings.download_dir.clone(),
            api_retry: self.settings.api_retry,
            unrestrict_retry: self.settings.unrestrict_retry,
            download_retry: self.settings.download_retry,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use httpmock::MockServer;
    use rdtoolbox_config::{RawConfig, RetryConfig, build_settings};
    use std::path::Path;

    /// Context pointed at a mock server with fast, single-attempt retries.
    pub(crate) fn context_for(server: &MockServer, download_dir: &Path) -> AppContext {
        let once = RetryConfig {
            attempts: 1,
            delay_secs: 0,
        };
        let raw = RawConfig {
            token: Some("tok".into()),
            api_base: Some(server.base_url()),
            download_dir: Some(download_dir.to_path_buf()),
            processed_dir: Some(download_dir.join("processed")),
            check_account: Some(false),
            poll_interval_secs: Some(1),
            max_wait_secs: Some(1),
            metadata_wait_secs: Some(1),
            metadata_interval_secs: Some(1),
            api_retry: Some(once),
            unrestrict_retry: Some(once),
            download_retry: Some(once),
            ..RawConfig::default()
        };
        let settings = build_settings(raw, &Overrides::default()).expect("valid settings");
        AppContext::new(settings, OutputFormat::Table).expect("client builds")
    }

    #[test]
    fn exit_codes_follow_the_error_class() {
        assert_eq!(CliError::validation("bad").exit_code(), 2);
        assert_eq!(CliError::failure(anyhow!("boom")).exit_code(), 3);
        assert_eq!(CliError::partial("1 failed").exit_code(), 4);
    }

    #[test]
    fn missing_token_is_a_validation_error() {
        let err = CliError::from(ConfigError::MissingToken);
        assert_eq!(err.exit_code(), 2);
        assert!(err.display_message().contains("RD_API_TOKEN"));
    }

    #[test]
    fn rejected_tokens_are_operational_failures() {
        let err = CliError::from(PipelineError::Api(ApiError::Unauthorized {
            status: 401,
            message: "bad_token".into(),
        }));
        assert_eq!(err.exit_code(), 3);
        assert!(err.display_message().contains("bad_token"));
    }

    #[test]
    fn flags_widen_the_upload_settings() {
        let server = MockServer::start();
        let dir = tempfile::tempdir().expect("tempdir");
        let ctx = context_for(&server, dir.path());

        let plain = ctx.upload_settings(false, false);
        assert!(!plain.skip_existing);
        assert!(plain.processed_dir.is_none());

        let widened = ctx.upload_settings(true, true);
        assert!(widened.skip_existing);
        assert_eq!(widened.processed_dir, Some(dir.path().join("processed")));
    }
}
