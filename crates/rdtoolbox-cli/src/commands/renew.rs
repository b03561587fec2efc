//! Open the premium renewal page.

use std::path::Path;
use std::process::Command;

use anyhow::anyhow;
use rdtoolbox_config::{load_raw, renewal_url};
use tracing::debug;

use crate::cli::RenewArgs;
use crate::client::{CliError, CliResult};

/// Resolve the renewal URL from configuration and open or print it.
///
/// Only the URL is read from the configuration, so no API token is needed.
pub(crate) fn handle_renew(config: Option<&Path>, args: &RenewArgs) -> CliResult<()> {
    let url = renewal_url(&load_raw(config)?)?;
    if args.print {
        println!("{url}");
        return Ok(());
    }
    open_in_browser(&url)?;
    println!("opened {url}");
    Ok(())
}

fn open_in_browser(url: &str) -> CliResult<()> {
    let status = opener(url)
        .status()
        .map_err(|err| CliError::failure(anyhow!("failed to launch a browser for {url}: {err}")))?;
    debug!(%status, "browser launcher exited");
    Ok(())
}

#[cfg(target_os = "macos")]
fn opener(url: &str) -> Command {
    let mut command = Command::new("open");
    command.arg(url);
    command
}

#[cfg(target_os = "windows")]
fn opener(url: &str) -> Command {
    let mut command = Command::new("explorer");
    command.arg(url);
    command
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn opener(url: &str) -> Command {
    let mut command = Command::new("xdg-open");
    command.arg(url);
    command
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn print_reads_the_configured_url_without_a_token() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"renewal_url": "https://real-debrid.com/premium"}"#)?;

        handle_renew(Some(&path), &RenewArgs { print: true })
            .map_err(|err| anyhow!(err.display_message()))?;
        Ok(())
    }

    #[test]
    fn malformed_url_is_a_validation_error() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"renewal_url": "not a url"}"#)?;

        let err = handle_renew(Some(&path), &RenewArgs { print: true })
            .expect_err("url rejected");
        assert_eq!(err.exit_code(), 2);
        Ok(())
    }

    #[test]
    fn opener_targets_the_url() {
        let command = opener("https://real-debrid.com/premium");
        let args: Vec<_> = command.get_args().collect();
        assert_eq!(args, vec!["https://real-debrid.com/premium"]);
    }
}
