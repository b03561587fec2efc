//! Argument parsing and command dispatch.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use rdtoolbox_telemetry::{
    DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, RunContext, init_logging, with_run_context,
};

use crate::client::{AppContext, CliResult};
use crate::commands::account::{handle_account, handle_hosts, handle_status};
use crate::commands::dedupe::handle_dedupe;
use crate::commands::pipeline::{
    handle_download, handle_hosters, handle_run, handle_upload, handle_watch,
};
use crate::commands::renew::handle_renew;

/// Parses CLI arguments, executes the requested command inside a run span,
/// and returns the process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();

    let logging = LoggingConfig {
        level: &cli.log_level,
        format: cli.log_format,
    };
    if let Err(err) = init_logging(&logging) {
        eprintln!("warning: {err:#}");
    }

    let context = RunContext::new(cli.command.label());
    match with_run_context(context, dispatch(cli)).await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            err.exit_code()
        }
    }
}

async fn dispatch(cli: Cli) -> CliResult<()> {
    if let Command::Renew(args) = &cli.command {
        return handle_renew(cli.config.as_deref(), args);
    }

    let ctx = AppContext::load(&cli)?;
    match cli.command {
        Command::Upload(args) => handle_upload(&ctx, args).await,
        Command::Watch(args) => handle_watch(&ctx, args).await,
        Command::Run(args) => handle_run(&ctx, args).await,
        Command::Download(args) => handle_download(&ctx, args).await,
        Command::Hosters(args) => handle_hosters(&ctx, args).await,
        Command::Dedupe(args) => handle_dedupe(&ctx, args).await,
        Command::Status(args) => handle_status(&ctx, args).await,
        Command::Account => handle_account(&ctx).await,
        Command::Hosts(args) => handle_hosts(&ctx, args).await,
        Command::Renew(_) => Ok(()),
    }
}

#[derive(Parser)]
#[command(
    name = "rdtoolbox",
    version,
    about = "Upload torrents to Real-Debrid, wait for them, download the results, and tidy the account"
)]
pub(crate) struct Cli {
    /// Configuration file; `config.json` in the working directory when omitted.
    #[arg(long, global = true, env = "RDTOOLBOX_CONFIG")]
    pub(crate) config: Option<PathBuf>,
    /// API token, overriding the configuration file.
    #[arg(long, global = true, env = "RD_API_TOKEN", hide_env_values = true)]
    pub(crate) token: Option<String>,
    /// API root, overriding the configuration file.
    #[arg(long, global = true, env = "RD_API_URL")]
    pub(crate) api_url: Option<String>,
    /// Per-request timeout in seconds.
    #[arg(long, global = true)]
    pub(crate) timeout: Option<u64>,
    #[arg(
        long = "output",
        alias = "format",
        global = true,
        value_enum,
        default_value_t = OutputFormat::Table,
        help = "Select output format for commands that render structured data"
    )]
    pub(crate) output: OutputFormat,
    /// Log filter directive; `RUST_LOG` takes precedence.
    #[arg(long, global = true, env = "RDTOOLBOX_LOG", default_value = DEFAULT_LOG_LEVEL)]
    pub(crate) log_level: String,
    /// Log line format written to stderr.
    #[arg(long, global = true, default_value_t = LogFormat::Pretty)]
    pub(crate) log_format: LogFormat,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Upload every `.torrent` file in a directory.
    Upload(UploadArgs),
    /// Poll torrents until they complete, fail, or time out.
    Watch(WatchArgs),
    /// Upload, wait, then download the completed torrents.
    Run(RunArgs),
    /// Download completed torrents from the account.
    Download(DownloadArgs),
    /// Unrestrict and download hoster links listed in a text file.
    Hosters(HostersArgs),
    /// Delete torrents that share an info-hash with an older one.
    Dedupe(DedupeArgs),
    /// Show torrents that are not complete yet.
    Status(StatusArgs),
    /// Show premium state and remaining days.
    Account,
    /// Show hoster availability.
    Hosts(HostsArgs),
    /// Open the premium renewal page.
    Renew(RenewArgs),
}

impl Command {
    pub(crate) const fn label(&self) -> &'static str {
        match self {
            Self::Upload(_) => "upload",
            Self::Watch(_) => "watch",
            Self::Run(_) => "run",
            Self::Download(_) => "download",
            Self::Hosters(_) => "hosters",
            Self::Dedupe(_) => "dedupe",
            Self::Status(_) => "status",
            Self::Account => "account",
            Self::Hosts(_) => "hosts",
            Self::Renew(_) => "renew",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub(crate) struct UploadArgs {
    /// Directory scanned for `.torrent` files.
    #[arg(long, default_value = ".")]
    pub(crate) dir: PathBuf,
    /// Skip files whose info-hash is already on the account.
    #[arg(long)]
    pub(crate) skip_existing: bool,
    /// Move submitted files into the processed directory.
    #[arg(long)]
    pub(crate) move_processed: bool,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct WatchArgs {
    /// Remote torrent identifiers.
    #[arg(required = true)]
    pub(crate) ids: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct RunArgs {
    /// Directory scanned for `.torrent` files.
    #[arg(long, default_value = ".")]
    pub(crate) dir: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct DownloadArgs {
    /// Download only these torrents.
    #[arg(long = "id")]
    pub(crate) ids: Vec<String>,
    /// Torrents considered when listing the account.
    #[arg(long)]
    pub(crate) limit: Option<usize>,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct HostersArgs {
    /// Link list; `links.txt` in any letter case when omitted.
    #[arg(long)]
    pub(crate) file: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct DedupeArgs {
    /// Torrents inspected.
    #[arg(long)]
    pub(crate) limit: Option<usize>,
    /// Delete without asking.
    #[arg(long, short = 'y')]
    pub(crate) yes: bool,
    /// Only print what would be deleted.
    #[arg(long)]
    pub(crate) dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct StatusArgs {
    /// Torrents inspected.
    #[arg(long)]
    pub(crate) limit: Option<usize>,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct HostsArgs {
    /// Include unsupported and offline hosters.
    #[arg(long)]
    pub(crate) all: bool,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct RenewArgs {
    /// Print the renewal URL instead of opening a browser.
    #[arg(long)]
    pub(crate) print: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Table,
    Json,
}
