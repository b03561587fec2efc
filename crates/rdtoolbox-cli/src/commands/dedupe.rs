//! Remove torrents that share an info-hash with an older one.

use std::io::{self, BufRead, IsTerminal, Write};

use anyhow::anyhow;
use rdtoolbox_core::{DebridApi, apply_dedupe, plan_dedupe};
use tracing::info;

use crate::cli::{DedupeArgs, OutputFormat};
use crate::client::{AppContext, CliError, CliResult};
use crate::output::{render_dedupe_plan, render_dedupe_report};

pub(crate) async fn handle_dedupe(ctx: &AppContext, args: DedupeArgs) -> CliResult<()> {
    let retry = ctx.settings.api_retry;
    let torrents = retry
        .run("torrents.list", || ctx.api.list_torrents(args.limit))
        .await?;
    let plan = plan_dedupe(&torrents);
    info!(
        inspected = plan.inspected,
        duplicates = plan.redundant_count(),
        "duplicate scan finished"
    );

    if ctx.output == OutputFormat::Table || plan.is_empty() || args.dry_run {
        render_dedupe_plan(&plan, ctx.output)?;
    }
    if plan.is_empty() || args.dry_run {
        return Ok(());
    }

    match confirmation(&args, io::stdin().is_terminal()) {
        Confirmation::Proceed => {}
        Confirmation::Ask => {
            let question = format!("delete {} duplicate torrent(s)?", plan.redundant_count());
            if !prompt_yes_no(&question)? {
                info!("deletion declined");
                return Ok(());
            }
        }
        Confirmation::Refuse => {
            return Err(CliError::validation(
                "refusing to delete without a terminal; pass --yes to confirm",
            ));
        }
    }

    let report = apply_dedupe(&ctx.api, &plan, &retry).await?;
    render_dedupe_report(&report, ctx.output)?;
    if report.failed.is_empty() {
        Ok(())
    } else {
        Err(CliError::partial(format!(
            "{} deletion(s) failed",
            report.failed.len()
        )))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Confirmation {
    Proceed,
    Ask,
    Refuse,
}

const fn confirmation(args: &DedupeArgs, interactive: bool) -> Confirmation {
    if args.yes {
        Confirmation::Proceed
    } else if interactive {
        Confirmation::Ask
    } else {
        Confirmation::Refuse
    }
}

fn prompt_yes_no(question: &str) -> CliResult<bool> {
    let mut stdout = io::stdout();
    write!(stdout, "{question} [y/N] ")
        .and_then(|()| stdout.flush())
        .map_err(|err| CliError::failure(anyhow!("failed to write prompt: {err}")))?;
    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .map_err(|err| CliError::failure(anyhow!("failed to read answer: {err}")))?;
    Ok(accepts(&answer))
}

fn accepts(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
