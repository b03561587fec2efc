//! Output renderers, formatting helpers, and progress bars for CLI commands.

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use rdtoolbox_core::{
    AccountInfo, DedupePlan, DedupeReport, DownloadReport, HostStatus, PollOutcome, PollReport,
    ProgressReporter, TorrentRecord, TransferProgress, UploadOutcome, UploadReport,
};
use serde_json::{Value, json};

use crate::cli::OutputFormat;
use crate::client::{CliError, CliResult};

const TRANSFER_TEMPLATE: &str =
    "{spinner:.cyan} [{bar:40.cyan/blue}] {bytes}/{total_bytes} @ {bytes_per_sec} - {msg}";
const SPINNER_TEMPLATE: &str = "{spinner:.cyan} {bytes} @ {bytes_per_sec} - {msg}";

pub(crate) fn print_json(value: &Value) -> CliResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))?;
    println!("{text}");
    Ok(())
}

pub(crate) fn render_upload_report(report: &UploadReport, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => {
            let entries: Vec<Value> = report
                .entries
                .iter()
                .map(|entry| {
                    let path = entry.path.display().to_string();
                    match &entry.outcome {
                        UploadOutcome::Submitted(record) => json!({
                            "path": path,
                            "outcome": "submitted",
                            "remote_id": record.remote_id,
                            "info_hash": record.info_hash,
                        }),
                        UploadOutcome::Duplicate { info_hash, first } => json!({
                            "path": path,
                            "outcome": "duplicate",
                            "info_hash": info_hash,
                            "first": first.display().to_string(),
                        }),
                        UploadOutcome::AlreadyOnAccount {
                            info_hash,
                            remote_id,
                        } => json!({
                            "path": path,
                            "outcome": "already_on_account",
                            "info_hash": info_hash,
                            "remote_id": remote_id,
                        }),
                        UploadOutcome::Failed(err) => json!({
                            "path": path,
                            "outcome": "failed",
                            "error": error_chain(err),
                        }),
                    }
                })
                .collect();
            print_json(&json!({ "uploads": entries }))
        }
        OutputFormat::Table => {
            for entry in &report.entries {
                let name = entry.path.display();
                match &entry.outcome {
                    UploadOutcome::Submitted(record) => {
                        println!("submitted  {name} -> {}", record.remote_id);
                    }
                    UploadOutcome::Duplicate { first, .. } => {
                        println!("duplicate  {name} (same hash as {})", first.display());
                    }
                    UploadOutcome::AlreadyOnAccount { remote_id, .. } => {
                        println!("existing   {name} (already on the account as {remote_id})");
                    }
                    UploadOutcome::Failed(err) => {
                        println!("failed     {name}: {}", error_chain(err));
                    }
                }
            }
            println!(
                "{} submitted, {} skipped, {} failed",
                report.submitted().count(),
                report.skipped_count(),
                report.failed_count()
            );
            Ok(())
        }
    }
}

pub(crate) fn render_poll_report(report: &PollReport, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => {
            let outcomes: Vec<Value> = report
                .outcomes
                .iter()
                .map(|outcome| {
                    let record = outcome.record();
                    let reason = match outcome {
                        PollOutcome::Failed { reason, .. } => Some(reason.as_str()),
                        _ => None,
                    };
                    json!({
                        "remote_id": record.remote_id,
                        "name": record.display_name(),
                        "outcome": outcome.label(),
                        "status": record.remote_status,
                        "reason": reason,
                    })
                })
                .collect();
            print_json(&json!({
                "outcomes": outcomes,
                "elapsed_secs": report.elapsed.as_secs(),
            }))
        }
        OutputFormat::Table => {
            for outcome in &report.outcomes {
                let record = outcome.record();
                match outcome {
                    PollOutcome::Failed { reason, .. } => println!(
                        "{:<10} {} {} ({reason})",
                        outcome.label(),
                        record.remote_id,
                        record.display_name()
                    ),
                    _ => println!(
                        "{:<10} {} {}",
                        outcome.label(),
                        record.remote_id,
                        record.display_name()
                    ),
                }
            }
            println!(
                "{} complete, {} failed, {} timed out after {}s",
                report.completed_count(),
                report.failed_count(),
                report.timed_out_count(),
                report.elapsed.as_secs()
            );
            Ok(())
        }
    }
}

pub(crate) fn render_download_report(
    report: &DownloadReport,
    format: OutputFormat,
) -> CliResult<()> {
    match format {
        OutputFormat::Json => {
            let files: Vec<Value> = report
                .files
                .iter()
                .map(|entry| match &entry.outcome {
                    Ok(saved) => json!({
                        "torrent": entry.torrent,
                        "link": entry.source_link,
                        "path": saved.path.display().to_string(),
                        "bytes": saved.bytes,
                    }),
                    Err(err) => json!({
                        "torrent": entry.torrent,
                        "link": entry.source_link,
                        "filename": entry.filename,
                        "error": error_chain(err),
                    }),
                })
                .collect();
            let skipped: Vec<Value> = report
                .skipped
                .iter()
                .map(|(id, status)| json!({ "remote_id": id, "status": status }))
                .collect();
            let failures: Vec<Value> = report
                .torrent_failures
                .iter()
                .map(|(id, err)| json!({ "remote_id": id, "error": error_chain(err) }))
                .collect();
            print_json(&json!({
                "files": files,
                "skipped": skipped,
                "torrent_failures": failures,
            }))
        }
        OutputFormat::Table => {
            for entry in &report.files {
                match &entry.outcome {
                    Ok(saved) => println!(
                        "saved      {} ({})",
                        saved.path.display(),
                        format_bytes(saved.bytes)
                    ),
                    Err(err) => println!("failed     {}: {}", entry.source_link, error_chain(err)),
                }
            }
            for (id, status) in &report.skipped {
                println!("skipped    {id} ({})", status.as_str());
            }
            for (id, err) in &report.torrent_failures {
                println!("failed     torrent {id}: {}", error_chain(err));
            }
            let saved_bytes: u64 = report.saved().map(|saved| saved.bytes).sum();
            println!(
                "{} saved ({}), {} failed",
                report.saved().count(),
                format_bytes(saved_bytes),
                report.failed_count()
            );
            Ok(())
        }
    }
}

pub(crate) fn render_dedupe_plan(plan: &DedupePlan, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => {
            let groups: Vec<Value> = plan
                .groups
                .iter()
                .map(|group| {
                    json!({
                        "info_hash": group.info_hash,
                        "kept": group.kept.remote_id,
                        "redundant": group
                            .redundant
                            .iter()
                            .map(|record| record.remote_id.as_str())
                            .collect::<Vec<_>>(),
                    })
                })
                .collect();
            print_json(&json!({ "inspected": plan.inspected, "groups": groups }))
        }
        OutputFormat::Table => {
            for group in &plan.groups {
                println!(
                    "{}  keep {} ({})",
                    group.info_hash,
                    group.kept.remote_id,
                    group.kept.display_name()
                );
                for record in &group.redundant {
                    println!("    delete {} ({})", record.remote_id, record.display_name());
                }
            }
            println!(
                "{} torrents inspected, {} duplicates",
                plan.inspected,
                plan.redundant_count()
            );
            Ok(())
        }
    }
}

pub(crate) fn render_dedupe_report(report: &DedupeReport, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => {
            let failed: Vec<Value> = report
                .failed
                .iter()
                .map(|(id, err)| json!({ "remote_id": id, "error": error_chain(err) }))
                .collect();
            print_json(&json!({ "deleted": report.deleted, "failed": failed }))
        }
        OutputFormat::Table => {
            for (id, err) in &report.failed {
                println!("failed     {id}: {}", error_chain(err));
            }
            println!(
                "{} deleted, {} failed",
                report.deleted.len(),
                report.failed.len()
            );
            Ok(())
        }
    }
}

pub(crate) fn render_account(
    account: &AccountInfo,
    now: DateTime<Utc>,
    format: OutputFormat,
) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(&json!({
            "username": account.username,
            "premium": account.premium,
            "expiration": account.expiration,
            "days_left": account.days_left(now),
        })),
        OutputFormat::Table => {
            println!("{}", account_line(account, now));
            Ok(())
        }
    }
}

pub(crate) fn render_status(records: &[TorrentRecord], format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(&json!({ "torrents": records })),
        OutputFormat::Table => {
            if records.is_empty() {
                println!("no torrents in progress");
            }
            for record in records {
                println!("{}", status_line(record));
            }
            Ok(())
        }
    }
}

pub(crate) fn render_hosts(hosts: &[HostStatus], format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(&json!({ "hosts": hosts })),
        OutputFormat::Table => {
            println!("{:<32} {:<24} {:<9} STATUS", "HOST", "NAME", "SUPPORTED");
            for host in hosts {
                println!(
                    "{:<32} {:<24} {:<9} {}",
                    host.host,
                    host.name,
                    if host.supported { "yes" } else { "no" },
                    if host.up { "up" } else { "down" }
                );
            }
            Ok(())
        }
    }
}

/// `premium - expires in N day(s)` style summary.
#[must_use]
pub(crate) fn account_line(account: &AccountInfo, now: DateTime<Utc>) -> String {
    let state = if account.premium {
        match account.days_left(now) {
            Some(days) if days >= 0 => format!("premium - expires in {days} day(s)"),
            Some(_) => "premium - expired".to_string(),
            None => "premium".to_string(),
        }
    } else {
        "no premium access".to_string()
    };
    format!("{}: {state}", account.username)
}

/// `progress% @ speed - name (size) - status` line for an in-progress torrent.
#[must_use]
pub(crate) fn status_line(record: &TorrentRecord) -> String {
    format!(
        "{:.1}% @ {} - {} ({}) - {}",
        record.progress,
        format_speed(record.speed),
        record.display_name(),
        format_bytes(record.byte_size),
        record.remote_status
    )
}

/// Error message followed by its sources, joined with `: `.
#[must_use]
pub(crate) fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[must_use]
pub(crate) fn format_speed(speed: Option<u64>) -> String {
    speed.map_or_else(|| "-".to_string(), |bps| format!("{}/s", format_bytes(bps)))
}

#[must_use]
pub(crate) fn format_bytes(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = KIB * 1024.0;
    const GIB: f64 = MIB * 1024.0;
    let value = bytes_to_f64(bytes);
    if value >= GIB {
        format!("{:.2} GiB", value / GIB)
    } else if value >= MIB {
        format!("{:.2} MiB", value / MIB)
    } else if value >= KIB {
        format!("{:.2} KiB", value / KIB)
    } else {
        format!("{bytes} B")
    }
}

fn bytes_to_f64(value: u64) -> f64 {
    let high = u32::try_from(value >> 32).unwrap_or(u32::MAX);
    let low = u32::try_from(value & 0xFFFF_FFFF).unwrap_or(u32::MAX);
    f64::from(high) * 4_294_967_296.0 + f64::from(low)
}

/// Per-file progress bars on stderr.
pub(crate) struct BarProgress {
    bars: MultiProgress,
}

impl BarProgress {
    /// Bars are hidden for JSON output so stdout stays parseable alongside them.
    pub(crate) fn for_output(format: OutputFormat) -> Self {
        let bars = match format {
            OutputFormat::Table => MultiProgress::new(),
            OutputFormat::Json => MultiProgress::with_draw_target(ProgressDrawTarget::hidden()),
        };
        Self { bars }
    }
}

impl ProgressReporter for BarProgress {
    fn begin(&self, label: &str, total: Option<u64>) -> Box<dyn TransferProgress> {
        let (bar, template) = match total {
            Some(total) => (ProgressBar::new(total), TRANSFER_TEMPLATE),
            None => (ProgressBar::new_spinner(), SPINNER_TEMPLATE),
        };
        let style = ProgressStyle::with_template(template)
            .map_or_else(
                |_| ProgressStyle::default_bar(),
                |style| style.progress_chars("━━╌"),
            );
        let bar = self.bars.add(bar);
        bar.set_style(style);
        bar.set_message(label.to_string());
        Box::new(BarTransfer { bar })
    }
}

struct BarTransfer {
    bar: ProgressBar,
}

impl TransferProgress for BarTransfer {
    fn advance(&mut self, bytes: u64) {
        self.bar.inc(bytes);
    }

    fn finish(&mut self, success: bool) {
        if success {
            self.bar.finish_and_clear();
        } else {
            self.bar.abandon_with_message("failed");
        }
    }
}
