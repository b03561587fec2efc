//! Status poller: follow tracked torrents until each settles or time runs out.

use std::collections::HashSet;
use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::error::ApiError;
use crate::model::{TorrentRecord, TorrentStatus};
use crate::service::DebridApi;

/// Poll cadence and deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Fixed delay between rounds.
    pub interval: Duration,
    /// Total time after which unsettled torrents are reported as timed out.
    pub max_wait: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            max_wait: Duration::from_secs(600),
        }
    }
}

/// Why a torrent stopped being tracked.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// Reached the complete state.
    Complete(TorrentRecord),
    /// Reported failed by the service, or rejected as unknown.
    Failed {
        /// Last known snapshot.
        record: TorrentRecord,
        /// Remote status or error message.
        reason: String,
    },
    /// Still unsettled when the deadline passed.
    TimedOut {
        /// Last known snapshot.
        record: TorrentRecord,
    },
}

impl PollOutcome {
    /// Snapshot the outcome was decided on.
    #[must_use]
    pub const fn record(&self) -> &TorrentRecord {
        match self {
            Self::Complete(record)
            | Self::Failed { record, .. }
            | Self::TimedOut { record } => record,
        }
    }

    /// Short label for summaries.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Complete(_) => "complete",
            Self::Failed { .. } => "failed",
            Self::TimedOut { .. } => "timed out",
        }
    }
}

/// Outcomes in the order torrents settled.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PollReport {
    /// One outcome per distinct tracked id.
    pub outcomes: Vec<PollOutcome>,
    /// Time spent polling.
    pub elapsed: Duration,
}

impl PollReport {
    /// Number of complete torrents.
    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.count(|outcome| matches!(outcome, PollOutcome::Complete(_)))
    }

    /// Number of failed torrents.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.count(|outcome| matches!(outcome, PollOutcome::Failed { .. }))
    }

    /// Number of timed-out torrents.
    #[must_use]
    pub fn timed_out_count(&self) -> usize {
        self.count(|outcome| matches!(outcome, PollOutcome::TimedOut { .. }))
    }

    /// Consume the report, keeping complete records.
    #[must_use]
    pub fn into_completed(self) -> Vec<TorrentRecord> {
        self.outcomes
            .into_iter()
            .filter_map(|outcome| match outcome {
                PollOutcome::Complete(record) => Some(record),
                _ => None,
            })
            .collect()
    }

    fn count(&self, predicate: impl Fn(&PollOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|outcome| predicate(outcome)).count()
    }
}

/// Poll every record until it completes, fails, or the deadline passes.
///
/// Each id is polled once per round and settles exactly once. Duplicate ids
/// are tracked once.
///
/// # Errors
///
/// Returns the [`ApiError`] when the service rejects the credential.
pub async fn poll_until_terminal(
    api: &dyn DebridApi,
    records: Vec<TorrentRecord>,
    settings: &PollSettings,
) -> Result<PollReport, ApiError> {
    let started = Instant::now();
    let mut seen = HashSet::new();
    let mut tracked: Vec<TorrentRecord> = records
        .into_iter()
        .filter(|record| seen.insert(record.remote_id.clone()))
        .collect();
    let mut outcomes = Vec::with_capacity(tracked.len());

    while !tracked.is_empty() {
        let mut pending = Vec::with_capacity(tracked.len());
        for record in tracked {
            if let Some(outcome) = poll_once(api, record, &mut pending).await? {
                outcomes.push(outcome);
            }
        }
        tracked = pending;
        if tracked.is_empty() {
            break;
        }

        if started.elapsed() >= settings.max_wait {
            for record in tracked.drain(..) {
                warn!(
                    remote_id = %record.remote_id,
                    status = %record.remote_status,
                    "torrent did not settle before the deadline"
                );
                outcomes.push(PollOutcome::TimedOut { record });
            }
            break;
        }
        sleep(settings.interval).await;
    }

    Ok(PollReport {
        outcomes,
        elapsed: started.elapsed(),
    })
}

async fn poll_once(
    api: &dyn DebridApi,
    mut record: TorrentRecord,
    pending: &mut Vec<TorrentRecord>,
) -> Result<Option<PollOutcome>, ApiError> {
    match api.get_torrent_info(&record.remote_id).await {
        Ok(fresh) => {
            record.refresh(fresh);
            match record.status {
                TorrentStatus::Complete => {
                    info!(
                        remote_id = %record.remote_id,
                        name = %record.display_name(),
                        "torrent complete"
                    );
                    Ok(Some(PollOutcome::Complete(record)))
                }
                TorrentStatus::Error => {
                    warn!(
                        remote_id = %record.remote_id,
                        status = %record.remote_status,
                        "torrent failed remotely"
                    );
                    let reason = record.remote_status.clone();
                    Ok(Some(PollOutcome::Failed { record, reason }))
                }
                TorrentStatus::Queued | TorrentStatus::Downloading => {
                    debug!(
                        remote_id = %record.remote_id,
                        status = %record.remote_status,
                        progress = record.progress,
                        "torrent still in progress"
                    );
                    pending.push(record);
                    Ok(None)
                }
            }
        }
        Err(err) if err.is_fatal() => Err(err),
        Err(err) if err.is_retryable() => {
            warn!(
                remote_id = %record.remote_id,
                error = %err,
                "status check failed; will retry"
            );
            pending.push(record);
            Ok(None)
        }
        Err(err) => {
            warn!(
                remote_id = %record.remote_id,
                http_status = ?err.status(),
                error = %err,
                "status check rejected"
            );
            Ok(Some(PollOutcome::Failed {
                record,
                reason: err.to_string(),
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_counts_and_extracts_completed() {
        let report = PollReport {
            outcomes: vec![
                PollOutcome::Complete(TorrentRecord::pending("A")),
                PollOutcome::TimedOut {
                    record: TorrentRecord::pending("B"),
                },
                PollOutcome::Failed {
                    record: TorrentRecord::pending("C"),
                    reason: "dead".into(),
                },
            ],
            elapsed: Duration::from_secs(30),
        };
        assert_eq!(report.completed_count(), 1);
        assert_eq!(report.timed_out_count(), 1);
        assert_eq!(report.failed_count(), 1);
        assert_eq!(report.outcomes[1].label(), "timed out");
        assert_eq!(report.outcomes[2].record().remote_id, "C");
        let completed = report.into_completed();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].remote_id, "A");
    }
}
