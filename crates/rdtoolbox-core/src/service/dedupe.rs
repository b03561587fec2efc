//! Account-side deduplication by info-hash.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use tracing::{info, warn};

use crate::error::ApiError;
use crate::model::TorrentRecord;
use crate::retry::RetryPolicy;
use crate::service::DebridApi;

/// Torrents sharing one info-hash.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateGroup {
    /// Lowercase info-hash shared by the group.
    pub info_hash: String,
    /// Entry that survives.
    pub kept: TorrentRecord,
    /// Entries to delete.
    pub redundant: Vec<TorrentRecord>,
}

/// Deletions needed to leave one torrent per info-hash.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DedupePlan {
    /// Groups with more than one member, in first-seen order.
    pub groups: Vec<DuplicateGroup>,
    /// Distinct torrents looked at.
    pub inspected: usize,
}

impl DedupePlan {
    /// Whether nothing needs deleting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Remote ids scheduled for deletion.
    pub fn redundant_ids(&self) -> impl Iterator<Item = &str> {
        self.groups
            .iter()
            .flat_map(|group| group.redundant.iter())
            .map(|record| record.remote_id.as_str())
    }

    /// Number of scheduled deletions.
    #[must_use]
    pub fn redundant_count(&self) -> usize {
        self.groups.iter().map(|group| group.redundant.len()).sum()
    }
}

/// Result of applying a plan.
#[derive(Debug, Default)]
pub struct DedupeReport {
    /// Remote ids that were deleted.
    pub deleted: Vec<String>,
    /// Remote ids that could not be deleted.
    pub failed: Vec<(String, ApiError)>,
}

/// Group torrents by hash and pick one survivor per group.
///
/// The survivor is the earliest added torrent (unknown dates last), ties
/// broken by the lowest remote id. Torrents without a hash are ignored.
#[must_use]
pub fn plan_dedupe(torrents: &[TorrentRecord]) -> DedupePlan {
    let mut seen_ids = HashSet::new();
    let mut order: Vec<String> = Vec::new();
    let mut buckets: HashMap<String, Vec<&TorrentRecord>> = HashMap::new();
    let mut inspected = 0;

    for record in torrents {
        if !seen_ids.insert(record.remote_id.as_str()) {
            continue;
        }
        inspected += 1;
        let Some(hash) = record.info_hash.as_deref().filter(|hash| !hash.is_empty()) else {
            continue;
        };
        let hash = hash.to_ascii_lowercase();
        buckets
            .entry(hash.clone())
            .or_insert_with(|| {
                order.push(hash);
                Vec::new()
            })
            .push(record);
    }

    let groups = order
        .into_iter()
        .filter_map(|hash| {
            let mut members = buckets.remove(&hash)?;
            if members.len() < 2 {
                return None;
            }
            members.sort_by(|a, b| survivor_order(a, b));
            let mut members = members.into_iter().cloned();
            let kept = members.next()?;
            Some(DuplicateGroup {
                info_hash: hash,
                kept,
                redundant: members.collect(),
            })
        })
        .collect();

    DedupePlan { groups, inspected }
}

/// Delete every redundant torrent in the plan, continuing past failures.
///
/// # Errors
///
/// Returns the [`ApiError`] when the service rejects the credential.
pub async fn apply_dedupe(
    api: &dyn DebridApi,
    plan: &DedupePlan,
    retry: &RetryPolicy,
) -> Result<DedupeReport, ApiError> {
    let mut report = DedupeReport::default();
    for group in &plan.groups {
        for record in &group.redundant {
            let remote_id = record.remote_id.as_str();
            match retry
                .run("torrents.delete", || api.delete_torrent(remote_id))
                .await
            {
                Ok(()) => {
                    info!(
                        remote_id,
                        kept = %group.kept.remote_id,
                        info_hash = %group.info_hash,
                        "deleted duplicate torrent"
                    );
                    report.deleted.push(remote_id.to_string());
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    warn!(remote_id, error = %err, "failed to delete duplicate torrent");
                    report.failed.push((remote_id.to_string(), err));
                }
            }
        }
    }
    Ok(report)
}

fn survivor_order(a: &TorrentRecord, b: &TorrentRecord) -> Ordering {
    let by_added = match (a.added, b.added) {
        (Some(left), Some(right)) => left.cmp(&right),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_added
        .then_with(|| a.remote_id.len().cmp(&b.remote_id.len()))
        .then_with(|| a.remote_id.cmp(&b.remote_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn record(id: &str, hash: Option<&str>, day: Option<u32>) -> TorrentRecord {
        let mut record = TorrentRecord::new(id, format!("name-{id}"), "downloaded");
        record.info_hash = hash.map(str::to_string);
        record.added = day.and_then(|day| Utc.with_ymd_and_hms(2026, 3, day, 12, 0, 0).single());
        record
    }

    #[test]
    fn keeps_the_earliest_added_torrent() {
        let plan = plan_dedupe(&[
            record("A2", Some("aa"), Some(5)),
            record("B", Some("bb"), Some(1)),
            record("A1", Some("AA"), Some(2)),
        ]);
        assert_eq!(plan.groups.len(), 1);
        assert_eq!(plan.groups[0].kept.remote_id, "A1");
        assert_eq!(plan.redundant_ids().collect::<Vec<_>>(), vec!["A2"]);
        assert_eq!(plan.inspected, 3);
    }

    #[test]
    fn unknown_dates_sort_last_then_lowest_id_wins() {
        let plan = plan_dedupe(&[
            record("10", Some("aa"), None),
            record("9", Some("aa"), None),
            record("11", Some("aa"), Some(3)),
        ]);
        assert_eq!(plan.groups[0].kept.remote_id, "11");
        assert_eq!(plan.redundant_ids().collect::<Vec<_>>(), vec!["9", "10"]);
    }

    #[test]
    fn same_added_time_keeps_the_lowest_id() {
        let plan = plan_dedupe(&[
            record("B7", Some("cc"), Some(4)),
            record("A70", Some("cc"), Some(4)),
            record("A7", Some("CC"), Some(4)),
        ]);
        assert_eq!(plan.groups.len(), 1);
        assert_eq!(plan.groups[0].kept.remote_id, "A7");
        assert_eq!(plan.redundant_ids().collect::<Vec<_>>(), vec!["B7", "A70"]);
    }

    #[test]
    fn ignores_missing_hashes_and_repeated_ids() {
        let plan = plan_dedupe(&[
            record("A", Some("aa"), Some(1)),
            record("A", Some("aa"), Some(1)),
            record("X", None, Some(1)),
            record("Y", None, Some(2)),
        ]);
        assert!(plan.is_empty());
        assert_eq!(plan.redundant_count(), 0);
        assert_eq!(plan.inspected, 3);
    }
}
