use std::time::Duration;

use rdtoolbox_core::{
    ApiError, PollOutcome, PollSettings, TorrentRecord, TorrentStatus, poll_until_terminal,
};
use rdtoolbox_test_support::fixtures::record;
use rdtoolbox_test_support::mocks::{FakeDebrid, FakeOp, Failure};

fn settings(interval: u64, max_wait: u64) -> PollSettings {
    PollSettings {
        interval: Duration::from_secs(interval),
        max_wait: Duration::from_secs(max_wait),
    }
}

fn outcome_for<'a>(outcomes: &'a [PollOutcome], remote_id: &str) -> &'a PollOutcome {
    outcomes
        .iter()
        .find(|outcome| outcome.record().remote_id == remote_id)
        .unwrap_or_else(|| panic!("no outcome for {remote_id}"))
}

#[tokio::test(start_paused = true)]
async fn each_torrent_settles_exactly_once() -> anyhow::Result<()> {
    let api = FakeDebrid::new();
    for id in ["A", "B", "C"] {
        api.insert_torrent(record(id, "queued"));
    }
    api.script_statuses("A", &["downloading", "downloaded"]);
    api.script_statuses("B", &["queued", "downloading", "downloading", "dead"]);
    api.script_statuses("C", &["downloaded"]);

    let tracked = vec![
        TorrentRecord::pending("A"),
        TorrentRecord::pending("B"),
        TorrentRecord::pending("C"),
    ];
    let report = poll_until_terminal(&api, tracked, &settings(10, 600)).await?;

    assert_eq!(report.outcomes.len(), 3);
    assert_eq!(report.completed_count(), 2);
    assert_eq!(report.failed_count(), 1);
    assert!(matches!(
        outcome_for(&report.outcomes, "B"),
        PollOutcome::Failed { reason, .. } if reason == "dead"
    ));
    // never polled again once settled
    assert_eq!(api.info_calls("C"), 1);
    assert_eq!(api.info_calls("A"), 2);
    assert_eq!(api.info_calls("B"), 4);
    assert_eq!(report.elapsed, Duration::from_secs(30));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn stuck_torrent_is_reported_as_timed_out() -> anyhow::Result<()> {
    let api = FakeDebrid::new();
    api.insert_torrent(record("STUCK", "downloading"));
    api.insert_torrent(record("DONE", "downloaded"));

    let tracked = vec![TorrentRecord::pending("STUCK"), TorrentRecord::pending("DONE")];
    let report = poll_until_terminal(&api, tracked, &settings(10, 60)).await?;

    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(report.timed_out_count(), 1);
    assert_eq!(report.failed_count(), 0);
    match outcome_for(&report.outcomes, "STUCK") {
        PollOutcome::TimedOut { record } => {
            assert_eq!(record.status, TorrentStatus::Downloading);
        }
        other => panic!("expected timeout, got {other:?}"),
    }
    // rounds at 0, 10, ..., 60
    assert_eq!(api.info_calls("STUCK"), 7);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn duplicate_ids_are_tracked_once() -> anyhow::Result<()> {
    let api = FakeDebrid::new();
    api.insert_torrent(record("A", "downloaded"));

    let tracked = vec![TorrentRecord::pending("A"), TorrentRecord::pending("A")];
    let report = poll_until_terminal(&api, tracked, &settings(5, 30)).await?;

    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(api.info_calls("A"), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn unknown_ids_fail_without_stopping_others() -> anyhow::Result<()> {
    let api = FakeDebrid::new();
    api.insert_torrent(record("A", "downloaded"));

    let tracked = vec![TorrentRecord::pending("GONE"), TorrentRecord::pending("A")];
    let report = poll_until_terminal(&api, tracked, &settings(5, 30)).await?;

    assert!(matches!(
        outcome_for(&report.outcomes, "GONE"),
        PollOutcome::Failed { .. }
    ));
    assert!(matches!(
        outcome_for(&report.outcomes, "A"),
        PollOutcome::Complete(_)
    ));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn transient_errors_keep_the_torrent_tracked() -> anyhow::Result<()> {
    let api = FakeDebrid::new();
    api.insert_torrent(record("A", "downloaded"));
    api.fail(FakeOp::Info, "A", Failure::Network, Some(2));

    let report = poll_until_terminal(&api, vec![TorrentRecord::pending("A")], &settings(5, 60))
        .await?;

    assert_eq!(report.completed_count(), 1);
    assert_eq!(api.info_calls("A"), 3);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn rejected_credentials_abort_polling() {
    let api = FakeDebrid::new();
    api.insert_torrent(record("A", "downloading"));
    api.fail(FakeOp::Info, "*", Failure::Unauthorized, None);

    let result =
        poll_until_terminal(&api, vec![TorrentRecord::pending("A")], &settings(5, 60)).await;

    assert!(matches!(result, Err(ApiError::Unauthorized { .. })));
}
