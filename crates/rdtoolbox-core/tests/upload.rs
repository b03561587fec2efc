use std::time::Duration;

use rdtoolbox_core::{
    ApiError, FileSelection, PipelineError, RetryPolicy, SelectionPolicy, UploadOutcome,
    UploadSettings, scan_torrent_files, upload_torrents,
};
use rdtoolbox_test_support::fixtures::{torrent_file, torrent_hash, write_torrent};
use rdtoolbox_test_support::mocks::{FakeDebrid, FakeOp, Failure};
use tempfile::TempDir;

fn settings() -> UploadSettings {
    UploadSettings {
        api_retry: RetryPolicy::once(),
        ..UploadSettings::default()
    }
}

#[tokio::test(start_paused = true)]
async fn one_failed_file_does_not_stop_the_batch() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    write_torrent(dir.path(), "a.torrent", "alpha")?;
    std::fs::write(dir.path().join("b.torrent"), b"not bencode")?;
    write_torrent(dir.path(), "c.torrent", "gamma")?;
    write_torrent(dir.path(), "d.torrent", "delta")?;
    let files = scan_torrent_files(dir.path())?;

    let api = FakeDebrid::new();
    api.fail(FakeOp::Add, "*", Failure::Status(400), Some(1));

    let report = upload_torrents(&api, &files, &settings()).await?;

    assert_eq!(report.entries.len(), 4);
    assert!(matches!(
        report.entries[0].outcome,
        UploadOutcome::Failed(PipelineError::Api(ApiError::Rejected { status: 400, .. }))
    ));
    assert!(matches!(
        report.entries[1].outcome,
        UploadOutcome::Failed(PipelineError::InvalidTorrent { .. })
    ));
    assert_eq!(report.submitted().count(), 2);
    assert_eq!(report.failed_count(), 2);
    // the invalid file never reaches the service
    assert_eq!(api.add_calls(), 3);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn submitted_records_carry_hash_and_local_name() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = write_torrent(dir.path(), "show.torrent", "show")?;
    let api = FakeDebrid::new();

    let report = upload_torrents(&api, &[path], &settings()).await?;
    let records = report.into_submitted();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].remote_id, "T1");
    assert_eq!(records[0].local_filename.as_deref(), Some("show.torrent"));
    assert_eq!(records[0].info_hash, Some(torrent_hash("show")));
    assert_eq!(api.selections(), vec![("T1".to_string(), FileSelection::All)]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn same_hash_is_submitted_once_per_run() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let first = write_torrent(dir.path(), "a.torrent", "same")?;
    let second = write_torrent(dir.path(), "b.torrent", "same")?;
    let api = FakeDebrid::new();

    let report = upload_torrents(&api, &[first.clone(), second], &settings()).await?;

    assert_eq!(api.add_calls(), 1);
    match &report.entries[1].outcome {
        UploadOutcome::Duplicate { first: seen, .. } => assert_eq!(seen, &first),
        other => panic!("expected duplicate, got {other:?}"),
    }
    assert_eq!(report.skipped_count(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn failed_copy_does_not_shadow_a_later_one() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let first = write_torrent(dir.path(), "a.torrent", "same")?;
    let second = write_torrent(dir.path(), "b.torrent", "same")?;
    let api = FakeDebrid::new();
    api.fail(FakeOp::Add, "*", Failure::Status(400), Some(1));

    let report = upload_torrents(&api, &[first, second], &settings()).await?;

    assert_eq!(api.add_calls(), 2);
    assert!(matches!(
        report.entries[0].outcome,
        UploadOutcome::Failed(PipelineError::Api(ApiError::Rejected { status: 400, .. }))
    ));
    assert!(matches!(
        report.entries[1].outcome,
        UploadOutcome::Submitted(_)
    ));
    assert_eq!(report.skipped_count(), 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn skip_existing_consults_the_account() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = write_torrent(dir.path(), "a.torrent", "alpha")?;
    let api = FakeDebrid::new();
    let mut existing = rdtoolbox_test_support::fixtures::record("OLD", "downloaded");
    existing.info_hash = Some(torrent_hash("alpha").to_uppercase());
    api.insert_torrent(existing);

    let settings = UploadSettings {
        skip_existing: true,
        ..settings()
    };
    let report = upload_torrents(&api, &[path], &settings).await?;

    assert_eq!(api.add_calls(), 0);
    assert!(matches!(
        &report.entries[0].outcome,
        UploadOutcome::AlreadyOnAccount { remote_id, .. } if remote_id == "OLD"
    ));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn metadata_timeout_removes_the_remote_torrent() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = write_torrent(dir.path(), "slow.torrent", "slow")?;
    let api = FakeDebrid::new();
    api.set_added_status("magnet_conversion");

    let settings = UploadSettings {
        metadata_wait: Duration::from_secs(15),
        metadata_interval: Duration::from_secs(5),
        ..settings()
    };
    let report = upload_torrents(&api, &[path], &settings).await?;

    match &report.entries[0].outcome {
        UploadOutcome::Failed(PipelineError::Timeout { remote_id, waited }) => {
            assert_eq!(remote_id, "T1");
            assert!(*waited >= Duration::from_secs(15));
        }
        other => panic!("expected timeout, got {other:?}"),
    }
    assert_eq!(api.info_calls("T1"), 4);
    assert_eq!(api.deleted(), vec!["T1".to_string()]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn empty_selection_removes_the_remote_torrent() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = write_torrent(dir.path(), "a.torrent", "alpha")?;
    let api = FakeDebrid::new();
    api.set_added_files(vec![torrent_file(1, "/alpha/readme.txt", 10)]);

    let settings = UploadSettings {
        selection: SelectionPolicy::glob(["*.mkv"])?,
        ..settings()
    };
    let report = upload_torrents(&api, &[path], &settings).await?;

    assert!(matches!(
        report.entries[0].outcome,
        UploadOutcome::Failed(PipelineError::NoFilesSelected { .. })
    ));
    assert!(api.selections().is_empty());
    assert!(api.remote_ids().is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn largest_policy_selects_one_file() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = write_torrent(dir.path(), "a.torrent", "alpha")?;
    let api = FakeDebrid::new();
    api.set_added_files(vec![
        torrent_file(1, "/alpha/sample.mkv", 10),
        torrent_file(2, "/alpha/movie.mkv", 900),
    ]);

    let settings = UploadSettings {
        selection: SelectionPolicy::Largest,
        ..settings()
    };
    upload_torrents(&api, &[path], &settings).await?;

    assert_eq!(
        api.selections(),
        vec![("T1".to_string(), FileSelection::Ids(vec![2]))]
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn failed_selection_removes_the_remote_torrent() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = write_torrent(dir.path(), "a.torrent", "alpha")?;
    let api = FakeDebrid::new();
    api.fail(FakeOp::Select, "T1", Failure::Status(400), None);

    let report = upload_torrents(&api, &[path], &settings()).await?;

    assert_eq!(report.failed_count(), 1);
    assert_eq!(api.deleted(), vec!["T1".to_string()]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn transient_add_failures_are_retried() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = write_torrent(dir.path(), "a.torrent", "alpha")?;
    let api = FakeDebrid::new();
    api.fail(FakeOp::Add, "*", Failure::Status(503), Some(2));

    let settings = UploadSettings {
        api_retry: RetryPolicy::new(3, Duration::from_secs(2)),
        ..settings()
    };
    let report = upload_torrents(&api, &[path], &settings).await?;

    assert_eq!(api.add_calls(), 3);
    assert_eq!(report.submitted().count(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn rejected_credentials_abort_the_batch() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let first = write_torrent(dir.path(), "a.torrent", "alpha")?;
    let second = write_torrent(dir.path(), "b.torrent", "beta")?;
    let api = FakeDebrid::new();
    api.fail(FakeOp::Add, "*", Failure::Unauthorized, None);

    let result = upload_torrents(&api, &[first, second], &settings()).await;

    assert!(matches!(result, Err(ApiError::Unauthorized { .. })));
    assert_eq!(api.add_calls(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn processed_files_are_moved_after_submission() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = write_torrent(dir.path(), "a.torrent", "alpha")?;
    let processed = dir.path().join("Processed Files");
    let api = FakeDebrid::new();

    let settings = UploadSettings {
        processed_dir: Some(processed.clone()),
        ..settings()
    };
    upload_torrents(&api, &[path.clone()], &settings).await?;

    assert!(!path.exists());
    assert!(processed.join("a.torrent").exists());
    Ok(())
}
