//! Upload, watch, download, and the combined run pipeline.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::anyhow;
use rdtoolbox_core::{
    DebridApi, DownloadReport, PipelineError, PollReport, TorrentRecord, TorrentStatus,
    UploadReport, download_links, download_torrents, poll_until_terminal, scan_torrent_files,
    upload_torrents,
};
use tracing::{info, warn};

use crate::cli::{DownloadArgs, HostersArgs, RunArgs, UploadArgs, WatchArgs};
use crate::client::{AppContext, CliError, CliResult};
use crate::output::{
    BarProgress, render_download_report, render_poll_report, render_upload_report,
};

const LINKS_FILE: &str = "links.txt";

pub(crate) async fn handle_upload(ctx: &AppContext, args: UploadArgs) -> CliResult<()> {
    ctx.check_account().await?;
    let report = upload_dir(ctx, &args.dir, args.skip_existing, args.move_processed).await?;
    render_upload_report(&report, ctx.output)?;
    Problems::default().upload(&report).finish()
}

pub(crate) async fn handle_watch(ctx: &AppContext, args: WatchArgs) -> CliResult<()> {
    let records = args.ids.into_iter().map(TorrentRecord::pending).collect();
    let report = poll_until_terminal(&ctx.api, records, &ctx.poll_settings()).await?;
    render_poll_report(&report, ctx.output)?;
    Problems::default().poll(&report).finish()
}

pub(crate) async fn handle_run(ctx: &AppContext, args: RunArgs) -> CliResult<()> {
    ctx.check_account().await?;
    let uploads = upload_dir(ctx, &args.dir, false, false).await?;
    render_upload_report(&uploads, ctx.output)?;
    let mut problems = Problems::default().upload(&uploads);

    let submitted: Vec<TorrentRecord> = uploads.submitted().cloned().collect();
    if submitted.is_empty() {
        info!("nothing submitted; skipping poll and download");
        return problems.finish();
    }

    let polled = poll_until_terminal(&ctx.api, submitted, &ctx.poll_settings()).await?;
    render_poll_report(&polled, ctx.output)?;
    problems = problems.poll(&polled);

    let completed = polled.into_completed();
    if !completed.is_empty() {
        let progress = BarProgress::for_output(ctx.output);
        let downloads = download_torrents(
            &ctx.api,
            &ctx.api,
            &progress,
            &completed,
            &ctx.download_settings(),
        )
        .await?;
        render_download_report(&downloads, ctx.output)?;
        problems = problems.download(&downloads);
    }
    problems.finish()
}

pub(crate) async fn handle_download(ctx: &AppContext, args: DownloadArgs) -> CliResult<()> {
    let retry = ctx.settings.api_retry;
    let mut lookup_failures = Vec::new();
    let records = if args.ids.is_empty() {
        let limit = args.limit.unwrap_or(ctx.settings.download_limit);
        retry
            .run("torrents.list", || ctx.api.list_torrents(Some(limit)))
            .await?
            .into_iter()
            .filter(|record| record.status == TorrentStatus::Complete)
            .collect()
    } else {
        let mut records = Vec::with_capacity(args.ids.len());
        for id in &args.ids {
            match retry
                .run("torrents.info", || ctx.api.get_torrent_info(id))
                .await
            {
                Ok(record) => records.push(record),
                Err(err) if err.is_fatal() => return Err(err.into()),
                Err(err) => {
                    warn!(remote_id = %id, error = %err, "torrent lookup failed");
                    lookup_failures.push((id.clone(), PipelineError::from(err)));
                }
            }
        }
        records
    };

    let progress = BarProgress::for_output(ctx.output);
    let mut report = download_torrents(
        &ctx.api,
        &ctx.api,
        &progress,
        &records,
        &ctx.download_settings(),
    )
    .await?;
    report.torrent_failures.extend(lookup_failures);
    render_download_report(&report, ctx.output)?;
    Problems::default().download(&report).finish()
}

pub(crate) async fn handle_hosters(ctx: &AppContext, args: HostersArgs) -> CliResult<()> {
    let path = match args.file {
        Some(path) => path,
        None => find_links_file(Path::new("."))?.ok_or_else(|| {
            CliError::validation(format!(
                "no {LINKS_FILE} found in the working directory (pass --file)"
            ))
        })?,
    };
    let links = read_links(&path)?;
    if links.is_empty() {
        warn!(path = %path.display(), "link list is empty");
    }

    let progress = BarProgress::for_output(ctx.output);
    let report = download_links(
        &ctx.api,
        &ctx.api,
        &progress,
        &links,
        &ctx.download_settings(),
    )
    .await?;
    render_download_report(&report, ctx.output)?;
    Problems::default().download(&report).finish()
}

async fn upload_dir(
    ctx: &AppContext,
    dir: &Path,
    skip_existing: bool,
    move_processed: bool,
) -> CliResult<UploadReport> {
    let files = scan_torrent_files(dir)?;
    if files.is_empty() {
        warn!(dir = %dir.display(), "no .torrent files found");
        return Ok(UploadReport::default());
    }
    info!(dir = %dir.display(), files = files.len(), "uploading torrent files");
    let settings = ctx.upload_settings(skip_existing, move_processed);
    Ok(upload_torrents(&ctx.api, &files, &settings).await?)
}

/// `links.txt` inside `dir`, matched without regard to letter case.
///
/// An exact-case match wins when several spellings exist.
pub(crate) fn find_links_file(dir: &Path) -> CliResult<Option<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|err| {
        CliError::failure(anyhow!("failed to read directory {}: {err}", dir.display()))
    })?;
    let mut candidates: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_ok_and(|kind| kind.is_file()))
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.eq_ignore_ascii_case(LINKS_FILE))
        })
        .map(|entry| entry.path())
        .collect();
    candidates.sort();
    let exact = candidates
        .iter()
        .position(|path| path.file_name().is_some_and(|name| name == LINKS_FILE));
    Ok(match exact {
        Some(index) => Some(candidates.swap_remove(index)),
        None => candidates.into_iter().next(),
    })
}

/// Non-empty lines of `path`, skipping `#` comments.
pub(crate) fn read_links(path: &Path) -> CliResult<Vec<String>> {
    let contents = fs::read_to_string(path).map_err(|err| {
        CliError::failure(anyhow!("failed to read link list {}: {err}", path.display()))
    })?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Tally of items that did not make it, turned into the exit status.
#[derive(Debug, Default)]
struct Problems {
    failed_uploads: usize,
    unsettled: usize,
    failed_downloads: usize,
}

impl Problems {
    fn upload(mut self, report: &UploadReport) -> Self {
        self.failed_uploads += report.failed_count();
        self
    }

    fn poll(mut self, report: &PollReport) -> Self {
        self.unsettled += report.failed_count() + report.timed_out_count();
        self
    }

    fn download(mut self, report: &DownloadReport) -> Self {
        self.failed_downloads += report.failed_count();
        self
    }

    fn finish(self) -> CliResult<()> {
        let mut parts = Vec::new();
        if self.failed_uploads > 0 {
            parts.push(format!("{} upload(s) failed", self.failed_uploads));
        }
        if self.unsettled > 0 {
            parts.push(format!("{} torrent(s) failed or timed out", self.unsettled));
        }
        if self.failed_downloads > 0 {
            parts.push(format!("{} download(s) failed", self.failed_downloads));
        }
        if parts.is_empty() {
            Ok(())
        } else {
            Err(CliError::partial(parts.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::tests::context_for;
    use httpmock::prelude::*;
    use rdtoolbox_test_support::fixtures::write_torrent;
    use serde_json::json;
    use tempfile::TempDir;

    fn info_body(id: &str, status: &str, links: &[String]) -> serde_json::Value {
        json!({
            "id": id,
            "filename": "Show",
            "hash": "aa",
            "bytes": 10,
            "progress": 100,
            "status": status,
            "files": [{"id": 1, "path": "/Show/a.mkv", "bytes": 10, "selected": 1}],
            "links": links,
        })
    }

    fn mock_direct_download(server: &MockServer, name: &str, body: &str) {
        let hoster = server.url(format!("/hoster/{name}"));
        let direct = server.url(format!("/d/{name}"));
        server.mock(|when, then| {
            when.method(POST)
                .path("/unrestrict/link")
                .body(format!("link={}", form_encode(&hoster)));
            then.status(200).json_body(json!({
                "filename": name,
                "filesize": body.len(),
                "link": hoster,
                "download": direct,
            }));
        });
        let body = body.to_string();
        server.mock(|when, then| {
            when.method(GET).path(format!("/d/{name}"));
            then.status(200).body(body);
        });
    }

    fn form_encode(value: &str) -> String {
        value.replace(':', "%3A").replace('/', "%2F")
    }

    #[tokio::test]
    async fn upload_submits_selects_and_moves_the_file() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let work = TempDir::new()?;
        let downloads = TempDir::new()?;
        let path = write_torrent(work.path(), "show.torrent", "show")?;

        let add = server.mock(|when, then| {
            when.method(PUT)
                .path("/torrents/addTorrent")
                .header("content-type", "application/octet-stream");
            then.status(201).json_body(json!({"id": "T1"}));
        });
        server.mock(|when, then| {
            when.method(GET).path("/torrents/info/T1");
            then.status(200)
                .json_body(info_body("T1", "waiting_files_selection", &[]));
        });
        let select = server.mock(|when, then| {
            when.method(POST)
                .path("/torrents/selectFiles/T1")
                .body("files=all");
            then.status(204);
        });

        let ctx = context_for(&server, downloads.path());
        let args = UploadArgs {
            dir: work.path().to_path_buf(),
            skip_existing: false,
            move_processed: true,
        };
        handle_upload(&ctx, args).await.map_err(|err| anyhow!(err.display_message()))?;

        add.assert();
        select.assert();
        assert!(!path.exists());
        assert!(downloads.path().join("processed").join("show.torrent").exists());
        Ok(())
    }

    #[tokio::test]
    async fn upload_failures_exit_as_partial() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let work = TempDir::new()?;
        let downloads = TempDir::new()?;
        fs::write(work.path().join("broken.torrent"), b"not bencode")?;

        let ctx = context_for(&server, downloads.path());
        let args = UploadArgs {
            dir: work.path().to_path_buf(),
            skip_existing: false,
            move_processed: false,
        };
        let err = handle_upload(&ctx, args).await.expect_err("invalid torrent");

        assert_eq!(err.exit_code(), 4);
        assert!(err.display_message().contains("1 upload(s) failed"));
        Ok(())
    }

    #[tokio::test]
    async fn run_uploads_waits_and_downloads() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let work = TempDir::new()?;
        let downloads = TempDir::new()?;
        write_torrent(work.path(), "movie.torrent", "movie")?;
        let hoster = server.url("/hoster/movie.mkv");

        server.mock(|when, then| {
            when.method(PUT).path("/torrents/addTorrent");
            then.status(201).json_body(json!({"id": "T1"}));
        });
        server.mock(|when, then| {
            when.method(GET).path("/torrents/info/T1");
            then.status(200)
                .json_body(info_body("T1", "downloaded", &[hoster.clone()]));
        });
        mock_direct_download(&server, "movie.mkv", "0123456789");

        let ctx = context_for(&server, downloads.path());
        handle_run(
            &ctx,
            RunArgs {
                dir: work.path().to_path_buf(),
            },
        )
        .await
        .map_err(|err| anyhow!(err.display_message()))?;

        let saved = fs::read_to_string(downloads.path().join("movie.mkv"))?;
        assert_eq!(saved, "0123456789");
        Ok(())
    }

    #[tokio::test]
    async fn watch_reports_remote_errors_as_partial() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let downloads = TempDir::new()?;
        server.mock(|when, then| {
            when.method(GET).path("/torrents/info/OK");
            then.status(200).json_body(info_body("OK", "downloaded", &[]));
        });
        server.mock(|when, then| {
            when.method(GET).path("/torrents/info/BAD");
            then.status(200).json_body(info_body("BAD", "magnet_error", &[]));
        });

        let ctx = context_for(&server, downloads.path());
        let err = handle_watch(
            &ctx,
            WatchArgs {
                ids: vec!["OK".into(), "BAD".into()],
            },
        )
        .await
        .expect_err("one torrent failed");

        assert_eq!(err.exit_code(), 4);
        Ok(())
    }

    #[tokio::test]
    async fn download_by_id_records_unknown_torrents() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let downloads = TempDir::new()?;
        let hoster = server.url("/hoster/clip.bin");
        server.mock(|when, then| {
            when.method(GET).path("/torrents/info/GOOD");
            then.status(200)
                .json_body(info_body("GOOD", "downloaded", &[hoster.clone()]));
        });
        server.mock(|when, then| {
            when.method(GET).path("/torrents/info/GONE");
            then.status(404)
                .json_body(json!({"error": "unknown_ressource", "error_code": 7}));
        });
        mock_direct_download(&server, "clip.bin", "abc");

        let ctx = context_for(&server, downloads.path());
        let err = handle_download(
            &ctx,
            DownloadArgs {
                ids: vec!["GOOD".into(), "GONE".into()],
                limit: None,
            },
        )
        .await
        .expect_err("one id is unknown");

        assert_eq!(err.exit_code(), 4);
        assert_eq!(fs::read_to_string(downloads.path().join("clip.bin"))?, "abc");
        Ok(())
    }

    #[tokio::test]
    async fn download_listing_skips_incomplete_torrents() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let downloads = TempDir::new()?;
        let hoster = server.url("/hoster/ep.mkv");
        server.mock(|when, then| {
            when.method(GET).path("/torrents").query_param("page", "1");
            then.status(200).json_body(json!([
                {"id": "DONE", "filename": "done", "hash": "aa", "status": "downloaded"},
                {"id": "BUSY", "filename": "busy", "hash": "bb", "status": "downloading"}
            ]));
        });
        server.mock(|when, then| {
            when.method(GET).path("/torrents/info/DONE");
            then.status(200)
                .json_body(info_body("DONE", "downloaded", &[hoster.clone()]));
        });
        mock_direct_download(&server, "ep.mkv", "episode");

        let ctx = context_for(&server, downloads.path());
        handle_download(
            &ctx,
            DownloadArgs {
                ids: Vec::new(),
                limit: Some(10),
            },
        )
        .await
        .map_err(|err| anyhow!(err.display_message()))?;

        assert_eq!(fs::read_to_string(downloads.path().join("ep.mkv"))?, "episode");
        Ok(())
    }

    #[tokio::test]
    async fn hosters_downloads_every_listed_link() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let work = TempDir::new()?;
        let downloads = TempDir::new()?;
        let list = work.path().join("Links.TXT");
        fs::write(
            &list,
            format!(
                "# weekend\n{}\n\n{}\n",
                server.url("/hoster/one.bin"),
                server.url("/hoster/two.bin")
            ),
        )?;
        mock_direct_download(&server, "one.bin", "1");
        mock_direct_download(&server, "two.bin", "22");

        let ctx = context_for(&server, downloads.path());
        handle_hosters(&ctx, HostersArgs { file: Some(list) })
            .await
            .map_err(|err| anyhow!(err.display_message()))?;

        assert_eq!(fs::read_to_string(downloads.path().join("one.bin"))?, "1");
        assert_eq!(fs::read_to_string(downloads.path().join("two.bin"))?, "22");
        Ok(())
    }

    #[test]
    fn links_file_is_found_in_any_case() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let missing = find_links_file(dir.path()).map_err(|err| anyhow!(err.display_message()))?;
        assert!(missing.is_none());

        fs::write(dir.path().join("LINKS.txt"), "x")?;
        let found = find_links_file(dir.path()).map_err(|err| anyhow!(err.display_message()))?;
        assert_eq!(found, Some(dir.path().join("LINKS.txt")));
        Ok(())
    }

    #[test]
    fn read_links_skips_blanks_and_comments() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("links.txt");
        fs::write(&path, "  https://a.example/1  \n#skip\n\nhttps://a.example/2\n")?;

        let links = read_links(&path).map_err(|err| anyhow!(err.display_message()))?;
        assert_eq!(links, vec!["https://a.example/1", "https://a.example/2"]);
        Ok(())
    }
}
