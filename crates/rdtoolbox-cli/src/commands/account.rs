//! Read-only account views: premium state, torrents in progress, hosters.

use chrono::Utc;
use rdtoolbox_core::{DebridApi, TorrentStatus};

use crate::cli::{HostsArgs, StatusArgs};
use crate::client::{AppContext, CliResult};
use crate::output::{render_account, render_hosts, render_status};

pub(crate) async fn handle_account(ctx: &AppContext) -> CliResult<()> {
    let account = ctx
        .settings
        .api_retry
        .run("user", || ctx.api.account())
        .await?;
    render_account(&account, Utc::now(), ctx.output)
}

pub(crate) async fn handle_status(ctx: &AppContext, args: StatusArgs) -> CliResult<()> {
    let limit = args.limit.unwrap_or(ctx.settings.download_limit);
    let records: Vec<_> = ctx
        .settings
        .api_retry
        .run("torrents.list", || ctx.api.list_torrents(Some(limit)))
        .await?
        .into_iter()
        .filter(|record| record.status != TorrentStatus::Complete)
        .collect();
    render_status(&records, ctx.output)
}

pub(crate) async fn handle_hosts(ctx: &AppContext, args: HostsArgs) -> CliResult<()> {
    let mut hosts = ctx
        .settings
        .api_retry
        .run("hosts.status", || ctx.api.host_status())
        .await?;
    if !args.all {
        hosts.retain(|host| host.is_online());
    }
    render_hosts(&hosts, ctx.output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::tests::context_for;
    use httpmock::prelude::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn account_reads_the_user_endpoint() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let dir = TempDir::new()?;
        let user = server.mock(|when, then| {
            when.method(GET)
                .path("/user")
                .header("authorization", "Bearer tok");
            then.status(200).json_body(json!({
                "username": "alice",
                "type": "premium",
                "premium": 86_400,
                "expiration": "2099-01-01T00:00:00.000Z"
            }));
        });

        let ctx = context_for(&server, dir.path());
        handle_account(&ctx)
            .await
            .map_err(|err| anyhow::anyhow!(err.display_message()))?;

        user.assert();
        Ok(())
    }

    #[tokio::test]
    async fn rejected_token_exits_as_failure() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let dir = TempDir::new()?;
        server.mock(|when, then| {
            when.method(GET).path("/user");
            then.status(401)
                .json_body(json!({"error": "bad_token", "error_code": 8}));
        });

        let ctx = context_for(&server, dir.path());
        let err = handle_account(&ctx).await.expect_err("token rejected");

        assert_eq!(err.exit_code(), 3);
        assert!(err.display_message().contains("token was rejected"));
        Ok(())
    }

    #[tokio::test]
    async fn status_lists_the_account_once() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let dir = TempDir::new()?;
        let list = server.mock(|when, then| {
            when.method(GET).path("/torrents").query_param("page", "1");
            then.status(200).json_body(json!([
                {"id": "A", "filename": "a", "status": "downloading", "progress": 12.5},
                {"id": "B", "filename": "b", "status": "downloaded", "progress": 100}
            ]));
        });

        let ctx = context_for(&server, dir.path());
        handle_status(&ctx, StatusArgs { limit: Some(5) })
            .await
            .map_err(|err| anyhow::anyhow!(err.display_message()))?;

        list.assert();
        Ok(())
    }

    #[tokio::test]
    async fn hosts_reads_the_status_map() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let dir = TempDir::new()?;
        let hosts = server.mock(|when, then| {
            when.method(GET).path("/hosts/status");
            then.status(200).json_body(json!({
                "uptobox.com": {"name": "Uptobox", "supported": 1, "status": "up"},
                "dead.example": {"name": "Dead", "supported": 0, "status": "down"}
            }));
        });

        let ctx = context_for(&server, dir.path());
        handle_hosts(&ctx, HostsArgs { all: false })
            .await
            .map_err(|err| anyhow::anyhow!(err.display_message()))?;

        hosts.assert();
        Ok(())
    }
}
