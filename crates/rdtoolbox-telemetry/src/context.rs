//! Run-scoped context shared by every span of one command invocation.
//!
//! # Design
//! - Each invocation gets a fresh identifier so interleaved log files can be
//!   split per run.
//! - The identifier is recorded on a root span wrapping the whole command.

use std::future::Future;
use std::sync::Arc;

use tracing::Instrument;
use uuid::Uuid;

/// Identifier and command name of the current invocation.
#[derive(Debug, Clone)]
pub struct RunContext {
    run_id: Arc<str>,
    command: Arc<str>,
}

impl RunContext {
    /// Fresh context for `command` with a random identifier.
    #[must_use]
    pub fn new(command: &str) -> Self {
        Self::with_id(command, &Uuid::new_v4().to_string())
    }

    /// Context with a caller-chosen identifier.
    #[must_use]
    pub fn with_id(command: &str, run_id: &str) -> Self {
        Self {
            run_id: Arc::from(run_id),
            command: Arc::from(command),
        }
    }

    /// Run identifier.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Command name.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }
}

/// Execute `fut` inside a root `run` span tagged with `context`.
pub async fn with_run_context<Fut, T>(context: RunContext, fut: Fut) -> T
where
    Fut: Future<Output = T>,
{
    let span = tracing::info_span!(
        "run",
        run_id = %context.run_id,
        command = %context.command
    );
    fut.instrument(span).await
}
