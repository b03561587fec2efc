#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Logging setup and run-scoped tracing context for the toolbox.
//!
//! Layout: `init.rs` (subscriber installation and formats), `context.rs`
//! (per-invocation run identifiers carried by spans).

pub mod context;
pub mod init;

pub use context::{RunContext, with_run_context};
pub use init::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, init_logging};
