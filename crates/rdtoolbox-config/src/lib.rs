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

//! File-backed configuration for the toolbox.
//!
//! Layout: `model.rs` (raw document and validated settings), `defaults.rs`
//! (fallback values), `loader.rs` (file discovery and override layering),
//! `validate.rs` (range and format checks), `error.rs` (`ConfigError`).

pub mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{DEFAULT_CONFIG_FILE, Overrides, load_raw, load_settings};
pub use model::{FileSelectionConfig, RawConfig, RetryConfig, Settings};
pub use validate::{build_settings, renewal_url};
