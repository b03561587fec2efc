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
#![allow(clippy::module_name_repetitions)]

//! HTTP client for the Real-Debrid REST API.
//!
//! Layout:
//! - `client.rs`: `RealDebridClient`, request plumbing, error classification
//! - `wire.rs`: JSON payloads and their conversion into domain types

pub mod client;
mod wire;

pub use client::{ClientConfig, ClientError, RealDebridClient};
