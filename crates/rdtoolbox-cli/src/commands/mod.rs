//! Command handlers grouped by concern.

pub(crate) mod account;
pub(crate) mod dedupe;
pub(crate) mod pipeline;
pub(crate) mod renew;
