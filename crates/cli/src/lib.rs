//! binary-intent
//!
//! Command implementations for the `binary-intent` CLI. Each pipeline stage is
//! a function here so it can be exercised directly from tests; `main.rs` only
//! parses arguments and dispatches.

pub mod commands;

pub use commands::util::{canonicalize_or_current, init_logging};
