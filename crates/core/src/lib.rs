//! intent-core
//!
//! Core library for building a binary-intent training dataset.
//!
//! This crate holds the data model, pipeline configuration, directory
//! discovery, external-tool feature extraction, the JSON artifact stores, the
//! dataset join, and the interactive labeling state machine.
//!
//! The goal is to keep all substantive logic here so it is fully testable and
//! reusable from multiple frontends; the CLI only wires stages to artifacts.

pub mod config;
pub mod labeling;
pub mod model;
pub mod services;
pub mod store;

/// Returns the library version as encoded at compile time.
///
/// Useful for tests and for frontends to report consistent version info.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
