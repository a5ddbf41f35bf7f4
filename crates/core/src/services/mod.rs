//! Pipeline stages: discovery, tool invocation, feature extraction,
//! suggestion scoring, and dataset building.

pub mod dataset;
pub mod discovery;
pub mod features;
pub mod suggest;
pub mod tools;
