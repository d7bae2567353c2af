//! # board-core
//!
//! Core types for the project board exporter.
//!
//! A board is a tree: project → columns → cards. Every refresh cycle builds
//! the tree from scratch, derives per-column state from it and throws it
//! away once the exposition text has been rendered.
//!
//! ## Core Paradigm
//!
//! - Issue counts are derived from cards, never stored
//! - Limits come from configuration, keyed by column name
//! - Only the rendered text survives between cycles

pub mod config;
mod error;
mod types;

pub use config::ExporterConfig;
pub use error::{BoardError, Result};
pub use types::*;
