//! # board-source
//!
//! Where board data comes from.
//!
//! This crate provides:
//! - The [`DataSource`] capability the aggregation engine is written against
//! - [`GithubSource`], the GitHub REST implementation
//! - [`MockSource`], canned responses for tests
//! - [`wire`], the mapping from API payloads to domain types

mod github;
mod source;
pub mod wire;

pub use github::GithubSource;
pub use source::{DataSource, MockSource};
