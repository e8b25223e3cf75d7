//! # Engine Module
//!
//! Shared plumbing for every analysis: the immutable [`config::AnalysisConfig`]
//! passed to each component, the [`error::AnalysisError`] taxonomy, and the
//! [`progress`] reporting hooks used by long-running steps.

pub mod config;
pub mod error;
pub mod progress;
