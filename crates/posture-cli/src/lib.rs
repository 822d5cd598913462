//! # posture-cli
//!
//! Command-line interface for the posture local security auditor.
//!
//! ## Features
//!
//! - **Checks**: runs the built-in catalogue with live progress
//! - **Status**: shows the last recorded results without running anything
//! - **Root helper**: socket-activated one-shot helper for privileged checks
//! - **Multiple output formats**: Pretty, JSON, YAML

pub mod cli;
pub mod config;
pub mod output;

pub use cli::run;
