//! Error types for the injection engine.
//!
//! Findings about the scanned code (missing implementations, cycles, malformed
//! declarations) are not errors: they are collected in a
//! [`ValidationReport`](crate::validate::ValidationReport). `Error` covers the
//! conditions that stop a run.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;
use weave_config::ConfigError;

use crate::runtime::RuntimeError;

#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    #[error("configuration error: {0}")]
    #[diagnostic(code(weave::config))]
    Config(#[from] ConfigError),

    #[error("{0}")]
    #[diagnostic(code(weave::runtime))]
    Runtime(#[from] RuntimeError),

    /// Two rewrites of one file touch the same bytes.
    #[error("overlapping edits in {path} at byte {offset}")]
    #[diagnostic(
        code(weave::transform::overlapping_edits),
        help("this is a bug in the transformer; please report the source file")
    )]
    OverlappingEdits { path: String, offset: u32 },

    #[error("invalid exclude pattern '{pattern}': {reason}")]
    #[diagnostic(code(weave::scan::invalid_pattern))]
    InvalidPattern { pattern: String, reason: String },

    #[error("failed to serialize manifest: {0}")]
    #[diagnostic(code(weave::manifest))]
    Manifest(#[from] serde_json::Error),

    #[error("file watcher error: {0}")]
    #[diagnostic(code(weave::watch))]
    Watch(#[from] notify::Error),

    #[error("watch root does not exist: {}", .0.display())]
    #[diagnostic(code(weave::watch::root_not_found))]
    WatchRootNotFound(PathBuf),

    #[error("failed to build worker pool: {0}")]
    #[diagnostic(code(weave::scan::worker_pool))]
    WorkerPool(String),
}

impl Error {
    pub fn invalid_pattern(pattern: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
