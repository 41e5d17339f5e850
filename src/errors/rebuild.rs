// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::path::PathBuf;
use thiserror::Error;

use crate::engine::ContextError;
use crate::errors::{FileError, PipelineError};

/// Errors from the self-rebuild bootstrap
#[derive(Debug, Error)]
pub enum RebuildError {
    #[error("could not determine the current executable: {0}")]
    CurrentExe(#[source] std::io::Error),

    #[error("unable to expand glob {pattern:?}: {source}")]
    Glob {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("failed to stat {}: {source}", .path.display())]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build {}: {source}", .binary.display())]
    Build {
        binary: PathBuf,
        #[source]
        source: PipelineError,
    },

    #[error("failed to run {}: {source}", .binary.display())]
    Run {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to install the rebuilt binary: {0}")]
    Install(#[from] FileError),

    #[error("build command is empty")]
    EmptyBuildCommand,

    #[error("rebuild interrupted: {0}")]
    Cancelled(#[from] ContextError),
}
