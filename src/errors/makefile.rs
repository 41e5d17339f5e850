// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

/// Errors raised while resolving or running make targets
#[derive(Debug, Error)]
pub enum MakeError {
    /// No target matches the name (case-insensitive)
    #[error("unknown target: {0}")]
    UnknownTarget(String),

    /// The makefile has no targets at all
    #[error("no targets defined")]
    NoTargets,

    /// A target's recipe returned an error
    #[error("target '{target}' failed: {source:#}")]
    Recipe {
        target: String,
        #[source]
        source: anyhow::Error,
    },

    /// Help text could not be written
    #[error("unable to write help: {0}")]
    Help(#[from] std::io::Error),
}
