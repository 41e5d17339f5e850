// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for target resolution and execution.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A target is about to be considered for execution.
///
/// # Log Level
/// `debug!`
///
/// # Example
/// ```
/// use pipewright::observability::messages::makefile::TargetExecuting;
/// use pipewright::observability::messages::StructuredLog;
///
/// let msg = TargetExecuting { target: "build" };
/// let _guard = msg.span("target").entered();
/// msg.log();
/// ```
pub struct TargetExecuting<'a> {
    pub target: &'a str,
}

impl Display for TargetExecuting<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "[pipewright:makefile] execute target '{}'", self.target)
    }
}

impl StructuredLog for TargetExecuting<'_> {
    fn log(&self) {
        tracing::debug!(target_name = self.target, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("target", span_name = name, target_name = self.target)
    }
}

/// The target's up-to-date check passed, so its recipe is skipped.
///
/// # Log Level
/// `info!`
pub struct TargetUpToDate<'a> {
    pub target: &'a str,
}

impl Display for TargetUpToDate<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "[pipewright:makefile] target '{}' is up-to-date", self.target)
    }
}

impl StructuredLog for TargetUpToDate<'_> {
    fn log(&self) {
        tracing::info!(target_name = self.target, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("target_up_to_date", span_name = name, target_name = self.target)
    }
}

/// A target's recipe returned an error.
///
/// # Log Level
/// `error!`
pub struct TargetFailed<'a> {
    pub target: &'a str,
    pub error: &'a anyhow::Error,
}

impl Display for TargetFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "[pipewright:makefile] error executing target '{}': {:#}",
            self.target, self.error
        )
    }
}

impl StructuredLog for TargetFailed<'_> {
    fn log(&self) {
        tracing::error!(target_name = self.target, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!("target_failed", span_name = name, target_name = self.target)
    }
}

/// A target's name collides (case-insensitively) with an earlier one and is ignored.
///
/// # Log Level
/// `warn!`
pub struct DuplicateTarget<'a> {
    pub name: &'a str,
    pub index: usize,
}

impl Display for DuplicateTarget<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "[pipewright:makefile] duplicate target '{}' at index {} ignored",
            self.name, self.index
        )
    }
}

impl StructuredLog for DuplicateTarget<'_> {
    fn log(&self) {
        tracing::warn!(name = self.name, index = self.index, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("duplicate_target", span_name = name, name = self.name, index = self.index)
    }
}

/// Running the requested target failed; the program is about to exit with status 1
pub struct RunFailed<'a> {
    pub error: &'a crate::errors::MakeError,
}

impl Display for RunFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "[pipewright:makefile] error running build target: {}", self.error)
    }
}
