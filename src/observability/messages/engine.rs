// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for pipeline lifecycle events.
//!
//! This module contains message types for logging events related to:
//! * Chain construction (stage links)
//! * Process spawn and exit
//! * Wait completion, failure and cancellation
//! * Background reaping of abandoned stages

use crate::engine::{ContextError, StreamKind};
use crate::errors::PipelineError;
use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tracing::Span;

/// A chain is about to spawn its stages.
///
/// # Log Level
/// `debug!` - Routine operational event
///
/// # Example
/// ```
/// use pipewright::observability::messages::engine::PipelineStarting;
///
/// let msg = PipelineStarting {
///     stages: 3,
///     tail: "wc -l",
/// };
///
/// tracing::debug!("{}", msg);
/// ```
pub struct PipelineStarting<'a> {
    pub stages: usize,
    pub tail: &'a str,
}

impl Display for PipelineStarting<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "[pipewright:exec] starting pipeline of {} stage(s) ending in '{}'",
            self.stages, self.tail
        )
    }
}

impl StructuredLog for PipelineStarting<'_> {
    fn log(&self) {
        tracing::debug!(stages = self.stages, tail = self.tail, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "pipeline",
            span_name = name,
            stages = self.stages,
            tail = self.tail,
        )
    }
}

/// A stage was appended to a chain, reading one output of its predecessor.
///
/// `tee` is true when the linked stream has other consumers besides the
/// new stage, so its bytes will be copied rather than handed over as a
/// direct OS pipe.
///
/// # Log Level
/// `debug!` - Construction detail
///
/// # Example
/// ```
/// use pipewright::engine::StreamKind;
/// use pipewright::observability::messages::engine::StageLinked;
///
/// let msg = StageLinked {
///     from: "make",
///     to: "grep",
///     stream: StreamKind::Stderr,
///     tee: true,
/// };
///
/// assert_eq!(msg.to_string(), "[pipewright:exec] linked make stderr -> grep stdin (tee)");
/// ```
pub struct StageLinked<'a> {
    pub from: &'a str,
    pub to: &'a str,
    pub stream: StreamKind,
    pub tee: bool,
}

impl Display for StageLinked<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "[pipewright:exec] linked {} {} -> {} stdin",
            self.from, self.stream, self.to
        )?;
        if self.tee {
            f.write_str(" (tee)")?;
        }
        Ok(())
    }
}

/// A stage's process was created.
///
/// # Log Level
/// `debug!` - Routine operational event
pub struct StageSpawned<'a> {
    pub index: usize,
    pub command: &'a str,
    pub pid: Option<u32>,
}

impl Display for StageSpawned<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self.pid {
            Some(pid) => write!(
                f,
                "[pipewright:exec] stage {} spawned: {} (pid {})",
                self.index, self.command, pid
            ),
            None => write!(f, "[pipewright:exec] stage {} spawned: {}", self.index, self.command),
        }
    }
}

impl StructuredLog for StageSpawned<'_> {
    fn log(&self) {
        tracing::debug!(index = self.index, command = self.command, pid = ?self.pid, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "stage",
            span_name = name,
            index = self.index,
            command = self.command,
            pid = ?self.pid,
        )
    }
}

/// The OS refused to create a stage's process.
///
/// # Log Level
/// `error!` - The chain cannot run
///
/// # Example
/// ```
/// use pipewright::observability::messages::engine::StageSpawnFailed;
///
/// let error = std::io::Error::new(std::io::ErrorKind::NotFound, "No such file or directory");
/// let msg = StageSpawnFailed {
///     index: 1,
///     command: "nonexistent --flag",
///     error: &error,
/// };
///
/// tracing::error!("{}", msg);
/// ```
pub struct StageSpawnFailed<'a> {
    pub index: usize,
    pub command: &'a str,
    pub error: &'a std::io::Error,
}

impl Display for StageSpawnFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "[pipewright:exec] stage {} could not be started: {}: {}",
            self.index, self.command, self.error
        )
    }
}

/// A stage's process exited and all of its output copies completed.
///
/// # Log Level
/// `debug!` - Routine operational event
pub struct StageExited<'a> {
    pub index: usize,
    pub command: &'a str,
    pub code: i32,
    pub duration: Duration,
}

impl Display for StageExited<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "[pipewright:exec] stage {} exited with {} after {:?}: {}",
            self.index, self.code, self.duration, self.command
        )
    }
}

impl StructuredLog for StageExited<'_> {
    fn log(&self) {
        tracing::debug!(
            index = self.index,
            command = self.command,
            code = self.code,
            duration_ms = self.duration.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "stage_exited",
            span_name = name,
            index = self.index,
            code = self.code,
            duration = ?self.duration,
        )
    }
}

/// The chain's context fired before every stage was waited.
///
/// # Log Level
/// `warn!` - The caller stops observing processes that keep running
pub struct WaitInterrupted<'a> {
    pub error: &'a ContextError,
    pub unreaped: usize,
}

impl Display for WaitInterrupted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "[pipewright:exec] wait interrupted ({}); {} stage(s) left to the background reaper",
            self.error, self.unreaped
        )
    }
}

impl StructuredLog for WaitInterrupted<'_> {
    fn log(&self) {
        tracing::warn!(error = %self.error, unreaped = self.unreaped, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "wait_interrupted",
            span_name = name,
            error = %self.error,
            unreaped = self.unreaped,
        )
    }
}

/// Every stage exited successfully.
///
/// # Log Level
/// `debug!` - Routine operational event
///
/// # Example
/// ```
/// use pipewright::observability::messages::engine::PipelineCompleted;
///
/// let msg = PipelineCompleted {
///     stages: 2,
///     exit_codes: &[0, 0],
/// };
///
/// assert_eq!(msg.to_string(), "[pipewright:exec] pipeline of 2 stage(s) completed: exit codes [0, 0]");
/// ```
pub struct PipelineCompleted<'a> {
    pub stages: usize,
    pub exit_codes: &'a [i32],
}

impl Display for PipelineCompleted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "[pipewright:exec] pipeline of {} stage(s) completed: exit codes {:?}",
            self.stages, self.exit_codes
        )
    }
}

impl StructuredLog for PipelineCompleted<'_> {
    fn log(&self) {
        tracing::debug!(stages = self.stages, exit_codes = ?self.exit_codes, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "pipeline_completed",
            span_name = name,
            stages = self.stages,
            exit_codes = ?self.exit_codes,
        )
    }
}

/// At least one stage failed.
///
/// Logged at `debug!` only: the error is returned to the caller, which
/// decides whether it is worth reporting.
pub struct PipelineFailed<'a> {
    pub exit_codes: &'a [i32],
    pub error: &'a PipelineError,
}

impl Display for PipelineFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "[pipewright:exec] pipeline failed with exit codes {:?}: {}",
            self.exit_codes, self.error
        )
    }
}

impl StructuredLog for PipelineFailed<'_> {
    fn log(&self) {
        tracing::debug!(
            exit_codes = ?self.exit_codes,
            failures = self.error.failures().len(),
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "pipeline_failed",
            span_name = name,
            exit_codes = ?self.exit_codes,
        )
    }
}

/// Abandoned stages were handed to a detached reaper task.
///
/// # Log Level
/// `debug!`
pub struct ReaperStarted {
    pub stages: usize,
}

impl Display for ReaperStarted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "[pipewright:exec] reaping {} stage(s) in the background", self.stages)
    }
}

impl StructuredLog for ReaperStarted {
    fn log(&self) {
        tracing::debug!(stages = self.stages, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("reaper", span_name = name, stages = self.stages)
    }
}
