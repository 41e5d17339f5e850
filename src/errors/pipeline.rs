// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Errors for pipeline construction, start-up and result collection.

use std::io;
use thiserror::Error;

use crate::engine::{ChainState, ContextError, StreamKind};

/// Errors returned by the pipeline lifecycle operations
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The OS could not create the stage's process (not found, permissions, bad directory)
    #[error("failed to start {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    /// A stream between two stages could not be connected
    #[error("failed to connect {stream} of {command}: {source}")]
    Pipe {
        command: String,
        stream: StreamKind,
        #[source]
        source: io::Error,
    },

    /// A piped stage was given its own stdin reader
    #[error("{command} is piped from its predecessor and cannot also take a caller-supplied stdin")]
    ConflictingStdin { command: String },

    /// A lifecycle operation was called out of order
    #[error("pipeline is {actual}, expected {expected}")]
    InvalidState {
        expected: ChainState,
        actual: ChainState,
    },

    /// The chain's context was cancelled or its deadline passed
    #[error(transparent)]
    Context(#[from] ContextError),

    /// One or more stages failed; carries the tail's command line and diagnostic stderr
    #[error("command failed ({:?}): {}\n{}", .argv, join_failures(.failures), .stderr)]
    ChainFailed {
        argv: Vec<String>,
        failures: Vec<StageFailure>,
        stderr: String,
    },
}

impl PipelineError {
    /// Per-stage failures when the chain ran to completion but failed
    pub fn failures(&self) -> &[StageFailure] {
        match self {
            PipelineError::ChainFailed { failures, .. } => failures,
            _ => &[],
        }
    }

    pub fn is_context(&self) -> bool {
        matches!(self, PipelineError::Context(_))
    }
}

/// Why a single stage is considered failed after it exited
#[derive(Debug, Error)]
pub enum StageFailure {
    #[error("{command}: exit status {code}")]
    ExitStatus { command: String, code: i32 },

    #[error("{command}: terminated by signal {}", signal_name(.signal))]
    Signaled { command: String, signal: Option<i32> },

    #[error("{command}: wait failed: {source}")]
    Wait {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("{command}: stdout is not valid JSON: {source}")]
    Decode {
        command: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{command}: exit hook failed: {message}")]
    Hook { command: String, message: String },
}

impl StageFailure {
    /// Exit code to record for this failure; zero unless the process exited non-zero
    pub fn exit_code(&self) -> i32 {
        match self {
            StageFailure::ExitStatus { code, .. } => *code,
            _ => 0,
        }
    }
}

fn join_failures(failures: &[StageFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

fn signal_name(signal: &Option<i32>) -> String {
    match signal {
        Some(sig) => sig.to_string(),
        None => "(unknown)".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_failed_message_includes_argv_failures_and_stderr() {
        let err = PipelineError::ChainFailed {
            argv: vec!["sh".into(), "-c".into(), "exit 3".into()],
            failures: vec![
                StageFailure::ExitStatus {
                    command: "false".into(),
                    code: 1,
                },
                StageFailure::ExitStatus {
                    command: "sh -c exit 3".into(),
                    code: 3,
                },
            ],
            stderr: "boom".into(),
        };
        let msg = err.to_string();
        assert!(msg.starts_with(r#"command failed (["sh", "-c", "exit 3"]): "#));
        assert!(msg.contains("false: exit status 1\nsh -c exit 3: exit status 3"));
        assert!(msg.ends_with("\nboom"));
        assert_eq!(err.failures().len(), 2);
    }

    #[test]
    fn test_exit_code_of_non_status_failures_is_zero() {
        let signaled = StageFailure::Signaled {
            command: "sleep".into(),
            signal: Some(9),
        };
        assert_eq!(signaled.exit_code(), 0);
        assert_eq!(signaled.to_string(), "sleep: terminated by signal 9");
    }

    #[test]
    fn test_context_errors_are_transparent() {
        let err = PipelineError::from(ContextError::DeadlineExceeded);
        assert!(err.is_context());
        assert_eq!(err.to_string(), ContextError::DeadlineExceeded.to_string());
    }
}
