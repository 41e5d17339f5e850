// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for a single stage's stream copies and exit hooks.

use crate::errors::StageFailure;
use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A tee consumer failed to accept bytes and was removed.
///
/// Usually a downstream stage that exited before reading all of its input,
/// so this is `debug!` rather than a warning.
pub struct TeeSinkDropped<'a> {
    pub origin: &'a str,
    pub sink: &'a str,
    pub error: &'a std::io::Error,
}

impl Display for TeeSinkDropped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "[pipewright:tee] dropping '{}' consumer of {}: {}",
            self.sink, self.origin, self.error
        )
    }
}

impl StructuredLog for TeeSinkDropped<'_> {
    fn log(&self) {
        tracing::debug!(origin = self.origin, sink = self.sink, error = %self.error, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("tee_sink_dropped", span_name = name, origin = self.origin, sink = self.sink)
    }
}

/// A tee reached EOF on its source.
pub struct TeeFinished<'a> {
    pub origin: &'a str,
    pub bytes: u64,
    pub sinks: usize,
}

impl Display for TeeFinished<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "[pipewright:tee] {} finished: {} bytes to {} consumer(s)",
            self.origin, self.bytes, self.sinks
        )
    }
}

/// A post-exit hook reported a failure; it is added to the chain's failures.
///
/// # Log Level
/// `warn!`
pub struct ExitHookFailed<'a> {
    pub command: &'a str,
    pub failure: &'a StageFailure,
}

impl Display for ExitHookFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "[pipewright:exec] exit hook of '{}' failed: {}", self.command, self.failure)
    }
}

/// Lenient JSON decoding ignored a stage's stdout
pub struct JsonDecodeSkipped<'a> {
    pub command: &'a str,
    pub error: &'a serde_json::Error,
}

impl Display for JsonDecodeSkipped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "[pipewright:exec] ignoring undecodable stdout of '{}': {}",
            self.command, self.error
        )
    }
}

/// Copying a caller-supplied reader into a stage's stdin stopped early
pub struct StdinFeedFailed<'a> {
    pub command: &'a str,
    pub error: &'a std::io::Error,
}

impl Display for StdinFeedFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "[pipewright:exec] feeding stdin of '{}' stopped: {}", self.command, self.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_hook_failed_includes_failure() {
        let failure = StageFailure::Hook {
            command: "jq".into(),
            message: "missing field".into(),
        };
        let msg = ExitHookFailed {
            command: "jq",
            failure: &failure,
        };
        assert_eq!(
            msg.to_string(),
            "[pipewright:exec] exit hook of 'jq' failed: jq: exit hook failed: missing field"
        );
    }
}
