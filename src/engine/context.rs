// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Cancellation scope shared by every stage of a chain.

use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a context is done
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("context canceled")]
    Cancelled,
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// A cloneable cancellation token with an optional deadline.
///
/// Derived contexts observe their parent's cancellation and never outlive
/// the parent's deadline. Cancelling a derived context leaves the parent
/// untouched. Clones share the same token.
#[derive(Debug, Clone)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// A root context that is never done unless cancelled
    pub fn background() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
        }
    }

    /// A child that can be cancelled on its own
    pub fn with_cancel(parent: &Context) -> Self {
        Self {
            token: parent.token.child_token(),
            deadline: parent.deadline,
        }
    }

    /// A child that is done `timeout` from now, or earlier if the parent is
    pub fn with_timeout(parent: &Context, timeout: Duration) -> Self {
        Self::with_deadline(parent, Instant::now() + timeout)
    }

    /// A child that is done at `deadline`, or earlier if the parent is
    pub fn with_deadline(parent: &Context, deadline: Instant) -> Self {
        let deadline = match parent.deadline {
            Some(inherited) if inherited < deadline => inherited,
            _ => deadline,
        };
        Self {
            token: parent.token.child_token(),
            deadline: Some(deadline),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// `Some` once the context is done
    pub fn err(&self) -> Option<ContextError> {
        if self.token.is_cancelled() {
            return Some(ContextError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ContextError::DeadlineExceeded),
            _ => None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Resolves once the context is cancelled or its deadline passes
    pub async fn done(&self) -> ContextError {
        match self.deadline {
            Some(deadline) => tokio::select! {
                _ = self.token.cancelled() => ContextError::Cancelled,
                _ = tokio::time::sleep_until(deadline) => ContextError::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                ContextError::Cancelled
            }
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}
