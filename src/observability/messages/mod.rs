// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging.
//!
//! Every diagnostic line the library emits is a small struct implementing
//! `Display`, so wording lives in one place and call sites stay free of
//! string literals. Messages that carry useful fields also implement
//! [`StructuredLog`], which emits the event at its designated level with
//! those fields attached.
//!
//! # Organization
//!
//! * `engine` - chain construction, spawn, wait and cancellation events
//! * `stage` - stream copying and exit hook events for a single stage
//! * `makefile` - target resolution and execution events
//! * `rebuild` - self-rebuild bootstrap events
//! * `template` - generated file events
//!
//! # Usage Pattern
//!
//! ```rust
//! use pipewright::observability::messages::engine::StageLinked;
//! use pipewright::engine::StreamKind;
//!
//! let msg = StageLinked {
//!     from: "git",
//!     to: "wc",
//!     stream: StreamKind::Stdout,
//!     tee: false,
//! };
//!
//! tracing::debug!("{}", msg);
//! ```

use tracing::Span;

pub mod engine;
pub mod makefile;
pub mod rebuild;
pub mod stage;
pub mod template;

/// A message that knows its own level and structured fields
pub trait StructuredLog {
    /// Emit the message as a `tracing` event
    fn log(&self);

    /// A span carrying the message's fields, for work nested under the event
    fn span(&self, name: &str) -> Span;
}
