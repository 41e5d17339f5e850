// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observability module for structured logging.
//!
//! The library itself only emits `tracing` events; it never installs a
//! subscriber. Build scripts that want the familiar one-line-per-event
//! output call [`logger::init`] once at start-up with their [`Settings`].
//!
//! Message types follow a struct-based pattern with `Display` so wording
//! lives in one place:
//!
//! * `messages::engine` - pipeline spawn, wait and cancellation events
//! * `messages::stage` - stream copy and exit hook events
//! * `messages::makefile` - target execution events
//! * `messages::rebuild` - self-rebuild bootstrap events
//!
//! # Usage
//!
//! ```rust
//! use pipewright::config::Settings;
//! use pipewright::observability::logger;
//! use pipewright::observability::messages::makefile::TargetUpToDate;
//!
//! logger::init(&Settings::from_env());
//! tracing::info!("{}", TargetUpToDate { target: "docs" });
//! ```
//!
//! [`Settings`]: crate::config::Settings

pub mod logger;
pub mod messages;
