// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Build orchestration: chains of external processes, make-style targets
//! with staleness checks, and build scripts that rebuild themselves.
//!
//! ```no_run
//! use pipewright::config::with_stdout;
//! use pipewright::engine::{Context, Pipeline, SharedBuffer};
//!
//! # async fn demo() -> Result<(), pipewright::errors::PipelineError> {
//! let ctx = Context::background();
//! let out = SharedBuffer::new();
//! let mut chain = Pipeline::exec(&ctx, "echo", ["hello"])
//!     .pipe_opt(with_stdout(out.clone()), "tr", ["a-z", "A-Z"])?;
//! chain.run().await?;
//! assert_eq!(out.to_string_lossy(), "HELLO\n");
//! # Ok(())
//! # }
//! ```

pub mod config;        // exec options + environment settings
pub mod engine;        // pipeline construction and lifecycle
pub mod errors;        // error handling
pub mod makefile;      // named targets
pub mod observability;
pub mod rebuild;       // self-rebuild bootstrap
pub mod template;      // generated files
pub mod traits;        // hook and recipe abstractions
pub mod utils;         // file helpers
