// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod files;
mod makefile;
mod pipeline;
mod rebuild;
mod template;

pub use files::{FileAction, FileError};
pub use makefile::MakeError;
pub use pipeline::{PipelineError, StageFailure};
pub use rebuild::RebuildError;
pub use template::TemplateError;
