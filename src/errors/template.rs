// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::path::PathBuf;
use thiserror::Error;

use crate::errors::FileError;

/// Errors from parsing, rendering and writing templates
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("unable to read template file {:?}: {source}", .path.display().to_string())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to parse template {name}: {source}")]
    Parse {
        name: String,
        #[source]
        source: handlebars::TemplateError,
    },

    #[error("unable to execute template: {0}")]
    Render(#[from] handlebars::RenderError),

    #[error(transparent)]
    File(#[from] FileError),
}
