// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt::{Display, Formatter};
use std::path::Path;

pub struct TemplateWritten<'a> {
    pub target: &'a Path,
}

impl Display for TemplateWritten<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "[pipewright:template] wrote {}", self.target.display())
    }
}

/// Rendering failed part way; the partial output file was removed
pub struct PartialOutputRemoved<'a> {
    pub target: &'a Path,
    pub error: &'a dyn std::error::Error,
}

impl Display for PartialOutputRemoved<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "[pipewright:template] removed partial {}: {}",
            self.target.display(),
            self.error
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_written_message() {
        let msg = TemplateWritten {
            target: Path::new("docs/index.md"),
        };
        assert_eq!(msg.to_string(), "[pipewright:template] wrote docs/index.md");
    }
}
