// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// The filesystem operation that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAction {
    Open,
    Create,
    Copy,
    Stat,
    Remove,
    Symlink,
    ReadDir,
    CreateDir,
    SetPermissions,
}

impl fmt::Display for FileAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            FileAction::Open => "open",
            FileAction::Create => "create",
            FileAction::Copy => "copy",
            FileAction::Stat => "stat",
            FileAction::Remove => "remove",
            FileAction::Symlink => "symlink",
            FileAction::ReadDir => "read directory",
            FileAction::CreateDir => "create directory",
            FileAction::SetPermissions => "set permissions on",
        };
        f.write_str(verb)
    }
}

/// A filesystem helper failed on `path`
#[derive(Debug, Error)]
#[error("unable to {action} {:?}: {source}", .path.display().to_string())]
pub struct FileError {
    pub action: FileAction,
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

impl FileError {
    pub fn new(action: FileAction, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self {
            action,
            path: path.into(),
            source,
        }
    }
}
