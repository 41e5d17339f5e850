// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for the self-rebuild bootstrap.
//!
//! All of these are `debug!` events except [`SignalRelayed`], which is
//! `info!` because it changes what the user sees in their terminal.

use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub struct RebuildDisabled;

impl Display for RebuildDisabled {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        f.write_str("[pipewright:rebuild] rebuild disabled")
    }
}

/// The running executable is not the expected build script binary
pub struct BinaryNameMismatch<'a> {
    pub name: &'a str,
    pub expected: &'a str,
}

impl Display for BinaryNameMismatch<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "[pipewright:rebuild] running as '{}', expected '{}'",
            self.name, self.expected
        )
    }
}

pub struct GlobExpanded<'a> {
    pub pattern: &'a str,
    pub matches: &'a [PathBuf],
}

impl Display for GlobExpanded<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "[pipewright:rebuild] glob {} matched {} path(s)",
            self.pattern,
            self.matches.len()
        )
    }
}

pub struct CheckingFreshness<'a> {
    pub binary: &'a Path,
    pub sources: usize,
}

impl Display for CheckingFreshness<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "[pipewright:rebuild] testing {} against {} source(s)",
            self.binary.display(),
            self.sources
        )
    }
}

/// The build artifact was copied over the binary that will run next
pub struct ArtifactInstalled<'a> {
    pub artifact: &'a Path,
    pub binary: &'a Path,
}

impl Display for ArtifactInstalled<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "[pipewright:rebuild] installed {} as {}",
            self.artifact.display(),
            self.binary.display()
        )
    }
}

pub struct Rebuilding<'a> {
    pub binary: &'a Path,
    pub command: &'a [String],
}

impl Display for Rebuilding<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "[pipewright:rebuild] rebuilding {} with '{}'",
            self.binary.display(),
            self.command.join(" ")
        )
    }
}

pub struct Delegating<'a> {
    pub binary: &'a Path,
}

impl Display for Delegating<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "[pipewright:rebuild] executing {}", self.binary.display())
    }
}

pub struct BinaryUpToDate<'a> {
    pub binary: &'a Path,
}

impl Display for BinaryUpToDate<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "[pipewright:rebuild] {} is up to date", self.binary.display())
    }
}

/// A signal received by this process was forwarded to the build
pub struct SignalRelayed<'a> {
    pub signal: &'a str,
    pub pid: u32,
}

impl Display for SignalRelayed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "[pipewright:rebuild] relayed {} to build process {}", self.signal, self.pid)
    }
}
