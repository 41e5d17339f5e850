// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Self-rebuild bootstrap for build scripts.
//!
//! A build script written with this crate is itself a compiled program, so
//! editing it has no effect until it is rebuilt. [`Rebuilder::ensure_fresh`]
//! runs first thing in `main`: when the script's sources are newer than the
//! running executable it rebuilds the executable, runs the new one with the
//! same arguments and reports its exit code, which the caller should exit
//! with.
//!
//! Cargo leaves the binary under its target directory, so after a build the
//! artifact is copied to wherever the next run expects it: over the running
//! executable, or into the install directory when the script was started
//! under another name.
//!
//! ```no_run
//! use pipewright::config::Settings;
//! use pipewright::engine::Context;
//! use pipewright::rebuild::{RebuildOutcome, Rebuilder};
//!
//! # async fn demo() -> Result<std::process::ExitCode, pipewright::errors::RebuildError> {
//! let rebuilder = Rebuilder::new("build", Settings::from_env())
//!     .sources([concat!(env!("CARGO_MANIFEST_DIR"), "/src/**/*.rs")]);
//! match rebuilder.ensure_fresh(&Context::background()).await? {
//!     RebuildOutcome::Continue => {}
//!     RebuildOutcome::Delegated(code) => return Ok(std::process::ExitCode::from(code as u8)),
//! }
//! # Ok(std::process::ExitCode::SUCCESS)
//! # }
//! ```

mod signals;

use std::io;
use std::path::{Path, PathBuf};
use tokio::process::Command;

use crate::config::consts::{ENV_REBUILD_DISABLE, EXIT_CODE_UNKNOWN};
use crate::config::{combine_options, with_stderr, with_stdout, Settings};
use crate::engine::{Context, Pipeline};
use crate::errors::RebuildError;
use crate::errors::{FileAction, FileError};
use crate::observability::messages::rebuild::{
    ArtifactInstalled, BinaryNameMismatch, BinaryUpToDate, CheckingFreshness, Delegating, GlobExpanded,
    RebuildDisabled, Rebuilding,
};
use crate::utils::files::{absolute_from, copy_file, target_needs_update};
use signals::SignalRelay;

/// What the caller should do after [`Rebuilder::ensure_fresh`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildOutcome {
    /// The running executable is current; carry on
    Continue,
    /// A fresh executable already ran with our arguments; exit with its code
    Delegated(i32),
}

/// Rebuild-and-reexec configuration for one build script binary
#[derive(Debug, Clone)]
pub struct Rebuilder {
    binary_name: String,
    build_command: Vec<String>,
    artifact: Option<PathBuf>,
    install_dir: PathBuf,
    sources: Vec<String>,
    settings: Settings,
}

impl Rebuilder {
    /// Defaults to building with `cargo build --bin <binary_name>`, taking the
    /// result from `$CARGO_TARGET_DIR/debug` (or `target/debug`), installing
    /// into the working directory, and no sources
    pub fn new(binary_name: impl Into<String>, settings: Settings) -> Self {
        let binary_name = binary_name.into();
        let build_command = vec![
            "cargo".to_string(),
            "build".to_string(),
            "--bin".to_string(),
            binary_name.clone(),
        ];
        let target_dir = std::env::var_os("CARGO_TARGET_DIR")
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("target"));
        let artifact = target_dir
            .join("debug")
            .join(format!("{}{}", binary_name, std::env::consts::EXE_SUFFIX));
        Self {
            binary_name,
            build_command,
            artifact: Some(artifact),
            install_dir: PathBuf::from("."),
            sources: Vec::new(),
            settings,
        }
    }

    /// Glob patterns of the files the binary is built from.
    ///
    /// Relative patterns are resolved against the executable's directory.
    pub fn sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sources = sources.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the build command (program followed by its arguments)
    pub fn build_command<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.build_command = command.into_iter().map(Into::into).collect();
        self
    }

    /// Where the build command leaves the binary; relative paths are taken
    /// from the working directory
    pub fn artifact(mut self, path: impl Into<PathBuf>) -> Self {
        self.artifact = Some(path.into());
        self
    }

    /// The build command writes the binary to its final path itself
    pub fn no_artifact(mut self) -> Self {
        self.artifact = None;
        self
    }

    /// Directory holding the expected binary when the script runs under another name
    pub fn install_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.install_dir = dir.into();
        self
    }

    /// File name of the expected executable, with the platform suffix
    fn file_name(&self) -> String {
        format!("{}{}", self.binary_name, std::env::consts::EXE_SUFFIX)
    }

    /// Make sure the running executable is built from the current sources.
    ///
    /// When the process was not started as the expected binary (for example
    /// through `cargo run` under another name), the expected binary in the
    /// install directory is built if missing, or run in our place otherwise.
    pub async fn ensure_fresh(&self, ctx: &Context) -> Result<RebuildOutcome, RebuildError> {
        if self.settings.rebuild_disabled {
            tracing::debug!("{}", RebuildDisabled);
            return Ok(RebuildOutcome::Continue);
        }

        let binary = std::env::current_exe().map_err(RebuildError::CurrentExe)?;
        let name = binary
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let expected_name = self.file_name();

        if name != expected_name {
            tracing::debug!(
                "{}",
                BinaryNameMismatch {
                    name: &name,
                    expected: &expected_name,
                }
            );
            let expected = self.install_dir.join(&expected_name);
            return match std::fs::metadata(&expected) {
                Ok(_) => self.delegate(ctx, &expected).await,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    self.rebuild(ctx, &expected).await?;
                    Ok(RebuildOutcome::Continue)
                }
                Err(source) => Err(RebuildError::Stat {
                    path: expected,
                    source,
                }),
            };
        }

        let base = binary.parent().unwrap_or_else(|| Path::new("."));
        let sources = self.normalize_sources(base)?;
        tracing::debug!(
            "{}",
            CheckingFreshness {
                binary: &binary,
                sources: sources.len(),
            }
        );
        if target_needs_update(&binary, &sources) {
            self.rebuild(ctx, &binary).await?;
            return self.delegate(ctx, &binary).await;
        }
        tracing::debug!("{}", BinaryUpToDate { binary: &binary });
        Ok(RebuildOutcome::Continue)
    }

    /// Absolute, glob-expanded source list, each entry escaped so it matches only itself
    fn normalize_sources(&self, base: &Path) -> Result<Vec<String>, RebuildError> {
        let mut out = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            let absolute = absolute_from(base, source).to_string_lossy().into_owned();
            if !absolute.contains('*') {
                out.push(glob::Pattern::escape(&absolute));
                continue;
            }
            let paths = glob::glob(&absolute).map_err(|source| RebuildError::Glob {
                pattern: absolute.clone(),
                source,
            })?;
            let matches: Vec<PathBuf> = paths.flatten().collect();
            tracing::debug!(
                "{}",
                GlobExpanded {
                    pattern: &absolute,
                    matches: &matches,
                }
            );
            out.extend(
                matches
                    .iter()
                    .map(|path| glob::Pattern::escape(&path.to_string_lossy())),
            );
        }
        Ok(out)
    }

    /// Run the build command with its output on ours, relaying termination signals
    async fn rebuild(&self, ctx: &Context, binary: &Path) -> Result<(), RebuildError> {
        let (program, args) = self
            .build_command
            .split_first()
            .ok_or(RebuildError::EmptyBuildCommand)?;
        tracing::debug!(
            "{}",
            Rebuilding {
                binary,
                command: &self.build_command,
            }
        );

        let mut build = Pipeline::exec_opt(
            ctx,
            combine_options(vec![with_stdout(tokio::io::stdout()), with_stderr(tokio::io::stderr())]),
            program.as_str(),
            args.iter().cloned(),
        );
        let failed = |source| RebuildError::Build {
            binary: binary.to_path_buf(),
            source,
        };
        build.start().map_err(failed)?;
        let relay = SignalRelay::start(build.pids());
        let waited = build.wait().await;
        drop(relay);
        waited.map_err(failed)?;
        self.install(binary)
    }

    /// Copy the build artifact over `binary` unless the build already wrote it there
    fn install(&self, binary: &Path) -> Result<(), RebuildError> {
        let Some(artifact) = &self.artifact else {
            return Ok(());
        };
        if same_file(artifact, binary) {
            return Ok(());
        }
        // unlinking first lets a running executable be replaced
        match std::fs::remove_file(binary) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(FileError::new(FileAction::Remove, binary, e).into()),
        }
        copy_file(binary, artifact, None)?;
        tracing::debug!("{}", ArtifactInstalled { artifact, binary });
        Ok(())
    }

    /// Run `binary` with our arguments and rebuilds disabled, inheriting stdio
    async fn delegate(&self, ctx: &Context, binary: &Path) -> Result<RebuildOutcome, RebuildError> {
        tracing::debug!("{}", Delegating { binary });
        let mut child = Command::new(binary)
            .args(std::env::args_os().skip(1))
            .env(ENV_REBUILD_DISABLE, "1")
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RebuildError::Run {
                binary: binary.to_path_buf(),
                source,
            })?;

        let status = tokio::select! {
            status = child.wait() => status.map_err(|source| RebuildError::Run {
                binary: binary.to_path_buf(),
                source,
            })?,
            error = ctx.done() => return Err(error.into()),
        };
        Ok(RebuildOutcome::Delegated(
            status.code().unwrap_or(EXIT_CODE_UNKNOWN),
        ))
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
