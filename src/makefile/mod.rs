// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Make-style command line entry point for build scripts.
//!
//! A [`Makefile`] is a flat list of named [`MakeTarget`]s. The first command
//! line argument picks the target to run (the default target when absent),
//! the remaining arguments are handed to it through
//! [`Makefile::target_args`]. Recipes pull in their prerequisites explicitly
//! with [`Makefile::depend`]; there is no dependency graph and nothing is
//! memoized, so a target named twice runs twice.
//!
//! ```no_run
//! use pipewright::engine::Context;
//! use pipewright::makefile::{MakeTarget, Makefile};
//! use pipewright::traits::recipe_fn;
//!
//! # async fn demo() -> std::process::ExitCode {
//! let makefile = Makefile::new([
//!     MakeTarget::new("build", recipe_fn(|_ctx, _mf| Box::pin(async { anyhow::Ok(()) })))
//!         .desc("Compile everything")
//!         .as_default(),
//!     MakeTarget::new("release", recipe_fn(|ctx, mf| {
//!         Box::pin(async move {
//!             mf.depend(ctx, &["build"]).await?;
//!             anyhow::Ok(())
//!         })
//!     })),
//! ]);
//! makefile.run_main(&Context::background()).await
//! # }
//! ```

mod target;

pub use target::{file_up_to_date, MakeTarget, UpToDate};

use std::collections::HashSet;
use std::io;
use std::path::Path;
use std::process::ExitCode;

use crate::engine::Context;
use crate::errors::MakeError;
use crate::observability::messages::makefile::{DuplicateTarget, RunFailed};
use crate::observability::messages::StructuredLog;

const HELP_FLAG: &str = "-help";

/// Named targets plus the command line that selects among them
pub struct Makefile {
    program: String,
    args: Vec<String>,
    targets: Vec<MakeTarget>,
    default_index: usize,
}

impl Makefile {
    /// Targets selected by the current process's command line
    pub fn new(targets: impl IntoIterator<Item = MakeTarget>) -> Self {
        let mut argv = std::env::args();
        let program = argv.next().unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string());
        Self::with_args(program, argv, targets)
    }

    /// Targets selected by an explicit program name and argument list
    pub fn with_args<A, S>(program: impl Into<String>, args: A, targets: impl IntoIterator<Item = MakeTarget>) -> Self
    where
        A: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut makefile = Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            targets: targets.into_iter().collect(),
            default_index: 0,
        };
        makefile.normalize();
        makefile
    }

    /// Add targets; names already present (ignoring case) are dropped
    pub fn add(&mut self, targets: impl IntoIterator<Item = MakeTarget>) {
        self.targets.extend(targets);
        self.normalize();
    }

    /// Target with the given name, ignoring case
    pub fn find(&self, name: &str) -> Option<&MakeTarget> {
        self.targets
            .iter()
            .find(|target| target.name().eq_ignore_ascii_case(name))
    }

    /// Targets in listing order: default first, then by name
    pub fn targets(&self) -> &[MakeTarget] {
        &self.targets
    }

    pub fn default_target(&self) -> Option<&MakeTarget> {
        self.targets.get(self.default_index)
    }

    /// Arguments following the target name on the command line
    pub fn target_args(&self) -> &[String] {
        self.args.get(1..).unwrap_or_default()
    }

    /// Run the named targets one after another.
    ///
    /// Every name is resolved before anything runs, so a typo fails fast
    /// with [`MakeError::UnknownTarget`]. Execution stops at the first
    /// failing target.
    pub async fn depend<S: AsRef<str>>(&self, ctx: &Context, names: &[S]) -> Result<(), MakeError> {
        let targets = names
            .iter()
            .map(|name| {
                self.find(name.as_ref())
                    .ok_or_else(|| MakeError::UnknownTarget(name.as_ref().to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        for target in targets {
            target.execute(ctx, self).await?;
        }
        Ok(())
    }

    /// Run whatever the command line asks for.
    ///
    /// No arguments runs the default target, `-help` lists the targets,
    /// `-help <target>` describes one, anything else names the target to run.
    pub async fn run(&self, ctx: &Context) -> Result<(), MakeError> {
        match self.args.first().map(String::as_str) {
            None => {
                let target = self.default_target().ok_or(MakeError::NoTargets)?;
                target.execute(ctx, self).await
            }
            Some(HELP_FLAG) => self.show_help(),
            Some(name) => {
                let target = self
                    .find(name)
                    .ok_or_else(|| MakeError::UnknownTarget(name.to_string()))?;
                target.execute(ctx, self).await
            }
        }
    }

    /// [`Makefile::run`] for use as a `main` return value: errors are logged
    /// and turned into exit status 1
    pub async fn run_main(&self, ctx: &Context) -> ExitCode {
        match self.run(ctx).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(error) => {
                tracing::error!("{}", RunFailed { error: &error });
                ExitCode::FAILURE
            }
        }
    }

    fn show_help(&self) -> Result<(), MakeError> {
        let mut out = io::stdout().lock();
        match self.target_args().first() {
            Some(name) => {
                let target = self
                    .find(name)
                    .ok_or_else(|| MakeError::UnknownTarget(name.clone()))?;
                tracing::debug!(target_name = target.name(), "[pipewright:makefile] show help");
                target.write_help(self.program_name(), &mut out)?;
            }
            None => self.write_help(&mut out)?,
        }
        Ok(())
    }

    /// Write the target listing; `*` marks the default target
    pub fn write_help<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        let width = self
            .targets
            .iter()
            .filter(|target| !target.is_hidden())
            .map(|target| target.name().len())
            .max()
            .unwrap_or(0);

        writeln!(out, "Usage: {} [{}] [target]", self.program_name(), HELP_FLAG)?;
        writeln!(out, "Targets:")?;
        for (index, target) in self.targets.iter().enumerate() {
            if target.is_hidden() {
                continue;
            }
            let marker = if index == self.default_index { '*' } else { ' ' };
            writeln!(
                out,
                "{} {:<width$}   {}",
                marker,
                target.name(),
                target.description(),
                width = width
            )?;
        }
        writeln!(out)?;
        writeln!(out, "* (default target)")
    }

    fn program_name(&self) -> &str {
        Path::new(&self.program)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(&self.program)
    }

    fn normalize(&mut self) {
        let mut seen = HashSet::new();
        let mut index = 0;
        self.targets.retain(|target| {
            let name = target.name().to_lowercase();
            let keep = seen.insert(name.clone());
            if !keep {
                DuplicateTarget { name: &name, index }.log();
            }
            index += 1;
            keep
        });
        // stable: among several defaults the first declared stays first
        self.targets.sort_by(|a, b| {
            b.is_default()
                .cmp(&a.is_default())
                .then_with(|| a.name().cmp(b.name()))
        });
        self.default_index = self
            .targets
            .iter()
            .position(MakeTarget::is_default)
            .unwrap_or(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{recipe_fn, Recipe};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    type Journal = Arc<Mutex<Vec<String>>>;

    fn recording(journal: &Journal, label: &'static str) -> Arc<dyn Recipe> {
        let journal = Arc::clone(journal);
        recipe_fn(move |_ctx, mf| {
            let journal = Arc::clone(&journal);
            let args = mf.target_args().join(",");
            Box::pin(async move {
                let entry = if args.is_empty() {
                    label.to_string()
                } else {
                    format!("{}({})", label, args)
                };
                journal.lock().unwrap().push(entry);
                anyhow::Ok(())
            })
        })
    }

    fn failing(message: &'static str) -> Arc<dyn Recipe> {
        recipe_fn(move |_ctx, _mf| Box::pin(async move { Err::<(), _>(anyhow::anyhow!(message)) }))
    }

    fn entries(journal: &Journal) -> Vec<String> {
        journal.lock().unwrap().clone()
    }

    fn makefile(args: &[&str], targets: Vec<MakeTarget>) -> Makefile {
        Makefile::with_args("/usr/local/bin/build", args.iter().copied(), targets)
    }

    #[test]
    fn test_normalize_drops_duplicates_and_orders_default_first() {
        let journal = Journal::default();
        let mf = makefile(
            &[],
            vec![
                MakeTarget::new("zeta", recording(&journal, "zeta")),
                MakeTarget::new("Alpha", recording(&journal, "alpha")),
                MakeTarget::new("beta", recording(&journal, "beta")).as_default(),
                MakeTarget::new("ALPHA", recording(&journal, "dup")),
            ],
        );
        let names: Vec<&str> = mf.targets().iter().map(MakeTarget::name).collect();
        assert_eq!(names, vec!["beta", "Alpha", "zeta"]);
        assert_eq!(mf.default_target().map(MakeTarget::name), Some("beta"));
        assert_eq!(mf.find("alpha").map(MakeTarget::name), Some("Alpha"));
        assert!(mf.find("gamma").is_none());
    }

    #[test]
    fn test_add_keeps_existing_name() {
        let journal = Journal::default();
        let mut mf = makefile(&[], vec![MakeTarget::new("build", recording(&journal, "first"))]);
        mf.add([
            MakeTarget::new("BUILD", recording(&journal, "second")),
            MakeTarget::new("clean", recording(&journal, "clean")),
        ]);
        assert_eq!(mf.targets().len(), 2);
        assert_eq!(mf.default_target().map(MakeTarget::name), Some("build"));
    }

    #[tokio::test]
    async fn test_run_without_args_runs_default() {
        let journal = Journal::default();
        let mf = makefile(
            &[],
            vec![
                MakeTarget::new("a", recording(&journal, "a")),
                MakeTarget::new("b", recording(&journal, "b")).as_default(),
            ],
        );
        mf.run(&Context::background()).await.unwrap();
        assert_eq!(entries(&journal), vec!["b"]);
    }

    #[tokio::test]
    async fn test_run_named_target_sees_remaining_args() {
        let journal = Journal::default();
        let mf = makefile(
            &["Deploy", "staging", "--dry-run"],
            vec![MakeTarget::new("deploy", recording(&journal, "deploy"))],
        );
        mf.run(&Context::background()).await.unwrap();
        assert_eq!(entries(&journal), vec!["deploy(staging,--dry-run)"]);
    }

    #[tokio::test]
    async fn test_run_unknown_target_and_empty_makefile() {
        let mf = makefile(&["nope"], Vec::new());
        assert!(matches!(
            mf.run(&Context::background()).await,
            Err(MakeError::UnknownTarget(name)) if name == "nope"
        ));
        let empty = makefile(&[], Vec::new());
        assert!(matches!(empty.run(&Context::background()).await, Err(MakeError::NoTargets)));
    }

    #[tokio::test]
    async fn test_depend_resolves_every_name_before_running() {
        let journal = Journal::default();
        let mf = makefile(&[], vec![MakeTarget::new("a", recording(&journal, "a"))]);
        let err = mf
            .depend(&Context::background(), &["a", "missing"])
            .await
            .unwrap_err();
        assert!(matches!(err, MakeError::UnknownTarget(name) if name == "missing"));
        assert!(entries(&journal).is_empty());
    }

    #[tokio::test]
    async fn test_depend_runs_in_order_and_stops_at_first_failure() {
        let journal = Journal::default();
        let mf = makefile(
            &[],
            vec![
                MakeTarget::new("one", recording(&journal, "one")),
                MakeTarget::new("two", failing("two broke")),
                MakeTarget::new("three", recording(&journal, "three")),
            ],
        );
        let err = mf
            .depend(&Context::background(), &["one", "two", "three", "one"])
            .await
            .unwrap_err();
        assert_eq!(entries(&journal), vec!["one"]);
        assert_eq!(err.to_string(), "target 'two' failed: two broke");
    }

    #[tokio::test]
    async fn test_depend_does_not_memoize() {
        let journal = Journal::default();
        let mf = makefile(&[], vec![MakeTarget::new("gen", recording(&journal, "gen"))]);
        mf.depend(&Context::background(), &["gen", "GEN"]).await.unwrap();
        assert_eq!(entries(&journal), vec!["gen", "gen"]);
    }

    #[tokio::test]
    async fn test_recipe_can_depend_on_other_targets() {
        let journal = Journal::default();
        let all = recipe_fn(|ctx, mf| {
            Box::pin(async move {
                mf.depend(ctx, &["gen", "compile"]).await?;
                anyhow::Ok(())
            })
        });
        let mf = makefile(
            &[],
            vec![
                MakeTarget::new("all", all).as_default(),
                MakeTarget::new("compile", recording(&journal, "compile")),
                MakeTarget::new("gen", recording(&journal, "gen")),
            ],
        );
        mf.run(&Context::background()).await.unwrap();
        assert_eq!(entries(&journal), vec!["gen", "compile"]);
    }

    #[tokio::test]
    async fn test_up_to_date_target_is_skipped() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("input.txt");
        let output = dir.path().join("output.txt");
        std::fs::write(&source, "data").unwrap();

        let journal = Journal::default();
        let check = file_up_to_date(&output, [source.to_string_lossy().into_owned()]);
        let mf = makefile(
            &[],
            vec![MakeTarget::new("out", recording(&journal, "out")).up_to_date(check)],
        );

        mf.run(&Context::background()).await.unwrap();
        assert_eq!(entries(&journal), vec!["out"]);

        std::fs::write(&output, "built").unwrap();
        let file = std::fs::File::options().write(true).open(&output).unwrap();
        file.set_modified(std::time::SystemTime::now() + std::time::Duration::from_secs(5))
            .unwrap();
        mf.run(&Context::background()).await.unwrap();
        assert_eq!(entries(&journal), vec!["out"]);
    }

    #[test]
    fn test_help_lists_visible_targets_and_marks_default() {
        let journal = Journal::default();
        let mf = makefile(
            &[],
            vec![
                MakeTarget::new("test", recording(&journal, "t")).desc("Run the tests"),
                MakeTarget::new("all", recording(&journal, "a"))
                    .desc("Build everything")
                    .as_default(),
                MakeTarget::new("internal", recording(&journal, "i")).hidden(),
            ],
        );
        let mut out = Vec::new();
        mf.write_help(&mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Usage: build [-help] [target]\n\
             Targets:\n\
             * all    Build everything\n\
             \x20 test   Run the tests\n\
             \n\
             * (default target)\n"
        );
    }

    #[test]
    fn test_target_help_includes_long_description() {
        let journal = Journal::default();
        let target = MakeTarget::new("fmt", recording(&journal, "fmt"))
            .desc("Format sources")
            .long_desc("Runs rustfmt over the workspace.");
        let mut out = Vec::new();
        target.write_help("build", &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "build fmt:\n\nFormat sources\nRuns rustfmt over the workspace.\n"
        );
    }
}
