// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::Instrument;

use crate::engine::Context;
use crate::errors::MakeError;
use crate::makefile::Makefile;
use crate::observability::messages::makefile::{TargetExecuting, TargetFailed, TargetUpToDate};
use crate::observability::messages::StructuredLog;
use crate::traits::Recipe;
use crate::utils::files::target_needs_update;

/// Decides whether a target can be skipped
pub type UpToDate = Arc<dyn Fn(&Makefile) -> bool + Send + Sync>;

/// A named unit of work in a [`Makefile`].
///
/// ```
/// use pipewright::makefile::{file_up_to_date, MakeTarget};
/// use pipewright::traits::recipe_fn;
///
/// let target = MakeTarget::new("docs", recipe_fn(|_ctx, _mf| Box::pin(async { anyhow::Ok(()) })))
///     .desc("Render the documentation")
///     .up_to_date(file_up_to_date("target/doc/index.html", ["src/**/*.rs"]));
/// assert_eq!(target.name(), "docs");
/// ```
#[derive(Clone)]
pub struct MakeTarget {
    name: String,
    desc: String,
    long_desc: String,
    hidden: bool,
    default: bool,
    up_to_date: Option<UpToDate>,
    recipe: Arc<dyn Recipe>,
}

impl MakeTarget {
    pub fn new(name: impl Into<String>, recipe: Arc<dyn Recipe>) -> Self {
        Self {
            name: name.into(),
            desc: String::new(),
            long_desc: String::new(),
            hidden: false,
            default: false,
            up_to_date: None,
            recipe,
        }
    }

    /// One-line description shown in the target listing
    pub fn desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = desc.into();
        self
    }

    /// Extra text shown by `-help <target>`
    pub fn long_desc(mut self, long_desc: impl Into<String>) -> Self {
        self.long_desc = long_desc.into();
        self
    }

    /// Leave the target out of the listing; it can still be run by name
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Run this target when no target is named on the command line
    pub fn as_default(mut self) -> Self {
        self.default = true;
        self
    }

    pub fn up_to_date(mut self, check: UpToDate) -> Self {
        self.up_to_date = Some(check);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.desc
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn is_default(&self) -> bool {
        self.default
    }

    /// Run the recipe unless the up-to-date check says it can be skipped
    pub(crate) async fn execute(&self, ctx: &Context, mf: &Makefile) -> Result<(), MakeError> {
        let executing = TargetExecuting { target: &self.name };
        executing.log();
        let span = executing.span("target");

        if self.up_to_date.as_ref().is_some_and(|check| check(mf)) {
            TargetUpToDate { target: &self.name }.log();
            return Ok(());
        }

        self.recipe
            .build(ctx, mf)
            .instrument(span)
            .await
            .map_err(|source| {
                TargetFailed {
                    target: &self.name,
                    error: &source,
                }
                .log();
                MakeError::Recipe {
                    target: self.name.clone(),
                    source,
                }
            })
    }

    pub(crate) fn write_help<W: io::Write>(&self, program: &str, out: &mut W) -> io::Result<()> {
        writeln!(out, "{} {}:", program, self.name)?;
        writeln!(out)?;
        writeln!(out, "{}", self.desc)?;
        if !self.long_desc.is_empty() {
            writeln!(out, "{}", self.long_desc)?;
        }
        Ok(())
    }
}

impl fmt::Debug for MakeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MakeTarget")
            .field("name", &self.name)
            .field("desc", &self.desc)
            .field("hidden", &self.hidden)
            .field("default", &self.default)
            .field("up_to_date", &self.up_to_date.is_some())
            .finish()
    }
}

/// Up-to-date check passing while `target` is newer than every file matched by `sources`
pub fn file_up_to_date<I, S>(target: impl Into<PathBuf>, sources: I) -> UpToDate
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let target = target.into();
    let sources: Vec<String> = sources.into_iter().map(Into::into).collect();
    Arc::new(move |_mf: &Makefile| !target_needs_update(&target, &sources))
}
