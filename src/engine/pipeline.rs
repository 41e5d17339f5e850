// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Chain construction: stages and the stream links between them.
//!
//! A [`Pipeline`] is an arena of stage specifications in head-to-tail order
//! plus an explicit list of [`StreamLink`] edges. The handle always refers
//! to the most recently appended stage (the tail); `pipe`/`pipe2` consume it
//! and return the longer chain. Nothing is spawned until `start`.

use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;

use crate::config::{ExecOption, ExecOptions, InputSource, OutputSink};
use crate::engine::context::Context;
use crate::engine::lifecycle::RunningStage;
use crate::engine::SharedBuffer;
use crate::errors::PipelineError;
use crate::observability::messages::engine::StageLinked;
use crate::traits::ExitHook;

/// Which output of a stage feeds the next one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Stdout => f.write_str("stdout"),
            StreamKind::Stderr => f.write_str("stderr"),
        }
    }
}

/// Edge `from.stream -> to.stdin` between two stages of a chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamLink {
    pub from: usize,
    pub stream: StreamKind,
    pub to: usize,
}

/// Lifecycle position of a chain. No state is re-entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainState {
    Built,
    Starting,
    Running,
    Waited,
    /// `start` failed, or `wait` was interrupted by the context; live stages
    /// were handed to the background reaper
    Aborted,
}

impl fmt::Display for ChainState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChainState::Built => "built",
            ChainState::Starting => "starting",
            ChainState::Running => "running",
            ChainState::Waited => "waited",
            ChainState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// One external process invocation, as configured before it is spawned
pub(crate) struct StageSpec {
    pub(crate) command: String,
    pub(crate) args: Vec<String>,
    pub(crate) working_dir: Option<PathBuf>,
    pub(crate) env: Vec<(OsString, OsString)>,
    pub(crate) stdin: Option<InputSource>,
    pub(crate) stdout: Option<OutputSink>,
    pub(crate) stderr: Option<OutputSink>,
    pub(crate) on_exit: Vec<Box<dyn ExitHook>>,
    pub(crate) diagnostics: SharedBuffer,
}

impl StageSpec {
    fn new(command: String, args: Vec<String>, opts: ExecOptions) -> Self {
        let env = opts.resolve_env();
        Self {
            command,
            args,
            working_dir: opts.working_dir,
            env,
            stdin: opts.stdin,
            stdout: opts.stdout,
            stderr: opts.stderr,
            on_exit: opts.on_exit,
            diagnostics: SharedBuffer::new(),
        }
    }

    pub(crate) fn argv(&self) -> Vec<String> {
        std::iter::once(self.command.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }

    pub(crate) fn command_line(&self) -> String {
        self.argv().join(" ")
    }
}

/// Handle to the tail of a chain of external processes.
///
/// ```no_run
/// # use pipewright::engine::{Context, Pipeline};
/// # async fn demo() -> Result<(), pipewright::errors::PipelineError> {
/// let ctx = Context::background();
/// let mut chain = Pipeline::exec(&ctx, "git", ["log", "--oneline"])
///     .pipe("wc", ["-l"])?;
/// chain.run().await?;
/// assert_eq!(chain.exit_codes(), &[0, 0]);
/// # Ok(())
/// # }
/// ```
pub struct Pipeline {
    pub(crate) ctx: Context,
    pub(crate) stages: Vec<StageSpec>,
    pub(crate) links: Vec<StreamLink>,
    pub(crate) state: ChainState,
    pub(crate) running: Vec<RunningStage>,
    pub(crate) exit_codes: Vec<i32>,
}

impl Pipeline {
    /// A single-stage chain running `command args...`
    pub fn exec<C, I, A>(ctx: &Context, command: C, args: I) -> Self
    where
        C: Into<String>,
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        Self::exec_opt(ctx, ExecOption::none(), command, args)
    }

    /// Like [`Pipeline::exec`], configured by `option`
    pub fn exec_opt<C, I, A>(ctx: &Context, option: ExecOption, command: C, args: I) -> Self
    where
        C: Into<String>,
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        let opts = ExecOptions::from_option(option);
        let stage = StageSpec::new(command.into(), collect_args(args), opts);
        Self {
            ctx: ctx.clone(),
            stages: vec![stage],
            links: Vec::new(),
            state: ChainState::Built,
            running: Vec::new(),
            exit_codes: Vec::new(),
        }
    }

    /// Append a stage reading the current tail's stdout
    pub fn pipe<C, I, A>(self, command: C, args: I) -> Result<Self, PipelineError>
    where
        C: Into<String>,
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        self.link(StreamKind::Stdout, ExecOption::none(), command, args)
    }

    /// Like [`Pipeline::pipe`], configured by `option`
    pub fn pipe_opt<C, I, A>(self, option: ExecOption, command: C, args: I) -> Result<Self, PipelineError>
    where
        C: Into<String>,
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        self.link(StreamKind::Stdout, option, command, args)
    }

    /// Append a stage reading the current tail's stderr
    pub fn pipe2<C, I, A>(self, command: C, args: I) -> Result<Self, PipelineError>
    where
        C: Into<String>,
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        self.link(StreamKind::Stderr, ExecOption::none(), command, args)
    }

    /// Like [`Pipeline::pipe2`], configured by `option`
    pub fn pipe2_opt<C, I, A>(self, option: ExecOption, command: C, args: I) -> Result<Self, PipelineError>
    where
        C: Into<String>,
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        self.link(StreamKind::Stderr, option, command, args)
    }

    fn link<C, I, A>(
        mut self,
        stream: StreamKind,
        option: ExecOption,
        command: C,
        args: I,
    ) -> Result<Self, PipelineError>
    where
        C: Into<String>,
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        self.expect_state(ChainState::Built)?;
        let opts = ExecOptions::from_option(option);
        let stage = StageSpec::new(command.into(), collect_args(args), opts);
        if stage.stdin.is_some() {
            return Err(PipelineError::ConflictingStdin {
                command: stage.command_line(),
            });
        }

        let from = self.stages.len() - 1;
        let link = StreamLink {
            from,
            stream,
            to: from + 1,
        };
        tracing::debug!(
            "{}",
            StageLinked {
                from: &self.stages[from].command,
                to: &stage.command,
                stream,
                tee: stream_is_captured(&self.stages[from], stream),
            }
        );
        self.stages.push(stage);
        self.links.push(link);
        Ok(self)
    }

    pub(crate) fn expect_state(&self, expected: ChainState) -> Result<(), PipelineError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(PipelineError::InvalidState {
                expected,
                actual: self.state,
            })
        }
    }

    /// The link whose downstream end is stage `index`, if any
    pub(crate) fn link_into(&self, index: usize) -> Option<StreamLink> {
        self.links.iter().copied().find(|link| link.to == index)
    }

    /// The link whose upstream end is stage `index`, if any
    pub(crate) fn link_from(&self, index: usize) -> Option<StreamLink> {
        self.links.iter().copied().find(|link| link.from == index)
    }

    /// Number of stages in the chain
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn state(&self) -> ChainState {
        self.state
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn links(&self) -> &[StreamLink] {
        &self.links
    }

    /// Command and arguments of every stage, head to tail
    pub fn commands(&self) -> Vec<Vec<String>> {
        self.stages.iter().map(StageSpec::argv).collect()
    }

    /// Command and arguments of the tail stage
    pub fn tail_argv(&self) -> Vec<String> {
        self.stages.last().map(StageSpec::argv).unwrap_or_default()
    }

    /// Everything stage `index` has written to stderr so far
    pub fn stderr_text(&self, index: usize) -> Option<String> {
        self.stages
            .get(index)
            .map(|stage| stage.diagnostics.to_string_lossy())
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("commands", &self.commands())
            .field("links", &self.links)
            .field("state", &self.state)
            .field("exit_codes", &self.exit_codes)
            .finish()
    }
}

fn stream_is_captured(stage: &StageSpec, stream: StreamKind) -> bool {
    match stream {
        StreamKind::Stdout => stage.stdout.is_some(),
        // stderr always feeds the diagnostic buffer as well
        StreamKind::Stderr => true,
    }
}

fn collect_args<I, A>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = A>,
    A: Into<String>,
{
    args.into_iter().map(Into::into).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{combine_options, with_env_vars, with_no_inherit_env, with_stdin, with_stdout};

    fn no_args() -> [&'static str; 0] {
        []
    }

    #[test]
    fn test_exec_builds_single_unlinked_stage() {
        let chain = Pipeline::exec(&Context::background(), "echo", ["a", "b"]);
        assert_eq!(chain.len(), 1);
        assert_eq!(chain.state(), ChainState::Built);
        assert!(chain.links().is_empty());
        assert_eq!(chain.tail_argv(), vec!["echo", "a", "b"]);
        assert_eq!(chain.exit_code(), -1);
        assert!(chain.exit_codes().is_empty());
    }

    #[test]
    fn test_pipe_and_pipe2_record_explicit_links() {
        let chain = Pipeline::exec(&Context::background(), "a", no_args())
            .pipe("b", no_args())
            .and_then(|c| c.pipe2("c", ["-x"]))
            .expect("linking is pure construction");
        assert_eq!(
            chain.links(),
            &[
                StreamLink { from: 0, stream: StreamKind::Stdout, to: 1 },
                StreamLink { from: 1, stream: StreamKind::Stderr, to: 2 },
            ]
        );
        assert_eq!(chain.link_into(2).map(|l| l.from), Some(1));
        assert_eq!(chain.link_from(0).map(|l| l.to), Some(1));
        assert!(chain.link_into(0).is_none());
        assert_eq!(chain.tail_argv(), vec!["c", "-x"]);
        assert_eq!(chain.commands().len(), 3);
    }

    #[test]
    fn test_piped_stage_rejects_its_own_stdin() {
        let err = Pipeline::exec(&Context::background(), "a", no_args())
            .pipe_opt(with_stdin(tokio::io::empty()), "b", no_args())
            .expect_err("stdin has two sources");
        assert!(matches!(err, PipelineError::ConflictingStdin { .. }));
    }

    #[test]
    fn test_head_stage_keeps_configured_streams() {
        let chain = Pipeline::exec_opt(
            &Context::background(),
            combine_options(vec![with_stdout(SharedBuffer::new()), with_stdin(tokio::io::empty())]),
            "cat",
            no_args(),
        );
        assert!(chain.stages[0].stdout.is_some());
        assert!(chain.stages[0].stdin.is_some());
        assert!(stream_is_captured(&chain.stages[0], StreamKind::Stdout));
    }

    #[test]
    fn test_environment_is_resolved_at_construction() {
        let chain = Pipeline::exec_opt(
            &Context::background(),
            combine_options(vec![with_no_inherit_env(true), with_env_vars([("X", "1")])]),
            "env",
            no_args(),
        );
        assert_eq!(chain.stages[0].env, vec![(OsString::from("X"), OsString::from("1"))]);
    }

    #[test]
    fn test_stderr_text_is_empty_before_start() {
        let chain = Pipeline::exec(&Context::background(), "true", no_args());
        assert_eq!(chain.stderr_text(0).as_deref(), Some(""));
        assert_eq!(chain.stderr_text(1), None);
    }
}
