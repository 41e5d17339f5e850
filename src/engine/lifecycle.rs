// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Starting, waiting on and reporting a chain of processes.
//!
//! ## Stream wiring
//!
//! Wiring is decided when the chain starts. For every output stream of every
//! stage the consumers are collected: the caller's sink, the diagnostic
//! buffer (stderr only) and the next stage's stdin (when a link names it).
//!
//! - no consumer: the stream goes to the null device
//! - only the next stage: the two processes share an OS pipe directly
//! - anything else: the stream is piped into a [`Tee`] task that writes
//!   every chunk to every consumer and closes the next stage's stdin at EOF
//!
//! Each tee task belongs to the stage that produces its input, so waiting
//! on a stage also waits until all of its captures are complete.
//!
//! ## Waiting
//!
//! Stages are waited head to tail, each wait raced against the chain's
//! context. When the context fires first, `wait` returns immediately and
//! every stage not yet reaped is moved to a background reaper so that no
//! zombie processes are left behind. Processes are never killed.

use std::collections::VecDeque;
use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

use crate::config::consts::EXIT_CODE_UNKNOWN;
use crate::config::InputSource;
use crate::engine::pipeline::{ChainState, Pipeline, StreamKind};
use crate::engine::tee::Tee;
use crate::errors::{PipelineError, StageFailure};
use crate::observability::messages::engine::{
    PipelineCompleted, PipelineFailed, PipelineStarting, ReaperStarted, StageExited, StageSpawnFailed,
    StageSpawned, WaitInterrupted,
};
use crate::observability::messages::stage::{ExitHookFailed, StdinFeedFailed};
use crate::observability::messages::StructuredLog;
use crate::traits::ExitHook;

/// A spawned stage and everything that must finish before it counts as done
pub(crate) struct RunningStage {
    index: usize,
    command_line: String,
    child: Child,
    /// Copy tasks fed by this stage's stdout/stderr
    copies: Vec<JoinHandle<()>>,
    /// Copies a caller-supplied reader into stdin; aborted once the process exits
    feeder: Option<JoinHandle<()>>,
    on_exit: Vec<Box<dyn ExitHook>>,
    started: Instant,
}

impl RunningStage {
    /// Wait for the process, then for every copy task it feeds.
    ///
    /// Safe to call again after being interrupted: completed copy tasks are
    /// removed before the next await point.
    async fn finish(&mut self) -> io::Result<ExitStatus> {
        let status = self.child.wait().await;
        while let Some(copy) = self.copies.first_mut() {
            if let Err(join_error) = copy.await {
                tracing::warn!(command = %self.command_line, error = %join_error, "stream copy task failed");
            }
            self.copies.remove(0);
        }
        if let Some(feeder) = self.feeder.take() {
            feeder.abort();
        }
        status
    }
}

/// Successor stdin prepared by the stage before it
enum Downstream {
    Direct(Stdio),
    Tee(Tee),
}

impl Pipeline {
    /// Spawn every stage, head to tail.
    ///
    /// Must be called from within a tokio runtime. Returns on the first
    /// spawn failure, leaving later stages unspawned; stages already running
    /// are not terminated but are reaped in the background.
    pub fn start(&mut self) -> Result<(), PipelineError> {
        self.expect_state(ChainState::Built)?;
        if let Some(error) = self.ctx.err() {
            self.state = ChainState::Aborted;
            return Err(error.into());
        }
        self.state = ChainState::Starting;

        let tail = self.tail_argv().join(" ");
        PipelineStarting {
            stages: self.stages.len(),
            tail: &tail,
        }
        .log();

        let mut pending: Option<(usize, Downstream)> = None;
        for index in 0..self.stages.len() {
            if let Err(error) = self.spawn_stage(index, &mut pending) {
                if let Some((owner, Downstream::Tee(tee))) = pending.take() {
                    self.running[owner].copies.push(tee.spawn());
                }
                self.state = ChainState::Aborted;
                reap_in_background(std::mem::take(&mut self.running));
                return Err(error);
            }
        }
        self.state = ChainState::Running;
        Ok(())
    }

    fn spawn_stage(
        &mut self,
        index: usize,
        pending: &mut Option<(usize, Downstream)>,
    ) -> Result<(), PipelineError> {
        let link_in = self.link_into(index);
        let link_out = self.link_from(index);
        let stdout_to_next = link_out.is_some_and(|link| link.stream == StreamKind::Stdout);
        let stderr_to_next = link_out.is_some_and(|link| link.stream == StreamKind::Stderr);

        let stage = &mut self.stages[index];
        let command_line = stage.command_line();
        let mut cmd = Command::new(&stage.command);
        cmd.args(&stage.args)
            .env_clear()
            .envs(stage.env.iter().map(|(k, v)| (k, v)))
            .kill_on_drop(false);
        if let Some(dir) = &stage.working_dir {
            cmd.current_dir(dir);
        }

        let mut upstream_tee: Option<(usize, Tee)> = None;
        let mut feed: Option<InputSource> = None;
        if link_in.is_some() {
            match pending.take() {
                Some((_, Downstream::Direct(stdio))) => {
                    cmd.stdin(stdio);
                }
                Some((owner, Downstream::Tee(tee))) => {
                    cmd.stdin(Stdio::piped());
                    upstream_tee = Some((owner, tee));
                }
                None => {
                    cmd.stdin(Stdio::null());
                }
            }
        } else if let Some(reader) = stage.stdin.take() {
            cmd.stdin(Stdio::piped());
            feed = Some(reader);
        } else {
            cmd.stdin(Stdio::null());
        }

        let stdout_sink = stage.stdout.take();
        if stdout_sink.is_none() && !stdout_to_next {
            cmd.stdout(Stdio::null());
        } else {
            cmd.stdout(Stdio::piped());
        }
        cmd.stderr(Stdio::piped());

        let spawned = cmd.spawn();
        // the command holds our copy of any direct pipe end; release it now
        drop(cmd);
        let mut child = match spawned {
            Ok(child) => child,
            Err(source) => {
                tracing::error!(
                    "{}",
                    StageSpawnFailed {
                        index,
                        command: &command_line,
                        error: &source,
                    }
                );
                if let Some((owner, tee)) = upstream_tee {
                    self.running[owner].copies.push(tee.spawn());
                }
                return Err(PipelineError::Spawn {
                    command: command_line,
                    source,
                });
            }
        };

        StageSpawned {
            index,
            command: &command_line,
            pid: child.id(),
        }
        .log();

        if let Some((owner, tee)) = upstream_tee {
            let tee = match child.stdin.take() {
                Some(stdin) => tee.sink(format!("{} stdin", stage.command), Box::new(stdin)),
                None => tee,
            };
            self.running[owner].copies.push(tee.spawn());
        }

        let feeder = feed.and_then(|reader| {
            child
                .stdin
                .take()
                .map(|stdin| spawn_feeder(command_line.clone(), reader, stdin))
        });

        let mut running = RunningStage {
            index,
            command_line,
            child,
            copies: Vec::new(),
            feeder,
            on_exit: std::mem::take(&mut stage.on_exit),
            started: Instant::now(),
        };

        if let Some(stdout) = running.child.stdout.take() {
            let origin = format!("{} stdout", stage.command);
            match (stdout_sink, stdout_to_next) {
                (None, true) => match stdout.try_into() {
                    Ok(stdio) => *pending = Some((index, Downstream::Direct(stdio))),
                    Err(source) => {
                        let command = running.command_line.clone();
                        reap_in_background(vec![running]);
                        return Err(PipelineError::Pipe {
                            command,
                            stream: StreamKind::Stdout,
                            source,
                        });
                    }
                },
                (Some(sink), true) => {
                    let tee = Tee::new(origin, stdout).sink("capture", sink);
                    *pending = Some((index, Downstream::Tee(tee)));
                }
                (Some(sink), false) => {
                    running.copies.push(Tee::new(origin, stdout).sink("capture", sink).spawn());
                }
                (None, false) => {}
            }
        }

        if let Some(stderr) = running.child.stderr.take() {
            let mut tee = Tee::new(format!("{} stderr", stage.command), stderr)
                .sink("diagnostics", Box::new(stage.diagnostics.clone()));
            if let Some(sink) = stage.stderr.take() {
                tee = tee.sink("capture", sink);
            }
            if stderr_to_next {
                *pending = Some((index, Downstream::Tee(tee)));
            } else {
                running.copies.push(tee.spawn());
            }
        }

        self.running.push(running);
        Ok(())
    }

    /// Wait for every stage, head to tail, and collect exit codes.
    ///
    /// Returns the chain's context error as soon as the context is done.
    /// Otherwise every stage's failures are joined into one
    /// [`PipelineError::ChainFailed`] carrying the tail's command line and
    /// diagnostic stderr.
    pub async fn wait(&mut self) -> Result<(), PipelineError> {
        self.expect_state(ChainState::Running)?;
        let mut remaining: VecDeque<RunningStage> = std::mem::take(&mut self.running).into();
        let mut codes = Vec::with_capacity(remaining.len());
        let mut failures = Vec::new();

        while let Some(mut stage) = remaining.pop_front() {
            let finished = tokio::select! {
                status = stage.finish() => Ok(status),
                error = self.ctx.done() => Err(error),
            };
            let status = match finished {
                Ok(status) => status,
                Err(error) => {
                    remaining.push_front(stage);
                    WaitInterrupted {
                        error: &error,
                        unreaped: remaining.len(),
                    }
                    .log();
                    reap_in_background(remaining.into());
                    self.state = ChainState::Aborted;
                    return Err(error.into());
                }
            };

            let code = classify(&stage.command_line, status, &mut failures);
            for hook in stage.on_exit.drain(..) {
                if let Err(failure) = hook.on_exit(&stage.command_line) {
                    tracing::warn!("{}", ExitHookFailed { command: &stage.command_line, failure: &failure });
                    failures.push(failure);
                }
            }
            StageExited {
                index: stage.index,
                command: &stage.command_line,
                code,
                duration: stage.started.elapsed(),
            }
            .log();
            codes.push(code);
        }

        self.exit_codes = codes;
        self.state = ChainState::Waited;
        if failures.is_empty() {
            PipelineCompleted {
                stages: self.stages.len(),
                exit_codes: &self.exit_codes,
            }
            .log();
            return Ok(());
        }

        let error = PipelineError::ChainFailed {
            argv: self.tail_argv(),
            failures,
            stderr: self
                .stages
                .last()
                .map(|stage| stage.diagnostics.to_string_lossy())
                .unwrap_or_default(),
        };
        PipelineFailed {
            exit_codes: &self.exit_codes,
            error: &error,
        }
        .log();
        Err(error)
    }

    /// Start the chain and wait for it
    pub async fn run(&mut self) -> Result<(), PipelineError> {
        self.start()?;
        self.wait().await
    }

    /// Exit code of the tail stage, or -1 before a completed wait
    pub fn exit_code(&self) -> i32 {
        self.exit_codes.last().copied().unwrap_or(EXIT_CODE_UNKNOWN)
    }

    /// Exit codes of every stage, head to tail; empty before a completed wait
    pub fn exit_codes(&self) -> &[i32] {
        &self.exit_codes
    }

    /// OS process ids of the stages still owned by the chain
    pub fn pids(&self) -> Vec<u32> {
        self.running.iter().filter_map(|stage| stage.child.id()).collect()
    }
}

/// Record the stage's exit code and any failure it represents.
///
/// A process killed by a signal, or one whose wait failed, records 0.
fn classify(command: &str, status: io::Result<ExitStatus>, failures: &mut Vec<StageFailure>) -> i32 {
    let failure = match status {
        Ok(status) => match status.code() {
            Some(0) => None,
            Some(code) => Some(StageFailure::ExitStatus {
                command: command.to_string(),
                code,
            }),
            None => Some(StageFailure::Signaled {
                command: command.to_string(),
                signal: termination_signal(&status),
            }),
        },
        Err(source) => Some(StageFailure::Wait {
            command: command.to_string(),
            source,
        }),
    };
    match failure {
        Some(failure) => {
            let code = failure.exit_code();
            failures.push(failure);
            code
        }
        None => 0,
    }
}

#[cfg(unix)]
fn termination_signal(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn termination_signal(_status: &ExitStatus) -> Option<i32> {
    None
}

fn spawn_feeder(
    command: String,
    mut reader: InputSource,
    mut stdin: tokio::process::ChildStdin,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(error) = tokio::io::copy(&mut reader, &mut stdin).await {
            tracing::debug!("{}", StdinFeedFailed { command: &command, error: &error });
        }
        let _ = stdin.shutdown().await;
    })
}

/// Keep waiting on abandoned stages so they do not linger as zombies
fn reap_in_background(stages: Vec<RunningStage>) {
    if stages.is_empty() {
        return;
    }
    ReaperStarted { stages: stages.len() }.log();
    tokio::spawn(async move {
        for mut stage in stages {
            if let Err(error) = stage.finish().await {
                tracing::debug!(command = %stage.command_line, error = %error, "reaper wait failed");
            }
        }
    });
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::{combine_options, with_stderr, with_stdin, with_stdout};
    use crate::engine::{Context, SharedBuffer};
    use std::time::Duration;

    fn sh(script: &str) -> [String; 2] {
        ["-c".to_string(), script.to_string()]
    }

    #[tokio::test]
    async fn test_single_stage_exit_code() {
        let mut chain = Pipeline::exec(&Context::background(), "sh", sh("exit 7"));
        let err = chain.run().await.expect_err("non-zero exit fails the chain");
        assert_eq!(chain.exit_code(), 7);
        assert_eq!(chain.exit_codes(), &[7]);
        assert_eq!(chain.state(), ChainState::Waited);
        assert!(matches!(err.failures(), [StageFailure::ExitStatus { code: 7, .. }]));
    }

    #[tokio::test]
    async fn test_stdin_reader_feeds_head_stage() {
        let out = SharedBuffer::new();
        let mut chain = Pipeline::exec_opt(
            &Context::background(),
            combine_options(vec![
                with_stdin(std::io::Cursor::new(b"fed from memory".to_vec())),
                with_stdout(out.clone()),
            ]),
            "cat",
            Vec::<String>::new(),
        );
        chain.run().await.expect("cat succeeds");
        assert_eq!(out.to_string_lossy(), "fed from memory");
    }

    #[tokio::test]
    async fn test_direct_pipe_between_uncaptured_stages() {
        let out = SharedBuffer::new();
        let mut chain = Pipeline::exec(&Context::background(), "printf", ["a\\nb\\nc\\n"])
            .pipe_opt(with_stdout(out.clone()), "wc", ["-l"])
            .expect("link");
        chain.run().await.expect("chain succeeds");
        assert_eq!(out.to_string_lossy().trim(), "3");
        assert_eq!(chain.exit_codes(), &[0, 0]);
    }

    #[tokio::test]
    async fn test_stderr_reaches_diagnostics_and_caller() {
        let caller = SharedBuffer::new();
        let mut chain = Pipeline::exec_opt(
            &Context::background(),
            with_stderr(caller.clone()),
            "sh",
            sh("echo oops >&2; exit 3"),
        );
        let err = chain.run().await.expect_err("exit 3");
        assert_eq!(caller.to_string_lossy(), "oops\n");
        assert_eq!(chain.stderr_text(0).as_deref(), Some("oops\n"));
        assert!(err.to_string().ends_with("oops\n"));
    }

    #[tokio::test]
    async fn test_lifecycle_calls_out_of_order_are_rejected() {
        let mut chain = Pipeline::exec(&Context::background(), "true", Vec::<String>::new());
        assert!(matches!(
            chain.wait().await,
            Err(PipelineError::InvalidState { expected: ChainState::Running, actual: ChainState::Built })
        ));
        chain.run().await.expect("true succeeds");
        assert!(matches!(chain.start(), Err(PipelineError::InvalidState { .. })));
    }

    #[tokio::test]
    async fn test_spawn_failure_leaves_chain_aborted() {
        let mut chain = Pipeline::exec(&Context::background(), "true", Vec::<String>::new())
            .pipe("/definitely/not/a/binary", Vec::<String>::new())
            .expect("link");
        let err = chain.start().expect_err("second stage cannot spawn");
        assert!(matches!(err, PipelineError::Spawn { .. }));
        assert_eq!(chain.state(), ChainState::Aborted);
        assert_eq!(chain.exit_code(), -1);
    }

    #[tokio::test]
    async fn test_deadline_interrupts_wait_without_killing() {
        let ctx = Context::with_timeout(&Context::background(), Duration::from_millis(50));
        let mut chain = Pipeline::exec(&ctx, "sleep", ["1"]);
        chain.start().expect("sleep spawns");
        let began = Instant::now();
        let err = chain.wait().await.expect_err("deadline passes first");
        assert!(began.elapsed() < Duration::from_millis(900));
        assert!(matches!(err, PipelineError::Context(crate::engine::ContextError::DeadlineExceeded)));
        assert!(chain.exit_codes().is_empty());
        assert_eq!(chain.state(), ChainState::Aborted);
    }

    #[tokio::test]
    async fn test_non_utf8_environment_is_inherited() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let value = OsStr::from_bytes(b"f\xffo");
        std::env::set_var("PIPEWRIGHT_NON_UTF8_VALUE", value);
        let out = SharedBuffer::new();
        let mut chain = Pipeline::exec_opt(
            &Context::background(),
            with_stdout(out.clone()),
            "sh",
            sh("printf %s \"$PIPEWRIGHT_NON_UTF8_VALUE\""),
        );
        chain.run().await.expect("stage runs with the raw environment");
        assert_eq!(out.bytes(), b"f\xffo");
    }

    #[tokio::test]
    async fn test_signal_kill_records_zero_and_signaled_failure() {
        let mut chain = Pipeline::exec(&Context::background(), "sh", sh("kill -9 $$"));
        let err = chain.run().await.expect_err("killed stage fails the chain");
        assert_eq!(chain.exit_codes(), &[0]);
        assert!(matches!(
            err.failures(),
            [StageFailure::Signaled { signal: Some(9), .. }]
        ));
    }

    #[tokio::test]
    async fn test_interrupted_stages_are_reaped_in_background() {
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        let ctx = Context::with_timeout(&Context::background(), Duration::from_millis(100));
        let mut chain = Pipeline::exec(&ctx, "sleep", ["0.5"])
            .pipe("cat", Vec::<String>::new())
            .expect("link");
        chain.start().expect("stages spawn");
        let pids: Vec<Pid> = chain.pids().into_iter().map(|pid| Pid::from_raw(pid as i32)).collect();
        assert_eq!(pids.len(), 2);

        chain.wait().await.expect_err("deadline passes first");
        assert!(chain.pids().is_empty());

        // An unreaped zombie still accepts signal 0; a reaped pid does not.
        let reaped = async {
            while pids.iter().any(|pid| kill(*pid, None).is_ok()) {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        };
        tokio::time::timeout(Duration::from_secs(5), reaped)
            .await
            .expect("every stage is reaped after the interrupted wait");
    }
}
