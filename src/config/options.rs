// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Functional options describing how one pipeline stage is set up.
//!
//! An [`ExecOption`] is a deferred mutation of an [`ExecOptions`] record.
//! Options are applied in order when the stage is constructed, so later
//! options override earlier ones for scalar fields and merge for
//! environment variables. Building an option performs no I/O.

use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::engine::SharedBuffer;
use crate::errors::StageFailure;
use crate::observability::messages::stage::JsonDecodeSkipped;
use crate::traits::ExitHook;

/// Destination for a stage's stdout or stderr
pub type OutputSink = Box<dyn AsyncWrite + Send + Unpin>;
/// Source for the head stage's stdin
pub type InputSource = Box<dyn AsyncRead + Send + Unpin>;

/// Mutable record the options are applied to before a stage is built.
///
/// Unset streams mean "not captured or redirected by the caller"; the
/// lifecycle decides what to do with them when the chain starts.
#[derive(Default)]
pub struct ExecOptions {
    pub(crate) no_inherit_env: bool,
    pub(crate) env_vars: HashMap<String, String>,
    pub(crate) working_dir: Option<PathBuf>,
    pub(crate) stdout: Option<OutputSink>,
    pub(crate) stderr: Option<OutputSink>,
    pub(crate) stdin: Option<InputSource>,
    pub(crate) on_exit: Vec<Box<dyn ExitHook>>,
}

impl ExecOptions {
    /// Apply a single option to a fresh record
    pub fn from_option(option: ExecOption) -> Self {
        let mut opts = Self::default();
        option.apply(&mut opts);
        opts
    }

    #[cfg(test)]
    fn no_inherit_env(&self) -> bool {
        self.no_inherit_env
    }

    #[cfg(test)]
    fn env_vars(&self) -> &HashMap<String, String> {
        &self.env_vars
    }

    #[cfg(test)]
    fn working_dir(&self) -> Option<&std::path::Path> {
        self.working_dir.as_deref()
    }

    #[cfg(test)]
    fn has_stdout(&self) -> bool {
        self.stdout.is_some()
    }

    #[cfg(test)]
    fn has_stderr(&self) -> bool {
        self.stderr.is_some()
    }

    #[cfg(test)]
    fn has_stdin(&self) -> bool {
        self.stdin.is_some()
    }

    #[cfg(test)]
    fn exit_hook_count(&self) -> usize {
        self.on_exit.len()
    }

    /// Environment for the child: the caller's (unless disabled) overridden by `env_vars`.
    ///
    /// Inherited variables are taken as raw OS strings, so values that are not
    /// valid UTF-8 pass through untouched.
    pub(crate) fn resolve_env(&self) -> Vec<(OsString, OsString)> {
        let mut environ: Vec<(OsString, OsString)> = if self.no_inherit_env {
            Vec::with_capacity(self.env_vars.len())
        } else {
            std::env::vars_os().collect()
        };
        environ.retain(|(key, _)| !key.to_str().is_some_and(|key| self.env_vars.contains_key(key)));
        let mut overrides: Vec<(&String, &String)> = self.env_vars.iter().collect();
        overrides.sort();
        environ.extend(
            overrides
                .into_iter()
                .map(|(k, v)| (OsString::from(k), OsString::from(v))),
        );
        environ
    }
}

impl fmt::Debug for ExecOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecOptions")
            .field("no_inherit_env", &self.no_inherit_env)
            .field("env_vars", &self.env_vars)
            .field("working_dir", &self.working_dir)
            .field("stdout", &self.stdout.is_some())
            .field("stderr", &self.stderr.is_some())
            .field("stdin", &self.stdin.is_some())
            .field("on_exit", &self.on_exit.len())
            .finish()
    }
}

/// One deferred configuration step for a stage
pub struct ExecOption(Box<dyn FnOnce(&mut ExecOptions) + Send>);

impl ExecOption {
    /// Wrap an arbitrary mutation
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(&mut ExecOptions) + Send + 'static,
    {
        Self(Box::new(f))
    }

    /// The option that changes nothing
    pub fn none() -> Self {
        Self::new(|_| {})
    }

    pub fn apply(self, opts: &mut ExecOptions) {
        (self.0)(opts)
    }
}

impl Default for ExecOption {
    fn default() -> Self {
        Self::none()
    }
}

impl From<Vec<ExecOption>> for ExecOption {
    fn from(options: Vec<ExecOption>) -> Self {
        combine_options(options)
    }
}

impl fmt::Debug for ExecOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ExecOption")
    }
}

/// Send the stage's stdout to `writer`
pub fn with_stdout<W>(writer: W) -> ExecOption
where
    W: AsyncWrite + Send + Unpin + 'static,
{
    ExecOption::new(move |opts| opts.stdout = Some(Box::new(writer)))
}

/// Send the stage's stderr to `writer` (in addition to the internal diagnostic buffer)
pub fn with_stderr<W>(writer: W) -> ExecOption
where
    W: AsyncWrite + Send + Unpin + 'static,
{
    ExecOption::new(move |opts| opts.stderr = Some(Box::new(writer)))
}

/// Feed `reader` to the stage's stdin. Only valid on the head of a chain.
pub fn with_stdin<R>(reader: R) -> ExecOption
where
    R: AsyncRead + Send + Unpin + 'static,
{
    ExecOption::new(move |opts| opts.stdin = Some(Box::new(reader)))
}

/// Working directory for the stage; an empty path inherits the caller's
pub fn with_dir(dir: impl Into<PathBuf>) -> ExecOption {
    let dir = dir.into();
    ExecOption::new(move |opts| {
        opts.working_dir = if dir.as_os_str().is_empty() {
            None
        } else {
            Some(dir)
        }
    })
}

/// Add or override environment variables; repeated use merges, last write wins per key
pub fn with_env_vars<I, K, V>(vars: I) -> ExecOption
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let vars: Vec<(String, String)> = vars
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect();
    ExecOption::new(move |opts| opts.env_vars.extend(vars))
}

/// When true the child sees only the variables given through [`with_env_vars`]
pub fn with_no_inherit_env(no_inherit: bool) -> ExecOption {
    ExecOption::new(move |opts| opts.no_inherit_env = no_inherit)
}

/// Register a hook to run after the stage's process exits
pub fn with_exit_hook<H>(hook: H) -> ExecOption
where
    H: ExitHook + 'static,
{
    ExecOption::new(move |opts| opts.on_exit.push(Box::new(hook)))
}

/// Capture stdout and decode it as JSON into `slot` once the stage exits.
///
/// A decode failure is reported as a stage failure and makes `wait` fail.
pub fn with_stdout_json_decoder<T>(slot: JsonSlot<T>) -> ExecOption
where
    T: DeserializeOwned + Send + 'static,
{
    json_decoder(slot, false)
}

/// Like [`with_stdout_json_decoder`], but decode failures are only logged
pub fn with_stdout_json_decoder_lenient<T>(slot: JsonSlot<T>) -> ExecOption
where
    T: DeserializeOwned + Send + 'static,
{
    json_decoder(slot, true)
}

fn json_decoder<T>(slot: JsonSlot<T>, lenient: bool) -> ExecOption
where
    T: DeserializeOwned + Send + 'static,
{
    ExecOption::new(move |opts| {
        let buffer = SharedBuffer::new();
        opts.stdout = Some(Box::new(buffer.clone()));
        opts.on_exit.push(Box::new(JsonDecodeHook {
            buffer,
            slot,
            lenient,
        }));
    })
}

/// Apply `options` in order, for grouping
pub fn combine_options<I>(options: I) -> ExecOption
where
    I: IntoIterator<Item = ExecOption>,
{
    let options: Vec<ExecOption> = options.into_iter().collect();
    ExecOption::new(move |opts| {
        for option in options {
            option.apply(opts);
        }
    })
}

/// Shared destination for a value decoded from a stage's output.
///
/// Clone it, hand one clone to [`with_stdout_json_decoder`] and read the
/// other after the chain has been waited.
pub struct JsonSlot<T> {
    inner: Arc<Mutex<Option<T>>>,
}

impl<T> JsonSlot<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(None)),
        }
    }

    /// Remove and return the decoded value
    pub fn take(&self) -> Option<T> {
        self.lock().take()
    }

    pub fn is_filled(&self) -> bool {
        self.lock().is_some()
    }

    pub(crate) fn fill(&self, value: T) {
        *self.lock() = Some(value);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<T>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<T: Clone> JsonSlot<T> {
    /// Copy of the decoded value, if any
    pub fn get(&self) -> Option<T> {
        self.lock().clone()
    }
}

impl<T> Clone for JsonSlot<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for JsonSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for JsonSlot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonSlot")
            .field("filled", &self.is_filled())
            .finish()
    }
}

struct JsonDecodeHook<T> {
    buffer: SharedBuffer,
    slot: JsonSlot<T>,
    lenient: bool,
}

impl<T> ExitHook for JsonDecodeHook<T>
where
    T: DeserializeOwned + Send,
{
    fn on_exit(self: Box<Self>, command: &str) -> Result<(), StageFailure> {
        match serde_json::from_slice::<T>(&self.buffer.bytes()) {
            Ok(value) => {
                self.slot.fill(value);
                Ok(())
            }
            Err(source) if self.lenient => {
                tracing::debug!("{}", JsonDecodeSkipped { command, error: &source });
                Ok(())
            }
            Err(source) => Err(StageFailure::Decode {
                command: command.to_string(),
                source,
            }),
        }
    }
}
