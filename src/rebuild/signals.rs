// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use tokio::task::JoinHandle;

/// Forwards SIGINT, SIGTERM and SIGHUP to a set of child processes until dropped.
///
/// Registering the handlers replaces the default disposition of those
/// signals for the rest of the process lifetime, so the host no longer dies
/// on them; the children are expected to exit and let the host finish.
pub(crate) struct SignalRelay {
    task: Option<JoinHandle<()>>,
}

impl SignalRelay {
    #[cfg(unix)]
    pub(crate) fn start(pids: Vec<u32>) -> Self {
        if pids.is_empty() {
            return Self { task: None };
        }
        Self {
            task: Some(tokio::spawn(unix::forward(pids))),
        }
    }

    #[cfg(not(unix))]
    pub(crate) fn start(_pids: Vec<u32>) -> Self {
        Self { task: None }
    }
}

impl Drop for SignalRelay {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(unix)]
mod unix {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;
    use tokio::signal::unix::{signal, SignalKind};

    use crate::observability::messages::rebuild::SignalRelayed;

    pub(super) async fn forward(pids: Vec<u32>) {
        let streams = (
            signal(SignalKind::interrupt()),
            signal(SignalKind::terminate()),
            signal(SignalKind::hangup()),
        );
        let (mut interrupt, mut terminate, mut hangup) = match streams {
            (Ok(i), Ok(t), Ok(h)) => (i, t, h),
            _ => {
                tracing::debug!("[pipewright:rebuild] signal handlers unavailable; not relaying");
                return;
            }
        };

        loop {
            let received = tokio::select! {
                Some(()) = interrupt.recv() => Signal::SIGINT,
                Some(()) = terminate.recv() => Signal::SIGTERM,
                Some(()) = hangup.recv() => Signal::SIGHUP,
                else => break,
            };
            for &pid in &pids {
                let Ok(raw) = i32::try_from(pid) else { continue };
                match kill(Pid::from_raw(raw), received) {
                    Ok(()) => tracing::info!(
                        "{}",
                        SignalRelayed {
                            signal: received.as_str(),
                            pid,
                        }
                    ),
                    Err(errno) => tracing::debug!(pid, error = %errno, "[pipewright:rebuild] relay failed"),
                }
            }
        }
    }
}
