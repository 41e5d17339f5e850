// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Fan one producer's stream out to several consumers.
//!
//! A stage output that has to reach more than one place (a capture buffer,
//! the diagnostic stderr buffer, the next stage's stdin) is piped into a
//! [`Tee`]. Every chunk is written, in order, to every consumer before the
//! next chunk is read, so all consumers observe the same bytes and pipe
//! backpressure from the slowest consumer propagates to the producer.

use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::task::JoinHandle;

use crate::config::consts::TEE_BUFFER_SIZE;
use crate::config::OutputSink;
use crate::observability::messages::stage::{TeeFinished, TeeSinkDropped};
use crate::observability::messages::StructuredLog;

struct TeeSink {
    label: String,
    writer: OutputSink,
}

/// Copies a reader into every registered sink until EOF
pub(crate) struct Tee {
    origin: String,
    source: Box<dyn AsyncRead + Send + Unpin>,
    sinks: Vec<TeeSink>,
}

impl Tee {
    /// `origin` names the producing stream in log output, e.g. `"make stdout"`
    pub(crate) fn new<R>(origin: impl Into<String>, source: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self {
            origin: origin.into(),
            source: Box::new(source),
            sinks: Vec::new(),
        }
    }

    pub(crate) fn sink(mut self, label: impl Into<String>, writer: OutputSink) -> Self {
        self.sinks.push(TeeSink {
            label: label.into(),
            writer,
        });
        self
    }

    #[cfg(test)]
    fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Pump until EOF, then flush and close every sink.
    ///
    /// A sink whose write fails (typically a downstream stage that exited
    /// without reading all of its input) is dropped, which closes it; the
    /// remaining sinks keep receiving data.
    pub(crate) async fn run(mut self) -> io::Result<u64> {
        let mut buf = vec![0u8; TEE_BUFFER_SIZE];
        let mut total = 0u64;
        let outcome = loop {
            let n = match self.source.read(&mut buf).await {
                Ok(0) => break Ok(total),
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => break Err(e),
            };
            let mut i = 0;
            while i < self.sinks.len() {
                match self.sinks[i].writer.write_all(&buf[..n]).await {
                    Ok(()) => i += 1,
                    Err(error) => {
                        let dropped = self.sinks.remove(i);
                        TeeSinkDropped {
                            origin: &self.origin,
                            sink: &dropped.label,
                            error: &error,
                        }
                        .log();
                    }
                }
            }
            total += n as u64;
        };

        for sink in &mut self.sinks {
            let _ = sink.writer.flush().await;
            let _ = sink.writer.shutdown().await;
        }
        tracing::trace!(
            "{}",
            TeeFinished {
                origin: &self.origin,
                bytes: total,
                sinks: self.sinks.len(),
            }
        );
        outcome
    }

    pub(crate) fn spawn(self) -> JoinHandle<()> {
        let origin = self.origin.clone();
        tokio::spawn(async move {
            if let Err(error) = self.run().await {
                tracing::warn!(origin = %origin, error = %error, "stream copy failed");
            }
        })
    }
}
