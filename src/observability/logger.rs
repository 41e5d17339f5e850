// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Subscriber setup for build scripts.
//!
//! Lines look like `[0003] INFO  message {key=value ...}`, where the
//! bracketed number is whole seconds since the logger was installed.

use std::fmt;
use std::time::Instant;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, MakeWriter};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

use crate::config::Settings;

/// Install the build-script logger as the global subscriber, writing to stderr.
///
/// Returns false when a global subscriber is already set; the existing one
/// is left untouched.
pub fn init(settings: &Settings) -> bool {
    init_with_writer(settings, std::io::stderr)
}

/// Like [`init`], writing lines to `writer` instead of stderr
pub fn init_with_writer<W>(settings: &Settings, writer: W) -> bool
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    tracing::subscriber::set_global_default(subscriber(settings, writer)).is_ok()
}

fn subscriber<W>(settings: &Settings, writer: W) -> impl Subscriber + Send + Sync
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(settings.log_level.as_filter()))
        .with_writer(writer)
        .event_format(ElapsedFormat::new())
        .finish()
}

/// Event formatter producing `[SSSS] LEVEL message {k=v ...}`
pub struct ElapsedFormat {
    start: Instant,
}

impl ElapsedFormat {
    pub fn new() -> Self {
        Self { start: Instant::now() }
    }
}

impl Default for ElapsedFormat {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, N> FormatEvent<S, N> for ElapsedFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(&self, _ctx: &FmtContext<'_, S, N>, mut writer: Writer<'_>, event: &Event<'_>) -> fmt::Result {
        let level = match *event.metadata().level() {
            Level::ERROR => "ERROR",
            Level::WARN => "WARN ",
            Level::INFO => "INFO ",
            Level::DEBUG => "DEBUG",
            Level::TRACE => "TRACE",
        };
        let mut fields = FieldCollector::default();
        event.record(&mut fields);

        write!(
            writer,
            "[{:04}] {} {}",
            self.start.elapsed().as_secs(),
            level,
            fields.message
        )?;
        if !fields.pairs.is_empty() {
            write!(writer, " {{{}}}", fields.pairs.join(" "))?;
        }
        writeln!(writer)
    }
}

#[derive(Default)]
struct FieldCollector {
    message: String,
    pairs: Vec<String>,
}

impl Visit for FieldCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.pairs.push(format!("{}={}", field.name(), value));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.pairs.push(format!("{}={:?}", field.name(), value));
        }
    }
}
