// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::config::consts::{ENV_LOG_LEVEL, ENV_REBUILD_DISABLE};
use std::fmt;
use std::str::FromStr;

/// Verbosity of the build-script logger.
///
/// Parsed case-insensitively from `debug`, `info`, `warn` or `error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_filter())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

/// Settings a build script reads from its environment.
///
/// These are passed explicitly to the logger and the rebuild bootstrap rather
/// than living in process-wide variables.
///
/// # Fields
/// * `log_level` - from `PIPEWRIGHT_LOG_LEVEL`, unknown values fall back to `info`
/// * `rebuild_disabled` - true when `PIPEWRIGHT_REBUILD_DISABLE` is set to anything non-empty
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    pub log_level: LogLevel,
    pub rebuild_disabled: bool,
}

impl Settings {
    /// Read settings from the current process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let log_level = lookup(ENV_LOG_LEVEL)
            .and_then(|v| v.parse().ok())
            .unwrap_or_default();
        let rebuild_disabled = lookup(ENV_REBUILD_DISABLE)
            .map(|v| !v.is_empty())
            .unwrap_or(false);
        Self {
            log_level,
            rebuild_disabled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let settings = Settings::from_lookup(|_| None);
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.log_level, LogLevel::Info);
        assert!(!settings.rebuild_disabled);
    }

    #[test]
    fn test_reads_level_and_rebuild_flag() {
        let settings = Settings::from_lookup(lookup_from(&[
            (ENV_LOG_LEVEL, "DEBUG"),
            (ENV_REBUILD_DISABLE, "1"),
        ]));
        assert_eq!(settings.log_level, LogLevel::Debug);
        assert!(settings.rebuild_disabled);
    }

    #[test]
    fn test_empty_rebuild_flag_does_not_disable() {
        let settings = Settings::from_lookup(lookup_from(&[(ENV_REBUILD_DISABLE, "")]));
        assert!(!settings.rebuild_disabled);
    }

    #[test]
    fn test_unknown_level_falls_back_to_info() {
        let settings = Settings::from_lookup(lookup_from(&[(ENV_LOG_LEVEL, "chatty")]));
        assert_eq!(settings.log_level, LogLevel::Info);
        assert!("chatty".parse::<LogLevel>().is_err());
    }
}
