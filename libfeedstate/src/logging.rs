//! Logging setup for applications embedding feedstate
//!
//! The library only emits `tracing` events. Hosts that do not install their
//! own subscriber can call [`init_default`] (or build a [`LoggingConfig`])
//! to get text, JSON, or pretty output on stderr with `EnvFilter`
//! directives such as `libfeedstate::pagination=debug`.
//!
//! # Examples
//!
//! ```no_run
//! use libfeedstate::logging::{LogFormat, LoggingConfig};
//!
//! LoggingConfig::new(LogFormat::Json, "info").init();
//!
//! // Or read FEEDSTATE_LOG_FORMAT / FEEDSTATE_LOG_LEVEL
//! libfeedstate::logging::init_default();
//! ```

use std::str::FromStr;

use tracing_subscriber::EnvFilter;

const FORMAT_VAR: &str = "FEEDSTATE_LOG_FORMAT";
const LEVEL_VAR: &str = "FEEDSTATE_LOG_LEVEL";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Plain lines without colors, suitable for piping
    #[default]
    Text,
    /// One JSON object per line
    Json,
    /// Multi-line colored output for development
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            other => Err(format!(
                "Invalid log format: '{}'. Valid options: text, json, pretty",
                other
            )),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LogFormat::Text => "text",
            LogFormat::Json => "json",
            LogFormat::Pretty => "pretty",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::new(LogFormat::Text, "info")
    }
}

impl LoggingConfig {
    pub fn new(format: LogFormat, level: impl Into<String>) -> Self {
        Self {
            format,
            level: level.into(),
        }
    }

    /// Read `FEEDSTATE_LOG_FORMAT` and `FEEDSTATE_LOG_LEVEL`
    ///
    /// Unset or unparseable values fall back to text output at info level.
    pub fn from_env() -> Self {
        let format = std::env::var(FORMAT_VAR)
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or_default();
        let level = std::env::var(LEVEL_VAR).unwrap_or_else(|_| "info".to_string());

        Self::new(format, level)
    }

    /// `RUST_LOG` wins over the configured level
    pub fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level))
    }

    /// Install a global subscriber writing to stderr
    ///
    /// Returns `false` when a subscriber was already installed, in which case
    /// the existing one is left alone.
    pub fn init(&self) -> bool {
        let builder = tracing_subscriber::fmt()
            .with_env_filter(self.filter())
            .with_writer(std::io::stderr);

        let installed = match self.format {
            LogFormat::Json => builder
                .json()
                .flatten_event(true)
                .with_current_span(true)
                .with_target(true)
                .try_init(),
            LogFormat::Pretty => builder
                .pretty()
                .with_file(true)
                .with_line_number(true)
                .try_init(),
            LogFormat::Text => builder.with_target(false).with_ansi(false).try_init(),
        };

        installed.is_ok()
    }
}

/// Install logging configured from the environment
pub fn init_default() -> bool {
    LoggingConfig::from_env().init()
}
