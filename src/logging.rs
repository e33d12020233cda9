//! Structured logging setup and the technical-error log sink.
//!
//! Logging goes through `tracing`. [`init_logging_with_config`] installs a subscriber with an
//! `EnvFilter` and a JSON or pretty `fmt` layer, configured from `BODISPATCH_LOG_*`
//! environment variables:
//!
//! | Variable | Default | Meaning |
//! |---|---|---|
//! | `BODISPATCH_LOG_LEVEL` | `info` | base level, overridden by `RUST_LOG` |
//! | `BODISPATCH_LOG_FORMAT` | `json` | `json` or `pretty` |
//! | `BODISPATCH_LOG_TARGETS` | unset | extra comma-separated filter directives |
//! | `BODISPATCH_LOG_ASYNC` | `false` | buffer output through a background writer |
//! | `BODISPATCH_LOG_LOCATION` | `false` | include file and line |
//!
//! Technical errors are reported through the [`ErrorLog`] trait so that the sink can be
//! replaced (tests install a recording implementation).

use anyhow::{Context, Result};
use std::env;
use tracing::{error, Level};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::ids::RequestId;

/// Log format: JSON for production, pretty-print for development
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            _ => LogFormat::Json,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// trace/debug/info/warn/error
    pub log_level: String,
    pub format: LogFormat,
    /// Extra `EnvFilter` directives, comma-separated
    pub target_filter: Option<String>,
    pub async_logging: bool,
    /// Include file:line (dev only)
    pub include_location: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            format: LogFormat::Json,
            target_filter: None,
            async_logging: false,
            include_location: false,
        }
    }
}

impl LogConfig {
    /// Read the configuration from `BODISPATCH_LOG_*`, falling back to the defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Self {
        let flag = |key: &str| lookup(key).and_then(|s| s.trim().parse().ok());
        let defaults = Self::default();
        Self {
            log_level: lookup("BODISPATCH_LOG_LEVEL").unwrap_or(defaults.log_level),
            format: lookup("BODISPATCH_LOG_FORMAT")
                .map(|s| LogFormat::parse(&s))
                .unwrap_or(defaults.format),
            target_filter: lookup("BODISPATCH_LOG_TARGETS").filter(|s| !s.trim().is_empty()),
            async_logging: flag("BODISPATCH_LOG_ASYNC").unwrap_or(defaults.async_logging),
            include_location: flag("BODISPATCH_LOG_LOCATION").unwrap_or(defaults.include_location),
        }
    }

    /// Debug level, pretty output with locations.
    #[must_use]
    pub fn default_dev() -> Self {
        Self {
            log_level: "debug".to_string(),
            format: LogFormat::Pretty,
            target_filter: None,
            async_logging: false,
            include_location: true,
        }
    }

    fn level(&self) -> Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }

    fn env_filter(&self) -> EnvFilter {
        let mut filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.level().as_str()));
        if let Some(targets) = &self.target_filter {
            for directive in targets.split(',').map(str::trim).filter(|d| !d.is_empty()) {
                match directive.parse() {
                    Ok(d) => filter = filter.add_directive(d),
                    Err(_) => eprintln!("Warning: invalid log filter directive: {directive}"),
                }
            }
        }
        filter
    }
}

/// Install the global subscriber.
///
/// Fails when a global subscriber is already set.
///
/// ```no_run
/// use bodispatch::logging::{init_logging_with_config, LogConfig};
///
/// init_logging_with_config(&LogConfig::from_env()).expect("logging");
/// ```
pub fn init_logging_with_config(config: &LogConfig) -> Result<()> {
    let registry = tracing_subscriber::registry().with(config.env_filter());

    if config.async_logging {
        let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());
        let layer = match config.format {
            LogFormat::Json => tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_target(true)
                .with_file(config.include_location)
                .with_line_number(config.include_location)
                .with_writer(writer)
                .boxed(),
            LogFormat::Pretty => tracing_subscriber::fmt::layer()
                .pretty()
                .with_target(true)
                .with_file(config.include_location)
                .with_line_number(config.include_location)
                .with_writer(writer)
                .boxed(),
        };
        registry
            .with(layer)
            .try_init()
            .context("Failed to initialize async logging")?;
        // the writer flushes until the guard drops; keep it for the process lifetime
        std::mem::forget(guard);
    } else {
        let layer = match config.format {
            LogFormat::Json => tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_target(true)
                .with_file(config.include_location)
                .with_line_number(config.include_location)
                .boxed(),
            LogFormat::Pretty => tracing_subscriber::fmt::layer()
                .pretty()
                .with_target(true)
                .with_file(config.include_location)
                .with_line_number(config.include_location)
                .boxed(),
        };
        registry
            .with(layer)
            .try_init()
            .context("Failed to initialize sync logging")?;
    }
    Ok(())
}

/// Sink for technical errors: message plus full call trace. Must never fail.
pub trait ErrorLog: Send + Sync {
    fn log(&self, request_id: RequestId, message: &str, trace: &str);
}

/// Default [`ErrorLog`]: one `error!` event per technical error.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingErrorLog;

impl ErrorLog for TracingErrorLog {
    fn log(&self, request_id: RequestId, message: &str, trace: &str) {
        error!(request_id = %request_id, message = %message, trace = %trace, "Technical error");
    }
}
