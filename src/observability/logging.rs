//! Structured logging configuration.

use crate::config::LoggingSettings;
use crate::{Error, Result};
use tracing_subscriber::EnvFilter;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(Error::Config(format!("unknown log format: {other}"))),
        }
    }
}

/// Resolved logging configuration.
#[derive(Debug)]
pub struct LoggingConfig {
    /// Event filter.
    pub filter: EnvFilter,
    /// Output format.
    pub format: LogFormat,
}

impl LoggingConfig {
    /// Builds the logging configuration.
    ///
    /// `RUST_LOG` wins over the configured level when set; `verbose` forces
    /// `debug` for this crate on top of either.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the level is not a valid filter directive.
    pub fn from_settings(settings: &LoggingSettings, verbose: bool) -> Result<Self> {
        let rust_log = std::env::var(EnvFilter::DEFAULT_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty());

        let filter = match rust_log {
            Some(directives) => EnvFilter::try_new(&directives)
                .map_err(|e| Error::Config(format!("RUST_LOG '{directives}': {e}")))?,
            None => build_filter(&settings.level)?,
        };

        Ok(Self {
            filter: with_verbose(filter, verbose)?,
            format: settings.format,
        })
    }
}

/// Builds an [`EnvFilter`] from level names or filter directives.
///
/// Bare words must be level names. `warning`, `critical`, `fatal` and
/// `notset` are accepted as aliases, so `LOG_LEVEL=WARNING` keeps working.
///
/// # Errors
///
/// Returns [`Error::Config`] for unknown level names or malformed directives.
pub fn build_filter(directives: &str) -> Result<EnvFilter> {
    let normalized = directives
        .split(',')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(normalize_directive)
        .collect::<Result<Vec<_>>>()?
        .join(",");

    EnvFilter::try_new(&normalized)
        .map_err(|e| Error::Config(format!("log level '{directives}': {e}")))
}

fn with_verbose(filter: EnvFilter, verbose: bool) -> Result<EnvFilter> {
    if !verbose {
        return Ok(filter);
    }
    let directive = "paperless_checksum=debug"
        .parse()
        .map_err(|e| Error::Config(format!("verbose directive: {e}")))?;
    Ok(filter.add_directive(directive))
}

/// Maps level aliases; `target=level` directives keep their target.
fn normalize_directive(directive: &str) -> Result<String> {
    if directive.contains(['[', ':']) {
        return Ok(directive.to_string());
    }
    match directive.rsplit_once('=') {
        Some((target, level)) => Ok(format!("{target}={}", level_name(level)?)),
        None => level_name(directive).map(str::to_string),
    }
}

fn level_name(level: &str) -> Result<&'static str> {
    match level.trim().to_lowercase().as_str() {
        "trace" | "notset" => Ok("trace"),
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" | "critical" | "fatal" => Ok("error"),
        "off" => Ok("off"),
        other => Err(Error::Config(format!("unknown log level: {other}"))),
    }
}
