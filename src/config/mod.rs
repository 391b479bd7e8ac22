//! Configuration management.
//!
//! Configuration is read once at startup from the process environment, after
//! loading a `.env` file from the working directory if one exists:
//!
//! ```text
//! PAPERLESS_API_URL=https://paperless.example.com
//! PAPERLESS_API_TOKEN=0123456789abcdef
//! PAPERLESS_CUSTOM_FIELD_ID=7
//! LOG_LEVEL=debug
//! ```
//!
//! The resulting [`ChecksumConfig`] is immutable and passed explicitly to the
//! services that need it.

use crate::observability::LogFormat;
use crate::{Error, Result};
use secrecy::SecretString;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Environment variable names.
pub mod env {
    /// Base URL of the Paperless instance.
    pub const API_URL: &str = "PAPERLESS_API_URL";
    /// Paperless API token.
    pub const API_TOKEN: &str = "PAPERLESS_API_TOKEN";
    /// Custom field receiving the SHA-256.
    pub const CUSTOM_FIELD_ID: &str = "PAPERLESS_CUSTOM_FIELD_ID";
    /// Request timeout for Paperless search and update calls; per-read for downloads.
    pub const TIMEOUT_MS: &str = "PAPERLESS_TIMEOUT_MS";
    /// Connect timeout for Paperless calls.
    pub const CONNECT_TIMEOUT_MS: &str = "PAPERLESS_CONNECT_TIMEOUT_MS";
    /// Log verbosity.
    pub const LOG_LEVEL: &str = "LOG_LEVEL";
    /// Log output format.
    pub const LOG_FORMAT: &str = "LOG_FORMAT";
    /// Path of the append-only checksum log.
    pub const CHECKSUM_LOG_PATH: &str = "CHECKSUM_LOG_PATH";
    /// Listen address of the webhook server.
    pub const BIND_ADDR: &str = "BIND_ADDR";
    /// Maximum accepted webhook body size.
    pub const MAX_UPLOAD_BYTES: &str = "MAX_UPLOAD_BYTES";
}

/// Default custom field id when none is configured.
pub const DEFAULT_CUSTOM_FIELD_ID: u64 = 1;

/// Default checksum log location, relative to the working directory.
pub const DEFAULT_CHECKSUM_LOG_PATH: &str = "logs/checksums.log";

/// Default listen address.
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5000";

/// Default request body limit (100 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

/// Connection settings for the Paperless API.
#[derive(Debug, Clone)]
pub struct PaperlessConfig {
    /// Base URL without trailing slash, e.g. `https://paperless.example.com`.
    pub base_url: String,
    /// API token sent as `Authorization: Token <token>`.
    pub token: SecretString,
    /// Id of the custom field that receives the SHA-256.
    pub custom_field_id: u64,
    /// Search/update timeout and download read timeout in milliseconds (0 disables).
    pub timeout_ms: u64,
    /// Connect timeout in milliseconds (0 disables).
    pub connect_timeout_ms: u64,
}

impl PaperlessConfig {
    /// Default request timeout.
    pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
    /// Default connect timeout.
    pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;

    /// Creates settings with default timeouts.
    #[must_use]
    pub fn new(base_url: impl Into<String>, token: impl Into<String>, custom_field_id: u64) -> Self {
        Self {
            base_url: normalize_base_url(&base_url.into()),
            token: SecretString::from(token.into()),
            custom_field_id,
            timeout_ms: Self::DEFAULT_TIMEOUT_MS,
            connect_timeout_ms: Self::DEFAULT_CONNECT_TIMEOUT_MS,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone)]
pub struct LoggingSettings {
    /// Filter directive, e.g. `info` or `paperless_checksum=debug`.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Main configuration for the checksum service.
#[derive(Debug, Clone)]
pub struct ChecksumConfig {
    /// Paperless connection settings.
    pub paperless: PaperlessConfig,
    /// Logging settings.
    pub logging: LoggingSettings,
    /// Append-only checksum log.
    pub checksum_log_path: PathBuf,
    /// Listen address of the webhook server.
    pub bind_addr: SocketAddr,
    /// Maximum accepted request body size.
    pub max_upload_bytes: usize,
}

impl ChecksumConfig {
    /// Loads `.env` (if present) and reads configuration from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a required variable is missing or a value
    /// cannot be parsed.
    pub fn from_env() -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                return Err(Error::Config(format!(".env: {e}")));
            }
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through an arbitrary key lookup.
    ///
    /// Empty values are treated as unset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a required key is missing or a value cannot
    /// be parsed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let (Some(base_url), Some(token)) = (get(env::API_URL), get(env::API_TOKEN)) else {
            return Err(Error::Config(format!(
                "{} and {} must be set",
                env::API_URL,
                env::API_TOKEN
            )));
        };

        let base_url = normalize_base_url(&base_url);
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(Error::Config(format!(
                "{} must be an http(s) URL: {base_url}",
                env::API_URL
            )));
        }

        let custom_field_id =
            parse_or(get(env::CUSTOM_FIELD_ID), env::CUSTOM_FIELD_ID, DEFAULT_CUSTOM_FIELD_ID)?;
        let timeout_ms = parse_or(
            get(env::TIMEOUT_MS),
            env::TIMEOUT_MS,
            PaperlessConfig::DEFAULT_TIMEOUT_MS,
        )?;
        let connect_timeout_ms = parse_or(
            get(env::CONNECT_TIMEOUT_MS),
            env::CONNECT_TIMEOUT_MS,
            PaperlessConfig::DEFAULT_CONNECT_TIMEOUT_MS,
        )?;

        let logging = LoggingSettings {
            level: get(env::LOG_LEVEL).map_or_else(|| "info".to_string(), |l| l.to_lowercase()),
            format: get(env::LOG_FORMAT)
                .map(|f| f.parse::<LogFormat>())
                .transpose()?
                .unwrap_or_default(),
        };

        let bind_addr = get(env::BIND_ADDR)
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| Error::Config(format!("{}: {e}", env::BIND_ADDR)))?;

        Ok(Self {
            paperless: PaperlessConfig {
                base_url,
                token: SecretString::from(token),
                custom_field_id,
                timeout_ms,
                connect_timeout_ms,
            },
            logging,
            checksum_log_path: get(env::CHECKSUM_LOG_PATH)
                .map_or_else(|| PathBuf::from(DEFAULT_CHECKSUM_LOG_PATH), PathBuf::from),
            bind_addr,
            max_upload_bytes: parse_or(
                get(env::MAX_UPLOAD_BYTES),
                env::MAX_UPLOAD_BYTES,
                DEFAULT_MAX_UPLOAD_BYTES,
            )?,
        })
    }

    /// Overrides the listen address.
    #[must_use]
    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }
}

fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

fn parse_or<T>(value: Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.map_or(Ok(default), |v| {
        v.trim()
            .parse()
            .map_err(|e| Error::Config(format!("{key}={v}: {e}")))
    })
}
