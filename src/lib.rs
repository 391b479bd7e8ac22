//! # Paperless Checksum
//!
//! Webhook service that fingerprints an uploaded file and stamps the matching
//! Paperless-ngx document with its SHA-256.
//!
//! Paperless ingests documents asynchronously, so at the time the webhook
//! fires the document may not be searchable yet, or may be searchable by name
//! before its content is stored. The service therefore polls: it searches by
//! filename, downloads every candidate to compare digests, and retries a fixed
//! number of times with a fixed delay before giving up.
//!
//! ## Pipeline
//!
//! - [`fingerprint`]: SHA-256 + MD5 of the incoming stream in one pass
//! - [`reconcile::DocumentLocator`]: filename substring search
//! - [`reconcile::CandidateVerifier`]: streamed content digest comparison
//! - [`reconcile::Reconciler`]: the bounded retry state machine
//! - [`reconcile::MetadataWriter`]: the single custom-field update
//!
//! ## Example
//!
//! ```rust,ignore
//! use paperless_checksum::{ChecksumConfig, ChecksumService, PaperlessClient};
//!
//! let config = ChecksumConfig::from_env()?;
//! let client = PaperlessClient::new(&config.paperless)?;
//! let service = ChecksumService::new(client, &config)?;
//! let stored = service.process_reader("invoice.pdf", std::fs::File::open("invoice.pdf")?).await?;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod audit;
pub mod config;
pub mod fingerprint;
pub mod observability;
pub mod reconcile;
pub mod remote;
pub mod server;
pub mod services;

// Re-exports for convenience
pub use config::ChecksumConfig;
pub use fingerprint::{Fingerprint, FingerprintHasher};
pub use reconcile::{MatchResult, ReconciliationReport, Reconciler, RetryPolicy};
pub use remote::{DocumentId, DocumentService, PaperlessClient};
pub use services::ChecksumService;

/// Error type for checksum reconciliation.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When | HTTP |
/// |---------|-------------|------|
/// | `MissingInput` | Webhook request carries no `file` part | 400 |
/// | `NotFoundAfterRetries` | No content match within the attempt budget | 404 |
/// | `Transport` | Paperless unreachable, non-2xx status, undecodable body | 500 |
/// | `Io` | Reading the incoming upload fails | 500 |
/// | `Config` | Required environment missing or malformed | startup |
/// | `OperationFailed` | Server bind/serve, logging init | startup |
#[derive(Debug, ThisError)]
pub enum Error {
    /// The inbound request did not contain a file.
    #[error("missing input: {0}")]
    MissingInput(String),

    /// The document never appeared, or never matched by content.
    #[error("no document matching '{filename}' after {attempts} attempts")]
    NotFoundAfterRetries {
        /// Filename that was searched for.
        filename: String,
        /// Number of attempts performed.
        attempts: u32,
    },

    /// Communication with the document service failed.
    ///
    /// Raised when:
    /// - The connection cannot be established or times out
    /// - The service answers with a status >= 400
    /// - A response body cannot be decoded
    #[error("'{operation}' failed: {cause}")]
    Transport {
        /// The remote operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
        /// HTTP status, when a response was received.
        status: Option<u16>,
        /// Response body, when one could be read.
        body: Option<String>,
    },

    /// Reading the incoming stream failed.
    #[error("I/O during '{operation}': {cause}")]
    Io {
        /// The local operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// Configuration is missing or invalid.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// An operation failed.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

impl Error {
    /// Builds a transport error without response details.
    pub fn transport(operation: impl Into<String>, cause: impl ToString) -> Self {
        Self::Transport {
            operation: operation.into(),
            cause: cause.to_string(),
            status: None,
            body: None,
        }
    }

    /// Builds an I/O error for a local operation.
    pub fn io(operation: impl Into<String>, cause: impl ToString) -> Self {
        Self::Io {
            operation: operation.into(),
            cause: cause.to_string(),
        }
    }

    /// Returns `true` for failures talking to the document service.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// HTTP status reported to the webhook caller for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::MissingInput(_) => 400,
            Self::NotFoundAfterRetries { .. } => 404,
            Self::Transport { .. }
            | Self::Io { .. }
            | Self::Config(_)
            | Self::OperationFailed { .. } => 500,
        }
    }
}

/// Result type alias for checksum operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::MissingInput("no file part".to_string());
        assert_eq!(err.to_string(), "missing input: no file part");

        let err = Error::NotFoundAfterRetries {
            filename: "report.pdf".to_string(),
            attempts: 5,
        };
        assert_eq!(
            err.to_string(),
            "no document matching 'report.pdf' after 5 attempts"
        );

        let err = Error::transport("search_documents", "connection refused");
        assert_eq!(
            err.to_string(),
            "'search_documents' failed: connection refused"
        );
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(Error::MissingInput(String::new()).status_code(), 400);
        assert_eq!(
            Error::NotFoundAfterRetries {
                filename: String::new(),
                attempts: 5
            }
            .status_code(),
            404
        );
        assert_eq!(Error::transport("download_document", "eof").status_code(), 500);
        assert_eq!(Error::io("read_upload", "reset").status_code(), 500);
    }

    #[test]
    fn test_is_transport() {
        assert!(Error::transport("update_document", "503").is_transport());
        assert!(!Error::io("read_upload", "reset").is_transport());
    }
}
