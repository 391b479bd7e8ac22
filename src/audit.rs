//! Append-only checksum log.
//!
//! Every incoming file gets one line, written before reconciliation starts,
//! whether or not a matching document is ever found:
//!
//! ```text
//! 2024-05-01 14:03:12, orig_name_sha256_md5,invoice.pdf,<sha256>,<md5>
//! ```
//!
//! The log is a write-only side channel. Nothing in this crate reads it back.

use crate::fingerprint::Fingerprint;
use crate::{Error, Result};
use chrono::{DateTime, Local};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Record type tag of checksum lines.
pub const RECORD_TAG: &str = "orig_name_sha256_md5";

/// Timestamp format of checksum lines.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One checksum log entry.
#[derive(Debug, Clone)]
pub struct ChecksumRecord<'a> {
    /// Time the file was received.
    pub timestamp: DateTime<Local>,
    /// Original filename.
    pub filename: &'a str,
    /// Fingerprint of the file.
    pub fingerprint: &'a Fingerprint,
}

impl<'a> ChecksumRecord<'a> {
    /// Creates a record stamped with the current local time.
    #[must_use]
    pub fn now(filename: &'a str, fingerprint: &'a Fingerprint) -> Self {
        Self {
            timestamp: Local::now(),
            filename,
            fingerprint,
        }
    }

    /// Formats the record as a log line, without trailing newline.
    ///
    /// Line breaks in the filename are replaced so one record stays one line.
    #[must_use]
    pub fn to_line(&self) -> String {
        let filename = self.filename.replace(['\n', '\r'], " ");
        format!(
            "{}, {RECORD_TAG},{filename},{},{}",
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.fingerprint.sha256,
            self.fingerprint.md5
        )
    }
}

/// Appends checksum records to a file.
///
/// Writes from concurrent requests are serialized so lines never interleave.
pub struct ChecksumLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ChecksumLog {
    /// Opens the log, creating its parent directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| Error::OperationFailed {
                operation: "create_checksum_log_dir".to_string(),
                cause: format!("{}: {e}", parent.display()),
            })?;
        }

        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    /// Path of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be opened or written.
    pub fn append(&self, record: &ChecksumRecord<'_>) -> Result<()> {
        let line = record.to_line();
        let _guard = self
            .lock
            .lock()
            .map_err(|e| Error::io("append_checksum_log", e))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| Error::io("open_checksum_log", format!("{}: {e}", self.path.display())))?;

        writeln!(file, "{line}").map_err(|e| Error::io("append_checksum_log", e))
    }

    /// Appends a record for `filename` stamped with the current time.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be opened or written.
    pub fn record(&self, filename: &str, fingerprint: &Fingerprint) -> Result<()> {
        self.append(&ChecksumRecord::now(filename, fingerprint))
    }
}
