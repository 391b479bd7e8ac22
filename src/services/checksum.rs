//! End-to-end handling of one incoming file.

use crate::audit::ChecksumLog;
use crate::config::ChecksumConfig;
use crate::fingerprint::Fingerprint;
use crate::reconcile::{MatchResult, MetadataWriter, Reconciler, RetryPolicy};
use crate::remote::DocumentService;
use crate::{Error, Result};
use std::io::Read;

/// Fingerprints incoming files and stamps the matching Paperless document.
///
/// One instance is shared by all requests. It holds no per-request state;
/// the only shared resource is the append-only checksum log.
pub struct ChecksumService<S> {
    documents: S,
    custom_field_id: u64,
    policy: RetryPolicy,
    checksum_log: ChecksumLog,
}

impl<S: DocumentService> ChecksumService<S> {
    /// Creates a service with the default retry policy.
    ///
    /// # Errors
    ///
    /// Returns an error if the checksum log directory cannot be created.
    pub fn new(documents: S, config: &ChecksumConfig) -> Result<Self> {
        let checksum_log = ChecksumLog::new(&config.checksum_log_path)?;
        Ok(Self::with_parts(
            documents,
            config.paperless.custom_field_id,
            RetryPolicy::default(),
            checksum_log,
        ))
    }

    /// Creates a service from explicit parts.
    #[must_use]
    pub const fn with_parts(
        documents: S,
        custom_field_id: u64,
        policy: RetryPolicy,
        checksum_log: ChecksumLog,
    ) -> Self {
        Self {
            documents,
            custom_field_id,
            policy,
            checksum_log,
        }
    }

    /// Fingerprints a reader and processes it.
    ///
    /// # Errors
    ///
    /// See [`ChecksumService::process`]; read failures are [`Error::Io`].
    pub async fn process_reader<R: Read>(&self, filename: &str, mut reader: R) -> Result<MatchResult> {
        let fingerprint = Fingerprint::from_reader(&mut reader)?;
        self.process(filename, fingerprint).await
    }

    /// Records the fingerprint, reconciles it and writes it to the match.
    ///
    /// The metadata write happens at most once, and only after a content
    /// match. Failures are logged here, once, before being returned.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingInput`] if `filename` is empty
    /// - [`Error::NotFoundAfterRetries`] if no document matched in time
    /// - [`Error::Transport`] if talking to Paperless failed at any stage
    pub async fn process(&self, filename: &str, fingerprint: Fingerprint) -> Result<MatchResult> {
        if filename.is_empty() {
            return Err(Error::MissingInput("file has no name".to_string()));
        }

        tracing::info!(
            filename,
            sha256 = %fingerprint.sha256,
            md5 = %fingerprint.md5,
            "File fingerprinted"
        );

        if let Err(e) = self.checksum_log.record(filename, &fingerprint) {
            tracing::warn!(error = %e, path = %self.checksum_log.path().display(), "Failed to append checksum log");
        }

        let report = Reconciler::new(&self.documents, self.policy)
            .run(filename, &fingerprint)
            .await;
        let matched = report.into_result().inspect_err(log_failure)?;

        tracing::info!(
            filename,
            document_id = %matched.document_id,
            "Match found, updating custom field"
        );

        let written = MetadataWriter::new(&self.documents, self.custom_field_id)
            .write(matched)
            .await
            .inspect_err(log_failure)?;

        metrics::counter!("checksum_documents_updated_total").increment(1);
        Ok(written)
    }
}

/// Logs a terminal failure.
fn log_failure(error: &Error) {
    match error {
        Error::Transport {
            operation,
            cause,
            status,
            body,
        } => {
            metrics::counter!("checksum_transport_errors_total").increment(1);
            tracing::error!(
                operation = %operation,
                cause = %cause,
                status = ?status,
                response_text = body.as_deref().unwrap_or("N/A"),
                "Error during API communication"
            );
        },
        Error::NotFoundAfterRetries { filename, attempts } => {
            metrics::counter!("checksum_not_found_total").increment(1);
            tracing::error!(
                filename = %filename,
                attempts,
                "Could not find a matching document"
            );
        },
        other => tracing::error!(error = %other, "Reconciliation failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::mock::{MockDocumentService, Reply};
    use crate::remote::{CandidateDocument, DocumentId, SearchResponse};
    use std::io::Cursor;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn service(mock: &Arc<MockDocumentService>, dir: &TempDir) -> ChecksumService<Arc<MockDocumentService>> {
        let log = ChecksumLog::new(dir.path().join("checksums.log")).expect("log");
        ChecksumService::with_parts(Arc::clone(mock), 4, RetryPolicy::default(), log)
    }

    #[tokio::test(start_paused = true)]
    async fn test_match_writes_once_and_logs_checksum() {
        let dir = TempDir::new().expect("temp dir");
        let mock = Arc::new(MockDocumentService::new());
        mock.queue_search(Reply::Ok(SearchResponse::with_results(vec![
            CandidateDocument::new(41, "invoice.pdf"),
            CandidateDocument::new(42, "invoice.pdf"),
        ])));
        mock.set_content(41, Reply::Ok(b"not it".to_vec()))
            .set_content(42, Reply::Ok(b"%PDF-1.7 invoice".to_vec()));

        let matched = service(&mock, &dir)
            .process_reader("invoice.pdf", Cursor::new(b"%PDF-1.7 invoice".to_vec()))
            .await
            .expect("process");

        assert_eq!(matched.document_id, DocumentId(42));
        let updates = mock.updates.lock().expect("lock");
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].1.field, 4);
        assert_eq!(updates[0].1.value, matched.fingerprint.sha256);

        let log = std::fs::read_to_string(dir.path().join("checksums.log")).expect("read");
        assert!(log.contains(&format!(
            ",invoice.pdf,{},{}",
            matched.fingerprint.sha256, matched.fingerprint.md5
        )));
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_logs_checksum_without_write() {
        let dir = TempDir::new().expect("temp dir");
        let mock = Arc::new(MockDocumentService::new());

        let err = service(&mock, &dir)
            .process("report.pdf", Fingerprint::of_bytes(b"report"))
            .await
            .expect_err("not found");

        assert_eq!(err.status_code(), 404);
        assert_eq!(mock.search_count(), 5);
        assert_eq!(mock.update_count(), 0);
        let log = std::fs::read_to_string(dir.path().join("checksums.log")).expect("read");
        assert_eq!(log.lines().count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_failure_is_transport_error() {
        let dir = TempDir::new().expect("temp dir");
        let mock = Arc::new(MockDocumentService::new());
        mock.queue_search(Reply::Ok(SearchResponse::with_results(vec![
            CandidateDocument::new(1, "a.pdf"),
        ])));
        mock.set_content(1, Reply::Ok(b"a".to_vec()));
        mock.fail_updates("HTTP 400 Bad Request");

        let err = service(&mock, &dir)
            .process("a.pdf", Fingerprint::of_bytes(b"a"))
            .await
            .expect_err("write fails");

        assert!(err.is_transport());
        assert_eq!(mock.update_count(), 1);
        assert_eq!(mock.search_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_filename_is_missing_input() {
        let dir = TempDir::new().expect("temp dir");
        let mock = Arc::new(MockDocumentService::new());

        let err = service(&mock, &dir)
            .process("", Fingerprint::of_bytes(b"a"))
            .await
            .expect_err("missing");

        assert!(matches!(err, Error::MissingInput(_)));
        assert_eq!(mock.search_count(), 0);
    }

    #[tokio::test]
    async fn test_unwritable_checksum_log_does_not_abort() {
        let dir = TempDir::new().expect("temp dir");
        // A directory at the log path makes every append fail.
        let log_path = dir.path().join("checksums.log");
        std::fs::create_dir_all(&log_path).expect("mkdir");
        let mock = Arc::new(MockDocumentService::new());
        mock.queue_search(Reply::Ok(SearchResponse::with_results(vec![
            CandidateDocument::new(3, "b.pdf"),
        ])));
        mock.set_content(3, Reply::Ok(b"b".to_vec()));
        let service = ChecksumService::with_parts(
            Arc::clone(&mock),
            1,
            RetryPolicy::default(),
            ChecksumLog::new(&log_path).expect("log"),
        );

        let matched = service
            .process("b.pdf", Fingerprint::of_bytes(b"b"))
            .await
            .expect("process");

        assert_eq!(matched.document_id, DocumentId(3));
    }
}
