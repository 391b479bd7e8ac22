//! Content verification of filename candidates.

use crate::Result;
use crate::fingerprint::{Fingerprint, Sha256Hasher};
use crate::remote::{CandidateDocument, ContentStream, DocumentId, DocumentService};

/// Confirms candidates by streaming their content and comparing SHA-256.
///
/// Each body is read to the end before its digest is taken; the stream is an
/// owned value and is released when it goes out of scope, on success,
/// mismatch and error alike.
pub struct CandidateVerifier<'a, S> {
    service: &'a S,
}

impl<'a, S: DocumentService> CandidateVerifier<'a, S> {
    /// Creates a verifier over a document service.
    #[must_use]
    pub const fn new(service: &'a S) -> Self {
        Self { service }
    }

    /// Streams a document and returns its lowercase hex SHA-256.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Transport`] if the download fails at any point.
    pub async fn digest(&self, id: DocumentId) -> Result<String> {
        let mut content = self.service.download(id).await?;
        let mut hasher = Sha256Hasher::new();
        while let Some(chunk) = content.next_chunk().await? {
            hasher.update(&chunk);
        }
        Ok(hasher.finish_hex())
    }

    /// Returns the first candidate whose content matches `fingerprint`.
    ///
    /// Candidates are checked in the given order and checking stops at the
    /// first match, so later byte-identical duplicates are never downloaded.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Transport`] on the first failed download.
    pub async fn find_match(
        &self,
        candidates: &[CandidateDocument],
        fingerprint: &Fingerprint,
    ) -> Result<Option<DocumentId>> {
        for candidate in candidates {
            tracing::debug!(document_id = %candidate.id, "Checking document");
            let digest = self.digest(candidate.id).await?;
            tracing::debug!(document_id = %candidate.id, sha256 = %digest, "SHA256 of remote file");

            if fingerprint.matches_sha256(&digest) {
                return Ok(Some(candidate.id));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::EMPTY_SHA256;
    use crate::remote::mock::{MockDocumentService, Reply};

    #[tokio::test]
    async fn test_digest_streams_whole_body() {
        let mock = MockDocumentService::new();
        mock.set_content(5, Reply::Ok(b"chunked remote content".to_vec()));

        let digest = CandidateVerifier::new(&mock)
            .digest(DocumentId(5))
            .await
            .expect("digest");

        assert_eq!(digest, Fingerprint::of_bytes(b"chunked remote content").sha256);
        assert_eq!(mock.released_count(), 1);
    }

    #[tokio::test]
    async fn test_digest_of_empty_document() {
        let mock = MockDocumentService::new();
        mock.set_content(5, Reply::Ok(Vec::new()));

        let digest = CandidateVerifier::new(&mock)
            .digest(DocumentId(5))
            .await
            .expect("digest");

        assert_eq!(digest, EMPTY_SHA256);
    }

    #[tokio::test]
    async fn test_first_match_wins() {
        let mock = MockDocumentService::new();
        mock.set_content(1, Reply::Ok(b"other".to_vec()))
            .set_content(2, Reply::Ok(b"target".to_vec()))
            .set_content(3, Reply::Ok(b"target".to_vec()));
        let candidates = vec![
            CandidateDocument::new(1, "a.pdf"),
            CandidateDocument::new(2, "a.pdf"),
            CandidateDocument::new(3, "a (1).pdf"),
        ];

        let found = CandidateVerifier::new(&mock)
            .find_match(&candidates, &Fingerprint::of_bytes(b"target"))
            .await
            .expect("verify");

        assert_eq!(found, Some(DocumentId(2)));
        assert_eq!(
            *mock.downloaded.lock().expect("lock"),
            vec![DocumentId(1), DocumentId(2)]
        );
        assert_eq!(mock.released_count(), 2);
    }

    #[tokio::test]
    async fn test_no_match() {
        let mock = MockDocumentService::new();
        mock.set_content(1, Reply::Ok(b"stale".to_vec()));

        let found = CandidateVerifier::new(&mock)
            .find_match(
                &[CandidateDocument::new(1, "a.pdf")],
                &Fingerprint::of_bytes(b"fresh"),
            )
            .await
            .expect("verify");

        assert_eq!(found, None);
        assert_eq!(mock.released_count(), 1);
    }

    #[tokio::test]
    async fn test_download_failure_stops_verification() {
        let mock = MockDocumentService::new();
        mock.set_content(1, Reply::Fail("connection reset".to_string()))
            .set_content(2, Reply::Ok(b"target".to_vec()));

        let err = CandidateVerifier::new(&mock)
            .find_match(
                &[
                    CandidateDocument::new(1, "a.pdf"),
                    CandidateDocument::new(2, "a.pdf"),
                ],
                &Fingerprint::of_bytes(b"target"),
            )
            .await
            .expect_err("should fail");

        assert!(err.is_transport());
        assert_eq!(mock.download_count(), 1);
    }
}
