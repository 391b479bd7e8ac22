//! Terminal metadata write.

use super::MatchResult;
use crate::Result;
use crate::remote::{CustomFieldUpdate, DocumentService};

/// Writes the fingerprint into the matched document's custom field.
///
/// Issues exactly one update request per call and never retries: the write is
/// not idempotent from this side, so a failure goes straight to the caller.
pub struct MetadataWriter<'a, S> {
    service: &'a S,
    custom_field_id: u64,
}

impl<'a, S: DocumentService> MetadataWriter<'a, S> {
    /// Creates a writer targeting `custom_field_id`.
    #[must_use]
    pub const fn new(service: &'a S, custom_field_id: u64) -> Self {
        Self {
            service,
            custom_field_id,
        }
    }

    /// Stores the SHA-256 of `matched` on its document.
    ///
    /// Consumes the match so one reconciliation can write at most once.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Transport`] if the update request fails.
    pub async fn write(&self, matched: MatchResult) -> Result<MatchResult> {
        let update = CustomFieldUpdate {
            field: self.custom_field_id,
            value: matched.fingerprint.sha256.clone(),
        };
        self.service
            .update_custom_field(matched.document_id, &update)
            .await?;
        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::Fingerprint;
    use crate::remote::DocumentId;
    use crate::remote::mock::MockDocumentService;

    fn matched() -> MatchResult {
        MatchResult {
            document_id: DocumentId(42),
            fingerprint: Fingerprint::of_bytes(b"invoice"),
        }
    }

    #[tokio::test]
    async fn test_write_sets_configured_field() {
        let mock = MockDocumentService::new();

        let written = MetadataWriter::new(&mock, 9)
            .write(matched())
            .await
            .expect("write");

        let updates = mock.updates.lock().expect("lock");
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].0, DocumentId(42));
        assert_eq!(updates[0].1.field, 9);
        assert_eq!(updates[0].1.value, written.fingerprint.sha256);
    }

    #[tokio::test]
    async fn test_write_failure_not_retried() {
        let mock = MockDocumentService::new();
        mock.fail_updates("HTTP 500 Internal Server Error");

        let err = MetadataWriter::new(&mock, 1)
            .write(matched())
            .await
            .expect_err("should fail");

        assert!(err.is_transport());
        assert_eq!(mock.update_count(), 1);
    }
}
