//! Document-management service API.
//!
//! The reconciliation core talks to Paperless only through the
//! [`DocumentService`] trait, so it can run against a scripted mock in tests.
//! [`PaperlessClient`] is the HTTP implementation.
//!
//! # Wire shapes
//!
//! | Call | Request | Response |
//! |------|---------|----------|
//! | search | `GET /api/documents/?original_filename__icontains=<name>` | `{ "count": n, "results": [{ "id": 42, ... }] }` |
//! | download | `GET /api/documents/{id}/download/` | raw bytes |
//! | update | `PATCH /api/documents/{id}/` `{ "custom_fields": [{ "field": f, "value": v }] }` | document |

mod paperless;

pub use paperless::{PaperlessClient, PaperlessContent};

use crate::Result;
use axum::body::Bytes;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;

/// Identifier of a remote document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub u64);

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A document returned by a filename search.
///
/// The name only contains the query; it is not proof of identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateDocument {
    /// Remote document id.
    pub id: DocumentId,
    /// Original filename as stored remotely, when reported.
    #[serde(default, rename = "original_file_name")]
    pub filename: Option<String>,
}

impl CandidateDocument {
    /// Creates a candidate.
    #[must_use]
    pub fn new(id: u64, filename: impl Into<String>) -> Self {
        Self {
            id: DocumentId(id),
            filename: Some(filename.into()),
        }
    }
}

/// Response of a filename search.
///
/// `count` is the total number of hits reported by the service and may
/// exceed `results.len()` when the service paginates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Total hits.
    #[serde(default)]
    pub count: u64,
    /// Candidates on this page, in service order.
    #[serde(default)]
    pub results: Vec<CandidateDocument>,
}

impl SearchResponse {
    /// An empty response.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            count: 0,
            results: Vec::new(),
        }
    }

    /// A single page holding every given candidate.
    #[must_use]
    pub fn with_results(results: Vec<CandidateDocument>) -> Self {
        Self {
            count: results.len() as u64,
            results,
        }
    }
}

/// One entry of a custom-field update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomFieldUpdate {
    /// Custom field id.
    pub field: u64,
    /// New value.
    pub value: String,
}

/// Body of the document update request.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct UpdateDocumentBody<'a> {
    pub custom_fields: [&'a CustomFieldUpdate; 1],
}

/// A streamed document body.
///
/// Dropping the value releases the underlying connection.
pub trait ContentStream: Send {
    /// Returns the next chunk, or `None` at end of body.
    fn next_chunk(&mut self) -> impl Future<Output = Result<Option<Bytes>>> + Send;
}

/// Operations the reconciliation needs from the document service.
///
/// Every method maps to exactly one HTTP request. Failures are
/// [`crate::Error::Transport`]; implementations never retry.
pub trait DocumentService: Send + Sync {
    /// Streamed content type returned by [`DocumentService::download`].
    type Content: ContentStream;

    /// Searches documents whose original filename contains `filename`.
    fn search_by_filename(
        &self,
        filename: &str,
    ) -> impl Future<Output = Result<SearchResponse>> + Send;

    /// Opens a document's original content as a stream.
    fn download(&self, id: DocumentId) -> impl Future<Output = Result<Self::Content>> + Send;

    /// Sets one custom field on a document.
    fn update_custom_field(
        &self,
        id: DocumentId,
        update: &CustomFieldUpdate,
    ) -> impl Future<Output = Result<()>> + Send;
}

impl<T: DocumentService> DocumentService for Arc<T> {
    type Content = T::Content;

    fn search_by_filename(
        &self,
        filename: &str,
    ) -> impl Future<Output = Result<SearchResponse>> + Send {
        (**self).search_by_filename(filename)
    }

    fn download(&self, id: DocumentId) -> impl Future<Output = Result<Self::Content>> + Send {
        (**self).download(id)
    }

    fn update_custom_field(
        &self,
        id: DocumentId,
        update: &CustomFieldUpdate,
    ) -> impl Future<Output = Result<()>> + Send {
        (**self).update_custom_field(id, update)
    }
}

/// Scripted document service for tests.
#[cfg(test)]
pub mod mock {
    use super::{
        ContentStream, CustomFieldUpdate, DocumentId, DocumentService, SearchResponse,
    };
    use crate::{Error, Result};
    use axum::body::Bytes;
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Scripted reply for one call.
    #[derive(Debug, Clone)]
    pub enum Reply<T> {
        /// Successful reply.
        Ok(T),
        /// Transport failure with the given cause.
        Fail(String),
    }

    /// Mock document service.
    ///
    /// Search replies are consumed in order; once exhausted every search
    /// returns no candidates.
    #[derive(Default)]
    pub struct MockDocumentService {
        searches: Mutex<VecDeque<Reply<SearchResponse>>>,
        contents: Mutex<HashMap<DocumentId, Reply<Vec<u8>>>>,
        update_failure: Mutex<Option<String>>,
        /// Filenames searched for, in order.
        pub searched: Mutex<Vec<String>>,
        /// Documents downloaded, in order.
        pub downloaded: Mutex<Vec<DocumentId>>,
        /// Updates issued, in order.
        pub updates: Mutex<Vec<(DocumentId, CustomFieldUpdate)>>,
        released: Arc<AtomicUsize>,
    }

    impl MockDocumentService {
        /// Creates an empty mock.
        pub fn new() -> Self {
            Self::default()
        }

        /// Queues a search reply.
        pub fn queue_search(&self, reply: Reply<SearchResponse>) -> &Self {
            self.searches.lock().expect("lock").push_back(reply);
            self
        }

        /// Sets the content served for a document.
        pub fn set_content(&self, id: u64, reply: Reply<Vec<u8>>) -> &Self {
            self.contents
                .lock()
                .expect("lock")
                .insert(DocumentId(id), reply);
            self
        }

        /// Makes every update fail.
        pub fn fail_updates(&self, cause: &str) -> &Self {
            *self.update_failure.lock().expect("lock") = Some(cause.to_string());
            self
        }

        /// Number of search calls made.
        pub fn search_count(&self) -> usize {
            self.searched.lock().expect("lock").len()
        }

        /// Number of update calls made.
        pub fn update_count(&self) -> usize {
            self.updates.lock().expect("lock").len()
        }

        /// Number of download streams opened.
        pub fn download_count(&self) -> usize {
            self.downloaded.lock().expect("lock").len()
        }

        /// Number of download streams dropped.
        pub fn released_count(&self) -> usize {
            self.released.load(Ordering::SeqCst)
        }
    }

    /// Mock content stream yielding fixed-size chunks.
    pub struct MockContent {
        chunks: VecDeque<Bytes>,
        released: Arc<AtomicUsize>,
    }

    impl ContentStream for MockContent {
        async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
            Ok(self.chunks.pop_front())
        }
    }

    impl Drop for MockContent {
        fn drop(&mut self) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl DocumentService for MockDocumentService {
        type Content = MockContent;

        async fn search_by_filename(&self, filename: &str) -> Result<SearchResponse> {
            self.searched
                .lock()
                .expect("lock")
                .push(filename.to_string());
            let reply = self.searches.lock().expect("lock").pop_front();
            match reply {
                Some(Reply::Ok(response)) => Ok(response),
                Some(Reply::Fail(cause)) => Err(Error::transport("search_documents", cause)),
                None => Ok(SearchResponse::empty()),
            }
        }

        async fn download(&self, id: DocumentId) -> Result<MockContent> {
            self.downloaded.lock().expect("lock").push(id);
            let reply = self.contents.lock().expect("lock").get(&id).cloned();
            match reply {
                Some(Reply::Ok(bytes)) => Ok(MockContent {
                    chunks: bytes
                        .chunks(3)
                        .map(Bytes::copy_from_slice)
                        .collect(),
                    released: Arc::clone(&self.released),
                }),
                Some(Reply::Fail(cause)) => Err(Error::transport("download_document", cause)),
                None => Err(Error::Transport {
                    operation: "download_document".to_string(),
                    cause: "HTTP 404 Not Found".to_string(),
                    status: Some(404),
                    body: Some(r#"{"detail":"No Document matches the given query."}"#.to_string()),
                }),
            }
        }

        async fn update_custom_field(
            &self,
            id: DocumentId,
            update: &CustomFieldUpdate,
        ) -> Result<()> {
            self.updates
                .lock()
                .expect("lock")
                .push((id, update.clone()));
            let failure = self.update_failure.lock().expect("lock").clone();
            match failure {
                Some(cause) => Err(Error::transport("update_document", cause)),
                None => Ok(()),
            }
        }
    }
}
