//! Filename-based candidate lookup.

use crate::Result;
use crate::remote::{CandidateDocument, DocumentService};

/// Candidates returned by one lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateSet {
    /// Total hits reported by the service.
    pub count: u64,
    /// Candidates in service order.
    pub candidates: Vec<CandidateDocument>,
}

impl CandidateSet {
    /// Returns `true` when the service reported no hits.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Looks up documents whose original filename contains the query.
///
/// The match is a case-insensitive substring match on the remote side, so the
/// result may hold any number of documents, including ones that merely share
/// part of the name. One call issues exactly one request and never retries.
pub struct DocumentLocator<'a, S> {
    service: &'a S,
}

impl<'a, S: DocumentService> DocumentLocator<'a, S> {
    /// Creates a locator over a document service.
    #[must_use]
    pub const fn new(service: &'a S) -> Self {
        Self { service }
    }

    /// Runs one lookup.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Transport`] if the search request fails.
    pub async fn locate(&self, filename: &str) -> Result<CandidateSet> {
        let response = self.service.search_by_filename(filename).await?;
        Ok(CandidateSet {
            count: response.count,
            candidates: response.results,
        })
    }
}
