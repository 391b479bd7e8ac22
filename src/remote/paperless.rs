//! Paperless-ngx REST client.

use super::{
    ContentStream, CustomFieldUpdate, DocumentId, DocumentService, SearchResponse,
    UpdateDocumentBody,
};
use crate::config::PaperlessConfig;
use crate::{Error, Result};
use axum::body::Bytes;
use reqwest::Url;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

/// Query parameter used for the filename search.
const FILENAME_QUERY: &str = "original_filename__icontains";

/// HTTP client for the Paperless document API.
pub struct PaperlessClient {
    /// Base URL without trailing slash.
    base_url: String,
    /// API token.
    token: SecretString,
    /// HTTP client with connection pooling.
    client: reqwest::Client,
    /// Whole-request limit for search and update calls.
    request_timeout: Option<Duration>,
}

impl PaperlessClient {
    /// Creates a client from connection settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the base URL is not a valid URL or the
    /// HTTP client cannot be built.
    pub fn new(config: &PaperlessConfig) -> Result<Self> {
        Url::parse(&config.base_url)
            .map_err(|e| Error::Config(format!("invalid Paperless URL '{}': {e}", config.base_url)))?;

        let mut builder = reqwest::Client::builder()
            .user_agent(format!("paperless-checksum/{}", env!("CARGO_PKG_VERSION")))
            .pool_max_idle_per_host(10);
        let request_timeout =
            (config.timeout_ms > 0).then(|| Duration::from_millis(config.timeout_ms));
        // Downloads are only bounded per read so large documents can stream.
        if let Some(timeout) = request_timeout {
            builder = builder.read_timeout(timeout);
        }
        if config.connect_timeout_ms > 0 {
            builder = builder.connect_timeout(Duration::from_millis(config.connect_timeout_ms));
        }
        let client = builder
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: config.base_url.clone(),
            token: config.token.clone(),
            client,
            request_timeout,
        })
    }

    /// URL of the filename search.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the URL cannot be built.
    pub fn search_url(&self, filename: &str) -> Result<Url> {
        let mut url = self.endpoint("search_documents", "/api/documents/")?;
        url.query_pairs_mut().append_pair(FILENAME_QUERY, filename);
        Ok(url)
    }

    /// URL of a document's original content.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the URL cannot be built.
    pub fn download_url(&self, id: DocumentId) -> Result<Url> {
        self.endpoint("download_document", &format!("/api/documents/{id}/download/"))
    }

    /// URL of a document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the URL cannot be built.
    pub fn document_url(&self, id: DocumentId) -> Result<Url> {
        self.endpoint("update_document", &format!("/api/documents/{id}/"))
    }

    fn endpoint(&self, operation: &str, path: &str) -> Result<Url> {
        Url::parse(&format!("{}{path}", self.base_url)).map_err(|e| Error::transport(operation, e))
    }

    fn bounded(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.request_timeout {
            Some(timeout) => request.timeout(timeout),
            None => request,
        }
    }

    fn authorization(&self) -> String {
        format!("Token {}", self.token.expose_secret())
    }

    /// Sends a request and turns failures into transport errors.
    ///
    /// Non-2xx responses are read to capture the body for diagnostics.
    async fn send(
        &self,
        operation: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response> {
        let response = request
            .header(reqwest::header::AUTHORIZATION, self.authorization())
            .send()
            .await
            .map_err(|e| Error::transport(operation, describe(&e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.ok().filter(|b| !b.is_empty());
        Err(Error::Transport {
            operation: operation.to_string(),
            cause: format!("HTTP {status}"),
            status: Some(status.as_u16()),
            body,
        })
    }
}

/// Classifies a reqwest error for logging.
fn describe(e: &reqwest::Error) -> String {
    let kind = if e.is_timeout() {
        "timeout"
    } else if e.is_connect() {
        "connect"
    } else if e.is_decode() {
        "decode"
    } else if e.is_request() {
        "request"
    } else {
        "unknown"
    };
    format!("{kind} error: {e}")
}

impl DocumentService for PaperlessClient {
    type Content = PaperlessContent;

    async fn search_by_filename(&self, filename: &str) -> Result<SearchResponse> {
        const OPERATION: &str = "search_documents";
        let url = self.search_url(filename)?;
        tracing::debug!(%url, "Searching documents by filename");

        let response = self
            .send(OPERATION, self.bounded(self.client.get(url)))
            .await?;
        let data: SearchResponse = response
            .json()
            .await
            .map_err(|e| Error::transport(OPERATION, describe(&e)))?;

        tracing::debug!(count = data.count, results = ?data.results, "API search response");
        Ok(data)
    }

    async fn download(&self, id: DocumentId) -> Result<PaperlessContent> {
        const OPERATION: &str = "download_document";
        let url = self.download_url(id)?;
        let response = self.send(OPERATION, self.client.get(url)).await?;
        Ok(PaperlessContent { response })
    }

    async fn update_custom_field(&self, id: DocumentId, update: &CustomFieldUpdate) -> Result<()> {
        const OPERATION: &str = "update_document";
        let url = self.document_url(id)?;
        let body = UpdateDocumentBody {
            custom_fields: [update],
        };

        let response = self
            .send(OPERATION, self.bounded(self.client.patch(url).json(&body)))
            .await?;
        tracing::debug!(document_id = %id, status = %response.status(), "Document updated");
        Ok(())
    }
}

/// Streamed body of a document download.
pub struct PaperlessContent {
    response: reqwest::Response,
}

impl ContentStream for PaperlessContent {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        self.response
            .chunk()
            .await
            .map_err(|e| Error::transport("download_document", describe(&e)))
    }
}
