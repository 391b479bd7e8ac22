//! Webhook HTTP server.
//!
//! Exposes a single route, `POST /webhook`, taking a multipart form with the
//! uploaded file in a part named `file`. The upload is hashed while it
//! streams in; it is never buffered whole or written to disk.
//!
//! | Outcome | Status | Body |
//! |---------|--------|------|
//! | Document stamped | 200 | `SHA256 stored in document {id}.` |
//! | No `file` part, or not multipart | 400 | `No file found in webhook.` |
//! | No content match | 404 | `Matching document not found.` |
//! | Upload over limit | 413 | `Upload too large.` |
//! | Any other failure | 500 | `Error during API communication` |

use crate::config::ChecksumConfig;
use crate::fingerprint::FingerprintHasher;
use crate::remote::{DocumentId, DocumentService};
use crate::services::ChecksumService;
use crate::{Error, Result};
use axum::extract::multipart::{Multipart, MultipartError, MultipartRejection};
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{StatusCode, header};
use axum::Router;
use axum::routing::post;
use std::sync::Arc;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::Instrument;

/// Route of the webhook endpoint.
pub const WEBHOOK_PATH: &str = "/webhook";

/// Name of the multipart part carrying the upload.
pub const FILE_FIELD: &str = "file";

const NO_FILE_MESSAGE: &str = "No file found in webhook.";
const NOT_FOUND_MESSAGE: &str = "Matching document not found.";
const TOO_LARGE_MESSAGE: &str = "Upload too large.";
const FAILURE_MESSAGE: &str = "Error during API communication";

/// Builds the webhook router.
pub fn router<S>(service: Arc<ChecksumService<S>>, max_upload_bytes: usize) -> Router
where
    S: DocumentService + 'static,
{
    Router::new()
        .route(WEBHOOK_PATH, post(handle_webhook::<S>))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            header::HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            header::HeaderValue::from_static("no-store"),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

/// Serves the webhook until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve<S>(service: Arc<ChecksumService<S>>, config: &ChecksumConfig) -> Result<()>
where
    S: DocumentService + 'static,
{
    let app = router(service, config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .map_err(|e| Error::OperationFailed {
            operation: "bind".to_string(),
            cause: format!("{}: {e}", config.bind_addr),
        })?;

    tracing::info!(
        addr = %config.bind_addr,
        paperless = %config.paperless.base_url,
        custom_field_id = config.paperless.custom_field_id,
        "Starting webhook server"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| Error::OperationFailed {
            operation: "serve".to_string(),
            cause: e.to_string(),
        })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down webhook server");
}

async fn handle_webhook<S>(
    State(service): State<Arc<ChecksumService<S>>>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> (StatusCode, String)
where
    S: DocumentService + 'static,
{
    let mut multipart = match multipart {
        Ok(multipart) => multipart,
        Err(rejection) => {
            tracing::warn!(error = %rejection, "Rejected webhook request");
            return (StatusCode::BAD_REQUEST, NO_FILE_MESSAGE.to_string());
        },
    };

    let upload = match read_upload(&mut multipart).await {
        Ok(Some(upload)) => upload,
        Ok(None) => {
            tracing::warn!("No file found in webhook");
            return (StatusCode::BAD_REQUEST, NO_FILE_MESSAGE.to_string());
        },
        Err(UploadError::Malformed(cause)) => {
            tracing::warn!(cause = %cause, "Malformed multipart body");
            return (StatusCode::BAD_REQUEST, NO_FILE_MESSAGE.to_string());
        },
        Err(UploadError::TooLarge) => {
            tracing::warn!("Upload exceeds body limit");
            return (StatusCode::PAYLOAD_TOO_LARGE, TOO_LARGE_MESSAGE.to_string());
        },
        Err(UploadError::Read(e)) => {
            tracing::error!(error = %e, "Failed to read upload");
            return respond(Err(e));
        },
    };

    let span = tracing::info_span!("webhook", filename = %upload.filename);
    let outcome = service
        .process(&upload.filename, upload.hasher.finish())
        .instrument(span)
        .await
        .map(|matched| matched.document_id);

    respond(outcome)
}

/// Filename and running hash of the `file` part.
struct Upload {
    filename: String,
    hasher: FingerprintHasher,
}

enum UploadError {
    /// The client sent a body that is not valid multipart.
    Malformed(String),
    TooLarge,
    /// Reading the request stream failed.
    Read(Error),
}

impl From<MultipartError> for UploadError {
    fn from(e: MultipartError) -> Self {
        let status = e.status();
        if status == StatusCode::PAYLOAD_TOO_LARGE {
            Self::TooLarge
        } else if status.is_client_error() {
            Self::Malformed(e.body_text())
        } else {
            Self::Read(Error::io("read_upload", e.body_text()))
        }
    }
}

/// Streams the first `file` part through the hasher.
///
/// Returns `None` when there is no `file` part or it carries no filename.
async fn read_upload(multipart: &mut Multipart) -> std::result::Result<Option<Upload>, UploadError> {
    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let Some(filename) = field.file_name().map(str::to_string) else {
            return Ok(None);
        };

        let mut hasher = FingerprintHasher::new();
        while let Some(chunk) = field.chunk().await? {
            hasher.update(&chunk);
        }
        tracing::debug!(filename = %filename, bytes = hasher.bytes_hashed(), "Upload received");

        return Ok(Some(Upload { filename, hasher }));
    }
    Ok(None)
}

fn respond(outcome: Result<DocumentId>) -> (StatusCode, String) {
    match outcome {
        Ok(id) => (StatusCode::OK, format!("SHA256 stored in document {id}.")),
        Err(e) => {
            let status = StatusCode::from_u16(e.status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            let message = match e {
                Error::MissingInput(_) => NO_FILE_MESSAGE,
                Error::NotFoundAfterRetries { .. } => NOT_FOUND_MESSAGE,
                _ => FAILURE_MESSAGE,
            };
            (status, message.to_string())
        },
    }
}
