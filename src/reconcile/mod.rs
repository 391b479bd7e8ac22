//! Reconciliation of an incoming file with a Paperless document.
//!
//! Paperless indexes new documents asynchronously: a filename can become
//! searchable before the content behind it is final. The [`Reconciler`]
//! therefore treats both "no document with that name yet" and "found by name
//! but not by content" as reasons to wait and poll again.
//!
//! # State machine
//!
//! ```text
//!            ┌──────────────── sleep(delay), attempt += 1 ───────────────┐
//!            ▼                                                            │
//!      ┌──────────┐ count > 0 ┌───────────┐ no match  ┌──────────┐ budget left
//!  ──▶ │Searching │ ────────▶ │ Verifying │ ────────▶ │ Retrying │ ──────┘
//!      └──────────┘           └───────────┘           └──────────┘
//!        │  │ count == 0 ───────────────────────────────▲      │ budget spent
//!        │  │                     │ match                      ▼
//!        │  │                     ▼                       ┌───────────┐
//!        │  │               ┌─────────┐                   │ Exhausted │
//!        │  │               │ Matched │                   └───────────┘
//!        │  │               └─────────┘
//!        └──┴── transport error (either state) ──▶ Aborted
//! ```
//!
//! With the default policy of 5 attempts and 3 s delay, an unmatched file is
//! searched 5 times with 4 delays between searches.

mod locator;
mod verifier;
mod writer;

pub use locator::{CandidateSet, DocumentLocator};
pub use verifier::CandidateVerifier;
pub use writer::MetadataWriter;

use crate::fingerprint::Fingerprint;
use crate::remote::{CandidateDocument, DocumentId, DocumentService};
use crate::{Error, Result};
use std::time::Duration;

/// Maximum number of search attempts.
pub const MAX_RETRIES: u32 = 5;

/// Fixed delay between attempts.
pub const RETRY_DELAY: Duration = Duration::from_secs(3);

/// Attempt budget and delay. Fixed delay, no backoff, no jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, at least 1.
    pub max_attempts: u32,
    /// Pause between consecutive attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_RETRIES,
            delay: RETRY_DELAY,
        }
    }
}

/// The confirmed document for an incoming file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    /// Matched remote document.
    pub document_id: DocumentId,
    /// Fingerprint of the incoming file.
    pub fingerprint: Fingerprint,
}

/// What happened in a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The search reported no documents.
    NoCandidates,
    /// Documents were found by name but none matched by content.
    CandidatesNoMatch,
    /// A document matched by content.
    Matched,
    /// Talking to the service failed.
    TransportError,
}

impl AttemptOutcome {
    /// Returns the label used in logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NoCandidates => "no_candidates",
            Self::CandidatesNoMatch => "candidates_no_match",
            Self::Matched => "matched",
            Self::TransportError => "transport_error",
        }
    }
}

/// One attempt of a reconciliation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconciliationAttempt {
    /// 1-based attempt number.
    pub attempt_number: u32,
    /// Outcome of the attempt.
    pub outcome: AttemptOutcome,
}

/// Terminal state of a reconciliation run.
#[derive(Debug)]
pub enum TerminalOutcome {
    /// A document matched by content.
    Matched(MatchResult),
    /// The attempt budget ran out.
    Exhausted,
    /// A transport error ended the run.
    Aborted(Error),
}

/// Full record of a reconciliation run.
#[derive(Debug)]
pub struct ReconciliationReport {
    /// Filename that was reconciled.
    pub filename: String,
    /// Attempts in order.
    pub attempts: Vec<ReconciliationAttempt>,
    /// How the run ended.
    pub outcome: TerminalOutcome,
}

impl ReconciliationReport {
    /// Number of attempts made.
    #[must_use]
    pub fn attempt_count(&self) -> u32 {
        u32::try_from(self.attempts.len()).unwrap_or(u32::MAX)
    }

    /// Converts the terminal outcome into a result.
    ///
    /// # Errors
    ///
    /// [`Error::NotFoundAfterRetries`] when exhausted, the triggering
    /// transport error when aborted.
    pub fn into_result(self) -> Result<MatchResult> {
        let attempts = self.attempt_count();
        match self.outcome {
            TerminalOutcome::Matched(matched) => Ok(matched),
            TerminalOutcome::Exhausted => Err(Error::NotFoundAfterRetries {
                filename: self.filename,
                attempts,
            }),
            TerminalOutcome::Aborted(e) => Err(e),
        }
    }
}

/// Internal states. Terminal states carry their result.
enum State {
    Searching,
    Verifying(Vec<CandidateDocument>),
    Retrying,
    Matched(DocumentId),
    Exhausted,
    Aborted(Error),
}

/// Drives locator and verifier under a fixed retry budget.
///
/// The reconciler never writes; a successful run yields a [`MatchResult`]
/// for the [`MetadataWriter`].
pub struct Reconciler<'a, S> {
    locator: DocumentLocator<'a, S>,
    verifier: CandidateVerifier<'a, S>,
    policy: RetryPolicy,
}

impl<'a, S: DocumentService> Reconciler<'a, S> {
    /// Creates a reconciler over a document service.
    #[must_use]
    pub const fn new(service: &'a S, policy: RetryPolicy) -> Self {
        Self {
            locator: DocumentLocator::new(service),
            verifier: CandidateVerifier::new(service),
            policy,
        }
    }

    /// Runs the state machine to a terminal outcome.
    pub async fn run(&self, filename: &str, fingerprint: &Fingerprint) -> ReconciliationReport {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempts = Vec::new();
        let mut attempt = 1;
        let mut state = State::Searching;

        let outcome = loop {
            state = match state {
                State::Searching => {
                    tracing::debug!(
                        filename,
                        attempt,
                        max_attempts,
                        "Searching for document by filename"
                    );
                    match self.locator.locate(filename).await {
                        Ok(set) if set.is_empty() => {
                            tracing::warn!(
                                filename,
                                attempt,
                                "No document with matching name found yet"
                            );
                            record(&mut attempts, attempt, AttemptOutcome::NoCandidates);
                            State::Retrying
                        },
                        Ok(set) => {
                            tracing::debug!(
                                filename,
                                count = set.count,
                                "Document(s) with matching name found, verifying hashes"
                            );
                            State::Verifying(set.candidates)
                        },
                        Err(e) => {
                            record(&mut attempts, attempt, AttemptOutcome::TransportError);
                            State::Aborted(e)
                        },
                    }
                },
                State::Verifying(candidates) => {
                    match self.verifier.find_match(&candidates, fingerprint).await {
                        Ok(Some(document_id)) => {
                            record(&mut attempts, attempt, AttemptOutcome::Matched);
                            State::Matched(document_id)
                        },
                        Ok(None) => {
                            tracing::warn!(
                                filename,
                                attempt,
                                candidates = candidates.len(),
                                "File found by name, but hash did not match"
                            );
                            record(&mut attempts, attempt, AttemptOutcome::CandidatesNoMatch);
                            State::Retrying
                        },
                        Err(e) => {
                            record(&mut attempts, attempt, AttemptOutcome::TransportError);
                            State::Aborted(e)
                        },
                    }
                },
                State::Retrying if attempt >= max_attempts => State::Exhausted,
                State::Retrying => {
                    tracing::debug!(
                        filename,
                        delay_secs = self.policy.delay.as_secs_f64(),
                        "Waiting before next attempt"
                    );
                    tokio::time::sleep(self.policy.delay).await;
                    attempt += 1;
                    State::Searching
                },
                State::Matched(document_id) => {
                    break TerminalOutcome::Matched(MatchResult {
                        document_id,
                        fingerprint: fingerprint.clone(),
                    });
                },
                State::Exhausted => break TerminalOutcome::Exhausted,
                State::Aborted(e) => break TerminalOutcome::Aborted(e),
            };
        };

        ReconciliationReport {
            filename: filename.to_string(),
            attempts,
            outcome,
        }
    }
}

fn record(attempts: &mut Vec<ReconciliationAttempt>, attempt_number: u32, outcome: AttemptOutcome) {
    metrics::counter!("reconcile_attempts_total", "outcome" => outcome.as_str()).increment(1);
    attempts.push(ReconciliationAttempt {
        attempt_number,
        outcome,
    });
}
