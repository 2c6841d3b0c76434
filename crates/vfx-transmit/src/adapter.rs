//! # Authority Adapter: Submission Seam
//!
//! The tax authority is an opaque network collaborator. The worker talks to
//! it only through [`AuthorityAdapter`]: one call submits an envelope of
//! records in sequence order and yields a per-record outcome.
//!
//! Production deployments use [`crate::http::HttpAuthorityAdapter`]; tests
//! and unconfigured deployments use [`MockAuthorityAdapter`].

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use vfx_chain::{Environment, FailureClass};
use vfx_core::BusinessId;

/// One submission call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRequest {
    pub business_id: BusinessId,
    pub environment: Environment,
    /// Sequence numbers carried by the envelope, ascending.
    pub sequences: Vec<u64>,
    /// XML submission envelope.
    pub body: String,
}

/// Why the authority rejected a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    Content,
    Duplicate,
    Signature,
}

impl std::fmt::Display for RejectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Content => "content rejected",
            Self::Duplicate => "duplicate",
            Self::Signature => "signature invalid",
        })
    }
}

/// Authority verdict on one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    Accepted { sequence: u64, code: String },
    Rejected { sequence: u64, kind: RejectionKind, reason: String },
}

impl RecordOutcome {
    pub fn sequence(&self) -> u64 {
        match self {
            Self::Accepted { sequence, .. } | Self::Rejected { sequence, .. } => *sequence,
        }
    }
}

/// Failure of a whole submission call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdapterError {
    #[error("authority did not answer within {secs}s")]
    Timeout { secs: u64 },

    /// Connection failure, 5xx, or 429.
    #[error("authority unavailable: {reason}")]
    Unavailable { reason: String },

    /// The authority refused the request as a whole (4xx).
    #[error("authority rejected the submission: {reason}")]
    Rejected { reason: String },

    /// The response could not be understood.
    #[error("unexpected authority response: {reason}")]
    Protocol { reason: String },

    #[error("authority adapter not configured: {reason}")]
    NotConfigured { reason: String },
}

impl AdapterError {
    /// Retry classification. Only a definite refusal is terminal.
    pub fn class(&self) -> FailureClass {
        match self {
            Self::Rejected { .. } | Self::NotConfigured { .. } => FailureClass::NonRetryable,
            Self::Timeout { .. } | Self::Unavailable { .. } | Self::Protocol { .. } => FailureClass::Retryable,
        }
    }
}

/// Adapter trait for the tax authority submission endpoint.
///
/// Implementations must be `Send + Sync` so they can be shared across
/// worker tasks behind an `Arc`.
#[async_trait]
pub trait AuthorityAdapter: Send + Sync {
    async fn submit(&self, request: &SubmissionRequest) -> Result<Vec<RecordOutcome>, AdapterError>;

    /// Implementation name for logs (e.g. "MockAuthorityAdapter").
    fn adapter_name(&self) -> &str;
}

/// Scripted behaviour of the mock for one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockResponse {
    /// Accept every record with a generated code.
    Accept,
    /// Reject every record.
    Reject { kind: RejectionKind, reason: String },
    /// Fail the whole call.
    Fail(AdapterError),
    /// Never answer. Only useful with a submission timeout.
    Hang,
}

/// One call received by the mock.
#[derive(Debug, Clone)]
pub struct MockAttempt {
    pub business_id: BusinessId,
    pub sequences: Vec<u64>,
    pub at: tokio::time::Instant,
    pub body: String,
}

/// In-process authority for tests and for deployments without credentials.
///
/// Responses are consumed from a script in call order; once the script is
/// exhausted every call is accepted. Accepted codes are
/// `MOCK-<business>-<sequence>`.
#[derive(Debug, Clone, Default)]
pub struct MockAuthorityAdapter {
    script: Arc<Mutex<VecDeque<MockResponse>>>,
    attempts: Arc<Mutex<Vec<MockAttempt>>>,
}

impl MockAuthorityAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mock that plays `responses` in order before accepting everything.
    pub fn scripted(responses: impl IntoIterator<Item = MockResponse>) -> Self {
        let mock = Self::default();
        mock.script.lock().extend(responses);
        mock
    }

    pub fn push(&self, response: MockResponse) {
        self.script.lock().push_back(response);
    }

    /// Calls received so far, in order.
    pub fn attempts(&self) -> Vec<MockAttempt> {
        self.attempts.lock().clone()
    }
}

#[async_trait]
impl AuthorityAdapter for MockAuthorityAdapter {
    async fn submit(&self, request: &SubmissionRequest) -> Result<Vec<RecordOutcome>, AdapterError> {
        self.attempts.lock().push(MockAttempt {
            business_id: request.business_id.clone(),
            sequences: request.sequences.clone(),
            at: tokio::time::Instant::now(),
            body: request.body.clone(),
        });
        let response = self.script.lock().pop_front().unwrap_or(MockResponse::Accept);

        match response {
            MockResponse::Accept => Ok(request
                .sequences
                .iter()
                .map(|&sequence| RecordOutcome::Accepted {
                    sequence,
                    code: format!("MOCK-{}-{sequence}", request.business_id),
                })
                .collect()),
            MockResponse::Reject { kind, reason } => Ok(request
                .sequences
                .iter()
                .map(|&sequence| RecordOutcome::Rejected {
                    sequence,
                    kind,
                    reason: reason.clone(),
                })
                .collect()),
            MockResponse::Fail(err) => Err(err),
            MockResponse::Hang => {
                std::future::pending::<()>().await;
                Err(AdapterError::Timeout { secs: 0 })
            }
        }
    }

    fn adapter_name(&self) -> &str {
        "MockAuthorityAdapter"
    }
}
