//! # HTTP Authority Adapter
//!
//! `POST <base>/registrations` with the XML envelope and a bearer token.
//!
//! | Response              | Result                                   |
//! |-----------------------|------------------------------------------|
//! | 2xx + records JSON    | per-record [`RecordOutcome`]             |
//! | 5xx, 429              | [`AdapterError::Unavailable`] (retryable) |
//! | other 4xx             | [`AdapterError::Rejected`] (terminal)    |
//! | timeout               | [`AdapterError::Timeout`] (retryable)    |
//! | connection failure    | [`AdapterError::Unavailable`] (retryable) |
//!
//! Retries are not built into the adapter; the worker owns retry policy.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::Deserialize;

use crate::adapter::{AdapterError, AuthorityAdapter, RecordOutcome, RejectionKind, SubmissionRequest};
use crate::config::AuthorityConfig;

/// Response excerpt length kept in error messages.
const BODY_EXCERPT: usize = 200;

#[derive(Debug, Deserialize)]
struct SubmissionResponse {
    records: Vec<RecordResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum RecordStatus {
    Accepted,
    Rejected,
}

#[derive(Debug, Deserialize)]
struct RecordResponse {
    sequence: u64,
    status: RecordStatus,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    kind: Option<RejectionKind>,
}

impl RecordResponse {
    fn into_outcome(self) -> Result<RecordOutcome, AdapterError> {
        match self.status {
            RecordStatus::Accepted => {
                let code = self.code.filter(|c| !c.is_empty()).ok_or_else(|| AdapterError::Protocol {
                    reason: format!("record {} accepted without a confirmation code", self.sequence),
                })?;
                Ok(RecordOutcome::Accepted {
                    sequence: self.sequence,
                    code,
                })
            }
            RecordStatus::Rejected => Ok(RecordOutcome::Rejected {
                sequence: self.sequence,
                kind: self.kind.unwrap_or(RejectionKind::Content),
                reason: self.reason.unwrap_or_else(|| "no reason given".to_string()),
            }),
        }
    }
}

fn excerpt(body: &str) -> &str {
    match body.char_indices().nth(BODY_EXCERPT) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

/// Real HTTP client for the authority submission endpoint.
#[derive(Debug)]
pub struct HttpAuthorityAdapter {
    client: reqwest::Client,
    config: AuthorityConfig,
}

impl HttpAuthorityAdapter {
    pub fn new(config: AuthorityConfig) -> Result<Self, AdapterError> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.token.as_str())).map_err(|_| {
            AdapterError::NotConfigured {
                reason: "invalid token characters".into(),
            }
        })?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(vfx_xml::CONTENT_TYPE));

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| AdapterError::NotConfigured {
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { client, config })
    }

    fn endpoint(&self, request: &SubmissionRequest) -> String {
        format!(
            "{}/registrations",
            self.config.base_url(request.environment).as_str().trim_end_matches('/')
        )
    }
}

#[async_trait]
impl AuthorityAdapter for HttpAuthorityAdapter {
    async fn submit(&self, request: &SubmissionRequest) -> Result<Vec<RecordOutcome>, AdapterError> {
        let url = self.endpoint(request);
        let resp = self
            .client
            .post(&url)
            .body(request.body.clone())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AdapterError::Timeout {
                        secs: self.config.timeout.as_secs(),
                    }
                } else {
                    AdapterError::Unavailable {
                        reason: format!("POST {url}: {e}"),
                    }
                }
            })?;

        let status = resp.status();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            let body = resp.text().await.unwrap_or_default();
            return Err(AdapterError::Unavailable {
                reason: format!("HTTP {status}: {}", excerpt(&body)),
            });
        }
        if status.is_client_error() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AdapterError::Rejected {
                reason: format!("HTTP {status}: {}", excerpt(&body)),
            });
        }
        if !status.is_success() {
            return Err(AdapterError::Protocol {
                reason: format!("unexpected HTTP {status}"),
            });
        }

        let parsed: SubmissionResponse = resp.json().await.map_err(|e| AdapterError::Protocol {
            reason: format!("response deserialization failed: {e}"),
        })?;
        let outcomes = parsed
            .records
            .into_iter()
            .map(RecordResponse::into_outcome)
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(
            business_id = %request.business_id,
            records = outcomes.len(),
            "authority responded"
        );
        Ok(outcomes)
    }

    fn adapter_name(&self) -> &str {
        "HttpAuthorityAdapter"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excerpt_truncates_on_char_boundary() {
        let long = "ñ".repeat(300);
        assert_eq!(excerpt(&long).chars().count(), BODY_EXCERPT);
        assert_eq!(excerpt("short"), "short");
    }

    #[test]
    fn accepted_without_code_is_protocol_error() {
        let record = RecordResponse {
            sequence: 4,
            status: RecordStatus::Accepted,
            code: None,
            reason: None,
            kind: None,
        };
        assert!(matches!(record.into_outcome(), Err(AdapterError::Protocol { .. })));
    }
}
