//! # Transmission Lifecycle: Pure State Machine
//!
//! ```text
//!             Claim                Accepted
//!   Pending ─────────► Processing ─────────► Sent
//!      ▲  ▲                │
//!      │  │ Reclaim /      │ Failed (retryable, attempts < max)
//!      │  └────────────────┤
//!      │                   │ Failed (non-retryable, or retries exhausted)
//!      │ Requeue           ▼
//!      └──────────────── Error ◄──── CertificateBlocked (from Pending or Processing)
//! ```
//!
//! [`transition`] is a pure function of `(state, event, policy, now)`. It
//! never performs IO. Callers persist the returned state (with a
//! compare-and-swap against the state they read) and then act on the
//! returned [`Effect`]. Invalid `(state, event)` pairs return
//! [`TransitionError`] and leave the state untouched.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::record::TransmissionStatus;

/// Mutable transmission bookkeeping of a chain record. Never part of the hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransmissionState {
    #[serde(rename = "transmission_status")]
    pub status: TransmissionStatus,
    pub transmission_timestamp: Option<DateTime<Utc>>,
    pub authority_confirmation_code: Option<String>,
    pub is_legally_verifiable: bool,
    /// Failed submission attempts since creation or the last requeue.
    pub attempts: u32,
    /// Backoff gate. The record may not be claimed before this instant.
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub processing_started_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl TransmissionState {
    /// State of a freshly created record.
    pub fn new(self_verifiable: bool) -> Self {
        Self {
            status: TransmissionStatus::Pending,
            transmission_timestamp: None,
            authority_confirmation_code: None,
            is_legally_verifiable: self_verifiable,
            attempts: 0,
            next_attempt_at: None,
            processing_started_at: None,
            last_error: None,
        }
    }

    /// Whether the record is pending and its backoff gate has opened.
    pub fn is_ready(&self, now: DateTime<Utc>) -> bool {
        self.status == TransmissionStatus::Pending && self.next_attempt_at.map_or(true, |at| at <= now)
    }

    /// Whether a processing claim is older than `timeout`.
    pub fn is_stale(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        self.status == TransmissionStatus::Processing
            && self
                .processing_started_at
                .map_or(true, |started| after(started, timeout) <= now)
    }
}

/// Retry and recovery parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Failed attempts after which a retryable failure becomes terminal.
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    /// Age after which a `processing` claim is reclaimed.
    pub processing_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base: Duration::from_secs(30),
            backoff_max: Duration::from_secs(3600),
            processing_timeout: Duration::from_secs(600),
        }
    }
}

impl RetryPolicy {
    /// Delay before the next attempt after `attempts` failures:
    /// `base * 2^(attempts - 1)`, capped at `backoff_max`.
    pub fn backoff(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1);
        let factor = 1u32.checked_shl(exponent).unwrap_or(u32::MAX);
        self.backoff_base.saturating_mul(factor).min(self.backoff_max)
    }
}

fn delta(d: Duration) -> TimeDelta {
    TimeDelta::from_std(d).unwrap_or(TimeDelta::MAX)
}

/// `t + d`, saturating at the maximum representable instant.
pub(crate) fn after(t: DateTime<Utc>, d: Duration) -> DateTime<Utc> {
    t.checked_add_signed(delta(d)).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Whether a failure may be retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// Network error, timeout, or authority unavailable.
    Retryable,
    /// Content rejected, duplicate, invalid signature, or invalid document.
    NonRetryable,
}

/// Inputs to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransmissionEvent {
    /// A worker takes a ready pending record for submission.
    Claim,
    /// The authority accepted the record.
    Accepted { code: String },
    /// The submission failed.
    Failed { class: FailureClass, reason: String },
    /// The signing certificate forbids submission.
    CertificateBlocked { reason: String },
    /// Recovery pass returns a stale processing claim to pending.
    Reclaim,
    /// Operator retries an errored record.
    Requeue,
}

impl TransmissionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Claim => "claim",
            Self::Accepted { .. } => "accepted",
            Self::Failed { .. } => "failed",
            Self::CertificateBlocked { .. } => "certificate_blocked",
            Self::Reclaim => "reclaim",
            Self::Requeue => "requeue",
        }
    }
}

/// What the caller must do after persisting the new state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Submit the record now.
    Submit,
    /// Record is sent; nothing further.
    Confirmed { code: String },
    /// Retry no earlier than the given instant.
    RetryScheduled { not_before: DateTime<Utc> },
    /// Record moved to `error`; surface the reason.
    Failed { reason: String },
    /// Record returned to `pending`.
    Released,
}

/// Rejected `(state, event)` pair.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot apply {event} to a {from} record: {reason}")]
pub struct TransitionError {
    pub from: TransmissionStatus,
    pub event: &'static str,
    pub reason: String,
}

/// Compute the next transmission state.
pub fn transition(
    state: &TransmissionState,
    event: TransmissionEvent,
    policy: &RetryPolicy,
    now: DateTime<Utc>,
) -> Result<(TransmissionState, Effect), TransitionError> {
    use TransmissionStatus as S;

    let reject = |reason: &str| TransitionError {
        from: state.status,
        event: event.name(),
        reason: reason.to_string(),
    };
    let mut next = state.clone();

    let effect = match (&state.status, &event) {
        (S::Pending, TransmissionEvent::Claim) => {
            if !state.is_ready(now) {
                return Err(reject("backoff gate has not opened"));
            }
            next.status = S::Processing;
            next.processing_started_at = Some(now);
            Effect::Submit
        }
        (S::Processing, TransmissionEvent::Accepted { code }) => {
            next.status = S::Sent;
            next.transmission_timestamp = Some(now);
            next.authority_confirmation_code = Some(code.clone());
            next.is_legally_verifiable = true;
            next.processing_started_at = None;
            next.next_attempt_at = None;
            next.last_error = None;
            Effect::Confirmed { code: code.clone() }
        }
        (S::Processing, TransmissionEvent::Failed { class, reason }) => {
            next.attempts = state.attempts.saturating_add(1);
            next.processing_started_at = None;
            next.last_error = Some(reason.clone());
            match class {
                FailureClass::Retryable if next.attempts < policy.max_retries => {
                    let not_before = after(now, policy.backoff(next.attempts));
                    next.status = S::Pending;
                    next.next_attempt_at = Some(not_before);
                    Effect::RetryScheduled { not_before }
                }
                FailureClass::Retryable => {
                    let reason = format!("retries exhausted after {} attempts: {reason}", next.attempts);
                    next.status = S::Error;
                    next.next_attempt_at = None;
                    next.last_error = Some(reason.clone());
                    Effect::Failed { reason }
                }
                FailureClass::NonRetryable => {
                    next.status = S::Error;
                    next.next_attempt_at = None;
                    Effect::Failed {
                        reason: reason.clone(),
                    }
                }
            }
        }
        (S::Pending | S::Processing, TransmissionEvent::CertificateBlocked { reason }) => {
            next.status = S::Error;
            next.processing_started_at = None;
            next.next_attempt_at = None;
            next.last_error = Some(reason.clone());
            Effect::Failed {
                reason: reason.clone(),
            }
        }
        (S::Processing, TransmissionEvent::Reclaim) => {
            if !state.is_stale(now, policy.processing_timeout) {
                return Err(reject("processing claim has not timed out"));
            }
            next.status = S::Pending;
            next.processing_started_at = None;
            Effect::Released
        }
        (S::Error, TransmissionEvent::Requeue) => {
            next.status = S::Pending;
            next.attempts = 0;
            next.next_attempt_at = None;
            next.last_error = None;
            Effect::Released
        }
        (S::Sent, _) => return Err(reject("record was already accepted")),
        _ => return Err(reject("event not valid in this state")),
    };
    Ok((next, effect))
}
