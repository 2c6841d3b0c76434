//! # vfx-transmit: Submission of Chain Records to the Tax Authority
//!
//! - [`worker`]: the per-business run loop, stale-claim recovery, and the
//!   run-all fan-out.
//! - [`flow`]: minimum spacing between submissions of one business.
//! - [`adapter`]: the [`AuthorityAdapter`] seam and its scripted mock.
//! - [`http`]: the HTTP adapter used in deployments.
//! - [`report`]: run and recovery reports.
//! - [`config`]: worker tuning and authority settings from the environment.
//!
//! State changes go through [`vfx_chain::ChainRegistry::apply`], so the
//! transition rules live in one place and every write is a compare-and-swap.

pub mod adapter;
pub mod config;
pub mod flow;
pub mod http;
pub mod report;
pub mod worker;

pub use adapter::{
    AdapterError, AuthorityAdapter, MockAttempt, MockAuthorityAdapter, MockResponse, RecordOutcome,
    RejectionKind, SubmissionRequest,
};
pub use config::{AuthorityConfig, ConfigError, WorkerSettings};
pub use flow::FlowControl;
pub use http::HttpAuthorityAdapter;
pub use report::{
    ReclaimedRecord, RecordFailure, RecoveryReport, RunAllReport, RunError, RunReport, RunTotals,
    RunTrigger, SkipReason,
};
pub use worker::{TransmissionWorker, WorkerError};
