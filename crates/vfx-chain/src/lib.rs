//! # vfx-chain: Per-Business Invoice Hash Chains
//!
//! Every registered invoice becomes a [`ChainRecord`]: a sequence number, a
//! link to the previous record's hash, its own hash over the canonical
//! invoice bytes, and a verification QR payload. This crate owns:
//!
//! - [`record`]: chain record and compliance configuration types.
//! - [`store`]: the in-memory ledger with conditional append.
//! - [`registry`]: record creation, lookup, verification, requeue.
//! - [`transmission`]: the pure transmission state machine.
//! - [`verify`]: chain replay and mismatch reporting.
//! - [`qr`]: verification QR payloads.
//! - [`source`]: the seam to the invoicing module.

pub mod error;
pub mod qr;
pub mod record;
pub mod registry;
pub mod source;
pub mod store;
pub mod transmission;
pub mod verify;

pub use error::ChainError;
pub use qr::{build_qr, QrCode, QrSettings};
pub use record::{
    ChainRecord, ComplianceConfig, ComplianceMode, ConfigUpdate, Environment, TransmissionStatus,
};
pub use registry::{ChainRegistry, StatusCounts, MAX_APPEND_ATTEMPTS};
pub use source::{InMemoryInvoiceSource, InvoiceSource};
pub use store::{ChainHead, ChainStore, StoreError};
pub use transmission::{
    transition, Effect, FailureClass, RetryPolicy, TransitionError, TransmissionEvent,
    TransmissionState,
};
pub use verify::{Mismatch, MismatchKind, VerificationReport};
