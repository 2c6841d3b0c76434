//! # vfx-core: Foundational Types for Invoice Chain Reporting
//!
//! This crate is the leaf of the workspace dependency graph. It defines the
//! invoice snapshot consumed by every other crate, fixed-point amounts, the
//! canonical serialization used for hashing, the chain-hash construction, and
//! the shared error hierarchy.
//!
//! ## Key Design Decisions
//!
//! - **Single serialization path**: [`CanonicalBytes`] can only be built
//!   through its JCS pipeline, and [`chain_digest`] only accepts
//!   `&CanonicalBytes`.
//! - **No floats**: [`Amount`], [`Quantity`], and [`TaxRate`] are scaled
//!   integers that parse from and render to decimal strings.
//! - **Validated identifiers**: [`BusinessId`] and [`InvoiceId`] check their
//!   format at construction and deserialization.
//!
//! ## Crate Policy
//!
//! - No `unwrap()` or `expect()` outside tests.
//! - Every public type derives `Debug`.

pub mod amount;
pub mod canonical;
pub mod digest;
pub mod error;
pub mod identity;
pub mod invoice;

pub use amount::{Amount, Quantity, TaxRate};
pub use canonical::{canonicalize_invoice, CanonicalBytes, CANONICAL_SCHEMA_VERSION};
pub use digest::{chain_digest, sha256_digest, ChainHash, ContentDigest};
pub use error::{CanonicalizationError, ValidationError, VfxError};
pub use identity::{normalize_legal_id, BusinessId, InvoiceId};
pub use invoice::{
    Address, InvoiceDirection, InvoiceLine, InvoiceSnapshot, InvoiceTotals, PartyProfile,
    ROUNDING_TOLERANCE_PER_LINE,
};
