//! # vfx-cli: Offline Operator Tool
//!
//! Works on files, never on a running service. Useful for checking what the
//! service would hash or send, and for auditing an exported chain.
//!
//! ## Subcommands
//!
//! - `vfx canonicalize`: canonical bytes and chain hash of a snapshot.
//! - `vfx xml encode | validate`: registration document of a snapshot.
//! - `vfx cert inspect`: validity window and classification of a certificate.
//! - `vfx chain verify`: replay an exported chain against its snapshots.
//!
//! ```bash
//! vfx canonicalize invoice.json --previous 0000…0000
//! vfx xml encode invoice.json -o out.xml
//! vfx cert inspect certs/acme.pem --threshold-days 30
//! vfx chain verify acme-export.json
//! ```
//!
//! Every handler returns the process exit code: 0 on success, 1 when the
//! input is well-formed but fails a check (invalid document, broken chain,
//! expired certificate). Errors reading or parsing input exit with 2.

pub mod canonicalize;
pub mod cert;
pub mod chain;
pub mod xml;

use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

/// Read and deserialize a JSON file.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
}
