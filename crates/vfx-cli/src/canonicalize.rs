//! `vfx canonicalize`: print the canonical form of an invoice snapshot and
//! the hashes derived from it.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use vfx_core::{canonicalize_invoice, chain_digest, sha256_digest, ChainHash, InvoiceSnapshot};

use crate::read_json;

#[derive(Args, Debug)]
pub struct CanonicalizeArgs {
    /// Invoice snapshot (JSON).
    pub snapshot: PathBuf,

    /// Previous chain hash. Defaults to the genesis value.
    #[arg(long)]
    pub previous: Option<String>,

    /// Print only the canonical bytes.
    #[arg(long)]
    pub raw: bool,
}

#[derive(Debug, PartialEq, Eq)]
pub struct Canonicalized {
    pub canonical: String,
    pub content_digest: String,
    pub chain_hash: ChainHash,
}

pub fn canonicalize(snapshot: &InvoiceSnapshot, previous: &ChainHash) -> Result<Canonicalized> {
    let bytes = canonicalize_invoice(snapshot).context("snapshot cannot be canonicalized")?;
    Ok(Canonicalized {
        canonical: bytes.as_str().to_string(),
        content_digest: sha256_digest(&bytes).to_hex(),
        chain_hash: chain_digest(previous, &bytes),
    })
}

pub fn run_canonicalize(args: &CanonicalizeArgs) -> Result<u8> {
    let snapshot: InvoiceSnapshot = read_json(&args.snapshot)?;
    let previous = match &args.previous {
        Some(hex) => ChainHash::from_hex(hex).context("--previous is not a chain hash")?,
        None => ChainHash::genesis(),
    };
    let out = canonicalize(&snapshot, &previous)?;
    if args.raw {
        println!("{}", out.canonical);
        return Ok(0);
    }
    println!("canonical:      {}", out.canonical);
    println!("content digest: {}", out.content_digest);
    println!("previous hash:  {}", previous.as_str());
    println!("chain hash:     {}", out.chain_hash.as_str());
    Ok(0)
}
