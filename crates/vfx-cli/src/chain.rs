//! `vfx chain verify`: replay an exported chain.
//!
//! An export is one JSON file holding a business's records (as returned by
//! `GET /v1/businesses/{id}/records`) and the invoice snapshots they were
//! registered from.

use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Utc;
use clap::{Args, Subcommand};
use serde::{Deserialize, Serialize};
use vfx_chain::verify::replay;
use vfx_chain::{ChainRecord, InMemoryInvoiceSource, VerificationReport};
use vfx_core::{BusinessId, InvoiceSnapshot};

use crate::read_json;

#[derive(Args, Debug)]
pub struct ChainArgs {
    #[command(subcommand)]
    pub command: ChainCommand,
}

#[derive(Subcommand, Debug)]
pub enum ChainCommand {
    /// Recompute every link hash and report the first mismatch.
    Verify {
        /// Chain export (JSON).
        export: PathBuf,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChainExport {
    pub business_id: BusinessId,
    pub records: Vec<ChainRecord>,
    pub invoices: Vec<InvoiceSnapshot>,
}

pub fn run_chain(args: &ChainArgs) -> Result<u8> {
    match &args.command {
        ChainCommand::Verify { export, json } => run_verify(export, *json),
    }
}

pub fn verify_export(mut export: ChainExport) -> VerificationReport {
    let source = InMemoryInvoiceSource::new();
    for snapshot in export.invoices {
        source.upsert(export.business_id.clone(), snapshot);
    }
    export.records.sort_by_key(|r| r.sequence_number);
    let last = export.records.last().map_or(0, |r| r.sequence_number);
    replay(&export.business_id, &export.records, last, &source, Utc::now())
}

fn run_verify(path: &Path, json: bool) -> Result<u8> {
    let export: ChainExport = read_json(path)?;
    let report = verify_export(export);
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        match &report.first_mismatch {
            None => println!("{}: {} record(s) verified", report.business_id, report.records_checked),
            Some(m) => println!(
                "{}: {} at sequence {} ({}) after {} verified record(s)",
                report.business_id, m.kind, m.sequence, m.detail, report.records_checked
            ),
        }
    }
    Ok(if report.is_intact() { 0 } else { 1 })
}
