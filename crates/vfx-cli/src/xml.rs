//! `vfx xml`: encode a snapshot as a registration document, or report why
//! it would be refused.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use vfx_core::{InvoiceSnapshot, PartyProfile};
use vfx_xml::{InvoiceDocument, ValidationReport};

use crate::read_json;

#[derive(Args, Debug)]
pub struct XmlArgs {
    #[command(subcommand)]
    pub command: XmlCommand,
}

#[derive(Subcommand, Debug)]
pub enum XmlCommand {
    /// Encode and validate; write the document only when it is valid.
    Encode {
        /// Invoice snapshot (JSON).
        snapshot: PathBuf,

        /// Issuer profile (JSON) overriding the snapshot's issuer.
        #[arg(long)]
        business_profile: Option<PathBuf>,

        /// Counterparty profile (JSON) overriding the snapshot's counterparty.
        #[arg(long)]
        counterparty_profile: Option<PathBuf>,

        /// Output file, or a directory to write `<issuer>_<number>.xml` into.
        /// Prints to stdout when absent.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List every validation error of the snapshot's document.
    Validate {
        /// Invoice snapshot (JSON).
        snapshot: PathBuf,
    },
}

pub fn run_xml(args: &XmlArgs) -> Result<u8> {
    match &args.command {
        XmlCommand::Encode {
            snapshot,
            business_profile,
            counterparty_profile,
            output,
        } => run_encode(
            snapshot,
            business_profile.as_deref(),
            counterparty_profile.as_deref(),
            output.as_deref(),
        ),
        XmlCommand::Validate { snapshot } => run_validate(snapshot),
    }
}

fn document_for(
    snapshot: &InvoiceSnapshot,
    business_profile: Option<&Path>,
    counterparty_profile: Option<&Path>,
) -> Result<InvoiceDocument> {
    if business_profile.is_none() && counterparty_profile.is_none() {
        return Ok(vfx_xml::encode_snapshot(snapshot));
    }
    let issuer: PartyProfile = match business_profile {
        Some(path) => read_json(path)?,
        None => snapshot.issuer.clone(),
    };
    let counterparty: PartyProfile = match counterparty_profile {
        Some(path) => read_json(path)?,
        None => snapshot.counterparty.clone(),
    };
    Ok(vfx_xml::encode(snapshot, &issuer, &counterparty))
}

fn print_report(report: &ValidationReport) {
    for error in &report.errors {
        eprintln!("  {}: {}", error.path, error.message);
    }
}

fn run_encode(
    snapshot_path: &Path,
    business_profile: Option<&Path>,
    counterparty_profile: Option<&Path>,
    output: Option<&Path>,
) -> Result<u8> {
    let snapshot: InvoiceSnapshot = read_json(snapshot_path)?;
    let document = document_for(&snapshot, business_profile, counterparty_profile)?;
    let report = vfx_xml::validate(&document);
    if !report.valid {
        eprintln!("document for invoice {} is invalid:", snapshot.invoice_id);
        print_report(&report);
        return Ok(1);
    }

    let xml = document.to_xml();
    match output {
        None => print!("{xml}"),
        Some(path) => {
            let target = if path.is_dir() {
                path.join(document.file_name())
            } else {
                path.to_path_buf()
            };
            std::fs::write(&target, xml).with_context(|| format!("failed to write {}", target.display()))?;
            tracing::info!(path = %target.display(), "registration document written");
            println!("{}", target.display());
        }
    }
    Ok(0)
}

fn run_validate(snapshot_path: &Path) -> Result<u8> {
    let snapshot: InvoiceSnapshot = read_json(snapshot_path)?;
    let report = vfx_xml::validate(&vfx_xml::encode_snapshot(&snapshot));
    if report.valid {
        println!("valid");
        Ok(0)
    } else {
        eprintln!("{} error(s):", report.errors.len());
        print_report(&report);
        Ok(1)
    }
}
