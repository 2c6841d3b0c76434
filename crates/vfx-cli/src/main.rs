//! # vfx CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use vfx_cli::canonicalize::{run_canonicalize, CanonicalizeArgs};
use vfx_cli::cert::{run_cert, CertArgs};
use vfx_cli::chain::{run_chain, ChainArgs};
use vfx_cli::xml::{run_xml, XmlArgs};

/// Offline tools for invoice chain reporting.
#[derive(Parser, Debug)]
#[command(name = "vfx", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Canonical bytes and chain hash of an invoice snapshot.
    Canonicalize(CanonicalizeArgs),

    /// Encode or validate a registration document.
    Xml(XmlArgs),

    /// Certificate inspection.
    Cert(CertArgs),

    /// Exported chain verification.
    Chain(ChainArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Canonicalize(args) => run_canonicalize(&args),
        Commands::Xml(args) => run_xml(&args),
        Commands::Cert(args) => run_cert(&args),
        Commands::Chain(args) => run_chain(&args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_xml_encode_with_output() {
        let cli = Cli::try_parse_from(["vfx", "xml", "encode", "invoice.json", "-o", "out"]).unwrap();
        assert!(matches!(cli.command, Commands::Xml(_)));
    }

    #[test]
    fn parses_cert_threshold() {
        let cli = Cli::try_parse_from(["vfx", "-v", "cert", "inspect", "a.pem", "--threshold-days", "10"]).unwrap();
        assert_eq!(cli.verbose, 1);
        let Commands::Cert(args) = cli.command else {
            panic!("expected cert command");
        };
        let vfx_cli::cert::CertCommand::Inspect { threshold_days, .. } = args.command;
        assert_eq!(threshold_days, 10);
    }

    #[test]
    fn chain_requires_a_subcommand() {
        assert!(Cli::try_parse_from(["vfx", "chain"]).is_err());
    }
}
