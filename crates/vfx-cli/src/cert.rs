//! `vfx cert inspect`: validity window of a certificate file and how the
//! monitor would classify it today.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use vfx_cert::{classify, days_until_expiration, parse_validity, CertificateHealth, DEFAULT_EXPIRY_THRESHOLD_DAYS};

#[derive(Args, Debug)]
pub struct CertArgs {
    #[command(subcommand)]
    pub command: CertCommand,
}

#[derive(Subcommand, Debug)]
pub enum CertCommand {
    /// Print notBefore/notAfter and the expiry classification.
    Inspect {
        /// PEM or DER certificate.
        path: PathBuf,

        /// Days before expiry at which a certificate counts as expiring soon.
        #[arg(long, default_value_t = DEFAULT_EXPIRY_THRESHOLD_DAYS)]
        threshold_days: i64,
    },
}

pub fn run_cert(args: &CertArgs) -> Result<u8> {
    match &args.command {
        CertCommand::Inspect { path, threshold_days } => run_inspect(path, *threshold_days, Utc::now()),
    }
}

fn run_inspect(path: &Path, threshold_days: i64, now: DateTime<Utc>) -> Result<u8> {
    let blob = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let window = parse_validity(&blob).with_context(|| format!("{} is not a certificate", path.display()))?;
    let health = classify(Some(window.not_after), now, threshold_days);

    println!("not before: {}", window.not_before.to_rfc3339());
    println!("not after:  {}", window.not_after.to_rfc3339());
    println!("days left:  {}", days_until_expiration(window.not_after, now));
    println!("status:     {}", health.as_str());

    Ok(match health {
        CertificateHealth::Expired => 1,
        _ => 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rcgen::{date_time_ymd, CertificateParams, KeyPair};

    fn write_cert(dir: &Path, until: (i32, u8, u8)) -> PathBuf {
        let mut params = CertificateParams::new(vec!["vfx.test".to_string()]).unwrap();
        params.not_before = date_time_ymd(2025, 1, 1);
        params.not_after = date_time_ymd(until.0, until.1, until.2);
        let key = KeyPair::generate().unwrap();
        let cert = params.self_signed(&key).unwrap();
        let path = dir.join("acme.pem");
        std::fs::write(&path, cert.pem()).unwrap();
        path
    }

    #[test]
    fn expired_certificate_exits_non_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_cert(dir.path(), (2026, 1, 31));
        let now = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
        assert_eq!(run_inspect(&path, 30, now).unwrap(), 1);
    }

    #[test]
    fn expiring_certificate_still_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_cert(dir.path(), (2026, 2, 11));
        let now = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
        assert_eq!(run_inspect(&path, 30, now).unwrap(), 0);
    }

    #[test]
    fn garbage_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.pem");
        std::fs::write(&path, "nope").unwrap();
        assert!(run_inspect(&path, 30, Utc::now()).is_err());
    }
}
