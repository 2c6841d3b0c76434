//! Certificate storage seam.

use std::path::{Path, PathBuf};

use zeroize::Zeroizing;

use crate::error::CertError;

/// A certificate blob and its optional passphrase.
///
/// Custom `Debug` redacts the passphrase.
pub struct CertificateMaterial {
    pub blob: Vec<u8>,
    pub passphrase: Option<Zeroizing<String>>,
}

impl std::fmt::Debug for CertificateMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateMaterial")
            .field("blob_len", &self.blob.len())
            .field("passphrase", &self.passphrase.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Where signing certificates are provisioned.
///
/// Implementations do blocking I/O; callers run them off the async runtime.
pub trait CertificateStore: Send + Sync {
    fn load(&self, reference: &str) -> Result<CertificateMaterial, CertError>;
}

/// Directory-backed store: `<dir>/<reference>` plus an optional
/// `<dir>/<reference>.pass` holding the passphrase.
#[derive(Debug, Clone)]
pub struct FsCertificateStore {
    dir: PathBuf,
}

impl FsCertificateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_of(&self, reference: &str) -> Result<PathBuf, CertError> {
        let safe = !reference.is_empty()
            && !reference.contains("..")
            && reference
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
        if !safe {
            return Err(CertError::InvalidReference(reference.to_string()));
        }
        Ok(self.dir.join(reference))
    }
}

impl CertificateStore for FsCertificateStore {
    fn load(&self, reference: &str) -> Result<CertificateMaterial, CertError> {
        let path = self.path_of(reference)?;
        let blob = std::fs::read(&path).map_err(|source| CertError::Read {
            reference: reference.to_string(),
            source,
        })?;

        let pass_path = self.dir.join(format!("{reference}.pass"));
        let passphrase = match std::fs::read_to_string(&pass_path) {
            Ok(raw) => {
                let raw = Zeroizing::new(raw);
                Some(Zeroizing::new(raw.trim_end_matches(['\r', '\n']).to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(source) => {
                return Err(CertError::Read {
                    reference: format!("{reference}.pass"),
                    source,
                })
            }
        };

        tracing::debug!(
            reference,
            bytes = blob.len(),
            has_passphrase = passphrase.is_some(),
            "certificate loaded"
        );
        Ok(CertificateMaterial { blob, passphrase })
    }
}
