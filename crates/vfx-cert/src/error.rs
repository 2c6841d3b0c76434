//! Certificate errors.
//!
//! Every variant blocks submission for the affected business only. None of
//! them affect invoice registration.

use thiserror::Error;
use vfx_core::BusinessId;

#[derive(Error, Debug)]
pub enum CertError {
    #[error("business {0} has no compliance configuration")]
    NotConfigured(BusinessId),

    #[error("business {0} has no signing certificate reference")]
    NoCertificate(BusinessId),

    #[error("invalid certificate reference {0:?}")]
    InvalidReference(String),

    #[error("failed to read certificate {reference}: {source}")]
    Read {
        reference: String,
        #[source]
        source: std::io::Error,
    },

    /// The blob is neither a PEM nor a DER X.509 certificate.
    #[error("unreadable certificate: {0}")]
    Parse(String),

    #[error("certificate parsing timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("certificate parsing task failed: {0}")]
    Task(String),
}
