//! Submission envelope: a batch of validated documents with their chain data.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::document::{leaf, xml_escape, InvoiceDocument, SCHEMA_VERSION, XML_NAMESPACE};
use crate::validate::{validate, ValidationReport};

/// Issuer header of an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeHeader {
    pub issuer_legal_id: String,
    pub issuer_name: String,
    /// `testing` or `production`.
    pub environment: String,
}

/// One record in an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeEntry {
    pub sequence: u64,
    pub previous_hash: String,
    pub current_hash: String,
    pub direction: String,
    pub document: InvoiceDocument,
}

#[derive(Error, Debug)]
pub enum EnvelopeError {
    #[error("envelope must contain at least one record")]
    Empty,

    /// Entries must be in strictly ascending sequence order.
    #[error("record {sequence} follows {previous}; envelope entries must be in ascending sequence order")]
    OutOfOrder { previous: u64, sequence: u64 },

    #[error("document for sequence {sequence} is invalid: {}", report.summary())]
    InvalidDocument {
        sequence: u64,
        report: ValidationReport,
    },
}

/// Render a submission envelope. Every document is validated first; an
/// invalid document blocks the whole envelope.
pub fn encode_envelope(header: &EnvelopeHeader, entries: &[EnvelopeEntry]) -> Result<String, EnvelopeError> {
    if entries.is_empty() {
        return Err(EnvelopeError::Empty);
    }
    for pair in entries.windows(2) {
        if pair[1].sequence <= pair[0].sequence {
            return Err(EnvelopeError::OutOfOrder {
                previous: pair[0].sequence,
                sequence: pair[1].sequence,
            });
        }
    }
    for entry in entries {
        let report = validate(&entry.document);
        if !report.valid {
            return Err(EnvelopeError::InvalidDocument {
                sequence: entry.sequence,
                report,
            });
        }
    }

    let records: String = entries
        .iter()
        .map(|e| {
            format!(
                "  <Record>\n    <Chain>\n{}{}{}{}    </Chain>\n{}\n  </Record>\n",
                leaf("Sequence", Some(&e.sequence.to_string()), 3),
                leaf("PreviousHash", Some(&e.previous_hash), 3),
                leaf("CurrentHash", Some(&e.current_hash), 3),
                leaf("Direction", Some(&e.direction), 3),
                e.document.render(2),
            )
        })
        .collect();

    Ok(format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<RegistrationBatch xmlns="{ns}" SchemaVersion="{version}">
  <Header>
    <IssuerLegalId>{issuer_id}</IssuerLegalId>
    <IssuerName>{issuer_name}</IssuerName>
    <Environment>{environment}</Environment>
    <RecordCount>{count}</RecordCount>
  </Header>
{records}</RegistrationBatch>
"#,
        ns = XML_NAMESPACE,
        version = SCHEMA_VERSION,
        issuer_id = xml_escape(&header.issuer_legal_id),
        issuer_name = xml_escape(&header.issuer_name),
        environment = xml_escape(&header.environment),
        count = entries.len(),
    ))
}
