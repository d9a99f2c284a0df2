// src/report.rs

use crate::correct::Correction;
use crate::error::Result;
use crate::invoice::InvoiceAnalysis;
use rust_decimal::Decimal;
use serde::Serialize;
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Hours and net amount on one side of a correction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Figures {
    #[serde(with = "rust_decimal::serde::float")]
    pub hours: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_ht: Decimal,
}

/// What was changed on an invoice, in a form that can be archived as JSON.
#[derive(Debug, Clone, Serialize)]
pub struct CorrectionReport {
    pub timestamp: String,
    pub invoice_id: String,
    pub original: Figures,
    pub corrected: Figures,
    #[serde(with = "rust_decimal::serde::float")]
    pub ratio_applied: Decimal,
    pub source_sha256: String,
    pub corrected_sha256: String,
}

impl CorrectionReport {
    pub fn build(
        analysis: &InvoiceAnalysis,
        correction: &Correction,
        corrected_text: &str,
        at: OffsetDateTime,
    ) -> Self {
        Self {
            timestamp: at
                .format(&Rfc3339)
                .unwrap_or_else(|_| at.unix_timestamp().to_string()),
            invoice_id: analysis.invoice_id.clone(),
            original: Figures {
                hours: analysis.invoice_hours,
                total_ht: analysis.total_charges,
            },
            corrected: Figures {
                hours: correction.hours,
                total_ht: correction.total_charges.round_dp(2),
            },
            ratio_applied: correction.ratio,
            source_sha256: digest(&analysis.source),
            corrected_sha256: digest(corrected_text),
        }
    }

    /// Same as [`CorrectionReport::build`], stamped with the current UTC time.
    pub fn now(analysis: &InvoiceAnalysis, correction: &Correction, corrected_text: &str) -> Self {
        Self::build(analysis, correction, corrected_text, OffsetDateTime::now_utc())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Hex SHA-256 of a document's text.
pub fn digest(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
