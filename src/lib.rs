//! Detects and corrects PIXID (HR-XML/SIDES) invoices whose invoiced hours
//! disagree with the worked-time record, typically a week that straddles two
//! months billed in full.
//!
//! ```no_run
//! let bytes = std::fs::read("invoice.xml")?;
//! let analysis = pixid_fixer::analyze(bytes)?;
//! if analysis.has_issue {
//!     let corrected = pixid_fixer::fix(&analysis);
//!     std::fs::write("corrected_invoice.xml", corrected)?;
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod correct;
pub mod encoding;
pub mod error;
pub mod invoice;
pub mod processor;
pub mod report;
pub mod verify;
pub mod xml;

pub use correct::Correction;
pub use encoding::{RawDocument, decode_best_effort, ensure_utf8_declaration};
pub use error::{FixerError, Result};
pub use invoice::{InvoiceAnalysis, LineItem};
pub use report::CorrectionReport;

use tracing::info;

/// Decode, parse, extract and run detection on one invoice.
///
/// Fails only when the decoded text is not well-formed XML.
pub fn analyze(input: impl Into<RawDocument>) -> Result<InvoiceAnalysis> {
    let decoded = encoding::resolve(input.into());
    info!(
        encoding = %decoded.encoding,
        strategy = ?decoded.strategy,
        chars = decoded.text.len(),
        "Decoded invoice"
    );

    let extracted = {
        let doc = xml::parse(&decoded.text)?;
        invoice::extract(&doc)
    };

    let (filled, total) = extracted.coverage();
    info!(
        invoice_id = %extracted.invoice_id,
        period_start = ?extracted.period_start,
        period_end = ?extracted.period_end,
        raf_hours = %extracted.raf_hours,
        invoice_hours = %extracted.invoice_hours,
        total_ht = %extracted.total_charges,
        lines = extracted.lines.len(),
        filled,
        total,
        "Extraction result"
    );

    Ok(invoice::detect(
        extracted.with_source(decoded.text, decoded.encoding),
    ))
}

/// Corrected text for an analysed invoice; the original text when no issue
/// was found.
pub fn fix(analysis: &InvoiceAnalysis) -> String {
    correct::fix(&analysis.source, analysis)
}
